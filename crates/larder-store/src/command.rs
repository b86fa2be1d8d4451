use bytes::Bytes;

/// A single write queued in a [`Batch`].
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Set `field` of the hash at `key`.
    HSet {
        key: String,
        field: String,
        value: String,
    },
    /// Delete `key`, whatever it holds.
    Del { key: String },
    /// Append `value` to the tail of the list at `key`.
    RPush { key: String, value: String },
    /// Add `member` to the set at `key`.
    SAdd { key: String, member: String },
    /// Add or re-score `member` in the sorted set at `key`.
    ZAdd {
        key: String,
        score: f64,
        member: String,
    },
    /// Publish `payload` on `channel`.
    Publish { channel: String, payload: Bytes },
}

impl Command {
    /// The key (or channel) this command targets.
    pub fn key(&self) -> &str {
        match self {
            Command::HSet { key, .. }
            | Command::Del { key }
            | Command::RPush { key, .. }
            | Command::SAdd { key, .. }
            | Command::ZAdd { key, .. } => key,
            Command::Publish { channel, .. } => channel,
        }
    }
}

/// A precondition checked atomically before a batch is applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Guard {
    /// The key must not exist.
    Absent(String),
    /// The key must exist.
    Present(String),
}

impl Guard {
    /// The key this guard inspects.
    pub fn key(&self) -> &str {
        match self {
            Guard::Absent(key) | Guard::Present(key) => key,
        }
    }
}

/// Commands queued for a single round trip.
///
/// Commands run in the order they were queued. Guards are evaluated first;
/// if any fails the backend rejects the whole batch without applying a
/// single command.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Batch {
    guards: Vec<Guard>,
    commands: Vec<Command>,
}

impl Batch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an arbitrary command.
    pub fn push(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    pub fn hset(
        &mut self,
        key: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.push(Command::HSet {
            key: key.into(),
            field: field.into(),
            value: value.into(),
        })
    }

    pub fn del(&mut self, key: impl Into<String>) -> &mut Self {
        self.push(Command::Del { key: key.into() })
    }

    pub fn rpush(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.push(Command::RPush {
            key: key.into(),
            value: value.into(),
        })
    }

    pub fn sadd(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.push(Command::SAdd {
            key: key.into(),
            member: member.into(),
        })
    }

    pub fn zadd(
        &mut self,
        key: impl Into<String>,
        score: f64,
        member: impl Into<String>,
    ) -> &mut Self {
        self.push(Command::ZAdd {
            key: key.into(),
            score,
            member: member.into(),
        })
    }

    pub fn publish(&mut self, channel: impl Into<String>, payload: impl Into<Bytes>) -> &mut Self {
        self.push(Command::Publish {
            channel: channel.into(),
            payload: payload.into(),
        })
    }

    /// Require `key` to be absent when the batch is applied.
    pub fn require_absent(&mut self, key: impl Into<String>) -> &mut Self {
        self.guards.push(Guard::Absent(key.into()));
        self
    }

    /// Require `key` to exist when the batch is applied.
    pub fn require_present(&mut self, key: impl Into<String>) -> &mut Self {
        self.guards.push(Guard::Present(key.into()));
        self
    }

    /// Queued commands, in execution order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Guards evaluated before the commands run.
    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }

    /// Number of queued commands (guards are not counted).
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if no commands are queued.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Take guards and commands out of the batch, leaving it empty.
    pub fn into_parts(self) -> (Vec<Guard>, Vec<Command>) {
        (self.guards, self.commands)
    }
}
