use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, RwLock};

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::command::{Batch, Command, Guard};
use crate::error::{StoreError, StoreResult};
use crate::pubsub::{glob_match, Message, Subscription};
use crate::traits::{KvStore, Record};

/// A value held under one key.
#[derive(Clone, Debug)]
enum Value {
    Hash(HashMap<String, String>),
    List(Vec<String>),
    Set(HashSet<String>),
    SortedSet(HashMap<String, f64>),
}

impl Value {
    fn is_empty(&self) -> bool {
        match self {
            Value::Hash(h) => h.is_empty(),
            Value::List(l) => l.is_empty(),
            Value::Set(s) => s.is_empty(),
            Value::SortedSet(z) => z.is_empty(),
        }
    }
}

/// Internal subscriber: a pattern paired with the sender feeding its stream.
struct PatternSubscriber {
    pattern: String,
    sender: mpsc::UnboundedSender<StoreResult<Message>>,
}

/// In-memory, HashMap-based key-value store.
///
/// Intended for tests and embedding. Values live behind a `RwLock`; pattern
/// subscribers behind a separate `Mutex` so publishing never blocks readers.
/// Guards and writes of a batch are applied under one write lock, which makes
/// guarded batches atomic.
pub struct InMemoryKvStore {
    data: RwLock<HashMap<String, Value>>,
    subscribers: Mutex<Vec<PatternSubscriber>>,
}

impl InMemoryKvStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.data.read().expect("lock poisoned").len()
    }

    /// Returns `true` if no key is stored.
    pub fn is_empty(&self) -> bool {
        self.data.read().expect("lock poisoned").is_empty()
    }

    /// Sorted list of every stored key.
    pub fn keys(&self) -> Vec<String> {
        let data = self.data.read().expect("lock poisoned");
        let mut keys: Vec<String> = data.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Remove every key. Subscriptions stay open.
    pub fn clear(&self) {
        self.data.write().expect("lock poisoned").clear();
    }

    /// Number of open pattern subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut subs = self.subscribers.lock().expect("lock poisoned");
        subs.retain(|sub| !sub.sender.is_closed());
        subs.len()
    }

    /// Simulate losing the pub/sub connection.
    ///
    /// Every open subscription receives a [`StoreError::Disconnected`] item
    /// and is then closed.
    pub fn sever_subscriptions(&self) {
        let mut subs = self.subscribers.lock().expect("lock poisoned");
        for sub in subs.drain(..) {
            let _ = sub.sender.send(Err(StoreError::Disconnected));
        }
        warn!("severed all pattern subscriptions");
    }

    fn deliver(&self, channel: &str, payload: &Bytes) {
        let mut subs = self.subscribers.lock().expect("lock poisoned");
        subs.retain(|sub| {
            if !glob_match(&sub.pattern, channel) {
                return !sub.sender.is_closed();
            }
            // A failed send means the subscription was dropped.
            sub.sender
                .send(Ok(Message {
                    channel: channel.to_string(),
                    pattern: sub.pattern.clone(),
                    payload: payload.clone(),
                }))
                .is_ok()
        });
    }

    fn apply(&self, data: &mut HashMap<String, Value>, command: Command) -> StoreResult<()> {
        match command {
            Command::HSet { key, field, value } => {
                match data.entry(key.clone()).or_insert_with(|| Value::Hash(HashMap::new())) {
                    Value::Hash(h) => {
                        h.insert(field, value);
                    }
                    _ => return Err(StoreError::WrongType { key }),
                }
            }
            Command::Del { key } => {
                data.remove(&key);
            }
            Command::RPush { key, value } => {
                match data.entry(key.clone()).or_insert_with(|| Value::List(Vec::new())) {
                    Value::List(l) => l.push(value),
                    _ => return Err(StoreError::WrongType { key }),
                }
            }
            Command::SAdd { key, member } => {
                match data.entry(key.clone()).or_insert_with(|| Value::Set(HashSet::new())) {
                    Value::Set(s) => {
                        s.insert(member);
                    }
                    _ => return Err(StoreError::WrongType { key }),
                }
            }
            Command::ZAdd { key, score, member } => {
                match data
                    .entry(key.clone())
                    .or_insert_with(|| Value::SortedSet(HashMap::new()))
                {
                    Value::SortedSet(z) => {
                        z.insert(member, score);
                    }
                    _ => return Err(StoreError::WrongType { key }),
                }
            }
            Command::Publish { channel, payload } => self.deliver(&channel, &payload),
        }
        Ok(())
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for InMemoryKvStore {
    fn hgetall(&self, key: &str) -> StoreResult<Record> {
        let data = self.data.read().expect("lock poisoned");
        match data.get(key) {
            None => Ok(Record::new()),
            Some(Value::Hash(h)) => Ok(h.clone()),
            Some(_) => Err(StoreError::WrongType { key: key.into() }),
        }
    }

    fn lrange(&self, key: &str) -> StoreResult<Vec<String>> {
        let data = self.data.read().expect("lock poisoned");
        match data.get(key) {
            None => Ok(Vec::new()),
            Some(Value::List(l)) => Ok(l.clone()),
            Some(_) => Err(StoreError::WrongType { key: key.into() }),
        }
    }

    fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        let data = self.data.read().expect("lock poisoned");
        match data.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Set(s)) => Ok(s.iter().cloned().collect()),
            Some(_) => Err(StoreError::WrongType { key: key.into() }),
        }
    }

    fn zrank(&self, key: &str, member: &str) -> StoreResult<Option<usize>> {
        let data = self.data.read().expect("lock poisoned");
        let z = match data.get(key) {
            None => return Ok(None),
            Some(Value::SortedSet(z)) => z,
            Some(_) => return Err(StoreError::WrongType { key: key.into() }),
        };
        if !z.contains_key(member) {
            return Ok(None);
        }
        let mut ranked: Vec<(&String, f64)> = z.iter().map(|(m, s)| (m, *s)).collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        Ok(ranked.iter().position(|(m, _)| m.as_str() == member))
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        let data = self.data.read().expect("lock poisoned");
        Ok(data.contains_key(key))
    }

    fn exec(&self, batch: Batch) -> StoreResult<()> {
        let (guards, commands) = batch.into_parts();
        let mut data = self.data.write().expect("lock poisoned");

        for guard in &guards {
            let holds = match guard {
                Guard::Absent(key) => !data.contains_key(key),
                Guard::Present(key) => data.contains_key(key),
            };
            if !holds {
                debug!(key = %guard.key(), "batch guard failed");
                return Err(StoreError::PreconditionFailed {
                    key: guard.key().to_string(),
                });
            }
        }

        let count = commands.len();
        // Like a pipeline, a failing command does not stop the ones after it;
        // the first failure is reported once the batch has run.
        let mut first_error = None;
        for command in commands {
            let key = command.key().to_string();
            if let Err(e) = self.apply(&mut data, command) {
                first_error.get_or_insert(e);
            }
            // Servers drop keys whose collection became empty.
            if data.get(&key).is_some_and(Value::is_empty) {
                data.remove(&key);
            }
        }

        debug!(commands = count, "batch executed");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn psubscribe(&self, pattern: &str) -> StoreResult<Subscription> {
        let (sender, subscription) = Subscription::channel(pattern);
        self.subscribers
            .lock()
            .expect("lock poisoned")
            .push(PatternSubscriber {
                pattern: pattern.to_string(),
                sender,
            });
        debug!(pattern, "pattern subscription opened");
        Ok(subscription)
    }
}

impl std::fmt::Debug for InMemoryKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKvStore")
            .field("key_count", &self.len())
            .finish()
    }
}
