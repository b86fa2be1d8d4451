use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Callback invoked with the channel name and payload of a message.
pub type Handler = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

/// Channel name to the ordered list of handlers registered for it.
///
/// Mutations take the write lock. Dispatch clones the handler list under the
/// read lock and runs the handlers after releasing it, so a handler may
/// itself subscribe or unsubscribe.
#[derive(Default)]
pub struct Registry {
    channels: RwLock<HashMap<String, Vec<Handler>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` to the list of every channel in `channels`.
    pub fn subscribe<I, S>(&self, channels: I, handler: Handler)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut map = self.channels.write().expect("registry lock poisoned");
        for channel in channels {
            map.entry(channel.into())
                .or_default()
                .push(Arc::clone(&handler));
        }
    }

    /// Drop every handler registered for each channel in `channels`.
    pub fn unsubscribe<I, S>(&self, channels: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut map = self.channels.write().expect("registry lock poisoned");
        for channel in channels {
            map.remove(channel.as_ref());
        }
    }

    /// Handlers for exactly `channel`, in registration order.
    pub fn handlers_for(&self, channel: &str) -> Vec<Handler> {
        self.channels
            .read()
            .expect("registry lock poisoned")
            .get(channel)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of channels with at least one handler.
    pub fn channel_count(&self) -> usize {
        self.channels.read().expect("registry lock poisoned").len()
    }

    /// Invoke the handlers for `channel`. Returns how many ran.
    pub fn dispatch(&self, channel: &str, payload: &[u8]) -> usize {
        let handlers = self.handlers_for(channel);
        for handler in &handlers {
            handler(channel, payload);
        }
        handlers.len()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("channels", &self.channel_count())
            .finish()
    }
}
