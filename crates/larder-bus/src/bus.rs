use std::sync::{Arc, Mutex};

use bytes::Bytes;
use larder_store::{KvStore, Message, Subscription};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BusConfig;
use crate::error::{BusError, Result};
use crate::registry::{Handler, Registry};

const SENTINEL: &[u8] = b"hello";

/// Connectivity of the bus subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusState {
    Uninitialized,
    /// Subscription requested; waiting for the sentinel to come back.
    Bootstrapping,
    Ready,
    /// The subscription was lost; `attempt` counts resubscribe attempts.
    Reconnecting { attempt: u32 },
    /// Terminal: shut down, or reconnect attempts exhausted.
    Disconnected,
}

impl BusState {
    pub fn is_ready(self) -> bool {
        self == BusState::Ready
    }

    pub fn is_terminal(self) -> bool {
        self == BusState::Disconnected
    }
}

/// Delivers store pub/sub messages to handlers registered per channel.
///
/// The bus holds one pattern subscription and a single dispatch task.
/// [`start`](Self::start) returns only after a sentinel published on the
/// private bootstrap channel has come back through that subscription, so no
/// message published after it returns can be missed.
pub struct EventBus {
    store: Arc<dyn KvStore>,
    registry: Arc<Registry>,
    state: watch::Receiver<BusState>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
    config: BusConfig,
}

impl EventBus {
    /// Subscribe, start the dispatch task and perform the bootstrap
    /// handshake.
    pub async fn start(store: Arc<dyn KvStore>, config: BusConfig) -> Result<Self> {
        let registry = Arc::new(Registry::new());
        let (state_tx, state) = watch::channel(BusState::Uninitialized);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let subscription = store.psubscribe(&config.pattern)?;
        state_tx.send_replace(BusState::Bootstrapping);
        debug!(pattern = %config.pattern, "event bus bootstrapping");

        let (ready_tx, ready_rx) = oneshot::channel();
        let dispatcher = Dispatcher {
            store: Arc::clone(&store),
            registry: Arc::clone(&registry),
            config: config.clone(),
            state: state_tx,
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(dispatcher.run(subscription, ready_tx));

        let bus = Self {
            store,
            registry,
            state,
            shutdown,
            task: Mutex::new(Some(task)),
            config,
        };

        let handshake = bus.handshake(ready_rx);
        let outcome = match bus.config.bootstrap_timeout {
            Some(limit) => tokio::time::timeout(limit, handshake)
                .await
                .unwrap_or(Err(BusError::BootstrapTimeout(limit))),
            None => handshake.await,
        };
        if let Err(err) = outcome {
            warn!(error = %err, "event bus bootstrap failed");
            bus.shutdown().await;
            return Err(err);
        }

        info!(pattern = %bus.config.pattern, "event bus ready");
        Ok(bus)
    }

    /// Publish the sentinel until the dispatch task reports it has seen one.
    async fn handshake(&self, mut ready: oneshot::Receiver<()>) -> Result<()> {
        let mut ticker = tokio::time::interval(self.config.sentinel_interval);
        loop {
            tokio::select! {
                seen = &mut ready => return seen.map_err(|_| BusError::Disconnected),
                _ = ticker.tick() => {
                    self.store
                        .publish(&self.config.bootstrap_channel, Bytes::from_static(SENTINEL))?;
                }
            }
        }
    }

    pub fn state(&self) -> BusState {
        *self.state.borrow()
    }

    /// A receiver that observes every state transition.
    pub fn watch_state(&self) -> watch::Receiver<BusState> {
        self.state.clone()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Register `handler` for every channel in `channels`.
    pub fn subscribe<I, S, F>(&self, channels: I, handler: F)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&str, &[u8]) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        self.registry.subscribe(channels, handler);
    }

    /// Remove every handler registered for each channel in `channels`.
    pub fn unsubscribe<I, S>(&self, channels: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.registry.unsubscribe(channels);
    }

    /// Publish `payload` on `channel` through the store.
    pub fn publish(&self, channel: &str, payload: impl Into<Bytes>) -> Result<()> {
        self.store.publish(channel, payload.into())?;
        Ok(())
    }

    /// Stop the dispatch task and wait for it to exit.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        let task = self.task.lock().expect("task lock poisoned").take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!(error = %err, "dispatch task ended abnormally");
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("state", &self.state())
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}

/// State owned by the dispatch task.
struct Dispatcher {
    store: Arc<dyn KvStore>,
    registry: Arc<Registry>,
    config: BusConfig,
    state: watch::Sender<BusState>,
    shutdown: watch::Receiver<bool>,
}

impl Dispatcher {
    async fn run(mut self, mut subscription: Subscription, ready: oneshot::Sender<()>) {
        let mut ready = Some(ready);
        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                next = subscription.next() => next,
            };

            match next {
                Some(Ok(message)) => self.handle(message, &mut ready),
                Some(Err(err)) => {
                    warn!(error = %err, "event bus subscription failed");
                    match self.resubscribe(ready.is_none()).await {
                        Some(fresh) => subscription = fresh,
                        None => break,
                    }
                }
                None => {
                    warn!("event bus subscription closed");
                    match self.resubscribe(ready.is_none()).await {
                        Some(fresh) => subscription = fresh,
                        None => break,
                    }
                }
            }
        }
        self.state.send_replace(BusState::Disconnected);
        info!("event bus disconnected");
    }

    fn handle(&self, message: Message, ready: &mut Option<oneshot::Sender<()>>) {
        if message.channel == self.config.bootstrap_channel {
            if let Some(tx) = ready.take() {
                self.state.send_replace(BusState::Ready);
                let _ = tx.send(());
            }
            return;
        }

        let delivered = self.registry.dispatch(&message.channel, &message.payload);
        if delivered == 0 {
            debug!(channel = %message.channel, "no handlers; message dropped");
        }
    }

    /// Re-issue the pattern subscription with backoff. Returns `None` when
    /// the bus is shutting down or the policy gives up.
    async fn resubscribe(&mut self, bootstrapped: bool) -> Option<Subscription> {
        let policy = self.config.reconnect.clone();
        let mut attempt = 0;
        loop {
            attempt += 1;
            if !policy.allows(attempt) {
                warn!(attempts = attempt - 1, "event bus giving up on resubscribe");
                return None;
            }
            self.state.send_replace(BusState::Reconnecting { attempt });

            let delay = policy.delay(attempt);
            tokio::select! {
                biased;
                _ = self.shutdown.changed() => return None,
                _ = tokio::time::sleep(delay) => {}
            }

            match self.store.psubscribe(&self.config.pattern) {
                Ok(subscription) => {
                    let state = if bootstrapped {
                        BusState::Ready
                    } else {
                        BusState::Bootstrapping
                    };
                    self.state.send_replace(state);
                    info!(attempt, "event bus resubscribed");
                    return Some(subscription);
                }
                Err(err) => {
                    warn!(attempt, error = %err, delay = ?delay, "event bus resubscribe failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconnectPolicy;
    use larder_store::{Batch, InMemoryKvStore, Record, StoreError, StoreResult};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// In-memory store that can be told to refuse or stall subscriptions.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryKvStore,
        refuse: AtomicBool,
        stall: AtomicBool,
        stalled: Mutex<Vec<mpsc::UnboundedSender<StoreResult<Message>>>>,
    }

    impl KvStore for FlakyStore {
        fn hgetall(&self, key: &str) -> StoreResult<Record> {
            self.inner.hgetall(key)
        }

        fn lrange(&self, key: &str) -> StoreResult<Vec<String>> {
            self.inner.lrange(key)
        }

        fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
            self.inner.smembers(key)
        }

        fn zrank(&self, key: &str, member: &str) -> StoreResult<Option<usize>> {
            self.inner.zrank(key, member)
        }

        fn exists(&self, key: &str) -> StoreResult<bool> {
            self.inner.exists(key)
        }

        fn exec(&self, batch: Batch) -> StoreResult<()> {
            self.inner.exec(batch)
        }

        fn psubscribe(&self, pattern: &str) -> StoreResult<Subscription> {
            if self.refuse.load(Ordering::SeqCst) {
                return Err(StoreError::Backend("connection refused".into()));
            }
            if self.stall.load(Ordering::SeqCst) {
                let (tx, subscription) = Subscription::channel(pattern);
                self.stalled.lock().unwrap().push(tx);
                return Ok(subscription);
            }
            self.inner.psubscribe(pattern)
        }
    }

    fn fast_config() -> BusConfig {
        BusConfig {
            sentinel_interval: Duration::from_millis(1),
            bootstrap_timeout: Some(Duration::from_secs(5)),
            reconnect: ReconnectPolicy {
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(5),
                jitter: 0.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn collector(bus: &EventBus, channel: &str) -> mpsc::UnboundedReceiver<(String, Vec<u8>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        bus.subscribe([channel], move |channel: &str, payload: &[u8]| {
            let _ = tx.send((channel.to_string(), payload.to_vec()));
        });
        rx
    }

    async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("message within deadline")
            .expect("channel open")
    }

    async fn wait_for(rx: &mut watch::Receiver<BusState>, wanted: impl Fn(BusState) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| wanted(*s)))
            .await
            .expect("state reached within deadline")
            .expect("state sender alive");
    }

    #[tokio::test]
    async fn start_returns_ready() {
        let store = Arc::new(InMemoryKvStore::new());
        let bus = EventBus::start(store.clone(), fast_config()).await.unwrap();
        assert_eq!(bus.state(), BusState::Ready);
        assert_eq!(store.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn first_publish_after_start_is_delivered() {
        let store = Arc::new(InMemoryKvStore::new());
        let bus = EventBus::start(store, fast_config()).await.unwrap();
        let mut rx = collector(&bus, "item:1");

        bus.publish("item:1", "hi").unwrap();
        assert_eq!(recv(&mut rx).await, ("item:1".to_string(), b"hi".to_vec()));
    }

    #[tokio::test]
    async fn handlers_run_in_registration_order() {
        let store = Arc::new(InMemoryKvStore::new());
        let bus = EventBus::start(store, fast_config()).await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        for tag in ["first", "second", "third"] {
            let tx = tx.clone();
            bus.subscribe(["ordered"], move |_: &str, _: &[u8]| {
                let _ = tx.send(tag);
            });
        }

        bus.publish("ordered", Bytes::new()).unwrap();
        assert_eq!(recv(&mut rx).await, "first");
        assert_eq!(recv(&mut rx).await, "second");
        assert_eq!(recv(&mut rx).await, "third");
    }

    #[tokio::test]
    async fn sentinel_never_reaches_handlers() {
        let store = Arc::new(InMemoryKvStore::new());
        let bus = EventBus::start(store, fast_config()).await.unwrap();
        let mut sentinels = collector(&bus, "larder_hello_world");
        let mut other = collector(&bus, "other");

        bus.publish("larder_hello_world", "hello").unwrap();
        bus.publish("other", "x").unwrap();

        // Dispatch is ordered, so once "other" arrives the sentinel was seen.
        recv(&mut other).await;
        assert!(sentinels.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let store = Arc::new(InMemoryKvStore::new());
        let bus = EventBus::start(store, fast_config()).await.unwrap();
        let mut gone = collector(&bus, "gone");
        let mut kept = collector(&bus, "kept");

        bus.unsubscribe(["gone"]);
        bus.publish("gone", "x").unwrap();
        bus.publish("kept", "y").unwrap();

        recv(&mut kept).await;
        assert!(matches!(gone.try_recv(), Err(mpsc::error::TryRecvError::Disconnected)));
    }

    #[tokio::test]
    async fn resubscribes_after_transport_loss() {
        let store = Arc::new(InMemoryKvStore::new());
        let bus = EventBus::start(store.clone(), fast_config()).await.unwrap();
        let mut rx = collector(&bus, "item:1");
        let mut states = bus.watch_state();

        store.sever_subscriptions();
        wait_for(&mut states, |s| matches!(s, BusState::Reconnecting { .. })).await;
        wait_for(&mut states, BusState::is_ready).await;

        bus.publish("item:1", "after").unwrap();
        assert_eq!(recv(&mut rx).await.1, b"after".to_vec());
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let store = Arc::new(FlakyStore::default());
        let mut config = fast_config();
        config.reconnect.max_attempts = Some(3);
        let bus = EventBus::start(store.clone(), config).await.unwrap();
        let mut states = bus.watch_state();

        store.refuse.store(true, Ordering::SeqCst);
        store.inner.sever_subscriptions();

        wait_for(&mut states, BusState::is_terminal).await;
        assert_eq!(bus.state(), BusState::Disconnected);
    }

    #[tokio::test]
    async fn bootstrap_times_out_when_sentinel_never_arrives() {
        let store = Arc::new(FlakyStore::default());
        store.stall.store(true, Ordering::SeqCst);
        let mut config = fast_config();
        config.bootstrap_timeout = Some(Duration::from_millis(50));

        let err = EventBus::start(store, config).await.unwrap_err();
        assert_eq!(err, BusError::BootstrapTimeout(Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn shutdown_is_terminal() {
        let store = Arc::new(InMemoryKvStore::new());
        let bus = EventBus::start(store.clone(), fast_config()).await.unwrap();

        bus.shutdown().await;
        assert_eq!(bus.state(), BusState::Disconnected);
        assert_eq!(store.subscriber_count(), 0);
        // Publishing still goes through the store.
        bus.publish("item:1", "x").unwrap();
    }
}
