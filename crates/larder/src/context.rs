use std::sync::Arc;

use larder_bus::{BusError, EventBus};
use larder_model::{keys, Composite, DecodeContext, Entity, Schema, SchemaCache};
use larder_store::KvStore;
use tracing::info;

use crate::config::LarderConfig;
use crate::error::{LarderError, Result};

/// A handle on one store: the entry point for every entity operation.
///
/// The context owns the store connection, the per-type schema cache and,
/// when created with [`connect`](Self::connect), the event bus. Mutations and
/// loads are synchronous calls on `&self`; share the context behind an `Arc`
/// to use it from several threads.
pub struct Larder {
    store: Arc<dyn KvStore>,
    schemas: SchemaCache,
    config: LarderConfig,
    bus: Option<EventBus>,
}

impl Larder {
    /// A context without notifications.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_config(store, LarderConfig::default())
    }

    pub fn with_config(store: Arc<dyn KvStore>, config: LarderConfig) -> Self {
        Self {
            store,
            schemas: SchemaCache::new(),
            config,
            bus: None,
        }
    }

    /// A context with a running event bus. Returns once the bus subscription
    /// is confirmed live.
    pub async fn connect(store: Arc<dyn KvStore>, config: LarderConfig) -> Result<Self> {
        let bus = EventBus::start(Arc::clone(&store), config.bus.clone()).await?;
        info!(
            strict_references = config.strict_references,
            "larder connected"
        );
        Ok(Self {
            store,
            schemas: SchemaCache::new(),
            config,
            bus: Some(bus),
        })
    }

    pub fn store(&self) -> &dyn KvStore {
        self.store.as_ref()
    }

    pub fn config(&self) -> &LarderConfig {
        &self.config
    }

    pub fn bus(&self) -> Option<&EventBus> {
        self.bus.as_ref()
    }

    /// The cached schema of `T`.
    pub fn schema<T: Composite>(&self) -> Result<Arc<Schema<T>>> {
        Ok(self.schemas.get::<T>()?)
    }

    pub(crate) fn decode_context(&self) -> DecodeContext<'_> {
        DecodeContext::new(self.store.as_ref(), &self.schemas)
            .strict(self.config.strict_references)
    }

    fn require_bus(&self) -> Result<&EventBus> {
        self.bus
            .as_ref()
            .ok_or(LarderError::Bus(BusError::Disconnected))
    }

    /// Run `handler` for every notification published on the channel of
    /// entity `id` of type `T`.
    pub fn subscribe_entity<T, F>(&self, id: &str, handler: F) -> Result<()>
    where
        T: Entity,
        F: Fn(&str, &[u8]) + Send + Sync + 'static,
    {
        let channel = keys::channel(&keys::prefix::<T>(), id);
        self.require_bus()?.subscribe([channel], handler);
        Ok(())
    }

    /// Drop every handler registered for entity `id` of type `T`.
    pub fn unsubscribe_entity<T: Entity>(&self, id: &str) -> Result<()> {
        let channel = keys::channel(&keys::prefix::<T>(), id);
        self.require_bus()?.unsubscribe([channel]);
        Ok(())
    }

    /// Stop the event bus, if any.
    pub async fn shutdown(&self) {
        if let Some(bus) = &self.bus {
            bus.shutdown().await;
        }
    }
}

impl std::fmt::Debug for Larder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Larder")
            .field("schemas", &self.schemas)
            .field("config", &self.config)
            .field("bus", &self.bus)
            .finish()
    }
}
