//! # Larder
//!
//! Typed entity persistence over a key-value store, with change
//! notifications.
//!
//! An entity is a Rust struct that embeds [`Base`] and describes its fields
//! once, through [`Composite::describe`]. Larder stores it as a hash record
//! under `<type>:<id>`, keeps maps, sets and lists in their own keys, resolves
//! references to other entities on load, and can publish a message on the
//! entity's channel whenever it changes.
//!
//! ```ignore
//! #[derive(Default)]
//! struct Item {
//!     base: Base,
//!     name: String,
//!     price: f64,
//!     tags: Set,
//! }
//!
//! impl Composite for Item {
//!     fn describe(schema: SchemaBuilder<Self>) -> SchemaBuilder<Self> {
//!         schema
//!             .base()
//!             .scalar("name", |i| &i.name, |i| &mut i.name)
//!             .scalar("price", |i| &i.price, |i| &mut i.price)
//!             .set("tags", |i| &i.tags, |i| &mut i.tags)
//!     }
//! }
//!
//! impl Entity for Item {
//!     const TYPE_NAME: &'static str = "Item";
//!     fn base(&self) -> &Base { &self.base }
//!     fn base_mut(&mut self) -> &mut Base { &mut self.base }
//! }
//!
//! let larder = Larder::new(Arc::new(InMemoryKvStore::new()));
//! let mut item = Item { name: "bread".into(), price: 2.5, ..Default::default() };
//! let id = larder.create(&mut item)?;
//!
//! // Only non-zero fields are written on update.
//! larder.update(&id, &mut Item { price: 3.0, ..Default::default() })?;
//! let item: Item = larder.load(&id)?;
//! ```
//!
//! # Modules
//!
//! - [`context`]: the [`Larder`] context object
//! - [`mutation`]: create and update
//! - [`query`]: load, load into, load all
//! - [`config`]: [`LarderConfig`]
//! - [`error`]: [`LarderError`]

pub mod config;
pub mod context;
pub mod error;
pub mod mutation;
pub mod query;

#[cfg(test)]
mod fixtures;

pub use config::LarderConfig;
pub use context::Larder;
pub use error::{LarderError, Result};
pub use mutation::{CreateOptions, UpdateOptions};

pub use larder_bus::{BusConfig, BusError, BusState, EventBus, ReconnectPolicy};
pub use larder_model::{
    keys, scalar_newtype, Base, CodecError, Composite, ComputedBool, Entity, FieldKind, FieldSpec,
    Map, MapContainer, Modifier, Scalar, Schema, SchemaBuilder, Set, SetContainer, ZContains,
};
pub use larder_store::{Batch, InMemoryKvStore, KvStore, StoreError};
