//! # larder-model
//!
//! The entity model of Larder: how a Rust type is described to the store
//! and how its fields travel to and from hash records.
//!
//! A type implements [`Composite`] by registering its fields on a
//! [`SchemaBuilder`]. Types with an identity additionally implement
//! [`Entity`] and embed [`Base`], which carries the ID and the two reserved
//! timestamps. From the registration the crate derives an ordered, flattened
//! [`Schema`]; [`bind`] decodes a record through it and [`encode_fields`]
//! turns an instance into store commands.
//!
//! ## Key layout
//!
//! | what                         | key                           |
//! |------------------------------|-------------------------------|
//! | entity record (hash)         | `<prefix>:<id>`               |
//! | container or sequence field  | `<prefix>:<id>:<field>`       |
//! | notification channel         | `<prefix>:<id>`               |
//!
//! `<prefix>` is the entity's type name lower-cased.

pub mod annotation;
pub mod codec;
pub mod computed;
pub mod container;
pub mod entity;
pub mod error;
pub mod scalar;
pub mod schema;

pub use annotation::{derive_store_name, Annotation, FieldSpec, Modifier};
pub use codec::{
    bind, encode_fields, load_reference, DecodeContext, EncodePolicy, FieldSink, FieldSource,
};
pub use computed::{ComputedBool, ZContains};
pub use container::{Map, MapContainer, Set, SetContainer};
pub use entity::{keys, Base, Composite, Entity, CREATED_AT_FIELD, UPDATED_AT_FIELD};
pub use error::{CodecError, CodecResult};
pub use scalar::Scalar;
pub use schema::{FieldDescriptor, FieldKind, Schema, SchemaBuilder, SchemaCache};
