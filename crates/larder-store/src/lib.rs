//! Key-value store contract for Larder.
//!
//! Larder maps typed entities onto a remote key-value server. This crate
//! defines the narrow slice of that server the mapping layer relies on, and
//! nothing more:
//!
//! - hash maps (`hgetall`, `HSet`), ordered lists (`lrange`, `RPush`),
//!   unordered sets (`smembers`, `SAdd`) and sorted sets (`zrank`, `ZAdd`)
//! - key existence checks
//! - batched command execution in a single round trip ([`Batch`])
//! - publishing on a named channel and pattern subscriptions that deliver
//!   messages as an ordered stream ([`Subscription`])
//!
//! # Storage Backends
//!
//! All backends implement the [`KvStore`] trait:
//!
//! - [`InMemoryKvStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. A batch is applied in queue order. It is not a transaction, except that
//!    its [`Guard`]s are checked atomically before any command runs.
//! 2. Reads of a missing key return an empty collection, never an error.
//! 3. The store never interprets values -- every field and member is a string.
//! 4. Transport failures are propagated, never silently ignored.

pub mod command;
pub mod error;
pub mod memory;
pub mod pubsub;
pub mod traits;

pub use command::{Batch, Command, Guard};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryKvStore;
pub use pubsub::{glob_match, Message, Subscription};
pub use traits::{KvStore, Record};
