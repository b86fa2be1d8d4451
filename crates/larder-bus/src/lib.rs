//! # larder-bus
//!
//! Change notifications for Larder entities.
//!
//! The bus opens a single pattern subscription on the store and runs one
//! dispatch task that hands every inbound message to the handlers registered
//! for its exact channel name, in registration order.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized -> Bootstrapping -> Ready <-> Reconnecting -> Disconnected
//! ```
//!
//! - **Bootstrapping**: the subscription's readiness is not observable, so
//!   [`EventBus::start`] keeps publishing a sentinel on a private channel
//!   until the dispatch task sees it come back.
//! - **Reconnecting**: when the subscription errors or closes, the task
//!   re-issues it with exponential backoff ([`ReconnectPolicy`]) and resumes
//!   dispatch. Handlers stay registered throughout.
//! - **Disconnected**: terminal. Reached on [`EventBus::shutdown`] or when
//!   the policy's attempt limit is exhausted.

pub mod bus;
pub mod config;
pub mod error;
pub mod registry;

pub use bus::{BusState, EventBus};
pub use config::{BusConfig, ReconnectPolicy, BOOTSTRAP_CHANNEL};
pub use error::{BusError, Result};
pub use registry::{Handler, Registry};
