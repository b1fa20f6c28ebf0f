//! Mail crate - Observable entities for the Mailroom client
//!
//! This crate provides the UI-independent half of the client:
//! - Entity kinds (Mailbox, Mail) over flat field maps
//! - Observable entities and sorted entity sets with typed events
//! - Transport abstraction with HTTP and in-memory implementations
//! - A single-threaded task queue that completes persistence requests
//! - Backend configuration loading
//!
//! Everything here is single-threaded: handles are `Rc`-based and events
//! are delivered synchronously on the thread that caused them.

pub mod collection;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod events;
pub mod model;
pub mod models;
pub mod transport;

pub use collection::{Collection, WeakCollection};
pub use config::BackendConfig;
pub use error::TransportError;
pub use event_loop::EventLoop;
pub use events::{CollectionEvent, Emitter, ModelEvent, SubscriptionId};
pub use model::{Model, WeakModel};
pub use models::{
    Attributes, EntityId, Mail, Mailbox, MailboxFields, Resource, compare_values, parse_date, value_count,
    value_text, value_truthy,
};
pub use transport::{Backend, HttpTransport, InMemoryTransport, Request, Transport};
