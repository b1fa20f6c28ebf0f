//! Persistence transport abstraction
//!
//! Entities and entity sets never talk to the network directly. They hold
//! a [`Backend`]: a transport plus the event loop their requests are
//! queued on. Two transports ship with the crate: [`HttpTransport`] for a
//! real REST backend and [`InMemoryTransport`] for tests and offline runs.

mod http;
mod memory;

use std::fmt;
use std::rc::Rc;

use crate::error::TransportError;
use crate::event_loop::EventLoop;
use crate::models::{Attributes, EntityId};

pub use http::HttpTransport;
pub use memory::{InMemoryTransport, Request};

/// REST-style persistence operations over flat field maps
///
/// `endpoint` is the list resource of an entity kind, with a trailing
/// slash (`mailboxes/`). Requests and responses carry the entity's
/// declared fields; responses to `create` carry the assigned `id`.
pub trait Transport {
    /// Fetch every record of the list resource
    fn list(&self, endpoint: &str) -> Result<Vec<Attributes>, TransportError>;

    /// Persist a new record, returning the stored fields with their `id`
    fn create(&self, endpoint: &str, record: &Attributes) -> Result<Attributes, TransportError>;

    /// Replace an existing record, returning the stored fields
    fn update(
        &self,
        endpoint: &str,
        id: &EntityId,
        record: &Attributes,
    ) -> Result<Attributes, TransportError>;

    /// Remove a record
    fn delete(&self, endpoint: &str, id: &EntityId) -> Result<(), TransportError>;
}

/// A transport and the event loop its requests are queued on
#[derive(Clone)]
pub struct Backend {
    transport: Rc<dyn Transport>,
    event_loop: EventLoop,
}

impl Backend {
    pub fn new(transport: Rc<dyn Transport>, event_loop: EventLoop) -> Self {
        Self {
            transport,
            event_loop,
        }
    }

    pub fn transport(&self) -> &Rc<dyn Transport> {
        &self.transport
    }

    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("event_loop", &self.event_loop)
            .finish_non_exhaustive()
    }
}
