//! In-memory transport implementation
//!
//! Stores records per endpoint in insertion order and assigns sequential
//! string ids. Used by the tests and by the binary's offline mode.
//! Failures can be injected to exercise the error paths.

use log::debug;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

use super::Transport;
use crate::error::TransportError;
use crate::models::{Attributes, EntityId};

/// A request observed by the in-memory transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    List { endpoint: String },
    Create { endpoint: String },
    Update { endpoint: String, id: EntityId },
    Delete { endpoint: String, id: EntityId },
}

/// In-memory implementation of [`Transport`]
#[derive(Default)]
pub struct InMemoryTransport {
    records: RefCell<HashMap<String, Vec<Attributes>>>,
    next_id: Cell<u64>,
    failures: RefCell<VecDeque<TransportError>>,
    journal: RefCell<Vec<Request>>,
}

impl InMemoryTransport {
    /// Create a new empty transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Store records as if they had been created earlier. Records without
    /// an `id` get one assigned.
    pub fn seed(&self, endpoint: &str, records: impl IntoIterator<Item = Attributes>) {
        let mut store = self.records.borrow_mut();
        let list = store.entry(endpoint.to_string()).or_default();
        for mut record in records {
            if record.get("id").and_then(EntityId::from_value).is_none() {
                record.insert("id".to_string(), Value::String(self.assign_id()));
            }
            list.push(record);
        }
    }

    /// Make the next request fail with `error`. Queued failures are
    /// consumed in order, one per request.
    pub fn fail_next(&self, error: TransportError) {
        self.failures.borrow_mut().push_back(error);
    }

    /// Every request received so far, oldest first
    pub fn requests(&self) -> Vec<Request> {
        self.journal.borrow().clone()
    }

    /// Current records of an endpoint
    pub fn records(&self, endpoint: &str) -> Vec<Attributes> {
        self.records
            .borrow()
            .get(endpoint)
            .cloned()
            .unwrap_or_default()
    }

    fn assign_id(&self) -> String {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id.to_string()
    }

    /// Record the request and pop an injected failure, if any
    fn begin(&self, request: Request) -> Result<(), TransportError> {
        debug!("in-memory transport: {:?}", request);
        self.journal.borrow_mut().push(request);
        match self.failures.borrow_mut().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn position(list: &[Attributes], id: &EntityId) -> Option<usize> {
        list.iter().position(|record| {
            record
                .get("id")
                .and_then(EntityId::from_value)
                .is_some_and(|rid| &rid == id)
        })
    }

    fn not_found(endpoint: &str, id: &EntityId) -> TransportError {
        TransportError::NotFound {
            endpoint: endpoint.to_string(),
            id: id.to_string(),
        }
    }
}

impl Transport for InMemoryTransport {
    fn list(&self, endpoint: &str) -> Result<Vec<Attributes>, TransportError> {
        self.begin(Request::List {
            endpoint: endpoint.to_string(),
        })?;
        Ok(self.records(endpoint))
    }

    fn create(&self, endpoint: &str, record: &Attributes) -> Result<Attributes, TransportError> {
        self.begin(Request::Create {
            endpoint: endpoint.to_string(),
        })?;

        let mut stored = record.clone();
        stored.insert("id".to_string(), Value::String(self.assign_id()));
        self.records
            .borrow_mut()
            .entry(endpoint.to_string())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    fn update(
        &self,
        endpoint: &str,
        id: &EntityId,
        record: &Attributes,
    ) -> Result<Attributes, TransportError> {
        self.begin(Request::Update {
            endpoint: endpoint.to_string(),
            id: id.clone(),
        })?;

        let mut store = self.records.borrow_mut();
        let list = store
            .get_mut(endpoint)
            .ok_or_else(|| Self::not_found(endpoint, id))?;
        let index = Self::position(list, id).ok_or_else(|| Self::not_found(endpoint, id))?;

        let mut stored = record.clone();
        stored.insert("id".to_string(), Value::String(id.to_string()));
        list[index] = stored.clone();
        Ok(stored)
    }

    fn delete(&self, endpoint: &str, id: &EntityId) -> Result<(), TransportError> {
        self.begin(Request::Delete {
            endpoint: endpoint.to_string(),
            id: id.clone(),
        })?;

        let mut store = self.records.borrow_mut();
        let list = store
            .get_mut(endpoint)
            .ok_or_else(|| Self::not_found(endpoint, id))?;
        let index = Self::position(list, id).ok_or_else(|| Self::not_found(endpoint, id))?;
        list.remove(index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_create_assigns_ids() {
        let transport = InMemoryTransport::new();
        let a = transport.create("mailboxes/", &record(json!({"name": "A"}))).unwrap();
        let b = transport.create("mailboxes/", &record(json!({"name": "B"}))).unwrap();

        assert_eq!(a.get("id"), Some(&json!("1")));
        assert_eq!(b.get("id"), Some(&json!("2")));
        assert_eq!(transport.records("mailboxes/").len(), 2);
    }

    #[test]
    fn test_seed_keeps_existing_ids() {
        let transport = InMemoryTransport::new();
        transport.seed(
            "mails/",
            vec![record(json!({"id": "m9", "subject": "x"})), record(json!({"subject": "y"}))],
        );

        let records = transport.list("mails/").unwrap();
        assert_eq!(records[0].get("id"), Some(&json!("m9")));
        assert_eq!(records[1].get("id"), Some(&json!("1")));
    }

    #[test]
    fn test_update_and_delete() {
        let transport = InMemoryTransport::new();
        let created = transport.create("mailboxes/", &record(json!({"name": "A"}))).unwrap();
        let id = EntityId::from_value(&created["id"]).unwrap();

        let updated = transport
            .update("mailboxes/", &id, &record(json!({"name": "Work"})))
            .unwrap();
        assert_eq!(updated.get("name"), Some(&json!("Work")));
        assert_eq!(updated.get("id"), Some(&json!(id.as_str())));

        transport.delete("mailboxes/", &id).unwrap();
        assert!(transport.records("mailboxes/").is_empty());
        assert_eq!(
            transport.delete("mailboxes/", &id),
            Err(TransportError::NotFound {
                endpoint: "mailboxes/".to_string(),
                id: id.to_string()
            })
        );
    }

    #[test]
    fn test_injected_failure_is_consumed_once() {
        let transport = InMemoryTransport::new();
        transport.fail_next(TransportError::Status { code: 503 });

        assert_eq!(
            transport.list("mails/"),
            Err(TransportError::Status { code: 503 })
        );
        assert!(transport.list("mails/").is_ok());
        assert_eq!(transport.requests().len(), 2);
    }
}
