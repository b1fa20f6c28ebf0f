//! Entity: an observable record of one kind
//!
//! A [`Model`] is a cheap, clonable handle. Clones share the same record,
//! so views, entity sets and queued requests all observe one state.
//! Local mutations apply immediately; persistence completes later on the
//! event loop and never rolls local state back.

use log::{debug, info, warn};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::collection::{Collection, WeakCollection};
use crate::error::TransportError;
use crate::events::{Emitter, ModelEvent, SubscriptionId};
use crate::models::{Attributes, EntityId, Resource, value_text};
use crate::transport::Backend;

/// Process-wide source of client ids
static NEXT_CID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Live,
    Destroying,
    Destroyed,
}

struct ModelInner<R: Resource> {
    cid: u64,
    id: RefCell<Option<EntityId>>,
    attributes: RefCell<Attributes>,
    /// Client-only flag for the mailbox editor; never persisted
    editing: Cell<bool>,
    lifecycle: Cell<Lifecycle>,
    backend: RefCell<Option<Backend>>,
    collection: RefCell<Option<WeakCollection<R>>>,
    events: Emitter<ModelEvent>,
    _kind: PhantomData<R>,
}

/// Shared handle to one entity
pub struct Model<R: Resource> {
    inner: Rc<ModelInner<R>>,
}

/// Non-owning handle, used by subscribers that must not keep an entity alive
pub struct WeakModel<R: Resource> {
    inner: Weak<ModelInner<R>>,
}

impl<R: Resource> Model<R> {
    /// Create a transient entity with the kind's defaults
    pub fn new() -> Self {
        Self::from_parts(None, R::defaults())
    }

    /// Create a transient entity with the defaults overridden by `fields`.
    /// An `id` in `fields` is ignored: identifiers come from the transport.
    pub fn with_attributes(fields: Attributes) -> Self {
        let model = Self::new();
        model.merge(fields, false);
        model
    }

    /// Build an entity from a record returned by the transport
    pub fn hydrate(record: Attributes) -> Self {
        let model = Self::new();
        model.merge(record, true);
        model
    }

    fn from_parts(id: Option<EntityId>, attributes: Attributes) -> Self {
        Self {
            inner: Rc::new(ModelInner {
                cid: NEXT_CID.fetch_add(1, Ordering::Relaxed),
                id: RefCell::new(id),
                attributes: RefCell::new(attributes),
                editing: Cell::new(false),
                lifecycle: Cell::new(Lifecycle::Live),
                backend: RefCell::new(None),
                collection: RefCell::new(None),
                events: Emitter::new(),
                _kind: PhantomData,
            }),
        }
    }

    /// Client id, unique for the process and stable for the entity's life
    pub fn cid(&self) -> u64 {
        self.inner.cid
    }

    pub fn id(&self) -> Option<EntityId> {
        self.inner.id.borrow().clone()
    }

    /// True until the transport assigns an identifier
    pub fn is_new(&self) -> bool {
        self.inner.id.borrow().is_none()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.lifecycle.get() == Lifecycle::Destroyed
    }

    /// Current value of a field
    pub fn get(&self, field: &str) -> Option<Value> {
        if field == "id" {
            return self.id().map(|id| Value::String(id.0));
        }
        self.inner.attributes.borrow().get(field).cloned()
    }

    /// Field value as display text, empty when absent
    pub fn text(&self, field: &str) -> String {
        value_text(self.get(field).as_ref())
    }

    pub fn has(&self, field: &str) -> bool {
        self.get(field).is_some_and(|v| !v.is_null())
    }

    /// Snapshot of every field except the identifier
    pub fn attributes(&self) -> Attributes {
        self.inner.attributes.borrow().clone()
    }

    /// Snapshot of every field, with `id` when assigned
    pub fn to_json(&self) -> Attributes {
        let mut json = self.attributes();
        if let Some(id) = self.id() {
            json.insert("id".to_string(), Value::String(id.0));
        }
        json
    }

    /// Merge fields and fire one `Change` if anything differed.
    /// Returns the names of the changed fields.
    pub fn set(&self, fields: Attributes) -> Vec<String> {
        let changed = self.merge(fields, false);
        if !changed.is_empty() {
            debug!("{} {} changed: {:?}", R::NAME, self.cid(), changed);
            self.inner.events.emit(&ModelEvent::Change {
                changed: changed.clone(),
            });
        }
        changed
    }

    /// Set a single field
    pub fn set_field(&self, field: &str, value: impl Into<Value>) -> Vec<String> {
        let mut fields = Attributes::new();
        fields.insert(field.to_string(), value.into());
        self.set(fields)
    }

    /// Write fields into the record without notifying.
    /// `accept_id` lets transport responses assign the identifier.
    fn merge(&self, fields: Attributes, accept_id: bool) -> Vec<String> {
        let mut changed = Vec::new();
        let mut attributes = self.inner.attributes.borrow_mut();
        for (key, value) in fields {
            if key == "id" {
                if !accept_id {
                    debug!("{} {}: ignoring client-side id", R::NAME, self.cid());
                    continue;
                }
                if let Some(id) = EntityId::from_value(&value) {
                    let mut current = self.inner.id.borrow_mut();
                    if current.as_ref() != Some(&id) {
                        *current = Some(id);
                        changed.push(key);
                    }
                }
                continue;
            }
            if attributes.get(&key) != Some(&value) {
                attributes.insert(key.clone(), value);
                changed.push(key);
            }
        }
        changed
    }

    /// Merge fields locally, then queue a create or update request.
    ///
    /// Whether the request creates or updates is decided when it runs, so
    /// a save queued behind the one that assigns the id updates the same
    /// record. The payload is the state at the time of the call.
    pub fn save(&self, fields: Attributes) {
        self.set(fields);

        let Some(backend) = self.backend() else {
            self.fail(TransportError::Unbound);
            return;
        };

        let payload = self.attributes();
        let model = self.clone();
        let event_loop = backend.event_loop().clone();
        event_loop.spawn(format!("save {} {}", R::NAME, self.cid()), move || {
            let transport = backend.transport();
            let result = match model.id() {
                None => transport.create(R::ENDPOINT, &payload),
                Some(id) => transport.update(R::ENDPOINT, &id, &payload),
            };
            match result {
                Ok(record) => model.complete_save(record),
                Err(err) => model.fail(err),
            }
        });
    }

    fn complete_save(&self, record: Attributes) {
        if self.is_destroyed() {
            debug!("{} {}: applying save response after destroy", R::NAME, self.cid());
        }
        let changed = self.merge(record, true);
        info!(
            "{} {} saved as {}",
            R::NAME,
            self.cid(),
            self.id().map(|id| id.0).unwrap_or_default()
        );
        if !changed.is_empty() {
            self.inner.events.emit(&ModelEvent::Change { changed });
        }
        self.inner.events.emit(&ModelEvent::Sync);
    }

    /// Remove the entity.
    ///
    /// Transient entities are destroyed immediately. Persisted ones queue a
    /// delete and fire `Destroy` when it completes. Repeated calls while a
    /// delete is pending are ignored.
    pub fn destroy(&self) {
        if self.inner.lifecycle.get() != Lifecycle::Live {
            return;
        }

        let Some(id) = self.id() else {
            self.finish_destroy();
            return;
        };

        let Some(backend) = self.backend() else {
            self.fail(TransportError::Unbound);
            return;
        };

        self.inner.lifecycle.set(Lifecycle::Destroying);
        let model = self.clone();
        let event_loop = backend.event_loop().clone();
        event_loop.spawn(format!("destroy {} {}", R::NAME, self.cid()), move || {
            match backend.transport().delete(R::ENDPOINT, &id) {
                Ok(()) => model.finish_destroy(),
                Err(err) => {
                    model.inner.lifecycle.set(Lifecycle::Live);
                    model.fail(err);
                }
            }
        });
    }

    fn finish_destroy(&self) {
        if self.inner.lifecycle.replace(Lifecycle::Destroyed) == Lifecycle::Destroyed {
            return;
        }
        info!("{} {} destroyed", R::NAME, self.cid());
        self.inner.events.emit(&ModelEvent::Destroy);
        // Nothing may observe a destroyed entity, not even a late save.
        self.inner.events.clear();
    }

    fn fail(&self, err: TransportError) {
        warn!("{} {} request failed: {}", R::NAME, self.cid(), err);
        self.inner.events.emit(&ModelEvent::Error(err));
    }

    pub fn subscribe(&self, handler: impl Fn(&ModelEvent) + 'static) -> SubscriptionId {
        self.inner.events.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.events.unsubscribe(id)
    }

    pub fn events(&self) -> &Emitter<ModelEvent> {
        &self.inner.events
    }

    /// Attach a backend unless one is already attached
    pub fn bind(&self, backend: &Backend) {
        let mut slot = self.inner.backend.borrow_mut();
        if slot.is_none() {
            *slot = Some(backend.clone());
        }
    }

    pub fn backend(&self) -> Option<Backend> {
        self.inner.backend.borrow().clone()
    }

    /// The entity set this entity belongs to, if any
    pub fn collection(&self) -> Option<Collection<R>> {
        self.inner
            .collection
            .borrow()
            .as_ref()
            .and_then(WeakCollection::upgrade)
    }

    pub(crate) fn set_collection(&self, collection: Option<WeakCollection<R>>) {
        *self.inner.collection.borrow_mut() = collection;
    }

    /// Whether the mailbox editor shows this entity as a form
    pub fn is_editing(&self) -> bool {
        self.inner.editing.get()
    }

    pub fn set_editing(&self, editing: bool) {
        self.inner.editing.set(editing);
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakModel<R> {
        WeakModel {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

impl<R: Resource> WeakModel<R> {
    pub fn upgrade(&self) -> Option<Model<R>> {
        self.inner.upgrade().map(|inner| Model { inner })
    }
}

impl<R: Resource> Default for Model<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resource> Clone for Model<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: Resource> Clone for WeakModel<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: Resource> PartialEq for Model<R> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<R: Resource> Eq for Model<R> {}

impl<R: Resource> fmt::Debug for Model<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("kind", &R::NAME)
            .field("cid", &self.cid())
            .field("id", &self.id())
            .field("attributes", &self.inner.attributes.borrow())
            .finish()
    }
}
