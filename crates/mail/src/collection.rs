//! Entity set: an ordered, uniquely keyed group of entities of one kind
//!
//! Members stay sorted by the kind's comparator field. Ties keep insertion
//! order. The set subscribes to each member, forwarding its changes and
//! dropping it when it is destroyed.

use log::{debug, info, warn};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use crate::error::TransportError;
use crate::events::{CollectionEvent, Emitter, ModelEvent, SubscriptionId};
use crate::model::Model;
use crate::models::{Attributes, EntityId, Resource, compare_values};
use crate::transport::Backend;

struct Member<R: Resource> {
    model: Model<R>,
    subscription: SubscriptionId,
}

struct CollectionInner<R: Resource> {
    members: RefCell<Vec<Member<R>>>,
    active: RefCell<Option<Model<R>>>,
    backend: Option<Backend>,
    events: Emitter<CollectionEvent<R>>,
}

/// Shared handle to an entity set
pub struct Collection<R: Resource> {
    inner: Rc<CollectionInner<R>>,
}

/// Non-owning handle, held by member entities
pub struct WeakCollection<R: Resource> {
    inner: Weak<CollectionInner<R>>,
}

impl<R: Resource> Collection<R> {
    /// Create an empty set persisted through `backend`
    pub fn new(backend: Backend) -> Self {
        Self::build(Some(backend))
    }

    /// Create an empty set with no transport; `fetch` reports `Unbound`
    pub fn detached() -> Self {
        Self::build(None)
    }

    fn build(backend: Option<Backend>) -> Self {
        Self {
            inner: Rc::new(CollectionInner {
                members: RefCell::new(Vec::new()),
                active: RefCell::new(None),
                backend,
                events: Emitter::new(),
            }),
        }
    }

    pub fn backend(&self) -> Option<&Backend> {
        self.inner.backend.as_ref()
    }

    pub fn len(&self) -> usize {
        self.inner.members.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.members.borrow().is_empty()
    }

    /// Snapshot of the members in comparator order
    pub fn models(&self) -> Vec<Model<R>> {
        self.inner
            .members
            .borrow()
            .iter()
            .map(|m| m.model.clone())
            .collect()
    }

    /// Visit every member in comparator order. The visitor may mutate the
    /// set; it walks the snapshot taken before the first call.
    pub fn each(&self, mut visit: impl FnMut(&Model<R>)) {
        for model in self.models() {
            visit(&model);
        }
    }

    pub fn at(&self, index: usize) -> Option<Model<R>> {
        self.inner
            .members
            .borrow()
            .get(index)
            .map(|m| m.model.clone())
    }

    /// Look a member up by identifier
    pub fn get(&self, id: &EntityId) -> Option<Model<R>> {
        self.inner
            .members
            .borrow()
            .iter()
            .find(|m| m.model.id().as_ref() == Some(id))
            .map(|m| m.model.clone())
    }

    /// Whether the entity, or another with its identifier, is a member
    pub fn contains(&self, model: &Model<R>) -> bool {
        let id = model.id();
        self.inner.members.borrow().iter().any(|m| {
            m.model.ptr_eq(model) || (id.is_some() && m.model.id() == id)
        })
    }

    pub fn index_of(&self, model: &Model<R>) -> Option<usize> {
        self.inner
            .members
            .borrow()
            .iter()
            .position(|m| m.model.ptr_eq(model))
    }

    /// Insert one entity. Fires `Add` then `Update`.
    pub fn add(&self, model: Model<R>) -> bool {
        self.add_all([model]) == 1
    }

    /// Insert entities in comparator position.
    ///
    /// Fires one `Add` per inserted entity, then one `Update` for the
    /// batch. Entities already present are skipped without notification.
    pub fn add_all(&self, models: impl IntoIterator<Item = Model<R>>) -> usize {
        let mut added = 0;
        for model in models {
            if self.contains(&model) {
                debug!("{} {} already in set, skipping", R::NAME, model.cid());
                continue;
            }

            let member = self.attach(model.clone());
            {
                let mut members = self.inner.members.borrow_mut();
                let index = Self::insertion_index(&members, &model);
                members.insert(index, member);
            }
            added += 1;
            self.inner.events.emit(&CollectionEvent::Add(model));
        }

        if added > 0 {
            self.inner.events.emit(&CollectionEvent::Update { added });
        }
        added
    }

    /// Take an entity out of the set. Fires `Remove` if it was a member.
    pub fn remove(&self, model: &Model<R>) -> bool {
        let member = {
            let mut members = self.inner.members.borrow_mut();
            match members.iter().position(|m| m.model.ptr_eq(model)) {
                Some(index) => members.remove(index),
                None => return false,
            }
        };
        self.detach(&member);
        self.inner
            .events
            .emit(&CollectionEvent::Remove(member.model.clone()));
        true
    }

    /// Replace the whole content with entities built from `records`.
    ///
    /// Fires exactly one `Reset` and no `Add`. Records repeating an
    /// identifier are dropped. The active slot follows its identifier
    /// into the new content, or empties when the identifier is gone.
    pub fn reset(&self, records: Vec<Attributes>) {
        let old: Vec<Member<R>> = self.inner.members.borrow_mut().drain(..).collect();
        for member in &old {
            self.detach(member);
        }

        let mut seen = HashSet::new();
        let mut members = Vec::with_capacity(records.len());
        for record in records {
            let model = Model::hydrate(record);
            if let Some(id) = model.id()
                && !seen.insert(id.clone())
            {
                debug!("{}: dropping duplicate record {}", R::NAME, id);
                continue;
            }
            members.push(self.attach(model));
        }
        members.sort_by(|a, b| Self::compare(&a.model, &b.model));
        *self.inner.members.borrow_mut() = members;

        let previous = self.inner.active.borrow().clone();
        if let Some(previous) = previous {
            let replacement = previous.id().and_then(|id| self.get(&id));
            *self.inner.active.borrow_mut() = replacement;
        }

        debug!("{} set reset with {} entities", R::NAME, self.len());
        self.inner.events.emit(&CollectionEvent::Reset);
    }

    /// Queue a list request; on completion the content is reset
    pub fn fetch(&self) {
        let Some(backend) = self.inner.backend.clone() else {
            warn!("{} set has no transport, cannot fetch", R::NAME);
            self.inner
                .events
                .emit(&CollectionEvent::Error(TransportError::Unbound));
            return;
        };

        let weak = self.downgrade();
        let event_loop = backend.event_loop().clone();
        event_loop.spawn(format!("fetch {}", R::ENDPOINT), move || {
            let Some(collection) = weak.upgrade() else {
                return;
            };
            match backend.transport().list(R::ENDPOINT) {
                Ok(records) => {
                    info!("fetched {} {} records", records.len(), R::NAME);
                    collection.reset(records);
                }
                Err(err) => {
                    warn!("fetching {} failed: {}", R::ENDPOINT, err);
                    collection.inner.events.emit(&CollectionEvent::Error(err));
                }
            }
        });
    }

    /// Re-sort members and fire `Sort`
    pub fn sort(&self) {
        self.inner
            .members
            .borrow_mut()
            .sort_by(|a, b| Self::compare(&a.model, &b.model));
        self.inner.events.emit(&CollectionEvent::Sort);
    }

    /// The entity in the single-selection slot
    pub fn active(&self) -> Option<Model<R>> {
        self.inner.active.borrow().clone()
    }

    pub fn is_active(&self, model: &Model<R>) -> bool {
        self.inner
            .active
            .borrow()
            .as_ref()
            .is_some_and(|active| active.ptr_eq(model))
    }

    /// Store `model` in the selection slot and fire one `ActiveChanged`
    pub fn set_active(&self, model: &Model<R>) {
        let previous = self.inner.active.replace(Some(model.clone()));
        debug!("{} {} selected", R::NAME, model.cid());
        self.inner.events.emit(&CollectionEvent::ActiveChanged {
            previous,
            current: Some(model.clone()),
        });
    }

    /// Empty the selection slot, firing `ActiveChanged` if it was set
    pub fn clear_active(&self) {
        let previous = self.inner.active.take();
        if previous.is_some() {
            self.inner.events.emit(&CollectionEvent::ActiveChanged {
                previous,
                current: None,
            });
        }
    }

    /// Announce that the members flagged for display changed
    pub fn notify_active_mailboxes_changed(&self) {
        self.inner.events.emit(&CollectionEvent::ActiveMailboxesChanged);
    }

    pub fn subscribe(&self, handler: impl Fn(&CollectionEvent<R>) + 'static) -> SubscriptionId {
        self.inner.events.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.events.unsubscribe(id)
    }

    pub fn events(&self) -> &Emitter<CollectionEvent<R>> {
        &self.inner.events
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakCollection<R> {
        WeakCollection {
            inner: Rc::downgrade(&self.inner),
        }
    }

    fn compare(a: &Model<R>, b: &Model<R>) -> std::cmp::Ordering {
        compare_values(
            a.get(R::SORT_FIELD).as_ref(),
            b.get(R::SORT_FIELD).as_ref(),
        )
    }

    /// Index after every member that sorts before or equal to `model`
    fn insertion_index(members: &[Member<R>], model: &Model<R>) -> usize {
        members
            .iter()
            .position(|m| Self::compare(&m.model, model).is_gt())
            .unwrap_or(members.len())
    }

    fn attach(&self, model: Model<R>) -> Member<R> {
        if model.collection().is_none() {
            model.set_collection(Some(self.downgrade()));
        }
        if let Some(backend) = &self.inner.backend {
            model.bind(backend);
        }

        let weak_collection = self.downgrade();
        let weak_model = model.downgrade();
        let subscription = model.subscribe(move |event| {
            if let (Some(collection), Some(model)) = (weak_collection.upgrade(), weak_model.upgrade())
            {
                collection.on_model_event(&model, event);
            }
        });
        Member {
            model,
            subscription,
        }
    }

    fn detach(&self, member: &Member<R>) {
        member.model.unsubscribe(member.subscription);
        if member
            .model
            .collection()
            .is_some_and(|owner| owner.ptr_eq(self))
        {
            member.model.set_collection(None);
        }
    }

    fn on_model_event(&self, model: &Model<R>, event: &ModelEvent) {
        match event {
            ModelEvent::Change { changed } => {
                if changed.iter().any(|field| field == R::SORT_FIELD) {
                    self.sort();
                }
                self.inner.events.emit(&CollectionEvent::Change {
                    model: model.clone(),
                    changed: changed.clone(),
                });
            }
            ModelEvent::Destroy => {
                self.remove(model);
                if self.is_active(model) {
                    self.clear_active();
                }
            }
            ModelEvent::Error(err) => {
                self.inner.events.emit(&CollectionEvent::Error(err.clone()));
            }
            ModelEvent::Sync => {}
        }
    }
}

impl<R: Resource> WeakCollection<R> {
    pub fn upgrade(&self) -> Option<Collection<R>> {
        self.inner.upgrade().map(|inner| Collection { inner })
    }
}

impl<R: Resource> Clone for Collection<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: Resource> Clone for WeakCollection<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: Resource> std::fmt::Debug for Collection<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("kind", &R::NAME)
            .field("len", &self.len())
            .finish()
    }
}
