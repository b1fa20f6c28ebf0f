//! Typed notifications for entities and entity sets
//!
//! Every entity and entity set owns an [`Emitter`] for its event type.
//! Dispatch is synchronous: `emit` returns after every subscriber ran.
//! The subscriber list is snapshotted before dispatch, so handlers may
//! subscribe or unsubscribe while an event is being delivered. A handler
//! removed mid-dispatch does not receive the event.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::error::TransportError;
use crate::model::Model;
use crate::models::Resource;

/// Handle returned by [`Emitter::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<E> = Rc<dyn Fn(&E)>;

/// Synchronous single-threaded event dispatcher
pub struct Emitter<E> {
    next_id: Cell<u64>,
    handlers: RefCell<Vec<(SubscriptionId, Handler<E>)>>,
}

impl<E> Emitter<E> {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(0),
            handlers: RefCell::new(Vec::new()),
        }
    }

    /// Register a handler, returning the id needed to remove it
    pub fn subscribe(&self, handler: impl Fn(&E) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.handlers.borrow_mut().push((id, Rc::new(handler)));
        id
    }

    /// Remove a handler. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let before = handlers.len();
        handlers.retain(|(sub, _)| *sub != id);
        handlers.len() != before
    }

    /// Whether a handler is still registered
    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.handlers.borrow().iter().any(|(sub, _)| *sub == id)
    }

    /// Deliver an event to every current subscriber, returning how many ran
    pub fn emit(&self, event: &E) -> usize {
        let snapshot: Vec<(SubscriptionId, Handler<E>)> = self
            .handlers
            .borrow()
            .iter()
            .map(|(id, handler)| (*id, handler.clone()))
            .collect();

        let mut delivered = 0;
        for (id, handler) in snapshot {
            if self.is_subscribed(id) {
                handler(event);
                delivered += 1;
            }
        }
        delivered
    }

    /// Drop every subscriber
    pub fn clear(&self) {
        self.handlers.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.handlers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.borrow().is_empty()
    }
}

impl<E> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Emitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("subscribers", &self.len())
            .finish()
    }
}

/// Notification fired by a single entity
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    /// Fields changed, in the order they were merged
    Change { changed: Vec<String> },
    /// A save request completed
    Sync,
    /// The entity was removed, locally or remotely
    Destroy,
    /// A save or destroy request failed; local state is unchanged
    Error(TransportError),
}

/// Notification fired by an entity set
pub enum CollectionEvent<R: Resource> {
    /// One entity was inserted
    Add(Model<R>),
    /// One entity left the set
    Remove(Model<R>),
    /// Set-level notification closing a batch of `Add`s
    Update { added: usize },
    /// The whole content was replaced by a fetch
    Reset,
    /// The order changed because a comparator field changed
    Sort,
    /// A member entity changed
    Change { model: Model<R>, changed: Vec<String> },
    /// The single-selection slot changed
    ActiveChanged {
        previous: Option<Model<R>>,
        current: Option<Model<R>>,
    },
    /// The set of members flagged for display changed
    ActiveMailboxesChanged,
    /// A fetch or a member's persistence request failed
    Error(TransportError),
}

impl<R: Resource> CollectionEvent<R> {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add(_) => "add",
            Self::Remove(_) => "remove",
            Self::Update { .. } => "update",
            Self::Reset => "reset",
            Self::Sort => "sort",
            Self::Change { .. } => "change",
            Self::ActiveChanged { .. } => "change_active",
            Self::ActiveMailboxesChanged => "change_active_mailboxes",
            Self::Error(_) => "error",
        }
    }
}

impl<R: Resource> fmt::Debug for CollectionEvent<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add(model) | Self::Remove(model) => {
                write!(f, "{}({})", self.name(), model.cid())
            }
            Self::Update { added } => write!(f, "update({added})"),
            Self::Change { model, changed } => {
                write!(f, "change({}, {:?})", model.cid(), changed)
            }
            Self::ActiveChanged { previous, current } => write!(
                f,
                "change_active({:?} -> {:?})",
                previous.as_ref().map(Model::cid),
                current.as_ref().map(Model::cid)
            ),
            Self::Error(err) => write!(f, "error({err})"),
            _ => f.write_str(self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_reaches_all_subscribers() {
        let emitter: Emitter<u32> = Emitter::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let a = seen.clone();
        emitter.subscribe(move |v| a.borrow_mut().push(("a", *v)));
        let b = seen.clone();
        emitter.subscribe(move |v| b.borrow_mut().push(("b", *v)));

        assert_eq!(emitter.emit(&7), 2);
        assert_eq!(*seen.borrow(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn test_unsubscribe() {
        let emitter: Emitter<()> = Emitter::new();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let id = emitter.subscribe(move |_| c.set(c.get() + 1));

        emitter.emit(&());
        assert!(emitter.unsubscribe(id));
        assert!(!emitter.unsubscribe(id));
        emitter.emit(&());

        assert_eq!(count.get(), 1);
        assert!(emitter.is_empty());
    }

    #[test]
    fn test_unsubscribe_during_dispatch_skips_later_handler() {
        let emitter: Rc<Emitter<()>> = Rc::new(Emitter::new());
        let later_ran = Rc::new(Cell::new(false));
        let victim: Rc<Cell<Option<SubscriptionId>>> = Rc::new(Cell::new(None));

        let e = emitter.clone();
        let v = victim.clone();
        emitter.subscribe(move |_| {
            if let Some(id) = v.get() {
                e.unsubscribe(id);
            }
        });
        let flag = later_ran.clone();
        victim.set(Some(emitter.subscribe(move |_| flag.set(true))));

        assert_eq!(emitter.emit(&()), 1);
        assert!(!later_ran.get());
    }

    #[test]
    fn test_subscribe_during_dispatch_waits_for_next_event() {
        let emitter: Rc<Emitter<()>> = Rc::new(Emitter::new());
        let count = Rc::new(Cell::new(0));

        let e = emitter.clone();
        let c = count.clone();
        emitter.subscribe(move |_| {
            let c = c.clone();
            e.subscribe(move |_| c.set(c.get() + 1));
        });

        emitter.emit(&());
        assert_eq!(count.get(), 0);
        emitter.emit(&());
        assert_eq!(count.get(), 1);
    }
}
