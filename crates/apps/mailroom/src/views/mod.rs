//! Views projecting entities and entity sets onto the document

mod app_view;
mod mailboxes;
mod mails;
mod menu;

use mail::{Collection, Model, Resource, SubscriptionId};
use std::cell::RefCell;
use std::rc::Rc;

use crate::dom::{BindingId, ClickEvent, Document, NodeId};

pub use app_view::{AppView, Layout};
pub use mailboxes::{MailboxesList, MailboxesListNew};
pub use mails::{MailsColumn, MailsElement};
pub use menu::MenuMailboxesList;

/// A renderable projection of one subject onto a document node
pub trait View {
    /// Node the view renders into
    fn node(&self) -> NodeId;

    /// Replace the node's content from the subject's current state.
    /// Rendering twice without a change produces the same markup.
    fn render(&self);

    /// Stop listening to the subject. The node belongs to whoever
    /// rendered it and is left in place.
    fn detach(&self) {}
}

/// Subscriptions a view holds on its subjects
#[derive(Default)]
pub(crate) struct Subscriptions {
    releases: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl Subscriptions {
    pub(crate) fn model<R: Resource>(&self, model: &Model<R>, id: SubscriptionId) {
        let model = model.downgrade();
        self.releases.borrow_mut().push(Box::new(move || {
            if let Some(model) = model.upgrade() {
                model.unsubscribe(id);
            }
        }));
    }

    pub(crate) fn collection<R: Resource>(&self, collection: &Collection<R>, id: SubscriptionId) {
        let collection = collection.downgrade();
        self.releases.borrow_mut().push(Box::new(move || {
            if let Some(collection) = collection.upgrade() {
                collection.unsubscribe(id);
            }
        }));
    }

    /// Bind a delegated click handler, dropped on release
    pub(crate) fn click<V: 'static>(
        &self,
        document: &Document,
        node: NodeId,
        selector: &str,
        view: &Rc<V>,
        action: impl Fn(&V, &Document, &ClickEvent) + 'static,
    ) {
        let id = bind_click(document, node, selector, view, action);
        let document = document.clone();
        self.releases.borrow_mut().push(Box::new(move || {
            document.off(id);
        }));
    }

    /// Unsubscribe everything registered so far
    pub(crate) fn release(&self) {
        let releases = self.releases.take();
        for release in releases {
            release();
        }
    }
}

/// Register a delegated click handler that holds the view weakly
fn bind_click<V: 'static>(
    document: &Document,
    node: NodeId,
    selector: &str,
    view: &Rc<V>,
    action: impl Fn(&V, &Document, &ClickEvent) + 'static,
) -> BindingId {
    let view = Rc::downgrade(view);
    document.on_click(node, selector, move |document, event| {
        if let Some(view) = view.upgrade() {
            action(&view, document, event);
        }
    })
}

/// Detach every view in `views` and empty it
pub(crate) fn detach_all<V: View + ?Sized>(views: &RefCell<Vec<Rc<V>>>) {
    let old = views.take();
    for view in old {
        view.detach();
    }
}
