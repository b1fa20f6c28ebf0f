//! Mail views: the list column, its rows and the detail pane

use log::debug;
use mail::{Collection, CollectionEvent, Mail, Model, ModelEvent};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{Subscriptions, View, detach_all};
use crate::dom::{Document, NodeId, fragment};
use crate::templates;

/// One row of the mail list
pub struct MailsListElement {
    document: Document,
    node: NodeId,
    model: Model<Mail>,
    collection: Collection<Mail>,
    subscriptions: Subscriptions,
    detached: Cell<bool>,
}

impl MailsListElement {
    pub fn new(document: &Document, model: Model<Mail>, collection: Collection<Mail>) -> Rc<Self> {
        let node = document.create_element("tr", "");
        let view = Rc::new(Self {
            document: document.clone(),
            node,
            model,
            collection,
            subscriptions: Subscriptions::default(),
            detached: Cell::new(false),
        });

        let weak = Rc::downgrade(&view);
        let id = view.model.subscribe(move |event| {
            let Some(view) = weak.upgrade() else {
                return;
            };
            match event {
                ModelEvent::Change { .. } => view.render(),
                ModelEvent::Destroy => view.remove(),
                _ => {}
            }
        });
        view.subscriptions.model(&view.model, id);

        let weak = Rc::downgrade(&view);
        let id = view.collection.subscribe(move |event| {
            let Some(view) = weak.upgrade() else {
                return;
            };
            if let CollectionEvent::ActiveChanged { previous, current } = event {
                let involved = [previous, current]
                    .into_iter()
                    .flatten()
                    .any(|m| m.ptr_eq(&view.model));
                if involved {
                    view.render();
                }
            }
        });
        view.subscriptions.collection(&view.collection, id);

        view.subscriptions
            .click(document, node, ".choose_mail_button", &view, |view, _, _| {
                view.choose()
            });
        view
    }

    pub fn model(&self) -> &Model<Mail> {
        &self.model
    }

    pub fn is_detached(&self) -> bool {
        self.detached.get()
    }

    fn choose(&self) {
        debug!("choosing mail {}", self.model.cid());
        self.collection.set_active(&self.model);
    }

    pub fn remove(&self) {
        self.detach();
        self.document.remove(self.node);
    }
}

impl View for MailsListElement {
    fn node(&self) -> NodeId {
        self.node
    }

    fn render(&self) {
        if self.detached.get() {
            return;
        }
        let active = self.collection.is_active(&self.model);
        self.document.set_content(
            self.node,
            templates::mail_list(&self.model.to_json(), active),
        );
    }

    fn detach(&self) {
        if self.detached.replace(true) {
            return;
        }
        self.subscriptions.release();
    }
}

/// Rows for every fetched mail
pub struct MailsList {
    document: Document,
    anchor: NodeId,
    collection: Collection<Mail>,
    children: RefCell<Vec<Rc<MailsListElement>>>,
    subscriptions: Subscriptions,
}

impl MailsList {
    /// Bind the rows to `anchor` and refresh the mails
    pub fn new(document: &Document, anchor: NodeId, collection: Collection<Mail>) -> Rc<Self> {
        let view = Rc::new(Self {
            document: document.clone(),
            anchor,
            collection,
            children: RefCell::new(Vec::new()),
            subscriptions: Subscriptions::default(),
        });

        let weak = Rc::downgrade(&view);
        let id = view.collection.subscribe(move |event| {
            let Some(view) = weak.upgrade() else {
                return;
            };
            match event {
                CollectionEvent::Reset | CollectionEvent::Sort => view.render(),
                CollectionEvent::Add(model) => view.add_one(model),
                CollectionEvent::Remove(model) => view.drop_child(model),
                _ => {}
            }
        });
        view.subscriptions.collection(&view.collection, id);

        view.collection.fetch();
        view
    }

    /// Insert a row at the mail's sorted position
    fn add_one(&self, model: &Model<Mail>) {
        let child = MailsListElement::new(&self.document, model.clone(), self.collection.clone());
        let mut children = self.children.borrow_mut();
        let index = self
            .collection
            .index_of(model)
            .map_or(children.len(), |index| index.min(children.len()));
        self.document.insert(self.anchor, child.node(), index);
        child.render();
        children.insert(index, child);
    }

    fn drop_child(&self, model: &Model<Mail>) {
        let child = {
            let mut children = self.children.borrow_mut();
            children
                .iter()
                .position(|c| c.model().ptr_eq(model))
                .map(|index| children.remove(index))
        };
        if let Some(child) = child {
            child.remove();
        }
    }

    pub fn children(&self) -> Vec<Rc<MailsListElement>> {
        self.children.borrow().clone()
    }
}

impl View for MailsList {
    fn node(&self) -> NodeId {
        self.anchor
    }

    fn render(&self) {
        detach_all(&self.children);
        self.document.set_content(self.anchor, fragment([]));
        for model in self.collection.models() {
            self.add_one(&model);
        }
        debug!("rendered {} mails", self.collection.len());
    }

    fn detach(&self) {
        detach_all(&self.children);
        self.subscriptions.release();
    }
}

/// The "load older messages" button
pub struct MailsListMore {
    document: Document,
    anchor: NodeId,
}

impl MailsListMore {
    pub fn new(document: &Document, anchor: NodeId) -> Rc<Self> {
        Rc::new(Self {
            document: document.clone(),
            anchor,
        })
    }
}

impl View for MailsListMore {
    fn node(&self) -> NodeId {
        self.anchor
    }

    fn render(&self) {
        self.document.set_content(self.anchor, templates::mails_more());
    }
}

/// Left column of the mail layout: the list and the button below it
pub struct MailsColumn {
    document: Document,
    anchor: NodeId,
    collection: Collection<Mail>,
    list: RefCell<Option<Rc<MailsList>>>,
    more: RefCell<Option<Rc<MailsListMore>>>,
}

impl MailsColumn {
    pub fn new(document: &Document, anchor: NodeId, collection: Collection<Mail>) -> Rc<Self> {
        Rc::new(Self {
            document: document.clone(),
            anchor,
            collection,
            list: RefCell::new(None),
            more: RefCell::new(None),
        })
    }

    pub fn list(&self) -> Option<Rc<MailsList>> {
        self.list.borrow().clone()
    }
}

impl View for MailsColumn {
    fn node(&self) -> NodeId {
        self.anchor
    }

    fn render(&self) {
        self.detach();
        self.document.set_content(self.anchor, templates::mails());

        if let Some(rows) = self.document.query(self.anchor, "#mails_list_container") {
            let list = MailsList::new(&self.document, rows, self.collection.clone());
            list.render();
            *self.list.borrow_mut() = Some(list);
        }
        if let Some(slot) = self.document.query(self.anchor, "#button_load_more_mails") {
            let more = MailsListMore::new(&self.document, slot);
            more.render();
            *self.more.borrow_mut() = Some(more);
        }
    }

    fn detach(&self) {
        if let Some(list) = self.list.take() {
            list.detach();
        }
        self.more.take();
    }
}

/// Detail pane for the active mail
pub struct MailsElement {
    document: Document,
    anchor: NodeId,
    collection: Collection<Mail>,
    subscriptions: Subscriptions,
}

impl MailsElement {
    pub fn new(document: &Document, anchor: NodeId, collection: Collection<Mail>) -> Rc<Self> {
        let view = Rc::new(Self {
            document: document.clone(),
            anchor,
            collection,
            subscriptions: Subscriptions::default(),
        });

        let weak = Rc::downgrade(&view);
        let id = view.collection.subscribe(move |event| {
            let Some(view) = weak.upgrade() else {
                return;
            };
            if matches!(
                event,
                CollectionEvent::ActiveChanged { .. } | CollectionEvent::Reset
            ) {
                view.render();
            }
        });
        view.subscriptions.collection(&view.collection, id);
        view
    }
}

impl View for MailsElement {
    fn node(&self) -> NodeId {
        self.anchor
    }

    fn render(&self) {
        let record = self.collection.active().map(|mail| mail.to_json());
        self.document
            .set_content(self.anchor, templates::mail_big(record.as_ref()));
    }

    fn detach(&self) {
        self.subscriptions.release();
    }
}
