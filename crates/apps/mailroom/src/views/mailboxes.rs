//! Mailbox configuration views
//!
//! `MailboxesList` holds one `MailboxesListElement` per mailbox. Each
//! element toggles between a read-only card and an edit form.
//! `MailboxesListNew` adds a transient mailbox already in edit mode.

use log::debug;
use mail::{Attributes, Collection, CollectionEvent, Mailbox, Model, ModelEvent, Resource};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{Subscriptions, View, detach_all};
use crate::dom::{ClickEvent, Document, NodeId, fragment};
use crate::templates;

/// One mailbox, as a card or an edit form
pub struct MailboxesListElement {
    document: Document,
    node: NodeId,
    model: Model<Mailbox>,
    subscriptions: Subscriptions,
    detached: Cell<bool>,
}

impl MailboxesListElement {
    /// Create the view and its detached `div` node
    pub fn new(document: &Document, model: Model<Mailbox>) -> Rc<Self> {
        let node = document.create_element("div", "mailbox_well well");
        let view = Rc::new(Self {
            document: document.clone(),
            node,
            model,
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

        let subs = &view.subscriptions;
        subs.click(document, node, ".edit_mailbox", &view, |view, _, _| view.edit());
        subs.click(document, node, ".cancel_edit_mailbox", &view, |view, _, _| {
            view.cancel()
        });
        subs.click(document, node, ".save_mailbox", &view, |view, document, event| {
            view.save(document, event)
        });
        subs.click(document, node, ".delete_mailbox", &view, |view, document, event| {
            view.delete(document, event)
        });
        view
    }

    pub fn model(&self) -> &Model<Mailbox> {
        &self.model
    }

    pub fn is_detached(&self) -> bool {
        self.detached.get()
    }

    fn edit(&self) {
        self.model.set_editing(true);
        self.render();
    }

    fn cancel(&self) {
        self.model.set_editing(false);
        self.render();
    }

    /// Persist the form inputs, converted to the types of the defaults
    fn save(&self, document: &Document, event: &ClickEvent) {
        document.add_class(event.current, "disabled");
        document.remove_class(event.current, "save_mailbox");

        let mut fields = Attributes::new();
        for input in document.query_all(self.node, "input.content") {
            if let (Some(name), Some(raw)) = (document.attr(input, "id"), document.value(input)) {
                let value = Mailbox::coerce(&name, &raw);
                fields.insert(name, value);
            }
        }
        debug!("saving mailbox {} from form", self.model.cid());

        self.model.set_editing(false);
        self.model.save(fields);
        self.render();
    }

    fn delete(&self, document: &Document, event: &ClickEvent) {
        document.add_class(event.current, "disabled");
        document.remove_class(event.current, "delete_mailbox");
        self.model.destroy();
    }

    /// Take the node out of the document and stop listening
    pub fn remove(&self) {
        self.detach();
        self.document.remove(self.node);
    }
}

impl View for MailboxesListElement {
    fn node(&self) -> NodeId {
        self.node
    }

    fn render(&self) {
        if self.detached.get() {
            return;
        }
        let record = self.model.to_json();
        let markup = if self.model.is_editing() {
            templates::mailbox_edit(&record)
        } else {
            templates::mailbox(&record)
        };
        self.document.set_content(self.node, markup);
    }

    fn detach(&self) {
        if self.detached.replace(true) {
            return;
        }
        self.subscriptions.release();
    }
}

/// Every configured mailbox, in name order
pub struct MailboxesList {
    document: Document,
    anchor: NodeId,
    collection: Collection<Mailbox>,
    children: RefCell<Vec<Rc<MailboxesListElement>>>,
    subscriptions: Subscriptions,
}

impl MailboxesList {
    /// Bind the list to `anchor` and refresh the mailboxes
    pub fn new(document: &Document, anchor: NodeId, collection: Collection<Mailbox>) -> Rc<Self> {
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

    /// Insert a view for one mailbox at its sorted position, leaving the
    /// other cards untouched
    fn add_one(&self, model: &Model<Mailbox>) {
        let child = MailboxesListElement::new(&self.document, model.clone());
        let mut children = self.children.borrow_mut();
        let index = self
            .collection
            .index_of(model)
            .map_or(children.len(), |index| index.min(children.len()));
        self.document.insert(self.anchor, child.node(), index);
        child.render();
        children.insert(index, child);
    }

    fn drop_child(&self, model: &Model<Mailbox>) {
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

    pub fn children(&self) -> Vec<Rc<MailboxesListElement>> {
        self.children.borrow().clone()
    }
}

impl View for MailboxesList {
    fn node(&self) -> NodeId {
        self.anchor
    }

    fn render(&self) {
        detach_all(&self.children);
        self.document.set_content(self.anchor, fragment([]));
        for model in self.collection.models() {
            model.set_editing(false);
            self.add_one(&model);
        }
        debug!("rendered {} mailboxes", self.collection.len());
    }

    fn detach(&self) {
        detach_all(&self.children);
        self.subscriptions.release();
    }
}

/// Toolbar with the add-mailbox button
pub struct MailboxesListNew {
    document: Document,
    anchor: NodeId,
    collection: Collection<Mailbox>,
    subscriptions: Subscriptions,
}

impl MailboxesListNew {
    pub fn new(document: &Document, anchor: NodeId, collection: Collection<Mailbox>) -> Rc<Self> {
        let view = Rc::new(Self {
            document: document.clone(),
            anchor,
            collection,
            subscriptions: Subscriptions::default(),
        });
        view.subscriptions
            .click(document, anchor, "#add_mailbox", &view, |view, _, _| {
                view.add_mailbox();
            });
        view
    }

    /// Add a transient mailbox with default fields, opened for editing
    pub fn add_mailbox(&self) -> Model<Mailbox> {
        let mailbox: Model<Mailbox> = Model::new();
        mailbox.set_editing(true);
        self.collection.add(mailbox.clone());
        debug!("added mailbox {}", mailbox.cid());
        mailbox
    }
}

impl View for MailboxesListNew {
    fn node(&self) -> NodeId {
        self.anchor
    }

    fn render(&self) {
        self.document.set_content(self.anchor, templates::mailbox_new());
    }

    fn detach(&self) {
        self.subscriptions.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mail::{Backend, EventLoop, InMemoryTransport};
    use serde_json::{Value, json};

    struct Fixture {
        transport: Rc<InMemoryTransport>,
        event_loop: EventLoop,
        mailboxes: Collection<Mailbox>,
        document: Document,
        anchor: NodeId,
    }

    fn fields(value: Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    fn fixture(seed: Vec<Attributes>) -> Fixture {
        let transport = Rc::new(InMemoryTransport::new());
        transport.seed("mailboxes/", seed);
        let event_loop = EventLoop::new();
        let mailboxes = Collection::new(Backend::new(transport.clone(), event_loop.clone()));
        let document = Document::new();
        let anchor = document.create_element("div", "");
        document.append(document.root(), anchor);
        Fixture {
            transport,
            event_loop,
            mailboxes,
            document,
            anchor,
        }
    }

    fn click_in(document: &Document, scope: NodeId, selector: &str) -> usize {
        let target = document.query(scope, selector).unwrap();
        document.click(target)
    }

    #[test]
    fn test_list_renders_sorted_after_fetch() {
        let f = fixture(vec![
            fields(json!({"name": "B"})),
            fields(json!({"name": "A"})),
        ]);
        let list = MailboxesList::new(&f.document, f.anchor, f.mailboxes.clone());
        f.event_loop.run_until_idle();

        let html = f.document.inner_html(f.anchor);
        let a = html.find("<strong>A</strong>").unwrap();
        let b = html.find("<strong>B</strong>").unwrap();
        assert!(a < b);
        assert_eq!(list.children().len(), 2);
    }

    #[test]
    fn test_add_inserts_card_in_name_order() {
        let f = fixture(vec![
            fields(json!({"name": "A"})),
            fields(json!({"name": "C"})),
        ]);
        let list = MailboxesList::new(&f.document, f.anchor, f.mailboxes.clone());
        f.event_loop.run_until_idle();
        let before = f.document.children(f.anchor);
        let card_content = f.document.children(before[0]);

        let mailbox: Model<Mailbox> = Model::new();
        mailbox.set_field("name", "B");
        assert!(f.mailboxes.add(mailbox.clone()));

        let after = f.document.children(f.anchor);
        assert_eq!(after.len(), 3);
        assert_eq!(after[0], before[0]);
        assert_eq!(after[2], before[1]);
        assert_eq!(f.document.children(before[0]), card_content);
        assert!(f.document.text_content(after[1]).contains("B"));
        assert!(list.children()[1].model().ptr_eq(&mailbox));
    }

    #[test]
    fn test_render_is_idempotent() {
        let f = fixture(vec![fields(json!({"name": "Work"}))]);
        let list = MailboxesList::new(&f.document, f.anchor, f.mailboxes.clone());
        f.event_loop.run_until_idle();

        list.render();
        let first = f.document.inner_html(f.anchor);
        list.render();
        assert_eq!(first, f.document.inner_html(f.anchor));
    }

    #[test]
    fn test_set_renders_new_name() {
        let f = fixture(Vec::new());
        let list = MailboxesList::new(&f.document, f.anchor, f.mailboxes.clone());
        f.event_loop.run_until_idle();

        let mailbox: Model<Mailbox> = Model::new();
        f.mailboxes.add(mailbox.clone());
        let changes = Rc::new(Cell::new(0));
        let counter = changes.clone();
        mailbox.subscribe(move |event| {
            if matches!(event, ModelEvent::Change { .. }) {
                counter.set(counter.get() + 1);
            }
        });

        mailbox.set_field("name", "Work");

        assert_eq!(changes.get(), 1);
        let html = f.document.inner_html(list.node());
        assert!(html.contains("<strong>Work</strong>"));
        assert!(!html.contains("<strong>Mailbox</strong>"));
    }

    #[test]
    fn test_edit_and_cancel() {
        let f = fixture(vec![fields(json!({"name": "Work"}))]);
        let list = MailboxesList::new(&f.document, f.anchor, f.mailboxes.clone());
        f.event_loop.run_until_idle();
        let element = list.children()[0].node();

        assert_eq!(click_in(&f.document, element, ".edit_mailbox"), 1);
        assert_eq!(f.document.query_all(element, "input.content").len(), 9);

        click_in(&f.document, element, ".cancel_edit_mailbox");
        assert!(f.document.query(element, "input").is_none());
        assert!(f.document.text_content(element).contains("Work"));
    }

    #[test]
    fn test_save_form_persists_typed_fields() {
        let f = fixture(vec![fields(json!({"name": "Work"}))]);
        let list = MailboxesList::new(&f.document, f.anchor, f.mailboxes.clone());
        f.event_loop.run_until_idle();
        let element = list.children()[0].node();
        click_in(&f.document, element, ".edit_mailbox");

        let name = f.document.query(element, "#name").unwrap();
        let port = f.document.query(element, "#IMAP_port").unwrap();
        f.document.set_value(name, "Office");
        f.document.set_value(port, "143");
        click_in(&f.document, element, ".save_mailbox");
        f.event_loop.run_until_idle();

        let stored = &f.transport.records("mailboxes/")[0];
        assert_eq!(stored.get("name"), Some(&json!("Office")));
        assert_eq!(stored.get("IMAP_port"), Some(&json!(143)));

        let html = f.document.inner_html(f.anchor);
        assert!(html.contains("<strong>Office</strong>"));
        assert!(!html.contains("save_mailbox"));
    }

    #[test]
    fn test_delete_removes_element_once() {
        let f = fixture(vec![fields(json!({"name": "Old"}))]);
        let list = MailboxesList::new(&f.document, f.anchor, f.mailboxes.clone());
        f.event_loop.run_until_idle();
        let child = list.children()[0].clone();
        let node = child.node();

        click_in(&f.document, node, ".delete_mailbox");
        assert!(f.document.is_live(node));
        assert!(f.document.has_class(f.document.query(node, ".disabled").unwrap(), "btn-danger"));

        f.event_loop.run_until_idle();
        assert!(!f.document.is_live(node));
        assert!(child.is_detached());
        assert!(list.children().is_empty());
        assert!(f.transport.records("mailboxes/").is_empty());

        // The view is gone for good: removing again is a no-op.
        assert!(!f.document.remove(node));
        assert!(child.model().events().is_empty());
    }

    #[test]
    fn test_detached_toolbar_ignores_clicks() {
        let f = fixture(Vec::new());
        let new = MailboxesListNew::new(&f.document, f.anchor, f.mailboxes.clone());
        new.render();
        assert_eq!(f.document.bindings_on(f.anchor), 1);

        new.detach();
        assert_eq!(f.document.bindings_on(f.anchor), 0);
        assert_eq!(click_in(&f.document, f.anchor, "#add_mailbox"), 0);
        assert!(f.mailboxes.is_empty());
    }

    #[test]
    fn test_add_mailbox_opens_edit_form() {
        let f = fixture(Vec::new());
        let list = MailboxesList::new(&f.document, f.anchor, f.mailboxes.clone());
        f.event_loop.run_until_idle();

        let toolbar = f.document.create_element("div", "");
        f.document.append(f.document.root(), toolbar);
        let new = MailboxesListNew::new(&f.document, toolbar, f.mailboxes.clone());
        new.render();

        assert_eq!(click_in(&f.document, toolbar, "#add_mailbox"), 1);
        assert_eq!(f.mailboxes.len(), 1);
        let element = list.children()[0].node();
        assert!(f.document.query(element, ".save_mailbox").is_some());
        assert_eq!(
            f.document
                .value(f.document.query(element, "#name").unwrap())
                .as_deref(),
            Some("Mailbox")
        );
    }

    #[test]
    fn test_new_mailbox_saved_through_form() {
        let f = fixture(Vec::new());
        let list = MailboxesList::new(&f.document, f.anchor, f.mailboxes.clone());
        f.event_loop.run_until_idle();
        let new = MailboxesListNew::new(&f.document, f.anchor, f.mailboxes.clone());
        let mailbox = new.add_mailbox();

        let element = list.children()[0].node();
        let name = f.document.query(element, "#name").unwrap();
        f.document.set_value(name, "Work");
        click_in(&f.document, element, ".save_mailbox");
        f.event_loop.run_until_idle();

        assert!(!mailbox.is_new());
        assert!(!mailbox.is_editing());
        assert_eq!(f.transport.records("mailboxes/").len(), 1);
        assert!(f.document.inner_html(f.anchor).contains("<strong>Work</strong>"));
    }
}
