//! Sidebar mailbox list with the per-mailbox display toggle

use log::{debug, warn};
use mail::{Attributes, Collection, CollectionEvent, EntityId, Mailbox, Model};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{Subscriptions, View};
use crate::dom::{ClickEvent, Document, NodeId, fragment};
use crate::templates;

/// One sidebar entry
pub struct MenuMailboxListElement {
    document: Document,
    node: NodeId,
    model: Model<Mailbox>,
}

impl MenuMailboxListElement {
    pub fn new(document: &Document, model: Model<Mailbox>) -> Rc<Self> {
        Rc::new(Self {
            document: document.clone(),
            node: document.create_element("li", ""),
            model,
        })
    }
}

impl View for MenuMailboxListElement {
    fn node(&self) -> NodeId {
        self.node
    }

    fn render(&self) {
        self.document
            .set_content(self.node, templates::mailbox_menu(&self.model.to_json()));
    }
}

/// Sidebar list of mailboxes
pub struct MenuMailboxesList {
    document: Document,
    anchor: NodeId,
    collection: Collection<Mailbox>,
    children: RefCell<Vec<Rc<MenuMailboxListElement>>>,
    total_unread: Cell<u64>,
    subscriptions: Subscriptions,
}

impl MenuMailboxesList {
    pub fn new(document: &Document, anchor: NodeId, collection: Collection<Mailbox>) -> Rc<Self> {
        let view = Rc::new(Self {
            document: document.clone(),
            anchor,
            collection,
            children: RefCell::new(Vec::new()),
            total_unread: Cell::new(0),
            subscriptions: Subscriptions::default(),
        });

        let weak = Rc::downgrade(&view);
        let id = view.collection.subscribe(move |event| {
            let Some(view) = weak.upgrade() else {
                return;
            };
            if matches!(
                event,
                CollectionEvent::Reset
                    | CollectionEvent::Add(_)
                    | CollectionEvent::Remove(_)
                    | CollectionEvent::Change { .. }
            ) {
                view.render();
            }
        });
        view.subscriptions.collection(&view.collection, id);

        view.subscriptions.click(
            document,
            anchor,
            ".change_mailboxes_list",
            &view,
            |view, document, event| view.toggle(document, event),
        );
        view
    }

    /// Sum of the unread counts over every mailbox, as of the last render
    pub fn total_unread(&self) -> u64 {
        self.total_unread.get()
    }

    pub fn children(&self) -> Vec<Rc<MenuMailboxListElement>> {
        self.children.borrow().clone()
    }

    /// Flip the display flag of the mailbox the click belongs to
    fn toggle(&self, document: &Document, event: &ClickEvent) {
        let Some(id) = document.attr(event.current, "mailbox_id") else {
            return;
        };
        let Some(mailbox) = self.collection.get(&EntityId::new(id.clone())) else {
            warn!("menu toggle for unknown mailbox {id}");
            return;
        };

        let checked = !mailbox.is_checked();
        debug!("mailbox {id} checked: {checked}");
        let mut fields = Attributes::new();
        fields.insert(Mailbox::CHECKED.to_string(), Value::Bool(checked));
        mailbox.save(fields);
        self.collection.notify_active_mailboxes_changed();
    }
}

impl View for MenuMailboxesList {
    fn node(&self) -> NodeId {
        self.anchor
    }

    fn render(&self) {
        self.document.set_content(self.anchor, fragment([]));
        let mut total = 0;
        let mut children = Vec::with_capacity(self.collection.len());
        for model in self.collection.models() {
            total += model.new_messages();
            let child = MenuMailboxListElement::new(&self.document, model);
            self.document.append(self.anchor, child.node());
            child.render();
            children.push(child);
        }
        self.total_unread.set(total);
        *self.children.borrow_mut() = children;
    }

    fn detach(&self) {
        self.children.take();
        self.subscriptions.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mail::{Backend, EventLoop, InMemoryTransport};
    use serde_json::json;

    struct Fixture {
        transport: Rc<InMemoryTransport>,
        event_loop: EventLoop,
        mailboxes: Collection<Mailbox>,
        document: Document,
        menu: Rc<MenuMailboxesList>,
    }

    fn fixture() -> Fixture {
        let transport = Rc::new(InMemoryTransport::new());
        transport.seed(
            "mailboxes/",
            vec![
                json!({"name": "Work", "checked": true, "new_messages": 3}),
                json!({"name": "Home", "checked": false, "new_messages": 1}),
            ]
            .into_iter()
            .filter_map(|v| v.as_object().cloned()),
        );
        let event_loop = EventLoop::new();
        let mailboxes = Collection::new(Backend::new(transport.clone(), event_loop.clone()));
        let document = Document::new();
        let anchor = document.create_element("ul", "");
        document.append(document.root(), anchor);
        let menu = MenuMailboxesList::new(&document, anchor, mailboxes.clone());
        mailboxes.fetch();
        event_loop.run_until_idle();
        Fixture {
            transport,
            event_loop,
            mailboxes,
            document,
            menu,
        }
    }

    #[test]
    fn test_renders_entries_and_unread_total() {
        let f = fixture();
        let items = f.document.query_all(f.menu.node(), "li");
        assert_eq!(items.len(), 2);
        assert_eq!(f.menu.children().len(), 2);
        assert_eq!(f.menu.total_unread(), 4);

        // Sorted by name: Home first, unchecked.
        let html = f.document.inner_html(f.menu.node());
        assert!(html.find(" Home").unwrap() < html.find(" Work").unwrap());
        assert_eq!(html.matches("checked=\"checked\"").count(), 1);
    }

    #[test]
    fn test_toggle_saves_inverted_flag() {
        let f = fixture();
        let notified = Rc::new(Cell::new(0));
        let counter = notified.clone();
        f.mailboxes.subscribe(move |event| {
            if matches!(event, CollectionEvent::ActiveMailboxesChanged) {
                counter.set(counter.get() + 1);
            }
        });

        let checkbox = f.document.query(f.menu.node(), "input").unwrap();
        assert_eq!(f.document.click(checkbox), 1);
        f.event_loop.run_until_idle();

        assert_eq!(notified.get(), 1);
        let home = f
            .transport
            .records("mailboxes/")
            .into_iter()
            .find(|r| r.get("name") == Some(&json!("Home")))
            .unwrap();
        assert_eq!(home.get("checked"), Some(&json!(true)));
        assert_eq!(
            f.document.inner_html(f.menu.node()).matches("checked=\"checked\"").count(),
            2
        );
    }

    #[test]
    fn test_rerenders_on_add_and_change() {
        let f = fixture();
        let mailbox: Model<Mailbox> = Model::new();
        f.mailboxes.add(mailbox.clone());
        assert_eq!(f.document.query_all(f.menu.node(), "li").len(), 3);

        mailbox.set_field("new_messages", 2);
        assert_eq!(f.menu.total_unread(), 6);
        assert!(f.document.inner_html(f.menu.node()).contains(">2</span>"));
    }

    #[test]
    fn test_render_is_idempotent() {
        let f = fixture();
        f.menu.render();
        let first = f.document.inner_html(f.menu.node());
        f.menu.render();
        assert_eq!(first, f.document.inner_html(f.menu.node()));
    }
}
