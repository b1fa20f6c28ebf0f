//! Root view: page skeleton, error banner, sidebar and content layouts

use log::{debug, warn};
use mail::{Collection, CollectionEvent, Mail, Mailbox};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{
    MailboxesList, MailboxesListNew, MailsColumn, MailsElement, MenuMailboxesList, Subscriptions,
    View, detach_all,
};
use crate::dom::{Document, NodeId};
use crate::templates;

/// What the content column shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Mail list and the active mail
    Mails,
    /// Mailbox configuration
    Mailboxes,
}

pub struct AppView {
    document: Document,
    mails: Collection<Mail>,
    mailboxes: Collection<Mailbox>,
    errors: RefCell<Vec<String>>,
    layout: Cell<Option<Layout>>,
    menu: RefCell<Option<Rc<MenuMailboxesList>>>,
    content: RefCell<Vec<Rc<dyn View>>>,
    subscriptions: Subscriptions,
}

impl AppView {
    pub fn new(
        document: &Document,
        mails: Collection<Mail>,
        mailboxes: Collection<Mailbox>,
    ) -> Rc<Self> {
        let view = Rc::new(Self {
            document: document.clone(),
            mails,
            mailboxes,
            errors: RefCell::new(Vec::new()),
            layout: Cell::new(None),
            menu: RefCell::new(None),
            content: RefCell::new(Vec::new()),
            subscriptions: Subscriptions::default(),
        });

        let weak = Rc::downgrade(&view);
        let id = view.mails.subscribe(move |event| {
            if let (Some(view), CollectionEvent::Error(err)) = (weak.upgrade(), event) {
                view.report(err.to_string());
            }
        });
        view.subscriptions.collection(&view.mails, id);

        let weak = Rc::downgrade(&view);
        let id = view.mailboxes.subscribe(move |event| {
            if let (Some(view), CollectionEvent::Error(err)) = (weak.upgrade(), event) {
                view.report(err.to_string());
            }
        });
        view.subscriptions.collection(&view.mailboxes, id);

        view.subscriptions
            .click(document, document.root(), ".close_alert", &view, |view, _, _| {
                view.dismiss_errors()
            });
        view
    }

    /// Render the skeleton, then fill the content column with `layout`
    pub fn show(&self, layout: Layout) {
        self.render();
        let Some(content) = self.document.find_by_id("content") else {
            return;
        };

        let views: Vec<Rc<dyn View>> = match layout {
            Layout::Mails => {
                self.document.set_content(content, templates::layout_mails());
                let mut views: Vec<Rc<dyn View>> = Vec::new();
                if let Some(column) = self.document.find_by_id("column_mails_list") {
                    views.push(MailsColumn::new(&self.document, column, self.mails.clone()));
                }
                if let Some(detail) = self.document.find_by_id("column_mail") {
                    views.push(MailsElement::new(&self.document, detail, self.mails.clone()));
                }
                views
            }
            Layout::Mailboxes => {
                self.document
                    .set_content(content, templates::layout_mailboxes());
                let mut views: Vec<Rc<dyn View>> = Vec::new();
                if let Some(list) = self.document.find_by_id("mail_list_container") {
                    views.push(MailboxesList::new(&self.document, list, self.mailboxes.clone()));
                }
                if let Some(button) = self.document.find_by_id("add_mail_button_container") {
                    views.push(MailboxesListNew::new(
                        &self.document,
                        button,
                        self.mailboxes.clone(),
                    ));
                }
                views
            }
        };

        for view in &views {
            view.render();
        }
        *self.content.borrow_mut() = views;
        self.layout.set(Some(layout));
        debug!("showing {:?} layout", layout);
    }

    pub fn layout(&self) -> Option<Layout> {
        self.layout.get()
    }

    /// Failure messages currently in the banner
    pub fn errors(&self) -> Vec<String> {
        self.errors.borrow().clone()
    }

    fn report(&self, message: String) {
        warn!("{message}");
        self.errors.borrow_mut().push(message);
        self.render_errors();
    }

    pub fn dismiss_errors(&self) {
        self.errors.borrow_mut().clear();
        self.render_errors();
    }

    fn render_errors(&self) {
        if let Some(alerts) = self.document.find_by_id("alerts") {
            let banner = templates::error_banner(&self.errors.borrow());
            self.document.set_content(alerts, banner);
        }
    }

    fn render_menu(&self) {
        let Some(container) = self.document.find_by_id("menu_container") else {
            return;
        };
        self.document.set_content(container, templates::menu());
        if let Some(anchor) = self.document.find_by_id("menu_mailboxes") {
            let menu = MenuMailboxesList::new(&self.document, anchor, self.mailboxes.clone());
            menu.render();
            *self.menu.borrow_mut() = Some(menu);
        }
    }

    fn release_children(&self) {
        if let Some(menu) = self.menu.take() {
            menu.detach();
        }
        detach_all(&self.content);
    }
}

impl View for AppView {
    fn node(&self) -> NodeId {
        self.document.root()
    }

    fn render(&self) {
        self.release_children();
        self.document.set_content(self.node(), templates::app());
        self.render_errors();
        self.render_menu();
    }

    fn detach(&self) {
        self.release_children();
        self.subscriptions.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mail::{Attributes, Backend, EventLoop, InMemoryTransport, TransportError};
    use serde_json::json;

    struct Fixture {
        transport: Rc<InMemoryTransport>,
        event_loop: EventLoop,
        mails: Collection<Mail>,
        mailboxes: Collection<Mailbox>,
        document: Document,
        view: Rc<AppView>,
    }

    fn record(value: serde_json::Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    fn fixture() -> Fixture {
        let transport = Rc::new(InMemoryTransport::new());
        transport.seed("mailboxes/", vec![record(json!({"name": "Work"}))]);
        transport.seed(
            "mails/",
            vec![record(json!({"from": "Ada", "subject": "Hello", "date": "2012-06-01T10:00:00Z"}))],
        );
        let event_loop = EventLoop::new();
        let backend = Backend::new(transport.clone(), event_loop.clone());
        let mails = Collection::new(backend.clone());
        let mailboxes = Collection::new(backend);
        let document = Document::new();
        let view = AppView::new(&document, mails.clone(), mailboxes.clone());
        mailboxes.fetch();
        event_loop.run_until_idle();
        Fixture {
            transport,
            event_loop,
            mails,
            mailboxes,
            document,
            view,
        }
    }

    #[test]
    fn test_show_mails_layout() {
        let f = fixture();
        f.view.show(Layout::Mails);
        f.event_loop.run_until_idle();

        assert_eq!(f.view.layout(), Some(Layout::Mails));
        let root = f.document.root();
        assert!(f.document.find_by_id("menu_mailboxes").is_some());
        assert!(f.document.text_content(root).contains(" Work"));
        assert_eq!(f.document.query_all(root, "tr").len(), 1);
        assert!(f.document.find_by_id("column_mail").is_some());
    }

    #[test]
    fn test_show_is_idempotent() {
        let f = fixture();
        f.view.show(Layout::Mailboxes);
        f.event_loop.run_until_idle();
        let first = f.document.inner_html(f.document.root());
        let listeners = f.mailboxes.events().len();

        f.view.show(Layout::Mailboxes);
        f.event_loop.run_until_idle();

        assert_eq!(first, f.document.inner_html(f.document.root()));
        assert_eq!(f.mailboxes.events().len(), listeners);
        assert!(first.contains("add_mailbox"));
    }

    #[test]
    fn test_error_banner_and_dismiss() {
        let f = fixture();
        f.view.show(Layout::Mails);
        f.event_loop.run_until_idle();

        f.transport.fail_next(TransportError::Status { code: 500 });
        f.mails.fetch();
        f.event_loop.run_until_idle();

        assert_eq!(f.view.errors(), vec!["server responded with status 500"]);
        let alerts = f.document.find_by_id("alerts").unwrap();
        assert!(f.document.text_content(alerts).contains("status 500"));
        // Local state survives the failed refetch.
        assert_eq!(f.mails.len(), 1);

        let close = f.document.query(alerts, ".close_alert").unwrap();
        assert_eq!(f.document.click(close), 1);
        assert!(f.view.errors().is_empty());
        assert_eq!(f.document.inner_html(alerts), "");
    }

    #[test]
    fn test_errors_survive_rerender() {
        let f = fixture();
        f.view.show(Layout::Mails);
        f.transport.fail_next(TransportError::Network("refused".to_string()));
        f.event_loop.run_until_idle();

        f.view.show(Layout::Mailboxes);
        let alerts = f.document.find_by_id("alerts").unwrap();
        assert!(f.document.text_content(alerts).contains("refused"));
    }
}
