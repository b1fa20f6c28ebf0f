//! Application root
//!
//! Owns the event loop, both entity sets, the document, the router and the
//! root view. Everything is built from the transport handed to
//! [`App::new`].

use log::{info, warn};
use mail::{Backend, Collection, CollectionEvent, EventLoop, Mail, Mailbox, Transport};
use std::rc::Rc;

use crate::dom::Document;
use crate::router::{NotFoundError, Route, Router, RouterEvent};
use crate::views::{AppView, Layout};

fn layout_for(route: Route) -> Layout {
    match route {
        Route::Home => Layout::Mails,
        Route::ConfigMailboxes => Layout::Mailboxes,
    }
}

pub struct App {
    event_loop: EventLoop,
    mails: Collection<Mail>,
    mailboxes: Collection<Mailbox>,
    document: Document,
    router: Rc<Router>,
    view: Rc<AppView>,
}

impl App {
    /// Wire the application and queue the initial mailbox fetch
    pub fn new(transport: Rc<dyn Transport>) -> Self {
        let event_loop = EventLoop::new();
        let backend = Backend::new(transport, event_loop.clone());
        let mails = Collection::new(backend.clone());
        let mailboxes = Collection::new(backend);
        let document = Document::new();
        let router = Rc::new(Router::new());
        let view = AppView::new(&document, mails.clone(), mailboxes.clone());

        let weak_view = Rc::downgrade(&view);
        router.subscribe(move |event| {
            let RouterEvent::Navigated { route, .. } = event;
            if let Some(view) = weak_view.upgrade() {
                view.show(layout_for(*route));
            }
        });

        // Mirror the active mail into the location without re-routing.
        let weak_router = Rc::downgrade(&router);
        mails.subscribe(move |event| {
            if let CollectionEvent::ActiveChanged {
                current: Some(mail),
                ..
            } = event
                && let (Some(router), Some(id)) = (weak_router.upgrade(), mail.id())
                && let Err(err) = router.navigate(&format!("mail:{id}"), false)
            {
                warn!("could not record the active mail: {err}");
            }
        });

        mailboxes.fetch();

        Self {
            event_loop,
            mails,
            mailboxes,
            document,
            router,
            view,
        }
    }

    /// Initial navigation. Unknown fragments show the mail layout.
    pub fn start(&self, fragment: &str) -> Route {
        info!("starting at #{}", fragment.trim_start_matches('#'));
        self.navigate(fragment)
    }

    /// Initial navigation that refuses unknown fragments
    pub fn start_strict(&self, fragment: &str) -> Result<Route, NotFoundError> {
        Route::parse(fragment)?;
        Ok(self.start(fragment))
    }

    /// Route to `fragment`, falling back to the mail layout
    pub fn navigate(&self, fragment: &str) -> Route {
        match self.router.navigate(fragment, true) {
            Ok(route) => route.unwrap_or(Route::Home),
            Err(err) => {
                warn!("{err}, showing the mail layout");
                if let Err(err) = self.router.navigate(Route::Home.fragment(), true) {
                    warn!("mail layout unreachable: {err}");
                    self.view.show(layout_for(Route::Home));
                }
                Route::Home
            }
        }
    }

    /// Complete every queued transport request, and those they queue
    pub fn run_until_idle(&self) -> usize {
        self.event_loop.run_until_idle()
    }

    pub fn mails(&self) -> &Collection<Mail> {
        &self.mails
    }

    pub fn mailboxes(&self) -> &Collection<Mailbox> {
        &self.mailboxes
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn view(&self) -> &AppView {
        &self.view
    }

    /// Markup of the whole page, `body` element included
    pub fn html(&self) -> String {
        self.document.outer_html(self.document.root())
    }
}
