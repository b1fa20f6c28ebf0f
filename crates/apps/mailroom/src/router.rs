//! URL fragment router
//!
//! Maps fragments to routes and remembers every fragment navigated to.
//! Navigating with `trigger` set notifies subscribers; without it the
//! fragment is only recorded, which is how the active mail is mirrored
//! into the location.

use log::{debug, info};
use mail::{Emitter, SubscriptionId};
use std::cell::RefCell;
use std::fmt;

/// Pages reachable by fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Mail list and detail
    Home,
    /// Mailbox configuration
    ConfigMailboxes,
}

impl Route {
    pub fn fragment(self) -> &'static str {
        match self {
            Route::Home => "",
            Route::ConfigMailboxes => "config-mailboxes",
        }
    }

    /// Match a fragment, with or without its leading `#`
    pub fn parse(fragment: &str) -> Result<Route, NotFoundError> {
        match strip_hash(fragment) {
            "" => Ok(Route::Home),
            "config-mailboxes" => Ok(Route::ConfigMailboxes),
            other => Err(NotFoundError {
                fragment: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.fragment())
    }
}

/// No route matches the fragment
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no route matches fragment {fragment:?}")]
pub struct NotFoundError {
    pub fragment: String,
}

/// Emitted when a triggered navigation matched a route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterEvent {
    Navigated { route: Route, fragment: String },
}

fn strip_hash(fragment: &str) -> &str {
    fragment.strip_prefix('#').unwrap_or(fragment)
}

#[derive(Default)]
pub struct Router {
    fragment: RefCell<String>,
    history: RefCell<Vec<String>>,
    events: Emitter<RouterEvent>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `fragment` as the current location.
    ///
    /// With `trigger` set the fragment must match a route, and the match
    /// is emitted. Without it any fragment is accepted and nothing is
    /// emitted.
    pub fn navigate(&self, fragment: &str, trigger: bool) -> Result<Option<Route>, NotFoundError> {
        let fragment = strip_hash(fragment).to_string();
        let route = Route::parse(&fragment);

        *self.fragment.borrow_mut() = fragment.clone();
        self.history.borrow_mut().push(fragment.clone());

        if !trigger {
            debug!("location set to #{fragment}");
            return Ok(route.ok());
        }

        let route = route?;
        info!("navigating to {route}");
        self.events
            .emit(&RouterEvent::Navigated { route, fragment });
        Ok(Some(route))
    }

    /// Current fragment, without the leading `#`
    pub fn fragment(&self) -> String {
        self.fragment.borrow().clone()
    }

    /// Every fragment navigated to, oldest first
    pub fn history(&self) -> Vec<String> {
        self.history.borrow().clone()
    }

    pub fn subscribe(&self, handler: impl Fn(&RouterEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(handler)
    }
}
