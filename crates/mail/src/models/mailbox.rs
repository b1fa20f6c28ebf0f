//! Mailbox kind: a configured IMAP/SMTP account
//!
//! A mailbox stores everything needed to reach the IMAP and SMTP servers
//! plus the client-side flags the menu uses (`checked`, `new_messages`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Attributes, Resource, value_count, value_text, value_truthy};
use crate::model::Model;

/// Marker for mailbox entities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mailbox;

impl Mailbox {
    pub const CHECKED: &'static str = "checked";
    pub const CONFIG: &'static str = "config";
    pub const NAME_FIELD: &'static str = "name";
    pub const LOGIN: &'static str = "login";
    pub const PASS: &'static str = "pass";
    pub const SMTP_SERVER: &'static str = "SMTP_server";
    pub const SMTP_SSL: &'static str = "SMTP_ssl";
    pub const SMTP_SEND_AS: &'static str = "SMTP_send_as";
    pub const IMAP_SERVER: &'static str = "IMAP_server";
    pub const IMAP_PORT: &'static str = "IMAP_port";
    pub const IMAP_SECURE: &'static str = "IMAP_secure";
    /// Unread count maintained by the server
    pub const NEW_MESSAGES: &'static str = "new_messages";

    /// Fields shown in the edit form, in display order
    pub const EDITABLE: [&'static str; 9] = [
        Self::NAME_FIELD,
        Self::LOGIN,
        Self::PASS,
        Self::SMTP_SERVER,
        Self::SMTP_SSL,
        Self::SMTP_SEND_AS,
        Self::IMAP_SERVER,
        Self::IMAP_PORT,
        Self::IMAP_SECURE,
    ];
}

/// Typed form of the mailbox field set, named as on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailboxFields {
    pub checked: bool,
    pub config: i64,
    pub name: String,
    pub login: String,
    pub pass: String,
    #[serde(rename = "SMTP_server")]
    pub smtp_server: String,
    #[serde(rename = "SMTP_ssl")]
    pub smtp_ssl: bool,
    #[serde(rename = "SMTP_send_as")]
    pub smtp_send_as: String,
    #[serde(rename = "IMAP_server")]
    pub imap_server: String,
    #[serde(rename = "IMAP_port")]
    pub imap_port: u16,
    #[serde(rename = "IMAP_secure")]
    pub imap_secure: bool,
}

impl Default for MailboxFields {
    fn default() -> Self {
        Self {
            checked: true,
            config: 0,
            name: "Mailbox".to_string(),
            login: "login".to_string(),
            pass: "pass".to_string(),
            smtp_server: "smtp.gmail.com".to_string(),
            smtp_ssl: true,
            smtp_send_as: "Adam Smith".to_string(),
            imap_server: "imap.gmail.com".to_string(),
            imap_port: 993,
            imap_secure: true,
        }
    }
}

impl MailboxFields {
    /// Flatten into the wire field map
    pub fn to_attributes(&self) -> Attributes {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Attributes::new(),
        }
    }
}

impl Resource for Mailbox {
    const NAME: &'static str = "mailbox";
    const ENDPOINT: &'static str = "mailboxes/";
    const SORT_FIELD: &'static str = Mailbox::NAME_FIELD;

    fn defaults() -> Attributes {
        MailboxFields::default().to_attributes()
    }
}

impl Model<Mailbox> {
    pub fn name(&self) -> String {
        value_text(self.get(Mailbox::NAME_FIELD).as_ref())
    }

    pub fn login(&self) -> String {
        value_text(self.get(Mailbox::LOGIN).as_ref())
    }

    /// Whether the mailbox is ticked in the menu
    pub fn is_checked(&self) -> bool {
        value_truthy(self.get(Mailbox::CHECKED).as_ref())
    }

    /// Unread count reported by the server, 0 when absent
    pub fn new_messages(&self) -> u64 {
        value_count(self.get(Mailbox::NEW_MESSAGES).as_ref())
    }
}
