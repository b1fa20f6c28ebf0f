//! Mail kind: a message fetched from the backend

use chrono::{DateTime, Utc};

use super::{Resource, value_text};
use crate::model::Model;

/// Marker for mail entities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mail;

impl Mail {
    pub const FROM: &'static str = "from";
    pub const DATE: &'static str = "date";
    pub const SUBJECT: &'static str = "subject";
    pub const HTML: &'static str = "html";
}

impl Resource for Mail {
    const NAME: &'static str = "mail";
    const ENDPOINT: &'static str = "mails/";
    const SORT_FIELD: &'static str = Mail::DATE;
}

impl Model<Mail> {
    pub fn from_header(&self) -> String {
        value_text(self.get(Mail::FROM).as_ref())
    }

    pub fn subject(&self) -> String {
        value_text(self.get(Mail::SUBJECT).as_ref())
    }

    pub fn html(&self) -> String {
        value_text(self.get(Mail::HTML).as_ref())
    }

    /// Raw date string as sent by the backend
    pub fn date_text(&self) -> String {
        value_text(self.get(Mail::DATE).as_ref())
    }
}

/// Parse an RFC 3339 timestamp into UTC
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Attributes;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_mail_has_no_defaults() {
        assert!(Mail::defaults().is_empty());
        let mail: Model<Mail> = Model::new();
        assert_eq!(mail.subject(), "");
        assert!(parse_date(&mail.date_text()).is_none());
    }

    #[test]
    fn test_accessors() {
        let mail: Model<Mail> = Model::hydrate(record(json!({
            "id": "m1",
            "from": "Ada <ada@example.com>",
            "date": "2012-06-01T10:30:00Z",
            "subject": "Hello",
            "html": "<p>Hi</p>"
        })));

        assert_eq!(mail.from_header(), "Ada <ada@example.com>");
        assert_eq!(mail.subject(), "Hello");
        assert_eq!(
            parse_date(&mail.date_text()).unwrap().to_rfc3339(),
            "2012-06-01T10:30:00+00:00"
        );
        assert_eq!(mail.html(), "<p>Hi</p>");
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert!(parse_date("yesterday").is_none());
        assert!(parse_date("2012-06-01T10:30:00+02:00").is_some());
    }
}
