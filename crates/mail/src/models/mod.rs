//! Entity kinds and the field-map representation they share
//!
//! A kind is a zero-sized marker implementing [`Resource`]: it names the
//! REST endpoint, the comparator field and the default field set. The
//! entity itself is always a [`Model`](crate::Model) over a flat
//! [`Attributes`] map, which is also the wire format.

mod mail;
mod mailbox;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

pub use mail::{Mail, parse_date};
pub use mailbox::{Mailbox, MailboxFields};

/// Flat mapping from field name to value
pub type Attributes = serde_json::Map<String, Value>;

/// Identifier assigned by the transport when an entity is first persisted
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read an identifier out of a JSON value. Servers send either
    /// strings or integers; anything else is not an identifier.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Static description of an entity kind
pub trait Resource: 'static {
    /// Name used in logs and task labels
    const NAME: &'static str;
    /// Endpoint of the list resource, with trailing slash
    const ENDPOINT: &'static str;
    /// Field the entity set sorts by
    const SORT_FIELD: &'static str;

    /// Fields a client-created entity starts with
    fn defaults() -> Attributes {
        Attributes::new()
    }

    /// Convert raw form input into a field value, using the type of the
    /// field's default when there is one.
    fn coerce(field: &str, raw: &str) -> Value {
        coerce_like(Self::defaults().get(field), raw)
    }
}

/// Convert `raw` to the JSON type of `template`, keeping the string when
/// it does not parse.
pub fn coerce_like(template: Option<&Value>, raw: &str) -> Value {
    let trimmed = raw.trim();
    match template {
        Some(Value::Bool(_)) => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "on" | "yes" | "checked" | "1" => Value::Bool(true),
            "false" | "off" | "no" | "" | "0" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        Some(Value::Number(_)) => {
            if let Ok(n) = trimmed.parse::<i64>() {
                Value::from(n)
            } else if let Some(n) = trimmed
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
            {
                Value::Number(n)
            } else {
                Value::String(raw.to_string())
            }
        }
        _ => Value::String(raw.to_string()),
    }
}

/// Order two optional field values for sorting.
///
/// Absent and null sort first, then booleans, numbers and strings.
/// Values of the same type compare naturally; arrays and objects are
/// treated as equal to each other so sorting stays stable.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            match (x.as_i64(), y.as_i64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => x
                    .as_f64()
                    .unwrap_or(0.0)
                    .partial_cmp(&y.as_f64().unwrap_or(0.0))
                    .unwrap_or(Ordering::Equal),
            }
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Render a field value as display text. Absent and null become empty.
pub fn value_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Read a value as a boolean the way form input and servers spell it
pub fn value_truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => matches!(s.as_str(), "true" | "on" | "yes" | "checked" | "1"),
        _ => false,
    }
}

/// Read a value as an unsigned count, tolerating numeric strings
pub fn value_count(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}
