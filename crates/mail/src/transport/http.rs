//! REST transport over HTTP
//!
//! Uses synchronous HTTP (ureq) to stay executor-agnostic; requests run
//! when the event loop executes the task that issued them.

use log::debug;
use url::Url;

use super::Transport;
use crate::config::BackendConfig;
use crate::error::TransportError;
use crate::models::{Attributes, EntityId};

/// [`Transport`] speaking JSON to a resourceful HTTP API
///
/// | operation | request                  |
/// |-----------|--------------------------|
/// | list      | `GET {base}{endpoint}`   |
/// | create    | `POST {base}{endpoint}`  |
/// | update    | `PUT {base}{endpoint}{id}` |
/// | delete    | `DELETE {base}{endpoint}{id}` |
pub struct HttpTransport {
    base_url: Url,
}

impl HttpTransport {
    /// Create a transport rooted at `base_url`
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }

    /// Create a transport from the loaded backend configuration
    pub fn from_config(config: &BackendConfig) -> anyhow::Result<Self> {
        Ok(Self::new(config.url()?))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of a list resource or of one record in it
    pub fn resource_url(&self, endpoint: &str, id: Option<&EntityId>) -> Result<Url, TransportError> {
        let path = match id {
            Some(id) => format!("{}{}", endpoint, id.as_str()),
            None => endpoint.to_string(),
        };
        self.base_url
            .join(&path)
            .map_err(|e| TransportError::Network(format!("invalid resource url {path}: {e}")))
    }

    /// Decode a body holding one record. Empty bodies decode to an empty
    /// map so `204 No Content` answers are accepted.
    fn decode_record(body: &str) -> Result<Attributes, TransportError> {
        if body.trim().is_empty() {
            return Ok(Attributes::new());
        }
        serde_json::from_str(body).map_err(|e| TransportError::Decode(e.to_string()))
    }

    fn decode_list(body: &str) -> Result<Vec<Attributes>, TransportError> {
        serde_json::from_str(body).map_err(|e| TransportError::Decode(e.to_string()))
    }

    fn read_body(
        result: Result<ureq::http::Response<ureq::Body>, ureq::Error>,
        endpoint: &str,
        id: Option<&EntityId>,
    ) -> Result<String, TransportError> {
        let mut response = result.map_err(|e| Self::map_error(e, endpoint, id))?;
        response
            .body_mut()
            .read_to_string()
            .map_err(|e| TransportError::Decode(e.to_string()))
    }

    fn map_error(error: ureq::Error, endpoint: &str, id: Option<&EntityId>) -> TransportError {
        match (error, id) {
            (ureq::Error::StatusCode(404), Some(id)) => TransportError::NotFound {
                endpoint: endpoint.to_string(),
                id: id.to_string(),
            },
            (ureq::Error::StatusCode(code), _) => TransportError::Status { code },
            (other, _) => TransportError::Network(other.to_string()),
        }
    }
}

impl Transport for HttpTransport {
    fn list(&self, endpoint: &str) -> Result<Vec<Attributes>, TransportError> {
        let url = self.resource_url(endpoint, None)?;
        debug!("GET {}", url);
        let body = Self::read_body(ureq::get(url.as_str()).call(), endpoint, None)?;
        Self::decode_list(&body)
    }

    fn create(&self, endpoint: &str, record: &Attributes) -> Result<Attributes, TransportError> {
        let url = self.resource_url(endpoint, None)?;
        debug!("POST {}", url);
        let body = Self::read_body(ureq::post(url.as_str()).send_json(record), endpoint, None)?;
        Self::decode_record(&body)
    }

    fn update(
        &self,
        endpoint: &str,
        id: &EntityId,
        record: &Attributes,
    ) -> Result<Attributes, TransportError> {
        let url = self.resource_url(endpoint, Some(id))?;
        debug!("PUT {}", url);
        let body = Self::read_body(ureq::put(url.as_str()).send_json(record), endpoint, Some(id))?;
        Self::decode_record(&body)
    }

    fn delete(&self, endpoint: &str, id: &EntityId) -> Result<(), TransportError> {
        let url = self.resource_url(endpoint, Some(id))?;
        debug!("DELETE {}", url);
        Self::read_body(ureq::delete(url.as_str()).call(), endpoint, Some(id))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transport() -> HttpTransport {
        HttpTransport::new(Url::parse("http://localhost:9250/app/").unwrap())
    }

    #[test]
    fn test_resource_urls() {
        let transport = transport();
        assert_eq!(
            transport.resource_url("mailboxes/", None).unwrap().as_str(),
            "http://localhost:9250/app/mailboxes/"
        );
        assert_eq!(
            transport
                .resource_url("mails/", Some(&EntityId::new("42")))
                .unwrap()
                .as_str(),
            "http://localhost:9250/app/mails/42"
        );
    }

    #[test]
    fn test_decode_record() {
        assert!(HttpTransport::decode_record("").unwrap().is_empty());
        let record = HttpTransport::decode_record(r#"{"id": 3, "name": "Work"}"#).unwrap();
        assert_eq!(record.get("id"), Some(&json!(3)));
        assert!(matches!(
            HttpTransport::decode_record("[1, 2]"),
            Err(TransportError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_list() {
        let list = HttpTransport::decode_list(r#"[{"id": "a"}, {"id": "b"}]"#).unwrap();
        assert_eq!(list.len(), 2);
        assert!(HttpTransport::decode_list("{}").is_err());
    }

    #[test]
    fn test_status_mapping() {
        let id = EntityId::new("7");
        assert_eq!(
            HttpTransport::map_error(ureq::Error::StatusCode(404), "mails/", Some(&id)),
            TransportError::NotFound {
                endpoint: "mails/".to_string(),
                id: "7".to_string()
            }
        );
        assert_eq!(
            HttpTransport::map_error(ureq::Error::StatusCode(404), "mails/", None),
            TransportError::Status { code: 404 }
        );
        assert_eq!(
            HttpTransport::map_error(ureq::Error::StatusCode(500), "mails/", Some(&id)),
            TransportError::Status { code: 500 }
        );
    }
}
