//! Wire types for the provider REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A sending domain offered by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    /// Provider-assigned identifier.
    pub id: String,
    /// The domain name (e.g. `example.test`).
    pub domain: String,
    /// Whether the domain currently accepts new accounts.
    pub is_active: bool,
    /// Whether the domain is reserved for paying customers.
    pub is_private: bool,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Domain {
    /// Whether new accounts can be created on this domain.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        self.is_active && !self.is_private
    }
}

/// The provider's canonical account record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAccount {
    /// Provider-assigned identifier.
    pub id: String,
    /// Full email address.
    pub address: String,
    /// Storage quota in bytes.
    #[serde(default)]
    pub quota: u64,
    /// Storage used in bytes.
    #[serde(default)]
    pub used: u64,
    /// Whether the account is disabled.
    #[serde(default)]
    pub is_disabled: bool,
    /// Whether the account has been deleted on the provider.
    #[serde(default)]
    pub is_deleted: bool,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A sender or recipient address.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Address {
    /// Email address.
    pub address: String,
    /// Display name, when present.
    #[serde(default)]
    pub name: String,
}

/// Summary of a message as returned by the list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    /// Provider-assigned identifier.
    pub id: String,
    /// Sender.
    #[serde(default)]
    pub from: Address,
    /// Recipients.
    #[serde(default)]
    pub to: Vec<Address>,
    /// Subject line.
    #[serde(default)]
    pub subject: String,
    /// Short plain-text preview of the body.
    #[serde(default)]
    pub intro: String,
    /// Whether the message has been opened.
    #[serde(default)]
    pub seen: bool,
    /// Whether the message carries attachments.
    #[serde(default)]
    pub has_attachments: bool,
    /// Message size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Delivery time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// An attachment on a full message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Provider-assigned identifier.
    pub id: String,
    /// Original filename.
    #[serde(default)]
    pub filename: String,
    /// MIME type.
    #[serde(default)]
    pub content_type: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
}

/// A full message with body content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Provider-assigned identifier.
    pub id: String,
    /// Sender.
    #[serde(default)]
    pub from: Address,
    /// Recipients.
    #[serde(default)]
    pub to: Vec<Address>,
    /// CC recipients.
    #[serde(default)]
    pub cc: Vec<Address>,
    /// BCC recipients.
    #[serde(default)]
    pub bcc: Vec<Address>,
    /// Subject line.
    #[serde(default)]
    pub subject: String,
    /// Whether the message has been opened.
    #[serde(default)]
    pub seen: bool,
    /// Plain-text body, when the sender included one.
    #[serde(default)]
    pub text: Option<String>,
    /// HTML body parts.
    #[serde(default)]
    pub html: Vec<String>,
    /// Attachments.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Delivery time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Response from the token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Bearer token for subsequent authenticated calls.
    pub token: String,
    /// Identifier of the account the token belongs to.
    #[serde(default)]
    pub id: String,
}

/// A collection response.
///
/// The provider wraps list endpoints in a JSON-LD envelope
/// (`hydra:member`), but plain arrays are accepted too so the client
/// works against simpler compatible servers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Collection<T> {
    /// JSON-LD envelope.
    Envelope {
        /// The wrapped items.
        #[serde(rename = "hydra:member")]
        member: Vec<T>,
        /// Total item count across pages, when reported.
        #[serde(rename = "hydra:totalItems", default)]
        total_items: Option<u64>,
    },
    /// Plain JSON array.
    Plain(Vec<T>),
}

impl<T> Collection<T> {
    /// Unwraps the collection into its items.
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        match self {
            Self::Envelope { member, .. } => member,
            Self::Plain(items) => items,
        }
    }
}

/// Error body returned by the provider on non-success responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ErrorBody {
    /// Short error title.
    #[serde(default, alias = "hydra:title")]
    pub title: Option<String>,
    /// Longer error description.
    #[serde(default, alias = "hydra:description", alias = "message")]
    pub detail: Option<String>,
}

impl ErrorBody {
    /// Best human-readable message from the body.
    pub(crate) fn message(&self) -> String {
        match (&self.title, &self.detail) {
            (_, Some(detail)) => detail.clone(),
            (Some(title), None) => title.clone(),
            (None, None) => "unknown error".to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_usability() {
        let json = r#"{"id":"d1","domain":"example.test","isActive":true,"isPrivate":false}"#;
        let domain: Domain = serde_json::from_str(json).unwrap();
        assert!(domain.is_usable());

        let private = Domain {
            is_private: true,
            ..domain.clone()
        };
        assert!(!private.is_usable());

        let inactive = Domain {
            is_active: false,
            ..domain
        };
        assert!(!inactive.is_usable());
    }

    #[test]
    fn test_collection_envelope() {
        let json = r#"{"hydra:member":[{"id":"d1","domain":"a.test","isActive":true,"isPrivate":false}],"hydra:totalItems":1}"#;
        let collection: Collection<Domain> = serde_json::from_str(json).unwrap();
        let items = collection.into_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].domain, "a.test");
    }

    #[test]
    fn test_collection_plain_array() {
        let json = r#"[{"id":"d1","domain":"a.test","isActive":true,"isPrivate":false}]"#;
        let collection: Collection<Domain> = serde_json::from_str(json).unwrap();
        assert_eq!(collection.into_items().len(), 1);
    }

    #[test]
    fn test_message_summary_fields() {
        let json = r#"{
            "id": "m1",
            "from": {"address": "sender@a.test", "name": "Sender"},
            "to": [{"address": "me@b.test"}],
            "subject": "Hello",
            "intro": "Hello there...",
            "seen": false,
            "hasAttachments": true,
            "size": 2048,
            "createdAt": "2026-08-01T12:00:00+00:00"
        }"#;
        let summary: MessageSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.from.address, "sender@a.test");
        assert!(summary.has_attachments);
        assert!(summary.created_at.is_some());
    }

    #[test]
    fn test_full_message_optional_bodies() {
        let json = r#"{"id":"m1","subject":"s","html":["<p>hi</p>"]}"#;
        let message: Message = serde_json::from_str(json).unwrap();
        assert!(message.text.is_none());
        assert_eq!(message.html.len(), 1);
        assert!(message.attachments.is_empty());
    }

    #[test]
    fn test_error_body_message_precedence() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"hydra:title":"Error","hydra:description":"detail text"}"#)
                .unwrap();
        assert_eq!(body.message(), "detail text");

        let title_only: ErrorBody = serde_json::from_str(r#"{"title":"Unprocessable"}"#).unwrap();
        assert_eq!(title_only.message(), "Unprocessable");

        let empty = ErrorBody::default();
        assert_eq!(empty.message(), "unknown error");
    }
}
