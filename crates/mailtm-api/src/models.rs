use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A domain addresses can be registered on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub id: String,
    /// Domain name, e.g. `example.com`
    #[serde(rename = "domain")]
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Domain {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_active: true,
            ..Default::default()
        }
    }
}

/// A registered mailbox
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub address: String,
    /// Storage quota in bytes
    #[serde(default)]
    pub quota: u64,
    /// Bytes used
    #[serde(default)]
    pub used: u64,
    #[serde(default)]
    pub is_disabled: bool,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            ..Default::default()
        }
    }
}

/// Sender or recipient of a message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    #[serde(default)]
    pub name: String,
    pub address: String,
}

/// Attachment metadata; the content lives behind `download_url`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub disposition: String,
    #[serde(default)]
    pub transfer_encoding: String,
    #[serde(default)]
    pub related: bool,
    /// Size in kilobytes, as reported by the service
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub download_url: String,
}

/// A received message
///
/// The list endpoint returns a trimmed shape (no `text`/`html`); the
/// single-message endpoint fills everything in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub account_id: String,
    /// Message-ID header assigned by the sending provider
    #[serde(default, rename = "msgid")]
    pub provider_message_id: String,
    #[serde(default)]
    pub from: Option<EmailAddress>,
    #[serde(default)]
    pub to: Vec<EmailAddress>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub intro: Option<String>,
    #[serde(default)]
    pub seen: bool,
    #[serde(default)]
    pub flagged: bool,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub has_attachments: bool,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub html: Vec<String>,
    #[serde(default)]
    pub verifications: Vec<serde_json::Value>,
    #[serde(default)]
    pub retention: Option<bool>,
    #[serde(default)]
    pub retention_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(id: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            ..Default::default()
        }
    }

    /// Sender address, or an empty string when the service omitted it
    pub fn sender_address(&self) -> &str {
        self.from.as_ref().map(|f| f.address.as_str()).unwrap_or("")
    }
}

/// Bearer token issued by `POST /token`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Account the token belongs to
    pub id: String,
    pub token: String,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token)
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("id", &self.id)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Raw RFC 822 source of a message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: String,
    #[serde(default)]
    pub download_url: String,
    #[serde(default)]
    pub data: String,
}

/// JSON-LD (Hydra) collection envelope
#[derive(Debug, Clone, Deserialize)]
pub struct HydraCollection<T> {
    #[serde(rename = "hydra:member")]
    pub member: Vec<T>,
    #[serde(default, rename = "hydra:totalItems")]
    pub total_items: Option<usize>,
}

/// A collection response: Hydra envelope or a bare JSON array
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Hydra(HydraCollection<T>),
    Plain(Vec<T>),
}

impl<T> Listing<T> {
    /// Flatten into a page of items
    pub fn into_page(self) -> Page<T> {
        match self {
            Listing::Hydra(c) => Page {
                items: c.member,
                total_items: c.total_items,
            },
            Listing::Plain(items) => Page {
                items,
                total_items: None,
            },
        }
    }
}

/// One page of a paginated collection
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total across all pages, when the service reports it
    pub total_items: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_from_json() {
        let json = r#"{
            "@id": "/domains/6245a6b1",
            "@type": "Domain",
            "id": "6245a6b1",
            "domain": "karenkey.com",
            "isActive": true,
            "isPrivate": false,
            "createdAt": "2022-04-01T00:00:00+00:00",
            "updatedAt": "2022-04-01T00:00:00+00:00"
        }"#;

        let domain: Domain = serde_json::from_str(json).unwrap();
        assert_eq!(domain.id, "6245a6b1");
        assert_eq!(domain.name, "karenkey.com");
        assert!(domain.is_active);
        assert!(!domain.is_private);
        assert!(domain.created_at.is_some());
    }

    #[test]
    fn test_message_list_shape() {
        let json = r#"{
            "@id": "/messages/6470a1",
            "id": "6470a1",
            "accountId": "/accounts/abc",
            "msgid": "<CAF=abc@mail.example>",
            "from": {"address": "sender@example.org", "name": "Sender"},
            "to": [{"address": "me@karenkey.com", "name": ""}],
            "subject": "Your code",
            "intro": "Use 123456 to sign in",
            "seen": false,
            "isDeleted": false,
            "hasAttachments": false,
            "size": 2048,
            "downloadUrl": "/messages/6470a1/download",
            "createdAt": "2023-05-26T12:00:00+00:00",
            "updatedAt": "2023-05-26T12:00:00+00:00"
        }"#;

        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.id, "6470a1");
        assert_eq!(message.provider_message_id, "<CAF=abc@mail.example>");
        assert_eq!(message.sender_address(), "sender@example.org");
        assert_eq!(message.to.len(), 1);
        assert_eq!(message.size, 2048);
        assert!(message.text.is_none());
        assert!(message.html.is_empty());
    }

    #[test]
    fn test_listing_hydra_and_plain() {
        let hydra = r#"{"hydra:member":[{"id":"1","domain":"a.com"}],"hydra:totalItems":7}"#;
        let page = serde_json::from_str::<Listing<Domain>>(hydra)
            .unwrap()
            .into_page();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total_items, Some(7));

        let plain = r#"[{"id":"1","domain":"a.com"},{"id":"2","domain":"b.com"}]"#;
        let page = serde_json::from_str::<Listing<Domain>>(plain)
            .unwrap()
            .into_page();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_items, None);
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = Token {
            id: "acc".to_string(),
            token: "secret-jwt".to_string(),
        };
        assert_eq!(token.to_string(), "secret-jwt");
        assert!(!format!("{:?}", token).contains("secret-jwt"));
    }
}
