use crate::models::{Account, Domain, Listing, Message, Page, Source, Token};
use crate::{Error, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::Duration;
use tracing::debug;

/// Public Mail.tm endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.mail.tm";

/// Default upper bound on pages followed by `all_messages` / `all_domains`
pub const MAX_PAGES: u32 = 50;

/// Async client for the Mail.tm API
///
/// The bearer token sits behind a lock so a long-lived client can be pointed
/// at another account without being rebuilt.
#[derive(Debug)]
pub struct MailClient {
    base_url: String,
    http: reqwest::Client,
    token: RwLock<Option<String>>,
    closed: AtomicBool,
    max_pages: u32,
}

/// Builder for [`MailClient`]
#[derive(Debug, Clone, Default)]
pub struct MailClientBuilder {
    base_url: Option<String>,
    token: Option<String>,
    timeout: Option<Duration>,
    max_pages: Option<u32>,
}

impl MailClientBuilder {
    /// Point at another deployment (or a local test server)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Authenticate every request with this bearer token
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Overall per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Stop following pagination after this many pages (at least one)
    pub fn max_pages(mut self, pages: u32) -> Self {
        self.max_pages = Some(pages.max(1));
        self
    }

    pub fn build(self) -> Result<MailClient> {
        let mut http = reqwest::Client::builder()
            .user_agent(concat!("mailtm-api/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = self.timeout {
            http = http.timeout(timeout);
        }

        Ok(MailClient {
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            http: http.build()?,
            token: RwLock::new(self.token),
            closed: AtomicBool::new(false),
            max_pages: self.max_pages.unwrap_or(MAX_PAGES),
        })
    }
}

impl MailClient {
    /// Unauthenticated client against the public endpoint
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Client authenticated with an existing token
    pub fn with_token(token: impl Into<String>) -> Result<Self> {
        Self::builder().token(token).build()
    }

    pub fn builder() -> MailClientBuilder {
        MailClientBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Replace (or clear) the bearer token used for subsequent requests
    pub fn set_token(&self, token: Option<String>) {
        let mut guard = self.token.write().unwrap_or_else(|e| e.into_inner());
        *guard = token;
    }

    /// Current bearer token
    pub fn token_value(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Close the session. Every later call fails with [`Error::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // --- Domains ---

    /// One page of domains
    pub async fn domains(&self, page: u32) -> Result<Page<Domain>> {
        self.page("domains", page).await
    }

    /// Every domain, following pagination
    pub async fn all_domains(&self) -> Result<Vec<Domain>> {
        self.all_pages("domains").await
    }

    /// A single domain, `None` if it does not exist
    pub async fn domain(&self, id: &str) -> Result<Option<Domain>> {
        let req = self.request(Method::GET, &format!("domains/{}", non_empty("id", id)?))?;
        optional(Self::send_json(req).await)
    }

    // --- Accounts ---

    /// Register a new address
    pub async fn create_account(&self, address: &str, password: &str) -> Result<Account> {
        let req = self
            .request(Method::POST, "accounts")?
            .json(&credentials(address, password)?);
        Self::send_json(req).await
    }

    /// Exchange address and password for a bearer token
    pub async fn token(&self, address: &str, password: &str) -> Result<Token> {
        let req = self
            .request(Method::POST, "token")?
            .json(&credentials(address, password)?);
        Self::send_json(req).await
    }

    /// An account by id, `None` if it does not exist
    pub async fn account(&self, id: &str) -> Result<Option<Account>> {
        let req = self.request(Method::GET, &format!("accounts/{}", non_empty("id", id)?))?;
        optional(Self::send_json(req).await)
    }

    /// The account the current token belongs to
    pub async fn me(&self) -> Result<Account> {
        let req = self.request(Method::GET, "me")?;
        Self::send_json(req).await
    }

    pub async fn delete_account(&self, id: &str) -> Result<()> {
        let req = self.request(Method::DELETE, &format!("accounts/{}", non_empty("id", id)?))?;
        Self::send(req).await.map(|_| ())
    }

    // --- Messages ---

    /// One page of messages for the authenticated account
    pub async fn messages(&self, page: u32) -> Result<Page<Message>> {
        self.page("messages", page).await
    }

    /// Every message for the authenticated account, following pagination
    pub async fn all_messages(&self) -> Result<Vec<Message>> {
        self.all_pages("messages").await
    }

    /// Full message including body, `None` if it does not exist
    pub async fn message(&self, id: &str) -> Result<Option<Message>> {
        let req = self.request(Method::GET, &format!("messages/{}", non_empty("id", id)?))?;
        optional(Self::send_json(req).await)
    }

    pub async fn delete_message(&self, id: &str) -> Result<()> {
        let req = self.request(Method::DELETE, &format!("messages/{}", non_empty("id", id)?))?;
        Self::send(req).await.map(|_| ())
    }

    /// Flag a message as seen
    pub async fn mark_seen(&self, id: &str) -> Result<()> {
        let body = serde_json::to_vec(&serde_json::json!({ "seen": true }))?;
        let req = self
            .request(Method::PATCH, &format!("messages/{}", non_empty("id", id)?))?
            .header(CONTENT_TYPE, "application/merge-patch+json")
            .body(body);
        Self::send(req).await.map(|_| ())
    }

    /// Raw source of a message, `None` if it does not exist
    pub async fn source(&self, id: &str) -> Result<Option<Source>> {
        let req = self.request(Method::GET, &format!("sources/{}", non_empty("id", id)?))?;
        optional(Self::send_json(req).await)
    }

    // --- Internal helpers ---

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        if self.is_closed() {
            return Err(Error::Closed);
        }

        let mut req = self
            .http
            .request(method, self.url(path))
            .header(ACCEPT, "application/ld+json");
        if let Some(token) = self.token_value() {
            req = req.bearer_auth(token);
        }
        Ok(req)
    }

    async fn send(req: RequestBuilder) -> Result<reqwest::Response> {
        let response = req.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::from_status(status.as_u16(), &body))
    }

    async fn send_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T> {
        let response = Self::send(req).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn page<T: DeserializeOwned>(&self, path: &str, page: u32) -> Result<Page<T>> {
        let req = self
            .request(Method::GET, path)?
            .query(&[("page", page.max(1))]);
        let listing: Listing<T> = Self::send_json(req).await?;
        Ok(listing.into_page())
    }

    async fn all_pages<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();

        for page in 1..=self.max_pages {
            let Page {
                items: batch,
                total_items,
            } = self.page::<T>(path, page).await?;

            if batch.is_empty() {
                return Ok(items);
            }
            items.extend(batch);

            match total_items {
                Some(total) if items.len() < total => {
                    if page == self.max_pages {
                        debug!(path, fetched = items.len(), total, "Page limit reached");
                        return Err(Error::Truncated {
                            path: path.to_string(),
                            fetched: items.len(),
                            total,
                        });
                    }
                }
                // A bare array carries no total and is a single page
                _ => return Ok(items),
            }
        }

        Ok(items)
    }
}

/// Map a 404 on a read into `Ok(None)`
fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

fn non_empty<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument(format!("{} must not be empty", field)));
    }
    Ok(trimmed)
}

fn credentials(address: &str, password: &str) -> Result<serde_json::Value> {
    Ok(serde_json::json!({
        "address": non_empty("address", address)?,
        "password": non_empty("password", password)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let client = MailClient::new().unwrap();
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
        assert!(client.token_value().is_none());
        assert!(!client.is_closed());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = MailClient::builder()
            .base_url("http://localhost:8080/")
            .build()
            .unwrap();
        assert_eq!(client.url("/messages"), "http://localhost:8080/messages");
        assert_eq!(client.url("me"), "http://localhost:8080/me");
    }

    #[test]
    fn test_set_token() {
        let client = MailClient::with_token("first").unwrap();
        assert_eq!(client.token_value().as_deref(), Some("first"));

        client.set_token(Some("second".to_string()));
        assert_eq!(client.token_value().as_deref(), Some("second"));

        client.set_token(None);
        assert!(client.token_value().is_none());
    }

    #[test]
    fn test_closed_client_refuses_requests() {
        let client = MailClient::new().unwrap();
        client.close();
        assert!(matches!(
            client.request(Method::GET, "domains"),
            Err(Error::Closed)
        ));
    }

    #[test]
    fn test_empty_arguments_rejected() {
        assert!(matches!(
            non_empty("id", "  "),
            Err(Error::InvalidArgument(_))
        ));
        assert!(credentials("", "pw").is_err());
        assert!(credentials("a@b.c", "").is_err());
        assert_eq!(
            credentials("a@b.c", "pw").unwrap()["address"],
            serde_json::json!("a@b.c")
        );
    }

    #[test]
    fn test_optional_maps_not_found() {
        let missing: Result<u8> = Err(Error::from_status(404, ""));
        assert!(optional(missing).unwrap().is_none());

        let other: Result<u8> = Err(Error::from_status(500, ""));
        assert!(optional(other).is_err());

        assert_eq!(optional(Ok(3u8)).unwrap(), Some(3));
    }
}
