//! The remote API as seen by the server
//!
//! The server only talks to the service through [`RemoteMailClient`], so the
//! poll loop and gateway can be driven by an in-memory fake in tests.

use async_trait::async_trait;
use mailtm_api::{Account, Domain, MailClient, Message, Token};

/// Async operations the server needs from the mail service
///
/// Reads return `Ok(None)` for "not found"; mutations surface
/// `mailtm_api::Error::EntityNotFound` instead.
#[async_trait]
pub trait RemoteMailClient: Send + Sync {
    /// Every message in the authenticated inbox, newest first
    async fn list_messages(&self) -> mailtm_api::Result<Vec<Message>>;

    async fn list_domains(&self) -> mailtm_api::Result<Vec<Domain>>;

    async fn get_account(&self, id: &str) -> mailtm_api::Result<Option<Account>>;

    async fn get_message(&self, id: &str) -> mailtm_api::Result<Option<Message>>;

    async fn create_account(&self, address: &str, password: &str)
        -> mailtm_api::Result<Account>;

    async fn get_token(&self, address: &str, password: &str) -> mailtm_api::Result<Token>;

    async fn delete_account(&self, id: &str) -> mailtm_api::Result<()>;

    async fn delete_message(&self, id: &str) -> mailtm_api::Result<()>;

    async fn mark_seen(&self, id: &str) -> mailtm_api::Result<()>;

    /// Authenticate subsequent calls with `token`
    fn set_token(&self, token: &str);

    /// Release the session; later calls fail with `Error::Closed`
    async fn close(&self);
}

#[async_trait]
impl RemoteMailClient for MailClient {
    async fn list_messages(&self) -> mailtm_api::Result<Vec<Message>> {
        self.all_messages().await
    }

    async fn list_domains(&self) -> mailtm_api::Result<Vec<Domain>> {
        self.all_domains().await
    }

    async fn get_account(&self, id: &str) -> mailtm_api::Result<Option<Account>> {
        self.account(id).await
    }

    async fn get_message(&self, id: &str) -> mailtm_api::Result<Option<Message>> {
        self.message(id).await
    }

    async fn create_account(
        &self,
        address: &str,
        password: &str,
    ) -> mailtm_api::Result<Account> {
        MailClient::create_account(self, address, password).await
    }

    async fn get_token(&self, address: &str, password: &str) -> mailtm_api::Result<Token> {
        self.token(address, password).await
    }

    async fn delete_account(&self, id: &str) -> mailtm_api::Result<()> {
        MailClient::delete_account(self, id).await
    }

    async fn delete_message(&self, id: &str) -> mailtm_api::Result<()> {
        MailClient::delete_message(self, id).await
    }

    async fn mark_seen(&self, id: &str) -> mailtm_api::Result<()> {
        MailClient::mark_seen(self, id).await
    }

    fn set_token(&self, token: &str) {
        MailClient::set_token(self, Some(token.to_string()));
    }

    async fn close(&self) {
        MailClient::close(self);
    }
}
