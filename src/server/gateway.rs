//! Mutating operations
//!
//! Each call checks its inputs, performs the remote action, updates the cache
//! and emits its event, in that order. A remote failure leaves the cache
//! untouched and emits nothing. None of these take the poll gate, so handlers
//! may call them mid-dispatch.

use super::{metrics, MailServer, ServerState};
use crate::cache::CacheCategory;
use crate::config::ServerAuth;
use crate::events::{AccountDeleted, AccountSwitched, MessageDelete, NewAccountCreated};
use crate::logging::Severity;
use crate::{MailServerError, Result};
use mailtm_api::Account;
use std::future::Future;
use std::sync::atomic::Ordering;
use tracing::debug;

impl MailServer {
    /// Register a new address, then fetch a token for it
    ///
    /// Emits `NewAccountCreated` with the new credentials.
    pub async fn create_account(&self, address: &str, password: &str) -> Result<Account> {
        self.ensure_accepting()?;
        let address = required("address", address)?;
        let password = required("password", password)?;

        let client = &self.inner.client;
        let account = self
            .remote("create_account", client.create_account(address, password))
            .await?;
        let token = self
            .remote("get_token", client.get_token(address, password))
            .await?;
        let auth = ServerAuth::from(token).with_credentials(address, password);

        self.inner
            .cache
            .lock()
            .await
            .add(CacheCategory::NewAccounts, account.clone());
        self.log(
            format!("Created account {} ({})", account.address, account.id),
            Severity::Info,
        );

        let event = NewAccountCreated {
            ctx: self.context(),
            auth,
            account: account.clone(),
        };
        self.publish(event.into()).await?;
        Ok(account)
    }

    /// Delete an account
    ///
    /// Deleting the active account does not stop the runner; stop it or
    /// switch accounts afterwards.
    pub async fn delete_account(&self, id: &str) -> Result<()> {
        self.ensure_accepting()?;
        let id = required("account id", id)?;

        self.remote("delete_account", self.inner.client.delete_account(id))
            .await?;
        self.inner
            .cache
            .lock()
            .await
            .remove(CacheCategory::NewAccounts, id);

        if self.auth().account_id == id {
            self.log(
                format!("Deleted the active account {}", id),
                Severity::Warning,
            );
        } else {
            self.log(format!("Deleted account {}", id), Severity::Info);
        }

        let event = AccountDeleted {
            ctx: self.context(),
            account_id: id.to_string(),
        };
        self.publish(event.into()).await
    }

    /// Poll a different account from now on
    ///
    /// The cache is reset and the next iteration takes a new baseline, so the
    /// new inbox does not show up as a burst of `NewMessage` events. Emits
    /// `AccountSwitched` carrying the previous credentials.
    pub async fn switch_account(&self, auth: impl Into<ServerAuth>) -> Result<()> {
        self.ensure_accepting()?;
        let auth = auth.into();
        let missing = auth.missing_fields();
        if !missing.is_empty() {
            return Err(MailServerError::Validation(format!(
                "Missing credentials: {}",
                missing.join(", ")
            )));
        }

        let account_id = auth.account_id.clone();
        self.inner.client.set_token(&auth.account_token);
        let previous = {
            let mut cache = self.inner.cache.lock().await;
            let previous = {
                let mut current = self.inner.auth.write().unwrap_or_else(|e| e.into_inner());
                std::mem::replace(&mut *current, auth)
            };
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            self.inner.baseline_ready.store(false, Ordering::SeqCst);
            cache.reset();
            metrics::set_cache_size(0);
            previous
        };
        self.log(
            format!("Switched to account {}", account_id),
            Severity::Warning,
        );

        let event = AccountSwitched {
            ctx: self.context(),
            previous_auth: previous,
        };
        self.publish(event.into()).await
    }

    /// Delete a message and emit `MessageDelete`
    ///
    /// Deleting the same id twice fails with `EntityNotFound` the second time
    /// and emits nothing. When a concurrent poll already reported the
    /// deletion, the call succeeds without a second event.
    pub async fn delete_message(&self, id: &str) -> Result<()> {
        self.ensure_accepting()?;
        let id = required("message id", id)?;

        let cached = self.inner.cache.lock().await.message(id);
        let message = match cached {
            Some(message) => message,
            None => self
                .remote("get_message", self.inner.client.get_message(id))
                .await?
                .ok_or_else(|| {
                    MailServerError::Api(mailtm_api::Error::EntityNotFound(format!(
                        "Message {} does not exist",
                        id
                    )))
                })?,
        };

        self.remote("delete_message", self.inner.client.delete_message(id))
            .await?;
        let live = self.inner.cache.lock().await.tombstone(message.clone());
        if !live {
            // A poll saw the message disappear first and already emitted the event
            debug!(id, "Message deletion already reported by a poll");
            return Ok(());
        }
        self.log(format!("Deleted message {}", id), Severity::Info);

        let event = MessageDelete {
            ctx: self.context(),
            message,
        };
        self.publish(event.into()).await
    }

    /// Mark a message as seen; emits nothing
    pub async fn mark_seen(&self, id: &str) -> Result<()> {
        self.ensure_accepting()?;
        let id = required("message id", id)?;

        self.remote("mark_seen", self.inner.client.mark_seen(id))
            .await?;

        let mut cache = self.inner.cache.lock().await;
        if let Some(mut message) = cache.message(id) {
            message.seen = true;
            cache.add(CacheCategory::NewMessage, message);
        }
        Ok(())
    }

    fn ensure_accepting(&self) -> Result<()> {
        match self.state() {
            ServerState::Stopping | ServerState::Stopped => Err(MailServerError::ShutDown),
            _ => Ok(()),
        }
    }

    async fn remote<T>(
        &self,
        operation: &str,
        call: impl Future<Output = mailtm_api::Result<T>>,
    ) -> Result<T> {
        call.await.map_err(|e| {
            metrics::record_remote_error(operation);
            self.log(format!("{} failed: {}", operation, e), Severity::Error);
            MailServerError::from(e)
        })
    }
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(MailServerError::Validation(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(trimmed)
}
