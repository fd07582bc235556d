//! The mail server
//!
//! [`MailServer`] polls the remote service, diffs each fetch against its
//! snapshot cache and publishes the differences as events. It also exposes
//! the mutating operations (create/delete account, switch account, delete
//! message, mark seen), which keep the cache in step and emit their own
//! events.
//!
//! ```no_run
//! use mailtm::config::{ServerAuth, ServerConfig};
//! use mailtm::MailServer;
//! use std::sync::Arc;
//!
//! # async fn demo() -> mailtm::Result<()> {
//! let client = Arc::new(mailtm_api::MailClient::new()?);
//! let server = MailServer::new(client, ServerAuth::new("jwt", "account-id"), ServerConfig::default())?;
//!
//! server.on_new_message(|event| async move {
//!     println!("{}: {}", event.message.sender_address(), event.message.subject);
//!     event.mark_as_seen().await?;
//!     Ok(())
//! });
//!
//! server.run().await
//! # }
//! ```

pub mod banner;
pub mod diff;
mod gateway;
pub mod metrics;
mod runner;

pub use runner::PollReport;

use crate::cache::{CacheCategory, CacheEntry, SnapshotCache};
use crate::config::{validate_settings_result, ServerAuth, ServerConfig, ServerSettings};
use crate::events::{
    DomainChange, Event, EventContext, EventRegistry, HandlerId, NewMessage, ServerEvent,
    Subscription,
};
use crate::logging::{self, Severity};
use crate::remote::RemoteMailClient;
use crate::{MailServerError, Result};
use mailtm_api::MailClient;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::{Arc, RwLock, Weak};
use tokio::sync::{watch, Mutex, Notify};
use tracing::{debug, warn};

/// Runner lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Created,
    Running,
    Stopping,
    Stopped,
}

pub(crate) struct Inner {
    client: Arc<dyn RemoteMailClient>,
    config: ServerConfig,
    auth: RwLock<ServerAuth>,
    cache: Mutex<SnapshotCache>,
    registry: EventRegistry,
    /// Held from fetch through dispatch of one poll iteration
    poll_gate: Mutex<()>,
    /// False until a baseline snapshot has been taken for the active account
    baseline_ready: AtomicBool,
    /// Bumped on every account switch; fetches from an older generation are dropped
    generation: AtomicU64,
    state: watch::Sender<ServerState>,
    stop: Notify,
}

/// Handle to a mail server; clones share the same server
#[derive(Clone)]
pub struct MailServer {
    inner: Arc<Inner>,
}

/// Non-owning reference to a server, carried by events
#[derive(Clone, Default)]
pub struct ServerHandle {
    inner: Weak<Inner>,
}

impl ServerHandle {
    /// A handle that never upgrades
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn upgrade(&self) -> Result<MailServer> {
        self.inner
            .upgrade()
            .map(|inner| MailServer { inner })
            .ok_or(MailServerError::ServerGone)
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl MailServer {
    /// Create a server polling with `auth` through `client`
    ///
    /// Fails with [`MailServerError::Config`] when the token or account id is
    /// empty. A zero poll interval falls back to the default.
    pub fn new(
        client: Arc<dyn RemoteMailClient>,
        auth: ServerAuth,
        mut config: ServerConfig,
    ) -> Result<Self> {
        let missing = auth.missing_fields();
        if !missing.is_empty() {
            return Err(MailServerError::Config(format!(
                "Missing credentials: {}",
                missing.join(", ")
            )));
        }

        for field in config.normalize() {
            warn!(field, "Invalid server option, using the default");
        }

        client.set_token(&auth.account_token);
        let (state, _) = watch::channel(ServerState::Created);

        let server = Self {
            inner: Arc::new(Inner {
                client,
                cache: Mutex::new(SnapshotCache::new(config.cache_capacity)),
                config,
                auth: RwLock::new(auth),
                registry: EventRegistry::new(),
                poll_gate: Mutex::new(()),
                baseline_ready: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                state,
                stop: Notify::new(),
            }),
        };
        debug!(account_id = %server.auth().account_id, "Mail server created");
        Ok(server)
    }

    /// Build a server talking to the real API from a settings file
    pub fn from_settings(settings: ServerSettings) -> Result<Self> {
        validate_settings_result(&settings)?;

        let mut builder = MailClient::builder();
        if let Some(ref url) = settings.base_url {
            builder = builder.base_url(url.clone());
        }
        let client = builder.build()?;

        let (auth, config) = settings.into_parts();
        Self::new(Arc::new(client), auth, config)
    }

    // --- Subscriptions ---

    /// Start a registration for events of type `E`
    ///
    /// ```no_run
    /// # use mailtm::events::DomainChange;
    /// # fn demo(server: &mailtm::MailServer) {
    /// server.subscribe::<DomainChange>().register(|event| async move {
    ///     println!("new domain {}", event.domain.name);
    ///     Ok(())
    /// });
    /// # }
    /// ```
    pub fn subscribe<E: ServerEvent>(&self) -> Subscription<'_, E> {
        self.inner.registry.subscribe::<E>()
    }

    pub fn on_new_message<F, Fut>(&self, handler: F) -> HandlerId
    where
        F: Fn(NewMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.subscribe::<NewMessage>().register(handler)
    }

    pub fn on_new_domain<F, Fut>(&self, handler: F) -> HandlerId
    where
        F: Fn(DomainChange) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.subscribe::<DomainChange>().register(handler)
    }

    pub fn unsubscribe(&self, id: HandlerId) -> bool {
        self.inner.registry.unsubscribe(id)
    }

    // --- Introspection ---

    pub fn state(&self) -> ServerState {
        *self.inner.state.borrow()
    }

    /// Credentials currently used for polling
    pub fn auth(&self) -> ServerAuth {
        self.inner
            .auth
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn client(&self) -> Arc<dyn RemoteMailClient> {
        self.inner.client.clone()
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Total cached entries
    pub async fn cache_size(&self) -> usize {
        self.inner.cache.lock().await.size()
    }

    /// Copy of one cache category
    pub async fn cached(&self, category: CacheCategory) -> Vec<CacheEntry> {
        self.inner.cache.lock().await.get(category)
    }

    /// Log through tracing when logging is enabled
    pub fn log(&self, message: impl AsRef<str>, severity: Severity) {
        if self.inner.config.enable_logging {
            logging::emit(message.as_ref(), severity);
        }
    }

    // --- Internal helpers ---

    fn context(&self) -> EventContext {
        EventContext {
            client: self.inner.client.clone(),
            server: self.handle(),
        }
    }

    fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    /// Dispatch one event under the error policy
    ///
    /// Every handler runs. Failures are logged; unless errors are suppressed
    /// the first one is returned. Nothing is dispatched once stopped.
    async fn publish(&self, event: Event) -> Result<()> {
        if self.state() == ServerState::Stopped {
            debug!(kind = %event.kind(), "Server stopped, event dropped");
            return Ok(());
        }

        let kind = event.kind();
        metrics::record_event(kind.as_str());
        let failures = self.inner.registry.dispatch(event).await;

        for failure in &failures {
            metrics::record_handler_error(kind.as_str());
            self.log(
                format!("Handler for {} failed: {}", kind, failure.message),
                Severity::Error,
            );
        }

        match failures.into_iter().next() {
            Some(first) if !self.inner.config.suppress_errors => Err(first.into()),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for MailServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailServer")
            .field("state", &self.state())
            .field("account_id", &self.auth().account_id)
            .field("registry", &self.inner.registry)
            .finish()
    }
}
