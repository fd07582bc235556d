//! Poll loop
//!
//! `Created -> Running -> Stopping -> Stopped`. Each iteration sleeps for the
//! poll interval, fetches domains, messages and the active account, diffs
//! them against the cache and dispatches the resulting events. Iterations
//! never overlap: the poll gate is held from fetch until the last handler
//! returns.

use super::{diff, metrics, MailServer, ServerState};
use crate::cache::CacheCategory;
use crate::events::{
    DomainChange, EventContext, MessageDelete, NewMessage, ServerCalledOff, ServerStarted,
};
use crate::logging::Severity;
use crate::retry::with_retry;
use crate::{MailServerError, Result};
use mailtm_api::{Account, Domain, Message};
use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tracing::{debug, info};

tokio::task_local! {
    /// Id of the server whose runner is driving the current task
    static RUNNER: usize;
}

/// Outcome of one poll iteration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// The iteration took a baseline snapshot and emitted nothing
    pub baseline: bool,

    /// The account changed mid-fetch and the results were dropped
    pub discarded: bool,

    pub new_domains: usize,
    pub new_messages: usize,
    pub deleted_messages: usize,
}

impl PollReport {
    pub fn event_count(&self) -> usize {
        self.new_domains + self.new_messages + self.deleted_messages
    }
}

/// Remote state observed by one fetch
struct RemoteSnapshot {
    domains: Vec<Domain>,
    messages: Vec<Message>,
    account: Option<Account>,
}

impl MailServer {
    /// Run until [`shutdown`](Self::shutdown) or, without error suppression,
    /// until the first fetch or handler failure
    ///
    /// Emits `ServerStarted`, takes the baseline snapshot, then polls. On the
    /// way out the client is closed and a single `ServerCalledOff` is emitted.
    pub async fn run(&self) -> Result<()> {
        self.begin_running()?;

        if self.inner.config.banner {
            super::banner::print(self.inner.config.banner_path.as_deref());
        }
        metrics::runner_started();
        info!(
            account_id = %self.auth().account_id,
            interval_secs = self.inner.config.poll_interval_secs,
            "Mail server running"
        );
        self.log("Server started", Severity::Info);

        let outcome = RUNNER.scope(self.id(), self.drive()).await;

        self.inner.state.send_replace(ServerState::Stopping);
        self.inner.client.close().await;

        let called_off = ServerCalledOff {
            ctx: self.context(),
        };
        if let Err(e) = RUNNER.scope(self.id(), self.publish(called_off.into())).await {
            self.log(format!("While stopping: {}", e), Severity::Error);
        }

        self.inner.state.send_replace(ServerState::Stopped);
        metrics::runner_stopped();

        match &outcome {
            Ok(()) => self.log("Server shut down on request. Goodbye!", Severity::Warning),
            Err(e) => self.log(format!("Server stopped: {}", e), Severity::Error),
        }
        info!(ok = outcome.is_ok(), "Mail server stopped");
        outcome
    }

    /// Alias for [`run`](Self::run)
    pub async fn runner(&self) -> Result<()> {
        self.run().await
    }

    /// Ask the runner to stop and wait until it has
    ///
    /// The stop is observed at the top of the next iteration; an iteration in
    /// progress finishes dispatching first. From inside one of this server's
    /// handlers the call only requests the stop. A no-op unless running.
    pub async fn shutdown(&self) {
        let mut requested = false;
        self.inner.state.send_if_modified(|state| {
            if *state == ServerState::Running {
                *state = ServerState::Stopping;
                requested = true;
                true
            } else {
                false
            }
        });

        if requested {
            debug!("Shutdown requested");
            self.inner.stop.notify_one();
        }
        if self.state() != ServerState::Stopping || self.in_own_runner() {
            return;
        }

        let mut state = self.inner.state.subscribe();
        let _ = state.wait_for(|s| *s == ServerState::Stopped).await;
    }

    /// Run one poll iteration now
    ///
    /// Shares the single-flight gate with the loop. The first call for an
    /// account takes the baseline snapshot instead of diffing.
    pub async fn poll_once(&self) -> Result<PollReport> {
        let _gate = self.inner.poll_gate.lock().await;
        if self.state() == ServerState::Stopped {
            return Err(MailServerError::ShutDown);
        }

        let started = Instant::now();
        let result = self.poll_locked().await;

        let status = match &result {
            Ok(report) if report.baseline => "baseline",
            Ok(report) if report.discarded => "discarded",
            Ok(_) => "ok",
            Err(_) => "error",
        };
        metrics::record_poll(started.elapsed().as_secs_f64(), status);
        result
    }

    /// Take a fresh baseline snapshot without emitting events
    pub async fn build_cache(&self) -> Result<()> {
        let _gate = self.inner.poll_gate.lock().await;
        self.inner.baseline_ready.store(false, Ordering::SeqCst);
        self.poll_locked().await.map(|_| ())
    }

    // --- Internal ---

    fn begin_running(&self) -> Result<()> {
        let mut result = Ok(());
        self.inner.state.send_if_modified(|state| match *state {
            ServerState::Created => {
                *state = ServerState::Running;
                true
            }
            ServerState::Running | ServerState::Stopping => {
                result = Err(MailServerError::AlreadyRunning);
                false
            }
            ServerState::Stopped => {
                result = Err(MailServerError::ShutDown);
                false
            }
        });
        result
    }

    fn stop_requested(&self) -> bool {
        self.state() != ServerState::Running
    }

    fn in_own_runner(&self) -> bool {
        RUNNER.try_with(|id| *id == self.id()).unwrap_or(false)
    }

    async fn drive(&self) -> Result<()> {
        let started = ServerStarted {
            ctx: self.context(),
        };
        self.publish(started.into()).await?;

        if let Err(e) = self.poll_once().await {
            self.contain(e, "build_cache")?;
        }

        loop {
            if self.stop_requested() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.inner.config.poll_interval()) => {}
                _ = self.inner.stop.notified() => {}
            }
            if self.stop_requested() {
                break;
            }

            if let Err(e) = self.poll_once().await {
                self.contain(e, "poll")?;
            }
        }
        Ok(())
    }

    /// Swallow a loop failure when errors are suppressed
    fn contain(&self, err: MailServerError, operation: &str) -> Result<()> {
        if self.inner.config.suppress_errors && !matches!(err, MailServerError::ShutDown) {
            self.log(format!("{} failed: {}", operation, err), Severity::Error);
            Ok(())
        } else {
            Err(err)
        }
    }

    async fn poll_locked(&self) -> Result<PollReport> {
        let generation = self.inner.generation.load(Ordering::SeqCst);
        let snapshot = self.fetch_snapshot().await?;

        let mut cache = self.inner.cache.lock().await;
        if generation != self.inner.generation.load(Ordering::SeqCst) {
            debug!("Account switched during fetch, dropping results");
            return Ok(PollReport {
                discarded: true,
                ..Default::default()
            });
        }

        if let Some(account) = snapshot.account {
            cache.add(CacheCategory::NewAccounts, account);
        }

        if !self.inner.baseline_ready.load(Ordering::SeqCst) {
            let fetched: HashSet<&str> = snapshot.messages.iter().map(|m| m.id.as_str()).collect();
            for id in cache.ids(CacheCategory::NewMessage) {
                if !fetched.contains(id.as_str()) {
                    cache.remove(CacheCategory::NewMessage, &id);
                }
            }
            let tombstones = cache.ids(CacheCategory::OldMessage);

            cache.extend(CacheCategory::Domain, snapshot.domains);
            cache.extend(
                CacheCategory::NewMessage,
                snapshot
                    .messages
                    .into_iter()
                    .filter(|m| !tombstones.contains(&m.id)),
            );
            cache.clean();
            metrics::set_cache_size(cache.size());
            self.inner.baseline_ready.store(true, Ordering::SeqCst);

            self.log(
                format!("Baseline snapshot holds {} entries", cache.size()),
                Severity::Info,
            );
            return Ok(PollReport {
                baseline: true,
                ..Default::default()
            });
        }

        let changes = diff::compute(&cache, &snapshot.domains, &snapshot.messages);
        changes.apply(&mut cache);
        cache.clean();
        metrics::set_cache_size(cache.size());
        drop(cache);

        let report = PollReport {
            new_domains: changes.new_domains.len(),
            new_messages: changes.new_messages.len(),
            deleted_messages: changes.deleted_messages.len(),
            ..Default::default()
        };
        if report.event_count() > 0 {
            debug!(
                new_domains = report.new_domains,
                new_messages = report.new_messages,
                deleted_messages = report.deleted_messages,
                "Poll found changes"
            );
        }

        let ctx: EventContext = self.context();
        for domain in changes.new_domains {
            let event = DomainChange {
                ctx: ctx.clone(),
                domain,
            };
            self.publish(event.into()).await?;
        }
        for message in changes.new_messages {
            let event = NewMessage {
                ctx: ctx.clone(),
                message,
            };
            self.publish(event.into()).await?;
        }
        for message in changes.deleted_messages {
            let event = MessageDelete {
                ctx: ctx.clone(),
                message,
            };
            self.publish(event.into()).await?;
        }

        Ok(report)
    }

    async fn fetch_snapshot(&self) -> Result<RemoteSnapshot> {
        let client = &self.inner.client;
        let account_id = self.auth().account_id;

        let domains = self.fetch("list_domains", || client.list_domains()).await?;
        let messages = self.fetch("list_messages", || client.list_messages()).await?;
        let account = self
            .fetch("get_account", || client.get_account(&account_id))
            .await?;

        Ok(RemoteSnapshot {
            domains,
            messages,
            account,
        })
    }

    /// One remote read, retried per the server's policy
    async fn fetch<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = mailtm_api::Result<T>>,
    {
        with_retry(&self.inner.config.retry, operation, || {
            let pending = call();
            async move { pending.await.map_err(MailServerError::from) }
        })
        .await
        .inspect_err(|_| metrics::record_remote_error(operation))
    }
}
