//! Logging configuration using tracing
//!
//! Everything logs through `tracing`. The binary installs a subscriber with
//! [`init`]; library users bring their own.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Target used by the server's `log()` hook
pub const SERVER_TARGET: &str = "mailtm::server";

/// Initialize the tracing subscriber
///
/// `RUST_LOG` wins when set; otherwise `default_filter` is used
/// (e.g. `"warn"`, `"mailtm=info"`).
///
/// # Errors
/// Returns an error if a global subscriber is already installed
pub fn init(default_filter: &str) -> crate::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).compact())
        .try_init()
        .map_err(|e| {
            crate::MailServerError::Config(format!("Failed to initialize tracing: {}", e))
        })?;

    Ok(())
}

/// Initialize logging for tests (no-op if already initialized)
pub fn init_test() {
    let _ = init("debug");
}

/// Severity accepted by the server's `log()` hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Forward one message to tracing at the matching level
pub fn emit(message: &str, severity: Severity) {
    match severity {
        Severity::Info => tracing::info!(target: SERVER_TARGET, "{}", message),
        Severity::Warning => tracing::warn!(target: SERVER_TARGET, "{}", message),
        Severity::Error => tracing::error!(target: SERVER_TARGET, "{}", message),
    }
}
