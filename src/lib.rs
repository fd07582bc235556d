//! mailtm - event-driven inbox watcher for the Mail.tm temporary email service
//!
//! Turns repeated polling of the service into discrete, subscribable events:
//! new mail, deleted mail, new domains, account changes.
//!
//! # Architecture
//!
//! - **cache**: snapshot of the last observed remote state, keyed by id
//! - **events**: event types and the typed publish/subscribe registry
//! - **server**: the poll loop, diffing, and the mutating gateway
//! - **remote**: the async seam between the server and the HTTP client
//! - **config**: credentials, server options, settings file
//!
//! The HTTP client and record types live in the `mailtm-api` crate.

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod remote;
pub mod retry;
pub mod server;

// Re-exports
pub use error::{MailServerError, Result};
pub use logging::Severity;
pub use remote::RemoteMailClient;
pub use server::{MailServer, PollReport, ServerHandle, ServerState};
