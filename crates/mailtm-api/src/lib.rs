//! Mail.tm API client for Rust
//!
//! A typed, async interface to the [Mail.tm](https://mail.tm) temporary email
//! service: domains, accounts, tokens, messages and raw sources.
//!
//! # Example
//!
//! ```no_run
//! use mailtm_api::MailClient;
//!
//! # async fn demo() -> mailtm_api::Result<()> {
//! let client = MailClient::new()?;
//!
//! // Pick a domain and register an address on it
//! let domains = client.all_domains().await?;
//! let address = format!("someone@{}", domains[0].name);
//! client.create_account(&address, "hunter22").await?;
//!
//! // Authenticate and read the inbox
//! let token = client.token(&address, "hunter22").await?;
//! client.set_token(Some(token.token.clone()));
//! for message in client.all_messages().await? {
//!     println!("{}: {}", message.sender_address(), message.subject);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod models;

pub use client::{MailClient, MailClientBuilder, DEFAULT_BASE_URL, MAX_PAGES};
pub use error::Error;
pub use models::{
    Account, Attachment, Domain, EmailAddress, HydraCollection, Listing, Message, Page, Source,
    Token,
};

/// Result type for Mail.tm operations
pub type Result<T> = std::result::Result<T, Error>;
