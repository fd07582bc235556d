//! Configuration
//!
//! - [`ServerAuth`]: the credentials the server polls with
//! - [`ServerConfig`]: construction-time options (interval, banner, error policy)
//! - [`ServerSettings`]: both of the above persisted in
//!   `~/.config/mailtm/config.yaml`

mod auth;
mod server_config;
mod settings;
pub mod validation;

pub use auth::ServerAuth;
pub use server_config::{ServerConfig, DEFAULT_CACHE_CAPACITY, DEFAULT_POLL_INTERVAL};
pub use settings::ServerSettings;
pub use validation::{validate_settings, validate_settings_result, ValidationError};
