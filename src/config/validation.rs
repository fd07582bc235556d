//! Settings validation
//!
//! Collects every problem in one pass so the user can fix them together:
//! - Credentials are present
//! - Poll interval is positive
//! - Banner file exists when configured
//! - Base URL looks like an HTTP(S) URL

use super::settings::ServerSettings;
use crate::MailServerError;

/// One validation problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Validate loaded settings
pub fn validate_settings(settings: &ServerSettings) -> ValidationResult {
    let mut errors = Vec::new();

    for field in settings.auth.missing_fields() {
        errors.push(ValidationError::new(
            format!("auth.{}", field),
            "Must not be empty",
        ));
    }

    if settings.poll_interval == 0 {
        errors.push(ValidationError::new(
            "poll_interval",
            "Must be a positive number of seconds",
        ));
    }

    if settings.cache_capacity == 0 {
        errors.push(ValidationError::new(
            "cache_capacity",
            "Must be greater than 0",
        ));
    }

    if let Some(ref path) = settings.banner_path {
        if !path.is_file() {
            errors.push(ValidationError::new(
                "banner_path",
                format!("Banner file not found: {}", path.display()),
            ));
        }
    }

    if let Some(ref url) = settings.base_url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            errors.push(ValidationError::new(
                "base_url",
                format!("Expected an http(s) URL, got '{}'", url),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Same as [`validate_settings`] but folded into a single error
pub fn validate_settings_result(settings: &ServerSettings) -> crate::Result<()> {
    validate_settings(settings).map_err(|errors| {
        let joined = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        MailServerError::Validation(joined)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerAuth;
    use std::path::PathBuf;

    fn valid() -> ServerSettings {
        ServerSettings::new(ServerAuth::new("jwt", "acc-1"))
    }

    #[test]
    fn test_valid_settings() {
        assert!(validate_settings(&valid()).is_ok());
    }

    #[test]
    fn test_reports_every_problem() {
        let mut settings = ServerSettings::new(ServerAuth::default());
        settings.poll_interval = 0;
        settings.banner_path = Some(PathBuf::from("/definitely/not/here.txt"));
        settings.base_url = Some("ftp://example.com".to_string());

        let errors = validate_settings(&settings).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "auth.account_token",
                "auth.account_id",
                "poll_interval",
                "banner_path",
                "base_url"
            ]
        );
    }

    #[test]
    fn test_existing_banner_file_accepted() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut settings = valid();
        settings.banner_path = Some(file.path().to_path_buf());
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_result_folds_errors() {
        let mut settings = valid();
        settings.poll_interval = 0;
        let err = validate_settings_result(&settings).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid settings: poll_interval: Must be a positive number of seconds"
        );
    }
}
