//! Credentials the server polls with

use mailtm_api::Token;
use serde::{Deserialize, Serialize};

/// The active account's credential bundle
///
/// Swapped wholesale on `switch_account`; the previous value travels with the
/// `AccountSwitched` event.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerAuth {
    /// Bearer token for the account
    pub account_token: String,

    pub account_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_password: Option<String>,
}

impl ServerAuth {
    pub fn new(account_token: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            account_token: account_token.into(),
            account_id: account_id.into(),
            account_address: None,
            account_password: None,
        }
    }

    /// Attach the address and password the token was issued for
    pub fn with_credentials(
        mut self,
        address: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.account_address = Some(address.into());
        self.account_password = Some(password.into());
        self
    }

    /// Names of required fields that are blank
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.account_token.trim().is_empty() {
            missing.push("account_token");
        }
        if self.account_id.trim().is_empty() {
            missing.push("account_id");
        }
        missing
    }
}

impl From<Token> for ServerAuth {
    fn from(token: Token) -> Self {
        Self::new(token.token, token.id)
    }
}

impl std::fmt::Debug for ServerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerAuth")
            .field("account_token", &"<redacted>")
            .field("account_id", &self.account_id)
            .field("account_address", &self.account_address)
            .field(
                "account_password",
                &self.account_password.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_token() {
        let auth = ServerAuth::from(Token {
            id: "acc-1".to_string(),
            token: "jwt".to_string(),
        });
        assert_eq!(auth.account_id, "acc-1");
        assert_eq!(auth.account_token, "jwt");
        assert!(auth.account_address.is_none());
    }

    #[test]
    fn test_missing_fields() {
        assert_eq!(
            ServerAuth::default().missing_fields(),
            vec!["account_token", "account_id"]
        );
        assert!(ServerAuth::new("t", "id").missing_fields().is_empty());
        assert_eq!(ServerAuth::new(" ", "id").missing_fields(), vec!["account_token"]);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let auth = ServerAuth::new("jwt-secret", "acc").with_credentials("me@a.com", "hunter22");
        let debug = format!("{:?}", auth);
        assert!(!debug.contains("jwt-secret"));
        assert!(!debug.contains("hunter22"));
        assert!(debug.contains("me@a.com"));
    }
}
