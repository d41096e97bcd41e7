use std::sync::Arc;

use thiserror::Error;

use super::spreadsheet::SpreadsheetClient;

/// Read/write access to all of the service account's spreadsheets.
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("No service account key found: set the {env_var} environment variable or provide a key file")]
    MissingCredentials { env_var: String },
    #[error("Service account key is invalid")]
    InvalidKey,
    #[error("Could not authenticate with the service account")]
    AuthenticationFailed,
}

#[async_trait::async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Returns a client authorized for `scopes`. Credentials are checked here,
    /// so a bad key fails before any job starts.
    async fn authenticate(
        &self,
        scopes: &[&str],
    ) -> error_stack::Result<Arc<dyn SpreadsheetClient>, CredentialError>;
}
