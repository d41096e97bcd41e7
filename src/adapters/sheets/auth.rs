use std::path::Path;
use std::sync::Arc;

use error_stack::{report, ResultExt};
use google_sheets4::oauth2::{self, authenticator::Authenticator, ServiceAccountKey};
use google_sheets4::{hyper, Sheets};
use tracing::instrument;

use crate::config::app_config::CredentialsConfig;
use crate::ports::credentials::{CredentialError, CredentialProvider};
use crate::ports::spreadsheet::SpreadsheetClient;

use super::google::GoogleSheetsClient;
use super::http_client::{self, HttpsConnector};

/// Service account key from the configured environment variable, or from the
/// key file when the variable is unset or empty.
#[instrument(skip(config), fields(env_var = %config.env_var))]
pub async fn load_service_account_key(
    config: &CredentialsConfig,
) -> error_stack::Result<ServiceAccountKey, CredentialError> {
    if let Some(json) = std::env::var(&config.env_var)
        .ok()
        .filter(|json| !json.trim().is_empty())
    {
        tracing::debug!("Reading service account key from ${}", config.env_var);
        return oauth2::parse_service_account_key(json)
            .change_context(CredentialError::InvalidKey)
            .attach_printable_lazy(|| {
                format!("${} does not hold a service account JSON key", config.env_var)
            });
    }

    match config.key_path.as_deref() {
        Some(key_path) if Path::new(key_path).exists() => {
            tracing::debug!("Reading service account key from {}", key_path);
            oauth2::read_service_account_key(key_path)
                .await
                .change_context(CredentialError::InvalidKey)
                .attach_printable_lazy(|| {
                    format!("could not read service account key at '{}'", key_path)
                })
        }
        _ => Err(report!(CredentialError::MissingCredentials {
            env_var: config.env_var.clone(),
        })),
    }
}

pub async fn auth(
    secret: ServiceAccountKey,
    client: hyper::Client<HttpsConnector>,
) -> error_stack::Result<Authenticator<HttpsConnector>, CredentialError> {
    oauth2::ServiceAccountAuthenticator::with_client(secret, client)
        .build()
        .await
        .change_context(CredentialError::AuthenticationFailed)
        .attach_printable("could not create an authenticator")
}

/// Builds authenticated Google Sheets clients from a service account key.
#[derive(Debug, Clone)]
pub struct ServiceAccountCredentials {
    config: CredentialsConfig,
}

impl ServiceAccountCredentials {
    pub fn new(config: CredentialsConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl CredentialProvider for ServiceAccountCredentials {
    #[instrument(name = "ServiceAccountCredentials::authenticate", skip(self))]
    async fn authenticate(
        &self,
        scopes: &[&str],
    ) -> error_stack::Result<Arc<dyn SpreadsheetClient>, CredentialError> {
        let secret = load_service_account_key(&self.config).await?;
        let client = http_client::http_client()
            .change_context(CredentialError::AuthenticationFailed)
            .attach_printable("could not load the native root certificates")?;
        let authenticator = auth(secret, client.clone()).await?;

        // Fetch a token now so bad keys fail before any job runs.
        authenticator.token(scopes).await.map_err(|error| {
            report!(CredentialError::AuthenticationFailed)
                .attach_printable(format!("token request failed: {}", error))
        })?;
        tracing::info!("🔐 Authenticated service account");

        let hub = Sheets::new(client, authenticator);
        Ok(Arc::new(GoogleSheetsClient::new(hub)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_credentials() {
        let config = CredentialsConfig {
            env_var: "SHEET_SYNC_TEST_UNSET_KEY_VARIABLE".to_owned(),
            key_path: Some("/nonexistent/service_account.json".to_owned()),
        };

        let report = load_service_account_key(&config).await.unwrap_err();

        assert_eq!(
            report.current_context(),
            &CredentialError::MissingCredentials {
                env_var: "SHEET_SYNC_TEST_UNSET_KEY_VARIABLE".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_key_in_environment() {
        let env_var = "SHEET_SYNC_TEST_INVALID_KEY_VARIABLE";
        std::env::set_var(env_var, "{ not json");
        let config = CredentialsConfig {
            env_var: env_var.to_owned(),
            key_path: None,
        };

        let report = load_service_account_key(&config).await.unwrap_err();
        std::env::remove_var(env_var);

        assert_eq!(report.current_context(), &CredentialError::InvalidKey);
    }
}
