use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use error_stack::{report, ResultExt};
use serde::de::IntoDeserializer;
use serde::Deserialize;
use serde_path_to_error::{Deserializer as PathDeserializer, Segment, Track};
use thiserror::Error;

use crate::domain::job::JobSpec;

pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "SheetSync";
pub const ENV_PREFIX: &str = "SHEET_SYNC";

#[derive(Error, Debug)]
pub enum AppConfigError {
    #[error("Error reading config file '{0}'")]
    Read(String),
    #[error("Failed to deserialize config at field '{0}'")]
    Deserialize(String),
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub credentials: CredentialsConfig,
    pub batch: BatchConfig,
    pub logging: LoggingConfig,
    pub last_run: Option<LastRunConfig>,
    /// Jobs run after the built-in job table.
    pub jobs: Vec<JobSpec>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Environment variable holding the service account JSON.
    pub env_var: String,
    /// Service account key file, read when the variable is unset.
    pub key_path: Option<String>,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            env_var: "ACCOUNT_KEY_JSON".to_owned(),
            key_path: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct BatchConfig {
    pub inter_job_delay_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            inter_job_delay_ms: 1000,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub file: Option<String>,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: Some("sheet_sync.log".to_owned()),
            level: "info".to_owned(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct LastRunConfig {
    pub document_id: String,
    #[serde(default = "default_last_run_tab")]
    pub tab: String,
    pub script_name: String,
}

fn default_last_run_tab() -> String {
    "last script run".to_owned()
}

impl AppConfig {
    /// Reads the file named by `CONFIG_PATH` (default `SheetSync.{toml,json,yaml}`),
    /// if present, then `SHEET_SYNC__SECTION__KEY` environment overrides.
    pub fn load() -> error_stack::Result<Self, AppConfigError> {
        let config_path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &str) -> error_stack::Result<Self, AppConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(config_path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        Self::build(builder, config_path)
    }

    pub fn from_toml_str(toml: &str) -> error_stack::Result<Self, AppConfigError> {
        let builder = Config::builder().add_source(File::from_str(toml, FileFormat::Toml));
        Self::build(builder, "<inline>")
    }

    fn build(
        builder: ConfigBuilder<config::builder::DefaultState>,
        config_path: &str,
    ) -> error_stack::Result<Self, AppConfigError> {
        let value = builder
            .build()
            .and_then(|config| config.try_deserialize::<serde_json::Value>())
            .change_context_lazy(|| AppConfigError::Read(config_path.to_owned()))?;

        let mut track = Track::new();
        let path_de = PathDeserializer::new(value.into_deserializer(), &mut track);
        AppConfig::deserialize(path_de).map_err(|e| {
            let path_str = track
                .path()
                .iter()
                .map(|seg| match seg {
                    Segment::Seq { index } => format!("[{}]", index),
                    Segment::Map { key } => format!(".{}", key),
                    Segment::Enum { variant } => format!("::{}", variant),
                    Segment::Unknown => String::from("<?>"),
                })
                .collect::<String>();
            report!(AppConfigError::Deserialize(
                path_str.trim_start_matches('.').to_owned()
            ))
            .attach_printable(format!("{} (config file '{}')", e, config_path))
        })
    }
}
