use std::fs::File;
use std::process::ExitCode;
use std::str::FromStr;

use error_stack::{Report, ResultExt};
use indicatif::ProgressStyle;
use thiserror::Error;
use tracing::{error, info, instrument, Level};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{filter::Targets, layer::SubscriberExt, util::SubscriberInitExt, Registry};

use sheet_sync::adapters::sheets::auth::ServiceAccountCredentials;
use sheet_sync::application::{batch::BatchSummary, factory::BatchFactory};
use sheet_sync::config::app_config::{AppConfig, LoggingConfig};
use sheet_sync::ports::credentials::{CredentialProvider, SPREADSHEETS_SCOPE};
use sheet_sync::prettyprint::prettyprint::PrettyFormatter;

#[derive(Error, Debug)]
enum ConfigError {
    #[error("Failed to load configuration")]
    Load,
    #[error("Failed to set up logging")]
    Logging,
    #[error("Failed to authenticate with Google Sheets")]
    Authentication,
    #[error("Invalid job table")]
    JobTable,
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::load().change_context(ConfigError::Load) {
        Ok(config) => config,
        Err(report) => return fail(report),
    };

    if let Err(report) = setup_tracing(&config.logging) {
        return fail(report);
    }
    setup_panic_hook();

    info!("Starting sheet-sync");

    match run(config).await {
        Ok(summary) => {
            info!("Finished: {}", summary);
            ExitCode::SUCCESS
        }
        Err(report) => {
            error!("{:?}", report);
            ExitCode::FAILURE
        }
    }
}

fn fail(report: Report<ConfigError>) -> ExitCode {
    eprintln!("{:?}", report);
    ExitCode::FAILURE
}

#[instrument(skip(config))]
async fn run(config: AppConfig) -> error_stack::Result<BatchSummary, ConfigError> {
    let client = ServiceAccountCredentials::new(config.credentials.clone())
        .authenticate(&[SPREADSHEETS_SCOPE])
        .await
        .change_context(ConfigError::Authentication)?;

    let runner =
        BatchFactory::create(&config, client).change_context(ConfigError::JobTable)?;

    let results = runner.run_all().await;
    Ok(BatchSummary::from_results(&results))
}

fn setup_tracing(logging: &LoggingConfig) -> error_stack::Result<(), ConfigError> {
    let level = Level::from_str(&logging.level)
        .change_context(ConfigError::Logging)
        .attach_printable_lazy(|| format!("unknown log level '{}'", logging.level))?;

    let indicatif_layer = IndicatifLayer::new().with_progress_style(
        ProgressStyle::with_template("{spinner:.green} {span_child_prefix}{span_name}{{{span_fields}}}")
            .change_context(ConfigError::Logging)?,
    );

    let stderr_layer = tracing_subscriber::fmt::layer()
        .event_format(PrettyFormatter::new(true))
        .with_writer(indicatif_layer.get_stderr_writer());

    let log_file_layer = match logging.file.as_deref() {
        Some(path) => Some(
            tracing_subscriber::fmt::layer()
                .event_format(PrettyFormatter::new(false))
                .with_writer(
                    File::create(path)
                        .change_context(ConfigError::Logging)
                        .attach_printable_lazy(|| format!("cannot create log file '{}'", path))?,
                )
                .with_ansi(false),
        ),
        None => None,
    };

    Registry::default()
        .with(Targets::new().with_target("sheet_sync", level))
        .with(indicatif_layer)
        .with(log_file_layer)
        .with(stderr_layer)
        .try_init()
        .change_context(ConfigError::Logging)?;

    Ok(())
}

fn setup_panic_hook() {
    tracing::trace!("Setting panic hook");
    std::panic::set_hook(Box::new(|info| {
        tracing::error!("panic: {info}");
    }));
}
