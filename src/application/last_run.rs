use std::sync::Arc;

use chrono::{Duration, NaiveDateTime, Utc};
use error_stack::ResultExt;
use tracing::{error, info, instrument};

use crate::application::sync_job::{report_message, SyncJobError};
use crate::config::app_config::LastRunConfig;
use crate::domain::block::TabularBlock;
use crate::domain::job::JobResult;
use crate::domain::sheets::{cell_position::CellPosition, cell_range::CellRange};
use crate::ports::routine::Routine;
use crate::ports::spreadsheet::{SpreadsheetClient, SpreadsheetError, Tab};

const STAMP_TAB_ROWS: u32 = 10;
const STAMP_TAB_COLS: u32 = 5;
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Asia/Kolkata has no daylight saving, a fixed UTC+05:30 is exact.
fn kolkata_now() -> NaiveDateTime {
    Utc::now().naive_utc() + Duration::minutes(5 * 60 + 30)
}

/// Records when the batch last ran: a two-row block with the script name and
/// the current time at the top of a dedicated tab.
pub struct LastRunStamp {
    config: LastRunConfig,
    client: Arc<dyn SpreadsheetClient>,
    clock: fn() -> NaiveDateTime,
}

impl std::fmt::Debug for LastRunStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LastRunStamp")
            .field("config", &self.config)
            .finish()
    }
}

impl LastRunStamp {
    pub fn new(config: LastRunConfig, client: Arc<dyn SpreadsheetClient>) -> Self {
        Self {
            config,
            client,
            clock: kolkata_now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    async fn stamp_tab(&self) -> error_stack::Result<Arc<dyn Tab>, SyncJobError> {
        let document = self
            .client
            .open(&self.config.document_id)
            .await
            .change_context(SyncJobError::Write)?;

        match document.tab(&self.config.tab).await {
            Ok(tab) => Ok(tab),
            Err(report) if matches!(report.current_context(), SpreadsheetError::TabNotFound(_)) => {
                info!("🆕 Creating tab {}", self.config.tab);
                document
                    .create_tab(&self.config.tab, STAMP_TAB_ROWS, STAMP_TAB_COLS)
                    .await
                    .change_context(SyncJobError::Write)
            }
            Err(report) => Err(report.change_context(SyncJobError::Write)),
        }
    }

    #[instrument(skip(self))]
    async fn stamp(&self) -> error_stack::Result<String, SyncJobError> {
        let now = (self.clock)().format(TIME_FORMAT).to_string();
        let block = TabularBlock::from(vec![
            vec!["Script Name", "Last Run Time"],
            vec![self.config.script_name.as_str(), now.as_str()],
        ]);

        let range = CellRange::sized(CellPosition::origin(), 2, 2);
        self.stamp_tab()
            .await?
            .update(&range, &block)
            .await
            .change_context(SyncJobError::Write)
            .attach_printable_lazy(|| format!("Writing {}!{}", self.config.tab, range))?;

        Ok(now)
    }
}

#[async_trait::async_trait]
impl Routine for LastRunStamp {
    fn name(&self) -> &str {
        "Last run"
    }

    #[instrument(skip(self), name = "LastRunStamp::run")]
    async fn run(&self) -> JobResult {
        match self.stamp().await {
            Ok(now) => {
                info!("🕒 Logged run for '{}' at {}", self.config.script_name, now);
                JobResult::success(self.name(), 1)
            }
            Err(report) => {
                error!("{:?}", report);
                JobResult::error(self.name(), report_message(&report))
            }
        }
    }
}
