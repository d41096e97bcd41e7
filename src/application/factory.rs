use std::sync::Arc;
use std::time::Duration;

use crate::application::{batch::BatchRunner, last_run::LastRunStamp, sync_job::SheetSyncJob};
use crate::config::app_config::AppConfig;
use crate::domain::job::JobSpec;
use crate::domain::sheets::cell_range::CellRangeParseError;
use crate::jobs::builtin_jobs;
use crate::ports::{routine::Routine, spreadsheet::SpreadsheetClient};

pub struct BatchFactory;

impl BatchFactory {
    /// Built-in jobs, then the configured ones, then the last-run stamp.
    pub fn create(
        config: &AppConfig,
        client: Arc<dyn SpreadsheetClient>,
    ) -> Result<BatchRunner, CellRangeParseError> {
        let jobs = builtin_jobs()?
            .into_iter()
            .chain(config.jobs.iter().cloned())
            .collect();

        Ok(Self::from_jobs(jobs, config, client))
    }

    pub fn from_jobs(
        jobs: Vec<JobSpec>,
        config: &AppConfig,
        client: Arc<dyn SpreadsheetClient>,
    ) -> BatchRunner {
        let mut routines: Vec<Box<dyn Routine>> = jobs
            .into_iter()
            .map(|spec| Box::new(SheetSyncJob::new(spec, Arc::clone(&client))) as Box<dyn Routine>)
            .collect();

        if let Some(last_run) = &config.last_run {
            routines.push(Box::new(LastRunStamp::new(
                last_run.clone(),
                Arc::clone(&client),
            )));
        }

        BatchRunner::new(
            routines,
            Duration::from_millis(config.batch.inter_job_delay_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sheets::in_memory::InMemorySpreadsheets;

    #[test]
    fn test_configured_jobs_follow_builtin_ones() {
        let config = AppConfig::from_toml_str(
            r#"
            [last_run]
            document_id = "dst"
            script_name = "sheet-sync"

            [[jobs]]
            name = "Extra"
            source = { document_id = "src", tab = "Raw", range = "A:C" }
            destination = { document_id = "dst", tab = "Extra", range = "A:C" }
            "#,
        )
        .unwrap();

        let runner = BatchFactory::create(&config, Arc::new(InMemorySpreadsheets::new())).unwrap();
        let names = runner.routine_names();

        assert_eq!(names.first(), Some(&"FSE"));
        assert_eq!(names[names.len() - 2], "Extra");
        assert_eq!(names.last(), Some(&"Last run"));
    }

    #[test]
    fn test_no_stamp_without_last_run_section() {
        let runner = BatchFactory::from_jobs(
            Vec::new(),
            &AppConfig::default(),
            Arc::new(InMemorySpreadsheets::new()),
        );
        assert!(runner.is_empty());
    }
}
