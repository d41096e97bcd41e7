use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use super::{filter::FilterRule, preserve::PreservedColumn, sheets::location::SheetLocation};

fn default_header_rows() -> usize {
    1
}

fn default_create_missing_tab() -> bool {
    true
}

/// What to do when no data row passes the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyPolicy {
    /// Leave the destination untouched and report `NoData`.
    #[default]
    Skip,
    /// Clear the destination and write only the header.
    WriteHeader,
}

/// A further source block written under the primary one, for destinations
/// that gather several tabs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackedSource {
    pub location: SheetLocation,
    /// Blank rows left between the block above and this one.
    #[serde(default)]
    pub gap_rows: usize,
    #[serde(default)]
    pub header_row_offset: usize,
    #[serde(default = "default_header_rows")]
    pub header_rows: usize,
    #[serde(default)]
    pub filter: FilterRule,
    #[serde(default)]
    pub columns: Option<Vec<usize>>,
}

impl StackedSource {
    pub fn new(location: SheetLocation) -> Self {
        Self {
            location,
            gap_rows: 0,
            header_row_offset: 0,
            header_rows: default_header_rows(),
            filter: FilterRule::All,
            columns: None,
        }
    }

    pub fn with_gap_rows(mut self, gap_rows: usize) -> Self {
        self.gap_rows = gap_rows;
        self
    }

    pub fn with_header_row_offset(mut self, offset: usize) -> Self {
        self.header_row_offset = offset;
        self
    }

    pub fn with_header_rows(mut self, header_rows: usize) -> Self {
        self.header_rows = header_rows;
        self
    }

    pub fn with_filter(mut self, filter: FilterRule) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_columns(mut self, columns: Vec<usize>) -> Self {
        self.columns = Some(columns);
        self
    }
}

/// One filter-and-replace transfer, as data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    pub source: SheetLocation,
    pub destination: SheetLocation,
    /// Rows above the header that are dropped (report titles, blank lines).
    #[serde(default)]
    pub header_row_offset: usize,
    /// Rows copied as-is and never filtered. Zero for headerless copies.
    #[serde(default = "default_header_rows")]
    pub header_rows: usize,
    #[serde(default)]
    pub filter: FilterRule,
    /// Source columns to keep, in output order. All columns when absent.
    #[serde(default)]
    pub columns: Option<Vec<usize>>,
    /// Blocks written below the primary source, in order.
    #[serde(default)]
    pub stacked: Vec<StackedSource>,
    #[serde(default)]
    pub preserve_column: Option<PreservedColumn>,
    #[serde(default)]
    pub on_empty: EmptyPolicy,
    #[serde(default = "default_create_missing_tab")]
    pub create_missing_tab: bool,
}

impl JobSpec {
    /// A job copying `source` to `destination` unfiltered, header on the first row.
    pub fn new(name: impl Into<String>, source: SheetLocation, destination: SheetLocation) -> Self {
        Self {
            name: name.into(),
            source,
            destination,
            header_row_offset: 0,
            header_rows: default_header_rows(),
            filter: FilterRule::All,
            columns: None,
            stacked: Vec::new(),
            preserve_column: None,
            on_empty: EmptyPolicy::Skip,
            create_missing_tab: default_create_missing_tab(),
        }
    }

    pub fn with_filter(mut self, filter: FilterRule) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_header_row_offset(mut self, offset: usize) -> Self {
        self.header_row_offset = offset;
        self
    }

    pub fn with_header_rows(mut self, header_rows: usize) -> Self {
        self.header_rows = header_rows;
        self
    }

    pub fn with_columns(mut self, columns: Vec<usize>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn with_stacked_source(mut self, source: StackedSource) -> Self {
        self.stacked.push(source);
        self
    }

    /// Every filter rule the job applies, primary source first.
    pub fn filters(&self) -> impl Iterator<Item = &FilterRule> {
        std::iter::once(&self.filter).chain(self.stacked.iter().map(|source| &source.filter))
    }

    pub fn with_preserved_column(mut self, preserve: PreservedColumn) -> Self {
        self.preserve_column = Some(preserve);
        self
    }

    pub fn with_on_empty(mut self, on_empty: EmptyPolicy) -> Self {
        self.on_empty = on_empty;
        self
    }

    pub fn without_tab_creation(mut self) -> Self {
        self.create_missing_tab = false;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Success,
    NoData,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub job: String,
    pub rows_written: usize,
    pub status: JobStatus,
    pub message: String,
}

impl JobResult {
    pub fn success(job: impl Into<String>, rows_written: usize) -> Self {
        Self {
            job: job.into(),
            rows_written,
            status: JobStatus::Success,
            message: format!("{} rows written", rows_written),
        }
    }

    pub fn no_data(job: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            rows_written: 0,
            status: JobStatus::NoData,
            message: message.into(),
        }
    }

    pub fn error(job: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            rows_written: 0,
            status: JobStatus::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == JobStatus::Error
    }
}

impl std::fmt::Display for JobResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let marker = match self.status {
            JobStatus::Success => "✅",
            JobStatus::NoData => "⚠️",
            JobStatus::Error => "❌",
        };
        write!(f, "{} {}: {} ({})", marker, self.job, self.status, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_job_with_defaults() {
        let job: JobSpec = serde_json::from_value(json!({
            "name": "FSE",
            "source": { "document_id": "src", "tab": "raw_leads", "range": "A:AC" },
            "destination": { "document_id": "dst", "tab": "FSE", "range": "A:AC" },
            "filter": { "kind": "match_any", "column": 2, "values": ["delhi ncr"] },
        }))
        .unwrap();

        assert_eq!(job.header_rows, 1);
        assert_eq!(job.header_row_offset, 0);
        assert_eq!(job.on_empty, EmptyPolicy::Skip);
        assert!(job.create_missing_tab);
        assert!(job.stacked.is_empty());
        assert_eq!(job.filter, FilterRule::match_any(2, &["delhi ncr"]));
    }

    #[test]
    fn test_deserialize_stacked_source() {
        let job: JobSpec = serde_json::from_value(json!({
            "name": "Recovery",
            "source": { "document_id": "src", "tab": "Leasing_Raw", "range": "A:G" },
            "destination": { "document_id": "dst", "tab": "Recovery", "range": "A:G" },
            "stacked": [{
                "location": { "document_id": "src", "tab": "Revshare_Raw", "range": "A:H" },
                "gap_rows": 2,
                "filter": { "kind": "non_empty", "column": 0 },
                "columns": [0, 1, 3, 4, 5, 6, 7],
            }],
        }))
        .unwrap();

        let stacked = &job.stacked[0];
        assert_eq!(stacked.gap_rows, 2);
        assert_eq!(stacked.header_rows, 1);
        assert_eq!(stacked.header_row_offset, 0);
        assert_eq!(stacked.columns, Some(vec![0, 1, 3, 4, 5, 6, 7]));
        assert_eq!(
            job.filters().collect::<Vec<_>>(),
            vec![&FilterRule::All, &FilterRule::NonEmpty { column: 0 }]
        );
    }

    #[test]
    fn test_deserialize_job_with_preserved_column() {
        let job: JobSpec = serde_json::from_value(json!({
            "name": "New Joining",
            "source": { "document_id": "src", "tab": "Raw Data", "range": "A:ZZ" },
            "destination": { "document_id": "dst", "tab": "New Joining", "range": "A1:U" },
            "preserve_column": { "column": 20 },
            "on_empty": "write_header",
        }))
        .unwrap();

        assert_eq!(job.preserve_column, Some(PreservedColumn::positional(20)));
        assert_eq!(job.on_empty, EmptyPolicy::WriteHeader);
        assert_eq!(job.filter, FilterRule::All);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(JobStatus::NoData.to_string(), "no_data");
        assert_eq!(JobStatus::Success.as_ref(), "success");
    }

    #[test]
    fn test_result_display() {
        let result = JobResult::success("FSE", 2);
        assert_eq!(result.to_string(), "✅ FSE: success (2 rows written)");
    }
}
