use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use error_stack::{report, AttachmentKind, FrameKind, Report, ResultExt};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::domain::block::{project_row, CellRow, CellValue, TabularBlock};
use crate::domain::date::parse_cell_date;
use crate::domain::filter::{FilterRule, RowFilter};
use crate::domain::job::{EmptyPolicy, JobResult, JobSpec};
use crate::domain::preserve::{overlay_keyed, overlay_positional};
use crate::domain::sheets::{
    cell_range::CellRange, column::Column, location::SheetLocation,
};
use crate::ports::routine::Routine;
use crate::ports::spreadsheet::{SpreadsheetClient, SpreadsheetError, SpreadsheetResult, Tab};

/// Rows given to a destination tab created on the fly.
const CREATED_TAB_MIN_ROWS: usize = 1000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncJobError {
    #[error("Failed to read source data")]
    SourceFetch,
    #[error("Failed to write destination")]
    Write,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SyncOutcome {
    Written(usize),
    NoData(String),
}

/// Header and filtered body of one source block, already projected.
#[derive(Debug, Clone, PartialEq, Default)]
struct Segment {
    header: Vec<CellRow>,
    body: Vec<CellRow>,
}

impl Segment {
    /// `Err` carries why the block yields nothing.
    fn cut(
        source: TabularBlock,
        header_row_offset: usize,
        header_rows: usize,
        rule: &FilterRule,
        filter: &RowFilter,
        columns: Option<&[usize]>,
    ) -> Result<Self, String> {
        let required_width = rule.required_width();
        if source.width() < required_width {
            return Err(format!(
                "source is {} columns wide, the filter needs {}",
                source.width(),
                required_width
            ));
        }

        let source_rows = source.len();
        let Some(split) = source.split(header_row_offset, header_rows) else {
            return Err(format!(
                "source has {} rows, fewer than its {} metadata and {} header rows",
                source_rows, header_row_offset, header_rows
            ));
        };

        let mut segment = Segment {
            header: split.header,
            body: filter.apply(split.body),
        };
        if let Some(columns) = columns {
            let project = |rows: Vec<CellRow>| -> Vec<CellRow> {
                rows.iter().map(|row| project_row(row, columns)).collect()
            };
            segment.header = project(segment.header);
            segment.body = project(segment.body);
        }
        Ok(segment)
    }

    fn is_empty(&self) -> bool {
        self.header.is_empty() && self.body.is_empty()
    }

    fn into_rows(self) -> Vec<CellRow> {
        let mut rows = self.header;
        rows.extend(self.body);
        rows
    }
}

/// Flattens a report into one line, outermost context first. Printable
/// attachments follow the context they were attached to.
pub fn report_message<C>(report: &Report<C>) -> String {
    let mut parts = Vec::new();
    let mut attachments = Vec::new();

    for frame in report.frames() {
        match frame.kind() {
            FrameKind::Context(context) => {
                parts.push(context.to_string());
                parts.append(&mut attachments);
            }
            FrameKind::Attachment(AttachmentKind::Printable(attachment)) => {
                attachments.push(attachment.to_string());
            }
            _ => {}
        }
    }

    parts.join(": ")
}

/// Filter-and-replace transfer of one [`JobSpec`]: the destination range ends
/// up holding the source header followed by the source rows the filter keeps.
pub struct SheetSyncJob {
    spec: JobSpec,
    client: Arc<dyn SpreadsheetClient>,
}

impl fmt::Debug for SheetSyncJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SheetSyncJob")
            .field("job", &self.spec.name)
            .finish()
    }
}

impl SheetSyncJob {
    pub fn new(spec: JobSpec, client: Arc<dyn SpreadsheetClient>) -> Self {
        Self { spec, client }
    }

    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    async fn open_tab(&self, location: &SheetLocation) -> SpreadsheetResult<Arc<dyn Tab>> {
        let document = self.client.open(&location.document_id).await?;
        document.tab(&location.tab).await
    }

    /// One resolved filter per source, primary first. Reference cells shared
    /// by several rules are read once.
    #[instrument(skip(self), fields(job = %self.spec.name))]
    async fn resolve_filters(&self) -> error_stack::Result<Vec<RowFilter>, SyncJobError> {
        let mut reference_dates = HashMap::new();

        for reference in self.spec.filters().flat_map(FilterRule::references) {
            if reference_dates.contains_key(reference) {
                continue;
            }

            let block = self
                .open_tab(reference)
                .await
                .change_context(SyncJobError::SourceFetch)?
                .get(&reference.range)
                .await
                .change_context(SyncJobError::SourceFetch)
                .attach_printable_lazy(|| format!("Reading reference cell {}", reference))?;

            let cell = block
                .rows
                .first()
                .and_then(|row| row.first())
                .cloned()
                .unwrap_or_default();

            let date = parse_cell_date(&cell).ok_or_else(|| {
                report!(SyncJobError::SourceFetch).attach_printable(format!(
                    "Reference cell {} holds no date: '{}'",
                    reference,
                    cell.display()
                ))
            })?;

            reference_dates.insert(reference.clone(), date);
        }

        self.spec
            .filters()
            .map(|rule| {
                rule.resolve(&reference_dates)
                    .change_context(SyncJobError::SourceFetch)
            })
            .collect()
    }

    #[instrument(skip(self), fields(job = %self.spec.name))]
    async fn fetch(&self, source: &SheetLocation) -> error_stack::Result<TabularBlock, SyncJobError> {
        info!("{}: 📥 Reading {}", self.spec.name, source);
        let block = self
            .open_tab(source)
            .await
            .change_context(SyncJobError::SourceFetch)
            .attach_printable_lazy(|| format!("Opening source {}", source))?
            .get(&source.range)
            .await
            .change_context(SyncJobError::SourceFetch)
            .attach_printable_lazy(|| format!("Reading source {}", source))?;
        info!("{}: 📥 Fetched {} rows", self.spec.name, block.len());
        Ok(block)
    }

    /// Primary block followed by every stacked block, cut to the shape of the
    /// destination, and the number of data rows. `Err` carries why nothing
    /// should be written.
    fn build_block(
        &self,
        primary: Segment,
        stacked: Vec<(usize, Segment)>,
    ) -> Result<(TabularBlock, usize), String> {
        let spec = &self.spec;

        let rows_written = primary.body.len()
            + stacked.iter().map(|(_, segment)| segment.body.len()).sum::<usize>();
        if rows_written == 0 && spec.on_empty == EmptyPolicy::Skip {
            return Err("no rows matched the filter".to_owned());
        }

        let mut rows = primary.into_rows();
        for (gap_rows, segment) in stacked {
            if segment.is_empty() {
                continue;
            }
            rows.extend(std::iter::repeat_with(Vec::new).take(gap_rows));
            rows.extend(segment.into_rows());
        }

        let mut block = TabularBlock::new(rows);
        if let Some(width) = spec.destination.range.column_count() {
            block.truncate_width(width);
        }

        Ok((block, rows_written))
    }

    /// Size of a destination tab created on the fly: room for the block
    /// below and right of the range's anchor.
    fn created_tab_size(&self, block: &TabularBlock) -> error_stack::Result<(u32, u32), SyncJobError> {
        let range = &self.spec.destination.range;
        let anchor = range.anchor();

        let header_width = block.rows.first().map(Vec::len).unwrap_or(0);
        let width = range
            .column_count()
            .unwrap_or_else(|| block.width())
            .max(header_width)
            .max(self.spec.preserve_column.as_ref().map_or(0, |p| p.required_width()))
            .max(1);
        let cols = anchor.col.index() + width;
        let rows = (anchor.row.index() + block.len()).max(CREATED_TAB_MIN_ROWS);

        let to_u32 = |value: usize| {
            u32::try_from(value)
                .change_context(SyncJobError::Write)
                .attach_printable_lazy(|| format!("{} does not fit a sheet grid", value))
        };
        Ok((to_u32(rows)?, to_u32(cols)?))
    }

    #[instrument(skip(self, block), fields(job = %self.spec.name))]
    async fn destination_tab(
        &self,
        block: &TabularBlock,
    ) -> error_stack::Result<Arc<dyn Tab>, SyncJobError> {
        let destination = &self.spec.destination;
        let document = self
            .client
            .open(&destination.document_id)
            .await
            .change_context(SyncJobError::Write)
            .attach_printable_lazy(|| format!("Opening destination {}", destination))?;

        match document.tab(&destination.tab).await {
            Ok(tab) => Ok(tab),
            Err(report)
                if self.spec.create_missing_tab
                    && matches!(report.current_context(), SpreadsheetError::TabNotFound(_)) =>
            {
                let (rows, cols) = self.created_tab_size(block)?;
                info!(
                    "🆕 Tab {} not found, creating it ({} x {})",
                    destination.tab, rows, cols
                );
                document
                    .create_tab(&destination.tab, rows, cols)
                    .await
                    .change_context(SyncJobError::Write)
            }
            Err(report) => Err(report.change_context(SyncJobError::Write)),
        }
    }

    /// Values of the destination column `offset` columns right of the
    /// range's anchor, aligned with the rows being written.
    async fn destination_column(
        &self,
        tab: &dyn Tab,
        offset: usize,
    ) -> error_stack::Result<Vec<CellValue>, SyncJobError> {
        let anchor = self.spec.destination.range.anchor();
        let column = Column::from_index(anchor.col.index() + offset);

        let values = tab
            .col_values(column)
            .await
            .change_context(SyncJobError::Write)
            .attach_printable_lazy(|| format!("Reading destination column {}", column))?;

        Ok(values.into_iter().skip(anchor.row.index()).collect())
    }

    #[instrument(skip(self, tab, block), fields(job = %self.spec.name))]
    async fn preserve_column(
        &self,
        tab: &dyn Tab,
        block: &mut TabularBlock,
    ) -> error_stack::Result<(), SyncJobError> {
        let Some(preserve) = &self.spec.preserve_column else {
            return Ok(());
        };

        let old_column = self.destination_column(tab, preserve.column).await?;
        let width = self
            .spec
            .destination
            .range
            .column_count()
            .unwrap_or_else(|| block.width())
            .max(preserve.required_width());
        block.pad_width(width);

        match preserve.key_column {
            None => overlay_positional(&mut block.rows, preserve.column, &old_column),
            Some(key_column) => {
                let old_keys = self.destination_column(tab, key_column).await?;
                overlay_keyed(
                    &mut block.rows,
                    preserve.column,
                    key_column,
                    &old_keys,
                    &old_column,
                );
            }
        }

        Ok(())
    }

    #[instrument(skip(self), fields(job = %self.spec.name))]
    async fn sync(&self) -> error_stack::Result<SyncOutcome, SyncJobError> {
        let spec = &self.spec;

        let mut filters = self.resolve_filters().await?.into_iter();
        let primary_filter = filters.next().unwrap_or(RowFilter::All);

        let source = self.fetch(&spec.source).await?;
        let primary = match Segment::cut(
            source,
            spec.header_row_offset,
            spec.header_rows,
            &spec.filter,
            &primary_filter,
            spec.columns.as_deref(),
        ) {
            Ok(segment) => segment,
            Err(reason) => return Ok(SyncOutcome::NoData(reason)),
        };

        let mut stacked = Vec::with_capacity(spec.stacked.len());
        for (source, filter) in spec.stacked.iter().zip(filters) {
            let block = self.fetch(&source.location).await?;
            match Segment::cut(
                block,
                source.header_row_offset,
                source.header_rows,
                &source.filter,
                &filter,
                source.columns.as_deref(),
            ) {
                Ok(segment) => stacked.push((source.gap_rows, segment)),
                Err(reason) => warn!("{}: skipping {}, {}", spec.name, source.location, reason),
            }
        }

        let (mut block, rows_written) = match self.build_block(primary, stacked) {
            Ok(built) => built,
            Err(reason) => return Ok(SyncOutcome::NoData(reason)),
        };

        let tab = self.destination_tab(&block).await?;
        self.preserve_column(tab.as_ref(), &mut block).await?;

        let destination = &spec.destination;
        info!("{}: 🧹 Clearing {}", spec.name, destination);
        tab.batch_clear(std::slice::from_ref(&destination.range))
            .await
            .change_context(SyncJobError::Write)
            .attach_printable_lazy(|| format!("Clearing {}", destination))?;

        if !block.is_empty() {
            let range =
                CellRange::sized(destination.range.anchor(), block.len(), block.width().max(1));
            info!("{}: 📤 Writing {} rows to {}", spec.name, block.len(), range);
            tab.update(&range, &block)
                .await
                .change_context(SyncJobError::Write)
                .attach_printable_lazy(|| format!("Writing {}!{}", destination.tab, range))?;
        }

        Ok(SyncOutcome::Written(rows_written))
    }
}

#[async_trait::async_trait]
impl Routine for SheetSyncJob {
    fn name(&self) -> &str {
        &self.spec.name
    }

    #[instrument(skip(self), name = "SheetSyncJob::run", fields(job = %self.spec.name))]
    async fn run(&self) -> JobResult {
        match self.sync().await {
            Ok(SyncOutcome::Written(rows_written)) => {
                JobResult::success(&self.spec.name, rows_written)
            }
            Ok(SyncOutcome::NoData(reason)) => {
                warn!("{}: ⚠️ Nothing written, {}", self.spec.name, reason);
                JobResult::no_data(&self.spec.name, reason)
            }
            Err(report) => {
                error!("{}: {:?}", self.spec.name, report);
                JobResult::error(&self.spec.name, report_message(&report))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::adapters::sheets::in_memory::{FailingOperation, InMemorySpreadsheets, TabOperation};
    use crate::domain::filter::FilterRule;
    use crate::domain::job::{JobStatus, StackedSource};
    use crate::domain::preserve::PreservedColumn;

    fn location(document_id: &str, tab: &str, range: &str) -> SheetLocation {
        SheetLocation::new(document_id, tab, range.parse().unwrap())
    }

    fn leads() -> TabularBlock {
        TabularBlock::from(vec![
            vec!["City", "Name"],
            vec!["Delhi NCR", "A"],
            vec!["Mumbai", "B"],
            vec!["delhi ncr", "C"],
        ])
    }

    fn delhi_job() -> JobSpec {
        JobSpec::new(
            "FSE",
            location("src", "raw_leads", "A:AC"),
            location("dst", "FSE", "A:AC"),
        )
        .with_filter(FilterRule::match_any(0, &["delhi ncr"]))
    }

    fn job(spec: JobSpec, sheets: &Arc<InMemorySpreadsheets>) -> SheetSyncJob {
        SheetSyncJob::new(spec, sheets.clone())
    }

    #[tokio::test]
    async fn test_filters_and_replaces_destination() {
        let sheets = Arc::new(InMemorySpreadsheets::new());
        sheets.add_tab("src", "raw_leads", leads());
        let destination = sheets.add_tab(
            "dst",
            "FSE",
            TabularBlock::from(vec![vec!["old", "old"], vec!["old"], vec!["old"], vec!["old"]]),
        );

        let result = job(delhi_job(), &sheets).run().await;

        assert_eq!(result, JobResult::success("FSE", 2));
        assert_eq!(
            destination.snapshot(),
            TabularBlock::from(vec![
                vec!["City", "Name"],
                vec!["Delhi NCR", "A"],
                vec!["delhi ncr", "C"],
            ])
        );
        assert_eq!(
            destination.operations(),
            vec![
                TabOperation::Clear(vec!["A1:AC".to_owned()]),
                TabOperation::Update("A1:B3".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn test_no_match_leaves_destination_untouched() {
        let sheets = Arc::new(InMemorySpreadsheets::new());
        sheets.add_tab("src", "raw_leads", TabularBlock::from(vec![vec!["City"], vec!["Pune"]]));
        let destination = sheets.add_tab("dst", "FSE", TabularBlock::from(vec![vec!["kept"]]));

        let result = job(delhi_job(), &sheets).run().await;

        assert_eq!(result.status, JobStatus::NoData);
        assert!(!destination.was_mutated());
        assert_eq!(destination.snapshot(), TabularBlock::from(vec![vec!["kept"]]));
    }

    #[tokio::test]
    async fn test_source_narrower_than_filter_is_no_data() {
        let sheets = Arc::new(InMemorySpreadsheets::new());
        sheets.add_tab("src", "raw_leads", TabularBlock::from(vec![vec!["City"], vec!["Delhi NCR"]]));
        let destination = sheets.add_tab("dst", "FSE", TabularBlock::default());

        let spec = delhi_job().with_filter(FilterRule::match_any(2, &["delhi ncr"]));
        let result = job(spec, &sheets).run().await;

        assert_eq!(result.status, JobStatus::NoData);
        assert!(destination.operations().is_empty());
    }

    #[tokio::test]
    async fn test_source_shorter_than_header_is_no_data() {
        let sheets = Arc::new(InMemorySpreadsheets::new());
        sheets.add_tab("src", "raw_leads", TabularBlock::from(vec![vec!["Report"], vec![""]]));
        let destination = sheets.add_tab("dst", "OS_Collection", TabularBlock::default());

        let spec = JobSpec::new(
            "OS_Collection",
            location("src", "raw_leads", "A:Q"),
            location("dst", "OS_Collection", "A:Q"),
        )
        .with_header_row_offset(2)
        .with_on_empty(EmptyPolicy::WriteHeader);
        let result = job(spec, &sheets).run().await;

        assert_eq!(result.status, JobStatus::NoData);
        assert!(!destination.was_mutated());
    }

    #[tokio::test]
    async fn test_write_header_when_nothing_matches() {
        let sheets = Arc::new(InMemorySpreadsheets::new());
        sheets.add_tab(
            "src",
            "OS_ETM_Summary",
            TabularBlock::from(vec![
                vec!["Summary"],
                vec![""],
                vec!["ETM", "City"],
                vec!["1", "Gurgaon"],
            ]),
        );
        let destination = sheets.add_tab(
            "dst",
            "OS_Collection",
            TabularBlock::from(vec![vec!["old", "old"], vec!["1", "Delhi"]]),
        );

        let spec = JobSpec::new(
            "OS_Collection",
            location("src", "OS_ETM_Summary", "A:Q"),
            location("dst", "OS_Collection", "A:Q"),
        )
        .with_header_row_offset(2)
        .with_filter(FilterRule::match_any(1, &["Delhi NCR", "Sukhrali", "Noida", "Delhi"]))
        .with_on_empty(EmptyPolicy::WriteHeader);
        let result = job(spec, &sheets).run().await;

        assert_eq!(result, JobResult::success("OS_Collection", 0));
        assert_eq!(destination.snapshot(), TabularBlock::from(vec![vec!["ETM", "City"]]));
    }

    #[tokio::test]
    async fn test_headerless_copy_keeps_anchor_row() {
        let sheets = Arc::new(InMemorySpreadsheets::new());
        sheets.add_tab(
            "src",
            "Car Info",
            TabularBlock::from(vec![vec!["header", "h"], vec!["DL1", "EV"], vec!["DL2", "CNG"]]),
        );
        let destination = sheets.add_tab(
            "dst",
            "Details",
            TabularBlock::from(vec![vec!["Reg", "Type"], vec!["old", "old"]]),
        );

        let spec = JobSpec::new(
            "Car Info",
            location("src", "Car Info", "A2:K"),
            location("dst", "Details", "A2:K"),
        )
        .with_header_rows(0);
        let result = job(spec, &sheets).run().await;

        assert_eq!(result, JobResult::success("Car Info", 2));
        assert_eq!(
            destination.snapshot(),
            TabularBlock::from(vec![vec!["Reg", "Type"], vec!["DL1", "EV"], vec!["DL2", "CNG"]])
        );
    }

    #[tokio::test]
    async fn test_preserved_column_survives_rewrite() {
        let sheets = Arc::new(InMemorySpreadsheets::new());
        sheets.add_tab(
            "src",
            "Raw Data",
            TabularBlock::from(vec![
                vec!["City", "Name", "Source remark"],
                vec!["Delhi NCR", "A", "from source"],
                vec!["Delhi NCR", "B", "from source"],
                vec!["Delhi NCR", "C", "from source"],
            ]),
        );
        let destination = sheets.add_tab(
            "dst",
            "New Joining",
            TabularBlock::from(vec![
                vec!["City", "Name", "Remark"],
                vec!["Delhi NCR", "A", "called"],
            ]),
        );

        let spec = JobSpec::new(
            "New Joining",
            location("src", "Raw Data", "A:ZZ"),
            location("dst", "New Joining", "A1:C"),
        )
        .with_filter(FilterRule::match_any(0, &["delhi ncr"]))
        .with_preserved_column(PreservedColumn::positional(2));
        let result = job(spec, &sheets).run().await;

        assert_eq!(result, JobResult::success("New Joining", 3));
        assert_eq!(
            destination.snapshot(),
            TabularBlock::from(vec![
                vec!["City", "Name", "Remark"],
                vec!["Delhi NCR", "A", "called"],
                vec!["Delhi NCR", "B"],
                vec!["Delhi NCR", "C"],
            ])
        );
    }

    #[tokio::test]
    async fn test_column_projection() {
        let sheets = Arc::new(InMemorySpreadsheets::new());
        sheets.add_tab(
            "src",
            "Car Info from CNG",
            TabularBlock::from(vec![
                vec!["loc", "etm", "x", "y", "start"],
                vec!["L1", "", "x", "y", "2024"],
                vec!["L2", "E2", "x", "y", "2025"],
            ]),
        );
        let destination = sheets.add_tab("dst", "Info Data", TabularBlock::default());

        let spec = JobSpec::new(
            "Car Info from CNG",
            location("src", "Car Info from CNG", "A:K"),
            location("dst", "Info Data", "A:H"),
        )
        .with_filter(FilterRule::NonEmpty { column: 1 })
        .with_columns(vec![0, 1, 4]);
        let result = job(spec, &sheets).run().await;

        assert_eq!(result.rows_written, 1);
        assert_eq!(
            destination.snapshot(),
            TabularBlock::from(vec![vec!["loc", "etm", "start"], vec!["L2", "E2", "2025"]])
        );
    }

    #[tokio::test]
    async fn test_missing_destination_tab_is_created() {
        let sheets = Arc::new(InMemorySpreadsheets::new());
        sheets.add_tab("src", "raw_leads", leads());
        sheets.document("dst");

        let result = job(delhi_job(), &sheets).run().await;

        assert_eq!(result.status, JobStatus::Success);
        let created = sheets.find_tab("dst", "FSE").unwrap();
        assert_eq!(created.grid_size(), Some((1000, 29)));
        assert_eq!(created.snapshot().len(), 3);
    }

    #[tokio::test]
    async fn test_created_tab_leaves_room_for_anchor() {
        let sheets = Arc::new(InMemorySpreadsheets::new());
        sheets.add_tab("src", "raw_leads", leads());
        sheets.document("dst");

        let spec = JobSpec::new(
            "FSE",
            location("src", "raw_leads", "A:B"),
            location("dst", "FSE", "C2:E"),
        )
        .with_filter(FilterRule::match_any(0, &["delhi ncr"]));
        let result = job(spec, &sheets).run().await;

        assert_eq!(result, JobResult::success("FSE", 2));
        let created = sheets.find_tab("dst", "FSE").unwrap();
        assert_eq!(created.grid_size(), Some((1000, 5)));
        assert_eq!(
            created.operations(),
            vec![
                TabOperation::Clear(vec!["C2:E".to_owned()]),
                TabOperation::Update("C2:D4".to_owned()),
            ]
        );
        assert_eq!(created.snapshot().rows[1][2], CellValue::from("City"));
    }

    #[tokio::test]
    async fn test_created_tab_counts_rows_above_anchor() {
        let sheets = Arc::new(InMemorySpreadsheets::new());
        let mut rows = vec![vec!["Reg".to_owned()]];
        rows.extend((0..1000).map(|n| vec![format!("DL{}", n)]));
        sheets.add_tab(
            "src",
            "Car Info",
            TabularBlock::new(
                rows.into_iter()
                    .map(|row| row.into_iter().map(CellValue::from).collect())
                    .collect(),
            ),
        );
        sheets.document("dst");

        let spec = JobSpec::new(
            "Details",
            location("src", "Car Info", "A:A"),
            location("dst", "Details", "A2:A"),
        );
        let result = job(spec, &sheets).run().await;

        assert_eq!(result, JobResult::success("Details", 1000));
        assert_eq!(
            sheets.find_tab("dst", "Details").unwrap().grid_size(),
            Some((1002, 1))
        );
    }

    #[tokio::test]
    async fn test_stacked_source_written_below_gap() {
        let sheets = Arc::new(InMemorySpreadsheets::new());
        sheets.add_tab(
            "src",
            "Leasing_Raw",
            TabularBlock::from(vec![vec!["L1", "L2"], vec!["l", "l"]]),
        );
        sheets.add_tab(
            "src",
            "Revshare_Raw",
            TabularBlock::from(vec![
                vec!["R0", "R1", "R2", "R3"],
                vec!["r", "x", "dropped", "y"],
                vec!["", "orphan", "", ""],
            ]),
        );
        let destination = sheets.add_tab(
            "dst",
            "Recovery",
            TabularBlock::from(vec![vec!["stale"], vec![], vec![], vec![], vec!["stale"], vec!["stale"], vec!["stale"]]),
        );

        let spec = JobSpec::new(
            "Recovery",
            location("src", "Leasing_Raw", "A:G"),
            location("dst", "Recovery", "A:G"),
        )
        .with_stacked_source(
            StackedSource::new(location("src", "Revshare_Raw", "A:H"))
                .with_gap_rows(2)
                .with_filter(FilterRule::NonEmpty { column: 0 })
                .with_columns(vec![0, 1, 3]),
        );
        let result = job(spec, &sheets).run().await;

        assert_eq!(result, JobResult::success("Recovery", 2));
        assert_eq!(
            destination.snapshot(),
            TabularBlock::from(vec![
                vec!["L1", "L2"],
                vec!["l", "l"],
                vec![],
                vec![],
                vec!["R0", "R1", "R3"],
                vec!["r", "x", "y"],
            ])
        );
        assert_eq!(
            destination.operations(),
            vec![
                TabOperation::Clear(vec!["A1:G".to_owned()]),
                TabOperation::Update("A1:C6".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn test_stacked_rows_count_when_primary_has_none() {
        let sheets = Arc::new(InMemorySpreadsheets::new());
        sheets.add_tab(
            "src",
            "Car Info from CNG",
            TabularBlock::from(vec![vec!["loc", "etm"], vec!["L1", ""]]),
        );
        sheets.add_tab(
            "src",
            "Car Info from EV",
            TabularBlock::from(vec![vec!["loc", "etm"], vec!["L2", "E2"], vec!["L3", ""]]),
        );
        let destination = sheets.add_tab("dst", "Info Data", TabularBlock::default());

        let spec = JobSpec::new(
            "Info Data",
            location("src", "Car Info from CNG", "A:B"),
            location("dst", "Info Data", "A:B"),
        )
        .with_filter(FilterRule::NonEmpty { column: 1 })
        .with_stacked_source(
            StackedSource::new(location("src", "Car Info from EV", "A:B"))
                .with_header_row_offset(1)
                .with_header_rows(0)
                .with_filter(FilterRule::NonEmpty { column: 1 }),
        );
        let result = job(spec, &sheets).run().await;

        assert_eq!(result, JobResult::success("Info Data", 1));
        assert_eq!(
            destination.snapshot(),
            TabularBlock::from(vec![vec!["loc", "etm"], vec!["L2", "E2"]])
        );
    }

    #[tokio::test]
    async fn test_unreadable_stacked_source_fails_job() {
        let sheets = Arc::new(InMemorySpreadsheets::new());
        sheets.add_tab("src", "raw_leads", leads());
        let destination = sheets.add_tab("dst", "FSE", TabularBlock::default());

        let spec = delhi_job()
            .with_stacked_source(StackedSource::new(location("src", "missing", "A:B")));
        let result = job(spec, &sheets).run().await;

        assert!(result.message.starts_with("Failed to read source data"), "{}", result.message);
        assert!(!destination.was_mutated());
    }

    #[tokio::test]
    async fn test_missing_destination_tab_without_creation_fails() {
        let sheets = Arc::new(InMemorySpreadsheets::new());
        sheets.add_tab("src", "raw_leads", leads());
        sheets.document("dst");

        let result = job(delhi_job().without_tab_creation(), &sheets).run().await;

        assert!(result.is_error());
        assert!(result.message.contains("Tab not found: FSE"), "{}", result.message);
        assert!(sheets.find_tab("dst", "FSE").is_none());
    }

    #[tokio::test]
    async fn test_date_reference_filter() {
        let sheets = Arc::new(InMemorySpreadsheets::new());
        sheets.add_tab("dst", "Dashboard", TabularBlock::new(vec![vec![
            CellValue::Empty,
            CellValue::Number(45352.0),
        ]]));
        sheets.add_tab(
            "src",
            "Allocations",
            TabularBlock::from(vec![
                vec!["Date", "Car"],
                vec!["01/03/2024", "first"],
                vec!["02/03/2024", "second"],
                vec!["not-a-date", "third"],
            ]),
        );
        let destination = sheets.add_tab("dst", "Today", TabularBlock::default());

        let reference = location("dst", "Dashboard", "B1");
        let spec = JobSpec::new(
            "Today",
            location("src", "Allocations", "A:B"),
            location("dst", "Today", "A:B"),
        )
        .with_filter(FilterRule::DateEquals {
            column: 0,
            reference,
        });
        let result = job(spec, &sheets).run().await;

        assert_eq!(result, JobResult::success("Today", 1));
        assert_eq!(
            destination.snapshot(),
            TabularBlock::from(vec![vec!["Date", "Car"], vec!["01/03/2024", "first"]])
        );
        assert_eq!(
            parse_cell_date(&CellValue::Number(45352.0)),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
    }

    #[tokio::test]
    async fn test_reference_without_date_is_an_error() {
        let sheets = Arc::new(InMemorySpreadsheets::new());
        sheets.add_tab("dst", "Dashboard", TabularBlock::from(vec![vec!["", "soon"]]));
        sheets.add_tab("src", "Allocations", leads());
        let destination = sheets.add_tab("dst", "Today", TabularBlock::default());

        let spec = JobSpec::new(
            "Today",
            location("src", "Allocations", "A:B"),
            location("dst", "Today", "A:B"),
        )
        .with_filter(FilterRule::DateEquals {
            column: 0,
            reference: location("dst", "Dashboard", "B1"),
        });
        let result = job(spec, &sheets).run().await;

        assert!(result.is_error());
        assert!(result.message.starts_with("Failed to read source data"));
        assert!(!destination.was_mutated());
    }

    #[tokio::test]
    async fn test_failed_write_is_reported() {
        let sheets = Arc::new(InMemorySpreadsheets::new());
        sheets.add_tab("src", "raw_leads", leads());
        let destination = sheets.add_tab("dst", "FSE", TabularBlock::default());
        destination.fail(FailingOperation::Update);

        let result = job(delhi_job(), &sheets).run().await;

        assert!(result.is_error());
        assert!(result.message.starts_with("Failed to write destination"));
        assert_eq!(result.rows_written, 0);
    }

    #[test]
    fn test_report_message_lists_contexts_and_attachments() {
        let report = report!(SpreadsheetError::FailedToFetchRange)
            .attach_printable("Reading source doc/'Raw'!A1:C")
            .change_context(SyncJobError::SourceFetch);

        assert_eq!(
            report_message(&report),
            "Failed to read source data: Failed to fetch range: Reading source doc/'Raw'!A1:C"
        );
    }
}
