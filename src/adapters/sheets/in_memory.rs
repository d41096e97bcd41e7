//! Spreadsheets held in memory. Behaves like the sheets API as far as the
//! jobs can tell (trailing blanks are never returned, bounded writes must fit
//! their range) and records every call so tests can assert on side effects.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use error_stack::report;

use crate::domain::block::{CellRow, CellValue, TabularBlock};
use crate::domain::sheets::{cell_range::CellRange, column::Column};
use crate::ports::spreadsheet::{
    Document, SpreadsheetClient, SpreadsheetError, SpreadsheetResult, Tab,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabOperation {
    Get(String),
    Update(String),
    Clear(Vec<String>),
    AppendRow,
    ColValues(String),
}

impl TabOperation {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            TabOperation::Update(_) | TabOperation::Clear(_) | TabOperation::AppendRow
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailingOperation {
    Get,
    Update,
    Clear,
    AppendRow,
    ColValues,
}

#[derive(Debug, Default)]
pub struct InMemorySpreadsheets {
    documents: Mutex<HashMap<String, Arc<InMemoryDocument>>>,
}

impl InMemorySpreadsheets {
    pub fn new() -> Self {
        Self::default()
    }

    /// The document with `id`, created empty if needed.
    pub fn document(&self, id: &str) -> Arc<InMemoryDocument> {
        let mut documents = lock(&self.documents);
        Arc::clone(documents.entry(id.to_owned()).or_insert_with(|| {
            Arc::new(InMemoryDocument {
                id: id.to_owned(),
                tabs: Mutex::new(Vec::new()),
            })
        }))
    }

    pub fn add_tab(
        &self,
        document_id: &str,
        tab: &str,
        block: impl Into<TabularBlock>,
    ) -> Arc<InMemoryTab> {
        self.document(document_id).add_tab(tab, block.into())
    }

    pub fn find_tab(&self, document_id: &str, tab: &str) -> Option<Arc<InMemoryTab>> {
        let document = lock(&self.documents).get(document_id).cloned()?;
        document.find_tab(tab)
    }
}

#[async_trait::async_trait]
impl SpreadsheetClient for InMemorySpreadsheets {
    async fn open(&self, document_id: &str) -> SpreadsheetResult<Arc<dyn Document>> {
        let document = lock(&self.documents).get(document_id).cloned();
        match document {
            Some(document) => Ok(document),
            None => Err(report!(SpreadsheetError::FailedToOpenDocument)
                .attach_printable(format!("no spreadsheet with id {}", document_id))),
        }
    }
}

#[derive(Debug)]
pub struct InMemoryDocument {
    id: String,
    tabs: Mutex<Vec<Arc<InMemoryTab>>>,
}

impl InMemoryDocument {
    pub fn add_tab(&self, name: &str, block: TabularBlock) -> Arc<InMemoryTab> {
        let tab = Arc::new(InMemoryTab::new(name, block.rows, None));
        let mut tabs = lock(&self.tabs);
        tabs.retain(|existing| existing.name != name);
        tabs.push(Arc::clone(&tab));
        tab
    }

    pub fn find_tab(&self, name: &str) -> Option<Arc<InMemoryTab>> {
        lock(&self.tabs)
            .iter()
            .find(|tab| tab.name == name)
            .cloned()
    }
}

#[async_trait::async_trait]
impl Document for InMemoryDocument {
    fn id(&self) -> &str {
        &self.id
    }

    async fn tab(&self, name: &str) -> SpreadsheetResult<Arc<dyn Tab>> {
        match self.find_tab(name) {
            Some(tab) => Ok(tab),
            None => Err(report!(SpreadsheetError::TabNotFound(name.to_owned()))),
        }
    }

    async fn create_tab(&self, name: &str, rows: u32, cols: u32) -> SpreadsheetResult<Arc<dyn Tab>> {
        let mut tabs = lock(&self.tabs);
        if tabs.iter().any(|tab| tab.name == name) {
            return Err(report!(SpreadsheetError::FailedToCreateTab)
                .attach_printable(format!("A sheet with the name \"{}\" already exists", name)));
        }
        let tab = Arc::new(InMemoryTab::new(name, Vec::new(), Some((rows, cols))));
        tabs.push(Arc::clone(&tab));
        Ok(tab)
    }
}

#[derive(Debug)]
pub struct InMemoryTab {
    name: String,
    grid: Mutex<Vec<CellRow>>,
    grid_size: Option<(u32, u32)>,
    operations: Mutex<Vec<TabOperation>>,
    failing: Mutex<HashSet<FailingOperation>>,
}

impl InMemoryTab {
    fn new(name: &str, rows: Vec<CellRow>, grid_size: Option<(u32, u32)>) -> Self {
        Self {
            name: name.to_owned(),
            grid: Mutex::new(rows),
            grid_size,
            operations: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Current content without trailing blanks, as a full-sheet read returns it.
    pub fn snapshot(&self) -> TabularBlock {
        let mut block = TabularBlock::new(lock(&self.grid).iter().map(|row| trim_row(row)).collect());
        block.trim_trailing_empty_rows();
        block
    }

    pub fn operations(&self) -> Vec<TabOperation> {
        lock(&self.operations).clone()
    }

    /// Whether anything cleared or wrote to this tab.
    pub fn was_mutated(&self) -> bool {
        lock(&self.operations).iter().any(TabOperation::is_mutation)
    }

    /// Size the tab was created with through [`Document::create_tab`].
    pub fn grid_size(&self) -> Option<(u32, u32)> {
        self.grid_size
    }

    /// Makes every later `operation` on this tab fail.
    pub fn fail(&self, operation: FailingOperation) {
        lock(&self.failing).insert(operation);
    }

    fn record(&self, operation: TabOperation) {
        lock(&self.operations).push(operation);
    }

    fn check(&self, operation: FailingOperation, error: SpreadsheetError) -> SpreadsheetResult<()> {
        if lock(&self.failing).contains(&operation) {
            return Err(report!(error).attach_printable(format!(
                "injected {:?} failure on tab {}",
                operation, self.name
            )));
        }
        Ok(())
    }
}

fn trim_row(row: &[CellValue]) -> CellRow {
    let len = row
        .iter()
        .rposition(|cell| !cell.is_blank())
        .map(|last| last + 1)
        .unwrap_or(0);
    row[..len].to_vec()
}

fn column_end(range: &CellRange, row_len: usize) -> usize {
    range
        .end_col
        .map(|end| (end.index() + 1).min(row_len))
        .unwrap_or(row_len)
}

#[async_trait::async_trait]
impl Tab for InMemoryTab {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, range: &CellRange) -> SpreadsheetResult<TabularBlock> {
        self.record(TabOperation::Get(range.to_string()));
        self.check(FailingOperation::Get, SpreadsheetError::FailedToFetchRange)?;

        let grid = lock(&self.grid);
        let first_row = range.start.row.index();
        let last_row = range
            .end_row
            .map(|end| (end.index() + 1).min(grid.len()))
            .unwrap_or(grid.len());
        let first_col = range.start.col.index();

        let rows = grid
            .get(first_row..last_row.max(first_row))
            .unwrap_or_default()
            .iter()
            .map(|row| {
                let end = column_end(range, row.len());
                trim_row(row.get(first_col..end.max(first_col)).unwrap_or_default())
            })
            .collect();

        let mut block = TabularBlock::new(rows);
        block.trim_trailing_empty_rows();
        Ok(block)
    }

    async fn update(&self, range: &CellRange, block: &TabularBlock) -> SpreadsheetResult<()> {
        self.record(TabOperation::Update(range.to_string()));
        self.check(FailingOperation::Update, SpreadsheetError::FailedToWriteRange)?;

        let too_tall = range.row_count().is_some_and(|rows| block.len() > rows);
        let too_wide = range.column_count().is_some_and(|cols| block.width() > cols);
        if too_tall || too_wide {
            return Err(report!(SpreadsheetError::FailedToWriteRange).attach_printable(format!(
                "Requested writing within range {}, but tried writing {} x {}",
                range,
                block.len(),
                block.width()
            )));
        }

        let first_row = range.start.row.index();
        let first_col = range.start.col.index();
        if let Some((rows, cols)) = self.grid_size {
            if first_row + block.len() > rows as usize || first_col + block.width() > cols as usize {
                return Err(report!(SpreadsheetError::FailedToWriteRange).attach_printable(format!(
                    "Range {} exceeds grid limits. Max rows: {}, max columns: {}",
                    range, rows, cols
                )));
            }
        }

        let mut grid = lock(&self.grid);
        for (row_offset, row) in block.rows.iter().enumerate() {
            let row_index = first_row + row_offset;
            if grid.len() <= row_index {
                grid.resize(row_index + 1, Vec::new());
            }
            let target = &mut grid[row_index];
            if target.len() < first_col + row.len() {
                target.resize(first_col + row.len(), CellValue::Empty);
            }
            for (col_offset, cell) in row.iter().enumerate() {
                target[first_col + col_offset] = cell.clone();
            }
        }
        Ok(())
    }

    async fn batch_clear(&self, ranges: &[CellRange]) -> SpreadsheetResult<()> {
        self.record(TabOperation::Clear(
            ranges.iter().map(CellRange::to_string).collect(),
        ));
        self.check(FailingOperation::Clear, SpreadsheetError::FailedToClearRange)?;

        let mut grid = lock(&self.grid);
        for range in ranges {
            let first_row = range.start.row.index();
            let last_row = range
                .end_row
                .map(|end| (end.index() + 1).min(grid.len()))
                .unwrap_or(grid.len());
            let first_col = range.start.col.index();

            for row in grid.iter_mut().take(last_row).skip(first_row) {
                let end = column_end(range, row.len());
                for cell in row.iter_mut().take(end).skip(first_col) {
                    *cell = CellValue::Empty;
                }
            }
        }
        Ok(())
    }

    async fn append_row(&self, row: &CellRow) -> SpreadsheetResult<()> {
        self.record(TabOperation::AppendRow);
        self.check(FailingOperation::AppendRow, SpreadsheetError::FailedToWriteRange)?;

        let mut grid = lock(&self.grid);
        let next = grid
            .iter()
            .rposition(|existing| existing.iter().any(|cell| !cell.is_blank()))
            .map(|last| last + 1)
            .unwrap_or(0);
        grid.truncate(next);
        grid.push(row.clone());
        Ok(())
    }

    async fn col_values(&self, column: Column) -> SpreadsheetResult<Vec<CellValue>> {
        self.record(TabOperation::ColValues(column.to_string()));
        self.check(FailingOperation::ColValues, SpreadsheetError::FailedToFetchRange)?;

        let values = lock(&self.grid)
            .iter()
            .map(|row| row.get(column.index()).cloned().unwrap_or_default())
            .collect::<Vec<_>>();
        Ok(trim_row(&values))
    }
}
