use std::sync::Arc;

use thiserror::Error;

use crate::domain::{
    block::{CellRow, CellValue, TabularBlock},
    sheets::{cell_range::CellRange, column::Column},
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpreadsheetError {
    #[error("Failed to open spreadsheet")]
    FailedToOpenDocument,
    #[error("Tab not found: {0}")]
    TabNotFound(String),
    #[error("Failed to create tab")]
    FailedToCreateTab,
    #[error("Failed to fetch range")]
    FailedToFetchRange,
    #[error("Failed to write range")]
    FailedToWriteRange,
    #[error("Failed to clear range")]
    FailedToClearRange,
}

pub type SpreadsheetResult<T> = error_stack::Result<T, SpreadsheetError>;

/// Authenticated access to spreadsheets by id.
#[async_trait::async_trait]
pub trait SpreadsheetClient: Send + Sync {
    async fn open(&self, document_id: &str) -> SpreadsheetResult<Arc<dyn Document>>;
}

/// One spreadsheet.
#[async_trait::async_trait]
pub trait Document: Send + Sync {
    fn id(&self) -> &str;

    /// Fails with [`SpreadsheetError::TabNotFound`] when no tab has that title.
    async fn tab(&self, name: &str) -> SpreadsheetResult<Arc<dyn Tab>>;

    async fn create_tab(&self, name: &str, rows: u32, cols: u32) -> SpreadsheetResult<Arc<dyn Tab>>;
}

/// One tab of a spreadsheet. Ranges are local to the tab.
#[async_trait::async_trait]
pub trait Tab: Send + Sync {
    fn name(&self) -> &str;

    /// Raw (unformatted) values of `range`. Trailing empty rows and cells are
    /// not returned.
    async fn get(&self, range: &CellRange) -> SpreadsheetResult<TabularBlock>;

    async fn update(&self, range: &CellRange, block: &TabularBlock) -> SpreadsheetResult<()>;

    async fn batch_clear(&self, ranges: &[CellRange]) -> SpreadsheetResult<()>;

    /// Writes `row` below the last row holding data.
    async fn append_row(&self, row: &CellRow) -> SpreadsheetResult<()>;

    /// Values of `column` from the first row down, up to its last non-empty cell.
    async fn col_values(&self, column: Column) -> SpreadsheetResult<Vec<CellValue>>;
}
