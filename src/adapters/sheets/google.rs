use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::Arc;

use error_stack::{report, ResultExt};
use google_sheets4::api::{
    AddSheetRequest, BatchClearValuesRequest, BatchUpdateSpreadsheetRequest, GridProperties,
    Request, SheetProperties, ValueRange,
};
use google_sheets4::Sheets;
use tokio::sync::RwLock;
use tracing::instrument;

use crate::domain::block::{CellRow, CellValue, TabularBlock};
use crate::domain::sheets::{
    a1_notation::ToA1Notation, cell_position::CellPosition, cell_range::CellRange, column::Column,
};
use crate::ports::spreadsheet::{
    Document, SpreadsheetClient, SpreadsheetError, SpreadsheetResult, Tab,
};

use super::http_client::HttpsConnector;
use super::value_range_factory::ValueRangeFactory;

pub type SheetsHub = Sheets<HttpsConnector>;

/// Raw scalars in, raw scalars out: dates as serial numbers, numbers unformatted.
const VALUE_RENDER_OPTION: &str = "UNFORMATTED_VALUE";
const DATE_TIME_RENDER_OPTION: &str = "SERIAL_NUMBER";
const VALUE_INPUT_OPTION: &str = "RAW";

pub struct GoogleSheetsClient {
    hub: Arc<SheetsHub>,
    /// Opened documents by id, so their sheet titles are fetched once per run.
    documents: RwLock<HashMap<String, Arc<GoogleDocument>>>,
}

impl Debug for GoogleSheetsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GoogleSheetsClient")
    }
}

impl GoogleSheetsClient {
    pub fn new(hub: SheetsHub) -> Self {
        Self {
            hub: Arc::new(hub),
            documents: RwLock::new(HashMap::new()),
        }
    }

    fn document(&self, document_id: &str) -> GoogleDocument {
        GoogleDocument {
            hub: Arc::clone(&self.hub),
            spreadsheet_id: document_id.to_owned(),
            sheet_title_cache: RwLock::new(None),
        }
    }
}

#[async_trait::async_trait]
impl SpreadsheetClient for GoogleSheetsClient {
    #[instrument(name = "GoogleSheetsClient::open", skip(self))]
    async fn open(&self, document_id: &str) -> SpreadsheetResult<Arc<dyn Document>> {
        let cached = {
            // -- MUTEX READ --
            let guard = self.documents.read().await;
            guard.get(document_id).cloned()
            // -- END MUTEX READ --
        };
        if let Some(document) = cached {
            return Ok(document);
        }

        let document = Arc::new(self.document(document_id));
        // Fails early on unknown ids or missing permissions
        document.sheet_titles().await?;

        {
            // -- MUTEX WRITE --
            let mut guard = self.documents.write().await;
            guard.insert(document_id.to_owned(), Arc::clone(&document));
            // -- END MUTEX WRITE --
        }
        Ok(document)
    }
}

pub struct GoogleDocument {
    hub: Arc<SheetsHub>,
    spreadsheet_id: String,
    sheet_title_cache: RwLock<Option<HashSet<String>>>,
}

impl Debug for GoogleDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GoogleDocument {{ spreadsheet_id: {} }}", self.spreadsheet_id)
    }
}

impl GoogleDocument {
    #[instrument]
    async fn fetch_sheet_titles(&self) -> SpreadsheetResult<HashSet<String>> {
        let response = self
            .hub
            .spreadsheets()
            .get(&self.spreadsheet_id)
            .doit()
            .await
            .change_context(SpreadsheetError::FailedToOpenDocument)
            .attach_printable_lazy(|| format!("spreadsheet {}", self.spreadsheet_id))?;

        let sheets = response.1.sheets.ok_or(report!(
            SpreadsheetError::FailedToOpenDocument
        ))?;

        Ok(sheets
            .into_iter()
            .filter_map(|sheet| sheet.properties.and_then(|p| p.title))
            .collect())
    }

    #[instrument]
    async fn sheet_titles(&self) -> SpreadsheetResult<HashSet<String>> {
        let cache = {
            // -- MUTEX READ --
            let guard = self.sheet_title_cache.read().await;
            guard.clone()
            // -- END MUTEX READ --
        };

        match cache {
            Some(titles) => Ok(titles),
            None => {
                let fetched = self.fetch_sheet_titles().await?;
                {
                    // -- MUTEX WRITE --
                    let mut guard = self.sheet_title_cache.write().await;
                    guard.replace(fetched.clone());
                    // -- END MUTEX WRITE --
                }
                Ok(fetched)
            }
        }
    }

    fn tab_handle(&self, title: &str) -> Arc<dyn Tab> {
        Arc::new(GoogleTab {
            hub: Arc::clone(&self.hub),
            spreadsheet_id: self.spreadsheet_id.clone(),
            title: title.to_owned(),
        })
    }
}

#[async_trait::async_trait]
impl Document for GoogleDocument {
    fn id(&self) -> &str {
        &self.spreadsheet_id
    }

    #[instrument(name = "GoogleDocument::tab", skip(self), fields(spreadsheet_id = %self.spreadsheet_id))]
    async fn tab(&self, name: &str) -> SpreadsheetResult<Arc<dyn Tab>> {
        let titles = self.sheet_titles().await?;
        if !titles.contains(name) {
            return Err(report!(SpreadsheetError::TabNotFound(name.to_owned())));
        }
        Ok(self.tab_handle(name))
    }

    #[instrument(name = "GoogleDocument::create_tab", skip(self), fields(spreadsheet_id = %self.spreadsheet_id))]
    async fn create_tab(&self, name: &str, rows: u32, cols: u32) -> SpreadsheetResult<Arc<dyn Tab>> {
        let request = BatchUpdateSpreadsheetRequest {
            requests: Some(vec![Request {
                add_sheet: Some(AddSheetRequest {
                    properties: Some(SheetProperties {
                        title: Some(name.to_owned()),
                        grid_properties: Some(GridProperties {
                            row_count: Some(i32::try_from(rows).unwrap_or(i32::MAX)),
                            column_count: Some(i32::try_from(cols).unwrap_or(i32::MAX)),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            ..Default::default()
        };

        self.hub
            .spreadsheets()
            .batch_update(request, &self.spreadsheet_id)
            .doit()
            .await
            .change_context(SpreadsheetError::FailedToCreateTab)
            .attach_printable_lazy(|| format!("tab '{}' ({} x {})", name, rows, cols))?;

        {
            // -- MUTEX WRITE --
            let mut guard = self.sheet_title_cache.write().await;
            if let Some(titles) = guard.as_mut() {
                titles.insert(name.to_owned());
            }
            // -- END MUTEX WRITE --
        }

        Ok(self.tab_handle(name))
    }
}

pub struct GoogleTab {
    hub: Arc<SheetsHub>,
    spreadsheet_id: String,
    title: String,
}

impl Debug for GoogleTab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "GoogleTab {{ spreadsheet_id: {}, title: {} }}",
            self.spreadsheet_id, self.title
        )
    }
}

impl GoogleTab {
    fn qualified(&self, range: &CellRange) -> String {
        range.to_a1_notation(Some(&self.title)).into()
    }
}

#[async_trait::async_trait]
impl Tab for GoogleTab {
    fn name(&self) -> &str {
        &self.title
    }

    #[instrument(name = "GoogleTab::get", skip(self), fields(tab = %self.title, range = %range))]
    async fn get(&self, range: &CellRange) -> SpreadsheetResult<TabularBlock> {
        let a1 = self.qualified(range);
        let response = self
            .hub
            .spreadsheets()
            .values_get(&self.spreadsheet_id, &a1)
            .value_render_option(VALUE_RENDER_OPTION)
            .date_time_render_option(DATE_TIME_RENDER_OPTION)
            .doit()
            .await
            .change_context(SpreadsheetError::FailedToFetchRange)
            .attach_printable_lazy(|| format!("Failed to fetch values for range {}", a1))?;

        Ok(response.1.into_block())
    }

    #[instrument(name = "GoogleTab::update", skip(self, block), fields(tab = %self.title, range = %range, rows = block.len()))]
    async fn update(&self, range: &CellRange, block: &TabularBlock) -> SpreadsheetResult<()> {
        let a1 = self.qualified(range);
        self.hub
            .spreadsheets()
            .values_update(ValueRange::from_block(block), &self.spreadsheet_id, &a1)
            .value_input_option(VALUE_INPUT_OPTION)
            .doit()
            .await
            .map(|_| ())
            .change_context(SpreadsheetError::FailedToWriteRange)
            .attach_printable_lazy(|| format!("Failed to write to range {}", a1))
    }

    #[instrument(name = "GoogleTab::batch_clear", skip(self), fields(tab = %self.title))]
    async fn batch_clear(&self, ranges: &[CellRange]) -> SpreadsheetResult<()> {
        let ranges = ranges
            .iter()
            .map(|range| self.qualified(range))
            .collect::<Vec<_>>();

        let request = BatchClearValuesRequest {
            ranges: Some(ranges.clone()),
            ..Default::default()
        };

        self.hub
            .spreadsheets()
            .values_batch_clear(request, &self.spreadsheet_id)
            .doit()
            .await
            .map(|_| ())
            .change_context(SpreadsheetError::FailedToClearRange)
            .attach_printable_lazy(|| format!("Failed to clear ranges {:?}", ranges))
    }

    #[instrument(name = "GoogleTab::append_row", skip(self, row), fields(tab = %self.title))]
    async fn append_row(&self, row: &CellRow) -> SpreadsheetResult<()> {
        let a1 = self.qualified(&CellRange::single_cell(CellPosition::origin()));
        self.hub
            .spreadsheets()
            .values_append(ValueRange::from_single_row(row), &self.spreadsheet_id, &a1)
            .value_input_option(VALUE_INPUT_OPTION)
            .insert_data_option("INSERT_ROWS")
            .doit()
            .await
            .map(|_| ())
            .change_context(SpreadsheetError::FailedToWriteRange)
            .attach_printable_lazy(|| format!("Failed to append a row to {}", self.title))
    }

    #[instrument(name = "GoogleTab::col_values", skip(self), fields(tab = %self.title))]
    async fn col_values(&self, column: Column) -> SpreadsheetResult<Vec<CellValue>> {
        let a1 = self.qualified(&CellRange::whole_column(column));
        let response = self
            .hub
            .spreadsheets()
            .values_get(&self.spreadsheet_id, &a1)
            .major_dimension("COLUMNS")
            .value_render_option(VALUE_RENDER_OPTION)
            .date_time_render_option(DATE_TIME_RENDER_OPTION)
            .doit()
            .await
            .change_context(SpreadsheetError::FailedToFetchRange)
            .attach_printable_lazy(|| format!("Failed to fetch column {}", a1))?;

        Ok(response.1.into_column())
    }
}
