use google_sheets4::api::ValueRange;
use serde_json::Value;

use crate::domain::block::{CellRow, CellValue, TabularBlock};

pub trait ValueRangeFactory {
    fn from_block(block: &TabularBlock) -> Self;
    fn from_single_row(row: &CellRow) -> Self;
    fn into_block(self) -> TabularBlock;
    fn into_column(self) -> Vec<CellValue>;
}

impl ValueRangeFactory for ValueRange {
    fn from_block(block: &TabularBlock) -> Self {
        Self {
            major_dimension: Some("ROWS".to_string()),
            range: None,
            values: Some(block.to_json_rows()),
        }
    }

    fn from_single_row(row: &CellRow) -> Self {
        Self {
            major_dimension: Some("ROWS".to_string()),
            range: None,
            values: Some(vec![row.iter().map(CellValue::to_json).collect()]),
        }
    }

    /// Ranges without any value come back with no `values` at all.
    fn into_block(self) -> TabularBlock {
        TabularBlock::from_json_rows(&self.values.unwrap_or_default())
    }

    /// Reads a range fetched with `COLUMNS` as major dimension.
    fn into_column(self) -> Vec<CellValue> {
        self.values
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|column| column.iter().map(CellValue::from).collect())
            .unwrap_or_default()
    }
}
