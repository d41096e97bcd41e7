use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::block::{CellRow, CellValue};

/// A destination column whose current values survive the rewrite.
///
/// Without `key_column` old values are put back by row position over the new
/// header + data block. If the number of filtered rows changes between runs
/// the preserved values end up next to different rows. Setting `key_column`
/// matches old and new rows by the value of that column instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreservedColumn {
    pub column: usize,
    #[serde(default)]
    pub key_column: Option<usize>,
}

impl PreservedColumn {
    pub fn positional(column: usize) -> Self {
        Self {
            column,
            key_column: None,
        }
    }

    /// Width every written row needs to hold the preserved cell.
    pub fn required_width(&self) -> usize {
        self.column + 1
    }
}

fn set_cell(row: &mut CellRow, column: usize, value: CellValue) {
    if row.len() <= column {
        row.resize(column + 1, CellValue::Empty);
    }
    row[column] = value;
}

/// Copies `old_column[i]` into `rows[i][column]`; rows past the end of the old
/// column get an empty cell.
pub fn overlay_positional(rows: &mut [CellRow], column: usize, old_column: &[CellValue]) {
    for (index, row) in rows.iter_mut().enumerate() {
        let value = old_column.get(index).cloned().unwrap_or_default();
        set_cell(row, column, value);
    }
}

/// Copies the old preserved value of the row with the same key. Rows with a
/// blank or unseen key get an empty cell. The first occurrence of a key wins.
pub fn overlay_keyed(
    rows: &mut [CellRow],
    column: usize,
    key_column: usize,
    old_keys: &[CellValue],
    old_column: &[CellValue],
) {
    let mut preserved: HashMap<String, CellValue> = HashMap::new();
    for (key, value) in old_keys.iter().zip(old_column.iter()) {
        if key.is_blank() {
            continue;
        }
        preserved
            .entry(key.normalized())
            .or_insert_with(|| value.clone());
    }

    for row in rows.iter_mut() {
        let key = row.get(key_column).cloned().unwrap_or_default();
        let value = if key.is_blank() {
            CellValue::Empty
        } else {
            preserved.get(&key.normalized()).cloned().unwrap_or_default()
        };
        set_cell(row, column, value);
    }
}
