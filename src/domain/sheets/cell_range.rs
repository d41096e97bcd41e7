use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    a1_notation::{generic_a1_notation_split, quote_sheet_title, A1Notation, ToA1Notation},
    cell_position::{split_reference, CellPosition},
    column::{parse_col, Column, ColumnParseError},
    row::Row,
};

/// A rectangular region of a tab. Either end may be open: `A:AC` has no last
/// row, `A2:AL` starts on row 2 and runs to the bottom of the sheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CellRange {
    pub start: CellPosition,
    pub end_col: Option<Column>,
    pub end_row: Option<Row>,
    pub sheet_title: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CellRangeParseError {
    #[error("Range is empty")]
    Empty,
    #[error("Error parsing column: {0}")]
    Column(ColumnParseError),
    #[error("Error parsing row: {0}")]
    Row(std::num::ParseIntError),
    #[error("Range end {end} comes before its start {start}")]
    Inverted { start: String, end: String },
}

impl CellRange {
    /// Bounded range of `rows` x `cols` cells whose top-left cell is `anchor`.
    pub fn sized(anchor: CellPosition, rows: usize, cols: usize) -> Self {
        Self {
            start: anchor,
            end_col: Some(anchor.col.span(cols)),
            end_row: Some(anchor.row.offset(rows.max(1) - 1)),
            sheet_title: None,
        }
    }

    /// The whole of `col`, from the first row down.
    pub fn whole_column(col: Column) -> Self {
        Self {
            start: CellPosition::new(col, Row::from_index(0)),
            end_col: Some(col),
            end_row: None,
            sheet_title: None,
        }
    }

    pub fn single_cell(position: CellPosition) -> Self {
        Self::sized(position, 1, 1)
    }

    pub fn with_sheet_title(&self, sheet_title: impl Into<String>) -> Self {
        Self {
            sheet_title: Some(sheet_title.into()),
            ..self.clone()
        }
    }

    /// Top-left cell, where a write of this range is anchored.
    pub fn anchor(&self) -> CellPosition {
        self.start
    }

    /// Number of columns, `None` when the range is open to the right.
    pub fn column_count(&self) -> Option<usize> {
        self.end_col.map(|end| end - self.start.col + 1)
    }

    /// Number of rows, `None` when the range is open at the bottom.
    pub fn row_count(&self) -> Option<usize> {
        self.end_row
            .map(|end| end.index().saturating_sub(self.start.row.index()) + 1)
    }

    pub fn is_single_cell(&self) -> bool {
        self.column_count() == Some(1) && self.row_count() == Some(1)
    }

    pub fn contains(&self, position: CellPosition) -> bool {
        position.col >= self.start.col
            && position.row >= self.start.row
            && self.end_col.map_or(true, |end| position.col <= end)
            && self.end_row.map_or(true, |end| position.row <= end)
    }
}

/// Conversions: Others -> CellRange

impl FromStr for CellRange {
    type Err = CellRangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = generic_a1_notation_split(&A1Notation::from(s));
        if parts.start.is_empty() {
            return Err(CellRangeParseError::Empty);
        }

        let (start_col, start_row) = split_reference(&parts.start);
        let start_col = parse_col(start_col).map_err(CellRangeParseError::Column)?;
        let start_row = match start_row {
            "" => None,
            digits => Some(digits.parse::<Row>().map_err(CellRangeParseError::Row)?),
        };
        let start = CellPosition::new(start_col, start_row.unwrap_or(Row::from_index(0)));

        let (end_col, end_row) = match parts.end.as_deref() {
            // `B5` is a single cell, `U` alone is the whole column.
            None => (Some(start_col), start_row),
            Some(end) => {
                let (end_col, end_row) = split_reference(end);
                let end_col = match end_col {
                    "" => None,
                    letters => Some(parse_col(letters).map_err(CellRangeParseError::Column)?),
                };
                let end_row = match end_row {
                    "" => None,
                    digits => Some(digits.parse::<Row>().map_err(CellRangeParseError::Row)?),
                };
                (end_col, end_row)
            }
        };

        let inverted = end_col.is_some_and(|end| end < start.col)
            || end_row.is_some_and(|end| end < start.row);
        if inverted {
            return Err(CellRangeParseError::Inverted {
                start: parts.start,
                end: parts.end.unwrap_or_default(),
            });
        }

        Ok(CellRange {
            start,
            end_col,
            end_row,
            sheet_title: parts.sheet_title,
        })
    }
}

impl TryFrom<String> for CellRange {
    type Error = CellRangeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Conversions: CellRange -> Others

impl ToA1Notation for CellRange {
    fn to_a1_notation(&self, sheet_title: Option<&str>) -> A1Notation {
        let local = if self.is_single_cell() {
            format!("{}{}", self.start.col, self.start.row)
        } else {
            format!(
                "{}{}:{}{}",
                self.start.col,
                self.start.row,
                self.end_col.map(|c| c.to_string()).unwrap_or_default(),
                self.end_row.map(|r| r.to_string()).unwrap_or_default(),
            )
        };

        match sheet_title.or(self.sheet_title.as_deref()) {
            Some(sheet_title) => A1Notation(format!("{}!{}", quote_sheet_title(sheet_title), local)),
            None => A1Notation(local),
        }
    }
}

impl std::fmt::Display for CellRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_a1_notation(None))
    }
}

impl From<CellRange> for String {
    fn from(range: CellRange) -> Self {
        range.to_string()
    }
}
