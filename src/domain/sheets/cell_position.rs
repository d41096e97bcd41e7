use std::str::FromStr;

use thiserror::Error;

use super::{
    a1_notation::{quote_sheet_title, A1Notation, ToA1Notation},
    column::{parse_col, Column, ColumnParseError},
    row::Row,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellPosition {
    pub col: Column,
    pub row: Row,
}

impl CellPosition {
    pub fn new(col: Column, row: Row) -> Self {
        Self { col, row }
    }

    /// Top-left cell of a sheet.
    pub fn origin() -> Self {
        Self {
            col: Column::from_index(0),
            row: Row::from_index(0),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CellPositionParseError {
    #[error("Error parsing column: {0}")]
    ColumnParseError(ColumnParseError),
    #[error("Error parsing row: {0}")]
    RowParseError(std::num::ParseIntError),
}

/// Splits a local reference (`AC`, `B5`, `12`) into its column letters and row digits.
pub(super) fn split_reference(reference: &str) -> (&str, &str) {
    let split = reference
        .char_indices()
        .find(|(_, c)| c.is_ascii_digit())
        .map(|(index, _)| index)
        .unwrap_or(reference.len());
    reference.split_at(split)
}

/// Conversions: Others -> CellPosition

impl FromStr for CellPosition {
    type Err = CellPositionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (col, row) = split_reference(s.trim());
        Ok(CellPosition {
            col: parse_col(col).map_err(CellPositionParseError::ColumnParseError)?,
            row: row.parse().map_err(CellPositionParseError::RowParseError)?,
        })
    }
}

/// Conversions: CellPosition -> Others

impl ToA1Notation for CellPosition {
    fn to_a1_notation(&self, sheet_title: Option<&str>) -> A1Notation {
        match sheet_title {
            Some(sheet_title) => A1Notation(format!(
                "{}!{}{}",
                quote_sheet_title(sheet_title),
                self.col,
                self.row
            )),
            None => A1Notation(format!("{}{}", self.col, self.row)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cell_position() {
        let position: CellPosition = "B5".parse().unwrap();
        assert_eq!(position.col, Column::from_index(1));
        assert_eq!(position.row, Row::from_number(5));
    }

    #[test]
    fn test_parse_cell_position_missing_row() {
        assert!(matches!(
            "B".parse::<CellPosition>(),
            Err(CellPositionParseError::RowParseError(_))
        ));
    }

    #[test]
    fn test_cell_position_to_a1_notation() {
        assert_eq!(
            CellPosition::origin().to_a1_notation(None),
            A1Notation("A1".to_owned())
        );
    }

    #[test]
    fn test_cell_position_to_a1_notation_with_sheet_title() {
        let position: CellPosition = "ZZ100".parse().unwrap();
        assert_eq!(
            position.to_a1_notation(Some("last script run")),
            A1Notation("'last script run'!ZZ100".to_owned())
        );
    }
}
