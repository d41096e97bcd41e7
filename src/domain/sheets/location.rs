use serde::{Deserialize, Serialize};

use super::{
    a1_notation::{A1Notation, ToA1Notation},
    cell_range::CellRange,
};

/// Where a block of cells lives: spreadsheet id, tab title and range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SheetLocation {
    pub document_id: String,
    pub tab: String,
    pub range: CellRange,
}

impl SheetLocation {
    pub fn new(document_id: impl Into<String>, tab: impl Into<String>, range: CellRange) -> Self {
        Self {
            document_id: document_id.into(),
            tab: tab.into(),
            range,
        }
    }
}

impl ToA1Notation for SheetLocation {
    fn to_a1_notation(&self, sheet_title: Option<&str>) -> A1Notation {
        self.range
            .to_a1_notation(Some(sheet_title.unwrap_or(self.tab.as_str())))
    }
}

impl std::fmt::Display for SheetLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.document_id, self.to_a1_notation(None))
    }
}
