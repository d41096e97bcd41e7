use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{
    block::{CellRow, CellValue},
    date::parse_cell_date,
    sheets::location::SheetLocation,
};

/// Declarative row filter of a job. Column indexes are 0-based positions
/// inside the fetched block, not sheet columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterRule {
    /// Keep every row.
    #[default]
    All,
    /// Trimmed, case-insensitive exact match against a literal set.
    MatchAny { column: usize, values: Vec<String> },
    /// Rows whose cell is not in the literal set.
    NotMatchAny { column: usize, values: Vec<String> },
    /// Rows whose cell has a value.
    NonEmpty { column: usize },
    /// Rows whose cell is the same date as the single cell at `reference`.
    DateEquals {
        column: usize,
        reference: SheetLocation,
    },
    AllOf { rules: Vec<FilterRule> },
}

impl FilterRule {
    pub fn match_any<S: AsRef<str>>(column: usize, values: &[S]) -> Self {
        FilterRule::MatchAny {
            column,
            values: values.iter().map(|v| v.as_ref().to_owned()).collect(),
        }
    }

    /// Number of columns a block needs for this rule to be applicable.
    pub fn required_width(&self) -> usize {
        match self {
            FilterRule::All => 0,
            FilterRule::MatchAny { column, .. }
            | FilterRule::NotMatchAny { column, .. }
            | FilterRule::NonEmpty { column }
            | FilterRule::DateEquals { column, .. } => column + 1,
            FilterRule::AllOf { rules } => rules
                .iter()
                .map(FilterRule::required_width)
                .max()
                .unwrap_or(0),
        }
    }

    /// Cells that must be read before the rule can be applied.
    pub fn references(&self) -> Vec<&SheetLocation> {
        match self {
            FilterRule::DateEquals { reference, .. } => vec![reference],
            FilterRule::AllOf { rules } => rules.iter().flat_map(FilterRule::references).collect(),
            _ => Vec::new(),
        }
    }

    /// Binds every reference cell to its date.
    pub fn resolve(
        &self,
        reference_dates: &HashMap<SheetLocation, NaiveDate>,
    ) -> Result<RowFilter, UnresolvedReference> {
        Ok(match self {
            FilterRule::All => RowFilter::All,
            FilterRule::MatchAny { column, values } => RowFilter::MatchAny {
                column: *column,
                values: normalize_literals(values),
            },
            FilterRule::NotMatchAny { column, values } => RowFilter::NotMatchAny {
                column: *column,
                values: normalize_literals(values),
            },
            FilterRule::NonEmpty { column } => RowFilter::NonEmpty { column: *column },
            FilterRule::DateEquals { column, reference } => RowFilter::DateEquals {
                column: *column,
                date: *reference_dates
                    .get(reference)
                    .ok_or_else(|| UnresolvedReference(reference.clone()))?,
            },
            FilterRule::AllOf { rules } => RowFilter::AllOf(
                rules
                    .iter()
                    .map(|rule| rule.resolve(reference_dates))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
#[error("No value was read for reference cell {0}")]
pub struct UnresolvedReference(pub SheetLocation);

fn normalize_literals(values: &[String]) -> HashSet<String> {
    values.iter().map(|v| v.trim().to_lowercase()).collect()
}

/// A filter ready to be applied: literals normalized, reference dates read.
#[derive(Debug, Clone, PartialEq)]
pub enum RowFilter {
    All,
    MatchAny { column: usize, values: HashSet<String> },
    NotMatchAny { column: usize, values: HashSet<String> },
    NonEmpty { column: usize },
    DateEquals { column: usize, date: NaiveDate },
    AllOf(Vec<RowFilter>),
}

impl RowFilter {
    pub fn matches(&self, row: &[CellValue]) -> bool {
        let cell = |column: &usize| row.get(*column).cloned().unwrap_or_default();

        match self {
            RowFilter::All => true,
            RowFilter::MatchAny { column, values } => values.contains(&cell(column).normalized()),
            RowFilter::NotMatchAny { column, values } => {
                !values.contains(&cell(column).normalized())
            }
            RowFilter::NonEmpty { column } => !cell(column).is_blank(),
            // Unparsable dates never match
            RowFilter::DateEquals { column, date } => {
                parse_cell_date(&cell(column)).is_some_and(|parsed| parsed == *date)
            }
            RowFilter::AllOf(filters) => filters.iter().all(|filter| filter.matches(row)),
        }
    }

    /// Rows for which the filter holds, in their original order.
    pub fn apply(&self, rows: Vec<CellRow>) -> Vec<CellRow> {
        rows.into_iter().filter(|row| self.matches(row)).collect()
    }
}
