use std::{fmt::Formatter, num::ParseIntError, str::FromStr};

/// A spreadsheet row, stored as a 0-based index.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Row {
    index: u32,
}

impl Row {
    pub fn from_index(index: usize) -> Self {
        Row {
            index: u32::try_from(index).unwrap_or(u32::MAX),
        }
    }

    pub fn from_number(row: u32) -> Self {
        Row {
            index: row.saturating_sub(1), // Convert to zero-based index
        }
    }

    /// Returns the row number as a 1-based index, as it is shown in a sheet.
    /// # Examples
    /// ```
    /// use sheet_sync::domain::sheets::row::Row;
    /// let row = Row::from_index(0);
    /// assert_eq!(row.number(), 1);
    /// let row = Row::from_index(3);
    /// assert_eq!(row.number(), 4);
    /// ```
    pub fn number(&self) -> u32 {
        self.index.saturating_add(1)
    }

    /// Returns the row index as a zero-based index.
    /// # Examples
    /// ```
    /// use sheet_sync::domain::sheets::row::Row;
    /// let header = Row::from_number(3);
    /// assert_eq!(header.index(), 2);
    /// assert_eq!(header.offset(1).number(), 4);
    /// ```
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// Row `count` positions below this one.
    pub fn offset(&self, count: usize) -> Row {
        Row::from_index(self.index().saturating_add(count))
    }
}

impl std::fmt::Display for Row {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

impl std::fmt::Debug for Row {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Row(index: {}, row: {})", self.index(), self.number())
    }
}

impl FromStr for Row {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Row::from_number(s.parse::<u32>()?))
    }
}
