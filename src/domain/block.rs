use serde_json::Value;

/// A single raw cell as returned with `UNFORMATTED_VALUE` rendering.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// The cell as text. Whole numbers print without a fractional part so that
    /// `12` read as a number compares equal to `"12"` typed as text.
    pub fn display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(text) => text.clone(),
            CellValue::Number(number) => format_number(*number),
            CellValue::Bool(true) => "TRUE".to_owned(),
            CellValue::Bool(false) => "FALSE".to_owned(),
        }
    }

    /// Trimmed, lower-cased text used for literal comparisons.
    pub fn normalized(&self) -> String {
        self.display().trim().to_lowercase()
    }

    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Empty => Value::String(String::new()),
            CellValue::Text(text) => Value::String(text.clone()),
            CellValue::Number(number) => serde_json::Number::from_f64(*number)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(format_number(*number))),
            CellValue::Bool(flag) => Value::Bool(*flag),
        }
    }
}

fn format_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        format!("{}", number)
    }
}

impl From<&Value> for CellValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => CellValue::Empty,
            Value::String(text) if text.is_empty() => CellValue::Empty,
            Value::String(text) => CellValue::Text(text.clone()),
            Value::Number(number) => number
                .as_f64()
                .map(CellValue::Number)
                .unwrap_or_else(|| CellValue::Text(number.to_string())),
            Value::Bool(flag) => CellValue::Bool(*flag),
            other => CellValue::Text(other.to_string()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(text: &str) -> Self {
        if text.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(text.to_owned())
        }
    }
}

impl From<String> for CellValue {
    fn from(text: String) -> Self {
        if text.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(text)
        }
    }
}

impl From<f64> for CellValue {
    fn from(number: f64) -> Self {
        CellValue::Number(number)
    }
}

pub type CellRow = Vec<CellValue>;

/// Rows of cells in sheet order. Rows may be ragged: the sheets API drops
/// trailing empty cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TabularBlock {
    pub rows: Vec<CellRow>,
}

/// A source block cut into the rows above the header, the header itself and
/// the data rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SplitBlock {
    pub metadata: Vec<CellRow>,
    pub header: Vec<CellRow>,
    pub body: Vec<CellRow>,
}

impl TabularBlock {
    pub fn new(rows: Vec<CellRow>) -> Self {
        Self { rows }
    }

    pub fn from_json_rows(values: &[Vec<Value>]) -> Self {
        Self {
            rows: values
                .iter()
                .map(|row| row.iter().map(CellValue::from).collect())
                .collect(),
        }
    }

    pub fn to_json_rows(&self) -> Vec<Vec<Value>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(CellValue::to_json).collect())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Width of the widest row.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Cuts the block after `offset` metadata rows and `header_rows` header rows.
    /// Returns `None` when the block does not even reach the header.
    pub fn split(self, offset: usize, header_rows: usize) -> Option<SplitBlock> {
        if self.rows.len() < offset + header_rows.max(1) {
            return None;
        }

        let mut rows = self.rows;
        let body = rows.split_off(offset + header_rows);
        let header = rows.split_off(offset);

        Some(SplitBlock {
            metadata: rows,
            header,
            body,
        })
    }

    /// Keeps at most `width` cells per row.
    pub fn truncate_width(&mut self, width: usize) {
        for row in &mut self.rows {
            row.truncate(width);
        }
    }

    /// Pads every row with empty cells up to `width`.
    pub fn pad_width(&mut self, width: usize) {
        for row in &mut self.rows {
            if row.len() < width {
                row.resize(width, CellValue::Empty);
            }
        }
    }

    /// Drops trailing empty rows, which a range read never returns either.
    pub fn trim_trailing_empty_rows(&mut self) {
        while self
            .rows
            .last()
            .is_some_and(|row| row.iter().all(CellValue::is_blank))
        {
            self.rows.pop();
        }
    }
}

/// Rebuilds `row` from the cells at `columns`, missing cells become empty.
pub fn project_row(row: &[CellValue], columns: &[usize]) -> CellRow {
    columns
        .iter()
        .map(|&index| row.get(index).cloned().unwrap_or_default())
        .collect()
}

impl From<Vec<Vec<&str>>> for TabularBlock {
    fn from(rows: Vec<Vec<&str>>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(CellValue::from).collect())
                .collect(),
        }
    }
}
