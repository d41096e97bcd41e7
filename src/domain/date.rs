use chrono::{Days, NaiveDate, NaiveDateTime};

use super::block::CellValue;

const DAY_FIRST_FORMATS: [&str; 3] = ["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];
const ISO_DATE_FORMAT: &str = "%Y-%m-%d";
const ISO_DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

/// Serial day 0 of Google Sheets (and Lotus/Excel 1900 with the leap-year bug).
fn serial_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default()
}

/// Reads a raw cell as a calendar date.
///
/// Text is read day-first (`01/03/2024` is the 1st of March), then as ISO.
/// Numbers are spreadsheet serial days, which is how dates arrive when the
/// range is fetched unformatted. Anything else is `None`.
pub fn parse_cell_date(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Number(serial) => from_serial(*serial),
        CellValue::Text(text) => parse_date_text(text),
        CellValue::Empty | CellValue::Bool(_) => None,
    }
}

pub fn from_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    serial_epoch().checked_add_days(Days::new(serial.floor() as u64))
}

pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    parse_date_only(text).or_else(|| {
        // `01/03/2024 10:30:00`: keep the date part
        text.split_whitespace()
            .next()
            .filter(|date_part| *date_part != text)
            .and_then(parse_date_only)
    })
}

fn parse_date_only(text: &str) -> Option<NaiveDate> {
    DAY_FIRST_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .or_else(|| NaiveDate::parse_from_str(text, ISO_DATE_FORMAT).ok())
        .or_else(|| {
            ISO_DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
                .map(|datetime| datetime.date())
        })
}
