pub mod credentials;
pub mod routine;
pub mod spreadsheet;
