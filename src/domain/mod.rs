pub mod block;
pub mod date;
pub mod filter;
pub mod job;
pub mod preserve;
pub mod sheets;
