pub mod batch;
pub mod factory;
pub mod last_run;
pub mod sync_job;
