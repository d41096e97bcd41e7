pub mod auth;
pub mod google;
pub mod http_client;
pub mod in_memory;
pub mod value_range_factory;
