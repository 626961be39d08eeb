pub mod api_keys;
pub mod auth;
pub mod records;
pub mod usage;
