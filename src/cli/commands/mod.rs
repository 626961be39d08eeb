pub mod db;
pub mod key;
pub mod plans;
pub mod token;
