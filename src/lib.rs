pub mod aggregate;
pub mod bench;
pub mod config;
pub mod display;
pub mod errors;
pub mod memory;
pub mod sqlite;
pub mod store;
pub mod timer;
pub mod types;
