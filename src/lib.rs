pub mod config;
pub mod manager;
pub mod storage;
pub mod types;
pub mod utils;
