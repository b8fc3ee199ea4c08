pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod loader;
pub mod logging;
pub mod pipeline;
pub mod storage;
pub mod transform;
pub mod types;
