pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod models;
pub mod storage;
pub mod sync;

pub use error::{GarminError, Result};
