pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod processor;
pub mod reporting;
pub mod storage;

pub use error::SchemaError;
