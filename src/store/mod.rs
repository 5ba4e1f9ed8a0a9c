//! Persistence for the emotion and engagement logs.

pub mod log;

// Re-export commonly used types
pub use log::{AppendLog, CsvLog, CsvRecord, MemoryLog, StoreError};
