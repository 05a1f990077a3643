//! External side effects module
//! 
//! This module contains operations that reach outside the process state,
//! such as writing history exports to the filesystem.

pub mod export;

// Re-export main functions
pub use export::{export_file_name, write_history_export, ExportOutcome};
