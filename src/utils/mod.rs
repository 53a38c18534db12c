//! Generic utility primitives with zero domain knowledge.
//!
//! - `archive` - Zip creation and file digests
//! - `command` - Process execution with error handling
//! - `io` - File I/O with consistent error handling
//! - `pattern` - Glob expansion relative to a root
//! - `validation` - Input validation helpers

pub mod archive;
pub mod command;
pub mod io;
pub mod pattern;
pub mod validation;
