// Public modules
pub mod changelog;
pub mod config;
pub mod deploy;
pub mod engine;
pub mod error;
pub mod git;
pub mod keychain;
pub mod pipeline;
pub mod predicate;
pub mod release;
pub mod session;
pub mod settings;
pub mod target;
pub mod version;

// Internal modules - not part of public API
pub(crate) mod http;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
