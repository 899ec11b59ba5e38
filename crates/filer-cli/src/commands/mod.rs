//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Config loading, filer construction and `init`
//! - `records` - Upload, edit, show, files and refresh
//! - `serve` - Web server command

pub mod core;
pub mod records;
pub mod serve;

// Re-export command functions for main.rs
pub use core::*;
pub use records::*;
pub use serve::*;
