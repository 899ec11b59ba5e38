//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod filing;
pub mod lookup;

// Re-export all handlers for use in router
pub use filing::*;
pub use lookup::*;
