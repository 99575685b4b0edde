//! Command implementations.

pub mod completions;
pub mod import;
pub mod inspect;
pub mod version;
