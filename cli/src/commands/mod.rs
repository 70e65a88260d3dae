//! Command implementations

pub mod submit;
pub mod sync_scripts;
pub mod version;
