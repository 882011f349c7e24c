//! lambda-ctl library
//!
//! Control-plane client for lambda function projects: scaffolding, content
//! sync with a remote host, and local or remote action dispatch.

pub mod actions;
pub mod config;
pub mod context;
pub mod fs;
pub mod manifest;
pub mod process;
pub mod project;
pub mod remote;
pub mod sync;
pub mod transfer;
pub mod utils;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::Config;
pub use utils::errors::{CtlError, Result};
