//! Utility modules for lambda-ctl.

pub mod errors;
pub mod logger;

pub use errors::{CtlError, Result};
