//! Local project files: ignore list, action file, tracking record, scaffolding.

pub mod actionfile;
pub mod ignore;
pub mod scaffold;
pub mod tracking;

/// Ignore list file name in the project root.
pub const IGNORE_FILE: &str = ".lambdaignore";

/// Action file name in the project root.
pub const ACTION_FILE: &str = "Actionfile";
