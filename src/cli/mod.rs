//! Command-line interface for tenderacquire.

mod commands;
pub mod helpers;

pub use commands::{is_verbose, run};
