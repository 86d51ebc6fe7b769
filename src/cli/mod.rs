//! CLI command handling

pub mod notify;
pub mod output;

pub use notify::*;
pub use output::*;
