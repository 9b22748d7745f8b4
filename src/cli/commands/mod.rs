//! CLI command implementations.

pub mod check;
pub mod config_cmd;
pub mod inspect;
pub mod process;
