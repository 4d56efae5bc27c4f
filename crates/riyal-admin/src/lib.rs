//! riyal-admin
//!
//! Command-line front end for a treasury operator. `cli` defines the
//! arguments; `app` turns each command into calls on the engines.

pub mod app;
pub mod cli;

pub use app::{format_units, App};
pub use cli::{expand_tilde, Args, Command, RecoverCommand};
