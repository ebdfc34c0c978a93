//! Crate implementing the CLI commands.

mod cli;
mod config;
mod demos;
mod repl;
mod resolve;
mod run;

pub use self::cli::{CliAction, CliOpts};
pub use self::config::{BreakDirective, DebugScript};
pub use self::demos::{demo_names, demo_program};
pub use self::repl::InteractiveProcessor;
pub use self::resolve::resolve_location;
pub use self::run::evaluate_run;
