/// The Sisto debugger.
#[derive(clap::Parser)]
pub struct CliOpts {
    /// The command to run.
    #[clap(subcommand)]
    pub action: CliAction,
}

/// The command to run.
#[derive(clap::Subcommand)]
pub enum CliAction {
    /// Command to run a demo program under the debugger.
    Run {
        /// Debug script (KDL format).
        ///
        /// If it ends with `.kdl`, it is treated as a path to a script file
        /// presetting breakpoints. Otherwise it is directly parsed as
        /// inline KDL-formatted script content.
        #[clap(short, long, value_name = "CONTENT/PATH")]
        config: Option<String>,

        /// Breakpoint location to preset (`file:line`, `line` or `name()`).
        #[clap(short, long = "break", value_name = "LOCATION")]
        breakpoints: Vec<String>,

        /// Run freely instead of stopping before the first event.
        #[clap(long)]
        no_entry_stop: bool,

        /// Report every event to the engine instead of narrowing
        /// instrumentation masks per code unit.
        #[clap(long)]
        fire_all: bool,

        /// Name of the demo program to run.
        demo: String,
    },

    /// Command to list the available demo programs.
    Demos,
}

impl CliOpts {
    /// Parses the CLI from the command-line.
    ///
    /// # Warning
    ///
    /// Exits on error.
    pub fn parse_from_cmdline() -> Self {
        <Self as clap::Parser>::parse()
    }
}
