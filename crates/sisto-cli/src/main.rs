#![allow(missing_docs)]
#![allow(clippy::print_stderr)]

use std::io::Write;

use sisto_cli::{CliAction, CliOpts};

use tracing_subscriber::EnvFilter;

fn main() {
    let cli = CliOpts::parse_from_cmdline();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_env_var("SISTO_LOG")
                .from_env_lossy(),
        )
        .init();

    let res = match cli.action {
        CliAction::Run {
            config,
            breakpoints,
            no_entry_stop,
            fire_all,
            demo,
        } => sisto_cli::evaluate_run(config, breakpoints, no_entry_stop, fire_all, demo).map(Some),
        CliAction::Demos => {
            let mut stdout = std::io::stdout();

            for name in sisto_cli::demo_names() {
                let _ = writeln!(stdout, "{name}");
            }

            Ok(None)
        }
    };

    match res {
        Ok(Some(exit_code)) => std::process::exit(exit_code),
        Ok(None) => (),
        Err(e) => {
            eprintln!("{e:?}");
            std::process::exit(1);
        }
    }
}
