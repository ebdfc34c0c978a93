use std::ffi::OsStr;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use miette::IntoDiagnostic;
use sisto_engine::engine::StopDecisionEngine;
use sisto_engine::hook::{EventHookAdapter, GlobalHook, MaskedHook};
use sisto_engine::session::DebugSession;
use sisto_runtime::{Error, ExprEvaluator, FrameHandle, Vm};

use crate::config::DebugScript;
use crate::repl::{InteractiveProcessor, StdSink};
use crate::resolve::resolve_location;

/// Runs the subcommand for debugging a demo program.
pub fn evaluate_run(
    config: Option<String>,
    breakpoints: Vec<String>,
    no_entry_stop: bool,
    fire_all: bool,
    demo: String,
) -> miette::Result<i32> {
    let program = crate::demos::demo_program(&demo)
        .ok_or_else(|| miette::miette!("unknown demo {demo:?} (see `sisto demos`)"))?;
    let program = Arc::new(program);

    let engine = Arc::new(StopDecisionEngine::new(ExprEvaluator));
    engine.set_sink(Box::new(StdSink));

    if let Some(config) = config {
        let script = parse_debug_script(config)?;

        for directive in script.breakpoints {
            let mut spec = resolve_location(&program, &directive.location).into_diagnostic()?;
            spec.condition = directive.condition;
            spec.temporary = directive.temporary;

            let number = engine.add_breakpoint(spec).into_diagnostic()?;

            if directive.ignore > 0 {
                engine
                    .set_breakpoint_ignore(number, directive.ignore)
                    .into_diagnostic()?;
            }
        }
    }

    for location in breakpoints {
        let spec = resolve_location(&program, &location).into_diagnostic()?;
        engine.add_breakpoint(spec).into_diagnostic()?;
    }

    if !no_entry_stop {
        // suspend before the debuggee's first event, like an entry prompt
        engine.arm_step(1);
    }

    let processor = InteractiveProcessor::new(program.clone());
    let session = Arc::new(DebugSession::new(engine, processor));

    let vm = Vm::new((*program).clone());

    let result = if fire_all {
        run_under(&vm, &GlobalHook::new(session.clone()))
    } else {
        run_under(&vm, &MaskedHook::new(session.clone()))
    };

    let stats = session.stats();
    tracing::info!(
        events = stats.events,
        stops = stats.stops,
        reentrancy_skips = stats.reentrancy_skips,
        "session finished"
    );

    let mut stdout = std::io::stdout();

    match result {
        Ok(value) => {
            let _ = writeln!(stdout, "program finished, returned {value}");
            Ok(0)
        }
        Err(Error::Terminated) => {
            let _ = writeln!(stdout, "terminated");
            Ok(2)
        }
        Err(Error::Uncaught(message)) => {
            let _ = writeln!(stdout, "uncaught exception: {message}");
            Ok(1)
        }
        Err(error) => Err(error).into_diagnostic(),
    }
}

fn run_under<H>(vm: &Vm, hook: &H) -> sisto_runtime::Result<sisto_runtime::Value>
where
    H: EventHookAdapter<FrameHandle>,
{
    vm.run("main", Vec::new(), hook)
}

fn parse_debug_script(config: String) -> miette::Result<DebugScript> {
    let path = Path::new(&config);

    let script = if let Some((filename, "kdl")) = path
        .file_name()
        .and_then(OsStr::to_str)
        .zip(path.extension().and_then(OsStr::to_str))
    {
        let content = std::fs::read_to_string(path).into_diagnostic()?;
        knus::parse(filename, &content)?
    } else {
        knus::parse("<content>", &config)?
    };

    Ok(script)
}
