use std::io::{BufRead, Write};
use std::sync::Arc;

use sisto_engine::Activation;
use sisto_engine::engine::{StopDecisionEngine, StopReason};
use sisto_engine::session::{CommandProcessor, OutputSink, ResumeAction};
use sisto_runtime::{ExprEvaluator, FrameHandle, Program};

use crate::resolve::resolve_location;

type Engine = StopDecisionEngine<FrameHandle, ExprEvaluator>;

/// Sink writing engine diagnostics to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdSink;

impl OutputSink for StdSink {
    fn msg(&mut self, text: &str) {
        let _ = writeln!(std::io::stdout(), "{text}");
    }

    fn errmsg(&mut self, text: &str) {
        let _ = writeln!(std::io::stdout(), "*** {text}");
    }
}

/// Line-oriented interactive command processor.
///
/// Blocks on its input stream while the debuggee is suspended; every
/// breakpoint mutation goes through the engine's command surface, so raw
/// location text never leaves this module unresolved.
pub struct InteractiveProcessor {
    program: Arc<Program>,
    input: Box<dyn BufRead + Send>,
    output: Box<dyn Write + Send>,
}

impl InteractiveProcessor {
    /// Creates a processor reading commands from standard input.
    #[must_use]
    pub fn new(program: Arc<Program>) -> Self {
        Self {
            program,
            input: Box::new(std::io::BufReader::new(std::io::stdin())),
            output: Box::new(std::io::stdout()),
        }
    }

    /// Creates a processor over explicit streams.
    pub fn with_io(
        program: Arc<Program>,
        input: Box<dyn BufRead + Send>,
        output: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            program,
            input,
            output,
        }
    }

    fn say(&mut self, text: &str) {
        let _ = writeln!(self.output, "{text}");
    }

    fn complain(&mut self, text: &str) {
        let _ = writeln!(self.output, "*** {text}");
    }

    fn show_backtrace(&mut self, activation: &FrameHandle) {
        let mut chain = Vec::new();
        let mut current = Some(activation.clone());

        while let Some(frame) = current {
            current = frame.caller();
            chain.push(frame);
        }

        for (index, frame) in chain.iter().enumerate() {
            let _ = writeln!(
                self.output,
                "#{index} {}() at {}:{}",
                frame.function_name(),
                frame.file(),
                frame.line()
            );
        }
    }

    fn add_breakpoint(&mut self, engine: &Engine, location: &str, temporary: bool) {
        let spec = match resolve_location(&self.program, location) {
            Ok(spec) => spec,
            Err(error) => return self.complain(&error.to_string()),
        };

        let spec = if temporary { spec.temporary() } else { spec };

        match engine.add_breakpoint(spec) {
            Ok(number) => match engine.format_breakpoint(number) {
                Ok(listing) => self.say(&listing),
                Err(error) => self.complain(&error.to_string()),
            },
            Err(error) => self.complain(&error.to_string()),
        }
    }

    fn parse_number(&mut self, token: Option<&str>) -> Option<u32> {
        match token.map(str::parse::<u32>) {
            Some(Ok(number)) => Some(number),
            _ => {
                self.complain("expected a breakpoint number");
                None
            }
        }
    }

    fn parse_count(&mut self, token: Option<&str>) -> u64 {
        match token.map(str::parse::<u64>) {
            Some(Ok(count)) if count >= 1 => count,
            None => 1,
            _ => {
                self.complain("expected a positive count, using 1");
                1
            }
        }
    }

    fn report(&mut self, outcome: sisto_engine::Result<()>) {
        if let Err(error) = outcome {
            self.complain(&error.to_string());
        }
    }
}

fn describe(reason: &StopReason) -> String {
    match reason {
        StopReason::Breakpoint { number } => format!("breakpoint {number}"),
        StopReason::Step => "step".to_owned(),
        StopReason::Return => "function return".to_owned(),
        StopReason::Exception => "exception".to_owned(),
    }
}

impl CommandProcessor<FrameHandle, ExprEvaluator> for InteractiveProcessor {
    fn on_stop(
        &mut self,
        activation: &FrameHandle,
        reason: &StopReason,
        engine: &Engine,
    ) -> ResumeAction {
        let _ = writeln!(
            self.output,
            "* {} at {}:{} in {}()",
            describe(reason),
            activation.file(),
            activation.line(),
            activation.function_name()
        );

        loop {
            let _ = write!(self.output, "(sisto) ");
            let _ = self.output.flush();

            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) | Err(_) => return ResumeAction::Terminate,
                Ok(_) => {}
            }

            let mut words = line.split_whitespace();
            let Some(command) = words.next() else {
                continue;
            };

            match command {
                "help" | "h" => {
                    self.say(
                        "commands: break tbreak condition ignore enable disable delete clear \
                         bplist step next finish until continue where print help quit",
                    );
                }

                "break" | "b" => match words.next() {
                    Some(location) => self.add_breakpoint(engine, location, false),
                    None => {
                        for listing in engine.format_breakpoints() {
                            self.say(&listing);
                        }
                    }
                },

                "tbreak" => match words.next() {
                    Some(location) => self.add_breakpoint(engine, location, true),
                    None => self.complain("tbreak needs a location"),
                },

                "bplist" => {
                    for listing in engine.format_breakpoints() {
                        self.say(&listing);
                    }
                }

                "condition" => {
                    if let Some(number) = self.parse_number(words.next()) {
                        let expr: Vec<&str> = words.collect();
                        let condition = if expr.is_empty() {
                            None
                        } else {
                            Some(expr.join(" "))
                        };

                        let outcome = engine.set_breakpoint_condition(number, condition);
                        self.report(outcome);
                    }
                }

                "ignore" => {
                    if let Some(number) = self.parse_number(words.next()) {
                        let count = self.parse_count(words.next());
                        let outcome = engine.set_breakpoint_ignore(number, count);
                        self.report(outcome);
                    }
                }

                "enable" => match words.next() {
                    Some("all") => engine.enable_all_breakpoints(),
                    token => {
                        if let Some(number) = self.parse_number(token) {
                            let outcome = engine.enable_breakpoint(number);
                            self.report(outcome);
                        }
                    }
                },

                "disable" => match words.next() {
                    Some("all") => engine.disable_all_breakpoints(),
                    token => {
                        if let Some(number) = self.parse_number(token) {
                            let outcome = engine.disable_breakpoint(number);
                            self.report(outcome);
                        }
                    }
                },

                "delete" => {
                    if let Some(number) = self.parse_number(words.next()) {
                        let outcome = engine.delete_breakpoint(number);
                        self.report(outcome);
                    }
                }

                "clear" => match words.next().map(|text| text.rsplit_once(':')) {
                    Some(Some((file, line))) => match line.parse::<u32>() {
                        Ok(line) => {
                            let deleted = engine.delete_breakpoints_by_line(file, line);

                            if deleted.is_empty() {
                                self.say("no breakpoints there");
                            } else {
                                let numbers: Vec<String> =
                                    deleted.iter().map(u32::to_string).collect();
                                self.say(&format!("deleted breakpoints {}", numbers.join(" ")));
                            }
                        }
                        Err(_) => self.complain("clear needs file:line"),
                    },
                    _ => self.complain("clear needs file:line"),
                },

                "step" | "s" => {
                    let count = self.parse_count(words.next());
                    return ResumeAction::Step(count);
                }

                "next" | "n" => {
                    let count = self.parse_count(words.next());
                    return ResumeAction::Next(count);
                }

                "finish" => return ResumeAction::Finish,

                "until" => match words.next().map(str::parse::<u32>) {
                    Some(Ok(line)) => return ResumeAction::Until(line),
                    _ => self.complain("until needs a line number"),
                },

                "continue" | "c" => return ResumeAction::Continue,

                "where" | "bt" => self.show_backtrace(activation),

                "print" | "p" => match words.next() {
                    Some(name) => match activation.get(name) {
                        Some(value) => self.say(&format!("{name} = {value}")),
                        None => self.complain(&format!("name '{name}' is not defined")),
                    },
                    None => {
                        for name in activation.local_names() {
                            if let Some(value) = activation.get(&name) {
                                self.say(&format!("{name} = {value}"));
                            }
                        }
                    }
                },

                "quit" | "q" => return ResumeAction::Terminate,

                unknown => self.complain(&format!("unknown command {unknown:?} (try help)")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    use sisto_engine::breakpoint::BreakpointSpec;
    use sisto_engine::hook::GlobalHook;
    use sisto_engine::session::DebugSession;
    use sisto_runtime::Vm;

    use super::*;
    use crate::demos::demo_program;

    /// Write target shared with the test.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if let Ok(mut inner) = self.0.lock() {
                inner.extend_from_slice(buf);
            }

            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn interactive_session_drives_the_engine() {
        let Some(program) = demo_program("countdown") else {
            unreachable!()
        };
        let program = Arc::new(program);

        let commands = "bplist\nprint i\nwhere\ndelete 1\nnext\ncontinue\n";
        let buffer = SharedBuf::default();

        let processor = InteractiveProcessor::with_io(
            program.clone(),
            Box::new(Cursor::new(commands.to_owned())),
            Box::new(buffer.clone()),
        );

        let engine = Arc::new(StopDecisionEngine::new(ExprEvaluator));
        engine
            .add_breakpoint(BreakpointSpec::at_line("countdown.si", 4))
            .expect("add");

        let session = Arc::new(DebugSession::new(engine, processor));
        let hook = GlobalHook::new(session);

        let vm = Vm::new((*program).clone());

        let result = vm.run("main", Vec::new(), &hook);
        assert!(result.is_ok());

        let output = buffer.0.lock().map(|inner| inner.clone()).unwrap_or_default();
        let output = String::from_utf8_lossy(&output).into_owned();

        assert!(
            output.contains("1 breakpoint keep yes - at countdown.si:4"),
            "{output}"
        );
        assert!(output.contains("i = 5"), "{output}");
        assert!(output.contains("#0 main() at countdown.si:4"), "{output}");
        assert!(output.contains("* step at countdown.si:5"), "{output}");
    }
}
