use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use sisto_engine::Activation;
use sisto_engine::engine::{StopDecisionEngine, StopReason};
use sisto_engine::hook::{GlobalHook, MaskedHook};
use sisto_engine::session::{CommandProcessor, DebugSession, OutputSink, ResumeAction};
use sisto_runtime::{ExprEvaluator, FrameHandle, Instr, Program};

pub type Engine = StopDecisionEngine<FrameHandle, ExprEvaluator>;

/// One observed stop: function, line, reason.
pub type Stop = (String, u32, StopReason);

/// Command processor replaying canned resume actions and recording every
/// stop it is handed.
pub struct ScriptedProcessor {
    actions: VecDeque<ResumeAction>,
    stops: Arc<Mutex<Vec<Stop>>>,
}

impl ScriptedProcessor {
    pub fn new(actions: impl IntoIterator<Item = ResumeAction>) -> (Self, Arc<Mutex<Vec<Stop>>>) {
        let stops = Arc::new(Mutex::new(Vec::new()));

        (
            Self {
                actions: actions.into_iter().collect(),
                stops: stops.clone(),
            },
            stops,
        )
    }
}

impl CommandProcessor<FrameHandle, ExprEvaluator> for ScriptedProcessor {
    fn on_stop(
        &mut self,
        activation: &FrameHandle,
        reason: &StopReason,
        _engine: &Engine,
    ) -> ResumeAction {
        self.stops.lock().unwrap().push((
            activation.function_name().to_owned(),
            activation.line(),
            reason.clone(),
        ));

        self.actions.pop_front().unwrap_or(ResumeAction::Continue)
    }
}

/// Sink collecting diagnostics for inspection.
#[derive(Clone, Default)]
pub struct CollectSink(pub Arc<Mutex<Vec<String>>>);

impl OutputSink for CollectSink {
    fn msg(&mut self, text: &str) {
        self.0.lock().unwrap().push(text.to_owned());
    }

    fn errmsg(&mut self, text: &str) {
        self.0.lock().unwrap().push(text.to_owned());
    }
}

/// Builds a session with a fire-everything hook.
pub fn global_hook(
    actions: impl IntoIterator<Item = ResumeAction>,
) -> (
    GlobalHook<FrameHandle, ExprEvaluator, ScriptedProcessor>,
    Arc<Mutex<Vec<Stop>>>,
) {
    let (processor, stops) = ScriptedProcessor::new(actions);
    let engine = Arc::new(StopDecisionEngine::new(ExprEvaluator));
    let session = Arc::new(DebugSession::new(engine, processor));

    (GlobalHook::new(session), stops)
}

/// Builds a session with a mask-narrowing hook.
pub fn masked_hook(
    actions: impl IntoIterator<Item = ResumeAction>,
) -> (
    MaskedHook<FrameHandle, ExprEvaluator, ScriptedProcessor>,
    Arc<Mutex<Vec<Stop>>>,
) {
    let (processor, stops) = ScriptedProcessor::new(actions);
    let engine = Arc::new(StopDecisionEngine::new(ExprEvaluator));
    let session = Arc::new(DebugSession::new(engine, processor));

    (MaskedHook::new(session), stops)
}

/// `main` counts a local `i` from 0 to 5 and returns it.
///
/// ```text
/// 1  i = 0
/// 2  while i < 5:
/// 3      i = i + 1
/// 4  return i
/// ```
pub fn loop_program() -> Program {
    Program::builder("loop.si")
        .function("main", &[], |f| {
            f.at(1).constant(0).store("i");

            let top = f.here();
            f.at(2).load("i").constant(5).op(Instr::Lt);
            let exit = f.here();
            f.op(Instr::JumpIfFalse(usize::MAX));

            f.at(3)
                .load("i")
                .constant(1)
                .op(Instr::Add)
                .store("i")
                .op(Instr::Jump(top));

            let end = f.here();
            f.at(4).load("i").ret();

            f.resolve_jump(exit, end);
        })
        .build()
}

/// `main` routes a value through `helper` twice.
///
/// ```text
/// 1  a = 1
/// 2  a = helper(a)
/// 3  a = helper(a)
/// 4  return a
///
/// 10  t = n + 1
/// 11  return t
/// ```
pub fn call_program() -> Program {
    Program::builder("call.si")
        .function("main", &[], |f| {
            f.at(1).constant(1).store("a");
            f.at(2).load("a").call("helper", 1).store("a");
            f.at(3).load("a").call("helper", 1).store("a");
            f.at(4).load("a").ret();
        })
        .function("helper", &["n"], |f| {
            f.at(10).load("n").constant(1).op(Instr::Add).store("t");
            f.at(11).load("t").ret();
        })
        .build()
}

/// `main` stores `sum(3)` into the global `result`.
///
/// ```text
/// 1   result = sum(3)
/// 2   return 0
///
/// 10  if n < 1:
/// 11      return 0
/// 12  return n + sum(n - 1)
/// ```
pub fn recursion_program() -> Program {
    Program::builder("rec.si")
        .function("main", &[], |f| {
            f.at(1).constant(3).call("sum", 1).store_global("result");
            f.at(2).constant(0).ret();
        })
        .function("sum", &["n"], |f| {
            f.at(10).load("n").constant(1).op(Instr::Lt);
            let branch = f.here();
            f.op(Instr::JumpIfFalse(usize::MAX));

            f.at(11).constant(0).ret();

            let recurse = f.here();
            f.at(12)
                .load("n")
                .load("n")
                .constant(1)
                .op(Instr::Sub)
                .call("sum", 1)
                .op(Instr::Add)
                .ret();

            f.resolve_jump(branch, recurse);
        })
        .build()
}

/// `main` calls through `mid` into `inner`, which raises.
///
/// ```text
/// 1   mid()
/// 2   return 0
///
/// 15  inner()
/// 16  return 0
///
/// 20  raise 'boom'
/// ```
pub fn raise_program() -> Program {
    Program::builder("raise.si")
        .function("main", &[], |f| {
            f.at(1).call("mid", 0).store("unused");
            f.at(2).constant(0).ret();
        })
        .function("mid", &[], |f| {
            f.at(15).call("inner", 0).store("unused");
            f.at(16).constant(0).ret();
        })
        .function("inner", &[], |f| {
            f.at(20).raise("boom");
        })
        .build()
}
