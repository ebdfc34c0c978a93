use std::sync::{Arc, Mutex, PoisonError};

use crate::activation::Activation;
use crate::condition::ConditionEvaluator;
use crate::engine::{StopDecisionEngine, StopReason, Verdict};
use crate::event::Event;

/// Channel for debugger diagnostics and confirmations.
///
/// Implemented by the surrounding application (terminal, remote client);
/// the engine reports condition-evaluation failures through it and command
/// processors print confirmations on it.
pub trait OutputSink {
    /// Reports an informational message.
    fn msg(&mut self, text: &str);

    /// Reports an error message.
    fn errmsg(&mut self, text: &str);
}

/// Sink routing messages to the tracing subscriber.
///
/// The default until a session installs a real channel; keeps diagnostics
/// from being lost when the engine runs headless.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl OutputSink for TracingSink {
    fn msg(&mut self, text: &str) {
        tracing::info!("{text}");
    }

    fn errmsg(&mut self, text: &str) {
        tracing::error!("{text}");
    }
}

/// How execution resumes after a stop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResumeAction {
    /// Stop again after `count` qualifying events, whatever their depth.
    Step(u64),

    /// Stop again after `count` qualifying events at or above the current
    /// depth, stepping over calls.
    Next(u64),

    /// Run until the current activation returns to its caller.
    Finish,

    /// Run until the given line of the current file is reached.
    Until(u32),

    /// Run until the next breakpoint.
    Continue,

    /// Tear the debuggee down.
    Terminate,
}

/// What the instrumented runtime should do after reporting an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookFlow {
    /// Keep executing.
    Continue,

    /// The command processor asked for termination; the runtime unwinds by
    /// whatever force-terminate path it has, without further decisions.
    Terminate,
}

/// The interactive side of the debugger.
///
/// Receives the suspended activation and the stop reason, drives whatever
/// read-eval-print loop the application has, and answers with a
/// [`ResumeAction`]. The engine reference allows the loop to create, delete
/// and reconfigure breakpoints while the debuggee is suspended; every such
/// call serializes on the engine's own lock.
pub trait CommandProcessor<A: Activation, E: ConditionEvaluator<A>> {
    /// Runs the interactive loop for one stop.
    fn on_stop(
        &mut self,
        activation: &A,
        reason: &StopReason,
        engine: &StopDecisionEngine<A, E>,
    ) -> ResumeAction;
}

/// One debugging session: the engine plus its interactive collaborator.
///
/// The session owns the user-interaction lock. The engine decides with its
/// own lock released before the command processor blocks, so other debuggee
/// threads keep running (and keep being decided on) while one thread sits
/// at the prompt.
pub struct DebugSession<A: Activation, E: ConditionEvaluator<A>, P> {
    engine: Arc<StopDecisionEngine<A, E>>,
    processor: Mutex<P>,
}

impl<A, E, P> DebugSession<A, E, P>
where
    A: Activation,
    E: ConditionEvaluator<A>,
    P: CommandProcessor<A, E>,
{
    /// Creates a session around an engine and a command processor.
    pub fn new(engine: Arc<StopDecisionEngine<A, E>>, processor: P) -> Self {
        Self {
            engine,
            processor: Mutex::new(processor),
        }
    }

    /// The shared decision engine.
    pub fn engine(&self) -> &Arc<StopDecisionEngine<A, E>> {
        &self.engine
    }

    /// Feeds one event through the engine and, on a stop, through the
    /// command processor.
    #[must_use]
    pub fn dispatch(&self, event: &Event<A>) -> HookFlow {
        match self.engine.on_event(event) {
            Verdict::Continue => HookFlow::Continue,
            Verdict::Stop(reason) => self.suspend(event, &reason),
        }
    }

    /// Hands a suspended activation to the command processor and re-arms
    /// the engine from its answer.
    fn suspend(&self, event: &Event<A>, reason: &StopReason) -> HookFlow {
        let activation = &event.activation;

        tracing::info!(
            file = activation.file(),
            line = activation.line(),
            reason = ?reason,
            "suspended"
        );

        let action = {
            let mut processor = self
                .processor
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            processor.on_stop(activation, reason, &self.engine)
        };

        // every resume command resets the stepping state before the
        // debuggee moves again
        self.engine.clear_stepping();

        match action {
            ResumeAction::Step(count) => self.engine.arm_step(count.max(1)),
            ResumeAction::Next(count) => self.engine.arm_next(count.max(1), activation),
            ResumeAction::Finish => self.engine.arm_finish(activation),
            ResumeAction::Until(line) => {
                // an armed `next` supplies the stop once the gate opens (or
                // the activation returns first)
                self.engine.run_until(activation.file(), line);
                self.engine.arm_next(1, activation);
            }
            ResumeAction::Continue => {}
            ResumeAction::Terminate => {
                let stats = self.engine.stats();
                tracing::info!(
                    events = stats.events,
                    stops = stats.stops,
                    reentrancy_skips = stats.reentrancy_skips,
                    "session terminated"
                );

                return HookFlow::Terminate;
            }
        }

        HookFlow::Continue
    }

    /// Final session counters, typically logged on detach.
    pub fn stats(&self) -> crate::engine::EngineStats {
        self.engine.stats()
    }
}
