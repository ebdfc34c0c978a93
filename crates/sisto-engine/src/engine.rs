use std::cell::Cell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::activation::Activation;
use crate::breakpoint::{BreakpointRegistry, BreakpointSpec};
use crate::condition::ConditionEvaluator;
use crate::error::Result;
use crate::event::{Event, EventKind, EventMask};
use crate::session::{OutputSink, TracingSink};
use crate::stepping::SteppingController;

/// Why execution was suspended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// A breakpoint matched the current event.
    Breakpoint {
        /// Number of the matched breakpoint.
        number: u32,
    },

    /// A step or next boundary was reached.
    Step,

    /// A finish or next boundary was reached at a return event.
    Return,

    /// An exception event occurred within stepping range.
    Exception,
}

/// Decision returned for one execution event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Resume execution immediately.
    Continue,

    /// Suspend execution and hand control to the command processor.
    Stop(StopReason),
}

/// Counters accumulated across a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Events that entered the decision path.
    pub events: u64,

    /// Stop verdicts returned.
    pub stops: u64,

    /// Events dropped by the reentrancy guard.
    pub reentrancy_skips: u64,
}

/// Gate suppressing every stop until a source position is reached.
#[derive(Clone, Debug)]
struct RunUntil {
    file: String,
    line: u32,
}

thread_local! {
    /// Whether a decision is already in progress on this thread.
    static DECIDING: Cell<bool> = const { Cell::new(false) };
}

/// Marker held while a decision runs; re-entry from the same thread bails
/// out before touching the engine lock.
struct DecisionGuard;

impl DecisionGuard {
    fn try_enter() -> Option<Self> {
        DECIDING.with(|flag| {
            if flag.get() {
                None
            } else {
                flag.set(true);
                Some(Self)
            }
        })
    }
}

impl Drop for DecisionGuard {
    fn drop(&mut self) {
        DECIDING.with(|flag| flag.set(false));
    }
}

/// State shared by the decision hot path and the command surface.
///
/// Everything lives under one lock: the full matching scan, its hit
/// accounting and any command-layer mutation are serialized, so counts can
/// neither double nor skip under a multi-threaded debuggee.
struct EngineState<A: Activation, E> {
    registry: BreakpointRegistry<A::Code>,
    stepping: SteppingController,
    evaluator: E,

    /// Excludes the debugger's own implementation frames from decisions.
    ignore_filter: Option<Box<dyn FnMut(&A) -> bool + Send>>,

    /// Observational side channel; never affects the verdict.
    observer: Option<Box<dyn FnMut(&Event<A>) + Send>>,

    /// Active run-until gate, if any.
    run_until: Option<RunUntil>,

    /// Event kinds the engine is interested in at all.
    event_mask: EventMask,

    /// Diagnostic channel for condition-evaluation failures.
    sink: Box<dyn OutputSink + Send>,

    events: u64,
    stops: u64,
}

/// The single entry point invoked once per execution event.
///
/// The engine is one shared instance; cloning an [`Arc`](std::sync::Arc) of
/// it into every instrumented thread is the expected usage. Decisions are
/// serialized by an internal non-reentrant lock, guarded by a per-thread
/// flag: if deciding an event triggers more instrumented execution on the
/// same thread (a guard condition calling back into the debuggee, say), the
/// nested invocation resolves silently to [`Verdict::Continue`].
///
/// The engine never blocks and never owns the user-interaction lock; see
/// [`DebugSession`](crate::session::DebugSession) for the suspension side.
pub struct StopDecisionEngine<A: Activation, E: ConditionEvaluator<A>> {
    state: Mutex<EngineState<A, E>>,

    /// Depth of self-instrumentation suspension requests.
    suspended: AtomicUsize,

    reentrancy_skips: AtomicU64,
}

impl<A: Activation, E: ConditionEvaluator<A>> StopDecisionEngine<A, E> {
    /// Creates an engine deciding with the given condition evaluator.
    ///
    /// Diagnostics go to the tracing subscriber until
    /// [`set_sink`](Self::set_sink) installs a real channel.
    pub fn new(evaluator: E) -> Self {
        Self {
            state: Mutex::new(EngineState {
                registry: BreakpointRegistry::new(),
                stepping: SteppingController::new(),
                evaluator,
                ignore_filter: None,
                observer: None,
                run_until: None,
                event_mask: EventMask::all(),
                sink: Box::new(TracingSink),
                events: 0,
                stops: 0,
            }),
            suspended: AtomicUsize::new(0),
            reentrancy_skips: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState<A, E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Installs the diagnostic output channel.
    pub fn set_sink(&self, sink: Box<dyn OutputSink + Send>) {
        self.lock().sink = sink;
    }

    /// Installs a filter excluding the debugger's own frames.
    ///
    /// Events whose activation the filter claims are dropped before any
    /// stepping or breakpoint logic runs.
    pub fn set_ignore_filter(&self, filter: Box<dyn FnMut(&A) -> bool + Send>) {
        self.lock().ignore_filter = Some(filter);
    }

    /// Installs an observational trace callback.
    pub fn set_observer(&self, observer: Box<dyn FnMut(&Event<A>) + Send>) {
        self.lock().observer = Some(observer);
    }

    /// Restricts the event kinds the engine considers at all.
    pub fn set_event_mask(&self, mask: EventMask) {
        self.lock().event_mask = mask;
    }

    /// Enables or disables the different-line stop suppression.
    pub fn set_different_line_only(&self, enabled: bool) {
        self.lock().stepping.set_different_line_only(enabled);
    }

    /// Suspends decision making while the returned guard lives.
    ///
    /// Used around debugger-internal execution (rendering a value, say) so
    /// the engine does not observe its own machinery.
    pub fn suspend_instrumentation(&self) -> SuspendGuard<'_, A, E> {
        self.suspended.fetch_add(1, Ordering::AcqRel);
        SuspendGuard { engine: self }
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> EngineStats {
        let state = self.lock();

        EngineStats {
            events: state.events,
            stops: state.stops,
            reentrancy_skips: self.reentrancy_skips.load(Ordering::Acquire),
        }
    }

    //
    // command surface (registry)
    //

    /// Registers a breakpoint, returning its permanent number.
    pub fn add_breakpoint(&self, spec: BreakpointSpec<A::Code>) -> Result<u32> {
        let number = self.lock().registry.add(spec)?;
        tracing::debug!(number, "breakpoint added");
        Ok(number)
    }

    /// Deletes a breakpoint by number.
    pub fn delete_breakpoint(&self, number: u32) -> Result<()> {
        self.lock().registry.delete(number)
    }

    /// Deletes every breakpoint at a source position, returning the numbers
    /// removed.
    pub fn delete_breakpoints_by_line(&self, file: &str, line: u32) -> Vec<u32> {
        self.lock().registry.delete_by_line(file, line)
    }

    /// Enables a breakpoint by number.
    pub fn enable_breakpoint(&self, number: u32) -> Result<()> {
        self.lock().registry.enable(number)
    }

    /// Disables a breakpoint by number.
    pub fn disable_breakpoint(&self, number: u32) -> Result<()> {
        self.lock().registry.disable(number)
    }

    /// Enables every breakpoint.
    pub fn enable_all_breakpoints(&self) {
        self.lock().registry.enable_all();
    }

    /// Disables every breakpoint.
    pub fn disable_all_breakpoints(&self) {
        self.lock().registry.disable_all();
    }

    /// Deletes every breakpoint; numbering keeps counting upward.
    pub fn clear_breakpoints(&self) {
        self.lock().registry.reset();
    }

    /// Replaces (or clears) the guard expression of a breakpoint.
    pub fn set_breakpoint_condition(&self, number: u32, condition: Option<String>) -> Result<()> {
        self.lock().registry.set_condition(number, condition)
    }

    /// Sets the number of effective hits a breakpoint passes silently.
    pub fn set_breakpoint_ignore(&self, number: u32, count: u64) -> Result<()> {
        self.lock().registry.set_ignore(number, count)
    }

    /// Numbers of all live breakpoints.
    pub fn breakpoint_numbers(&self) -> Vec<u32> {
        self.lock().registry.numbers()
    }

    /// Renders the listing entry of one breakpoint.
    pub fn format_breakpoint(&self, number: u32) -> Result<String> {
        self.lock().registry.format(number)
    }

    /// Renders the listing entries of every live breakpoint.
    pub fn format_breakpoints(&self) -> Vec<String> {
        self.lock().registry.format_all()
    }

    //
    // command surface (stepping)
    //

    /// Arms a `step`: stop on the `count`-th subsequent qualifying event.
    pub fn arm_step(&self, count: u64) {
        self.lock().stepping.arm_step(count);
    }

    /// Arms a `next` relative to the given activation.
    pub fn arm_next(&self, count: u64, activation: &A) {
        self.lock().stepping.arm_next(count, activation);
    }

    /// Arms a `finish` of the given activation.
    pub fn arm_finish(&self, activation: &A) {
        self.lock().stepping.arm_finish(activation);
    }

    /// Clears all armed stepping state; execution runs until a breakpoint.
    pub fn clear_stepping(&self) {
        let mut state = self.lock();
        state.stepping.clear();
        state.run_until = None;
    }

    /// Suppresses every stop until the given source position is reached
    /// (or the current activation returns).
    pub fn run_until(&self, file: &str, line: u32) {
        let mut state = self.lock();
        let file = state.registry.canonic(file);
        state.run_until = Some(RunUntil { file, line });
    }

    /// Returns whether an armed stepping command follows calls into
    /// callees.
    pub fn step_into_armed(&self) -> bool {
        self.lock().stepping.follows_calls()
    }

    /// Returns whether any stepping command is armed.
    pub fn stepping_armed(&self) -> bool {
        self.lock().stepping.is_armed()
    }

    /// Event kinds currently worth instrumenting for a code unit, judged
    /// from the registered breakpoints alone.
    ///
    /// Used by mask-narrowing hook adapters, together with
    /// [`stepping_interest`](Self::stepping_interest); a fire-everything
    /// adapter can ignore both and rely on the engine's own filters.
    pub fn breakpoint_interest(&self, file: &str, code: &A::Code) -> EventMask {
        let mut state = self.lock();

        let mut mask = state.registry.interest_in_file(file);

        if state.registry.has_code_target(code) {
            mask |= EventMask::CALL;
        }

        mask
    }

    /// Event kinds the armed stepping command could stop on in the given
    /// activation.
    pub fn stepping_interest(&self, activation: &A) -> EventMask {
        self.lock().stepping.interest(activation)
    }

    //
    // hot path
    //

    /// Decides whether execution suspends at the given event.
    ///
    /// Invoked once per instrumented event, on whichever debuggee thread
    /// produced it. Never blocks on anything but the decision lock itself
    /// and never lets an internal failure escape into the debuggee.
    pub fn on_event(&self, event: &Event<A>) -> Verdict {
        if self.suspended.load(Ordering::Acquire) > 0 {
            return Verdict::Continue;
        }

        let Some(_guard) = DecisionGuard::try_enter() else {
            self.reentrancy_skips.fetch_add(1, Ordering::AcqRel);
            return Verdict::Continue;
        };

        let mut state = self.lock();
        state.decide(event)
    }
}

impl<A: Activation, E: ConditionEvaluator<A>> EngineState<A, E> {
    fn decide(&mut self, event: &Event<A>) -> Verdict {
        self.events += 1;

        if let Some(filter) = &mut self.ignore_filter {
            if filter(&event.activation) {
                return Verdict::Continue;
            }
        }

        if let Some(observer) = &mut self.observer {
            observer(event);
        }

        if let Some(gate) = self.run_until.take() {
            let activation = &event.activation;
            let reached = self.registry.canonic(activation.file()) == gate.file
                && activation.line() >= gate.line;

            if !reached && event.kind != EventKind::Return {
                self.run_until = Some(gate);
                return Verdict::Continue;
            }
        }

        if !self.event_mask.selects(event.kind) {
            return Verdict::Continue;
        }

        // both checks always run: a breakpoint hit coincident with a
        // stepping stop is reported under the breakpoint's identity
        let step_reason = self.stepping.should_stop(event);

        let hit = self
            .registry
            .find_match(&event.activation, event.kind, &mut self.evaluator);

        let reason = match hit {
            Some(hit) => {
                if let Some(error) = &hit.condition_error {
                    self.sink.errmsg(&format!(
                        "Error evaluating condition on breakpoint {}: {error}",
                        hit.number
                    ));
                }

                if hit.temporary && hit.auto_delete {
                    let _ = self.registry.delete(hit.number);
                }

                Some(StopReason::Breakpoint { number: hit.number })
            }
            None => step_reason,
        };

        match reason {
            Some(reason) => {
                self.stepping.note_stop(&event.activation);
                self.stops += 1;

                tracing::debug!(
                    kind = ?event.kind,
                    file = event.activation.file(),
                    line = event.activation.line(),
                    reason = ?reason,
                    "stopping"
                );

                Verdict::Stop(reason)
            }
            None => Verdict::Continue,
        }
    }
}

/// Guard keeping decision making suspended while it lives.
pub struct SuspendGuard<'e, A: Activation, E: ConditionEvaluator<A>> {
    engine: &'e StopDecisionEngine<A, E>,
}

impl<A: Activation, E: ConditionEvaluator<A>> Drop for SuspendGuard<'_, A, E> {
    fn drop(&mut self) {
        self.engine.suspended.fetch_sub(1, Ordering::AcqRel);
    }
}
