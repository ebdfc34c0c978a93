use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::ThreadId;

use crate::activation::{Activation, FrameId};
use crate::condition::ConditionEvaluator;
use crate::event::{Event, EventKind, EventMask, ExceptionInfo};
use crate::session::{CommandProcessor, DebugSession, HookFlow};

/// Bridge between host-runtime instrumentation callbacks and the decision
/// engine.
///
/// The runtime reports every call, return and exception through the adapter
/// (the adapter needs them for its own bookkeeping, whatever the masks say)
/// and consults [`mask`](Self::mask) to decide whether emitting the much
/// more frequent line and instruction events is worth the trouble at all.
pub trait EventHookAdapter<A: Activation> {
    /// Event kinds currently worth emitting for the given activation.
    fn mask(&self, activation: &A) -> EventMask;

    /// Reports that execution reached a new source line.
    fn line(&self, activation: &A) -> HookFlow;

    /// Reports entry into a fresh activation.
    fn call(&self, activation: &A) -> HookFlow;

    /// Reports that an activation is finishing.
    ///
    /// `value` is absent when the activation is exited by an unwinding
    /// exception. Must be reported exactly once per activation, normal or
    /// unwinding exit alike.
    fn returned(&self, activation: &A, value: Option<A::Value>) -> HookFlow;

    /// Reports an exception raised in, or propagating through, an
    /// activation.
    fn exception(&self, activation: &A, info: &ExceptionInfo) -> HookFlow;

    /// Reports that a bytecode instruction is about to execute.
    fn instruction(&self, activation: &A) -> HookFlow;
}

/// Tracks which activations already got a decision for a propagating
/// exception, so one unwind yields one decision per activation no matter
/// how many hops the runtime reports.
#[derive(Default)]
struct UnwindBook {
    by_thread: Mutex<HashMap<ThreadId, (u64, HashSet<FrameId>)>>,
}

impl UnwindBook {
    /// Returns whether this is the first sighting of `exception` in `frame`
    /// on the current thread.
    fn first_decision(&self, exception: u64, frame: FrameId) -> bool {
        let mut book = self
            .by_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let (current, decided) = book
            .entry(std::thread::current().id())
            .or_insert_with(|| (exception, HashSet::new()));

        if *current != exception {
            *current = exception;
            decided.clear();
        }

        decided.insert(frame)
    }
}

/// Variant (i): a single uniform hook receiving every event of every live
/// activation.
///
/// Simple and bookkeeping-free, at the price of paying instrumentation
/// overhead even when nothing is of interest; every filter then runs inside
/// the engine. Use [`MaskedHook`] when the host runtime can keep
/// per-code-unit event masks.
pub struct GlobalHook<A: Activation, E: ConditionEvaluator<A>, P> {
    session: Arc<DebugSession<A, E, P>>,
    unwinds: UnwindBook,
}

impl<A, E, P> GlobalHook<A, E, P>
where
    A: Activation,
    E: ConditionEvaluator<A>,
    P: CommandProcessor<A, E>,
{
    /// Creates a fire-everything hook over the given session.
    pub fn new(session: Arc<DebugSession<A, E, P>>) -> Self {
        Self {
            session,
            unwinds: UnwindBook::default(),
        }
    }

    /// The underlying session.
    pub fn session(&self) -> &Arc<DebugSession<A, E, P>> {
        &self.session
    }
}

impl<A, E, P> EventHookAdapter<A> for GlobalHook<A, E, P>
where
    A: Activation,
    E: ConditionEvaluator<A>,
    P: CommandProcessor<A, E>,
{
    fn mask(&self, _activation: &A) -> EventMask {
        EventMask::all()
    }

    fn line(&self, activation: &A) -> HookFlow {
        self.session
            .dispatch(&Event::new(EventKind::Line, activation.clone()))
    }

    fn call(&self, activation: &A) -> HookFlow {
        self.session
            .dispatch(&Event::new(EventKind::Call, activation.clone()))
    }

    fn returned(&self, activation: &A, value: Option<A::Value>) -> HookFlow {
        self.session
            .dispatch(&Event::returning(activation.clone(), value))
    }

    fn exception(&self, activation: &A, info: &ExceptionInfo) -> HookFlow {
        if !self.unwinds.first_decision(info.id, activation.frame_id()) {
            return HookFlow::Continue;
        }

        self.session
            .dispatch(&Event::exception(activation.clone(), info.clone()))
    }

    fn instruction(&self, activation: &A) -> HookFlow {
        self.session
            .dispatch(&Event::new(EventKind::Instruction, activation.clone()))
    }
}

/// Mask installed for a code unit while activations of it are live.
struct Installed {
    mask: EventMask,

    /// Live activations of the code unit, across every thread. The install
    /// is released when the count drains to zero, so recursive or
    /// cross-thread re-entries can neither leak a mask nor clobber each
    /// other's restore.
    live: usize,
}

/// Variant (ii): per-code-unit event masks, narrowed to what is currently
/// relevant.
///
/// Breakpoint interest is recomputed at every activation entry; stepping
/// interest widens the mask of activations a `step` can reach and leaves
/// stepped-over callees uninstrumented. A mask set for a still-live call is
/// released exactly once when that call returns or unwinds.
pub struct MaskedHook<A: Activation, E: ConditionEvaluator<A>, P> {
    session: Arc<DebugSession<A, E, P>>,
    book: Mutex<MaskBook<A::Code>>,
    unwinds: UnwindBook,
}

struct MaskBook<C> {
    installed: HashMap<C, Installed>,

    /// Frame -> code unit whose install that frame's exit releases.
    pending: HashMap<FrameId, C>,
}

impl<A, E, P> MaskedHook<A, E, P>
where
    A: Activation,
    E: ConditionEvaluator<A>,
    P: CommandProcessor<A, E>,
{
    /// Creates a mask-narrowing hook over the given session.
    pub fn new(session: Arc<DebugSession<A, E, P>>) -> Self {
        Self {
            session,
            book: Mutex::new(MaskBook {
                installed: HashMap::new(),
                pending: HashMap::new(),
            }),
            unwinds: UnwindBook::default(),
        }
    }

    /// The underlying session.
    pub fn session(&self) -> &Arc<DebugSession<A, E, P>> {
        &self.session
    }

    fn book(&self) -> MutexGuard<'_, MaskBook<A::Code>> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Full mask an activation deserves right now.
    fn compute(&self, activation: &A) -> EventMask {
        let engine = self.session.engine();

        engine.breakpoint_interest(activation.file(), &activation.code())
            | engine.stepping_interest(activation)
    }

    /// Re-installs a fresh mask for the activation's code unit.
    ///
    /// Called after every dispatched event: a stop may have re-armed the
    /// stepping state, and the installed mask has to follow.
    fn refresh(&self, activation: &A) {
        let mask = self.compute(activation);

        if let Some(installed) = self.book().installed.get_mut(&activation.code()) {
            installed.mask = mask;
        }
    }

    fn dispatch(&self, event: &Event<A>) -> HookFlow {
        let flow = self.session.dispatch(event);
        self.refresh(&event.activation);
        flow
    }
}

impl<A, E, P> EventHookAdapter<A> for MaskedHook<A, E, P>
where
    A: Activation,
    E: ConditionEvaluator<A>,
    P: CommandProcessor<A, E>,
{
    fn mask(&self, activation: &A) -> EventMask {
        self.book()
            .installed
            .get(&activation.code())
            .map_or(EventMask::empty(), |installed| installed.mask)
    }

    fn line(&self, activation: &A) -> HookFlow {
        if !self.mask(activation).selects(EventKind::Line) {
            return HookFlow::Continue;
        }

        self.dispatch(&Event::new(EventKind::Line, activation.clone()))
    }

    fn call(&self, activation: &A) -> HookFlow {
        let mask = self.compute(activation);
        let code = activation.code();

        {
            let mut book = self.book();

            book.installed
                .entry(code.clone())
                .and_modify(|installed| {
                    installed.mask |= mask;
                    installed.live += 1;
                })
                .or_insert(Installed { mask, live: 1 });

            book.pending.insert(activation.frame_id(), code);
        }

        if !self.mask(activation).selects(EventKind::Call) {
            return HookFlow::Continue;
        }

        self.dispatch(&Event::new(EventKind::Call, activation.clone()))
    }

    fn returned(&self, activation: &A, value: Option<A::Value>) -> HookFlow {
        let dispatched = self.mask(activation).selects(EventKind::Return);

        let flow = if dispatched {
            self.dispatch(&Event::returning(activation.clone(), value))
        } else {
            HookFlow::Continue
        };

        // release the install exactly once, dispatched or not
        let mut book = self.book();

        if let Some(code) = book.pending.remove(&activation.frame_id()) {
            if let Some(installed) = book.installed.get_mut(&code) {
                installed.live = installed.live.saturating_sub(1);

                if installed.live == 0 {
                    book.installed.remove(&code);
                }
            }
        }

        flow
    }

    fn exception(&self, activation: &A, info: &ExceptionInfo) -> HookFlow {
        if !self.unwinds.first_decision(info.id, activation.frame_id()) {
            return HookFlow::Continue;
        }

        if !self.mask(activation).selects(EventKind::Exception) {
            return HookFlow::Continue;
        }

        self.dispatch(&Event::exception(activation.clone(), info.clone()))
    }

    fn instruction(&self, activation: &A) -> HookFlow {
        if !self.mask(activation).selects(EventKind::Instruction) {
            return HookFlow::Continue;
        }

        self.dispatch(&Event::new(EventKind::Instruction, activation.clone()))
    }
}
