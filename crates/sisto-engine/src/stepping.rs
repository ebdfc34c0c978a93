use crate::activation::{Activation, FrameId};
use crate::engine::StopReason;
use crate::event::{Event, EventKind, EventMask};

/// Armed stepping state.
///
/// One variant per user-facing stepping command, decided when the command
/// arms the controller. The armed depth is captured with the same
/// depth-counting function used to test it later, so the comparison stays
/// meaningful whatever the runtime's notion of an outermost frame is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StepMode {
    /// No stepping command armed; never auto-stop.
    Idle,

    /// Stop on the next qualifying event, regardless of depth.
    Step {
        /// Qualifying events still to pass silently.
        remaining: u64,
    },

    /// Stop on the next qualifying line event at or above the armed depth;
    /// anything deeper is being stepped over.
    Next {
        /// Qualifying events still to pass silently.
        remaining: u64,
        /// Depth the command was issued at.
        depth: usize,
    },

    /// Run until the current activation finishes.
    Finish {
        /// Depth of the caller of the activation being finished.
        depth: usize,
    },
}

/// Owns the stepping state and decides, per event, whether a step, next or
/// finish boundary has been reached.
///
/// The controller never looks at breakpoints; the engine runs both checks
/// and lets a breakpoint identity win when the two coincide.
#[derive(Debug)]
pub struct SteppingController {
    mode: StepMode,

    /// Depth of the last examined activation, so tight loops do not pay an
    /// O(depth) caller-chain walk per event.
    depth_cache: Option<(FrameId, usize)>,

    /// (file, line) of the previous stop, for different-line suppression.
    last_stop: Option<(String, u32)>,

    /// Frame the previous stop occurred in.
    last_stop_frame: Option<FrameId>,

    /// Whether a second stop on the previous stop's line is suppressed.
    different_line_only: bool,
}

impl Default for SteppingController {
    fn default() -> Self {
        Self::new()
    }
}

impl SteppingController {
    /// Creates an idle controller.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: StepMode::Idle,
            depth_cache: None,
            last_stop: None,
            last_stop_frame: None,
            different_line_only: true,
        }
    }

    /// Enables or disables the different-line suppression.
    ///
    /// With the filter off, constructs that re-execute one source line many
    /// times per host-level step appear to hang under `step`.
    pub fn set_different_line_only(&mut self, enabled: bool) {
        self.different_line_only = enabled;
    }

    /// Returns whether any stepping command is armed.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.mode != StepMode::Idle
    }

    /// Returns whether the armed command follows calls into callees.
    #[must_use]
    pub fn follows_calls(&self) -> bool {
        matches!(self.mode, StepMode::Step { .. })
    }

    /// Disarms stepping: execution continues until a breakpoint.
    pub fn clear(&mut self) {
        self.mode = StepMode::Idle;
    }

    /// Arms a `step`: stop on the `count`-th subsequent qualifying event,
    /// whatever its depth.
    pub fn arm_step(&mut self, count: u64) {
        self.mode = StepMode::Step {
            remaining: count.saturating_sub(1),
        };
    }

    /// Arms a `next` at the given activation: qualifying events deeper than
    /// it are stepped over.
    pub fn arm_next<A: Activation>(&mut self, count: u64, activation: &A) {
        self.mode = StepMode::Next {
            remaining: count.saturating_sub(1),
            depth: self.depth_of(activation),
        };
    }

    /// Arms a `finish` of the given activation: run until it returns to its
    /// caller.
    pub fn arm_finish<A: Activation>(&mut self, activation: &A) {
        self.mode = StepMode::Finish {
            depth: self.depth_of(activation).saturating_sub(1),
        };
    }

    /// Records where a stop happened, for different-line suppression.
    pub fn note_stop<A: Activation>(&mut self, activation: &A) {
        self.last_stop = Some((activation.file().to_owned(), activation.line()));
        self.last_stop_frame = Some(activation.frame_id());
    }

    /// Call depth of the given activation, recomputed only when it differs
    /// from the last one examined.
    pub fn depth_of<A: Activation>(&mut self, activation: &A) -> usize {
        let id = activation.frame_id();

        match self.depth_cache {
            Some((cached_id, depth)) if cached_id == id => depth,
            _ => {
                let depth = activation.call_depth();
                self.depth_cache = Some((id, depth));
                depth
            }
        }
    }

    /// Event kinds the armed command could stop on in the given activation.
    ///
    /// `step` follows calls, so everything stays instrumented; `next` and
    /// `finish` only need events from activations at or above the armed
    /// depth, while anything deeper is being stepped over and can run
    /// uninstrumented.
    pub fn interest<A: Activation>(&mut self, activation: &A) -> EventMask {
        match self.mode {
            StepMode::Idle => EventMask::empty(),
            StepMode::Step { .. } => EventMask::STEPPING,
            StepMode::Next { depth, .. } => {
                if self.depth_of(activation) <= depth {
                    EventMask::LINE | EventMask::RETURN | EventMask::EXCEPTION
                } else {
                    EventMask::empty()
                }
            }
            StepMode::Finish { depth } => {
                if self.depth_of(activation) <= depth + 1 {
                    EventMask::RETURN | EventMask::EXCEPTION
                } else {
                    EventMask::empty()
                }
            }
        }
    }

    /// Decides whether the armed stepping command stops at this event.
    ///
    /// Counters are consumed by qualifying events even when the final
    /// verdict belongs to a coincident breakpoint.
    pub fn should_stop<A: Activation>(&mut self, event: &Event<A>) -> Option<StopReason> {
        match self.mode {
            StepMode::Idle => None,

            StepMode::Step { remaining } => {
                if !self.qualifies(event) {
                    return None;
                }

                if remaining > 0 {
                    self.mode = StepMode::Step {
                        remaining: remaining - 1,
                    };
                    return None;
                }

                Some(reason_for(event.kind))
            }

            StepMode::Next { remaining, depth } => {
                let current = self.depth_of(&event.activation);

                if event.kind == EventKind::Return && current <= depth {
                    // the armed activation itself (or something above it)
                    // is finishing
                    return Some(StopReason::Return);
                }

                if current > depth {
                    return None;
                }

                match event.kind {
                    EventKind::Line => {
                        if !self.qualifies(event) {
                            return None;
                        }

                        if remaining > 0 {
                            self.mode = StepMode::Next {
                                remaining: remaining - 1,
                                depth,
                            };
                            return None;
                        }

                        Some(StopReason::Step)
                    }
                    EventKind::Exception => Some(StopReason::Exception),
                    _ => None,
                }
            }

            StepMode::Finish { depth } => {
                let current = self.depth_of(&event.activation);

                match event.kind {
                    // stop when control is about to return to the armed
                    // caller depth, even if the awaited activation was torn
                    // down by an unwind
                    EventKind::Return if current.saturating_sub(1) <= depth => {
                        Some(StopReason::Return)
                    }
                    EventKind::Exception if current <= depth => Some(StopReason::Exception),
                    _ => None,
                }
            }
        }
    }

    /// Which events count toward an armed step.
    ///
    /// Instruction events never do (they exist for offset-precision
    /// breakpoints, not stepping), and a line event on the previous stop's
    /// line does not qualify while the different-line filter is on.
    fn qualifies<A: Activation>(&self, event: &Event<A>) -> bool {
        match event.kind {
            EventKind::Instruction => false,
            EventKind::Line if self.different_line_only => match &self.last_stop {
                Some((file, line)) => {
                    *line != event.activation.line() || file != event.activation.file()
                }
                None => true,
            },
            _ => true,
        }
    }
}

fn reason_for(kind: EventKind) -> StopReason {
    match kind {
        EventKind::Return => StopReason::Return,
        EventKind::Exception => StopReason::Exception,
        _ => StopReason::Step,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    /// Linked activation chain for depth-sensitive tests.
    #[derive(Clone, Debug)]
    struct Chain(Arc<ChainInner>);

    #[derive(Debug)]
    struct ChainInner {
        id: u64,
        file: &'static str,
        line: u32,
        caller: Option<Chain>,
    }

    impl Chain {
        fn root(line: u32) -> Self {
            Self(Arc::new(ChainInner {
                id: 1,
                file: "t.si",
                line,
                caller: None,
            }))
        }

        fn push(&self, id: u64, line: u32) -> Self {
            Self(Arc::new(ChainInner {
                id,
                file: "t.si",
                line,
                caller: Some(self.clone()),
            }))
        }

        fn at_line(&self, line: u32) -> Self {
            Self(Arc::new(ChainInner {
                id: self.0.id,
                file: self.0.file,
                line,
                caller: self.0.caller.clone(),
            }))
        }
    }

    impl Activation for Chain {
        type Code = u64;
        type Value = i64;

        fn frame_id(&self) -> FrameId {
            FrameId(self.0.id)
        }

        fn code(&self) -> u64 {
            self.0.id
        }

        fn file(&self) -> &str {
            self.0.file
        }

        fn line(&self) -> u32 {
            self.0.line
        }

        fn instr_offset(&self) -> u32 {
            0
        }

        fn caller(&self) -> Option<Self> {
            self.0.caller.clone()
        }
    }

    fn line(activation: &Chain) -> Event<Chain> {
        Event::new(EventKind::Line, activation.clone())
    }

    fn ret(activation: &Chain) -> Event<Chain> {
        Event::returning(activation.clone(), None)
    }

    #[test]
    fn idle_never_stops() {
        let mut stepping = SteppingController::new();
        let root = Chain::root(1);

        assert_eq!(stepping.should_stop(&line(&root)), None);
    }

    #[test]
    fn step_counts_qualifying_events() {
        let mut stepping = SteppingController::new();
        let root = Chain::root(1);

        stepping.arm_step(3);

        assert_eq!(stepping.should_stop(&line(&root.at_line(2))), None);
        assert_eq!(stepping.should_stop(&line(&root.at_line(3))), None);
        assert_eq!(
            stepping.should_stop(&line(&root.at_line(4))),
            Some(StopReason::Step)
        );
    }

    #[test]
    fn step_repeats_on_one_line_are_suppressed() {
        let mut stepping = SteppingController::new();
        let root = Chain::root(5);

        stepping.arm_step(1);
        stepping.note_stop(&root);

        // the comprehension-like case: one source line, many line events
        assert_eq!(stepping.should_stop(&line(&root)), None);
        assert_eq!(stepping.should_stop(&line(&root)), None);
        assert_eq!(
            stepping.should_stop(&line(&root.at_line(6))),
            Some(StopReason::Step)
        );

        stepping.arm_step(1);
        stepping.set_different_line_only(false);
        assert_eq!(
            stepping.should_stop(&line(&root)),
            Some(StopReason::Step),
            "filter off: same line stops again"
        );
    }

    #[test]
    fn next_skips_over_nested_calls() {
        let mut stepping = SteppingController::new();
        let root = Chain::root(1);

        stepping.arm_next(1, &root);

        let callee = root.push(2, 10);
        let nested = callee.push(3, 20);

        assert_eq!(stepping.should_stop(&line(&callee)), None);
        assert_eq!(stepping.should_stop(&line(&nested)), None);
        assert_eq!(stepping.should_stop(&ret(&nested)), None);
        assert_eq!(stepping.should_stop(&ret(&callee)), None);

        assert_eq!(
            stepping.should_stop(&line(&root.at_line(2))),
            Some(StopReason::Step)
        );
    }

    #[test]
    fn next_stops_when_the_armed_activation_returns() {
        let mut stepping = SteppingController::new();
        let root = Chain::root(1);
        let frame = root.push(2, 10);

        stepping.arm_next(1, &frame);

        assert_eq!(stepping.should_stop(&ret(&frame)), Some(StopReason::Return));
    }

    #[test]
    fn finish_stops_once_through_recursion() {
        let mut stepping = SteppingController::new();
        let root = Chain::root(1);
        let outer = root.push(2, 10);

        stepping.arm_finish(&outer);

        // recursive calls made after arming stay silent
        let inner = outer.push(3, 10);
        let innermost = inner.push(4, 10);

        assert_eq!(stepping.should_stop(&line(&inner)), None);
        assert_eq!(stepping.should_stop(&ret(&innermost)), None);
        assert_eq!(stepping.should_stop(&ret(&inner)), None);

        assert_eq!(stepping.should_stop(&ret(&outer)), Some(StopReason::Return));
    }

    #[test]
    fn depth_is_cached_per_activation() {
        let mut stepping = SteppingController::new();
        let root = Chain::root(1);
        let frame = root.push(2, 10);

        assert_eq!(stepping.depth_of(&frame), 1);
        assert_eq!(stepping.depth_cache, Some((FrameId(2), 1)));

        // same identity: served from the cache
        assert_eq!(stepping.depth_of(&frame.at_line(11)), 1);

        assert_eq!(stepping.depth_of(&root), 0);
        assert_eq!(stepping.depth_cache, Some((FrameId(1), 0)));
    }
}
