use std::fmt;
use std::hash::Hash;

/// Stable identity of one live activation record.
///
/// The host runtime assigns a fresh identity to every activation it creates;
/// identities are never reused while the debuggee runs, so two handles with
/// the same [`FrameId`] refer to the same live call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u64);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque handle over one live call's frame state, provided by the
/// instrumented runtime.
///
/// Handles are cheap to clone (the runtime is expected to back them with a
/// shared pointer) and stay readable while the debuggee is suspended. The
/// engine itself never retains a handle past the decision it was part of;
/// only the [`FrameId`] and the (file, line) pair are remembered across
/// events.
pub trait Activation: Clone {
    /// Identity of the code unit (function, method, ...) this activation
    /// executes.
    type Code: Clone + Eq + Hash + fmt::Debug;

    /// Runtime value type, carried opaquely in event payloads.
    type Value: Clone + fmt::Debug;

    /// Stable identity of this activation.
    fn frame_id(&self) -> FrameId;

    /// Identity of the executed code unit.
    fn code(&self) -> Self::Code;

    /// Source file the executed code was defined in.
    fn file(&self) -> &str;

    /// Source line currently executing.
    fn line(&self) -> u32;

    /// Offset of the instruction currently executing.
    fn instr_offset(&self) -> u32;

    /// Handle over the calling activation, `None` at the outermost call.
    fn caller(&self) -> Option<Self>;

    /// Number of caller links between the outermost activation and this one.
    ///
    /// O(depth); callers that examine depth per event should go through the
    /// cache kept by the stepping controller instead of re-walking the
    /// chain.
    fn call_depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.caller();

        while let Some(activation) = current {
            depth += 1;
            current = activation.caller();
        }

        depth
    }
}
