use bitflags::bitflags;

use crate::activation::Activation;

/// Kind of execution event reported by the instrumented runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Execution reached a new source line.
    Line,

    /// A new activation was entered.
    Call,

    /// An activation is finishing (normally or by unwinding).
    Return,

    /// An exception was raised in, or is propagating through, an activation.
    Exception,

    /// A single bytecode instruction is about to execute.
    Instruction,
}

bitflags! {
    /// Set of event kinds a hook or the engine is interested in.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct EventMask: u8 {
        /// Line events.
        const LINE = 1 << 0;
        /// Call events.
        const CALL = 1 << 1;
        /// Return events.
        const RETURN = 1 << 2;
        /// Exception events.
        const EXCEPTION = 1 << 3;
        /// Per-instruction events.
        const INSTRUCTION = 1 << 4;
    }
}

impl EventMask {
    /// Events relevant while a stepping command is armed.
    pub const STEPPING: Self = Self::LINE
        .union(Self::CALL)
        .union(Self::RETURN)
        .union(Self::EXCEPTION);

    /// Returns whether the mask selects the given event kind.
    #[must_use]
    pub fn selects(self, kind: EventKind) -> bool {
        self.contains(kind.into())
    }
}

impl From<EventKind> for EventMask {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Line => Self::LINE,
            EventKind::Call => Self::CALL,
            EventKind::Return => Self::RETURN,
            EventKind::Exception => Self::EXCEPTION,
            EventKind::Instruction => Self::INSTRUCTION,
        }
    }
}

/// Exception raised within the debuggee.
///
/// The identity is assigned by the runtime when the exception is created and
/// stays stable while it propagates, so that adapters can tell a new
/// exception apart from another hop of the same unwind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExceptionInfo {
    /// Runtime-assigned identity of this exception.
    pub id: u64,

    /// Human-readable description.
    pub message: String,
}

/// Payload attached to return and exception events.
#[derive(Clone, Debug)]
pub enum EventPayload<V> {
    /// Value returned by the finishing activation.
    ///
    /// `None` when the activation is exited by an unwinding exception.
    Return(Option<V>),

    /// Exception being raised or propagated.
    Exception(ExceptionInfo),
}

/// One execution event, as fed to the stop-decision engine.
///
/// Return events are reported *before* the activation is popped: the
/// attached activation is the one finishing, and its payload carries the
/// value it returns.
#[derive(Clone, Debug)]
pub struct Event<A: Activation> {
    /// Kind of the event.
    pub kind: EventKind,

    /// Activation the event occurred in.
    pub activation: A,

    /// Optional payload (return value or exception info).
    pub payload: Option<EventPayload<A::Value>>,
}

impl<A: Activation> Event<A> {
    /// Creates a payload-less event.
    pub fn new(kind: EventKind, activation: A) -> Self {
        Self {
            kind,
            activation,
            payload: None,
        }
    }

    /// Creates a return event carrying the returned value.
    pub fn returning(activation: A, value: Option<A::Value>) -> Self {
        Self {
            kind: EventKind::Return,
            activation,
            payload: Some(EventPayload::Return(value)),
        }
    }

    /// Creates an exception event.
    pub fn exception(activation: A, info: ExceptionInfo) -> Self {
        Self {
            kind: EventKind::Exception,
            activation,
            payload: Some(EventPayload::Exception(info)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EventKind, EventMask};

    #[test]
    fn mask_selects_its_kinds() {
        let mask = EventMask::LINE | EventMask::RETURN;

        assert!(mask.selects(EventKind::Line));
        assert!(mask.selects(EventKind::Return));
        assert!(!mask.selects(EventKind::Call));
        assert!(!mask.selects(EventKind::Instruction));
    }

    #[test]
    fn stepping_mask_excludes_instructions() {
        assert!(EventMask::STEPPING.selects(EventKind::Line));
        assert!(EventMask::STEPPING.selects(EventKind::Exception));
        assert!(!EventMask::STEPPING.selects(EventKind::Instruction));
    }
}
