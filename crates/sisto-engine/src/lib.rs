//! This crate implements the execution instrumentation and stop-decision
//! engine of the Sisto debugger.
//!
//! The engine receives every low-level execution event of an instrumented
//! program (line reached, activation entered or left, exception raised,
//! instruction executed) and decides, once per event, whether execution
//! should be suspended and control handed to an interactive command
//! processor.
//!
//! Three main components are provided:
//! - A set of traits describing the host runtime being debugged
//!   ([`Activation`](activation::Activation),
//!   [`ConditionEvaluator`](condition::ConditionEvaluator)), so the engine
//!   can drive any runtime able to expose its activation records.
//! - The decision core itself: [`BreakpointRegistry`](breakpoint::BreakpointRegistry),
//!   [`SteppingController`](stepping::SteppingController) and the
//!   [`StopDecisionEngine`](engine::StopDecisionEngine) composing them.
//! - Hook adapters ([`GlobalHook`](hook::GlobalHook),
//!   [`MaskedHook`](hook::MaskedHook)) bridging raw instrumentation
//!   callbacks into uniform [`Event`](event::Event)s.
//!
//! # Driving the engine
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use sisto_engine::breakpoint::BreakpointSpec;
//! use sisto_engine::engine::StopDecisionEngine;
//! use sisto_engine::session::{CommandProcessor, DebugSession};
//! use sisto_engine::Activation;
//! # use sisto_engine::condition::ConditionEvaluator;
//! # fn wire<A, E, P>(evaluator: E, processor: P)
//! # where
//! #     A: Activation,
//! #     E: ConditionEvaluator<A> + Send,
//! #     P: CommandProcessor<A, E> + Send,
//! # {
//!
//! let engine = Arc::new(StopDecisionEngine::new(evaluator));
//!
//! engine
//!     .add_breakpoint(BreakpointSpec::at_line("demo.si", 5))
//!     .ok();
//!
//! let session = DebugSession::new(engine, processor);
//! // hand `session` to a hook adapter, then run the instrumented program
//! # }
//! ```
//!
//! The engine never blocks: when it returns a
//! [`Stop`](engine::Verdict::Stop) verdict, the owning
//! [`DebugSession`](session::DebugSession) runs the command processor and
//! re-arms the stepping state before the debuggee resumes.

/// Module describing activation records exposed by the host runtime.
pub mod activation;

/// Module implementing breakpoint storage, indexing and matching.
pub mod breakpoint;

/// Module containing the guard-condition evaluation contract.
pub mod condition;

/// Module implementing the per-event stop decision.
pub mod engine;

mod error;

/// Module defining the uniform execution event model.
pub mod event;

/// Module bridging host-runtime instrumentation callbacks to the engine.
pub mod hook;

/// Module wiring the engine to an interactive command processor.
pub mod session;

/// Module implementing relative stepping (step/next/finish).
pub mod stepping;

pub use self::activation::{Activation, FrameId};
pub use self::engine::{StopReason, Verdict};
pub use self::error::{Error, Result};
pub use self::event::{Event, EventKind, EventMask};
