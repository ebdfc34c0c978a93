//! This crate provides a default host runtime for the Sisto debugger: a
//! small bytecode interpreter whose execution is fully instrumented.
//!
//! <div class="warning">
//!
//! *This crate is not meant to be a general-purpose language! It implements
//! the interface (traits) provided by `sisto-engine`, so the engine has a
//! complete runtime to drive in tests, demos and the CLI.*
//!
//! </div>
//!
//! The interpreter reports every line, call, return, exception and
//! instruction through an [`EventHookAdapter`](sisto_engine::hook::EventHookAdapter),
//! exposes its activation records as cheap shared handles, and ships a
//! comparison-expression evaluator for breakpoint guard conditions.

mod error;

/// Module implementing the guard-condition evaluator.
pub mod eval;

mod frame;
mod interp;

/// Module containing the bytecode program model and its builder.
pub mod program;

/// Module containing the runtime value type.
pub mod value;

pub use self::error::{Error, Result};
pub use self::eval::{EvalError, ExprEvaluator};
pub use self::frame::FrameHandle;
pub use self::interp::Vm;
pub use self::program::{CodeId, Function, Instr, Program, ProgramBuilder};
pub use self::value::Value;
