use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use sisto_engine::activation::FrameId;
use sisto_engine::event::ExceptionInfo;
use sisto_engine::hook::EventHookAdapter;
use sisto_engine::session::HookFlow;
use sisto_engine::EventKind;

use crate::error::{Error, Result};
use crate::frame::FrameHandle;
use crate::program::{Function, Instr, Program};
use crate::value::Value;

/// How one activation finished.
enum Flow {
    /// Normal return.
    Value(Value),

    /// An exception is unwinding through the caller.
    Raised(ExceptionInfo),
}

/// The bytecode interpreter.
///
/// One instance may execute entry points from several native threads at
/// once; instrumentation hooks fire on whichever thread executes the code.
/// Frame identities and exception identities are drawn from shared
/// counters, so handles stay unambiguous across threads.
pub struct Vm {
    program: Arc<Program>,
    globals: Arc<Mutex<HashMap<String, Value>>>,
    next_frame: AtomicU64,
    next_exception: AtomicU64,

    /// Force-terminate flag; checked by every executing thread, set without
    /// going through the decision engine.
    killed: AtomicBool,
}

impl Vm {
    /// Creates an interpreter over the given program.
    #[must_use]
    pub fn new(program: Program) -> Self {
        Self {
            program: Arc::new(program),
            globals: Arc::new(Mutex::new(HashMap::new())),
            next_frame: AtomicU64::new(1),
            next_exception: AtomicU64::new(1),
            killed: AtomicBool::new(false),
        }
    }

    /// The executed program.
    #[must_use]
    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    /// Reads a global binding.
    #[must_use]
    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Writes a global binding.
    pub fn set_global(&self, name: &str, value: impl Into<Value>) {
        self.globals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_owned(), value.into());
    }

    /// Tears every executing thread down at its next instruction, without
    /// consulting the debugger.
    pub fn kill(&self) {
        self.killed.store(true, Ordering::Release);
    }

    /// Runs an entry function to completion under the given hook adapter.
    #[tracing::instrument(name = "Run", skip(self, args, hook))]
    pub fn run<H>(&self, entry: &str, args: Vec<Value>, hook: &H) -> Result<Value>
    where
        H: EventHookAdapter<FrameHandle>,
    {
        let function = self
            .program
            .function(entry)
            .ok_or_else(|| Error::UnknownFunction(entry.to_owned()))?;

        let frame = self.enter(function, args, None, hook)?;

        match self.exec(function, frame, hook)? {
            Flow::Value(value) => Ok(value),
            Flow::Raised(info) => Err(Error::Uncaught(info.message)),
        }
    }

    /// Builds the callee frame and reports the call event.
    fn enter<H>(
        &self,
        function: &Function,
        args: Vec<Value>,
        caller: Option<&FrameHandle>,
        hook: &H,
    ) -> Result<FrameHandle>
    where
        H: EventHookAdapter<FrameHandle>,
    {
        let mut locals = HashMap::new();

        for (param, value) in function.params().iter().zip(args) {
            locals.insert(param.clone(), value);
        }

        let frame = FrameHandle::new(
            FrameId(self.next_frame.fetch_add(1, Ordering::AcqRel)),
            function.code_id().clone(),
            function.file().clone(),
            locals,
            self.globals.clone(),
            caller.cloned(),
        );

        frame.set_position(function.first_line(), 0);

        if let HookFlow::Terminate = hook.call(&frame) {
            self.kill();
            return Err(Error::Terminated);
        }

        Ok(frame)
    }

    #[allow(clippy::too_many_lines)]
    fn exec<H>(&self, function: &Function, frame: FrameHandle, hook: &H) -> Result<Flow>
    where
        H: EventHookAdapter<FrameHandle>,
    {
        let code = function.code();
        let mut stack: Vec<Value> = Vec::new();
        let mut pc = 0usize;
        let mut last_line = None;

        // refreshed after every reported event: a stop may have re-armed
        // the engine and with it the interesting event kinds
        let mut mask = hook.mask(&frame);

        while let Some((line, instr)) = code.get(pc) {
            if self.killed.load(Ordering::Acquire) {
                return Err(Error::Terminated);
            }

            frame.set_position(*line, pc as u32);

            if last_line != Some(*line) {
                last_line = Some(*line);

                if mask.selects(EventKind::Line) {
                    if let HookFlow::Terminate = hook.line(&frame) {
                        self.kill();
                        return Err(Error::Terminated);
                    }

                    mask = hook.mask(&frame);
                }
            }

            if mask.selects(EventKind::Instruction) {
                if let HookFlow::Terminate = hook.instruction(&frame) {
                    self.kill();
                    return Err(Error::Terminated);
                }

                mask = hook.mask(&frame);
            }

            pc += 1;

            match instr {
                Instr::Const(value) => stack.push(value.clone()),

                Instr::Load(name) => {
                    let value = frame
                        .get(name)
                        .ok_or_else(|| Error::UndefinedVariable(name.clone()))?;
                    stack.push(value);
                }

                Instr::Store(name) => {
                    let value = self.pop(function, &mut stack)?;
                    frame.set_local(name, value);
                }

                Instr::StoreGlobal(name) => {
                    let value = self.pop(function, &mut stack)?;
                    frame.set_global(name, value);
                }

                Instr::Add => {
                    let rhs = self.pop(function, &mut stack)?;
                    let lhs = self.pop(function, &mut stack)?;

                    let value = match (lhs, rhs) {
                        (Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_add(b)),
                        (Value::Str(a), Value::Str(b)) => Value::Str(a + &b),
                        (lhs, rhs) => {
                            return Err(Error::Type(format!(
                                "{} + {}",
                                lhs.type_name(),
                                rhs.type_name()
                            )));
                        }
                    };

                    stack.push(value);
                }

                Instr::Sub => {
                    let rhs = self.pop(function, &mut stack)?;
                    let lhs = self.pop(function, &mut stack)?;

                    match (lhs, rhs) {
                        (Value::Int(a), Value::Int(b)) => stack.push(Value::Int(a.wrapping_sub(b))),
                        (lhs, rhs) => {
                            return Err(Error::Type(format!(
                                "{} - {}",
                                lhs.type_name(),
                                rhs.type_name()
                            )));
                        }
                    }
                }

                Instr::Lt => {
                    let rhs = self.pop(function, &mut stack)?;
                    let lhs = self.pop(function, &mut stack)?;

                    match (lhs, rhs) {
                        (Value::Int(a), Value::Int(b)) => stack.push(Value::Bool(a < b)),
                        (Value::Str(a), Value::Str(b)) => stack.push(Value::Bool(a < b)),
                        (lhs, rhs) => {
                            return Err(Error::Type(format!(
                                "{} < {}",
                                lhs.type_name(),
                                rhs.type_name()
                            )));
                        }
                    }
                }

                Instr::Eq => {
                    let rhs = self.pop(function, &mut stack)?;
                    let lhs = self.pop(function, &mut stack)?;
                    stack.push(Value::Bool(lhs == rhs));
                }

                Instr::Jump(target) => pc = *target,

                Instr::JumpIfFalse(target) => {
                    let value = self.pop(function, &mut stack)?;

                    if !value.is_truthy() {
                        pc = *target;
                    }
                }

                Instr::Call { function: callee, argc } => {
                    let callee_fn = self
                        .program
                        .function(callee)
                        .ok_or_else(|| Error::UnknownFunction(callee.clone()))?;

                    if stack.len() < *argc {
                        return Err(Error::StackUnderflow(function.code_id().to_string()));
                    }

                    let args = stack.split_off(stack.len() - argc);
                    let callee_frame = self.enter(callee_fn, args, Some(&frame), hook)?;

                    match self.exec(callee_fn, callee_frame, hook)? {
                        Flow::Value(value) => {
                            stack.push(value);

                            // the callee may have left a stop behind that
                            // re-armed the engine
                            mask = hook.mask(&frame);
                        }
                        Flow::Raised(info) => {
                            return self.unwind(&frame, info, hook);
                        }
                    }
                }

                Instr::Ret => {
                    let value = self.pop(function, &mut stack)?;

                    if let HookFlow::Terminate = hook.returned(&frame, Some(value.clone())) {
                        self.kill();
                        return Err(Error::Terminated);
                    }

                    return Ok(Flow::Value(value));
                }

                Instr::Raise(message) => {
                    let info = ExceptionInfo {
                        id: self.next_exception.fetch_add(1, Ordering::AcqRel),
                        message: message.clone(),
                    };

                    return self.unwind(&frame, info, hook);
                }
            }
        }

        // fell off the end of the function
        if let HookFlow::Terminate = hook.returned(&frame, Some(Value::Unit)) {
            self.kill();
            return Err(Error::Terminated);
        }

        Ok(Flow::Value(Value::Unit))
    }

    /// Reports the exception in this activation and exits it.
    ///
    /// Each unwound activation sees exactly one exception event followed by
    /// one (value-less) return event.
    fn unwind<H>(&self, frame: &FrameHandle, info: ExceptionInfo, hook: &H) -> Result<Flow>
    where
        H: EventHookAdapter<FrameHandle>,
    {
        if let HookFlow::Terminate = hook.exception(frame, &info) {
            self.kill();
            return Err(Error::Terminated);
        }

        if let HookFlow::Terminate = hook.returned(frame, None) {
            self.kill();
            return Err(Error::Terminated);
        }

        Ok(Flow::Raised(info))
    }

    fn pop(&self, function: &Function, stack: &mut Vec<Value>) -> Result<Value> {
        stack
            .pop()
            .ok_or_else(|| Error::StackUnderflow(function.code_id().to_string()))
    }
}
