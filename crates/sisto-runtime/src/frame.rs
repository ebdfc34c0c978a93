use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sisto_engine::activation::{Activation, FrameId};

use crate::program::CodeId;
use crate::value::Value;

/// Shared handle over one live activation record.
///
/// Cloning is cheap; the interpreter and every debugger component observe
/// the same frame state. Position updates are atomic so a handle kept by
/// the engine across an event stays readable from other threads.
#[derive(Clone)]
pub struct FrameHandle(Arc<FrameData>);

struct FrameData {
    id: FrameId,
    code: CodeId,
    file: Arc<str>,
    line: AtomicU32,
    offset: AtomicU32,
    locals: Mutex<HashMap<String, Value>>,
    globals: Arc<Mutex<HashMap<String, Value>>>,
    caller: Option<FrameHandle>,
}

impl FrameHandle {
    pub(crate) fn new(
        id: FrameId,
        code: CodeId,
        file: Arc<str>,
        locals: HashMap<String, Value>,
        globals: Arc<Mutex<HashMap<String, Value>>>,
        caller: Option<FrameHandle>,
    ) -> Self {
        Self(Arc::new(FrameData {
            id,
            code,
            file,
            line: AtomicU32::new(0),
            offset: AtomicU32::new(0),
            locals: Mutex::new(locals),
            globals,
            caller,
        }))
    }

    pub(crate) fn set_position(&self, line: u32, offset: u32) {
        self.0.line.store(line, Ordering::Release);
        self.0.offset.store(offset, Ordering::Release);
    }

    fn locals(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.0.locals.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn globals(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.0
            .globals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Looks a name up in the local bindings, then the global ones.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.locals().get(name) {
            return Some(value.clone());
        }

        self.globals().get(name).cloned()
    }

    /// Names bound locally, sorted.
    #[must_use]
    pub fn local_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.locals().keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn set_local(&self, name: &str, value: Value) {
        self.locals().insert(name.to_owned(), value);
    }

    pub(crate) fn set_global(&self, name: &str, value: Value) {
        self.globals().insert(name.to_owned(), value);
    }

    /// Name of the function this activation executes.
    #[must_use]
    pub fn function_name(&self) -> &str {
        self.0.code.name()
    }
}

impl fmt::Debug for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}:{}:{})",
            self.0.id,
            self.0.code,
            self.file(),
            self.line()
        )
    }
}

impl Activation for FrameHandle {
    type Code = CodeId;
    type Value = Value;

    fn frame_id(&self) -> FrameId {
        self.0.id
    }

    fn code(&self) -> CodeId {
        self.0.code.clone()
    }

    fn file(&self) -> &str {
        &self.0.file
    }

    fn line(&self) -> u32 {
        self.0.line.load(Ordering::Acquire)
    }

    fn instr_offset(&self) -> u32 {
        self.0.offset.load(Ordering::Acquire)
    }

    fn caller(&self) -> Option<Self> {
        self.0.caller.clone()
    }
}
