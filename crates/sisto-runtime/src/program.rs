use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::value::Value;

/// Identity of a code unit (one function), stable for the lifetime of the
/// program.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CodeId(Arc<str>);

impl CodeId {
    /// Function name this identity stands for.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One bytecode instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum Instr {
    /// Push a constant.
    Const(Value),

    /// Push the value bound to a name (locals first, then globals).
    Load(String),

    /// Pop into a local binding.
    Store(String),

    /// Pop into a global binding.
    StoreGlobal(String),

    /// Pop two operands, push their sum (ints) or concatenation (strs).
    Add,

    /// Pop two operands, push their difference.
    Sub,

    /// Pop two operands, push whether the first is less than the second.
    Lt,

    /// Pop two operands, push their equality.
    Eq,

    /// Jump to an instruction index.
    Jump(usize),

    /// Pop a value; jump to an instruction index when it is falsy.
    JumpIfFalse(usize),

    /// Call a function with `argc` stacked arguments.
    Call {
        /// Name of the callee.
        function: String,
        /// Number of arguments popped from the stack.
        argc: usize,
    },

    /// Return the top of stack to the caller.
    Ret,

    /// Raise an exception with the given message; it unwinds every
    /// activation (the language has no handlers).
    Raise(String),
}

/// One compiled function.
#[derive(Clone, Debug)]
pub struct Function {
    code_id: CodeId,
    file: Arc<str>,
    params: Vec<String>,
    code: Vec<(u32, Instr)>,
}

impl Function {
    /// Identity of this function.
    #[must_use]
    pub fn code_id(&self) -> &CodeId {
        &self.code_id
    }

    /// Source file the function was defined in.
    #[must_use]
    pub fn file(&self) -> &Arc<str> {
        &self.file
    }

    /// Parameter names, in binding order.
    #[must_use]
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Instructions with their source lines.
    #[must_use]
    pub fn code(&self) -> &[(u32, Instr)] {
        &self.code
    }

    /// Source line of the first instruction.
    #[must_use]
    pub fn first_line(&self) -> u32 {
        self.code.first().map_or(0, |(line, _)| *line)
    }
}

/// A compiled program: an ordered set of functions sharing one source file.
#[derive(Clone, Debug, Default)]
pub struct Program {
    functions: IndexMap<String, Function>,
}

impl Program {
    /// Starts building a program whose functions live in `file`.
    #[must_use]
    pub fn builder(file: impl Into<String>) -> ProgramBuilder {
        ProgramBuilder {
            file: Arc::from(file.into()),
            functions: IndexMap::new(),
        }
    }

    /// Looks a function up by name.
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    /// Function names in definition order.
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

/// Builder for [`Program`].
pub struct ProgramBuilder {
    file: Arc<str>,
    functions: IndexMap<String, Function>,
}

impl ProgramBuilder {
    /// Defines a function; its body is emitted through the closure.
    #[must_use]
    pub fn function(
        mut self,
        name: &str,
        params: &[&str],
        body: impl FnOnce(&mut FunctionBuilder),
    ) -> Self {
        let mut builder = FunctionBuilder {
            line: 0,
            code: Vec::new(),
        };

        body(&mut builder);

        self.functions.insert(
            name.to_owned(),
            Function {
                code_id: CodeId(Arc::from(name)),
                file: self.file.clone(),
                params: params.iter().map(|p| (*p).to_owned()).collect(),
                code: builder.code,
            },
        );

        self
    }

    /// Finishes the program.
    #[must_use]
    pub fn build(self) -> Program {
        Program {
            functions: self.functions,
        }
    }
}

/// Emits the body of one function.
pub struct FunctionBuilder {
    line: u32,
    code: Vec<(u32, Instr)>,
}

impl FunctionBuilder {
    /// Sets the source line the following instructions belong to.
    pub fn at(&mut self, line: u32) -> &mut Self {
        self.line = line;
        self
    }

    /// Emits one instruction on the current line.
    pub fn op(&mut self, instr: Instr) -> &mut Self {
        self.code.push((self.line, instr));
        self
    }

    /// Index the next emitted instruction will have; useful as a jump
    /// target when emitting loops.
    #[must_use]
    pub fn here(&self) -> usize {
        self.code.len()
    }

    /// Emits a constant push.
    pub fn constant(&mut self, value: impl Into<Value>) -> &mut Self {
        self.op(Instr::Const(value.into()))
    }

    /// Emits a load of a name.
    pub fn load(&mut self, name: &str) -> &mut Self {
        self.op(Instr::Load(name.to_owned()))
    }

    /// Emits a store into a local binding.
    pub fn store(&mut self, name: &str) -> &mut Self {
        self.op(Instr::Store(name.to_owned()))
    }

    /// Emits a store into a global binding.
    pub fn store_global(&mut self, name: &str) -> &mut Self {
        self.op(Instr::StoreGlobal(name.to_owned()))
    }

    /// Emits a call.
    pub fn call(&mut self, function: &str, argc: usize) -> &mut Self {
        self.op(Instr::Call {
            function: function.to_owned(),
            argc,
        })
    }

    /// Emits a return of the top of stack.
    pub fn ret(&mut self) -> &mut Self {
        self.op(Instr::Ret)
    }

    /// Emits a raise.
    pub fn raise(&mut self, message: &str) -> &mut Self {
        self.op(Instr::Raise(message.to_owned()))
    }

    /// Points the jump emitted at instruction index `at` to `target`.
    ///
    /// Forward jumps are emitted with a placeholder target and resolved
    /// once the landing index is known.
    pub fn resolve_jump(&mut self, at: usize, target: usize) -> &mut Self {
        if let Some((_, Instr::Jump(t) | Instr::JumpIfFalse(t))) = self.code.get_mut(at) {
            *t = target;
        }

        self
    }
}
