/// Error type of this crate.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// A call named a function the program does not define.
    #[error("unknown function {0}")]
    UnknownFunction(String),

    /// A load named a variable with no local or global binding.
    #[error("name '{0}' is not defined")]
    UndefinedVariable(String),

    /// An instruction needed more operands than the stack holds.
    #[error("operand stack underflow in {0}")]
    StackUnderflow(String),

    /// An operation was applied to values it does not support.
    #[error("unsupported operand types: {0}")]
    Type(String),

    /// An exception unwound past the outermost activation.
    #[error("uncaught exception: {0}")]
    Uncaught(String),

    /// The debugger tore the program down.
    #[error("terminated by debugger")]
    Terminated,
}

/// Result type of this crate.
pub type Result<T> = core::result::Result<T, Error>;
