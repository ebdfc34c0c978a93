/// Error type of this crate.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// A breakpoint was requested with neither a file/line target nor a
    /// code-identity target.
    #[error("Breakpoint target is neither a file/line nor a code identity")]
    InvalidLocation,

    /// No breakpoint was ever registered under this number.
    #[error("Breakpoint {0} does not exist")]
    NotFound(u32),

    /// The breakpoint existed but was deleted; its number is never reused.
    #[error("Breakpoint {0} already deleted")]
    AlreadyDeleted(u32),
}

/// Result type of this crate.
pub type Result<T> = core::result::Result<T, Error>;
