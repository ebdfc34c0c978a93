use crate::activation::Activation;

/// Trait for evaluating a breakpoint's guard expression against an
/// activation's variable bindings.
///
/// The expression language is whatever the host runtime embeds; no purity is
/// assumed or enforced, so a condition may be an arbitrary host expression
/// including a side-effecting one. Implementations must catch every failure
/// and report it through their error type: an evaluation failure is treated
/// by the caller as "stop anyway" and must never crash the engine or the
/// debuggee.
pub trait ConditionEvaluator<A: Activation> {
    /// Error reported when evaluation fails.
    type Error: std::error::Error;

    /// Evaluates `expr` against the local and global bindings of
    /// `activation`, reducing the result to a boolean by the host's
    /// truthiness rules.
    fn evaluate(&mut self, expr: &str, activation: &A) -> Result<bool, Self::Error>;
}
