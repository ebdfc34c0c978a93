use sisto_engine::condition::ConditionEvaluator;

use crate::frame::FrameHandle;
use crate::value::Value;

/// Error reported when a guard condition fails to evaluate.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum EvalError {
    /// The condition referenced a name with no binding in scope.
    #[error("name '{0}' is not defined")]
    Undefined(String),

    /// The condition text did not parse.
    #[error("malformed condition: {0}")]
    Malformed(String),

    /// The two operands cannot be compared.
    #[error("cannot compare {0} and {1}")]
    Incomparable(&'static str, &'static str),
}

/// Guard-condition evaluator over the runtime's expression subset.
///
/// Supports a literal or variable, optionally compared to another with
/// `==`, `!=`, `<`, `<=`, `>` or `>=`. A bare term is reduced to its
/// truthiness. Variables resolve against the activation's locals first,
/// then its globals.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExprEvaluator;

impl ExprEvaluator {
    fn term(&self, text: &str, activation: &FrameHandle) -> Result<Value, EvalError> {
        let text = text.trim();

        if text.is_empty() {
            return Err(EvalError::Malformed("empty operand".to_owned()));
        }

        if let Ok(value) = text.parse::<i64>() {
            return Ok(Value::Int(value));
        }

        match text {
            "true" => return Ok(Value::Bool(true)),
            "false" => return Ok(Value::Bool(false)),
            _ => {}
        }

        if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
            return Ok(Value::Str(text[1..text.len() - 1].to_owned()));
        }

        if !text.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(EvalError::Malformed(text.to_owned()));
        }

        activation
            .get(text)
            .ok_or_else(|| EvalError::Undefined(text.to_owned()))
    }

    fn compare(&self, op: &str, lhs: &Value, rhs: &Value) -> Result<bool, EvalError> {
        let ordering = match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) if matches!(op, "==" | "!=") => {
                return Ok((a == b) == (op == "=="));
            }
            _ => return Err(EvalError::Incomparable(lhs.type_name(), rhs.type_name())),
        };

        Ok(match op {
            "==" => ordering.is_eq(),
            "!=" => ordering.is_ne(),
            "<" => ordering.is_lt(),
            "<=" => ordering.is_le(),
            ">" => ordering.is_gt(),
            ">=" => ordering.is_ge(),
            _ => return Err(EvalError::Malformed(op.to_owned())),
        })
    }
}

impl ConditionEvaluator<FrameHandle> for ExprEvaluator {
    type Error = EvalError;

    fn evaluate(&mut self, expr: &str, activation: &FrameHandle) -> Result<bool, Self::Error> {
        // longest operators first, so `<=` is not split as `<`
        for op in ["==", "!=", "<=", ">=", "<", ">"] {
            if let Some((lhs, rhs)) = expr.split_once(op) {
                let lhs = self.term(lhs, activation)?;
                let rhs = self.term(rhs, activation)?;

                return self.compare(op, &lhs, &rhs);
            }
        }

        self.term(expr, activation).map(|value| value.is_truthy())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use sisto_engine::activation::FrameId;

    use super::*;
    use crate::program::Program;
    use crate::value::Value;

    fn frame_with(locals: &[(&str, Value)], globals: &[(&str, Value)]) -> FrameHandle {
        let program = Program::builder("t.si").function("f", &[], |_| {}).build();
        let Some(function) = program.function("f") else {
            unreachable!()
        };
        let code = function.code_id().clone();

        FrameHandle::new(
            FrameId(1),
            code,
            Arc::from("t.si"),
            locals
                .iter()
                .map(|(name, value)| ((*name).to_owned(), value.clone()))
                .collect(),
            Arc::new(Mutex::new(
                globals
                    .iter()
                    .map(|(name, value)| ((*name).to_owned(), value.clone()))
                    .collect(),
            )),
            None,
        )
    }

    #[test]
    fn comparisons_and_truthiness() {
        let mut evaluator = ExprEvaluator;
        let frame = frame_with(
            &[("x", Value::Int(3)), ("name", Value::Str("ada".into()))],
            &[("limit", Value::Int(10))],
        );

        assert_eq!(evaluator.evaluate("x == 3", &frame), Ok(true));
        assert_eq!(evaluator.evaluate("x != 3", &frame), Ok(false));
        assert_eq!(evaluator.evaluate("x < limit", &frame), Ok(true));
        assert_eq!(evaluator.evaluate("x >= 4", &frame), Ok(false));
        assert_eq!(evaluator.evaluate("name == 'ada'", &frame), Ok(true));
        assert_eq!(evaluator.evaluate("x", &frame), Ok(true));
        assert_eq!(evaluator.evaluate("0", &frame), Ok(false));
    }

    #[test]
    fn locals_shadow_globals() {
        let mut evaluator = ExprEvaluator;
        let frame = frame_with(&[("x", Value::Int(1))], &[("x", Value::Int(0))]);

        assert_eq!(evaluator.evaluate("x", &frame), Ok(true));
    }

    #[test]
    fn undefined_names_are_reported() {
        let mut evaluator = ExprEvaluator;
        let frame = frame_with(&[], &[]);

        assert_eq!(
            evaluator.evaluate("missing == 1", &frame),
            Err(EvalError::Undefined("missing".to_owned()))
        );
        assert_eq!(
            evaluator.evaluate("x ==", &frame),
            Err(EvalError::Malformed("empty operand".to_owned()))
        );
    }

    #[test]
    fn mixed_types_do_not_compare() {
        let mut evaluator = ExprEvaluator;
        let frame = frame_with(&[("x", Value::Int(3))], &[]);

        assert_eq!(
            evaluator.evaluate("x == 'three'", &frame),
            Err(EvalError::Incomparable("int", "str"))
        );
    }
}
