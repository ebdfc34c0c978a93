use sisto_engine::breakpoint::BreakpointSpec;
use sisto_runtime::{CodeId, Program};

/// Error turning user text into a resolved breakpoint target.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ResolveError {
    /// The text matched no supported location form.
    #[error("cannot resolve location {0:?}")]
    Unresolvable(String),

    /// A `name()` location named an unknown function.
    #[error("unknown function {0}")]
    UnknownFunction(String),

    /// The line part did not parse as a line number.
    #[error("invalid line number {0:?}")]
    InvalidLine(String),
}

/// Resolves user location text against a program.
///
/// Supported forms: `file:line`, a bare `line` (within the program's own
/// source file) and `name()` for a function-entry breakpoint. The engine
/// only ever sees the resolved output, never the raw text.
pub fn resolve_location(
    program: &Program,
    text: &str,
) -> Result<BreakpointSpec<CodeId>, ResolveError> {
    let text = text.trim();

    if let Some(name) = text.strip_suffix("()") {
        let function = program
            .function(name)
            .ok_or_else(|| ResolveError::UnknownFunction(name.to_owned()))?;

        return Ok(BreakpointSpec::at_code(function.code_id().clone()));
    }

    if let Some((file, line)) = text.rsplit_once(':') {
        let line = line
            .parse::<u32>()
            .map_err(|_| ResolveError::InvalidLine(line.to_owned()))?;

        return Ok(BreakpointSpec::at_line(file, line));
    }

    if text.chars().all(|c| c.is_ascii_digit()) && !text.is_empty() {
        let line = text
            .parse::<u32>()
            .map_err(|_| ResolveError::InvalidLine(text.to_owned()))?;

        let file = program
            .function_names()
            .next()
            .and_then(|name| program.function(name))
            .map(|function| function.file().to_string())
            .ok_or_else(|| ResolveError::Unresolvable(text.to_owned()))?;

        return Ok(BreakpointSpec::at_line(file, line));
    }

    Err(ResolveError::Unresolvable(text.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demos::demo_program;

    #[test]
    fn resolves_the_supported_forms() {
        let Some(program) = demo_program("sum") else {
            unreachable!()
        };

        let spec = resolve_location(&program, "sum.si:12").expect("file:line");
        assert_eq!(spec.file.as_deref(), Some("sum.si"));
        assert_eq!(spec.line, Some(12));

        let spec = resolve_location(&program, "12").expect("bare line");
        assert_eq!(spec.file.as_deref(), Some("sum.si"));

        let spec = resolve_location(&program, "sum()").expect("function");
        assert!(spec.code.is_some());
    }

    #[test]
    fn rejects_what_it_cannot_resolve() {
        let Some(program) = demo_program("sum") else {
            unreachable!()
        };

        assert_eq!(
            resolve_location(&program, "missing()"),
            Err(ResolveError::UnknownFunction("missing".to_owned()))
        );
        assert_eq!(
            resolve_location(&program, "sum.si:axe"),
            Err(ResolveError::InvalidLine("axe".to_owned()))
        );
        assert_eq!(
            resolve_location(&program, "???"),
            Err(ResolveError::Unresolvable("???".to_owned()))
        );
    }
}
