/// Debug script presetting breakpoints before the debuggee starts.
#[derive(Debug, PartialEq, knus::Decode)]
pub struct DebugScript {
    /// Breakpoints to register at startup.
    #[knus(children(name = "break"))]
    pub breakpoints: Vec<BreakDirective>,
}

/// One preset breakpoint.
#[derive(Debug, PartialEq, knus::Decode)]
pub struct BreakDirective {
    /// Location text (`file:line`, `line` or `name()`).
    #[knus(argument)]
    pub location: String,

    /// Guard condition.
    #[knus(property)]
    pub condition: Option<String>,

    /// Whether the breakpoint deletes itself after its first effective hit.
    #[knus(property, default)]
    pub temporary: bool,

    /// Effective hits to pass silently before stopping.
    #[knus(property, default)]
    pub ignore: u64,
}

#[cfg(test)]
mod tests {
    use super::{BreakDirective, DebugScript};

    #[test]
    fn parse_from_kdl_empty() {
        let script = knus::parse::<DebugScript>("<content>", "")
            .map_err(miette::Report::new)
            .expect("parse kdl");

        assert_eq!(script, DebugScript { breakpoints: vec![] });
    }

    #[test]
    fn parse_from_kdl_with_breaks() {
        let script = knus::parse::<DebugScript>(
            "<content>",
            indoc::indoc! {r#"
                break "countdown.si:3" condition="i == 2"
                break "sum()" temporary=#true ignore=1
            "#},
        )
        .map_err(miette::Report::new)
        .expect("parse kdl");

        assert_eq!(
            script,
            DebugScript {
                breakpoints: vec![
                    BreakDirective {
                        location: "countdown.si:3".to_owned(),
                        condition: Some("i == 2".to_owned()),
                        temporary: false,
                        ignore: 0,
                    },
                    BreakDirective {
                        location: "sum()".to_owned(),
                        condition: None,
                        temporary: true,
                        ignore: 1,
                    },
                ]
            }
        );
    }
}
