use sisto_runtime::{Instr, Program};

/// Names of the built-in demo programs.
#[must_use]
pub fn demo_names() -> &'static [&'static str] {
    &["countdown", "sum", "greet", "crash"]
}

/// Builds a demo program by name.
#[must_use]
pub fn demo_program(name: &str) -> Option<Program> {
    match name {
        "countdown" => Some(countdown()),
        "sum" => Some(sum()),
        "greet" => Some(greet()),
        "crash" => Some(crash()),
        _ => None,
    }
}

/// Counts `i` down from 5, accumulating into the global `total`.
fn countdown() -> Program {
    Program::builder("countdown.si")
        .function("main", &[], |f| {
            f.at(1).constant(5).store("i");
            f.at(2).constant(0).store_global("total");

            let top = f.here();
            f.at(3).load("i").constant(0).op(Instr::Eq);
            let exit = f.here();
            f.op(Instr::JumpIfFalse(usize::MAX));
            let done = f.here();
            f.op(Instr::Jump(usize::MAX));

            let body = f.here();
            f.resolve_jump(exit, body);
            f.at(4).load("total").load("i").op(Instr::Add).store_global("total");
            f.at(5)
                .load("i")
                .constant(1)
                .op(Instr::Sub)
                .store("i")
                .op(Instr::Jump(top));

            let end = f.here();
            f.resolve_jump(done, end);
            f.at(6).load("total").ret();
        })
        .build()
}

/// Computes `sum(4)` recursively into the global `result`.
fn sum() -> Program {
    Program::builder("sum.si")
        .function("main", &[], |f| {
            f.at(1).constant(4).call("sum", 1).store_global("result");
            f.at(2).load("result").ret();
        })
        .function("sum", &["n"], |f| {
            f.at(10).load("n").constant(1).op(Instr::Lt);
            let branch = f.here();
            f.op(Instr::JumpIfFalse(usize::MAX));

            f.at(11).constant(0).ret();

            let recurse = f.here();
            f.at(12)
                .load("n")
                .load("n")
                .constant(1)
                .op(Instr::Sub)
                .call("sum", 1)
                .op(Instr::Add)
                .ret();

            f.resolve_jump(branch, recurse);
        })
        .build()
}

/// Builds a greeting string through a helper call.
fn greet() -> Program {
    Program::builder("greet.si")
        .function("main", &[], |f| {
            f.at(1).constant("world").store("who");
            f.at(2).load("who").call("greeting", 1).store("message");
            f.at(3).load("message").ret();
        })
        .function("greeting", &["name"], |f| {
            f.at(10).constant("hello, ").load("name").op(Instr::Add).store("text");
            f.at(11).load("text").ret();
        })
        .build()
}

/// Raises an exception three activations deep.
fn crash() -> Program {
    Program::builder("crash.si")
        .function("main", &[], |f| {
            f.at(1).call("mid", 0).store("unused");
            f.at(2).constant(0).ret();
        })
        .function("mid", &[], |f| {
            f.at(10).call("inner", 0).store("unused");
            f.at(11).constant(0).ret();
        })
        .function("inner", &[], |f| {
            f.at(20).raise("deliberate failure");
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_demo_builds() {
        for name in demo_names() {
            assert!(demo_program(name).is_some(), "demo {name} missing");
        }

        assert!(demo_program("nonsense").is_none());
    }
}
