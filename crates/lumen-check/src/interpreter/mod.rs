//! Tree-walking interpreter for linked Lumen programs.
//!
//! # Architecture
//!
//! - [`Interpreter`] owns the [`Program`](crate::program::Program), the probe
//!   sink and an [`InterpreterConfig`]. [`Interpreter::run`] executes one
//!   entry method and returns a [`RunOutcome`].
//! - Each thread of control is an execution context. The entry method runs
//!   on context 0; every `spawn` starts a new context on its own thread, and
//!   the run joins all of them before returning.
//! - [`Value`] is the runtime representation of all values; arrays are
//!   shared references.
//! - Operators and builtins live in [`eval`], shared with constant folding.
//! - [`RuntimeError`] carries the failing method and span; [`ExecError`]
//!   adds the two ways a probe sink can stop a run.
//!
//! # Usage
//!
//! ```ignore
//! let interp = Interpreter::new(program, Arc::new(NoopSink), InterpreterConfig::default());
//! let outcome = interp.run(ENTRY_POINT);
//! match outcome.result {
//!     Ok(value) => { /* use value and outcome.output */ }
//!     Err(ExecError::Canceled(reason)) => { /* stopped by the recorder */ }
//!     Err(error) => { /* runtime failure or violation */ }
//! }
//! ```

pub mod error;
pub mod eval;
mod exec;
pub mod state;
pub mod value;

pub use error::{ExecError, RuntimeError, RuntimeErrorKind};
pub use state::{Interpreter, InterpreterConfig, RunOutcome, MAIN_CONTEXT};
pub use value::{ArrayRef, Value};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lumen_core::id::{ExecutionContextId, SourceIndex};
    use lumen_core::parser::{parse_statements, parse_unit, ParseOptions};
    use lumen_trace::{CancelReason, NoopSink};

    use super::*;
    use crate::program::{Program, ENTRY_POINT};

    /// Helper: link `source`, wrap `entry` as the entry method and run it.
    fn run_with(source: &str, entry: &str, config: InterpreterConfig) -> RunOutcome {
        let options = ParseOptions::default();
        let unit = parse_unit(source, &options).unwrap();
        let mut program = Program::link(&[(SourceIndex(0), unit)]);
        program.add_entry(SourceIndex(1), parse_statements(entry, &options).unwrap());
        Interpreter::new(Arc::new(program), Arc::new(NoopSink), config).run(ENTRY_POINT)
    }

    fn run(source: &str, entry: &str) -> RunOutcome {
        run_with(source, entry, InterpreterConfig::default())
    }

    fn printed(outcome: &RunOutcome) -> Vec<String> {
        outcome
            .output
            .get(&MAIN_CONTEXT)
            .cloned()
            .unwrap_or_default()
    }

    fn runtime_error(outcome: RunOutcome) -> RuntimeError {
        match outcome.result {
            Err(ExecError::Runtime(error)) => error,
            other => panic!("expected a runtime error, got {other:?}"),
        }
    }

    #[test]
    fn sum_loop() {
        let source = r#"
            int Sum(int n) {
                int t = 0;
                for (int i = 0; i < n; i++) { t += i; }
                return t;
            }
        "#;
        let outcome = run(source, "print(Sum(3)); print(Sum(10));");
        assert!(outcome.result.is_ok());
        assert_eq!(printed(&outcome), ["3", "45"]);
    }

    #[test]
    fn recursion_and_ternary() {
        let source = "int Fib(int n) { return n < 2 ? n : Fib(n - 1) + Fib(n - 2); }";
        let outcome = run(source, "print(Fib(15));");
        assert_eq!(printed(&outcome), ["610"]);
    }

    #[test]
    fn while_do_while_break_continue() {
        let source = r#"
            int Odd(int limit) {
                int total = 0;
                int i = 0;
                while (true) {
                    i++;
                    if (i > limit) break;
                    if (i % 2 == 0) continue;
                    total += i;
                }
                do { total *= 2; } while (false);
                return total;
            }
        "#;
        let outcome = run(source, "print(Odd(5));");
        assert_eq!(printed(&outcome), ["18"]);
    }

    #[test]
    fn postfix_and_prefix_yield_old_and_new() {
        let outcome = run("", "int x = 5; int y = x++; int z = ++x; print(x, y, z);");
        assert_eq!(printed(&outcome), ["7 5 7"]);
    }

    #[test]
    fn arrays_are_shared_references() {
        let source = r#"
            void Fill(int[] a) { for (int i = 0; i < a.Length; i++) { a[i] = i * i; } }
        "#;
        let entry = r#"
            int[] a = new int[4];
            int[] b = a;
            Fill(b);
            a[1] += 10;
            int total = 0;
            foreach (int v in a) { total += v; }
            print(a[1], total, a == b);
        "#;
        let outcome = run(source, entry);
        assert_eq!(printed(&outcome), ["11 24 True"]);
    }

    #[test]
    fn strings_concatenate_and_index() {
        let entry = r#"
            string s = "ab";
            s += 'c';
            string t = s + 1 + 2.5 + true;
            int n = 0;
            foreach (char c in s) { n++; }
            print(t, s[2], s.Length, n);
        "#;
        let outcome = run("", entry);
        assert_eq!(printed(&outcome), ["abc12.5True c 3 3"]);
    }

    #[test]
    fn statics_are_shared_and_initialized_in_order() {
        let source = r#"
            static int counter = 10;
            static int twice = counter * 2;
            void Bump() { counter++; }
        "#;
        let outcome = run(source, "Bump(); Bump(); print(counter, twice);");
        assert_eq!(printed(&outcome), ["12 20"]);
    }

    #[test]
    fn static_declarators_default_when_uninitialized() {
        let source = r#"
            static int count = 10, other;
            int Bump() { count += 1; other = other + 2; return count; }
        "#;
        let outcome = run(source, "print(Bump()); print(Bump(), other);");
        assert!(outcome.result.is_ok(), "{:?}", outcome.result);
        assert_eq!(printed(&outcome), ["11", "12 4"]);
    }

    #[test]
    fn overflow_is_checked_outside_unsafe() {
        let entry = "int big = 9223372036854775807; big = big + 1;";
        let error = runtime_error(run("", entry));
        assert_eq!(error.kind, RuntimeErrorKind::IntegerOverflow);
        assert_eq!(error.method, ENTRY_POINT);
        assert_eq!(error.source_index, SourceIndex(1));

        let wrapped = run(
            "",
            "int big = 9223372036854775807; unsafe { big = big + 1; } print(big < 0);",
        );
        assert_eq!(printed(&wrapped), ["True"]);
    }

    #[test]
    fn division_by_zero_reports_method() {
        let source = "int Div(int a, int b) { return a / b; }";
        let error = runtime_error(run(source, "Div(1, 0);"));
        assert_eq!(error.kind, RuntimeErrorKind::DivideByZero);
        assert_eq!(error.method, "Div");
        assert_eq!(error.source_index, SourceIndex(0));
    }

    #[test]
    fn index_out_of_range_and_null() {
        let error = runtime_error(run("", "int[] a = new int[2]; a[2] = 1;"));
        assert_eq!(
            error.kind,
            RuntimeErrorKind::IndexOutOfRange {
                index: 2,
                length: 2
            }
        );
        let error = runtime_error(run("", "int[] a; print(a.Length);"));
        assert_eq!(error.kind, RuntimeErrorKind::NullReference);
        let error = runtime_error(run("", "int[] a = new int[-1];"));
        assert_eq!(error.kind, RuntimeErrorKind::NegativeArraySize { size: -1 });
    }

    #[test]
    fn call_depth_is_bounded() {
        let config = InterpreterConfig {
            max_call_depth: 32,
            ..InterpreterConfig::default()
        };
        let error = runtime_error(run_with("int R(int n) { return R(n + 1); }", "R(0);", config));
        assert_eq!(error.kind, RuntimeErrorKind::CallDepthExceeded { limit: 32 });
    }

    #[test]
    fn double_arithmetic_and_builtins() {
        let entry = "double d = 1; d = d / 4; print(d, sqrt(16), abs(-2), min(3, 1), max(1.5, 2));";
        let outcome = run("", entry);
        assert_eq!(printed(&outcome), ["0.25 4 2 1 2"]);
    }

    #[test]
    fn spawned_contexts_are_joined_and_print_separately() {
        let source = r#"
            static int done = 0;
            void Work(int n) { print("work", n); }
        "#;
        let outcome = run(source, "spawn Work(1); spawn Work(2); print(\"main\");");
        assert!(outcome.result.is_ok());
        assert_eq!(printed(&outcome), ["main"]);
        let mut others: Vec<String> = outcome
            .output
            .iter()
            .filter(|(context, _)| **context != MAIN_CONTEXT)
            .flat_map(|(_, lines)| lines.clone())
            .collect();
        others.sort();
        assert_eq!(others, ["work 1", "work 2"]);
        assert!(outcome.output.keys().all(|c| *c == MAIN_CONTEXT || c.0 >= 1));
        assert!(!outcome.output.contains_key(&ExecutionContextId(99)));
    }

    #[test]
    fn failure_in_spawned_context_fails_the_run() {
        let source = "void Boom() { int[] a = new int[1]; a[5] = 1; }";
        let error = runtime_error(run(source, "spawn Boom();"));
        assert_eq!(error.method, "Boom");
    }

    #[test]
    fn halted_run_cancels_other_loops() {
        let source = r#"
            void Spin() { int i = 0; while (true) { i = 1; } }
        "#;
        // The main context fails; the spinning context stops at its next
        // loop step instead of running forever.
        let outcome = run(source, "spawn Spin(); int z = 0; print(1 / z);");
        assert!(matches!(outcome.result, Err(ExecError::Runtime(_))));
        assert!(!matches!(
            outcome.result,
            Err(ExecError::Canceled(CancelReason::Requested))
        ));
    }
}
