//! Interpreter tests: units are classified with the real parser and run
//! against one persistent session, the way the console drives them.

use tether_eval::{EvalError, ExcKind, Interpreter, InterpreterConfig, Value};
use tether_parser::{classify, Classification};
use tether_types::SourceFile;

// ─────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────

struct Session {
    interp: Interpreter,
    out: Vec<u8>,
}

impl Session {
    fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    fn with_config(config: InterpreterConfig) -> Self {
        Self {
            interp: Interpreter::new(config),
            out: Vec::new(),
        }
    }

    /// Run one unit; expressions yield `Some(value)`.
    fn run(&mut self, source: &str) -> Result<Option<Value>, EvalError> {
        match classify(&SourceFile::new("<console>", source)) {
            Classification::Expression(expr) => {
                self.interp.eval_expression(&expr, &mut self.out).map(Some)
            }
            Classification::Statement(stmts) => {
                self.interp.exec_statements(&stmts, &mut self.out).map(|_| None)
            }
            other => panic!("unit {source:?} did not compile: {other:?}"),
        }
    }

    fn ok(&mut self, source: &str) {
        if let Err(err) = self.run(source) {
            panic!("unit {source:?} failed: {err}");
        }
    }

    /// Evaluate an expression and return its repr.
    fn repr(&mut self, source: &str) -> String {
        match self.run(source) {
            Ok(Some(value)) => value.repr(),
            Ok(None) => panic!("unit {source:?} is not an expression"),
            Err(err) => panic!("unit {source:?} failed: {err}"),
        }
    }

    fn fault(&mut self, source: &str) -> (ExcKind, String) {
        match self.run(source) {
            Err(EvalError::Fault(fault)) => (fault.kind, fault.message),
            other => panic!("expected a fault from {source:?}, got {other:?}"),
        }
    }

    fn output(&mut self) -> String {
        String::from_utf8(std::mem::take(&mut self.out)).expect("output is utf-8")
    }
}

fn eval_repr(source: &str) -> String {
    Session::new().repr(source)
}

// ─────────────────────────────────────────────────────────────────────
// Arithmetic & Values
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_integer_arithmetic() {
    assert_eq!(eval_repr("1 + 2 * 3"), "7");
    assert_eq!(eval_repr("2 ** 10"), "1024");
    assert_eq!(eval_repr("-7 // 2"), "-4");
    assert_eq!(eval_repr("-7 % 3"), "2");
    assert_eq!(eval_repr("7 / 2"), "3.5");
}

#[test]
fn test_float_repr() {
    assert_eq!(eval_repr("0.1 + 0.2"), "0.30000000000000004");
    assert_eq!(eval_repr("1.0"), "1.0");
    assert_eq!(eval_repr("2 ** -1"), "0.5");
    assert_eq!(eval_repr("1e20"), "1e+20");
}

#[test]
fn test_string_operations() {
    assert_eq!(eval_repr("'ab' * 3"), "'ababab'");
    assert_eq!(eval_repr("'hello'[1:4]"), "'ell'");
    assert_eq!(eval_repr("'a,b,c'.split(',')"), "['a', 'b', 'c']");
    assert_eq!(eval_repr("'-'.join(['x', 'y'])"), "'x-y'");
    assert_eq!(eval_repr("\"it's\""), "\"it's\"");
    assert_eq!(eval_repr("'  pad '.strip().upper()"), "'PAD'");
}

#[test]
fn test_containers() {
    assert_eq!(eval_repr("[1, 2] + [3]"), "[1, 2, 3]");
    assert_eq!(eval_repr("(1,)"), "(1,)");
    assert_eq!(eval_repr("{'a': 1, 'b': 2}['b']"), "2");
    assert_eq!(eval_repr("list(range(3))"), "[0, 1, 2]");
    assert_eq!(eval_repr("[1, 2, 3][::-1]"), "[3, 2, 1]");
    assert_eq!(eval_repr("sorted([3, 1, 2], reverse=True)"), "[3, 2, 1]");
}

#[test]
fn test_comparisons_and_logic() {
    assert_eq!(eval_repr("1 < 2 < 3"), "True");
    assert_eq!(eval_repr("1 < 3 < 2"), "False");
    assert_eq!(eval_repr("0 or 'x'"), "'x'");
    assert_eq!(eval_repr("[] and 1"), "[]");
    assert_eq!(eval_repr("2 in [1, 2]"), "True");
    assert_eq!(eval_repr("'z' not in 'abc'"), "True");
}

#[test]
fn test_short_circuit_skips_right_side() {
    assert_eq!(eval_repr("False and undefined_name"), "False");
}

// ─────────────────────────────────────────────────────────────────────
// Statements & Session State
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_globals_persist_between_units() {
    let mut s = Session::new();
    s.ok("x = 40");
    s.ok("x += 2");
    assert_eq!(s.repr("x"), "42");
}

#[test]
fn test_tuple_unpacking() {
    let mut s = Session::new();
    s.ok("a, b = 1, 2");
    s.ok("a, b = b, a");
    assert_eq!(s.repr("(a, b)"), "(2, 1)");
    let (kind, message) = s.fault("a, b = 1, 2, 3");
    assert_eq!(kind, ExcKind::ValueError);
    assert_eq!(message, "too many values to unpack (expected 2)");
}

#[test]
fn test_loops_with_break_and_continue() {
    let mut s = Session::new();
    s.ok("total = 0");
    s.ok("for i in range(10):\n    if i == 7:\n        break\n    if i % 2:\n        continue\n    total += i\n\n");
    assert_eq!(s.repr("total"), "12");
    s.ok("n = 0");
    s.ok("while n < 5:\n    n += 1\n\n");
    assert_eq!(s.repr("n"), "5");
}

#[test]
fn test_print_writes_to_output() {
    let mut s = Session::new();
    s.ok("print('a', 1, None, sep='-')");
    s.ok("print('no newline', end='')");
    assert_eq!(s.output(), "a-1-None\nno newline");
}

#[test]
fn test_list_methods_mutate_in_place() {
    let mut s = Session::new();
    s.ok("xs = [3, 1]");
    s.ok("ys = xs");
    s.ok("xs.append(2)");
    s.ok("xs.sort()");
    assert_eq!(s.repr("ys"), "[1, 2, 3]");
    assert_eq!(s.repr("xs.pop()"), "3");
    s.ok("xs += [9]");
    assert_eq!(s.repr("ys"), "[1, 2, 9]");
}

#[test]
fn test_dict_methods() {
    let mut s = Session::new();
    s.ok("d = {'a': 1}");
    s.ok("d['b'] = 2");
    assert_eq!(s.repr("d.get('c', 0)"), "0");
    assert_eq!(s.repr("d.keys()"), "['a', 'b']");
    assert_eq!(s.repr("d.pop('a')"), "1");
    assert_eq!(s.repr("d"), "{'b': 2}");
}

#[test]
fn test_assert_statement() {
    let mut s = Session::new();
    s.ok("assert 1 == 1");
    let (kind, message) = s.fault("assert 1 == 2, 'mismatch'");
    assert_eq!(kind, ExcKind::AssertionError);
    assert_eq!(message, "mismatch");
}

#[test]
fn test_slice_assignment_is_rejected() {
    let mut s = Session::new();
    s.ok("xs = [1, 2, 3]");
    let (kind, message) = s.fault("xs[0:2] = [9]");
    assert_eq!(kind, ExcKind::TypeError);
    assert_eq!(message, "slice assignment is not supported");
    assert_eq!(s.repr("xs"), "[1, 2, 3]");
}

#[test]
fn test_del_removes_binding() {
    let mut s = Session::new();
    s.ok("x = 1");
    s.ok("del x");
    let (kind, message) = s.fault("x");
    assert_eq!(kind, ExcKind::NameError);
    assert_eq!(message, "name 'x' is not defined");
}

// ─────────────────────────────────────────────────────────────────────
// Functions
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_function_definition_and_call() {
    let mut s = Session::new();
    s.ok("def add(a, b=10):\n    return a + b\n\n");
    assert_eq!(s.repr("add(1)"), "11");
    assert_eq!(s.repr("add(1, b=2)"), "3");
    let (kind, message) = s.fault("add()");
    assert_eq!(kind, ExcKind::TypeError);
    assert_eq!(message, "add() missing 1 required positional argument: 'a'");
}

#[test]
fn test_recursive_function() {
    let mut s = Session::new();
    s.ok("def fact(n):\n    if n <= 1:\n        return 1\n    return n * fact(n - 1)\n\n");
    assert_eq!(s.repr("fact(10)"), "3628800");
}

#[test]
fn test_closure_sees_enclosing_scope() {
    let mut s = Session::new();
    s.ok("def make_adder(n):\n    def add(x):\n        return x + n\n    return add\n\n");
    s.ok("add5 = make_adder(5)");
    assert_eq!(s.repr("add5(1)"), "6");
}

#[test]
fn test_lambda() {
    let mut s = Session::new();
    s.ok("sq = lambda x: x * x");
    assert_eq!(s.repr("sq(7)"), "49");
}

#[test]
fn test_global_declaration() {
    let mut s = Session::new();
    s.ok("count = 0");
    s.ok("def bump():\n    global count\n    count += 1\n\n");
    s.ok("bump()");
    s.ok("bump()");
    assert_eq!(s.repr("count"), "2");
}

#[test]
fn test_local_referenced_before_assignment() {
    let mut s = Session::new();
    s.ok("x = 1");
    s.ok("def f():\n    y = x\n    x = 2\n\n");
    let (kind, message) = s.fault("f()");
    assert_eq!(kind, ExcKind::UnboundLocalError);
    assert_eq!(message, "local variable 'x' referenced before assignment");
}

// ─────────────────────────────────────────────────────────────────────
// Faults
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_zero_division_traceback() {
    let mut s = Session::new();
    let err = s.run("1 / 0").unwrap_err();
    let fault = err.fault().expect("runtime fault");
    assert_eq!(
        fault.render(),
        "Traceback (most recent call last):\n  File \"<console>\", line 1, in <module>\nZeroDivisionError: division by zero\n"
    );
}

#[test]
fn test_traceback_lists_function_frames() {
    let mut s = Session::new();
    s.ok("def inv(x):\n    return 1 / x\n\n");
    let err = s.run("inv(0)").unwrap_err();
    let fault = err.fault().expect("runtime fault");
    let scopes: Vec<(&str, u32)> = fault
        .traceback
        .iter()
        .map(|frame| (frame.scope.as_str(), frame.line))
        .collect();
    assert_eq!(scopes, vec![("<module>", 1), ("inv", 2)]);
}

#[test]
fn test_effects_before_fault_are_kept() {
    let mut s = Session::new();
    s.ok("xs = []");
    let (kind, _) = s.fault("for i in range(5):\n    xs.append(i)\n    if i == 2:\n        1 / 0\n\n");
    assert_eq!(kind, ExcKind::ZeroDivisionError);
    assert_eq!(s.repr("xs"), "[0, 1, 2]");
}

#[test]
fn test_type_errors() {
    let mut s = Session::new();
    assert_eq!(
        s.fault("1 + 'a'"),
        (
            ExcKind::TypeError,
            "unsupported operand type(s) for +: 'int' and 'str'".to_string()
        )
    );
    assert_eq!(
        s.fault("5()"),
        (ExcKind::TypeError, "'int' object is not callable".to_string())
    );
    assert_eq!(s.fault("{}['k']").0, ExcKind::KeyError);
    assert_eq!(s.fault("[1][5]").0, ExcKind::IndexError);
    assert_eq!(s.fault("(1).nope").0, ExcKind::AttributeError);
}

#[test]
fn test_recursion_limit() {
    let mut s = Session::with_config(InterpreterConfig {
        recursion_limit: 50,
        ..InterpreterConfig::default()
    });
    s.ok("def down(n):\n    return down(n + 1)\n\n");
    let (kind, message) = s.fault("down(0)");
    assert_eq!(kind, ExcKind::RecursionError);
    assert_eq!(message, "maximum recursion depth exceeded");
    // The session survives the fault.
    assert_eq!(s.repr("1 + 1"), "2");
}

#[test]
fn test_stack_limit_stops_deep_recursion() {
    let mut s = Session::with_config(InterpreterConfig {
        recursion_limit: 1_000_000,
        stack_limit: 64 * 1024,
        ..InterpreterConfig::default()
    });
    s.ok("def down(n):\n    return down(n + 1)\n\n");
    let (kind, message) = s.fault("down(0)");
    assert_eq!(kind, ExcKind::RecursionError);
    assert_eq!(message, "maximum recursion depth exceeded");
    assert_eq!(s.repr("1 + 1"), "2");
}

#[test]
fn test_step_limit_stops_runaway_loop() {
    let mut s = Session::with_config(InterpreterConfig {
        step_limit: Some(1_000),
        ..InterpreterConfig::default()
    });
    let (kind, message) = s.fault("while True:\n    pass\n\n");
    assert_eq!(kind, ExcKind::RuntimeError);
    assert_eq!(message, "step limit exceeded");
}

#[test]
fn test_huge_repetition_is_a_memory_error() {
    assert_eq!(Session::new().fault("[0] * 10 ** 12").0, ExcKind::MemoryError);
}

#[test]
fn test_integer_overflow() {
    assert_eq!(Session::new().fault("2 ** 64").0, ExcKind::OverflowError);
}

// ─────────────────────────────────────────────────────────────────────
// Exit & Host Builtins
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_exit_requests_session_end() {
    let mut s = Session::new();
    assert_eq!(s.run("exit()").unwrap_err(), EvalError::Exit(0));
    assert_eq!(s.run("quit(3)").unwrap_err(), EvalError::Exit(3));
}

#[test]
fn test_exit_with_message() {
    let mut s = Session::new();
    assert_eq!(s.run("exit('bye')").unwrap_err(), EvalError::Exit(1));
    assert_eq!(s.output(), "bye\n");
}

#[test]
fn test_host_defined_builtin() {
    let mut s = Session::new();
    s.interp
        .define_builtin("answer", |_, _| Ok(Value::Int(42)));
    assert_eq!(s.repr("answer() + 0"), "42");
}
