//! Console builtins backed by the host collaborators.

use std::cell::RefCell;
use std::rc::Rc;

use tether_eval::{CallArgs, EvalError, EvalResult, ExcKind, Interpreter, Value};
use tracing::warn;

use crate::error::HostError;
use crate::process::{ExitStatus, Spawner};
use crate::rmtree::remove_tree;
use crate::runner::TestRunner;

/// Register the host builtins in `interp`:
///
/// | builtin                   | returns |
/// |---------------------------|---------|
/// | `rm_rf(name)`             | `None`; removes `name` under the tmp dir |
/// | `run_unittests()`         | exit code, `None` if killed |
/// | `run_unittests_count(n)`  | `(successes, failures)`; `n == 0` runs forever |
/// | `run_binary(name)`        | exit code, `None` if killed |
/// | `run_tests()`             | list of images that did not pass |
/// | `run_leak_analysis()`     | `None` |
pub fn install<S: Spawner + 'static>(interp: &mut Interpreter, runner: TestRunner<S>) {
    let runner = Rc::new(RefCell::new(runner));

    let r = Rc::clone(&runner);
    interp.define_builtin("rm_rf", move |out, args| {
        args.check("rm_rf", 1, 1, &[])?;
        let name = text_arg(&args, "rm_rf")?;
        let tmp_dir = r.borrow().config().tmp_dir.clone();
        remove_tree(&tmp_dir, name, out).map_err(host_fault)?;
        Ok(Value::None)
    });

    let r = Rc::clone(&runner);
    interp.define_builtin("run_unittests", move |out, args| {
        args.check("run_unittests", 0, 0, &[])?;
        let status = r.borrow_mut().run_unittests(out).map_err(host_fault)?;
        Ok(status_value(status))
    });

    let r = Rc::clone(&runner);
    interp.define_builtin("run_unittests_count", move |out, args| {
        args.check("run_unittests_count", 1, 1, &[])?;
        let count = match args.arg(0) {
            Some(Value::Int(n)) if *n >= 0 => *n as u64,
            _ => {
                return Err(EvalError::value_error(
                    "run_unittests_count() needs a non-negative int",
                ))
            }
        };
        let tally = r
            .borrow_mut()
            .run_unittests_count(count, out)
            .map_err(host_fault)?;
        Ok(Value::tuple(vec![
            Value::Int(tally.successes as i64),
            Value::Int(tally.failures as i64),
        ]))
    });

    let r = Rc::clone(&runner);
    interp.define_builtin("run_binary", move |out, args| {
        args.check("run_binary", 1, 1, &[])?;
        let name = text_arg(&args, "run_binary")?;
        let status = r.borrow_mut().run_binary(name, out).map_err(host_fault)?;
        Ok(status_value(status))
    });

    let r = Rc::clone(&runner);
    interp.define_builtin("run_tests", move |out, args| {
        args.check("run_tests", 0, 0, &[])?;
        let results = r.borrow_mut().run_tests(out).map_err(host_fault)?;
        let failed = results
            .into_iter()
            .filter(|(_, status)| !status.passed())
            .map(|(name, _)| Value::Str(name))
            .collect();
        Ok(Value::list(failed))
    });

    let r = runner;
    interp.define_builtin("run_leak_analysis", move |out, args| {
        args.check("run_leak_analysis", 0, 0, &[])?;
        r.borrow_mut().run_leak_analysis(out).map_err(host_fault)?;
        Ok(Value::None)
    });
}

fn text_arg<'a>(args: &'a CallArgs, name: &str) -> EvalResult<&'a str> {
    match args.arg(0) {
        Some(Value::Str(text)) => Ok(text),
        Some(other) => Err(EvalError::type_error(format!(
            "{name}() argument must be str, not {}",
            other.type_name()
        ))),
        None => Err(EvalError::type_error(format!("{name}() missing argument"))),
    }
}

fn status_value(status: ExitStatus) -> Value {
    status.code.map_or(Value::None, |code| Value::Int(i64::from(code)))
}

fn host_fault(err: HostError) -> EvalError {
    warn!(%err, "host builtin failed");
    EvalError::new(ExcKind::OSError, err.to_string())
}
