//! Runtime error types for the Tether interpreter.

use std::fmt;
use thiserror::Error;

/// The class of a runtime fault, named the way it is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExcKind {
    NameError,
    UnboundLocalError,
    TypeError,
    ValueError,
    ZeroDivisionError,
    IndexError,
    KeyError,
    AttributeError,
    OverflowError,
    AssertionError,
    RecursionError,
    MemoryError,
    RuntimeError,
    OSError,
}

impl fmt::Display for ExcKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NameError => "NameError",
            Self::UnboundLocalError => "UnboundLocalError",
            Self::TypeError => "TypeError",
            Self::ValueError => "ValueError",
            Self::ZeroDivisionError => "ZeroDivisionError",
            Self::IndexError => "IndexError",
            Self::KeyError => "KeyError",
            Self::AttributeError => "AttributeError",
            Self::OverflowError => "OverflowError",
            Self::AssertionError => "AssertionError",
            Self::RecursionError => "RecursionError",
            Self::MemoryError => "MemoryError",
            Self::RuntimeError => "RuntimeError",
            Self::OSError => "OSError",
        };
        f.write_str(name)
    }
}

/// One line of a traceback: where a frame was when the fault passed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    pub file: String,
    pub line: u32,
    /// `<module>` for top-level code, otherwise the function name.
    pub scope: String,
}

/// A runtime failure raised by evaluated code.
///
/// The traceback is filled in by the innermost frame that sees the fault
/// and is never overwritten afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeFault {
    pub kind: ExcKind,
    pub message: String,
    pub traceback: Vec<TraceFrame>,
}

impl RuntimeFault {
    pub fn new(kind: ExcKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            traceback: Vec::new(),
        }
    }

    /// Render in traceback style:
    ///
    /// ```text
    /// Traceback (most recent call last):
    ///   File "<console>", line 1, in <module>
    /// ZeroDivisionError: division by zero
    /// ```
    ///
    /// A run of identical frames is cut after three, like deep recursion
    /// in Python: `  [Previous line repeated 197 more times]`.
    pub fn render(&self) -> String {
        let mut out = String::from("Traceback (most recent call last):\n");
        let mut previous: Option<&TraceFrame> = None;
        let mut run = 0;
        for frame in &self.traceback {
            if previous != Some(frame) {
                push_repeats(&mut out, run);
                previous = Some(frame);
                run = 0;
            }
            run += 1;
            if run > REPEAT_CUTOFF {
                continue;
            }
            out.push_str(&format!(
                "  File \"{}\", line {}, in {}\n",
                frame.file, frame.line, frame.scope
            ));
        }
        push_repeats(&mut out, run);
        out.push_str(&self.to_string());
        out.push('\n');
        out
    }
}

/// Identical traceback lines shown before the rest are summarized.
const REPEAT_CUTOFF: usize = 3;

fn push_repeats(out: &mut String, run: usize) {
    if run > REPEAT_CUTOFF {
        let hidden = run - REPEAT_CUTOFF;
        let plural = if hidden == 1 { "" } else { "s" };
        out.push_str(&format!("  [Previous line repeated {hidden} more time{plural}]\n"));
    }
}

impl fmt::Display for RuntimeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

/// Why evaluation of a unit stopped early.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// A fault raised by evaluated code; the session continues.
    #[error("{0}")]
    Fault(RuntimeFault),
    /// `exit()` / `quit()` was called; the session ends with this code.
    #[error("exit requested with code {0}")]
    Exit(i32),
}

impl EvalError {
    pub fn new(kind: ExcKind, message: impl Into<String>) -> Self {
        Self::Fault(RuntimeFault::new(kind, message))
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ExcKind::TypeError, message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new(ExcKind::ValueError, message)
    }

    pub fn fault(&self) -> Option<&RuntimeFault> {
        match self {
            Self::Fault(fault) => Some(fault),
            Self::Exit(_) => None,
        }
    }
}

impl From<RuntimeFault> for EvalError {
    fn from(fault: RuntimeFault) -> Self {
        Self::Fault(fault)
    }
}

/// Result alias for interpreter operations.
pub type EvalResult<T> = Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_with_frames() {
        let mut fault = RuntimeFault::new(ExcKind::NameError, "name 'y' is not defined");
        fault.traceback = vec![
            TraceFrame {
                file: "<console>".into(),
                line: 1,
                scope: "<module>".into(),
            },
            TraceFrame {
                file: "<console>".into(),
                line: 2,
                scope: "f".into(),
            },
        ];
        assert_eq!(
            fault.render(),
            "Traceback (most recent call last):\n  File \"<console>\", line 1, in <module>\n  File \"<console>\", line 2, in f\nNameError: name 'y' is not defined\n"
        );
    }

    #[test]
    fn test_render_collapses_repeated_frames() {
        let frame = |line: u32, scope: &str| TraceFrame {
            file: "<console>".into(),
            line,
            scope: scope.into(),
        };
        let mut fault = RuntimeFault::new(ExcKind::RecursionError, "maximum recursion depth exceeded");
        fault.traceback = vec![frame(1, "<module>")];
        fault.traceback.extend(std::iter::repeat(frame(2, "f")).take(200));
        fault.traceback.extend(std::iter::repeat(frame(3, "g")).take(4));
        let rendered = fault.render();
        assert_eq!(rendered.matches("line 2, in f").count(), 3);
        assert!(rendered.contains("  [Previous line repeated 197 more times]\n"));
        assert!(rendered.contains("  [Previous line repeated 1 more time]\n"));
        assert!(rendered.ends_with("in g\n  [Previous line repeated 1 more time]\nRecursionError: maximum recursion depth exceeded\n"));
    }

    #[test]
    fn test_empty_message_renders_kind_only() {
        let fault = RuntimeFault::new(ExcKind::AssertionError, "");
        assert_eq!(fault.to_string(), "AssertionError");
    }

    #[test]
    fn test_exit_is_not_a_fault() {
        assert!(EvalError::Exit(3).fault().is_none());
        assert!(EvalError::type_error("x").fault().is_some());
    }
}
