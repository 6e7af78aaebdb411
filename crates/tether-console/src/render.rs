//! What one evaluation attempt produced, and how a value is shown.

use tether_eval::{EvalResult, Value};

/// The result of pushing a line into the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationOutcome {
    /// An expression produced a value to echo.
    Value(String),
    /// The unit ran but has nothing to show.
    Suppressed,
    /// A runtime fault, rendered as a traceback.
    RecoverableError(String),
    /// The unit can never be valid; rendered diagnostic.
    SyntaxError(String),
    /// The buffered lines are an unfinished unit.
    NeedMoreInput,
    /// Evaluated code asked to end the session.
    SessionTerminated(i32),
}

impl EvaluationOutcome {
    /// Text written to the channel for this outcome, if any.
    pub fn output(&self) -> Option<String> {
        match self {
            Self::Value(text) => Some(format!("{text}\n")),
            Self::RecoverableError(text) | Self::SyntaxError(text) => Some(text.clone()),
            Self::Suppressed | Self::NeedMoreInput | Self::SessionTerminated(_) => None,
        }
    }
}

/// Render an expression's value for echoing.
///
/// `None` shows nothing, text is wrapped in single quotes as-is, and
/// everything else uses its `str()` form, which fails on values nested
/// too deeply to render.
pub fn render_value(value: &Value) -> EvalResult<Option<String>> {
    match value {
        Value::None => Ok(None),
        Value::Str(text) => Ok(Some(format!("'{text}'"))),
        other => other.try_to_str().map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_renders_nothing() {
        assert_eq!(render_value(&Value::None).unwrap(), None);
    }

    #[test]
    fn test_text_is_quoted_without_escaping() {
        assert_eq!(render_value(&Value::str("it's")).unwrap().as_deref(), Some("'it's'"));
    }

    #[test]
    fn test_other_values_use_str_form() {
        assert_eq!(render_value(&Value::Int(4)).unwrap().as_deref(), Some("4"));
        assert_eq!(render_value(&Value::Float(4.0)).unwrap().as_deref(), Some("4.0"));
        let list = Value::list(vec![Value::Int(1), Value::str("a")]);
        assert_eq!(render_value(&list).unwrap().as_deref(), Some("[1, 'a']"));
    }

    #[test]
    fn test_value_outcome_ends_with_newline() {
        let outcome = EvaluationOutcome::Value("4".into());
        assert_eq!(outcome.output().as_deref(), Some("4\n"));
        assert_eq!(EvaluationOutcome::NeedMoreInput.output(), None);
    }
}
