use serde::{Deserialize, Serialize};
use tether_eval::InterpreterConfig;

use crate::line_reader::DEFAULT_ERASE_CHARS;

/// Settings for one console session. Every field has a default, so an
/// empty JSON object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsoleConfig {
    /// Prompt shown when no unit is pending.
    pub prompt: String,
    /// Prompt shown while a unit needs more lines.
    pub continuation_prompt: String,
    /// Written once before the first prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    /// Name units are reported under in diagnostics.
    pub filename: String,
    pub erase_chars: Vec<char>,
    /// `null` disables the per-unit step budget.
    pub step_limit: Option<u64>,
    pub recursion_limit: u32,
    /// Bytes of native stack one unit may use.
    pub stack_limit: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        let interp = InterpreterConfig::default();
        Self {
            prompt: ">>> ".into(),
            continuation_prompt: "... ".into(),
            banner: None,
            filename: interp.filename,
            erase_chars: DEFAULT_ERASE_CHARS.to_vec(),
            step_limit: interp.step_limit,
            recursion_limit: interp.recursion_limit,
            stack_limit: interp.stack_limit,
        }
    }
}

impl ConsoleConfig {
    pub fn interpreter_config(&self) -> InterpreterConfig {
        InterpreterConfig {
            filename: self.filename.clone(),
            step_limit: self.step_limit,
            recursion_limit: self.recursion_limit,
            stack_limit: self.stack_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_default() {
        let config: ConsoleConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ConsoleConfig::default());
        assert_eq!(config.erase_chars, vec!['\u{8}', '\u{7f}']);
    }

    #[test]
    fn test_partial_override() {
        let config: ConsoleConfig =
            serde_json::from_str(r#"{"prompt": "$ ", "step_limit": null, "banner": "hi"}"#)
                .unwrap();
        assert_eq!(config.prompt, "$ ");
        assert_eq!(config.continuation_prompt, "... ");
        assert_eq!(config.step_limit, None);
        assert_eq!(config.banner.as_deref(), Some("hi"));
        assert_eq!(config.interpreter_config().step_limit, None);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(serde_json::from_str::<ConsoleConfig>(r#"{"promt": "$ "}"#).is_err());
    }
}
