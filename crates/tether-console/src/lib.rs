//! Tether console: a read-evaluate-print loop over a duplex byte channel.
//!
//! A [`Console`] prompts through its [`Channel`], collects lines until they
//! form a complete unit, evaluates that unit against one persistent
//! interpreter, and writes the rendered result, traceback or syntax
//! diagnostic back. Malformed input and runtime faults never end the
//! session; a closed channel or an `exit()` call does.

mod channel;
mod config;
mod console;
mod error;
mod line_reader;
mod render;

pub use channel::{Channel, Terminal};
pub use config::ConsoleConfig;
pub use console::{Console, SessionEnd};
pub use error::{ConsoleError, ConsoleResult};
pub use line_reader::{decode_line, edit_line, LineReader, DEFAULT_ERASE_CHARS};
pub use render::{render_value, EvaluationOutcome};
