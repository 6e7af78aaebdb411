//! The evaluation console: collect lines into a unit, classify it, run
//! it, and write what happened back to the channel.

use tether_eval::{EvalError, Interpreter};
use tether_parser::{classify, Classification};
use tether_types::SourceFile;
use tracing::{debug, info};

use crate::channel::Channel;
use crate::config::ConsoleConfig;
use crate::error::{ConsoleError, ConsoleResult};
use crate::line_reader::LineReader;
use crate::render::{render_value, EvaluationOutcome};

/// How a session ended. Both are normal ends, not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer closed the channel.
    ChannelClosed,
    /// Evaluated code called `exit`/`quit` with this code.
    Exited(i32),
}

/// One console serving one channel.
pub struct Console<C: Channel> {
    channel: C,
    reader: LineReader,
    interp: Interpreter,
    /// Lines of the unit being collected.
    pending: Vec<String>,
    config: ConsoleConfig,
}

impl<C: Channel> Console<C> {
    pub fn new(channel: C, config: ConsoleConfig) -> Self {
        Self {
            channel,
            reader: LineReader::new(config.erase_chars.iter().copied()),
            interp: Interpreter::new(config.interpreter_config()),
            pending: Vec::new(),
            config,
        }
    }

    /// The interpreter, for registering host builtins before [`run`](Self::run).
    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        &mut self.interp
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interp
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn into_channel(self) -> C {
        self.channel
    }

    /// Lines buffered for the unit being collected.
    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    /// The prompt to show next.
    pub fn current_prompt(&self) -> &str {
        if self.pending.is_empty() {
            &self.config.prompt
        } else {
            &self.config.continuation_prompt
        }
    }

    /// Serve the channel until it closes or evaluated code exits.
    ///
    /// Only channel I/O failures come back as errors.
    pub fn run(&mut self) -> ConsoleResult<SessionEnd> {
        info!(file = %self.config.filename, "console session started");
        if let Some(banner) = &self.config.banner {
            writeln!(self.channel, "{banner}")?;
        }
        let end = loop {
            let prompt = self.current_prompt().to_string();
            self.reader.prompt(&mut self.channel, &prompt)?;
            let line = match self.reader.read_line(&mut self.channel) {
                Ok(line) => line,
                Err(ConsoleError::ChannelClosed) => break SessionEnd::ChannelClosed,
                Err(err) => return Err(err),
            };
            if let EvaluationOutcome::SessionTerminated(code) = self.push_line(line)? {
                break SessionEnd::Exited(code);
            }
        };
        info!(?end, "console session ended");
        Ok(end)
    }

    /// Add one line to the pending unit and try to evaluate it.
    ///
    /// The outcome has already been written to the channel when this
    /// returns. The buffer is kept only for [`EvaluationOutcome::NeedMoreInput`].
    pub fn push_line(&mut self, line: String) -> ConsoleResult<EvaluationOutcome> {
        self.pending.push(line);
        let source = SourceFile::new(self.config.filename.clone(), self.pending.join("\n"));
        let outcome = self.evaluate(&source);
        if outcome != EvaluationOutcome::NeedMoreInput {
            self.pending.clear();
        }
        debug!(pending = self.pending.len(), ?outcome, "line handled");
        if let Some(text) = outcome.output() {
            self.channel.write_all(text.as_bytes())?;
        }
        self.channel.flush()?;
        Ok(outcome)
    }

    fn evaluate(&mut self, source: &SourceFile) -> EvaluationOutcome {
        let result = match classify(source) {
            Classification::Incomplete => return EvaluationOutcome::NeedMoreInput,
            Classification::Malformed(diag) => return EvaluationOutcome::SyntaxError(diag.render()),
            Classification::Expression(expr) => self
                .interp
                .eval_expression(&expr, &mut self.channel)
                .and_then(|value| render_value(&value)),
            Classification::Statement(stmts) => self
                .interp
                .exec_statements(&stmts, &mut self.channel)
                .map(|()| None),
        };
        match result {
            Ok(Some(text)) => EvaluationOutcome::Value(text),
            Ok(None) => EvaluationOutcome::Suppressed,
            Err(EvalError::Exit(code)) => EvaluationOutcome::SessionTerminated(code),
            Err(EvalError::Fault(fault)) => EvaluationOutcome::RecoverableError(fault.render()),
        }
    }
}
