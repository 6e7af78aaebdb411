use std::io;
use thiserror::Error;

/// Conditions that end a console session.
///
/// Syntax diagnostics and runtime faults never appear here; they are
/// rendered to the channel and the session continues.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// The peer closed the channel; a clean end of the session.
    #[error("channel closed")]
    ChannelClosed,

    /// Reading from or writing to the channel failed.
    #[error("channel I/O failed: {0}")]
    Io(#[from] io::Error),
}

impl ConsoleError {
    pub fn is_channel_closed(&self) -> bool {
        matches!(self, Self::ChannelClosed)
    }
}

/// Result alias used throughout the console.
pub type ConsoleResult<T> = Result<T, ConsoleError>;
