//! The duplex byte transport a console is attached to.

use std::io::{self, BufRead, Write};

/// A duplex byte stream: writes go to the peer, lines come from it.
///
/// The console never closes a channel; dropping it is up to the owner.
pub trait Channel: Write {
    /// Read bytes up to and including the next `\n`.
    ///
    /// An empty result means the peer closed the stream. A final line
    /// without a terminator is returned as-is.
    fn read_line(&mut self) -> io::Result<Vec<u8>>;
}

impl<C: Channel + ?Sized> Channel for &mut C {
    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        (**self).read_line()
    }
}

/// A channel assembled from a buffered reader and a writer: stdio, the two
/// halves of a TCP stream, or in-memory buffers.
#[derive(Debug)]
pub struct Terminal<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> Terminal<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl<R: BufRead, W: Write> Write for Terminal<R, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl<R: BufRead, W: Write> Channel for Terminal<R, W> {
    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        let mut line = Vec::new();
        self.reader.read_until(b'\n', &mut line)?;
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_reads_lines_then_empty() {
        let mut terminal = Terminal::new(&b"one\ntwo"[..], Vec::new());
        assert_eq!(terminal.read_line().unwrap(), b"one\n");
        assert_eq!(terminal.read_line().unwrap(), b"two");
        assert!(terminal.read_line().unwrap().is_empty());
    }

    #[test]
    fn test_terminal_writes_to_writer() {
        let mut terminal = Terminal::new(&b""[..], Vec::new());
        terminal.write_all(b">>> ").unwrap();
        assert_eq!(terminal.writer(), b">>> ");
    }
}
