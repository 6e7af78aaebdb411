//! Prompting and line input over a [`Channel`], with simple erase handling.

use tracing::trace;

use crate::channel::Channel;
use crate::error::{ConsoleError, ConsoleResult};

/// Erase characters used when none are configured: backspace and DEL.
pub const DEFAULT_ERASE_CHARS: [char; 2] = ['\u{8}', '\u{7f}'];

/// Turns raw channel bytes into edited logical lines.
#[derive(Debug, Clone)]
pub struct LineReader {
    erase: Vec<char>,
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new(DEFAULT_ERASE_CHARS)
    }
}

impl LineReader {
    pub fn new(erase: impl IntoIterator<Item = char>) -> Self {
        Self {
            erase: erase.into_iter().collect(),
        }
    }

    /// Write `text` and flush it so the peer sees it before we block.
    pub fn prompt<C: Channel + ?Sized>(&self, channel: &mut C, text: &str) -> ConsoleResult<()> {
        channel.write_all(text.as_bytes())?;
        channel.flush()?;
        Ok(())
    }

    /// Read one line, decoded and edited.
    ///
    /// Fails with [`ConsoleError::ChannelClosed`] when the channel has
    /// nothing more to give.
    pub fn read_line<C: Channel + ?Sized>(&self, channel: &mut C) -> ConsoleResult<String> {
        let raw = channel.read_line()?;
        if raw.is_empty() {
            return Err(ConsoleError::ChannelClosed);
        }
        let line = edit_line(&decode_line(&raw), &self.erase);
        trace!(bytes = raw.len(), line = %line, "line read");
        Ok(line)
    }
}

/// Decode UTF-8 (lossily) and strip one trailing `\n` or `\r\n`.
pub fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Apply erase characters: each one removes the character before it, if
/// there is one.
pub fn edit_line(text: &str, erase: &[char]) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if erase.contains(&ch) {
            out.pop();
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BS: char = '\u{8}';

    #[test]
    fn test_backspace_removes_previous_char() {
        assert_eq!(edit_line("abd\u{8}c", &DEFAULT_ERASE_CHARS), "abc");
    }

    #[test]
    fn test_backspace_on_empty_is_noop() {
        assert_eq!(edit_line("\u{8}\u{8}x", &DEFAULT_ERASE_CHARS), "x");
    }

    #[test]
    fn test_del_also_erases() {
        assert_eq!(edit_line("ab\u{7f}", &DEFAULT_ERASE_CHARS), "a");
    }

    #[test]
    fn test_erase_set_is_configurable() {
        assert_eq!(edit_line("ab\u{7f}", &[BS]), "ab\u{7f}");
    }

    #[test]
    fn test_decode_strips_terminators() {
        assert_eq!(decode_line(b"x = 1\n"), "x = 1");
        assert_eq!(decode_line(b"x = 1\r\n"), "x = 1");
        assert_eq!(decode_line(b"tail"), "tail");
        assert_eq!(decode_line(b"\n"), "");
    }

    #[test]
    fn test_decode_replaces_invalid_utf8() {
        assert_eq!(decode_line(b"a\xffb\n"), "a\u{fffd}b");
    }

    proptest! {
        #[test]
        fn prop_text_without_erase_is_unchanged(text in "[^\u{8}\u{7f}]*") {
            prop_assert_eq!(edit_line(&text, &DEFAULT_ERASE_CHARS), text);
        }

        #[test]
        fn prop_erase_after_char_removes_it(prefix in "[a-z]{0,20}", ch in "[a-z]") {
            let typed = format!("{prefix}{ch}{BS}");
            prop_assert_eq!(edit_line(&typed, &DEFAULT_ERASE_CHARS), prefix);
        }

        #[test]
        fn prop_never_longer_than_input(text in "[a-c\u{8}]{0,40}") {
            let typed = text.chars().filter(|&c| c != BS).count();
            let erased = text.chars().count() - typed;
            let edited = edit_line(&text, &DEFAULT_ERASE_CHARS).chars().count();
            prop_assert!(edited <= typed);
            prop_assert!(edited >= typed.saturating_sub(erased));
        }
    }
}
