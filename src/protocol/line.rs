//! Line Framing
//!
//! TCP is a byte stream, so a read may end in the middle of a request or
//! carry several requests at once. [`parse_line`] looks for the next `\n` in
//! the connection buffer and returns:
//!
//! - `Ok(Some((line, consumed)))` - a complete line; advance the buffer by `consumed`
//! - `Ok(None)` - no newline yet, read more
//! - `Err(LineError)` - the client sent more than we are willing to buffer
//!
//! Keys and values are opaque to the framing: bytes that are not valid UTF-8
//! become U+FFFD instead of ending the connection.

use thiserror::Error;

/// Longest request line we are willing to buffer (64 KB).
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Errors that can occur while framing request lines.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LineError {
    /// No newline within the size limit
    #[error("line too long: {size} bytes (max: {max})")]
    TooLong { size: usize, max: usize },
}

/// Result type for framing operations.
pub type LineResult<T> = Result<T, LineError>;

/// Extracts the next line from `buf`.
///
/// The trailing `\n` (and a `\r` before it) are stripped from the returned
/// line but counted in `consumed`.
pub fn parse_line(buf: &[u8]) -> LineResult<Option<(String, usize)>> {
    let newline = match buf.iter().position(|&b| b == b'\n') {
        Some(pos) => pos,
        None if buf.len() > MAX_LINE_LENGTH => {
            return Err(LineError::TooLong {
                size: buf.len(),
                max: MAX_LINE_LENGTH,
            })
        }
        None => return Ok(None),
    };

    if newline > MAX_LINE_LENGTH {
        return Err(LineError::TooLong {
            size: newline,
            max: MAX_LINE_LENGTH,
        });
    }

    let mut content = &buf[..newline];
    if let Some((&b'\r', rest)) = content.split_last() {
        content = rest;
    }

    let line = String::from_utf8_lossy(content).into_owned();

    Ok(Some((line, newline + 1)))
}

/// Splits a request into whitespace-separated tokens.
///
/// Token 0 is the command name. Runs of whitespace collapse, so the result
/// is empty for a blank line.
pub fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_owned).collect()
}
