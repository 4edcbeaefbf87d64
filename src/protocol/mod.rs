//! Line Protocol Implementation
//!
//! Clients talk to SkipKV one line at a time:
//!
//! ```text
//! client ──>  SET greeting hello\n
//! server <──  OK\n
//! client ──>  GET greeting\n
//! server <──  hello\n
//! ```
//!
//! A request is a single line of whitespace-separated tokens; token 0 is the
//! command name. A reply is the session's text, written back verbatim and
//! terminated with `\n`. EXEC replies span several lines.
//!
//! ## Modules
//!
//! - `line`: incremental line framing and tokenizing
//! - `reply`: the `Reply` type and its text rendering
//!
//! ## Example
//!
//! ```
//! use skipkv::protocol::{parse_line, tokenize};
//!
//! let (line, consumed) = parse_line(b"SET name skip\r\nGET").unwrap().unwrap();
//! assert_eq!(line, "SET name skip");
//! assert_eq!(consumed, 15);
//! assert_eq!(tokenize(&line), vec!["SET", "name", "skip"]);
//! ```

pub mod line;
pub mod reply;

// Re-export commonly used types for convenience
pub use line::{parse_line, tokenize, LineError, LineResult, MAX_LINE_LENGTH};
pub use reply::{numbered, Reply};
