//! Session Replies
//!
//! Every request produces exactly one [`Reply`]. Its `Display` output is what
//! goes back over the wire.

use std::fmt;

/// What a session answers to one request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A single reply line (it may itself contain newlines, e.g. KEYS).
    Text(String),

    /// The results of EXEC, rendered as `1) ...`, `2) ...` in queue order.
    Batch(Vec<String>),

    /// The client asked to close the connection.
    Stop,
}

impl Reply {
    pub fn text(s: impl Into<String>) -> Self {
        Reply::Text(s.into())
    }

    pub fn ok() -> Self {
        Reply::Text("OK".to_string())
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, Reply::Stop)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Text(s) => f.write_str(s),
            Reply::Batch(results) if results.is_empty() => f.write_str("(empty array)"),
            Reply::Batch(results) => f.write_str(&numbered(results)),
            Reply::Stop => f.write_str("stop"),
        }
    }
}

/// Renders items as a 1-based numbered list, one per line.
///
/// An empty slice renders as `(empty list or set)`.
pub fn numbered<T: fmt::Display>(items: &[T]) -> String {
    if items.is_empty() {
        return "(empty list or set)".to_string();
    }
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}) {}", i + 1, item))
        .collect::<Vec<_>>()
        .join("\n")
}
