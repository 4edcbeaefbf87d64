//! Command Module
//!
//! One handler type per command, all behind the [`CommandParser`] trait and
//! handed out by the [`CommandRegistry`]. A handler receives the request's
//! tokens (the command name at index 0), checks arity and numeric arguments,
//! runs against the [`StorageEngine`] and returns the reply text.
//!
//! ```text
//! Session
//!    │  tokens
//!    ▼
//! ┌──────────────────┐   first use: construct + cache
//! │ CommandRegistry  │──────────────────────────────┐
//! └────────┬─────────┘                              │
//!          │ Arc<dyn CommandParser>                 ▼
//!          ▼                               ┌────────────────┐
//! ┌──────────────────┐                     │ handler cache  │
//! │  SetCommand ...  │                     └────────────────┘
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │  StorageEngine   │
//! └──────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! ### Server
//! - `SELECT index`, `DBSIZE`
//!
//! ### Keys
//! - `KEYS pattern`, `EXISTS key [key ...]`, `DEL key [key ...]`, `RENAME key newkey`
//!
//! ### Strings
//! - `SET`, `SETNX`, `SETEX`, `GET`, `MSET`, `MGET`, `STRLEN`, `APPEND`
//! - `INCR`, `INCRBY`, `INCRBYFLOAT`, `DECR`, `DECRBY`
//!
//! ### Lists
//! - `LPUSH`, `RPUSH`, `LPOP`, `RPOP`, `LRANGE`
//!
//! ### Hashes
//! - `HSET`, `HGET`, `HDEL`, `HKEYS`, `HVALS`

pub mod hash;
pub mod keys;
pub mod list;
pub mod registry;
pub mod server;
pub mod string;

pub use registry::{CommandRegistry, COMMANDS};

use crate::storage::StorageError;
use std::fmt;
use thiserror::Error;

/// Per-session state a handler may read or change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandContext {
    /// Database selected with SELECT.
    pub db: usize,
}

/// Errors a handler can return.
///
/// Validation errors are shown to the client as-is; storage faults are
/// wrapped with the command name by the session.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),

    #[error("{0} is not a numeric type")]
    NotNumeric(String),

    #[error("(error) ERR {0}")]
    Invalid(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type CommandResult = Result<String, CommandError>;

/// A command implementation.
///
/// Handlers are stateless apart from their shared engine handle, so one
/// instance serves every session.
pub trait CommandParser: Send + Sync {
    /// Upper-case command name this handler answers to.
    fn name(&self) -> &'static str;

    /// Runs the command. `tokens[0]` is the command name.
    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult;
}

impl fmt::Debug for dyn CommandParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandParser({})", self.name())
    }
}

/// Token count a command accepts, counting the command name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    /// `leading` tokens followed by one or more pairs.
    KeyValuePairs { leading: usize },
}

impl Arity {
    pub fn check(self, name: &'static str, tokens: &[String]) -> Result<(), CommandError> {
        let n = tokens.len();
        let ok = match self {
            Arity::Exact(expected) => n == expected,
            Arity::AtLeast(min) => n >= min,
            Arity::KeyValuePairs { leading } => n >= leading + 2 && (n - leading) % 2 == 0,
        };
        if ok {
            Ok(())
        } else {
            Err(CommandError::WrongArity(name))
        }
    }
}

pub(crate) fn parse_int(token: &str) -> Result<i64, CommandError> {
    token
        .parse()
        .map_err(|_| CommandError::NotNumeric(token.to_string()))
}

pub(crate) fn parse_float(token: &str) -> Result<f64, CommandError> {
    match token.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(CommandError::NotNumeric(token.to_string())),
    }
}

pub(crate) const NIL: &str = "(nil)";

pub(crate) fn integer(n: impl fmt::Display) -> String {
    format!("(integer) {}", n)
}

/// Splits `[k1, v1, k2, v2, ..]` into owned pairs.
pub(crate) fn pairs(tokens: &[String]) -> Vec<(String, String)> {
    tokens
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect()
}

/// Declares handler types that only hold the shared engine.
macro_rules! parsers {
    ($($ty:ident => $name:literal),* $(,)?) => {
        $(
            #[derive(Debug)]
            pub struct $ty {
                storage: ::std::sync::Arc<$crate::storage::StorageEngine>,
            }

            impl $ty {
                pub const NAME: &'static str = $name;

                pub fn new(storage: ::std::sync::Arc<$crate::storage::StorageEngine>) -> Self {
                    Self { storage }
                }
            }
        )*
    };
}
pub(crate) use parsers;

#[cfg(test)]
pub(crate) mod test_support {
    use super::{CommandContext, CommandParser, CommandResult};

    pub fn run(parser: &dyn CommandParser, ctx: &mut CommandContext, line: &str) -> CommandResult {
        let tokens = crate::protocol::tokenize(line);
        parser.parse(ctx, &tokens)
    }
}
