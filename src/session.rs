//! Session Engine
//!
//! One [`Session`] per client. It tokenizes each request line and either runs
//! it right away or, between `multi` and `exec`, queues the raw line for later.
//!
//! ```text
//!            multi                      exec / discard
//!   ┌──────┐ ─────────────> ┌────────────┐ ─────────────> ┌──────┐
//!   │ Idle │                │ Collecting │                │ Idle │
//!   └──────┘ <───────────── └────────────┘                └──────┘
//!                                 │ ▲
//!                     known cmd   │ │  QUEUED
//!                                 └─┘
//! ```
//!
//! An unknown command while collecting does not get queued. It marks the
//! transaction so that the next `exec` throws the whole queue away.

use crate::commands::{CommandContext, CommandError, CommandRegistry};
use crate::protocol::{tokenize, Reply};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

const EXEC_ABORT: &str = "(error) EXECABORT Transaction discarded because of previous errors.";
const ALREADY_OPEN: &str = "(error) ERR transaction already open";
const NOT_OPEN: &str = "(error) ERR no transaction is opened";

/// Per-connection transaction state and database selection.
#[derive(Debug)]
pub struct Session {
    registry: Arc<CommandRegistry>,
    context: CommandContext,
    transaction_open: bool,
    abort_pending: bool,
    pending: VecDeque<String>,
}

impl Session {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self {
            registry,
            context: CommandContext::default(),
            transaction_open: false,
            abort_pending: false,
            pending: VecDeque::new(),
        }
    }

    /// Handles one raw request line and returns the reply.
    pub fn handle(&mut self, raw: &str) -> Reply {
        if raw.is_empty() {
            return Reply::text("nil");
        }

        let tokens = tokenize(raw);
        let Some(name) = tokens.first() else {
            return Reply::text("error");
        };

        match name.as_str() {
            "quit" | "exit" => Reply::Stop,
            "multi" => self.multi(),
            "exec" => self.exec(),
            "discard" => self.discard(),
            _ if self.transaction_open => self.enqueue(raw, name),
            _ => Reply::Text(self.run(&tokens)),
        }
    }

    fn multi(&mut self) -> Reply {
        if self.transaction_open {
            return Reply::text(ALREADY_OPEN);
        }
        self.transaction_open = true;
        self.abort_pending = false;
        self.pending.clear();
        debug!("Transaction opened");
        Reply::ok()
    }

    fn enqueue(&mut self, raw: &str, name: &str) -> Reply {
        if self.registry.get_handler(name).is_none() {
            self.abort_pending = true;
            debug!(command = name, "Unknown command while queuing, transaction will abort");
            return Reply::Text(not_recognized(name));
        }
        self.pending.push_back(raw.to_string());
        Reply::text("QUEUED")
    }

    fn exec(&mut self) -> Reply {
        if !self.transaction_open {
            return Reply::text(NOT_OPEN);
        }
        self.transaction_open = false;

        if self.abort_pending {
            self.abort_pending = false;
            let dropped = self.pending.len();
            self.pending.clear();
            debug!(dropped, "Transaction aborted");
            return Reply::text(EXEC_ABORT);
        }

        let queued = std::mem::take(&mut self.pending);
        debug!(commands = queued.len(), "Executing transaction");

        let results = queued
            .iter()
            .map(|line| self.run(&tokenize(line)))
            .collect();
        Reply::Batch(results)
    }

    fn discard(&mut self) -> Reply {
        if !self.transaction_open {
            return Reply::text(NOT_OPEN);
        }
        self.transaction_open = false;
        self.abort_pending = false;
        self.pending.clear();
        debug!("Transaction discarded");
        Reply::ok()
    }

    /// Dispatches one command immediately. Every failure becomes reply text.
    fn run(&mut self, tokens: &[String]) -> String {
        let Some(name) = tokens.first() else {
            return "error".to_string();
        };
        let Some(handler) = self.registry.get_handler(name) else {
            return not_recognized(name);
        };

        match handler.parse(&mut self.context, tokens) {
            Ok(reply) => reply,
            Err(CommandError::Storage(e)) => {
                debug!(command = %name, db = self.context.db, error = %e, "Command failed");
                format!("Error processing command '{}': {}", name, e)
            }
            Err(e) => e.to_string(),
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction_open
    }

    /// Number of commands waiting for `exec`.
    pub fn queued(&self) -> usize {
        self.pending.len()
    }

    pub fn selected_db(&self) -> usize {
        self.context.db
    }
}

fn not_recognized(name: &str) -> String {
    format!("Error: Command '{}' not recognized.", name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageEngine;

    fn session() -> Session {
        let storage = Arc::new(StorageEngine::new());
        Session::new(Arc::new(CommandRegistry::new(storage)))
    }

    fn text(session: &mut Session, line: &str) -> String {
        session.handle(line).to_string()
    }

    #[test]
    fn test_immediate_commands() {
        let mut s = session();
        assert_eq!(text(&mut s, "SET a 1"), "OK");
        assert_eq!(text(&mut s, "GET a"), "1");
        assert_eq!(text(&mut s, "INCR a"), "(integer) 2");
    }

    #[test]
    fn test_empty_and_blank_input() {
        let mut s = session();
        assert_eq!(text(&mut s, ""), "nil");
        assert_eq!(text(&mut s, "   "), "error");
    }

    #[test]
    fn test_unknown_command() {
        let mut s = session();
        assert_eq!(text(&mut s, "FOO bar"), "Error: Command 'FOO' not recognized.");
        // Names are case-sensitive.
        assert_eq!(text(&mut s, "get a"), "Error: Command 'get' not recognized.");
    }

    #[test]
    fn test_quit_and_exit() {
        let mut s = session();
        assert!(s.handle("quit").is_stop());
        assert!(s.handle("exit").is_stop());
        assert_eq!(text(&mut s, "quit"), "stop");
    }

    #[test]
    fn test_successful_transaction() {
        let mut s = session();
        assert_eq!(text(&mut s, "multi"), "OK");
        assert!(s.in_transaction());
        assert_eq!(text(&mut s, "SET a 1"), "QUEUED");
        assert_eq!(text(&mut s, "INCR a"), "QUEUED");
        assert_eq!(s.queued(), 2);

        assert_eq!(text(&mut s, "exec"), "1) OK\n2) (integer) 2");
        assert!(!s.in_transaction());
        assert_eq!(s.queued(), 0);
        assert_eq!(text(&mut s, "GET a"), "2");
    }

    #[test]
    fn test_queued_commands_do_not_run_before_exec() {
        let mut s = session();
        text(&mut s, "multi");
        text(&mut s, "SET a 1");
        text(&mut s, "discard");
        assert_eq!(text(&mut s, "GET a"), "key not found");
    }

    #[test]
    fn test_unknown_command_aborts_transaction() {
        let mut s = session();
        text(&mut s, "multi");
        assert_eq!(text(&mut s, "SET a 1"), "QUEUED");
        assert_eq!(text(&mut s, "BOGUS x"), "Error: Command 'BOGUS' not recognized.");
        assert_eq!(s.queued(), 1);

        assert_eq!(text(&mut s, "exec"), EXEC_ABORT);
        assert!(!s.in_transaction());
        assert_eq!(text(&mut s, "GET a"), "key not found");

        // The abort does not carry over into the next transaction.
        text(&mut s, "multi");
        text(&mut s, "SET a 1");
        assert_eq!(text(&mut s, "exec"), "1) OK");
    }

    #[test]
    fn test_failing_command_does_not_abort_the_rest() {
        let mut s = session();
        text(&mut s, "SET word hello");
        text(&mut s, "multi");
        text(&mut s, "INCR word");
        text(&mut s, "SET");
        text(&mut s, "SET b 2");

        assert_eq!(
            text(&mut s, "exec"),
            "1) Error processing command 'INCR': value is not an integer or out of range\n\
             2) wrong number of arguments for 'SET' command\n\
             3) OK"
        );
        assert_eq!(text(&mut s, "GET b"), "2");
    }

    #[test]
    fn test_setex_past_clock_range_is_an_error() {
        let mut s = session();
        assert_eq!(
            text(&mut s, "SETEX k 9223372036854775807 v"),
            "(error) ERR invalid expire time in 'SETEX' command"
        );

        text(&mut s, "multi");
        text(&mut s, "SETEX k 9223372036854775807 v");
        text(&mut s, "SET k v");
        assert_eq!(
            text(&mut s, "exec"),
            "1) (error) ERR invalid expire time in 'SETEX' command\n2) OK"
        );
        assert_eq!(text(&mut s, "GET k"), "v");
    }

    #[test]
    fn test_exec_empty_queue() {
        let mut s = session();
        text(&mut s, "multi");
        assert_eq!(text(&mut s, "exec"), "(empty array)");
    }

    #[test]
    fn test_transaction_protocol_errors() {
        let mut s = session();
        assert_eq!(text(&mut s, "exec"), NOT_OPEN);
        assert_eq!(text(&mut s, "discard"), NOT_OPEN);

        text(&mut s, "multi");
        text(&mut s, "SET a 1");
        assert_eq!(text(&mut s, "multi"), ALREADY_OPEN);
        // The nested multi left the queue alone.
        assert_eq!(s.queued(), 1);
    }

    #[test]
    fn test_discard_is_idempotent() {
        let mut s = session();
        text(&mut s, "multi");
        text(&mut s, "SET a 1");
        text(&mut s, "BOGUS");
        assert_eq!(text(&mut s, "discard"), "OK");
        assert_eq!(text(&mut s, "discard"), NOT_OPEN);
        assert_eq!(s.queued(), 0);
        assert!(!s.in_transaction());

        // Abort flag was cleared too.
        text(&mut s, "multi");
        text(&mut s, "SET a 1");
        assert_eq!(text(&mut s, "exec"), "1) OK");
    }

    #[test]
    fn test_select_is_per_session() {
        let storage = Arc::new(StorageEngine::new());
        let registry = Arc::new(CommandRegistry::new(storage));
        let mut first = Session::new(Arc::clone(&registry));
        let mut second = Session::new(registry);

        assert_eq!(text(&mut first, "SELECT 3"), "OK");
        assert_eq!(first.selected_db(), 3);
        assert_eq!(text(&mut first, "SET k v"), "OK");

        assert_eq!(second.selected_db(), 0);
        assert_eq!(text(&mut second, "GET k"), "key not found");
        assert_eq!(text(&mut second, "SELECT abc"), "abc is not a numeric type");
    }

    #[test]
    fn test_select_inside_transaction() {
        let mut s = session();
        text(&mut s, "multi");
        text(&mut s, "SELECT 2");
        text(&mut s, "SET k v");
        assert_eq!(text(&mut s, "exec"), "1) OK\n2) OK");
        assert_eq!(s.selected_db(), 2);
        assert_eq!(text(&mut s, "DBSIZE"), "(integer) 1");
    }

    #[test]
    fn test_quit_inside_transaction() {
        let mut s = session();
        text(&mut s, "multi");
        assert!(s.handle("quit").is_stop());
    }
}
