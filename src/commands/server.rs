//! Server commands: `SELECT`, `DBSIZE`.

use super::{integer, parse_int, parsers, Arity, CommandContext, CommandError, CommandParser, CommandResult};

parsers! {
    SelectCommand => "SELECT",
    DbSizeCommand => "DBSIZE",
}

impl CommandParser for SelectCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    /// Switches the session's database. Other sessions are unaffected.
    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::Exact(2).check(Self::NAME, tokens)?;
        let index = parse_int(&tokens[1])?;

        let db = usize::try_from(index)
            .ok()
            .filter(|&db| self.storage.select(db).is_ok())
            .ok_or_else(|| CommandError::Invalid("DB index is out of range".to_string()))?;

        ctx.db = db;
        Ok("OK".to_string())
    }
}

impl CommandParser for DbSizeCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::Exact(1).check(Self::NAME, tokens)?;
        Ok(integer(self.storage.dbsize(ctx.db)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::run;
    use crate::storage::StorageEngine;
    use std::sync::Arc;

    #[test]
    fn test_select() {
        let storage = Arc::new(StorageEngine::with_databases(4));
        let select = SelectCommand::new(storage);
        let mut ctx = CommandContext::default();

        assert_eq!(run(&select, &mut ctx, "SELECT 3").unwrap(), "OK");
        assert_eq!(ctx.db, 3);
    }

    #[test]
    fn test_select_rejects_bad_index() {
        let storage = Arc::new(StorageEngine::with_databases(4));
        let select = SelectCommand::new(storage);
        let mut ctx = CommandContext { db: 1 };

        let err = run(&select, &mut ctx, "SELECT abc").unwrap_err();
        assert_eq!(err.to_string(), "abc is not a numeric type");

        let err = run(&select, &mut ctx, "SELECT 4").unwrap_err();
        assert_eq!(err.to_string(), "(error) ERR DB index is out of range");
        assert!(run(&select, &mut ctx, "SELECT -1").is_err());
        assert!(run(&select, &mut ctx, "SELECT").is_err());

        // Failed selects leave the session where it was.
        assert_eq!(ctx.db, 1);
    }

    #[test]
    fn test_dbsize_is_per_database() {
        let storage = Arc::new(StorageEngine::new());
        storage.set(0, "a".into(), "1".into()).unwrap();
        storage.set(0, "b".into(), "2".into()).unwrap();
        storage.set(5, "c".into(), "3".into()).unwrap();

        let dbsize = DbSizeCommand::new(storage);
        let mut ctx = CommandContext::default();
        assert_eq!(run(&dbsize, &mut ctx, "DBSIZE").unwrap(), "(integer) 2");

        ctx.db = 5;
        assert_eq!(run(&dbsize, &mut ctx, "DBSIZE").unwrap(), "(integer) 1");
    }
}
