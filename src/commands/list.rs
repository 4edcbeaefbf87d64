//! List commands: `LPUSH`, `RPUSH`, `LPOP`, `RPOP`, `LRANGE`.

use super::{integer, parse_int, parsers, Arity, CommandContext, CommandParser, CommandResult, NIL};
use crate::protocol::numbered;

parsers! {
    LPushCommand => "LPUSH",
    RPushCommand => "RPUSH",
    LPopCommand => "LPOP",
    RPopCommand => "RPOP",
    LRangeCommand => "LRANGE",
}

impl CommandParser for LPushCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::AtLeast(3).check(Self::NAME, tokens)?;
        let len = self
            .storage
            .lpush(ctx.db, tokens[1].clone(), tokens[2..].to_vec())?;
        Ok(integer(len))
    }
}

impl CommandParser for RPushCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::AtLeast(3).check(Self::NAME, tokens)?;
        let len = self
            .storage
            .rpush(ctx.db, tokens[1].clone(), tokens[2..].to_vec())?;
        Ok(integer(len))
    }
}

impl CommandParser for LPopCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::Exact(2).check(Self::NAME, tokens)?;
        Ok(self
            .storage
            .lpop(ctx.db, &tokens[1])?
            .unwrap_or_else(|| NIL.to_string()))
    }
}

impl CommandParser for RPopCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::Exact(2).check(Self::NAME, tokens)?;
        Ok(self
            .storage
            .rpop(ctx.db, &tokens[1])?
            .unwrap_or_else(|| NIL.to_string()))
    }
}

impl CommandParser for LRangeCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    /// `LRANGE key start stop`, both ends inclusive, negatives from the tail.
    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::Exact(4).check(Self::NAME, tokens)?;
        let start = parse_int(&tokens[2])?;
        let stop = parse_int(&tokens[3])?;
        let items = self.storage.lrange(ctx.db, &tokens[1], start, stop)?;
        Ok(numbered(&items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::run;
    use crate::commands::CommandError;
    use crate::storage::{StorageEngine, StorageError};
    use std::sync::Arc;

    #[test]
    fn test_push_pop() {
        let storage = Arc::new(StorageEngine::new());
        let mut ctx = CommandContext::default();
        let lpush = LPushCommand::new(Arc::clone(&storage));
        let rpush = RPushCommand::new(Arc::clone(&storage));
        let lpop = LPopCommand::new(Arc::clone(&storage));
        let rpop = RPopCommand::new(Arc::clone(&storage));

        assert_eq!(run(&lpush, &mut ctx, "LPUSH l b a").unwrap(), "(integer) 2");
        assert_eq!(run(&rpush, &mut ctx, "RPUSH l c").unwrap(), "(integer) 3");
        assert_eq!(run(&lpop, &mut ctx, "LPOP l").unwrap(), "a");
        assert_eq!(run(&rpop, &mut ctx, "RPOP l").unwrap(), "c");
        assert_eq!(run(&rpop, &mut ctx, "RPOP l").unwrap(), "b");
        assert_eq!(run(&lpop, &mut ctx, "LPOP l").unwrap(), "(nil)");
        assert!(!storage.exists(0, "l").unwrap());
        assert!(run(&lpush, &mut ctx, "LPUSH l").is_err());
    }

    #[test]
    fn test_lrange() {
        let storage = Arc::new(StorageEngine::new());
        let mut ctx = CommandContext::default();
        storage
            .rpush(0, "l".into(), vec!["a".into(), "b".into(), "c".into()])
            .unwrap();
        let lrange = LRangeCommand::new(storage);

        assert_eq!(run(&lrange, &mut ctx, "LRANGE l 0 -1").unwrap(), "1) a\n2) b\n3) c");
        assert_eq!(run(&lrange, &mut ctx, "LRANGE l -2 -1").unwrap(), "1) b\n2) c");
        assert_eq!(run(&lrange, &mut ctx, "LRANGE l 5 10").unwrap(), "(empty list or set)");
        assert_eq!(run(&lrange, &mut ctx, "LRANGE nope 0 -1").unwrap(), "(empty list or set)");
        assert_eq!(
            run(&lrange, &mut ctx, "LRANGE l x 1").unwrap_err().to_string(),
            "x is not a numeric type"
        );
    }

    #[test]
    fn test_lrange_extreme_indices() {
        let storage = Arc::new(StorageEngine::new());
        let mut ctx = CommandContext::default();
        storage
            .rpush(0, "l".into(), vec!["a".into(), "b".into()])
            .unwrap();
        let lrange = LRangeCommand::new(storage);

        assert_eq!(
            run(&lrange, &mut ctx, "LRANGE l -9223372036854775808 9223372036854775807").unwrap(),
            "1) a\n2) b"
        );
        assert_eq!(
            run(&lrange, &mut ctx, "LRANGE l 9223372036854775807 -9223372036854775808").unwrap(),
            "(empty list or set)"
        );
        assert_eq!(
            run(&lrange, &mut ctx, "LRANGE l 0 -9223372036854775808").unwrap(),
            "(empty list or set)"
        );
        assert_eq!(
            run(&lrange, &mut ctx, "LRANGE l 0 99999999999999999999").unwrap_err().to_string(),
            "99999999999999999999 is not a numeric type"
        );
    }

    #[test]
    fn test_wrong_type() {
        let storage = Arc::new(StorageEngine::new());
        let mut ctx = CommandContext::default();
        storage.set(0, "s".into(), "v".into()).unwrap();
        let lpush = LPushCommand::new(storage);

        assert_eq!(
            run(&lpush, &mut ctx, "LPUSH s x"),
            Err(CommandError::Storage(StorageError::WrongType))
        );
    }
}
