//! Hash commands: `HSET`, `HGET`, `HDEL`, `HKEYS`, `HVALS`.

use super::{integer, pairs, parsers, Arity, CommandContext, CommandParser, CommandResult, NIL};
use crate::protocol::numbered;

parsers! {
    HSetCommand => "HSET",
    HGetCommand => "HGET",
    HDelCommand => "HDEL",
    HKeysCommand => "HKEYS",
    HValsCommand => "HVALS",
}

impl CommandParser for HSetCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    /// `HSET key field value [field value ...]`, replies with fields added.
    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::KeyValuePairs { leading: 2 }.check(Self::NAME, tokens)?;
        let added = self
            .storage
            .hset(ctx.db, tokens[1].clone(), pairs(&tokens[2..]))?;
        Ok(integer(added))
    }
}

impl CommandParser for HGetCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::Exact(3).check(Self::NAME, tokens)?;
        Ok(self
            .storage
            .hget(ctx.db, &tokens[1], &tokens[2])?
            .unwrap_or_else(|| NIL.to_string()))
    }
}

impl CommandParser for HDelCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::AtLeast(3).check(Self::NAME, tokens)?;
        Ok(integer(self.storage.hdel(ctx.db, &tokens[1], &tokens[2..])?))
    }
}

impl CommandParser for HKeysCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::Exact(2).check(Self::NAME, tokens)?;
        Ok(numbered(&self.storage.hkeys(ctx.db, &tokens[1])?))
    }
}

impl CommandParser for HValsCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::Exact(2).check(Self::NAME, tokens)?;
        Ok(numbered(&self.storage.hvals(ctx.db, &tokens[1])?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::run;
    use crate::storage::StorageEngine;
    use std::sync::Arc;

    #[test]
    fn test_hash_commands() {
        let storage = Arc::new(StorageEngine::new());
        let mut ctx = CommandContext::default();
        let hset = HSetCommand::new(Arc::clone(&storage));
        let hget = HGetCommand::new(Arc::clone(&storage));
        let hdel = HDelCommand::new(Arc::clone(&storage));
        let hkeys = HKeysCommand::new(Arc::clone(&storage));
        let hvals = HValsCommand::new(Arc::clone(&storage));

        assert_eq!(run(&hset, &mut ctx, "HSET user name ann age 30").unwrap(), "(integer) 2");
        assert_eq!(run(&hset, &mut ctx, "HSET user age 31").unwrap(), "(integer) 0");
        assert_eq!(run(&hget, &mut ctx, "HGET user age").unwrap(), "31");
        assert_eq!(run(&hget, &mut ctx, "HGET user email").unwrap(), "(nil)");
        assert_eq!(run(&hkeys, &mut ctx, "HKEYS user").unwrap(), "1) age\n2) name");
        assert_eq!(run(&hvals, &mut ctx, "HVALS user").unwrap(), "1) 31\n2) ann");

        assert_eq!(run(&hdel, &mut ctx, "HDEL user age email").unwrap(), "(integer) 1");
        assert_eq!(run(&hdel, &mut ctx, "HDEL user name").unwrap(), "(integer) 1");
        assert!(!storage.exists(0, "user").unwrap());
        assert_eq!(run(&hkeys, &mut ctx, "HKEYS user").unwrap(), "(empty list or set)");
    }

    #[test]
    fn test_hset_arity() {
        let storage = Arc::new(StorageEngine::new());
        let mut ctx = CommandContext::default();
        let hset = HSetCommand::new(storage);

        assert_eq!(
            run(&hset, &mut ctx, "HSET user name").unwrap_err().to_string(),
            "wrong number of arguments for 'HSET' command"
        );
    }
}
