//! String commands.
//!
//! `SET`, `SETNX`, `SETEX`, `GET`, `MSET`, `MGET`, `STRLEN`, `APPEND` and the
//! counter family `INCR`, `INCRBY`, `INCRBYFLOAT`, `DECR`, `DECRBY`.

use super::{
    integer, pairs, parse_float, parse_int, parsers, Arity, CommandContext, CommandError,
    CommandParser, CommandResult, NIL,
};
use crate::protocol::numbered;
use crate::storage::StorageError;
use std::time::Duration;

parsers! {
    SetCommand => "SET",
    SetNxCommand => "SETNX",
    SetExCommand => "SETEX",
    GetCommand => "GET",
    IncrCommand => "INCR",
    IncrByCommand => "INCRBY",
    IncrByFloatCommand => "INCRBYFLOAT",
    DecrCommand => "DECR",
    DecrByCommand => "DECRBY",
    MSetCommand => "MSET",
    MGetCommand => "MGET",
    StrLenCommand => "STRLEN",
    AppendCommand => "APPEND",
}

impl CommandParser for SetCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::Exact(3).check(Self::NAME, tokens)?;
        self.storage
            .set(ctx.db, tokens[1].clone(), tokens[2].clone())?;
        Ok("OK".to_string())
    }
}

impl CommandParser for SetNxCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::Exact(3).check(Self::NAME, tokens)?;
        let created = self
            .storage
            .set_nx(ctx.db, tokens[1].clone(), tokens[2].clone())?;
        Ok(integer(u8::from(created)))
    }
}

impl CommandParser for SetExCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    /// `SETEX key seconds value`
    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::Exact(4).check(Self::NAME, tokens)?;
        let invalid = || CommandError::Invalid("invalid expire time in 'SETEX' command".to_string());

        let seconds = parse_int(&tokens[2])?;
        let seconds = u64::try_from(seconds)
            .ok()
            .filter(|&secs| secs > 0)
            .ok_or_else(invalid)?;

        self.storage
            .set_with_ttl(
                ctx.db,
                tokens[1].clone(),
                tokens[3].clone(),
                Duration::from_secs(seconds),
            )
            .map_err(|e| match e {
                StorageError::InvalidExpireTime => invalid(),
                e => e.into(),
            })?;
        Ok("OK".to_string())
    }
}

impl CommandParser for GetCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::Exact(2).check(Self::NAME, tokens)?;
        Ok(self
            .storage
            .get(ctx.db, &tokens[1])?
            .unwrap_or_else(|| "key not found".to_string()))
    }
}

impl CommandParser for IncrCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::Exact(2).check(Self::NAME, tokens)?;
        Ok(integer(self.storage.incr_by(ctx.db, &tokens[1], 1)?))
    }
}

impl CommandParser for IncrByCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::Exact(3).check(Self::NAME, tokens)?;
        let delta = parse_int(&tokens[2])?;
        Ok(integer(self.storage.incr_by(ctx.db, &tokens[1], delta)?))
    }
}

impl CommandParser for IncrByFloatCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::Exact(3).check(Self::NAME, tokens)?;
        let delta = parse_float(&tokens[2])?;
        Ok(self
            .storage
            .incr_by_float(ctx.db, &tokens[1], delta)?
            .to_string())
    }
}

impl CommandParser for DecrCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::Exact(2).check(Self::NAME, tokens)?;
        Ok(integer(self.storage.decr_by(ctx.db, &tokens[1], 1)?))
    }
}

impl CommandParser for DecrByCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::Exact(3).check(Self::NAME, tokens)?;
        let delta = parse_int(&tokens[2])?;
        Ok(integer(self.storage.decr_by(ctx.db, &tokens[1], delta)?))
    }
}

impl CommandParser for MSetCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::KeyValuePairs { leading: 1 }.check(Self::NAME, tokens)?;
        self.storage.mset(ctx.db, pairs(&tokens[1..]))?;
        Ok("OK".to_string())
    }
}

impl CommandParser for MGetCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::AtLeast(2).check(Self::NAME, tokens)?;
        let values: Vec<String> = self
            .storage
            .mget(ctx.db, &tokens[1..])?
            .into_iter()
            .map(|v| v.unwrap_or_else(|| NIL.to_string()))
            .collect();
        Ok(numbered(&values))
    }
}

impl CommandParser for StrLenCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::Exact(2).check(Self::NAME, tokens)?;
        Ok(integer(self.storage.strlen(ctx.db, &tokens[1])?))
    }
}

impl CommandParser for AppendCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::Exact(3).check(Self::NAME, tokens)?;
        Ok(integer(self.storage.append(ctx.db, &tokens[1], &tokens[2])?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::run;
    use crate::storage::{StorageEngine, StorageError};
    use std::sync::Arc;

    fn setup() -> (Arc<StorageEngine>, CommandContext) {
        (Arc::new(StorageEngine::new()), CommandContext::default())
    }

    #[test]
    fn test_set_get() {
        let (storage, mut ctx) = setup();
        let set = SetCommand::new(Arc::clone(&storage));
        let get = GetCommand::new(storage);

        assert_eq!(run(&set, &mut ctx, "SET name skip").unwrap(), "OK");
        assert_eq!(run(&get, &mut ctx, "GET name").unwrap(), "skip");
        assert_eq!(run(&get, &mut ctx, "GET missing").unwrap(), "key not found");
        assert_eq!(
            run(&set, &mut ctx, "SET name").unwrap_err().to_string(),
            "wrong number of arguments for 'SET' command"
        );
    }

    #[test]
    fn test_get_respects_selected_db() {
        let (storage, mut ctx) = setup();
        let set = SetCommand::new(Arc::clone(&storage));
        let get = GetCommand::new(storage);

        ctx.db = 2;
        run(&set, &mut ctx, "SET k in-two").unwrap();
        assert_eq!(run(&get, &mut ctx, "GET k").unwrap(), "in-two");

        ctx.db = 0;
        assert_eq!(run(&get, &mut ctx, "GET k").unwrap(), "key not found");
    }

    #[test]
    fn test_setnx() {
        let (storage, mut ctx) = setup();
        let setnx = SetNxCommand::new(storage);

        assert_eq!(run(&setnx, &mut ctx, "SETNX k a").unwrap(), "(integer) 1");
        assert_eq!(run(&setnx, &mut ctx, "SETNX k b").unwrap(), "(integer) 0");
    }

    #[test]
    fn test_setex_validation() {
        let (storage, mut ctx) = setup();
        let setex = SetExCommand::new(Arc::clone(&storage));

        assert_eq!(run(&setex, &mut ctx, "SETEX k 100 v").unwrap(), "OK");
        assert_eq!(storage.get(0, "k").unwrap(), Some("v".to_string()));
        assert_eq!(
            run(&setex, &mut ctx, "SETEX k 0 v").unwrap_err().to_string(),
            "(error) ERR invalid expire time in 'SETEX' command"
        );
        assert_eq!(
            run(&setex, &mut ctx, "SETEX k soon v").unwrap_err().to_string(),
            "soon is not a numeric type"
        );
    }

    #[test]
    fn test_setex_out_of_range_seconds() {
        let (storage, mut ctx) = setup();
        let setex = SetExCommand::new(Arc::clone(&storage));
        let expected = "(error) ERR invalid expire time in 'SETEX' command";

        assert_eq!(
            run(&setex, &mut ctx, "SETEX k 9223372036854775807 v").unwrap_err().to_string(),
            expected
        );
        assert_eq!(
            run(&setex, &mut ctx, "SETEX k -9223372036854775808 v").unwrap_err().to_string(),
            expected
        );
        assert_eq!(
            run(&setex, &mut ctx, "SETEX k 9223372036854775808 v").unwrap_err().to_string(),
            "9223372036854775808 is not a numeric type"
        );
        assert!(!storage.exists(0, "k").unwrap());

        // A century still fits.
        assert_eq!(run(&setex, &mut ctx, "SETEX k 3153600000 v").unwrap(), "OK");
    }

    #[test]
    fn test_counters() {
        let (storage, mut ctx) = setup();
        let incr = IncrCommand::new(Arc::clone(&storage));
        let incrby = IncrByCommand::new(Arc::clone(&storage));
        let decr = DecrCommand::new(Arc::clone(&storage));
        let decrby = DecrByCommand::new(Arc::clone(&storage));

        assert_eq!(run(&incr, &mut ctx, "INCR n").unwrap(), "(integer) 1");
        assert_eq!(run(&incrby, &mut ctx, "INCRBY n 10").unwrap(), "(integer) 11");
        assert_eq!(run(&decr, &mut ctx, "DECR n").unwrap(), "(integer) 10");
        assert_eq!(run(&decrby, &mut ctx, "DECRBY n 15").unwrap(), "(integer) -5");
        assert_eq!(
            run(&incrby, &mut ctx, "INCRBY n abc").unwrap_err().to_string(),
            "abc is not a numeric type"
        );
    }

    #[test]
    fn test_incr_on_non_integer() {
        let (storage, mut ctx) = setup();
        storage.set(0, "word".into(), "hello".into()).unwrap();
        let incr = IncrCommand::new(storage);

        assert_eq!(
            run(&incr, &mut ctx, "INCR word"),
            Err(CommandError::Storage(StorageError::NotAnInteger))
        );
    }

    #[test]
    fn test_incrbyfloat() {
        let (storage, mut ctx) = setup();
        let incr = IncrByFloatCommand::new(storage);

        assert_eq!(run(&incr, &mut ctx, "INCRBYFLOAT f 1.5").unwrap(), "1.5");
        assert_eq!(run(&incr, &mut ctx, "INCRBYFLOAT f 1.5").unwrap(), "3");
        assert!(run(&incr, &mut ctx, "INCRBYFLOAT f x").is_err());
    }

    #[test]
    fn test_mset_mget() {
        let (storage, mut ctx) = setup();
        storage.lpush(0, "list".into(), vec!["x".into()]).unwrap();
        let mset = MSetCommand::new(Arc::clone(&storage));
        let mget = MGetCommand::new(storage);

        assert_eq!(run(&mset, &mut ctx, "MSET a 1 b 2").unwrap(), "OK");
        assert_eq!(
            run(&mget, &mut ctx, "MGET a missing list b").unwrap(),
            "1) 1\n2) (nil)\n3) (nil)\n4) 2"
        );
        assert!(run(&mset, &mut ctx, "MSET a 1 b").is_err());
    }

    #[test]
    fn test_append_strlen() {
        let (storage, mut ctx) = setup();
        let append = AppendCommand::new(Arc::clone(&storage));
        let strlen = StrLenCommand::new(storage);

        assert_eq!(run(&strlen, &mut ctx, "STRLEN s").unwrap(), "(integer) 0");
        assert_eq!(run(&append, &mut ctx, "APPEND s Hello").unwrap(), "(integer) 5");
        assert_eq!(run(&append, &mut ctx, "APPEND s World").unwrap(), "(integer) 10");
        assert_eq!(run(&strlen, &mut ctx, "STRLEN s").unwrap(), "(integer) 10");
    }
}
