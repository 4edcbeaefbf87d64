//! Keyspace commands: `KEYS`, `EXISTS`, `DEL`, `RENAME`.

use super::{integer, parsers, Arity, CommandContext, CommandParser, CommandResult};
use crate::protocol::numbered;

parsers! {
    KeysCommand => "KEYS",
    ExistsCommand => "EXISTS",
    DelCommand => "DEL",
    RenameCommand => "RENAME",
}

impl CommandParser for KeysCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    /// Keys matching a glob pattern, in key order.
    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::Exact(2).check(Self::NAME, tokens)?;
        let keys = self.storage.keys(ctx.db, &tokens[1])?;
        Ok(numbered(&keys))
    }
}

impl CommandParser for ExistsCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::AtLeast(2).check(Self::NAME, tokens)?;
        Ok(integer(self.storage.exists_many(ctx.db, &tokens[1..])?))
    }
}

impl CommandParser for DelCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::AtLeast(2).check(Self::NAME, tokens)?;
        Ok(integer(self.storage.delete_many(ctx.db, &tokens[1..])?))
    }
}

impl CommandParser for RenameCommand {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&self, ctx: &mut CommandContext, tokens: &[String]) -> CommandResult {
        Arity::Exact(3).check(Self::NAME, tokens)?;
        self.storage.rename(ctx.db, &tokens[1], &tokens[2])?;
        Ok("OK".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::run;
    use crate::commands::CommandError;
    use crate::storage::{StorageEngine, StorageError};
    use std::sync::Arc;

    fn setup() -> (Arc<StorageEngine>, CommandContext) {
        let storage = Arc::new(StorageEngine::new());
        for key in ["user:2", "user:1", "order:9"] {
            storage.set(0, key.into(), "v".into()).unwrap();
        }
        (storage, CommandContext::default())
    }

    #[test]
    fn test_keys_sorted_and_filtered() {
        let (storage, mut ctx) = setup();
        let keys = KeysCommand::new(storage);

        assert_eq!(
            run(&keys, &mut ctx, "KEYS *").unwrap(),
            "1) order:9\n2) user:1\n3) user:2"
        );
        assert_eq!(run(&keys, &mut ctx, "KEYS user:*").unwrap(), "1) user:1\n2) user:2");
        assert_eq!(run(&keys, &mut ctx, "KEYS nothing*").unwrap(), "(empty list or set)");
    }

    #[test]
    fn test_exists_and_del() {
        let (storage, mut ctx) = setup();
        let exists = ExistsCommand::new(Arc::clone(&storage));
        let del = DelCommand::new(storage);

        assert_eq!(run(&exists, &mut ctx, "EXISTS user:1 user:1 nope").unwrap(), "(integer) 2");
        assert_eq!(run(&del, &mut ctx, "DEL user:1 nope").unwrap(), "(integer) 1");
        assert_eq!(run(&exists, &mut ctx, "EXISTS user:1").unwrap(), "(integer) 0");
        assert!(run(&del, &mut ctx, "DEL").is_err());
    }

    #[test]
    fn test_rename() {
        let (storage, mut ctx) = setup();
        let rename = RenameCommand::new(Arc::clone(&storage));

        assert_eq!(run(&rename, &mut ctx, "RENAME user:1 admin:1").unwrap(), "OK");
        assert_eq!(storage.get(0, "admin:1").unwrap(), Some("v".to_string()));
        assert_eq!(
            run(&rename, &mut ctx, "RENAME missing other"),
            Err(CommandError::Storage(StorageError::NoSuchKey))
        );
    }
}
