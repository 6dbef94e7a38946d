//! The ordered, append-only command registry.
//!
//! Insertion order is significant: matching is strictly first-match-wins in
//! registration order, with no conflict detection between overlapping
//! patterns. Registration may race with dispatch, so the sequence sits
//! behind a mutex held only for the append or the snapshot copy, never
//! across an await.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::command::Command;

/// The ordered sequence of registered commands.
#[derive(Default)]
pub struct CommandRegistry {
    commands: Mutex<Vec<Arc<dyn Command>>>,
}

impl CommandRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command. Commands are never removed.
    pub fn register(&self, command: Arc<dyn Command>) {
        self.commands.lock().push(command);
    }

    /// Returns a consistent snapshot of the registry in registration order.
    pub fn snapshot(&self) -> Vec<Arc<dyn Command>> {
        self.commands.lock().clone()
    }

    /// Returns the number of registered commands.
    pub fn len(&self) -> usize {
        self.commands.lock().len()
    }

    /// Returns `true` when no commands are registered.
    pub fn is_empty(&self) -> bool {
        self.commands.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{BotCommand, CommandDefinition};

    fn command(usage: &str) -> Arc<dyn Command> {
        Arc::new(BotCommand::new(
            usage,
            CommandDefinition::new(|_, _, _| async {}),
        ))
    }

    #[test]
    fn snapshot_preserves_registration_order() {
        let registry = CommandRegistry::new();
        registry.register(command("first"));
        registry.register(command("second"));
        registry.register(command("third"));

        let snapshot = registry.snapshot();
        let usages: Vec<&str> = snapshot.iter().map(|c| c.usage()).collect();
        assert_eq!(usages, vec!["first", "second", "third"]);
    }
}
