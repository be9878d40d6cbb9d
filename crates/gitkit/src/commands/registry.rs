//! Verb to command factory mapping.

use std::collections::HashMap;
use std::sync::Arc;

use super::{Command, default_commands};

/// Builds a fresh command instance for one dispatch.
pub type CommandFactory = Arc<dyn Fn() -> Box<dyn Command> + Send + Sync>;

/// Extensible command table.
///
/// Populated before it is shared; once behind an `Arc` it is read-only,
/// so dispatch needs no locking.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    factories: HashMap<String, CommandFactory>,
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .finish()
    }
}

impl CommandRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in command.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for (name, factory) in default_commands() {
            registry.register(name, factory);
        }
        registry
    }

    /// Register `factory` under `name`. An existing registration is
    /// replaced and returned.
    pub fn register(&mut self, name: impl Into<String>, factory: CommandFactory) -> Option<CommandFactory> {
        let name = name.into();
        let previous = self.factories.insert(name.clone(), factory);
        if previous.is_some() {
            tracing::debug!(command = %name, "command registration replaced");
        }
        previous
    }

    /// Factory registered under `name`.
    pub fn lookup(&self, name: &str) -> Option<&CommandFactory> {
        self.factories.get(name)
    }

    /// Registered verbs, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Usage text of the command registered under `name`.
    pub fn help(&self, name: &str) -> Option<&'static str> {
        self.lookup(name).map(|factory| factory().help())
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::commands::Context;
    use crate::error::Result;
    use async_trait::async_trait;

    struct Fixed(&'static str);

    #[async_trait]
    impl Command for Fixed {
        async fn execute(&self, _ctx: Context<'_>) -> Result<String> {
            Ok(self.0.to_string())
        }

        fn help(&self) -> &'static str {
            self.0
        }
    }

    fn fixed(text: &'static str) -> CommandFactory {
        Arc::new(move || -> Box<dyn Command> { Box::new(Fixed(text)) })
    }

    #[test]
    fn test_defaults_registered() {
        let registry = CommandRegistry::with_defaults();
        for verb in ["clone", "config", "reflog", "ls"] {
            assert!(registry.lookup(verb).is_some(), "{verb} missing");
        }
        assert!(registry.lookup("push").is_none());
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = CommandRegistry::new();
        assert!(registry.register("x", fixed("first")).is_none());
        let previous = registry.register("x", fixed("second"));

        assert_eq!(previous.map(|f| f().help()), Some("first"));
        assert_eq!(registry.help("x"), Some("second"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_names_sorted() {
        let mut registry = CommandRegistry::new();
        registry.register("b", fixed("b"));
        registry.register("a", fixed("a"));
        assert_eq!(registry.names(), vec!["a", "b"]);
    }
}
