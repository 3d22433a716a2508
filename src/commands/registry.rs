//! Process-wide command table.
//!
//! Commands are kept in registration order. Lookups go through a composite-id
//! index; the first registration of an id wins.

use std::collections::HashMap;
use std::ops::Deref;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::{Deserialize, Serialize};

use super::{Command, CommandId, RenderResult};
use crate::extensions::{ExtensionError, ExtensionResult};

/// Per-user settings layered over a registered command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOverlay {
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub shortcut: Option<String>,
}

/// A canonical command merged with its overlay.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedCommand<'a> {
    command: &'a Command,
    overlay: Option<&'a CommandOverlay>,
}

impl<'a> ResolvedCommand<'a> {
    pub fn command(&self) -> &'a Command {
        self.command
    }

    pub fn disabled(&self) -> bool {
        self.overlay.map(|o| o.disabled).unwrap_or(false)
    }

    pub fn shortcut(&self) -> Option<&'a str> {
        self.overlay.and_then(|o| o.shortcut.as_deref())
    }
}

impl Deref for ResolvedCommand<'_> {
    type Target = Command;

    fn deref(&self) -> &Command {
        self.command
    }
}

/// A preview produced for a search query.
#[derive(Debug, Clone)]
pub struct PreviewHit<'a> {
    pub command: &'a Command,
    pub result: RenderResult,
}

/// Registry of all commands contributed by loaded extensions.
pub struct CommandRegistry {
    /// Commands in registration order.
    commands: Vec<Command>,

    /// Position of each command in `commands`.
    index: HashMap<CommandId, usize>,

    /// User overlays by command id. May reference commands not loaded yet.
    overlays: HashMap<CommandId, CommandOverlay>,

    matcher: SkimMatcherV2,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            index: HashMap::new(),
            overlays: HashMap::new(),
            matcher: SkimMatcherV2::default(),
        }
    }

    /// Register a command. A second registration of the same id is rejected
    /// and the original entry is left untouched.
    pub fn register(&mut self, command: Command) -> ExtensionResult<()> {
        if self.index.contains_key(&command.id) {
            tracing::warn!(command = %command.id, "ignoring duplicate command registration");
            return Err(ExtensionError::DuplicateCommandId(command.id.to_string()));
        }

        tracing::debug!(command = %command.id, kind = command.kind.label(), "registered command");
        self.index.insert(command.id.clone(), self.commands.len());
        self.commands.push(command);
        Ok(())
    }

    /// Drop every command owned by `extension`. Returns how many were removed.
    pub fn remove_extension(&mut self, extension: &str) -> usize {
        let before = self.commands.len();
        self.commands.retain(|c| c.owner.name != extension);
        let removed = before - self.commands.len();
        if removed > 0 {
            self.reindex();
        }
        removed
    }

    fn reindex(&mut self) {
        self.index = self
            .commands
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<ResolvedCommand<'_>> {
        self.index.get(id).map(|&i| self.resolve(&self.commands[i]))
    }

    fn resolve<'a>(&'a self, command: &'a Command) -> ResolvedCommand<'a> {
        ResolvedCommand {
            command,
            overlay: self.overlays.get(&command.id),
        }
    }

    pub fn get_all(&self) -> Vec<ResolvedCommand<'_>> {
        self.commands.iter().map(|c| self.resolve(c)).collect()
    }

    pub fn get_by_extension(&self, extension: &str) -> Vec<ResolvedCommand<'_>> {
        self.commands
            .iter()
            .filter(|c| c.owner.name == extension)
            .map(|c| self.resolve(c))
            .collect()
    }

    /// Case-insensitive substring search over title and name.
    ///
    /// Matches keep registration order. Only the empty query returns
    /// everything; whitespace is matched literally.
    pub fn search(&self, query: &str) -> Vec<ResolvedCommand<'_>> {
        let query = query.to_lowercase();
        if query.is_empty() {
            return self.get_all();
        }

        self.commands
            .iter()
            .filter(|c| {
                c.title.to_lowercase().contains(&query) || c.name.to_lowercase().contains(&query)
            })
            .map(|c| self.resolve(c))
            .collect()
    }

    /// Ranked fuzzy search over title, name, keywords and extension title.
    pub fn fuzzy_search(&self, query: &str) -> Vec<(ResolvedCommand<'_>, i64)> {
        let query = query.trim();
        if query.is_empty() {
            return self.get_all().into_iter().map(|c| (c, 0)).collect();
        }

        let query_lower = query.to_lowercase();
        let mut matches: Vec<(usize, i64)> = self
            .commands
            .iter()
            .enumerate()
            .filter_map(|(i, c)| {
                let search_text = format!(
                    "{} {} {} {}",
                    c.title,
                    c.name,
                    c.keywords.join(" "),
                    c.owner.title
                );
                self.matcher
                    .fuzzy_match(&search_text, &query_lower)
                    .map(|score| (i, score))
            })
            .collect();

        // Stable: equal scores keep registration order
        matches.sort_by(|a, b| b.1.cmp(&a.1));
        matches
            .into_iter()
            .map(|(i, score)| (self.resolve(&self.commands[i]), score))
            .collect()
    }

    /// Evaluate every enabled command's preview for `query`.
    pub fn preview(&self, query: &str) -> Vec<PreviewHit<'_>> {
        let mut hits = Vec::new();

        for command in &self.commands {
            let Some(preview) = command.preview.as_ref() else {
                continue;
            };
            if self.is_disabled(command.id.as_str()) {
                continue;
            }

            match preview(query) {
                Ok(Some(result)) => hits.push(PreviewHit { command, result }),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(command = %command.id, error = %e, "preview failed");
                }
            }
        }

        hits
    }

    pub fn overlay(&self, id: &str) -> Option<&CommandOverlay> {
        self.overlays.get(id)
    }

    pub fn set_overlay(&mut self, id: CommandId, overlay: CommandOverlay) {
        if overlay == CommandOverlay::default() {
            self.overlays.remove(&id);
        } else {
            self.overlays.insert(id, overlay);
        }
    }

    pub fn set_disabled(&mut self, id: &CommandId, disabled: bool) {
        let mut overlay = self.overlays.get(id).cloned().unwrap_or_default();
        overlay.disabled = disabled;
        self.set_overlay(id.clone(), overlay);
    }

    pub fn set_shortcut(&mut self, id: &CommandId, shortcut: Option<String>) {
        let mut overlay = self.overlays.get(id).cloned().unwrap_or_default();
        overlay.shortcut = shortcut;
        self.set_overlay(id.clone(), overlay);
    }

    pub fn is_disabled(&self, id: &str) -> bool {
        self.overlays.get(id).map(|o| o.disabled).unwrap_or(false)
    }
}
