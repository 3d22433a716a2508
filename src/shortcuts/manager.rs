//! The shortcut binding table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::backend::HotkeyBackend;
use super::{KeyCombo, ShortcutError};
use crate::commands::CommandId;

/// Reserved id of the binding that toggles the launcher window.
pub const TOGGLE_COMMAND: &str = "launcher#toggle";

/// A command's global hotkey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutBinding {
    pub command: CommandId,
    pub combo: KeyCombo,
    #[serde(default)]
    pub disabled: bool,
}

/// Owns every binding and keeps the backend in sync with the enabled ones.
///
/// At most one enabled binding maps to a given combo.
pub struct ShortcutManager {
    bindings: BTreeMap<CommandId, ShortcutBinding>,
    backend: Box<dyn HotkeyBackend>,
}

impl ShortcutManager {
    pub fn new(backend: Box<dyn HotkeyBackend>) -> Self {
        Self {
            bindings: BTreeMap::new(),
            backend,
        }
    }

    pub fn toggle_id() -> CommandId {
        CommandId::new("launcher", "toggle")
    }

    /// Bind `combo` to `id`, replacing the id's previous binding.
    pub fn bind(&mut self, id: CommandId, combo: KeyCombo) -> Result<(), ShortcutError> {
        if let Some(existing) = self.enabled_owner(&combo, Some(&id)) {
            return Err(ShortcutError::Conflict {
                combo,
                existing: existing.clone(),
            });
        }

        let prior = self.bindings.remove(&id);
        let prior_active = prior.as_ref().filter(|b| !b.disabled);
        let already_held = prior_active.is_some_and(|b| b.combo == combo);

        if !already_held {
            if let Some(prior) = prior_active {
                self.backend.unregister(&prior.combo);
            }
            if let Err(reason) = self.backend.register(&combo) {
                tracing::warn!(command = %id, combo = %combo, reason = %reason, "hotkey backend rejected binding");
                if let Some(prior) = prior {
                    self.restore(prior);
                }
                return Err(ShortcutError::Backend(reason));
            }
        }

        tracing::info!(command = %id, combo = %combo, "bound shortcut");
        self.bindings.insert(
            id.clone(),
            ShortcutBinding {
                command: id,
                combo,
                disabled: false,
            },
        );
        Ok(())
    }

    fn restore(&mut self, prior: ShortcutBinding) {
        if !prior.disabled {
            if let Err(reason) = self.backend.register(&prior.combo) {
                tracing::warn!(command = %prior.command, reason = %reason, "could not restore previous shortcut");
            }
        }
        self.bindings.insert(prior.command.clone(), prior);
    }

    pub fn unbind(&mut self, id: &CommandId) -> Result<ShortcutBinding, ShortcutError> {
        let binding = self
            .bindings
            .remove(id)
            .ok_or_else(|| ShortcutError::NotBound(id.to_string()))?;
        if !binding.disabled {
            self.backend.unregister(&binding.combo);
        }
        tracing::info!(command = %id, "removed shortcut");
        Ok(binding)
    }

    /// Disable or re-enable a binding without forgetting its combo.
    pub fn set_disabled(&mut self, id: &CommandId, disabled: bool) -> Result<(), ShortcutError> {
        let binding = self
            .bindings
            .get(id)
            .ok_or_else(|| ShortcutError::NotBound(id.to_string()))?;
        if binding.disabled == disabled {
            return Ok(());
        }
        let combo = binding.combo.clone();

        if disabled {
            self.backend.unregister(&combo);
        } else {
            if let Some(existing) = self.enabled_owner(&combo, Some(id)) {
                return Err(ShortcutError::Conflict {
                    combo,
                    existing: existing.clone(),
                });
            }
            self.backend
                .register(&combo)
                .map_err(ShortcutError::Backend)?;
        }

        if let Some(binding) = self.bindings.get_mut(id) {
            binding.disabled = disabled;
        }
        Ok(())
    }

    /// Bind the launcher toggle.
    pub fn set_toggle_hotkey(&mut self, combo: KeyCombo) -> Result<(), ShortcutError> {
        self.bind(Self::toggle_id(), combo)
    }

    pub fn toggle_hotkey(&self) -> Option<&KeyCombo> {
        self.bindings
            .get(TOGGLE_COMMAND)
            .filter(|b| !b.disabled)
            .map(|b| &b.combo)
    }

    /// Replace every binding with `entries` (`(id, combo, disabled)`).
    ///
    /// Entries are applied in order; an unparsable combo or a collision with
    /// an earlier entry is logged and skipped. The skipped entries' errors are
    /// returned.
    pub fn rebuild_from_config<I>(&mut self, entries: I) -> Vec<ShortcutError>
    where
        I: IntoIterator<Item = (CommandId, String, bool)>,
    {
        for binding in std::mem::take(&mut self.bindings).into_values() {
            if !binding.disabled {
                self.backend.unregister(&binding.combo);
            }
        }

        let mut skipped: Vec<ShortcutError> = Vec::new();
        for (id, raw, disabled) in entries {
            let combo = match KeyCombo::parse(&raw) {
                Ok(combo) => combo,
                Err(e) => {
                    tracing::warn!(command = %id, combo = %raw, error = %e, "skipping invalid shortcut");
                    skipped.push(e.into());
                    continue;
                }
            };

            if disabled {
                let previous = self.bindings.insert(
                    id.clone(),
                    ShortcutBinding {
                        command: id,
                        combo,
                        disabled: true,
                    },
                );
                if let Some(previous) = previous.filter(|b| !b.disabled) {
                    self.backend.unregister(&previous.combo);
                }
                continue;
            }

            if let Err(e) = self.bind(id.clone(), combo) {
                tracing::warn!(command = %id, error = %e, "skipping shortcut");
                skipped.push(e);
            }
        }

        skipped
    }

    /// The enabled command bound to `combo`.
    pub fn command_for(&self, combo: &KeyCombo) -> Option<&CommandId> {
        self.enabled_owner(combo, None)
    }

    fn enabled_owner(&self, combo: &KeyCombo, except: Option<&CommandId>) -> Option<&CommandId> {
        self.bindings
            .values()
            .find(|b| !b.disabled && &b.combo == combo && Some(&b.command) != except)
            .map(|b| &b.command)
    }

    pub fn binding(&self, id: &str) -> Option<&ShortcutBinding> {
        self.bindings.get(id)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// All bindings, ordered by command id.
    pub fn snapshot(&self) -> Vec<ShortcutBinding> {
        self.bindings.values().cloned().collect()
    }

    /// Combos pressed since the last poll; map them with [`Self::command_for`].
    pub fn poll(&mut self) -> Vec<KeyCombo> {
        self.backend.poll_pressed()
    }
}
