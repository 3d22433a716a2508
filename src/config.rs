use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::commands::{CommandId, CommandOverlay};
use crate::error::BeaconResult;
use crate::extensions::{ExtensionRoot, Origin};
use crate::shortcuts::TOGGLE_COMMAND;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub extensions: ExtensionsConfig,
    /// Global hotkeys keyed by command id.
    pub shortcuts: BTreeMap<String, ShortcutConfig>,
    /// Per-command overrides keyed by command id.
    pub commands: BTreeMap<String, CommandConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub toggle_hotkey: String,
    /// Command pushed when the launcher opens.
    pub home_command: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionsConfig {
    /// Bundled extensions shipped with the launcher.
    pub system_dir: Option<String>,
    /// Extensions installed from the store (defaults under the data dir).
    pub store_dir: Option<String>,
    /// Extensions under development; shadows every other root.
    pub development_dir: Option<String>,
    /// Individually linked extension directories.
    pub local_paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortcutConfig {
    pub key: String,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub disabled: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            toggle_hotkey: "Alt+Space".to_string(),
            home_command: "launcher#home".to_string(),
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| {
                // Fallback: ~ is not expanded by PathBuf, so use dirs::home_dir
                dirs::home_dir()
                    .map(|h| h.join(".config"))
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
            })
            .join("beacon")
            .join("config.toml")
    }

    /// Directory for extension storage and store installs.
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .map(|h| h.join(".local").join("share"))
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
            })
            .join("beacon")
    }

    /// Load config from the default location, or return defaults if not found
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`. Unreadable or invalid files yield defaults.
    pub fn load_from(path: &Path) -> Self {
        let mut config = if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "failed to parse config, using defaults");
                        Self::default()
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to read config, using defaults");
                    Self::default()
                }
            }
        } else {
            Self::default()
        };

        config.validate();
        config
    }

    /// Replace unusable values with defaults
    fn validate(&mut self) {
        let defaults = GeneralConfig::default();

        if self.general.toggle_hotkey.trim().is_empty() {
            self.general.toggle_hotkey = defaults.toggle_hotkey;
        }
        if CommandId::parse(&self.general.home_command).is_err() {
            tracing::warn!(
                home_command = %self.general.home_command,
                "invalid home command, using default"
            );
            self.general.home_command = defaults.home_command;
        }
    }

    pub fn save(&self) -> BeaconResult<()> {
        self.save_to(&Self::config_path())
    }

    /// Save config to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> BeaconResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        tracing::debug!(path = %path.display(), "saved config");
        Ok(())
    }

    pub fn home_command(&self) -> Option<CommandId> {
        CommandId::parse(&self.general.home_command).ok()
    }

    /// Extension roots in load order; later roots shadow earlier ones.
    ///
    /// System and store dirs hold one package per subdirectory, local paths
    /// are packages themselves, and the development dir comes last.
    pub fn extension_roots(&self, data_dir: &Path) -> Vec<ExtensionRoot> {
        let mut roots = Vec::new();

        if let Some(system) = &self.extensions.system_dir {
            roots.push(ExtensionRoot::parent(expand_path(system), Origin::System));
        }

        let store = match &self.extensions.store_dir {
            Some(store) => expand_path(store),
            None => data_dir.join("extensions").join("store"),
        };
        roots.push(ExtensionRoot::parent(store, Origin::Store));

        for local in &self.extensions.local_paths {
            roots.push(ExtensionRoot::package(expand_path(local), Origin::Local));
        }

        if let Some(dev) = &self.extensions.development_dir {
            roots.push(ExtensionRoot::parent(expand_path(dev), Origin::Development));
        }

        roots
    }

    /// Link a local extension directory. Returns `false` if already linked.
    pub fn add_local_path(&mut self, path: &Path) -> bool {
        let path = path.to_string_lossy().into_owned();
        let exists = self
            .extensions
            .local_paths
            .iter()
            .any(|p| expand_path(p) == expand_path(&path));
        if !exists {
            self.extensions.local_paths.push(path);
        }
        !exists
    }

    /// Shortcut entries for the binding table, launcher toggle first.
    pub fn shortcut_entries(&self) -> Vec<(CommandId, String, bool)> {
        let mut entries = vec![(
            CommandId::new("launcher", "toggle"),
            self.general.toggle_hotkey.clone(),
            false,
        )];

        for (id, shortcut) in &self.shortcuts {
            if id == TOGGLE_COMMAND {
                continue;
            }
            match CommandId::parse(id) {
                Ok(command) => entries.push((command, shortcut.key.clone(), shortcut.disabled)),
                Err(e) => tracing::warn!(error = %e, "ignoring shortcut for invalid command id"),
            }
        }

        entries
    }

    pub fn set_shortcut(&mut self, id: &CommandId, key: &str) {
        self.shortcuts.insert(
            id.to_string(),
            ShortcutConfig {
                key: key.to_string(),
                disabled: false,
            },
        );
    }

    pub fn remove_shortcut(&mut self, id: &CommandId) -> bool {
        self.shortcuts.remove(id.as_str()).is_some()
    }

    pub fn set_command_disabled(&mut self, id: &CommandId, disabled: bool) {
        if disabled {
            self.commands
                .insert(id.to_string(), CommandConfig { disabled: true });
        } else {
            self.commands.remove(id.as_str());
        }
    }

    /// Registry overlays derived from `[commands]` and `[shortcuts]`.
    pub fn command_overlays(&self) -> Vec<(CommandId, CommandOverlay)> {
        let mut overlays: BTreeMap<CommandId, CommandOverlay> = BTreeMap::new();

        for (id, command) in &self.commands {
            if let Ok(id) = CommandId::parse(id) {
                overlays.entry(id).or_default().disabled = command.disabled;
            }
        }
        for (id, shortcut) in &self.shortcuts {
            if id == TOGGLE_COMMAND {
                continue;
            }
            if let Ok(id) = CommandId::parse(id) {
                overlays.entry(id).or_default().shortcut = Some(shortcut.key.clone());
            }
        }

        overlays.into_iter().collect()
    }
}

/// Expand `~` and environment variables in a configured path.
pub fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(raw).as_ref()),
    }
}
