//! Extension manifest parsing.
//!
//! Each extension directory has an `extension.json` manifest that defines:
//! - Extension identity (name, title, version, icon)
//! - The entry file executed on load
//! - Statically declared commands

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{ExtensionError, ExtensionResult};
use crate::builtins::BUILTIN_EXTENSION;
use crate::commands::WindowSizeHint;

/// Manifest file name inside an extension directory.
pub const MANIFEST_FILE: &str = "extension.json";

/// Where a package was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Bundled with the application.
    System,
    /// Development root, shadows installed copies.
    Development,
    /// Installed from the extension store.
    Store,
    /// A local directory linked by the user.
    Local,
}

impl Origin {
    pub fn label(self) -> &'static str {
        match self {
            Origin::System => "system",
            Origin::Development => "development",
            Origin::Store => "store",
            Origin::Local => "local",
        }
    }
}

/// Command UI mode.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CommandMode {
    #[default]
    View,
    Action,
}

/// A command declared in the manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandManifest {
    /// Command identifier within the extension.
    #[serde(default)]
    pub name: String,

    /// Human-readable title (defaults to the name).
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Icon filename relative to extension root.
    #[serde(default)]
    pub icon: Option<String>,

    /// Additional search keywords.
    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default, alias = "mode")]
    pub kind: CommandMode,

    #[serde(default, alias = "windowSizeHint")]
    pub window_size_hint: Option<WindowSizeHint>,
}

/// On-disk shape; required fields are optional here so that a missing field
/// produces a readable reason instead of a serde message.
#[derive(Debug, Deserialize)]
struct RawManifest {
    name: Option<String>,
    entry: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    commands: Vec<CommandManifest>,
}

/// A validated extension package.
#[derive(Debug, Clone, Serialize)]
pub struct ExtensionPackage {
    /// Unique identifier.
    pub name: String,
    pub title: String,
    pub description: String,
    pub icon: Option<String>,
    pub version: Option<String>,
    /// Entry file, relative to `directory`.
    pub entry: String,
    /// Absolute path of the entry file.
    pub entry_path: PathBuf,
    /// Absolute extension root.
    pub directory: PathBuf,
    pub origin: Origin,
    pub commands: Vec<CommandManifest>,
}

impl ExtensionPackage {
    pub fn command(&self, name: &str) -> Option<&CommandManifest> {
        self.commands.iter().find(|c| c.name == name)
    }
}

fn invalid(path: &Path, reason: impl Into<String>) -> ExtensionError {
    ExtensionError::ManifestInvalid {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Read and validate the manifest in `dir`.
pub fn read_manifest(dir: &Path, origin: Origin) -> ExtensionResult<ExtensionPackage> {
    let manifest_path = dir.join(MANIFEST_FILE);
    if !manifest_path.is_file() {
        return Err(ExtensionError::ManifestNotFound(dir.to_path_buf()));
    }

    let content = std::fs::read_to_string(&manifest_path)?;
    let raw: RawManifest =
        serde_json::from_str(&content).map_err(|e| invalid(&manifest_path, e.to_string()))?;

    let name = match raw.name.map(|n| n.trim().to_string()) {
        Some(n) if !n.is_empty() => n,
        _ => return Err(invalid(&manifest_path, "missing required field `name`")),
    };
    if name.contains(crate::commands::ID_SEPARATOR) {
        return Err(invalid(
            &manifest_path,
            format!("extension name '{name}' must not contain '#'"),
        ));
    }
    if name == BUILTIN_EXTENSION {
        return Err(invalid(
            &manifest_path,
            format!("extension name '{name}' is reserved for built-in commands"),
        ));
    }

    let entry = match raw.entry.map(|e| e.trim().to_string()) {
        Some(e) if !e.is_empty() => e,
        _ => return Err(invalid(&manifest_path, "missing required field `entry`")),
    };

    let mut seen = HashSet::new();
    let mut commands = raw.commands;
    for cmd in &mut commands {
        if cmd.name.is_empty() {
            return Err(invalid(&manifest_path, "command.name is required"));
        }
        if cmd.name.contains(crate::commands::ID_SEPARATOR) {
            return Err(invalid(
                &manifest_path,
                format!("command name '{}' must not contain '#'", cmd.name),
            ));
        }
        if !seen.insert(cmd.name.clone()) {
            return Err(invalid(
                &manifest_path,
                format!("command '{}' is declared twice", cmd.name),
            ));
        }
        if cmd.title.is_empty() {
            cmd.title = cmd.name.clone();
        }
    }

    let directory = dir.canonicalize()?;
    let entry_path = directory.join(&entry);
    if !entry_path.is_file() {
        return Err(ExtensionError::EntryNotFound {
            extension: name,
            path: entry_path,
        });
    }
    // The entry must live inside the package so its modules are attributed to it
    let entry_path = entry_path.canonicalize()?;
    if !entry_path.starts_with(&directory) {
        return Err(invalid(
            &manifest_path,
            format!("entry '{entry}' points outside the extension directory"),
        ));
    }

    Ok(ExtensionPackage {
        title: raw.title.filter(|t| !t.is_empty()).unwrap_or_else(|| name.clone()),
        name,
        description: raw.description,
        icon: raw.icon,
        version: raw.version,
        entry,
        entry_path,
        directory,
        origin,
        commands,
    })
}

/// Outcome of checking a directory before linking it as a local extension.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub error: Option<String>,
    pub info: Option<ExtensionPackage>,
}

/// Check whether `path` holds a loadable extension package.
pub fn validate(path: &Path) -> ValidationReport {
    let failure = |error: String| ValidationReport {
        valid: false,
        error: Some(error),
        info: None,
    };

    if !path.is_dir() {
        return failure(format!("Not a directory: {}", path.display()));
    }

    match read_manifest(path, Origin::Local) {
        Ok(package) => ValidationReport {
            valid: true,
            error: None,
            info: Some(package),
        },
        Err(ExtensionError::ManifestNotFound(_)) => {
            failure(format!("No {} found in {}", MANIFEST_FILE, path.display()))
        }
        Err(ExtensionError::ManifestInvalid { reason, .. }) => {
            failure(format!("Invalid manifest: {reason}"))
        }
        Err(ExtensionError::EntryNotFound { path, .. }) => {
            failure(format!("Entry file not found: {}", path.display()))
        }
        Err(e) => failure(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_package(dir: &Path, manifest: &str, entry: Option<&str>) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(MANIFEST_FILE), manifest).unwrap();
        if let Some(entry) = entry {
            fs::write(dir.join(entry), "return {}").unwrap();
        }
    }

    #[test]
    fn test_parse_minimal_manifest() {
        let temp = TempDir::new().unwrap();
        write_package(
            temp.path(),
            r#"{ "name": "notes", "entry": "main.lua" }"#,
            Some("main.lua"),
        );

        let package = read_manifest(temp.path(), Origin::Development).unwrap();
        assert_eq!(package.name, "notes");
        assert_eq!(package.title, "notes");
        assert_eq!(package.origin, Origin::Development);
        assert!(package.commands.is_empty());
        assert!(package.entry_path.is_absolute());
        assert!(package.directory.is_absolute());
    }

    #[test]
    fn test_parse_full_manifest() {
        let temp = TempDir::new().unwrap();
        write_package(
            temp.path(),
            r#"{
                "name": "notes",
                "entry": "main.lua",
                "title": "Notes",
                "description": "Quick notes",
                "icon": "icon.png",
                "version": "1.2.0",
                "commands": [
                    { "name": "open", "title": "Open Notes", "window_size_hint": "large" },
                    { "name": "clear", "kind": "action", "keywords": ["wipe"] },
                    { "name": "peek", "windowSizeHint": { "width": 300, "height": 200 } }
                ]
            }"#,
            Some("main.lua"),
        );

        let package = read_manifest(temp.path(), Origin::Store).unwrap();
        assert_eq!(package.title, "Notes");
        assert_eq!(package.version.as_deref(), Some("1.2.0"));
        assert_eq!(package.commands.len(), 3);
        assert_eq!(package.commands[0].kind, CommandMode::View);
        assert_eq!(
            package.commands[0].window_size_hint.map(|h| h.resolve()),
            Some(crate::commands::WindowSize::LARGE)
        );
        assert_eq!(package.commands[1].kind, CommandMode::Action);
        assert_eq!(package.commands[1].title, "clear");
        assert_eq!(
            package.command("peek").and_then(|c| c.window_size_hint).map(|h| h.resolve()),
            Some(crate::commands::WindowSize::new(300, 200))
        );
    }

    #[test]
    fn test_reserved_name_rejected() {
        let temp = TempDir::new().unwrap();
        write_package(
            temp.path(),
            r#"{ "name": "launcher", "entry": "main.lua" }"#,
            Some("main.lua"),
        );

        let err = read_manifest(temp.path(), Origin::Development).unwrap_err();
        assert!(matches!(err, ExtensionError::ManifestInvalid { .. }));
        assert!(err.to_string().contains("reserved"));
    }

    #[test]
    fn test_entry_outside_package_rejected() {
        let temp = TempDir::new().unwrap();
        let shared = temp.path().join("shared");
        fs::create_dir_all(&shared).unwrap();
        fs::write(shared.join("main.lua"), "return {}").unwrap();

        let package = temp.path().join("evil");
        write_package(
            &package,
            r#"{ "name": "evil", "entry": "../shared/main.lua" }"#,
            None,
        );
        let report = validate(&package);
        assert!(!report.valid);
        assert!(report.error.unwrap().contains("outside the extension directory"));

        let absolute = shared.join("main.lua").canonicalize().unwrap();
        write_package(
            &package,
            &format!(r#"{{ "name": "evil", "entry": {:?} }}"#, absolute.to_string_lossy()),
            None,
        );
        assert!(matches!(
            read_manifest(&package, Origin::Local),
            Err(ExtensionError::ManifestInvalid { .. })
        ));

        fs::create_dir_all(package.join("src")).unwrap();
        fs::write(package.join("src").join("main.lua"), "return {}").unwrap();
        write_package(
            &package,
            r#"{ "name": "evil", "entry": "src/../src/main.lua" }"#,
            None,
        );
        assert!(validate(&package).valid);
    }

    #[test]
    fn test_missing_manifest() {
        let temp = TempDir::new().unwrap();
        let err = read_manifest(temp.path(), Origin::Local).unwrap_err();
        assert!(matches!(err, ExtensionError::ManifestNotFound(_)));
    }

    #[test]
    fn test_missing_required_fields() {
        let temp = TempDir::new().unwrap();
        write_package(temp.path(), r#"{ "entry": "main.lua" }"#, Some("main.lua"));
        let err = read_manifest(temp.path(), Origin::Local).unwrap_err();
        assert!(err.to_string().contains("`name`"));

        write_package(temp.path(), r#"{ "name": "x" }"#, None);
        let err = read_manifest(temp.path(), Origin::Local).unwrap_err();
        assert!(err.to_string().contains("`entry`"));
    }

    #[test]
    fn test_entry_file_absent() {
        let temp = TempDir::new().unwrap();
        write_package(temp.path(), r#"{ "name": "x", "entry": "gone.lua" }"#, None);
        let err = read_manifest(temp.path(), Origin::Local).unwrap_err();
        assert!(matches!(err, ExtensionError::EntryNotFound { .. }));
    }

    #[test]
    fn test_duplicate_command_names_rejected() {
        let temp = TempDir::new().unwrap();
        write_package(
            temp.path(),
            r#"{ "name": "x", "entry": "main.lua", "commands": [{ "name": "a" }, { "name": "a" }] }"#,
            Some("main.lua"),
        );
        assert!(read_manifest(temp.path(), Origin::Local).is_err());
    }

    #[test]
    fn test_validate_reasons() {
        let temp = TempDir::new().unwrap();

        let file = temp.path().join("file.txt");
        fs::write(&file, "").unwrap();
        let report = validate(&file);
        assert!(!report.valid);
        assert!(report.error.unwrap().starts_with("Not a directory"));

        let empty = temp.path().join("empty");
        fs::create_dir_all(&empty).unwrap();
        let report = validate(&empty);
        assert!(report.error.unwrap().contains(MANIFEST_FILE));

        let no_entry = temp.path().join("no-entry");
        write_package(&no_entry, r#"{ "name": "x", "entry": "main.lua" }"#, None);
        let report = validate(&no_entry);
        assert!(report.error.unwrap().starts_with("Entry file not found"));

        let good = temp.path().join("good");
        write_package(&good, r#"{ "name": "good", "entry": "main.lua" }"#, Some("main.lua"));
        let report = validate(&good);
        assert!(report.valid);
        assert_eq!(report.info.unwrap().name, "good");
    }
}
