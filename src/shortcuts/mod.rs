//! Global shortcut bindings.
//!
//! Key combinations are normalized into a canonical
//! `Control+Alt+Shift+Super+Key` form so that `ctrl+k`, `Control+K` and
//! `CmdOrCtrl+K` (off macOS) all compare equal.

mod backend;
mod manager;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::commands::CommandId;

pub use backend::{HotkeyBackend, NoopBackend};
#[cfg(feature = "global-hotkey")]
pub use backend::GlobalHotkeyBackend;
pub use manager::{ShortcutBinding, ShortcutManager, TOGGLE_COMMAND};

/// Errors that can occur when parsing a key combination.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyComboError {
    #[error("key combination is empty")]
    Empty,
    #[error("key combination '{0}' has no key, only modifiers")]
    MissingKey(String),
    #[error("unknown key '{0}'")]
    UnknownKey(String),
    #[error("key combination has more than one key: '{0}' and '{1}'")]
    TooManyKeys(String, String),
}

/// Errors from the shortcut table.
#[derive(Error, Debug)]
pub enum ShortcutError {
    #[error("Invalid shortcut: {0}")]
    Parse(#[from] KeyComboError),

    #[error("Shortcut {combo} is already bound to '{existing}'")]
    Conflict { combo: KeyCombo, existing: CommandId },

    #[error("No shortcut bound for '{0}'")]
    NotBound(String),

    #[error("Hotkey backend rejected the shortcut: {0}")]
    Backend(String),
}

/// Modifier keys of a [`KeyCombo`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Modifiers {
    pub control: bool,
    pub alt: bool,
    pub shift: bool,
    pub super_key: bool,
}

impl Modifiers {
    pub fn any(&self) -> bool {
        self.control || self.alt || self.shift || self.super_key
    }
}

/// A normalized global hotkey.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyCombo {
    modifiers: Modifiers,
    key: String,
}

impl KeyCombo {
    /// Parse a `+`-separated combination such as `"ctrl+alt+k"`.
    pub fn parse(raw: &str) -> Result<Self, KeyComboError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(KeyComboError::Empty);
        }

        let mut modifiers = Modifiers::default();
        let mut key: Option<(&str, String)> = None;

        for token in raw.split('+').map(str::trim).filter(|t| !t.is_empty()) {
            match token.to_lowercase().as_str() {
                "ctrl" | "control" | "ctl" => modifiers.control = true,
                "alt" | "opt" | "option" => modifiers.alt = true,
                "shift" => modifiers.shift = true,
                "super" | "cmd" | "command" | "meta" | "win" => modifiers.super_key = true,
                "cmdorctrl" | "commandorcontrol" | "mod" => {
                    if cfg!(target_os = "macos") {
                        modifiers.super_key = true;
                    } else {
                        modifiers.control = true;
                    }
                }
                _ => {
                    let canonical = canonical_key(token)
                        .ok_or_else(|| KeyComboError::UnknownKey(token.to_string()))?;
                    if let Some((first, _)) = &key {
                        return Err(KeyComboError::TooManyKeys(
                            first.to_string(),
                            token.to_string(),
                        ));
                    }
                    key = Some((token, canonical));
                }
            }
        }

        match key {
            Some((_, key)) => Ok(Self { modifiers, key }),
            None => Err(KeyComboError::MissingKey(raw.to_string())),
        }
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Canonical key name, e.g. `"K"`, `"Space"`, `"F5"`.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.modifiers;
        for (on, name) in [
            (m.control, "Control"),
            (m.alt, "Alt"),
            (m.shift, "Shift"),
            (m.super_key, "Super"),
        ] {
            if on {
                write!(f, "{name}+")?;
            }
        }
        f.write_str(&self.key)
    }
}

impl FromStr for KeyCombo {
    type Err = KeyComboError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for KeyCombo {
    type Error = KeyComboError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<KeyCombo> for String {
    fn from(combo: KeyCombo) -> Self {
        combo.to_string()
    }
}

const NAMED_KEYS: &[(&[&str], &str)] = &[
    (&["space", "spacebar"], "Space"),
    (&["enter", "return"], "Enter"),
    (&["tab"], "Tab"),
    (&["escape", "esc"], "Escape"),
    (&["backspace"], "Backspace"),
    (&["delete", "del"], "Delete"),
    (&["insert", "ins"], "Insert"),
    (&["home"], "Home"),
    (&["end"], "End"),
    (&["pageup", "pgup"], "PageUp"),
    (&["pagedown", "pgdn"], "PageDown"),
    (&["up", "arrowup"], "ArrowUp"),
    (&["down", "arrowdown"], "ArrowDown"),
    (&["left", "arrowleft"], "ArrowLeft"),
    (&["right", "arrowright"], "ArrowRight"),
    (&["minus", "-"], "Minus"),
    (&["equal", "="], "Equal"),
    (&["comma", ","], "Comma"),
    (&["period", "."], "Period"),
    (&["slash", "/"], "Slash"),
    (&["backslash", "\\"], "Backslash"),
    (&["semicolon", ";"], "Semicolon"),
    (&["quote", "'"], "Quote"),
    (&["backquote", "`"], "Backquote"),
    (&["bracketleft", "["], "BracketLeft"),
    (&["bracketright", "]"], "BracketRight"),
];

fn canonical_key(token: &str) -> Option<String> {
    let lower = token.to_lowercase();

    if let Some((_, name)) = NAMED_KEYS
        .iter()
        .find(|(aliases, _)| aliases.contains(&lower.as_str()))
    {
        return Some((*name).to_string());
    }

    let mut chars = token.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphanumeric() {
            return Some(c.to_ascii_uppercase().to_string());
        }
    }

    // Letter and digit codes as written by some frontends: KeyK, Digit1
    for prefix in ["key", "digit"] {
        if let Some(rest) = lower.strip_prefix(prefix) {
            let mut chars = rest.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                if c.is_ascii_alphanumeric() {
                    return Some(c.to_ascii_uppercase().to_string());
                }
            }
        }
    }

    if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
        if (1..=24).contains(&n) {
            return Some(format!("F{n}"));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_modifier_order_and_case() {
        let combo = KeyCombo::parse("shift+ctrl+k").unwrap();
        assert_eq!(combo.to_string(), "Control+Shift+K");
        assert_eq!(combo, KeyCombo::parse("Control+Shift+K").unwrap());
        assert_eq!(combo, KeyCombo::parse(" ctl + SHIFT + KeyK ").unwrap());
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(
            KeyCombo::parse("Cmd+Option+Space").unwrap().to_string(),
            "Alt+Super+Space"
        );
        assert_eq!(KeyCombo::parse("Meta+esc").unwrap().to_string(), "Super+Escape");
        assert_eq!(KeyCombo::parse("alt+f12").unwrap().to_string(), "Alt+F12");
        assert_eq!(KeyCombo::parse("Control+,").unwrap().key(), "Comma");
    }

    #[test]
    fn test_cmd_or_ctrl_is_platform_dependent() {
        let combo = KeyCombo::parse("CmdOrCtrl+P").unwrap();
        if cfg!(target_os = "macos") {
            assert!(combo.modifiers().super_key);
        } else {
            assert!(combo.modifiers().control);
        }
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(KeyCombo::parse("  "), Err(KeyComboError::Empty));
        assert!(matches!(
            KeyCombo::parse("ctrl+shift"),
            Err(KeyComboError::MissingKey(_))
        ));
        assert_eq!(
            KeyCombo::parse("ctrl+hyper"),
            Err(KeyComboError::UnknownKey("hyper".to_string()))
        );
        assert!(matches!(
            KeyCombo::parse("a+b"),
            Err(KeyComboError::TooManyKeys(_, _))
        ));
        assert!(KeyCombo::parse("F25").is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let combo: KeyCombo = serde_json::from_str("\"alt+space\"").unwrap();
        assert_eq!(serde_json::to_string(&combo).unwrap(), "\"Alt+Space\"");
    }
}
