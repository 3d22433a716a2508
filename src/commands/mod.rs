//! Commands contributed by extensions.
//!
//! A command is identified by the pair `(extension, command)`, written as
//! `"<extension>#<command>"`. Commands are either views, which produce a frame
//! for the navigation stack, or actions, which run for their side effect.

pub mod registry;

use std::borrow::Borrow;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::extensions::{ExtensionError, ExtensionInfo, ExtensionResult};

pub use registry::{CommandOverlay, CommandRegistry, PreviewHit, ResolvedCommand};

/// Separator between the extension and command parts of a [`CommandId`].
pub const ID_SEPARATOR: char = '#';

/// Composite command identifier, `"<extension>#<command>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommandId(String);

impl CommandId {
    pub fn new(extension: &str, command: &str) -> Self {
        Self(format!("{extension}{ID_SEPARATOR}{command}"))
    }

    /// Parse a `"<extension>#<command>"` string.
    pub fn parse(raw: &str) -> ExtensionResult<Self> {
        match raw.split_once(ID_SEPARATOR) {
            Some((ext, cmd)) if !ext.is_empty() && !cmd.is_empty() => Ok(Self(raw.to_string())),
            _ => Err(ExtensionError::InvalidCommandId(raw.to_string())),
        }
    }

    pub fn extension(&self) -> &str {
        self.0
            .split_once(ID_SEPARATOR)
            .map(|(ext, _)| ext)
            .unwrap_or(&self.0)
    }

    pub fn command(&self) -> &str {
        self.0
            .split_once(ID_SEPARATOR)
            .map(|(_, cmd)| cmd)
            .unwrap_or("")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CommandId {
    type Err = ExtensionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CommandId {
    type Error = ExtensionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CommandId> for String {
    fn from(id: CommandId) -> Self {
        id.0
    }
}

impl Borrow<str> for CommandId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Window dimensions for a visible frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

impl WindowSize {
    pub const SMALL: WindowSize = WindowSize { width: 560, height: 320 };
    pub const MEDIUM: WindowSize = WindowSize { width: 760, height: 480 };
    pub const LARGE: WindowSize = WindowSize { width: 960, height: 640 };

    /// Size used for frames whose command declares no hint.
    pub const DEFAULT: WindowSize = Self::MEDIUM;

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Named window size presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizePreset {
    Small,
    Medium,
    Large,
}

/// A command's declared window size: a preset name or explicit dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WindowSizeHint {
    Preset(SizePreset),
    Explicit(WindowSize),
}

impl WindowSizeHint {
    pub fn resolve(self) -> WindowSize {
        match self {
            WindowSizeHint::Preset(SizePreset::Small) => WindowSize::SMALL,
            WindowSizeHint::Preset(SizePreset::Medium) => WindowSize::MEDIUM,
            WindowSizeHint::Preset(SizePreset::Large) => WindowSize::LARGE,
            WindowSizeHint::Explicit(size) => size,
        }
    }
}

/// Predicate consulted before the top frame may be popped with Escape.
pub type EscapeHandler = Rc<dyn Fn() -> bool>;

/// Zero-argument command activation.
pub type Handler = Rc<dyn Fn() -> ExtensionResult<Option<RenderResult>>>;

/// Preview evaluation for a search query.
pub type PreviewFn = Rc<dyn Fn(&str) -> ExtensionResult<Option<RenderResult>>>;

/// Output of a command handler or preview: an opaque component tree.
#[derive(Clone)]
pub struct RenderResult {
    kind: String,
    props: serde_json::Value,
    on_escape: Option<EscapeHandler>,
}

impl RenderResult {
    pub fn new(kind: impl Into<String>, props: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            props,
            on_escape: None,
        }
    }

    /// A plain text frame.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new("text", serde_json::json!({ "text": text.into() }))
    }

    pub fn with_escape_handler(mut self, handler: EscapeHandler) -> Self {
        self.on_escape = Some(handler);
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn props(&self) -> &serde_json::Value {
        &self.props
    }

    pub fn escape_handler(&self) -> Option<&EscapeHandler> {
        self.on_escape.as_ref()
    }

    /// Text content, for `text` frames or any frame carrying a `text` prop.
    pub fn text_content(&self) -> Option<&str> {
        self.props.get("text").and_then(|v| v.as_str())
    }
}

impl fmt::Debug for RenderResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderResult")
            .field("kind", &self.kind)
            .field("props", &self.props)
            .field("on_escape", &self.on_escape.is_some())
            .finish()
    }
}

/// Whether a command navigates or fires.
#[derive(Clone)]
pub enum CommandKind {
    /// Produces a renderable frame.
    View(Option<Handler>),
    /// Runs for its side effect and never navigates.
    Action(Option<Handler>),
}

impl CommandKind {
    pub fn handler(&self) -> Option<&Handler> {
        match self {
            CommandKind::View(h) | CommandKind::Action(h) => h.as_ref(),
        }
    }

    pub fn is_view(&self) -> bool {
        matches!(self, CommandKind::View(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            CommandKind::View(_) => "view",
            CommandKind::Action(_) => "action",
        }
    }
}

impl fmt::Debug for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(handler: {})", self.label(), self.handler().is_some())
    }
}

/// A registered command.
///
/// Canonical entries are never mutated after registration; per-user overlays
/// live in the registry and are merged at read time.
#[derive(Clone)]
pub struct Command {
    pub id: CommandId,
    pub name: String,
    pub title: String,
    pub description: String,
    pub icon: Option<String>,
    pub keywords: Vec<String>,
    pub kind: CommandKind,
    pub window_size: Option<WindowSizeHint>,
    pub preview: Option<PreviewFn>,
    pub owner: Rc<ExtensionInfo>,
}

impl Command {
    pub fn view(owner: Rc<ExtensionInfo>, name: &str, title: &str) -> Self {
        Self::with_kind(owner, name, title, CommandKind::View(None))
    }

    pub fn action(owner: Rc<ExtensionInfo>, name: &str, title: &str) -> Self {
        Self::with_kind(owner, name, title, CommandKind::Action(None))
    }

    fn with_kind(owner: Rc<ExtensionInfo>, name: &str, title: &str, kind: CommandKind) -> Self {
        Self {
            id: CommandId::new(&owner.name, name),
            name: name.to_string(),
            title: title.to_string(),
            description: String::new(),
            icon: None,
            keywords: Vec::new(),
            kind,
            window_size: None,
            preview: None,
            owner,
        }
    }

    pub fn with_handler(mut self, handler: Handler) -> Self {
        self.kind = match self.kind {
            CommandKind::View(_) => CommandKind::View(Some(handler)),
            CommandKind::Action(_) => CommandKind::Action(Some(handler)),
        };
        self
    }

    pub fn with_preview(mut self, preview: PreviewFn) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_window_size(mut self, hint: WindowSizeHint) -> Self {
        self.window_size = Some(hint);
        self
    }

    /// Resolved frame size, falling back to [`WindowSize::DEFAULT`].
    pub fn resolved_window_size(&self) -> WindowSize {
        self.window_size
            .map(WindowSizeHint::resolve)
            .unwrap_or_default()
    }

    /// Run the bound handler. Commands without a handler produce nothing.
    pub fn invoke(&self) -> ExtensionResult<Option<RenderResult>> {
        match self.kind.handler() {
            Some(handler) => handler(),
            None => Ok(None),
        }
    }

    /// Icon to display, falling back to the owning extension's icon.
    pub fn display_icon(&self) -> Option<&str> {
        self.icon.as_deref().or(self.owner.icon.as_deref())
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("kind", &self.kind)
            .field("window_size", &self.window_size)
            .field("preview", &self.preview.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_id() {
        let id = CommandId::parse("notes#open").unwrap();
        assert_eq!(id.extension(), "notes");
        assert_eq!(id.command(), "open");
        assert_eq!(id.to_string(), "notes#open");

        assert!(CommandId::parse("notes").is_err());
        assert!(CommandId::parse("#open").is_err());
        assert!(CommandId::parse("notes#").is_err());
    }

    #[test]
    fn test_command_id_serde_as_string() {
        let id = CommandId::new("calc", "main");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"calc#main\"");

        let bad: Result<CommandId, _> = serde_json::from_str("\"calc\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_window_size_hint() {
        let preset: WindowSizeHint = serde_json::from_str("\"small\"").unwrap();
        assert_eq!(preset.resolve(), WindowSize::SMALL);

        let explicit: WindowSizeHint =
            serde_json::from_str(r#"{"width": 400, "height": 300}"#).unwrap();
        assert_eq!(explicit.resolve(), WindowSize::new(400, 300));
    }

    #[test]
    fn test_resolved_window_size_default() {
        let owner = Rc::new(ExtensionInfo::builtin("test", "Test"));
        let cmd = Command::view(owner.clone(), "main", "Main");
        assert_eq!(cmd.resolved_window_size(), WindowSize::DEFAULT);

        let cmd = Command::view(owner, "big", "Big")
            .with_window_size(WindowSizeHint::Preset(SizePreset::Large));
        assert_eq!(cmd.resolved_window_size(), WindowSize::LARGE);
    }

    #[test]
    fn test_invoke_without_handler() {
        let owner = Rc::new(ExtensionInfo::builtin("test", "Test"));
        let cmd = Command::view(owner, "main", "Main");
        assert!(cmd.invoke().unwrap().is_none());
    }
}
