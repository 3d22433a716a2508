//! Capability objects handed to extension code.
//!
//! `require("beacon")` returns the capability table of the extension that owns
//! the requesting file. Everything an extension can do to the host goes
//! through this table: registering commands, scoped storage, clipboard,
//! window requests and paths. Extension code never sees the registry, the
//! navigation stack or the shortcut table directly.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::rc::Rc;

use mlua::{Lua, LuaSerdeExt, SerializeOptions, Table, Value};

use super::storage::ExtensionStorage;
use super::ExtensionInfo;
use crate::commands::{CommandId, WindowSize, ID_SEPARATOR};
use crate::platform::ClipboardAccess;

/// Module name that resolves to the caller's capability table.
pub const HOST_MODULE: &str = "beacon";

/// Window requests made by extension code, applied by the launcher once the
/// current call into Lua has returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostRequest {
    Show,
    Hide,
    Resize(WindowSize),
}

/// Shared queue of [`HostRequest`]s.
#[derive(Debug, Clone, Default)]
pub struct HostRequests(Rc<RefCell<VecDeque<HostRequest>>>);

impl HostRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, request: HostRequest) {
        self.0.borrow_mut().push_back(request);
    }

    pub fn drain(&self) -> Vec<HostRequest> {
        self.0.borrow_mut().drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

/// Host services common to every capability object.
#[derive(Clone)]
pub struct HostServices {
    pub clipboard: Rc<dyn ClipboardAccess>,
    pub requests: HostRequests,
    /// Root for per-extension data (`<data_dir>/extensions/<name>`).
    pub data_dir: PathBuf,
}

impl HostServices {
    pub fn extension_data_dir(&self, extension: &str) -> PathBuf {
        self.data_dir.join("extensions").join(extension)
    }
}

/// Command specs queued by `register_command`, drained by the loader.
pub type RegistrationSink = Rc<RefCell<Vec<Table>>>;

/// Everything a capability object is scoped to.
pub struct CapabilityScope {
    pub info: Rc<ExtensionInfo>,
    pub sink: RegistrationSink,
    pub storage: Rc<RefCell<ExtensionStorage>>,
}

impl CapabilityScope {
    pub fn new(info: Rc<ExtensionInfo>, services: &HostServices) -> Self {
        let storage = ExtensionStorage::open(&info.name, services.extension_data_dir(&info.name));
        Self {
            info,
            sink: Rc::new(RefCell::new(Vec::new())),
            storage: Rc::new(RefCell::new(storage)),
        }
    }

    /// Take every registration queued so far.
    pub fn take_registrations(&self) -> Vec<Table> {
        std::mem::take(&mut *self.sink.borrow_mut())
    }
}

/// Build the capability table for one extension.
pub fn build(lua: &Lua, scope: &CapabilityScope, services: &HostServices) -> mlua::Result<Table> {
    let cap = lua.create_table()?;
    let info = &scope.info;

    let extension = lua.create_table()?;
    extension.set("name", info.name.as_str())?;
    extension.set("title", info.title.as_str())?;
    extension.set("directory", info.directory.to_string_lossy().as_ref())?;
    extension.set("version", info.version.as_deref())?;
    cap.set("extension", extension)?;

    let owner = info.name.clone();
    let sink = scope.sink.clone();
    cap.set(
        "register_command",
        lua.create_function(move |_, spec: Table| {
            let name: Option<String> = spec.get("name")?;
            let name = name.filter(|n| !n.is_empty()).ok_or_else(|| {
                mlua::Error::RuntimeError("register_command: `name` is required".to_string())
            })?;
            if name.contains(ID_SEPARATOR) {
                return Err(mlua::Error::RuntimeError(format!(
                    "register_command: name '{name}' must not contain '{ID_SEPARATOR}'"
                )));
            }
            // A missing title falls back to the name, as for manifest commands
            sink.borrow_mut().push(spec);
            Ok(CommandId::new(&owner, &name).to_string())
        })?,
    )?;

    cap.set("storage", storage_table(lua, scope)?)?;

    let paths = lua.create_table()?;
    let data_dir = services.extension_data_dir(&info.name);
    paths.set("extension", info.directory.to_string_lossy().as_ref())?;
    paths.set("data", data_dir.to_string_lossy().as_ref())?;
    let root = info.directory.clone();
    paths.set(
        "resolve",
        lua.create_function(move |_, relative: String| {
            Ok(root.join(relative).to_string_lossy().into_owned())
        })?,
    )?;
    cap.set("paths", paths)?;

    add_host_services(lua, &cap, services, Some(info.name.clone()))?;
    Ok(cap)
}

/// Capability for code that belongs to no extension.
///
/// It carries the shared host services but cannot register commands or
/// touch storage.
pub fn build_generic(lua: &Lua, services: &HostServices) -> mlua::Result<Table> {
    let cap = lua.create_table()?;
    cap.set(
        "register_command",
        lua.create_function(|_, _: Value| {
            Err::<(), _>(mlua::Error::RuntimeError(
                "register_command is only available to extension code".to_string(),
            ))
        })?,
    )?;
    add_host_services(lua, &cap, services, None)?;
    Ok(cap)
}

fn storage_table(lua: &Lua, scope: &CapabilityScope) -> mlua::Result<Table> {
    let table = lua.create_table()?;

    let storage = scope.storage.clone();
    table.set(
        "get",
        lua.create_function(move |lua, key: String| match storage.borrow().get(&key) {
            Some(value) => lua.to_value_with(
                &value,
                SerializeOptions::new()
                    .serialize_none_to_null(false)
                    .serialize_unit_to_null(false),
            ),
            None => Ok(Value::Nil),
        })?,
    )?;

    let storage = scope.storage.clone();
    table.set(
        "set",
        lua.create_function(move |lua, (key, value): (String, Value)| {
            let value: serde_json::Value = lua.from_value(value)?;
            storage
                .borrow_mut()
                .set(&key, value)
                .map_err(mlua::Error::external)
        })?,
    )?;

    let storage = scope.storage.clone();
    table.set(
        "remove",
        lua.create_function(move |_, key: String| {
            storage
                .borrow_mut()
                .remove(&key)
                .map_err(mlua::Error::external)
        })?,
    )?;

    let storage = scope.storage.clone();
    table.set(
        "keys",
        lua.create_function(move |_, ()| Ok(storage.borrow().keys()))?,
    )?;

    let storage = scope.storage.clone();
    table.set(
        "clear",
        lua.create_function(move |_, ()| {
            storage.borrow_mut().clear().map_err(mlua::Error::external)
        })?,
    )?;

    Ok(table)
}

fn add_host_services(
    lua: &Lua,
    cap: &Table,
    services: &HostServices,
    extension: Option<String>,
) -> mlua::Result<()> {
    let clipboard = lua.create_table()?;
    let cb = services.clipboard.clone();
    clipboard.set("read", lua.create_function(move |_, ()| Ok(cb.get_text()))?)?;
    let cb = services.clipboard.clone();
    clipboard.set(
        "write",
        lua.create_function(move |_, text: String| {
            cb.set_text(&text);
            Ok(())
        })?,
    )?;
    cap.set("clipboard", clipboard)?;

    let window = lua.create_table()?;
    let requests = services.requests.clone();
    window.set(
        "show",
        lua.create_function(move |_, ()| {
            requests.push(HostRequest::Show);
            Ok(())
        })?,
    )?;
    let requests = services.requests.clone();
    window.set(
        "hide",
        lua.create_function(move |_, ()| {
            requests.push(HostRequest::Hide);
            Ok(())
        })?,
    )?;
    let requests = services.requests.clone();
    window.set(
        "resize",
        lua.create_function(move |_, (width, height): (u32, u32)| {
            requests.push(HostRequest::Resize(WindowSize::new(width, height)));
            Ok(())
        })?,
    )?;
    cap.set("window", window)?;

    let source = extension.unwrap_or_else(|| "host".to_string());
    cap.set(
        "log",
        lua.create_function(move |_, (level, message): (String, Option<String>)| {
            let (level, message) = match message {
                Some(message) => (level, message),
                None => ("info".to_string(), level),
            };
            match level.as_str() {
                "error" => tracing::error!(extension = %source, "{}", message),
                "warn" => tracing::warn!(extension = %source, "{}", message),
                "debug" => tracing::debug!(extension = %source, "{}", message),
                _ => tracing::info!(extension = %source, "{}", message),
            }
            Ok(())
        })?,
    )?;

    Ok(())
}
