//! Module resolution for extension code.
//!
//! The resolver is an ordinary object passed down the loader's call chain.
//! Each module file is evaluated in its own environment table whose `require`
//! closure remembers the file it belongs to, so attribution never depends on
//! which load happens to be in progress.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use mlua::{Lua, Table, Value};

use super::capability::{self, HostServices, HOST_MODULE};
use super::error::ExtensionResult;
use super::ownership::OwnershipIndex;
use super::ui::{self, UI_MODULE};

const MODULE_SUFFIX: &str = ".lua";

pub struct ModuleResolver {
    /// Canonical `beacon/ui` table, shared by every module.
    ui: Table,

    /// `beacon` table for files outside every extension root.
    generic: Table,

    ownership: RefCell<OwnershipIndex>,

    /// Capability table per owning extension.
    capabilities: RefCell<HashMap<String, Table>>,

    /// Evaluated modules by canonical path.
    modules: RefCell<HashMap<PathBuf, Value>>,

    /// Modules currently being evaluated, for cycle detection.
    loading: RefCell<Vec<PathBuf>>,
}

impl ModuleResolver {
    pub fn new(lua: &Lua, services: &HostServices) -> ExtensionResult<Rc<Self>> {
        Ok(Rc::new(Self {
            ui: ui::build(lua)?,
            generic: capability::build_generic(lua, services)?,
            ownership: RefCell::new(OwnershipIndex::new()),
            capabilities: RefCell::new(HashMap::new()),
            modules: RefCell::new(HashMap::new()),
            loading: RefCell::new(Vec::new()),
        }))
    }

    /// Attach `root` to `owner` and remember the owner's capability table.
    pub fn bind(&self, root: PathBuf, owner: &str, capability: Table) {
        self.ownership.borrow_mut().bind(root, owner);
        self.capabilities
            .borrow_mut()
            .insert(owner.to_string(), capability);
    }

    /// Forget `owner`: its root, its capability and its cached modules.
    pub fn unbind(&self, owner: &str) {
        let root = self
            .ownership
            .borrow()
            .root_of(owner)
            .map(Path::to_path_buf);
        if let Some(root) = root {
            self.modules
                .borrow_mut()
                .retain(|path, _| !path.starts_with(&root));
        }
        self.ownership.borrow_mut().unbind(owner);
        self.capabilities.borrow_mut().remove(owner);
    }

    pub fn owner_of(&self, file: &Path) -> Option<String> {
        self.ownership.borrow().owner_of(file)
    }

    /// The `beacon` table a module at `file` receives.
    pub fn capability_for(&self, file: &Path) -> Table {
        let owner = self.owner_of(file);
        let scoped = owner
            .as_ref()
            .and_then(|owner| self.capabilities.borrow().get(owner).cloned());

        match scoped {
            Some(cap) => cap,
            None => {
                tracing::debug!(file = %file.display(), "no owning extension, using host capability");
                self.generic.clone()
            }
        }
    }

    pub fn ui(&self) -> &Table {
        &self.ui
    }

    pub fn loaded_modules(&self) -> usize {
        self.modules.borrow().len()
    }

    /// Evaluate the module at `path` (once) and return its value.
    pub fn load_file(self: &Rc<Self>, lua: &Lua, path: &Path) -> mlua::Result<Value> {
        let path = path.canonicalize().map_err(|e| {
            mlua::Error::RuntimeError(format!("cannot open module {}: {}", path.display(), e))
        })?;

        if let Some(value) = self.modules.borrow().get(&path) {
            return Ok(value.clone());
        }
        if self.loading.borrow().contains(&path) {
            return Err(mlua::Error::RuntimeError(format!(
                "circular require of {}",
                path.display()
            )));
        }

        let source = std::fs::read_to_string(&path).map_err(|e| {
            mlua::Error::RuntimeError(format!("cannot read module {}: {}", path.display(), e))
        })?;
        let env = self.module_env(lua, &path)?;

        // No RefCell borrow may be held while Lua runs: nested requires
        // re-enter the resolver.
        self.loading.borrow_mut().push(path.clone());
        let result = lua
            .load(source)
            .set_name(path.display().to_string())
            .set_environment(env)
            .eval::<Value>();
        self.loading.borrow_mut().retain(|p| p != &path);

        let value = result?;
        self.modules.borrow_mut().insert(path, value.clone());
        Ok(value)
    }

    fn module_env(self: &Rc<Self>, lua: &Lua, path: &Path) -> mlua::Result<Table> {
        let env = lua.create_table()?;
        let mt = lua.create_table()?;
        mt.set("__index", lua.globals())?;
        env.set_metatable(Some(mt));

        let resolver: Weak<Self> = Rc::downgrade(self);
        let requester = path.to_path_buf();
        env.set(
            "require",
            lua.create_function(move |lua, spec: String| {
                let resolver = resolver.upgrade().ok_or_else(|| {
                    mlua::Error::RuntimeError("module resolver is gone".to_string())
                })?;
                resolver.require(lua, &requester, &spec)
            })?,
        )?;

        Ok(env)
    }

    fn require(self: &Rc<Self>, lua: &Lua, requester: &Path, spec: &str) -> mlua::Result<Value> {
        match spec {
            UI_MODULE => Ok(Value::Table(self.ui.clone())),
            HOST_MODULE => Ok(Value::Table(self.capability_for(requester))),
            _ => {
                if let Some(path) = resolve_relative(requester, spec) {
                    let value = self.load_file(lua, &path)?;
                    // Lua convention: a module that returns nothing yields `true`
                    return Ok(if value.is_nil() { Value::Boolean(true) } else { value });
                }

                // Fall back to modules preloaded into the host state
                let package: Option<Table> = lua.globals().get("package")?;
                if let Some(package) = package {
                    let loaded: Table = package.get("loaded")?;
                    let value: Value = loaded.get(spec)?;
                    if !value.is_nil() {
                        return Ok(value);
                    }
                }

                Err(mlua::Error::RuntimeError(format!(
                    "module '{}' not found (required from {})",
                    spec,
                    requester.display()
                )))
            }
        }
    }
}

/// Resolve `spec` against the requesting file's directory.
///
/// `./x`, `../x` and `dir/x` are accepted; `.lua` is appended when missing,
/// and `x/init.lua` is tried for directories.
fn resolve_relative(requester: &Path, spec: &str) -> Option<PathBuf> {
    let base = requester.parent()?;
    let candidate = base.join(spec);

    if spec.ends_with(MODULE_SUFFIX) && candidate.is_file() {
        return Some(candidate);
    }

    let mut with_suffix = candidate.clone().into_os_string();
    with_suffix.push(MODULE_SUFFIX);
    let with_suffix = PathBuf::from(with_suffix);
    if with_suffix.is_file() {
        return Some(with_suffix);
    }

    let init = candidate.join("init.lua");
    if init.is_file() {
        return Some(init);
    }

    None
}
