//! Extension loading and activation.
//!
//! Loading a package binds its root in the resolver, evaluates the entry
//! module, instantiates the default export and merges the instance's commands
//! into the registry.
//!
//! Handler calling conventions:
//! - functions given as a spec's `run`/`preview` (or as values of a
//!   `commands` map) are called as plain functions: `run()`, `preview(query)`;
//! - a manifest command without such a function falls back to the instance
//!   method of the same name, called as `instance:name()`.

use std::collections::BTreeMap;
use std::rc::Rc;

use mlua::{Function, Lua, LuaSerdeExt, Table, Value};

use super::capability::{self, CapabilityScope, HostServices};
use super::error::{ExtensionError, ExtensionResult};
use super::manifest::{CommandManifest, CommandMode, ExtensionPackage};
use super::resolver::ModuleResolver;
use super::ui::render_from_lua;
use super::ExtensionInfo;
use crate::commands::{
    Command, CommandId, CommandRegistry, Handler, PreviewFn, WindowSizeHint, ID_SEPARATOR,
};

/// A successfully activated extension.
pub struct Extension {
    pub package: ExtensionPackage,
    pub info: Rc<ExtensionInfo>,
    /// Keeps the instance reachable for its method handlers.
    instance: Value,
    scope: CapabilityScope,
    commands: Vec<CommandId>,
}

impl Extension {
    pub fn name(&self) -> &str {
        &self.package.name
    }

    /// Ids this extension contributed, in registration order.
    pub fn commands(&self) -> &[CommandId] {
        &self.commands
    }

    pub fn instance(&self) -> &Value {
        &self.instance
    }
}

/// Outcome of [`ExtensionLoader::load_all`].
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub failed: Vec<(String, ExtensionError)>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct ExtensionLoader {
    lua: Rc<Lua>,
    resolver: Rc<ModuleResolver>,
    services: HostServices,
    extensions: BTreeMap<String, Extension>,
}

impl ExtensionLoader {
    pub fn new(services: HostServices) -> ExtensionResult<Self> {
        let lua = Rc::new(Lua::new());
        let resolver = ModuleResolver::new(&lua, &services)?;

        Ok(Self {
            lua,
            resolver,
            services,
            extensions: BTreeMap::new(),
        })
    }

    pub fn services(&self) -> &HostServices {
        &self.services
    }

    pub fn resolver(&self) -> &Rc<ModuleResolver> {
        &self.resolver
    }

    pub fn get(&self, name: &str) -> Option<&Extension> {
        self.extensions.get(name)
    }

    pub fn extensions(&self) -> impl Iterator<Item = &Extension> {
        self.extensions.values()
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Load every package. A failing package is logged and skipped.
    pub fn load_all(
        &mut self,
        packages: Vec<ExtensionPackage>,
        registry: &mut CommandRegistry,
    ) -> LoadReport {
        let mut report = LoadReport::default();

        for package in packages {
            let name = package.name.clone();
            match self.load(package, registry) {
                Ok(()) => report.loaded.push(name),
                Err(e) => {
                    tracing::warn!(extension = %name, error = %e, "failed to load extension");
                    report.failed.push((name, e));
                }
            }
        }

        report
    }

    /// Activate one package and register its commands.
    ///
    /// A package whose name is already loaded replaces the old one.
    pub fn load(
        &mut self,
        package: ExtensionPackage,
        registry: &mut CommandRegistry,
    ) -> ExtensionResult<()> {
        let name = package.name.clone();
        if self.extensions.contains_key(&name) {
            tracing::info!(extension = %name, "reloading extension");
            self.unload(&name, registry);
        }

        let info = Rc::new(ExtensionInfo::from_package(&package));
        let scope = CapabilityScope::new(info.clone(), &self.services);
        let capability = capability::build(&self.lua, &scope, &self.services)
            .map_err(|e| activation_failed(&name, e))?;
        self.resolver.bind(package.directory.clone(), &name, capability);

        let (instance, commands) = match self.activate(&package, &info, &scope) {
            Ok(activated) => activated,
            Err(e) => {
                self.resolver.unbind(&name);
                return Err(activation_failed(&name, e));
            }
        };

        let mut ids = Vec::with_capacity(commands.len());
        for command in commands {
            let id = command.id.clone();
            if registry.register(command).is_ok() {
                ids.push(id);
            }
        }

        tracing::info!(
            extension = %name,
            origin = package.origin.label(),
            commands = ids.len(),
            "loaded extension"
        );

        self.extensions.insert(
            name,
            Extension {
                package,
                info,
                instance,
                scope,
                commands: ids,
            },
        );
        Ok(())
    }

    /// Remove an extension, its commands and its ownership root.
    pub fn unload(&mut self, name: &str, registry: &mut CommandRegistry) -> bool {
        let removed = registry.remove_extension(name);
        self.resolver.unbind(name);
        let existed = self.extensions.remove(name).is_some();
        if existed {
            tracing::debug!(extension = name, commands = removed, "unloaded extension");
        }
        existed
    }

    /// Register commands queued by `register_command` after activation.
    ///
    /// Returns how many new commands were added.
    pub fn drain_registrations(&mut self, registry: &mut CommandRegistry) -> usize {
        let lua = &self.lua;
        let mut added = 0;

        for extension in self.extensions.values_mut() {
            for table in extension.scope.take_registrations() {
                let spec = match CommandSpec::from_table(lua, &table, None) {
                    Ok(spec) => spec,
                    Err(e) => {
                        tracing::warn!(extension = %extension.info.name, error = %e, "invalid command registration");
                        continue;
                    }
                };
                let command = command_from_spec(lua, &extension.info, spec);
                let id = command.id.clone();
                if registry.register(command).is_ok() {
                    extension.commands.push(id);
                    added += 1;
                }
            }
        }

        added
    }

    fn activate(
        &self,
        package: &ExtensionPackage,
        info: &Rc<ExtensionInfo>,
        scope: &CapabilityScope,
    ) -> mlua::Result<(Value, Vec<Command>)> {
        let export = self.resolver.load_file(&self.lua, &package.entry_path)?;
        let instance = instantiate(export)?;

        let mut specs = declared_specs(&self.lua, &instance)?;
        for table in scope.take_registrations() {
            specs.push(CommandSpec::from_table(&self.lua, &table, None)?);
        }

        let mut commands = Vec::with_capacity(package.commands.len() + specs.len());
        for manifest in &package.commands {
            let spec = specs
                .iter()
                .position(|s| s.name == manifest.name)
                .map(|i| specs.remove(i));
            commands.push(self.command_from_manifest(info, manifest, spec, &instance)?);
        }
        for spec in specs {
            commands.push(command_from_spec(&self.lua, info, spec));
        }

        Ok((instance, commands))
    }

    fn command_from_manifest(
        &self,
        info: &Rc<ExtensionInfo>,
        manifest: &CommandManifest,
        spec: Option<CommandSpec>,
        instance: &Value,
    ) -> mlua::Result<Command> {
        let mut command = match manifest.kind {
            CommandMode::View => Command::view(info.clone(), &manifest.name, &manifest.title),
            CommandMode::Action => Command::action(info.clone(), &manifest.name, &manifest.title),
        };
        command.description = manifest.description.clone();
        command.icon = manifest.icon.clone();
        command.keywords = manifest.keywords.clone();
        command.window_size = manifest.window_size_hint;

        let (run, preview) = match spec {
            Some(spec) => {
                command.window_size = command.window_size.or(spec.window_size);
                (spec.run, spec.preview)
            }
            None => (None, None),
        };

        match run {
            Some(run) => command = command.with_handler(lua_handler(&self.lua, run, None)),
            None => {
                if let Some(method) = instance_method(instance, &manifest.name)? {
                    command = command
                        .with_handler(lua_handler(&self.lua, method, Some(instance.clone())));
                } else {
                    tracing::debug!(command = %command.id, "manifest command has no handler");
                }
            }
        }
        if let Some(preview) = preview {
            command = command.with_preview(lua_preview(&self.lua, preview));
        }

        Ok(command)
    }
}

fn activation_failed(extension: &str, error: mlua::Error) -> ExtensionError {
    ExtensionError::ActivationFailed {
        extension: extension.to_string(),
        reason: error.to_string(),
    }
}

/// Turn the entry module's default export into an instance.
fn instantiate(export: Value) -> mlua::Result<Value> {
    let instance = match export {
        Value::Function(constructor) => constructor.call::<Value>(())?,
        Value::Table(class) => match class.get::<Option<Function>>("new")? {
            Some(new) => new.call::<Value>(class)?,
            None => Value::Table(class),
        },
        Value::Nil => {
            return Err(mlua::Error::RuntimeError(
                "entry module has no default export".to_string(),
            ))
        }
        other => {
            return Err(mlua::Error::RuntimeError(format!(
                "default export is a {} and cannot be instantiated",
                other.type_name()
            )))
        }
    };

    if instance.is_nil() {
        return Err(mlua::Error::RuntimeError(
            "extension constructor returned nil".to_string(),
        ));
    }
    Ok(instance)
}

fn instance_method(instance: &Value, name: &str) -> mlua::Result<Option<Function>> {
    match instance {
        Value::Table(table) => table.get::<Option<Function>>(name),
        _ => Ok(None),
    }
}

/// Specs from the instance's `commands` table.
///
/// An array holds spec tables. A map goes from name to a function or a spec
/// and is read in name order.
fn declared_specs(lua: &Lua, instance: &Value) -> mlua::Result<Vec<CommandSpec>> {
    let commands = match instance {
        Value::Table(table) => match table.get::<Value>("commands")? {
            Value::Table(commands) => commands,
            _ => return Ok(Vec::new()),
        },
        _ => return Ok(Vec::new()),
    };

    if commands.raw_len() > 0 {
        return commands
            .sequence_values::<Table>()
            .map(|spec| CommandSpec::from_table(lua, &spec?, None))
            .collect();
    }

    let mut entries = commands
        .pairs::<String, Value>()
        .collect::<mlua::Result<Vec<_>>>()?;
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    entries
        .into_iter()
        .map(|(name, value)| match value {
            Value::Function(run) => Ok(CommandSpec::from_function(name, run)),
            Value::Table(spec) => CommandSpec::from_table(lua, &spec, Some(&name)),
            other => Err(mlua::Error::RuntimeError(format!(
                "command '{}' must be a function or a table, got {}",
                name,
                other.type_name()
            ))),
        })
        .collect()
}

/// A command described from Lua.
struct CommandSpec {
    name: String,
    title: Option<String>,
    description: Option<String>,
    icon: Option<String>,
    keywords: Vec<String>,
    mode: CommandMode,
    window_size: Option<WindowSizeHint>,
    run: Option<Function>,
    preview: Option<Function>,
}

impl CommandSpec {
    fn from_function(name: String, run: Function) -> Self {
        Self {
            name,
            title: None,
            description: None,
            icon: None,
            keywords: Vec::new(),
            mode: CommandMode::View,
            window_size: None,
            run: Some(run),
            preview: None,
        }
    }

    fn from_table(lua: &Lua, table: &Table, fallback_name: Option<&str>) -> mlua::Result<Self> {
        let name = table
            .get::<Option<String>>("name")?
            .or_else(|| fallback_name.map(str::to_string))
            .filter(|n| !n.is_empty())
            .ok_or_else(|| mlua::Error::RuntimeError("command spec is missing `name`".to_string()))?;
        if name.contains(ID_SEPARATOR) {
            return Err(mlua::Error::RuntimeError(format!(
                "command name '{name}' must not contain '{ID_SEPARATOR}'"
            )));
        }

        let mode = match table.get::<Option<String>>("kind")?.as_deref() {
            None | Some("view") => CommandMode::View,
            Some("action") => CommandMode::Action,
            Some(other) => {
                return Err(mlua::Error::RuntimeError(format!(
                    "command '{name}' has unknown kind '{other}'"
                )))
            }
        };

        let window_size = match table.get::<Value>("window_size")? {
            Value::Nil => None,
            hint => Some(lua.from_value::<WindowSizeHint>(hint)?),
        };

        Ok(Self {
            title: table.get("title")?,
            description: table.get("description")?,
            icon: table.get("icon")?,
            keywords: table.get::<Option<Vec<String>>>("keywords")?.unwrap_or_default(),
            mode,
            window_size,
            run: table.get("run")?,
            preview: table.get("preview")?,
            name,
        })
    }
}

fn command_from_spec(lua: &Rc<Lua>, info: &Rc<ExtensionInfo>, spec: CommandSpec) -> Command {
    let title = spec
        .title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| spec.name.clone());
    let mut command = match spec.mode {
        CommandMode::View => Command::view(info.clone(), &spec.name, &title),
        CommandMode::Action => Command::action(info.clone(), &spec.name, &title),
    };
    command.description = spec.description.unwrap_or_default();
    command.icon = spec.icon;
    command.keywords = spec.keywords;
    command.window_size = spec.window_size;

    if let Some(run) = spec.run {
        command = command.with_handler(lua_handler(lua, run, None));
    }
    if let Some(preview) = spec.preview {
        command = command.with_preview(lua_preview(lua, preview));
    }
    command
}

fn lua_handler(lua: &Rc<Lua>, func: Function, this: Option<Value>) -> Handler {
    let lua = lua.clone();
    Rc::new(move || {
        let value = match &this {
            Some(this) => func.call::<Value>(this.clone())?,
            None => func.call::<Value>(())?,
        };
        render_from_lua(&lua, value)
    })
}

fn lua_preview(lua: &Rc<Lua>, func: Function) -> PreviewFn {
    let lua = lua.clone();
    Rc::new(move |query: &str| {
        let value = func.call::<Value>(query)?;
        render_from_lua(&lua, value)
    })
}
