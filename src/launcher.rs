//! The launcher context.
//!
//! `Launcher` owns the loader, the registry, the navigation stack and the
//! shortcut table, and is the only thing that routes between them. Nothing
//! in here is global; frontends and the CLI each build their own.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::builtins;
use crate::commands::{CommandId, CommandRegistry, PreviewHit, ResolvedCommand};
use crate::config::Config;
use crate::error::{BeaconError, BeaconResult};
use crate::extensions::{
    scan, validate, ExtensionError, ExtensionLoader, ExtensionRoot, HostRequest, LoadReport,
    ValidationReport,
};
use crate::extensions::capability::HostServices;
use crate::navigation::{Navigator, PushOutcome};
use crate::platform::{ClipboardAccess, HeadlessWindow, HostWindow, MemoryClipboard};
use crate::shortcuts::{HotkeyBackend, KeyCombo, NoopBackend, ShortcutError, ShortcutManager};

/// Platform pieces the launcher drives.
pub struct HostPlatform {
    pub window: Box<dyn HostWindow>,
    pub clipboard: Rc<dyn ClipboardAccess>,
    pub hotkeys: Box<dyn HotkeyBackend>,
}

impl HostPlatform {
    /// In-memory platform for the CLI and tests.
    pub fn headless() -> Self {
        Self {
            window: Box::new(HeadlessWindow::new()),
            clipboard: Rc::new(MemoryClipboard::new()),
            hotkeys: Box::new(NoopBackend::new()),
        }
    }
}

pub struct Launcher {
    config: Config,
    config_path: PathBuf,
    data_dir: PathBuf,
    /// Roots added on top of the configured ones, e.g. from the command line.
    extra_roots: Vec<ExtensionRoot>,
    loader: ExtensionLoader,
    registry: CommandRegistry,
    navigator: Navigator,
    shortcuts: ShortcutManager,
}

impl Launcher {
    pub fn new(
        config: Config,
        config_path: PathBuf,
        data_dir: PathBuf,
        platform: HostPlatform,
    ) -> BeaconResult<Self> {
        let services = HostServices {
            clipboard: platform.clipboard,
            requests: Default::default(),
            data_dir: data_dir.clone(),
        };

        Ok(Self {
            config,
            config_path,
            data_dir,
            extra_roots: Vec::new(),
            loader: ExtensionLoader::new(services)?,
            registry: CommandRegistry::new(),
            navigator: Navigator::new(platform.window),
            shortcuts: ShortcutManager::new(platform.hotkeys),
        })
    }

    /// Add an extension root that is scanned after the configured ones.
    pub fn with_extension_root(mut self, root: ExtensionRoot) -> Self {
        self.extra_roots.push(root);
        self
    }

    /// Register built-ins, load every extension, apply user overlays and
    /// shortcuts, then open the home command.
    pub fn boot(&mut self) -> BeaconResult<LoadReport> {
        builtins::register(&mut self.registry, &self.loader.services().requests)?;

        let report = self.load_extensions()?;
        self.apply_overlays();
        self.rebuild_shortcuts();

        self.navigator.set_home(self.config.home_command());
        if let Some(home) = self.config.home_command() {
            let outcome = self.navigator.push(&self.registry, home.as_str());
            if outcome != PushOutcome::Pushed {
                tracing::warn!(command = %home, ?outcome, "home command did not open");
            }
        }

        tracing::info!(
            extensions = self.loader.len(),
            commands = self.registry.len(),
            failed = report.failed.len(),
            "launcher ready"
        );
        Ok(report)
    }

    fn roots(&self) -> Vec<ExtensionRoot> {
        let mut roots = self.config.extension_roots(&self.data_dir);
        roots.extend(self.extra_roots.iter().cloned());
        roots
    }

    fn load_extensions(&mut self) -> BeaconResult<LoadReport> {
        let packages = scan(&self.roots())?;
        Ok(self.loader.load_all(packages, &mut self.registry))
    }

    /// Re-scan every root. Packages that disappeared are unloaded; the rest
    /// replace their previous instances.
    pub fn reload(&mut self) -> BeaconResult<LoadReport> {
        let packages = scan(&self.roots())?;
        let present: HashSet<&str> = packages.iter().map(|p| p.name.as_str()).collect();
        let gone: Vec<String> = self
            .loader
            .extensions()
            .map(|e| e.name().to_string())
            .filter(|name| !present.contains(name.as_str()))
            .collect();

        self.navigator.clear();
        for name in gone {
            self.loader.unload(&name, &mut self.registry);
        }

        let report = self.loader.load_all(packages, &mut self.registry);
        self.apply_overlays();
        self.rebuild_shortcuts();
        Ok(report)
    }

    fn apply_overlays(&mut self) {
        for (id, overlay) in self.config.command_overlays() {
            self.registry.set_overlay(id, overlay);
        }
    }

    fn rebuild_shortcuts(&mut self) {
        let skipped = self
            .shortcuts
            .rebuild_from_config(self.config.shortcut_entries());
        if !skipped.is_empty() {
            tracing::warn!(count = skipped.len(), "some shortcuts could not be bound");
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn loader(&self) -> &ExtensionLoader {
        &self.loader
    }

    pub fn shortcuts(&self) -> &ShortcutManager {
        &self.shortcuts
    }

    pub fn search(&self, query: &str) -> Vec<ResolvedCommand<'_>> {
        self.registry.search(query)
    }

    pub fn fuzzy_search(&self, query: &str) -> Vec<(ResolvedCommand<'_>, i64)> {
        self.registry.fuzzy_search(query)
    }

    pub fn preview(&self, query: &str) -> Vec<PreviewHit<'_>> {
        self.registry.preview(query)
    }

    /// Push a command onto the navigation stack.
    pub fn run(&mut self, id: &str) -> PushOutcome {
        let outcome = self.navigator.push(&self.registry, id);
        self.after_invoke();
        outcome
    }

    /// Swap the top frame for `id`.
    pub fn replace(&mut self, id: &str) -> PushOutcome {
        let outcome = self.navigator.replace(&self.registry, id);
        self.after_invoke();
        outcome
    }

    pub fn escape(&mut self) -> bool {
        let popped = self.navigator.escape();
        self.process_host_requests();
        popped
    }

    pub fn pop(&mut self) -> bool {
        self.navigator.pop()
    }

    fn after_invoke(&mut self) {
        let added = self.loader.drain_registrations(&mut self.registry);
        if added > 0 {
            tracing::debug!(added, "registered late commands");
        }
        self.process_host_requests();
    }

    /// Apply window requests queued by extension code.
    pub fn process_host_requests(&mut self) {
        for request in self.loader.services().requests.drain() {
            match request {
                HostRequest::Hide => self.navigator.clear(),
                HostRequest::Show => {
                    if self.navigator.is_empty() {
                        self.open_home();
                    } else {
                        self.navigator.ensure_visible();
                    }
                }
                HostRequest::Resize(size) => self.navigator.resize_top(size),
            }
        }
    }

    fn open_home(&mut self) -> PushOutcome {
        match self.navigator.home().cloned() {
            Some(home) => self.navigator.push(&self.registry, home.as_str()),
            None => PushOutcome::NotFound,
        }
    }

    /// React to a pressed global hotkey.
    ///
    /// The toggle combo hides a visible launcher (reported as `ActionFired`)
    /// or opens the home command. Other combos push their command and make
    /// sure the window is showing. Unbound combos yield `None`.
    pub fn handle_hotkey(&mut self, combo: &KeyCombo) -> Option<PushOutcome> {
        let id = self.shortcuts.command_for(combo)?.clone();

        if id == ShortcutManager::toggle_id() {
            if self.navigator.is_visible() {
                self.navigator.clear();
                return Some(PushOutcome::ActionFired);
            }
            let outcome = self.open_home();
            self.navigator.ensure_visible();
            return Some(outcome);
        }

        let outcome = self.run(id.as_str());
        self.navigator.ensure_visible();
        Some(outcome)
    }

    /// Dispatch every hotkey pressed since the last call.
    pub fn poll_hotkeys(&mut self) -> Vec<PushOutcome> {
        self.shortcuts
            .poll()
            .iter()
            .filter_map(|combo| self.handle_hotkey(combo))
            .collect()
    }

    /// Bind a global hotkey to a loaded command and persist it.
    pub fn bind_shortcut(&mut self, id: &str, combo: &str) -> BeaconResult<()> {
        let id = CommandId::parse(id)?;
        if !self.registry.contains(id.as_str()) {
            return Err(ExtensionError::CommandNotFound(id.to_string()).into());
        }
        let combo = KeyCombo::parse(combo).map_err(ShortcutError::from)?;

        self.shortcuts.bind(id.clone(), combo.clone())?;
        self.registry.set_shortcut(&id, Some(combo.to_string()));
        self.config.set_shortcut(&id, &combo.to_string());
        self.persist()
    }

    pub fn unbind_shortcut(&mut self, id: &str) -> BeaconResult<()> {
        let id = CommandId::parse(id)?;
        let had_config = self.config.remove_shortcut(&id);
        match self.shortcuts.unbind(&id) {
            Ok(_) => {}
            Err(ShortcutError::NotBound(_)) if had_config => {}
            Err(e) => return Err(e.into()),
        }
        self.registry.set_shortcut(&id, None);
        self.persist()
    }

    /// Change the launcher toggle hotkey and persist it.
    pub fn set_toggle_hotkey(&mut self, combo: &str) -> BeaconResult<()> {
        let combo = KeyCombo::parse(combo).map_err(ShortcutError::from)?;
        self.shortcuts.set_toggle_hotkey(combo.clone())?;
        self.config.general.toggle_hotkey = combo.to_string();
        self.persist()
    }

    pub fn set_command_disabled(&mut self, id: &str, disabled: bool) -> BeaconResult<()> {
        let id = CommandId::parse(id)?;
        self.registry.set_disabled(&id, disabled);
        self.config.set_command_disabled(&id, disabled);
        self.persist()
    }

    /// Validate a directory and, if it holds a package, link and load it.
    pub fn link_local(&mut self, path: &Path) -> BeaconResult<ValidationReport> {
        let report = validate(path);
        let package = match &report.info {
            Some(package) if report.valid => package.clone(),
            _ => return Ok(report),
        };

        if self.config.add_local_path(&package.directory) {
            self.persist()?;
        }
        self.loader.load(package, &mut self.registry)?;
        self.apply_overlays();
        Ok(report)
    }

    fn persist(&self) -> BeaconResult<()> {
        self.config.save_to(&self.config_path).map_err(|e| {
            BeaconError::Config(format!(
                "failed to save {}: {}",
                self.config_path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    use crate::commands::WindowSize;
    use crate::extensions::Origin;
    use crate::platform::WindowEvent;

    struct Fixture {
        temp: TempDir,
        window: HeadlessWindow,
        hotkeys: NoopBackend,
        launcher: Launcher,
    }

    fn write_extension(root: &Path, name: &str, commands: &str, main: &str) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("extension.json"),
            format!(r#"{{ "name": "{name}", "entry": "main.lua", "commands": {commands} }}"#),
        )
        .unwrap();
        fs::write(dir.join("main.lua"), main).unwrap();
        dir
    }

    fn fixture(setup: impl FnOnce(&Path)) -> Fixture {
        let temp = TempDir::new().unwrap();
        let dev = temp.path().join("dev");
        fs::create_dir_all(&dev).unwrap();
        setup(&dev);

        let window = HeadlessWindow::new();
        let hotkeys = NoopBackend::new();
        let platform = HostPlatform {
            window: Box::new(window.clone()),
            clipboard: Rc::new(MemoryClipboard::new()),
            hotkeys: Box::new(hotkeys.clone()),
        };

        let mut config = Config::default();
        config.extensions.development_dir = Some(dev.to_string_lossy().into_owned());
        let launcher = Launcher::new(
            config,
            temp.path().join("config.toml"),
            temp.path().join("data"),
            platform,
        )
        .unwrap();

        Fixture {
            temp,
            window,
            hotkeys,
            launcher,
        }
    }

    #[test]
    fn test_boot_opens_home() {
        let mut f = fixture(|_| {});
        let report = f.launcher.boot().unwrap();

        assert!(report.is_clean());
        assert_eq!(f.launcher.navigator().len(), 1);
        assert_eq!(
            f.launcher.navigator().top().unwrap().command().as_str(),
            "launcher#home"
        );
        assert_eq!(f.window.last_event(), Some(WindowEvent::Show(WindowSize::DEFAULT)));
        assert!(f.hotkeys.is_registered(&KeyCombo::parse("Alt+Space").unwrap()));
    }

    #[test]
    fn test_toggle_hotkey_hides_and_reopens() {
        let mut f = fixture(|_| {});
        f.launcher.boot().unwrap();
        let toggle = KeyCombo::parse("Alt+Space").unwrap();

        assert_eq!(f.launcher.handle_hotkey(&toggle), Some(PushOutcome::ActionFired));
        assert!(f.launcher.navigator().is_empty());
        assert!(!f.window.is_visible());

        assert_eq!(f.launcher.handle_hotkey(&toggle), Some(PushOutcome::Pushed));
        assert!(f.window.is_visible());
        assert_eq!(f.launcher.handle_hotkey(&KeyCombo::parse("F9").unwrap()), None);
    }

    #[test]
    fn test_bound_hotkey_pushes_and_persists() {
        let mut f = fixture(|dev| {
            write_extension(
                dev,
                "notes",
                r#"[{ "name": "open", "title": "Open Notes" }]"#,
                r#"return { open = function(self) return "notes" end }"#,
            );
        });
        f.launcher.boot().unwrap();

        f.launcher.bind_shortcut("notes#open", "ctrl+alt+n").unwrap();
        assert_eq!(
            f.launcher.registry().get("notes#open").unwrap().shortcut(),
            Some("Control+Alt+N")
        );
        let saved = Config::load_from(&f.temp.path().join("config.toml"));
        assert_eq!(saved.shortcuts["notes#open"].key, "Control+Alt+N");

        let outcome = f
            .launcher
            .handle_hotkey(&KeyCombo::parse("Control+Alt+N").unwrap());
        assert_eq!(outcome, Some(PushOutcome::Pushed));
        assert_eq!(f.launcher.navigator().len(), 2);

        assert!(matches!(
            f.launcher.bind_shortcut("notes#open", "Alt+Space"),
            Err(BeaconError::Shortcut(ShortcutError::Conflict { .. }))
        ));
        assert!(matches!(
            f.launcher.bind_shortcut("missing#cmd", "F2"),
            Err(BeaconError::Extension(ExtensionError::CommandNotFound(_)))
        ));

        f.launcher.unbind_shortcut("notes#open").unwrap();
        assert_eq!(
            f.launcher
                .shortcuts()
                .command_for(&KeyCombo::parse("Control+Alt+N").unwrap()),
            None
        );
    }

    #[test]
    fn test_hide_request_from_extension_clears_stack() {
        let mut f = fixture(|dev| {
            write_extension(
                dev,
                "tools",
                r#"[{ "name": "view", "title": "View" }, { "name": "dismiss", "title": "Dismiss", "kind": "action" }]"#,
                r#"
                local host = require("beacon")
                return {
                  view = function() return "tools" end,
                  dismiss = function() host.window.hide() end,
                }
                "#,
            );
        });
        f.launcher.boot().unwrap();
        f.launcher.run("tools#view");
        assert_eq!(f.launcher.navigator().len(), 2);

        assert_eq!(f.launcher.run("tools#dismiss"), PushOutcome::ActionFired);
        assert!(f.launcher.navigator().is_empty());
        assert_eq!(f.window.last_event(), Some(WindowEvent::Hide));
    }

    #[test]
    fn test_disable_command_persists() {
        let mut f = fixture(|_| {});
        f.launcher.boot().unwrap();

        f.launcher.set_command_disabled("launcher#hide", true).unwrap();
        assert_eq!(f.launcher.run("launcher#hide"), PushOutcome::Disabled);
        let saved = Config::load_from(&f.temp.path().join("config.toml"));
        assert!(saved.commands["launcher#hide"].disabled);
    }

    #[test]
    fn test_link_local_loads_package() {
        let mut f = fixture(|_| {});
        f.launcher.boot().unwrap();

        let elsewhere = f.temp.path().join("elsewhere");
        let dir = write_extension(
            &elsewhere,
            "clock",
            r#"[{ "name": "now", "title": "Current Time" }]"#,
            "return {}",
        );

        let report = f.launcher.link_local(&dir).unwrap();
        assert!(report.valid);
        assert!(f.launcher.registry().contains("clock#now"));
        assert_eq!(
            f.launcher.loader().get("clock").unwrap().package.origin,
            Origin::Local
        );
        assert_eq!(f.launcher.config().extensions.local_paths.len(), 1);

        let report = f.launcher.link_local(&f.temp.path().join("nope")).unwrap();
        assert!(!report.valid);
        assert!(report.error.unwrap().contains("Not a directory"));
    }

    #[test]
    fn test_package_cannot_take_over_builtin_name() {
        let mut f = fixture(|dev| {
            write_extension(
                dev,
                "launcher",
                r#"[{ "name": "home", "title": "Fake Home" }]"#,
                "return {}",
            );
        });

        let report = f.launcher.boot().unwrap();
        assert!(report.loaded.is_empty());
        assert!(f.launcher.loader().get("launcher").is_none());
        assert_eq!(
            f.launcher.registry().get("launcher#home").unwrap().title,
            "Search Commands"
        );

        f.launcher.reload().unwrap();
        assert!(f.launcher.registry().contains("launcher#home"));
        assert!(f.launcher.registry().contains("launcher#hide"));
    }

    #[test]
    fn test_reload_drops_removed_extensions() {
        let mut f = fixture(|dev| {
            write_extension(dev, "calc", r#"[{ "name": "main", "title": "Calc" }]"#, "return {}");
        });
        f.launcher.boot().unwrap();
        assert!(f.launcher.registry().contains("calc#main"));

        fs::remove_dir_all(f.temp.path().join("dev").join("calc")).unwrap();
        let report = f.launcher.reload().unwrap();
        assert!(report.loaded.is_empty());
        assert!(!f.launcher.registry().contains("calc#main"));
        assert!(f.launcher.registry().contains("launcher#home"));
    }
}
