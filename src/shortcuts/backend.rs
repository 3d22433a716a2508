//! OS-level hotkey registration.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use super::KeyCombo;

/// Registers combos with the operating system.
pub trait HotkeyBackend {
    /// Claim `combo` system-wide. Errors carry the backend's reason.
    fn register(&mut self, combo: &KeyCombo) -> Result<(), String>;

    fn unregister(&mut self, combo: &KeyCombo);

    /// Combos pressed since the last poll.
    fn poll_pressed(&mut self) -> Vec<KeyCombo> {
        Vec::new()
    }
}

/// Backend for headless use. Accepts everything and remembers what is held.
///
/// Clones share state, so tests can inspect what the manager registered.
#[derive(Debug, Clone, Default)]
pub struct NoopBackend {
    registered: Rc<RefCell<BTreeSet<KeyCombo>>>,
}

impl NoopBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self, combo: &KeyCombo) -> bool {
        self.registered.borrow().contains(combo)
    }

    pub fn registered(&self) -> Vec<KeyCombo> {
        self.registered.borrow().iter().cloned().collect()
    }
}

impl HotkeyBackend for NoopBackend {
    fn register(&mut self, combo: &KeyCombo) -> Result<(), String> {
        self.registered.borrow_mut().insert(combo.clone());
        Ok(())
    }

    fn unregister(&mut self, combo: &KeyCombo) {
        self.registered.borrow_mut().remove(combo);
    }
}

#[cfg(feature = "global-hotkey")]
pub use self::global::GlobalHotkeyBackend;

#[cfg(feature = "global-hotkey")]
mod global {
    use std::collections::HashMap;

    use global_hotkey::hotkey::HotKey;
    use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};

    use super::{HotkeyBackend, KeyCombo};
    use crate::shortcuts::ShortcutError;

    /// System-wide hotkeys via the `global-hotkey` crate.
    ///
    /// The manager must live on the thread that runs the platform event
    /// loop; pressed combos are collected with [`HotkeyBackend::poll_pressed`].
    pub struct GlobalHotkeyBackend {
        manager: GlobalHotKeyManager,
        /// HotKey objects by id, needed for unregistration
        hotkeys: HashMap<u32, (HotKey, KeyCombo)>,
    }

    impl GlobalHotkeyBackend {
        pub fn new() -> Result<Self, ShortcutError> {
            let manager = GlobalHotKeyManager::new()
                .map_err(|e| ShortcutError::Backend(format!("Failed to create hotkey manager: {e}")))?;
            Ok(Self {
                manager,
                hotkeys: HashMap::new(),
            })
        }
    }

    impl HotkeyBackend for GlobalHotkeyBackend {
        fn register(&mut self, combo: &KeyCombo) -> Result<(), String> {
            let hotkey: HotKey = combo
                .to_string()
                .parse()
                .map_err(|e| format!("cannot map {combo}: {e}"))?;
            self.manager
                .register(hotkey)
                .map_err(|e| format!("Failed to register hotkey: {e}"))?;
            self.hotkeys.insert(hotkey.id(), (hotkey, combo.clone()));
            Ok(())
        }

        fn unregister(&mut self, combo: &KeyCombo) {
            let id = self
                .hotkeys
                .iter()
                .find(|(_, (_, held))| held == combo)
                .map(|(id, _)| *id);
            if let Some((hotkey, _)) = id.and_then(|id| self.hotkeys.remove(&id)) {
                if let Err(e) = self.manager.unregister(hotkey) {
                    tracing::warn!(combo = %combo, error = %e, "failed to unregister hotkey");
                }
            }
        }

        fn poll_pressed(&mut self) -> Vec<KeyCombo> {
            let mut pressed = Vec::new();
            while let Ok(event) = GlobalHotKeyEvent::receiver().try_recv() {
                if event.state != HotKeyState::Pressed {
                    continue;
                }
                if let Some((_, combo)) = self.hotkeys.get(&event.id) {
                    pressed.push(combo.clone());
                }
            }
            pressed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_backend_tracks_registrations() {
        let backend = NoopBackend::new();
        let mut owned: Box<dyn HotkeyBackend> = Box::new(backend.clone());
        let combo = KeyCombo::parse("Alt+Space").unwrap();

        owned.register(&combo).unwrap();
        assert!(backend.is_registered(&combo));
        assert!(owned.poll_pressed().is_empty());

        owned.unregister(&combo);
        assert!(backend.registered().is_empty());
    }
}
