//! Beacon - keyboard-driven command launcher with runtime-loaded extensions.
//!
//! Extensions are Lua packages discovered on disk. Each one contributes
//! commands to a shared registry; the launcher searches them, pushes their
//! output onto a navigation stack and binds global hotkeys to them.
//!
//! # Architecture
//!
//! The library is organized into these main modules:
//!
//! - [`extensions`] - Package discovery, the Lua runtime and capability binding
//! - [`commands`] - Command identity, the registry, search and preview
//! - [`navigation`] - The page stack driving the host window
//! - [`shortcuts`] - Hotkey parsing and the binding table
//! - [`config`] - Configuration loading and persistence
//! - [`launcher`] - The context object wiring all of the above together
//!
//! # Example
//!
//! ```ignore
//! use beacon::{Config, HostPlatform, Launcher};
//!
//! let config = Config::load();
//! let mut launcher = Launcher::new(
//!     config,
//!     Config::config_path(),
//!     Config::data_dir(),
//!     HostPlatform::headless(),
//! )?;
//! launcher.boot()?;
//!
//! for command in launcher.search("note") {
//!     println!("{} {}", command.id, command.title);
//! }
//! ```

// Public modules
pub mod builtins;
pub mod cli;
pub mod commands;
pub mod config;
pub mod extensions;
pub mod launcher;
pub mod logging;
pub mod navigation;
pub mod platform;
pub mod shortcuts;

// Internal modules
mod error;

// Re-export commonly used types for convenience
pub use commands::{Command, CommandId, CommandRegistry, RenderResult, WindowSize};
pub use config::Config;
pub use error::{BeaconError, BeaconResult};
pub use extensions::{ExtensionError, ExtensionLoader, ExtensionResult};
pub use launcher::{HostPlatform, Launcher};
pub use navigation::{Navigator, PushOutcome};
pub use shortcuts::{KeyCombo, ShortcutManager};
