//! Extension system for Beacon.
//!
//! Extensions are Lua packages discovered on disk and executed inside one
//! shared Lua state.
//!
//! # Architecture
//!
//! ```text
//! ExtensionLoader
//! ├── lua: Rc<Lua>
//! ├── resolver: Rc<ModuleResolver>
//! │   ├── ui: canonical `beacon/ui` table (bound once)
//! │   ├── ownership: OwnershipIndex (root dir -> extension, memoized per file)
//! │   ├── capabilities: extension -> `beacon` table
//! │   └── modules: canonical path -> loaded module value
//! └── extensions: name -> Extension
//! ```
//!
//! Every module file gets its own environment whose `require` knows the
//! requesting file's path. Asking for `beacon` resolves that path to its
//! owning extension and hands back the owner's capability table, so commands
//! registered from deep inside helper files are attributed correctly.

pub mod capability;
mod error;
pub mod loader;
pub mod manifest;
pub mod ownership;
pub mod resolver;
pub mod scan;
pub mod storage;
pub mod ui;

use std::path::PathBuf;

pub use capability::{HostRequest, HostRequests};
pub use error::{ExtensionError, ExtensionResult};
pub use loader::{Extension, ExtensionLoader, LoadReport};
pub use manifest::{
    read_manifest, validate, CommandManifest, CommandMode, ExtensionPackage, Origin,
    ValidationReport, MANIFEST_FILE,
};
pub use ownership::OwnershipIndex;
pub use resolver::ModuleResolver;
pub use scan::{scan, ExtensionRoot, RootLayout};
pub use storage::ExtensionStorage;

/// Identity of a loaded extension, shared by its commands and page frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionInfo {
    pub name: String,
    pub title: String,
    pub icon: Option<String>,
    pub version: Option<String>,
    pub directory: PathBuf,
    pub origin: Origin,
}

impl ExtensionInfo {
    /// Identity for commands compiled into the host.
    pub fn builtin(name: &str, title: &str) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            icon: None,
            version: None,
            directory: PathBuf::new(),
            origin: Origin::System,
        }
    }

    pub fn from_package(package: &ExtensionPackage) -> Self {
        Self {
            name: package.name.clone(),
            title: package.title.clone(),
            icon: package.icon.clone(),
            version: package.version.clone(),
            directory: package.directory.clone(),
            origin: package.origin,
        }
    }

    /// Resolve an extension-relative asset path (icons, images).
    pub fn asset_path(&self, relative: &str) -> PathBuf {
        self.directory.join(relative)
    }
}
