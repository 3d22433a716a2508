//! Package discovery across extension roots.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::error::{ExtensionError, ExtensionResult};
use super::manifest::{read_manifest, ExtensionPackage, Origin};

/// How packages are laid out under a root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootLayout {
    /// Every immediate subdirectory is a package candidate.
    Parent,
    /// The root itself is a single package.
    Package,
}

/// A location scanned for extension packages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionRoot {
    pub path: PathBuf,
    pub origin: Origin,
    pub layout: RootLayout,
}

impl ExtensionRoot {
    pub fn parent(path: impl Into<PathBuf>, origin: Origin) -> Self {
        Self {
            path: path.into(),
            origin,
            layout: RootLayout::Parent,
        }
    }

    pub fn package(path: impl Into<PathBuf>, origin: Origin) -> Self {
        Self {
            path: path.into(),
            origin,
            layout: RootLayout::Package,
        }
    }
}

/// Discover packages under `roots`, in order.
///
/// Invalid packages are logged and skipped. A later root providing an
/// already-seen name replaces the earlier package. Only when no existing root
/// can be enumerated at all is an error returned.
pub fn scan(roots: &[ExtensionRoot]) -> ExtensionResult<Vec<ExtensionPackage>> {
    let mut packages: Vec<ExtensionPackage> = Vec::new();
    let mut existing = 0usize;
    let mut unreadable = Vec::new();

    for root in roots {
        if !root.path.exists() {
            tracing::debug!(root = %root.path.display(), "extension root does not exist");
            continue;
        }
        existing += 1;

        let candidates = match candidates(root) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(root = %root.path.display(), error = %e, "cannot enumerate extension root");
                unreadable.push(format!("{}: {}", root.path.display(), e));
                continue;
            }
        };

        for dir in candidates {
            match read_manifest(&dir, root.origin) {
                Ok(package) => insert_or_replace(&mut packages, package),
                Err(ExtensionError::ManifestNotFound(_)) if root.layout == RootLayout::Parent => {
                    // Not an extension directory
                    tracing::debug!(path = %dir.display(), "no manifest, skipping");
                }
                Err(e) => {
                    tracing::warn!(path = %dir.display(), error = %e, "skipping invalid extension");
                }
            }
        }
    }

    if existing > 0 && unreadable.len() == existing {
        return Err(ExtensionError::ScanFailed(unreadable.join("; ")));
    }

    Ok(packages)
}

fn candidates(root: &ExtensionRoot) -> std::io::Result<Vec<PathBuf>> {
    match root.layout {
        RootLayout::Package => Ok(vec![root.path.clone()]),
        RootLayout::Parent => {
            // Probe first so an unreadable root is reported as such
            std::fs::read_dir(&root.path)?;

            let mut dirs = Vec::new();
            for entry in WalkDir::new(&root.path)
                .min_depth(1)
                .max_depth(1)
                .follow_links(true)
                .sort_by_file_name()
            {
                match entry {
                    Ok(entry) if entry.file_type().is_dir() => dirs.push(entry.into_path()),
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(root = %root.path.display(), error = %e, "skipping unreadable entry");
                    }
                }
            }
            Ok(dirs)
        }
    }
}

fn insert_or_replace(packages: &mut Vec<ExtensionPackage>, package: ExtensionPackage) {
    match packages.iter().position(|p| p.name == package.name) {
        Some(pos) => {
            tracing::info!(
                extension = %package.name,
                replaced = %display_dir(&packages[pos].directory),
                by = %display_dir(&package.directory),
                "extension shadowed by later root"
            );
            packages[pos] = package;
        }
        None => packages.push(package),
    }
}

fn display_dir(path: &Path) -> String {
    path.display().to_string()
}
