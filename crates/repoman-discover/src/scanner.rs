use std::path::{Path, PathBuf};

use repoman_core::error::RepomanError;
use walkdir::WalkDir;

/// An immediate subdirectory of the local root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRepo {
    pub name: String,
    pub path: PathBuf,
    /// Whether the directory holds a git working tree (`.git` present).
    pub is_git: bool,
}

/// List the immediate subdirectories of `root`, sorted by name.
///
/// Hidden directories are skipped unless they hold a git working tree, so a
/// clone of an org's `.github` repository is still seen. Symlinks to
/// directories count. An entry that cannot be read, such as a dangling
/// symlink, is logged and left out; only a failure on `root` itself is fatal.
pub fn scan_local(root: &Path) -> Result<Vec<LocalRepo>, RepomanError> {
    if !root.exists() {
        return Err(RepomanError::PathNotFound {
            path: root.to_path_buf(),
        });
    }
    if !root.is_dir() {
        return Err(RepomanError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    let mut repos = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(match e.into_io_error() {
                    Some(io) => RepomanError::Io(io),
                    None => RepomanError::Other(format!("cannot read {}", root.display())),
                });
            }
            Err(e) => {
                let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                tracing::warn!("skipping unreadable entry {path}: {e}");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path().to_path_buf();
        let is_git = path.join(".git").exists();
        if name.starts_with('.') && !is_git {
            continue;
        }
        repos.push(LocalRepo { name, path, is_git });
    }

    tracing::debug!("found {} local entries under {}", repos.len(), root.display());
    Ok(repos)
}

/// Only the entries that are git working trees.
pub fn git_repos(local: &[LocalRepo]) -> impl Iterator<Item = &LocalRepo> {
    local.iter().filter(|r| r.is_git)
}
