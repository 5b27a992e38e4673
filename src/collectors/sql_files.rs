//! SQL file inventory from a local directory tree.
//!
//! The tree is walked in name order, so repeated runs over the same tree
//! produce the same titles. Files are classified as migrations when their
//! path relative to the root, or their name, mentions "migration".

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Error, Debug)]
pub enum SqlFilesError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("title {title:?} for {path} collides with an already collected file")]
    TitleCollision { title: String, path: PathBuf },
}

/// Which files a walk collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SearchMode {
    /// Every `.sql` file that is not a migration.
    #[default]
    All,
    /// Every `.sql` file under the migrations directory.
    MigrationsOnly,
    /// Non-migration files whose name is on the allow-list.
    Specific,
}

#[derive(Debug, Clone, Default)]
pub struct SearchConfig {
    pub root: PathBuf,
    pub mode: SearchMode,
    /// Migrations directory; `<root>/migrations` when unset. Relative paths
    /// are resolved against `root`.
    pub migrations_path: Option<PathBuf>,
    /// File names collected in `Specific` mode, compared case-insensitively.
    pub specific_files: Vec<String>,
    pub enable_ignore: bool,
    /// File names skipped when `enable_ignore` is set.
    pub ignore_files: Vec<String>,
}

/// One collected SQL file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SqlFile {
    /// File name, suffixed with its directory when the name is already taken.
    pub title: String,
    pub content: String,
    pub path: PathBuf,
    pub is_migration: bool,
}

impl SearchConfig {
    fn migrations_dir(&self) -> PathBuf {
        match &self.migrations_path {
            None => self.root.join("migrations"),
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.root.join(path),
        }
    }

    fn is_ignored(&self, name: &str) -> bool {
        self.enable_ignore && self.ignore_files.iter().any(|ignored| ignored == name)
    }
}

/// Collects the SQL files selected by `config`.
#[instrument(skip(config), fields(root = %config.root.display(), mode = ?config.mode))]
pub fn collect_sql_files(config: &SearchConfig) -> Result<Vec<SqlFile>, SqlFilesError> {
    let walk_root = match config.mode {
        SearchMode::MigrationsOnly => config.migrations_dir(),
        SearchMode::All | SearchMode::Specific => config.root.clone(),
    };

    let wanted: HashSet<String> = config
        .specific_files
        .iter()
        .map(|name| name.to_lowercase())
        .collect();

    let mut paths = Vec::new();
    walk(&walk_root, &mut paths)?;

    let mut titles = HashSet::new();
    let mut files = Vec::new();
    for path in paths {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.ends_with(".sql") {
            continue;
        }

        let is_migration = match config.mode {
            SearchMode::MigrationsOnly => true,
            _ => is_migration(&config.root, &path, name),
        };
        let selected = match config.mode {
            SearchMode::MigrationsOnly => true,
            SearchMode::All => !is_migration,
            SearchMode::Specific => !is_migration && wanted.contains(&name.to_lowercase()),
        };
        if !selected || config.is_ignored(name) {
            continue;
        }

        let bytes = fs::read(&path).map_err(|source| SqlFilesError::Io {
            path: path.clone(),
            source,
        })?;
        // Scripts in legacy encodings are kept; invalid sequences become U+FFFD.
        let content = String::from_utf8_lossy(&bytes).into_owned();
        let title = unique_title(&titles, &walk_root, &path, name)?;
        debug!(%title, path = %path.display(), "Collected SQL file");
        titles.insert(title.clone());
        files.push(SqlFile {
            title,
            content,
            path,
            is_migration,
        });
    }
    Ok(files)
}

/// Depth-first walk collecting regular files, entries visited in name order.
fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), SqlFilesError> {
    let io_err = |source| SqlFilesError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = fs::read_dir(dir)
        .map_err(io_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let file_type = entry.file_type().map_err(|source| SqlFilesError::Io {
            path: path.clone(),
            source,
        })?;
        if file_type.is_dir() {
            walk(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

fn is_migration(root: &Path, path: &Path, name: &str) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.to_string_lossy().to_lowercase().contains("migration")
        || name.to_lowercase().contains("migration")
}

/// `name`, or `name` with `_<relative dir>` inserted before the extension
/// when `name` is already taken.
fn unique_title(
    taken: &HashSet<String>,
    root: &Path,
    path: &Path,
    name: &str,
) -> Result<String, SqlFilesError> {
    if !taken.contains(name) {
        return Ok(name.to_string());
    }

    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    };
    let title = format!("{}_{}{}", stem, directory_suffix(root, path), ext);
    if taken.contains(&title) {
        return Err(SqlFilesError::TitleCollision {
            title,
            path: path.to_path_buf(),
        });
    }
    Ok(title)
}

fn directory_suffix(root: &Path, path: &Path) -> String {
    let parent = path.parent().unwrap_or(root);
    let relative = parent.strip_prefix(root).unwrap_or(parent);
    let parts: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        "root".to_string()
    } else {
        parts.join("_")
    }
}
