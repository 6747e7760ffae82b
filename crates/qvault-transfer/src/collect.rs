//! Build a `Selection` from local paths.
//!
//! Plain files become an individual-files selection. A single directory
//! becomes a folder selection whose items carry paths rooted at the
//! directory's own name.

use std::path::{Path, PathBuf};

use tracing::debug;

use qvault_core::config::TransferConfig;
use qvault_core::{SelectedItem, Selection};

use crate::error::{TransferError, TransferResult};

/// Which files to include when walking a folder.
#[derive(Debug, Clone, Default)]
pub struct CollectConfig {
    /// Glob patterns matched against entry names
    pub exclude_patterns: Vec<String>,
    pub include_hidden: bool,
}

impl From<&TransferConfig> for CollectConfig {
    fn from(config: &TransferConfig) -> Self {
        Self {
            exclude_patterns: config.exclude_patterns.clone(),
            include_hidden: config.include_hidden,
        }
    }
}

/// Read `paths` into a selection.
///
/// Either any number of files, or exactly one directory.
pub fn selection_from_paths(paths: &[PathBuf], config: &CollectConfig) -> TransferResult<Selection> {
    if paths.is_empty() {
        return Ok(Selection::Empty);
    }

    let dirs = paths.iter().filter(|p| p.is_dir()).count();
    match (dirs, paths.len()) {
        (0, _) => {
            let items = paths
                .iter()
                .map(|p| read_item(p, None))
                .collect::<TransferResult<Vec<_>>>()?;
            Ok(Selection::Files(items))
        }
        (1, 1) => collect_folder(&paths[0], config),
        _ => Err(TransferError::Selection(
            "a folder must be selected on its own".into(),
        )),
    }
}

/// Reject items whose extension is not in `allowed` (empty allows all).
pub fn check_extensions(items: &[SelectedItem], allowed: &[String]) -> TransferResult<()> {
    if allowed.is_empty() {
        return Ok(());
    }
    let allowed: Vec<String> = allowed
        .iter()
        .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
        .collect();

    for item in items {
        let ext = item
            .name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if !allowed.contains(&ext) {
            return Err(TransferError::Selection(format!(
                "{} is not an accepted file type (allowed: {})",
                item.name,
                allowed.join(", ")
            )));
        }
    }
    Ok(())
}

fn collect_folder(root: &Path, config: &CollectConfig) -> TransferResult<Selection> {
    let name = root
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            TransferError::Selection(format!("folder has no usable name: {}", root.display()))
        })?
        .to_string();

    let excludes: Vec<glob::Pattern> = config
        .exclude_patterns
        .iter()
        .filter_map(|p| glob::Pattern::new(p).ok())
        .collect();

    let mut files = Vec::new();
    walk(root, &mut files, config, &excludes)?;
    files.sort(); // deterministic order

    let mut items = Vec::with_capacity(files.len());
    for path in files {
        let rel = path
            .strip_prefix(root)
            .map_err(|_| TransferError::Selection(format!("{} escapes folder", path.display())))?;
        let mut parts = vec![name.clone()];
        for component in rel.components() {
            let part = component.as_os_str().to_str().ok_or_else(|| {
                TransferError::Selection(format!("non UTF-8 path: {}", path.display()))
            })?;
            parts.push(part.to_string());
        }
        items.push(read_item(&path, Some(parts.join("/")))?);
    }

    debug!(folder = %name, files = items.len(), "collected folder");
    Ok(Selection::Folder { name, items })
}

fn walk(
    dir: &Path,
    out: &mut Vec<PathBuf>,
    config: &CollectConfig,
    excludes: &[glob::Pattern],
) -> TransferResult<()> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| TransferError::Selection(format!("reading dir {}: {e}", dir.display())))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let meta = entry.metadata()?;

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if excludes.iter().any(|p| p.matches(name)) {
            continue;
        }
        if name.starts_with('.') && !config.include_hidden {
            continue;
        }

        if meta.is_dir() {
            walk(&path, out, config, excludes)?;
        } else if meta.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

fn read_item(path: &Path, relative_path: Option<String>) -> TransferResult<SelectedItem> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| TransferError::Selection(format!("not a file name: {}", path.display())))?;
    let data = std::fs::read(path)
        .map_err(|e| TransferError::Selection(format!("reading {}: {e}", path.display())))?;

    let item = SelectedItem::new(name, data);
    Ok(match relative_path {
        Some(rel) => item.with_relative_path(rel),
        None => item,
    })
}
