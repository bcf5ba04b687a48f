use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use walkdir::WalkDir;

use crate::engine::RuleEngine;

/// Expand the positional arguments into a sorted, deduplicated file set.
///
/// Explicit files are taken as-is; directories expand recursively to files
/// whose extension the engine handles. A nonexistent path is fatal before
/// any pipeline work starts.
pub fn resolve_targets(paths: &[PathBuf], engine: &dyn RuleEngine) -> Result<Vec<PathBuf>> {
    let mut targets = BTreeSet::new();

    for path in paths {
        let metadata = fs::metadata(path)
            .with_context(|| format!("path '{}' does not exist", path.display()))?;
        if metadata.is_dir() {
            walk_directory(path, engine, &mut targets)?;
        } else {
            targets.insert(normalize(path));
        }
    }

    if targets.is_empty() {
        bail!("no source files found under the given paths");
    }

    Ok(targets.into_iter().collect())
}

fn walk_directory(
    dir: &Path,
    engine: &dyn RuleEngine,
    acc: &mut BTreeSet<PathBuf>,
) -> Result<()> {
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.with_context(|| format!("walking {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        let handled = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| engine.handles_extension(ext))
            .unwrap_or(false);
        if handled {
            acc.insert(normalize(&path));
        }
    }
    Ok(())
}

fn normalize(path: &Path) -> PathBuf {
    // Lexical normalization only; canonicalizing would turn relative
    // arguments into absolute paths in all user-facing output.
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::CurDir => {}
            other => normalized.push(other),
        }
    }
    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}
