use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

const LOG_DIR: &str = ".srcmend";
const LOG_FILE: &str = "change_log.jsonl";
const MAX_ENTRIES: usize = 500;

/// One applied merge, journaled so a later run can show what was rewritten
/// and by which rules.
#[derive(Debug, Serialize)]
pub struct ChangeLogEntry<'a> {
    pub timestamp: &'a str,
    pub path: &'a Path,
    pub rules: &'a [u32],
    pub action: &'a str,
}

pub fn record_change(path: &Path, rules: &[u32], action: &str) -> Result<()> {
    let log_path = ensure_log_file()?;
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".into());
    let entry = ChangeLogEntry {
        timestamp: &timestamp,
        path,
        rules,
        action,
    };
    let json = serde_json::to_string(&entry)?;
    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(&log_path)
        .with_context(|| format!("opening {log_path:?}"))?;
    writeln!(file, "{json}")?;
    truncate_log(&log_path)?;
    Ok(())
}

fn ensure_log_file() -> Result<PathBuf> {
    let dir = PathBuf::from(LOG_DIR);
    if !dir.exists() {
        fs::create_dir_all(&dir).with_context(|| format!("creating {dir:?}"))?;
    }
    Ok(dir.join(LOG_FILE))
}

fn truncate_log(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .read(true)
        .open(path)
        .with_context(|| format!("reading {path:?}"))?;
    let reader = BufReader::new(file);
    let lines: Vec<_> = reader.lines().collect::<Result<_, _>>()?;
    if lines.len() <= MAX_ENTRIES {
        return Ok(());
    }
    let keep = &lines[lines.len() - MAX_ENTRIES..];
    fs::write(path, keep.join("\n") + "\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_serializes_rule_list() {
        let entry = ChangeLogEntry {
            timestamp: "2026-01-01T00:00:00Z",
            path: Path::new("src/A.java"),
            rules: &[1125, 2293],
            action: "written",
        };
        let json = serde_json::to_string(&entry).expect("json");
        assert!(json.contains("\"rules\":[1125,2293]"));
        assert!(json.contains("\"action\":\"written\""));
    }
}
