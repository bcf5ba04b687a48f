use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use time::OffsetDateTime;

use crate::diff;
use crate::logging;
use crate::merge::merge;
use crate::pipeline::RewriteRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Overwrite each file on disk with its merged result.
    InPlace,
    /// Print a unified diff of each merged result instead of writing.
    Patch,
}

/// What happened to each file in the batch. Printed at the end so operators
/// can tell written/patched files apart from conflict and I/O skips.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub written: usize,
    pub patched: usize,
    pub no_op: usize,
    pub conflicts: usize,
    pub io_errors: usize,
}

impl RunStats {
    pub fn print(&self) {
        eprintln!(
            "summary: written={}, patched={}, no-op={}, conflicts={}, io-errors={}",
            self.written, self.patched, self.no_op, self.conflicts, self.io_errors
        );
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ApplyOptions {
    pub mode: OutputMode,
    /// Context lines for `--patch` diffs.
    pub context: usize,
    /// Append written files to the change journal.
    pub journal: bool,
}

/// Run one merge pass per file that has at least one accepted record, then
/// apply the result according to `options.mode`.
///
/// A conflict or I/O failure skips that file, leaves it untouched on disk,
/// and never aborts the rest of the batch.
pub fn apply_accepted(records: &[RewriteRecord], options: ApplyOptions) -> RunStats {
    let mut stats = RunStats::default();

    for (filename, accepted) in group_accepted(records) {
        let original = match fs::read_to_string(filename) {
            Ok(text) => text,
            Err(err) => {
                eprintln!("skipping {}: {err}", filename.display());
                stats.io_errors += 1;
                continue;
            }
        };

        let texts: Vec<String> = accepted
            .iter()
            .map(|record| record.rewritten_text.clone())
            .collect();
        let merged = match merge(&original, &texts) {
            Ok(merged) => merged,
            Err(conflict) => {
                eprintln!("skipping {}: {conflict}", filename.display());
                stats.conflicts += 1;
                continue;
            }
        };

        if merged == original {
            stats.no_op += 1;
            continue;
        }

        match options.mode {
            OutputMode::InPlace => match write_via_temp(filename, merged.as_bytes()) {
                Ok(()) => {
                    stats.written += 1;
                    if options.journal {
                        let rules = rule_ids(&accepted);
                        if let Err(err) = logging::record_change(filename, &rules, "written") {
                            log::warn!("change log not updated: {err:#}");
                        }
                    }
                }
                Err(err) => {
                    eprintln!("skipping {}: {err:#}", filename.display());
                    stats.io_errors += 1;
                }
            },
            OutputMode::Patch => {
                print!(
                    "{}",
                    diff::unified_diff(filename, &original, &merged, options.context)
                );
                stats.patched += 1;
            }
        }
    }

    stats
}

/// Accepted records grouped per file, in filename order.
fn group_accepted(records: &[RewriteRecord]) -> BTreeMap<&PathBuf, Vec<&RewriteRecord>> {
    let mut groups: BTreeMap<&PathBuf, Vec<&RewriteRecord>> = BTreeMap::new();
    for record in records.iter().filter(|record| record.accepted) {
        groups.entry(&record.filename).or_default().push(record);
    }
    groups
}

fn rule_ids(records: &[&RewriteRecord]) -> Vec<u32> {
    let mut ids: Vec<u32> = records.iter().map(|record| record.rule_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn write_via_temp(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    let base_dir = parent.unwrap_or_else(|| Path::new("."));
    let unique = format!(
        ".srcmend-tmp-{}-{}",
        std::process::id(),
        OffsetDateTime::now_utc().unix_timestamp_nanos()
    );
    let temp_path = base_dir.join(unique);
    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("creating temp file {}", temp_path.display()))?;
        file.write_all(data)
            .with_context(|| format!("writing temp file {}", temp_path.display()))?;
        file.sync_all()
            .with_context(|| format!("syncing temp file {}", temp_path.display()))?;
    }
    fs::rename(&temp_path, path).or_else(|err| {
        let _ = fs::remove_file(&temp_path);
        Err(err).with_context(|| format!("replacing {}", path.display()))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_options(mode: OutputMode) -> ApplyOptions {
        ApplyOptions {
            mode,
            context: 3,
            journal: false,
        }
    }

    fn record(path: &Path, rule_id: u32, text: &str, accepted: bool) -> RewriteRecord {
        RewriteRecord {
            filename: path.to_path_buf(),
            rule_id,
            rewritten_text: text.to_string(),
            accepted,
        }
    }

    #[test]
    fn disjoint_accepted_rewrites_merge_in_place() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("A.java");
        fs::write(&file, "a\nb\nc\n").expect("write");

        let records = [
            record(&file, 1, "a\nB\nc\n", true),
            record(&file, 2, "a\nb\nc\nd\n", true),
        ];
        let stats = apply_accepted(&records, test_options(OutputMode::InPlace));
        assert_eq!(stats.written, 1);
        assert_eq!(fs::read_to_string(&file).expect("read"), "a\nB\nc\nd\n");
    }

    #[test]
    fn conflicting_file_is_left_untouched() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("A.java");
        fs::write(&file, "x\n").expect("write");

        let records = [
            record(&file, 1, "y\n", true),
            record(&file, 2, "z\n", true),
        ];
        let stats = apply_accepted(&records, test_options(OutputMode::InPlace));
        assert_eq!(stats.conflicts, 1);
        assert_eq!(stats.written, 0);
        assert_eq!(fs::read_to_string(&file).expect("read"), "x\n");
    }

    #[test]
    fn conflict_in_one_file_does_not_block_another() {
        let dir = tempdir().expect("tempdir");
        let bad = dir.path().join("Bad.java");
        let good = dir.path().join("Good.java");
        fs::write(&bad, "x\n").expect("write");
        fs::write(&good, "a\n").expect("write");

        let records = [
            record(&bad, 1, "y\n", true),
            record(&bad, 2, "z\n", true),
            record(&good, 1, "A\n", true),
        ];
        let stats = apply_accepted(&records, test_options(OutputMode::InPlace));
        assert_eq!(stats.conflicts, 1);
        assert_eq!(stats.written, 1);
        assert_eq!(fs::read_to_string(&good).expect("read"), "A\n");
        assert_eq!(fs::read_to_string(&bad).expect("read"), "x\n");
    }

    #[test]
    fn rejected_records_are_ignored() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("A.java");
        fs::write(&file, "a\n").expect("write");

        let records = [record(&file, 1, "b\n", false)];
        let stats = apply_accepted(&records, test_options(OutputMode::InPlace));
        assert_eq!(stats, RunStats::default());
        assert_eq!(fs::read_to_string(&file).expect("read"), "a\n");
    }

    #[test]
    fn patch_mode_does_not_write() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("A.java");
        fs::write(&file, "a\n").expect("write");

        let records = [record(&file, 1, "b\n", true)];
        let stats = apply_accepted(&records, test_options(OutputMode::Patch));
        assert_eq!(stats.patched, 1);
        assert_eq!(fs::read_to_string(&file).expect("read"), "a\n");
    }

    #[test]
    fn missing_file_counts_as_io_error() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("Gone.java");
        let records = [record(&file, 1, "b\n", true)];
        let stats = apply_accepted(&records, test_options(OutputMode::InPlace));
        assert_eq!(stats.io_errors, 1);
    }

    #[test]
    fn rule_ids_are_sorted_and_deduped() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("A.java");
        let a = record(&file, 9, "x\n", true);
        let b = record(&file, 2, "y\n", true);
        let c = record(&file, 9, "z\n", true);
        assert_eq!(rule_ids(&[&a, &b, &c]), vec![2, 9]);
    }
}
