use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use crossbeam_channel::{bounded, unbounded};

use crate::engine::{Repair, RuleEngine, generate_rewrites};

/// One rewrite candidate attached to its file and the rule that produced it.
/// Everything but `accepted` is immutable once the pipeline emits it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRecord {
    pub filename: PathBuf,
    pub rule_id: u32,
    pub rewritten_text: String,
    pub accepted: bool,
}

/// Everything the pipeline produced: the full record list, sorted by
/// (filename, rule id) so the result is a deterministic set regardless of
/// worker count or scheduling, plus the files that could not be read.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub records: Vec<RewriteRecord>,
    pub read_failures: Vec<(PathBuf, String)>,
}

struct FileOutcome {
    path: PathBuf,
    result: Result<Vec<Repair>, String>,
}

/// Fan the file set out across `workers` threads, run rewrite generation per
/// file, and collect the results. Each path is claimed by exactly one worker;
/// generation runs with no shared lock held. Per-file read failures are
/// reported, never fatal.
pub fn run_pipeline(
    engine: &dyn RuleEngine,
    files: &[PathBuf],
    workers: usize,
    show_progress: bool,
) -> PipelineReport {
    let workers = workers.max(1);
    let (path_tx, path_rx) = bounded::<PathBuf>(workers * 2);
    let (outcome_tx, outcome_rx) = unbounded::<FileOutcome>();

    let mut report = thread::scope(|scope| {
        for _ in 0..workers {
            let path_rx = path_rx.clone();
            let outcome_tx = outcome_tx.clone();
            scope.spawn(move || {
                while let Ok(path) = path_rx.recv() {
                    let outcome = process_file(engine, path);
                    if outcome_tx.send(outcome).is_err() {
                        return;
                    }
                }
            });
        }
        drop(path_rx);
        drop(outcome_tx);

        scope.spawn(move || {
            for path in files {
                if path_tx.send(path.clone()).is_err() {
                    return;
                }
            }
        });

        let total = files.len();
        let mut done = 0usize;
        let mut report = PipelineReport::default();
        for outcome in outcome_rx {
            done += 1;
            if show_progress {
                eprint!("\r{done}/{total}");
                let _ = std::io::stderr().flush();
            }
            match outcome.result {
                Ok(repairs) => {
                    for repair in repairs {
                        report.records.push(RewriteRecord {
                            filename: outcome.path.clone(),
                            rule_id: repair.rule_id,
                            rewritten_text: repair.text,
                            accepted: false,
                        });
                    }
                }
                Err(message) => report.read_failures.push((outcome.path, message)),
            }
        }
        if show_progress && total > 0 {
            eprintln!();
        }
        report
    });

    report.records.sort_by(|a, b| {
        (&a.filename, a.rule_id, &a.rewritten_text).cmp(&(
            &b.filename,
            b.rule_id,
            &b.rewritten_text,
        ))
    });
    report.read_failures.sort();
    report
}

fn process_file(engine: &dyn RuleEngine, path: PathBuf) -> FileOutcome {
    let original = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) => {
            return FileOutcome {
                path,
                result: Err(err.to_string()),
            };
        }
    };

    let started = Instant::now();
    let repairs = generate_rewrites(engine, &original);
    log::debug!(
        "{}: {} rewrite(s) in {:?}",
        path.display(),
        repairs.len(),
        started.elapsed()
    );

    FileOutcome {
        path,
        result: Ok(repairs),
    }
}
