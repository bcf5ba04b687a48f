use std::path::Path;

use similar::{Algorithm, ChangeTag, TextDiff};

const COLOR_GREEN: &str = "\x1b[32m";
const COLOR_RED: &str = "\x1b[31m";
const COLOR_RESET: &str = "\x1b[m";

#[derive(Debug, Clone, Copy)]
pub struct DiffDisplayConfig {
    pub context: usize,
    pub colorize: bool,
}

/// Render the original-vs-rewrite diff shown during review.
///
/// Inserted whitespace-only lines are skipped: the merge strips them from
/// the final result, so showing them would misrepresent what an accept
/// produces. Tabs render as four spaces to keep alignment readable.
pub fn print_review_diff(old: &str, new: &str, config: &DiffDisplayConfig) {
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_lines(old, new);

    for (idx, group) in diff.grouped_ops(config.context).iter().enumerate() {
        if idx > 0 {
            println!("...");
        }
        for op in group {
            for change in diff.iter_changes(op) {
                let value = change.value();
                let line = value.trim_end_matches(['\n', '\r']);
                if change.tag() == ChangeTag::Insert && line.trim().is_empty() {
                    continue;
                }
                let (sign, color) = match change.tag() {
                    ChangeTag::Delete => ("-", COLOR_RED),
                    ChangeTag::Insert => ("+", COLOR_GREEN),
                    ChangeTag::Equal => (" ", ""),
                };
                if config.colorize && !color.is_empty() {
                    println!("{color}{sign}{}{COLOR_RESET}", expand_tabs(line));
                } else {
                    println!("{sign}{}", expand_tabs(line));
                }
            }
        }
    }
}

/// Full unified diff for `--patch` output.
pub fn unified_diff(path: &Path, old: &str, new: &str, context: usize) -> String {
    let label = path.display().to_string();
    TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_lines(old, new)
        .unified_diff()
        .context_radius(context)
        .header(&label, &label)
        .to_string()
}

fn expand_tabs(line: &str) -> String {
    line.replace('\t', "    ")
}
