use std::fmt;

use similar::{Algorithm, DiffOp, TextDiff};
use thiserror::Error;

/// Where two or more rewrites disagreed about the original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictRegion {
    /// A 1-based line of the original that competing rewrites edit differently.
    Line(usize),
    /// The gap before a 1-based original line (one past the last line means
    /// end of file) where competing rewrites insert different content.
    Insertion(usize),
}

impl fmt::Display for ConflictRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictRegion::Line(line) => write!(f, "line {line}"),
            ConflictRegion::Insertion(line) => write!(f, "the insertion point before line {line}"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("{count} rewrites make different changes at {region} of the original")]
    Conflict { region: ConflictRegion, count: usize },
}

/// How one rewrite treats one line of the original.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LineEdit {
    Keep,
    Remove,
    Replace(Vec<String>),
}

/// One rewrite aligned against the original at line granularity.
///
/// `edits` has one entry per original line; `inserts` has one entry per gap
/// between original lines, including the gaps before the first line and
/// after the last.
#[derive(Debug)]
struct Alignment {
    edits: Vec<LineEdit>,
    inserts: Vec<Vec<String>>,
}

/// Combine an unordered set of full-text rewrites of `original` into one
/// result, or fail if two rewrites disagree about the same region.
///
/// Disjoint edits from different rewrites are all applied; identical edits
/// to the same region count as agreement. The result is independent of the
/// order of `rewrites`. Blank lines introduced purely by line-based merging
/// are stripped afterwards (see [`strip_merge_artifacts`]).
pub fn merge(original: &str, rewrites: &[String]) -> Result<String, MergeError> {
    if rewrites.is_empty() {
        return Ok(original.to_string());
    }

    let original_lines = split_lines(original);
    let alignments: Vec<Alignment> = rewrites
        .iter()
        .map(|text| align(&original_lines, &split_lines(text)))
        .collect();

    let mut merged = String::with_capacity(original.len());
    for pos in 0..=original_lines.len() {
        let insertion = resolve_region(
            alignments.iter().map(|a| &a.inserts[pos]),
            |ins| !ins.is_empty(),
            ConflictRegion::Insertion(pos + 1),
        )?;
        if let Some(lines) = insertion {
            for line in lines {
                merged.push_str(line);
            }
        }

        if pos == original_lines.len() {
            break;
        }

        let edit = resolve_region(
            alignments.iter().map(|a| &a.edits[pos]),
            |edit| *edit != LineEdit::Keep,
            ConflictRegion::Line(pos + 1),
        )?;
        match edit {
            None | Some(LineEdit::Keep) => merged.push_str(original_lines[pos]),
            Some(LineEdit::Remove) => {}
            Some(LineEdit::Replace(lines)) => {
                for line in lines {
                    merged.push_str(line);
                }
            }
        }
    }

    Ok(strip_merge_artifacts(&merged, original))
}

/// Pick the single agreed-upon edit for one region, if any.
///
/// Returns `None` when no rewrite touches the region, the shared edit when
/// every touching rewrite proposes the same change, and a conflict when two
/// or more touching rewrites differ.
fn resolve_region<'a, T, I>(
    candidates: I,
    touches: impl Fn(&T) -> bool,
    region: ConflictRegion,
) -> Result<Option<&'a T>, MergeError>
where
    T: PartialEq + 'a,
    I: Iterator<Item = &'a T>,
{
    let mut chosen: Option<&T> = None;
    let mut touching = 0usize;
    let mut agreed = true;
    for candidate in candidates {
        if !touches(candidate) {
            continue;
        }
        touching += 1;
        match chosen {
            None => chosen = Some(candidate),
            Some(previous) if previous == candidate => {}
            Some(_) => agreed = false,
        }
    }
    if !agreed {
        return Err(MergeError::Conflict {
            region,
            count: touching,
        });
    }
    Ok(chosen)
}

/// Align `variant` against `original`, recording per original line whether it
/// is kept, removed, or replaced, and per gap what the variant inserts.
///
/// A replacement spanning several original lines attaches its replacement
/// text to the first line of the span and marks the remainder removed, so
/// identical multi-line replacements from different rewrites compare equal.
fn align(original: &[&str], variant: &[&str]) -> Alignment {
    let mut edits = vec![LineEdit::Keep; original.len()];
    let mut inserts = vec![Vec::new(); original.len() + 1];

    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_slices(original, variant);

    for op in diff.ops() {
        match *op {
            DiffOp::Equal { .. } => {}
            DiffOp::Delete {
                old_index, old_len, ..
            } => {
                for edit in &mut edits[old_index..old_index + old_len] {
                    *edit = LineEdit::Remove;
                }
            }
            DiffOp::Insert {
                old_index,
                new_index,
                new_len,
            } => {
                inserts[old_index].extend(owned_lines(variant, new_index, new_len));
            }
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => {
                edits[old_index] = LineEdit::Replace(owned_lines(variant, new_index, new_len));
                for edit in &mut edits[old_index + 1..old_index + old_len] {
                    *edit = LineEdit::Remove;
                }
            }
        }
    }

    Alignment { edits, inserts }
}

fn owned_lines(lines: &[&str], start: usize, len: usize) -> Vec<String> {
    lines[start..start + len]
        .iter()
        .map(|line| (*line).to_string())
        .collect()
}

/// Drop whitespace-only lines that line-based merging introduced.
///
/// A common subsequence between the merged lines and the original lines
/// identifies which merged lines survive from the original; whitespace-only
/// lines outside it are merge artifacts and are removed, while blank lines
/// the original genuinely contained stay matched and are preserved.
pub fn strip_merge_artifacts(merged: &str, original: &str) -> String {
    let merged_lines = split_lines(merged);
    let original_lines = split_lines(original);

    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_slices(&original_lines[..], &merged_lines[..]);

    let mut in_common = vec![false; merged_lines.len()];
    for op in diff.ops() {
        if let DiffOp::Equal { new_index, len, .. } = *op {
            for flag in &mut in_common[new_index..new_index + len] {
                *flag = true;
            }
        }
    }

    let mut result = String::with_capacity(merged.len());
    for (idx, line) in merged_lines.iter().enumerate() {
        if !in_common[idx] && line.trim().is_empty() {
            continue;
        }
        result.push_str(line);
    }
    result
}

/// Lines with their terminators attached, so merging neither invents nor
/// strips end-of-file newlines.
fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| (*t).to_string()).collect()
    }

    #[test]
    fn empty_set_returns_original() {
        let original = "a\nb\nc\n";
        assert_eq!(merge(original, &[]).unwrap(), original);
    }

    #[test]
    fn single_rewrite_passes_through() {
        let original = "a\nb\nc\n";
        let rewrite = "a\nB\nc\n";
        assert_eq!(merge(original, &owned(&[rewrite])).unwrap(), rewrite);
    }

    #[test]
    fn disjoint_edits_both_apply() {
        let original = "a\nb\nc\n";
        let change_line = "a\nB\nc\n";
        let append_line = "a\nb\nc\nd\n";
        let expected = "a\nB\nc\nd\n";
        assert_eq!(
            merge(original, &owned(&[change_line, append_line])).unwrap(),
            expected
        );
        assert_eq!(
            merge(original, &owned(&[append_line, change_line])).unwrap(),
            expected
        );
    }

    #[test]
    fn commutative_over_many_edits() {
        let original = "one\ntwo\nthree\nfour\nfive\n";
        let a = "ONE\ntwo\nthree\nfour\nfive\n";
        let b = "one\ntwo\nthree\nfour\n";
        let c = "one\ntwo\nTHREE\nfour\nfive\n";
        let forward = merge(original, &owned(&[a, b, c])).unwrap();
        let backward = merge(original, &owned(&[c, b, a])).unwrap();
        assert_eq!(forward, backward);
        assert_eq!(forward, "ONE\ntwo\nTHREE\nfour\n");
    }

    #[test]
    fn same_line_different_content_conflicts() {
        let err = merge("x\n", &owned(&["y\n", "z\n"])).unwrap_err();
        assert_eq!(
            err,
            MergeError::Conflict {
                region: ConflictRegion::Line(1),
                count: 2,
            }
        );
    }

    #[test]
    fn identical_edits_agree() {
        let original = "a\nb\nc\n";
        let rewrite = "a\nB\nc\n";
        assert_eq!(
            merge(original, &owned(&[rewrite, rewrite])).unwrap(),
            rewrite
        );
    }

    #[test]
    fn removal_vs_replacement_conflicts() {
        let original = "a\nb\nc\n";
        let removes = "a\nc\n";
        let replaces = "a\nB\nc\n";
        let err = merge(original, &owned(&[removes, replaces])).unwrap_err();
        assert!(matches!(
            err,
            MergeError::Conflict {
                region: ConflictRegion::Line(2),
                ..
            }
        ));
    }

    #[test]
    fn competing_insertions_conflict() {
        let original = "a\nb\n";
        let first = "a\nx\nb\n";
        let second = "a\ny\nb\n";
        let err = merge(original, &owned(&[first, second])).unwrap_err();
        assert!(matches!(
            err,
            MergeError::Conflict {
                region: ConflictRegion::Insertion(2),
                ..
            }
        ));
    }

    #[test]
    fn introduced_blank_line_is_stripped() {
        let original = "a\nb\n";
        let rewrite = "a\n\nx\nb\n";
        assert_eq!(merge(original, &owned(&[rewrite])).unwrap(), "a\nx\nb\n");
    }

    #[test]
    fn original_blank_line_is_preserved() {
        let original = "a\n\nb\n";
        let rewrite = "a\n\nb\nc\n";
        assert_eq!(merge(original, &owned(&[rewrite])).unwrap(), rewrite);
    }

    #[test]
    fn cleanup_is_idempotent() {
        let original = "a\nb\n";
        let merged = "a\n\nx\nb\n";
        let once = strip_merge_artifacts(merged, original);
        let twice = strip_merge_artifacts(&once, original);
        assert_eq!(once, twice);
    }

    #[test]
    fn missing_trailing_newline_survives() {
        let original = "a\nb";
        let rewrite = "a\nB";
        assert_eq!(merge(original, &owned(&[rewrite])).unwrap(), "a\nB");
    }

    #[test]
    fn appends_at_end_of_file_union() {
        let original = "a\n";
        let append = "a\nb\n";
        let change = "A\n";
        assert_eq!(merge(original, &owned(&[append, change])).unwrap(), "A\nb\n");
    }

    #[test]
    fn conflict_region_display_names_the_line() {
        let err = MergeError::Conflict {
            region: ConflictRegion::Line(7),
            count: 3,
        };
        assert_eq!(
            err.to_string(),
            "3 rewrites make different changes at line 7 of the original"
        );
    }
}
