use std::sync::LazyLock;

use regex::Regex;

use crate::engine::{
    EngineError, NodeHandle, NodeProperties, Repair, RuleEngine, SourceTree, next_tree_id,
};

/// Rule catalog shipped with the binary: small mechanical Java cleanups,
/// each implemented as a lexical pass over the line nodes of a [`LineTree`].
/// Ids follow the Sonar-style numbering the rule descriptions refer to.
pub struct BuiltinRules;

const CATALOG: &[(u32, &str)] = &[
    (1125, "Boolean literals should not be redundant"),
    (1155, "Collection.isEmpty() should be used to test for emptiness"),
    (
        1158,
        "Primitive wrappers should not be instantiated only for toString",
    ),
    (2293, "The diamond operator should be used"),
];

impl RuleEngine for BuiltinRules {
    fn analyze(&self, original: &str) -> Vec<Repair> {
        let Some(tree) = LineTree::parse(original) else {
            return Vec::new();
        };

        let mut repairs = Vec::new();
        for &(rule_id, _) in CATALOG {
            match apply_rule(&tree, original, rule_id) {
                Ok(Some(text)) => repairs.push(Repair { rule_id, text }),
                Ok(None) => {}
                Err(err) => {
                    // Only reachable through a bug in the tree itself.
                    log::warn!("rule {rule_id} aborted: {err}");
                }
            }
        }
        repairs
    }

    fn describe(&self, rule_id: u32) -> Option<&str> {
        CATALOG
            .iter()
            .find(|(id, _)| *id == rule_id)
            .map(|(_, description)| *description)
    }

    fn handles_extension(&self, extension: &str) -> bool {
        extension.eq_ignore_ascii_case("java")
    }
}

fn apply_rule(tree: &LineTree, text: &str, rule_id: u32) -> Result<Option<String>, EngineError> {
    match rule_id {
        1125 => rewrite_lines(tree, text, redundant_boolean_literal),
        1155 => rewrite_lines(tree, text, size_comparison_to_is_empty),
        1158 => rewrite_lines(tree, text, wrapper_to_string),
        2293 => rewrite_lines(tree, text, diamond_operator),
        _ => Ok(None),
    }
}

/// Run one line transformation over every line node, rebuilding the full
/// text. Returns `None` when no line changed.
fn rewrite_lines(
    tree: &LineTree,
    text: &str,
    transform: impl Fn(&str) -> Option<String>,
) -> Result<Option<String>, EngineError> {
    let mut rebuilt = String::with_capacity(text.len());
    let mut changed = false;

    for (_, node) in tree.children(tree.root())? {
        let NodeProperties { start, end, .. } = tree.properties(node)?;
        let line = &text[start..end];
        match transform(line) {
            Some(new_line) => {
                changed = true;
                rebuilt.push_str(&new_line);
            }
            None => rebuilt.push_str(line),
        }
    }

    Ok(changed.then_some(rebuilt))
}

static REDUNDANT_BOOL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*==\s*true\b|\s*!=\s*false\b").expect("redundant-bool regex"));
static SIZE_EQ_ZERO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.size\(\)\s*==\s*0\b").expect("size-comparison regex"));
static WRAPPER_TO_STRING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"new\s+(Integer|Long|Double|Float|Short|Byte|Boolean)\s*\(([^()]*)\)\s*\.toString\(\)")
        .expect("wrapper-toString regex")
});
static DIAMOND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"=\s*new\s+([A-Z]\w*)\s*<[^<>]+>\s*\(").expect("diamond regex"));

fn redundant_boolean_literal(line: &str) -> Option<String> {
    replaced(line, &REDUNDANT_BOOL, "")
}

fn size_comparison_to_is_empty(line: &str) -> Option<String> {
    replaced(line, &SIZE_EQ_ZERO, ".isEmpty()")
}

fn wrapper_to_string(line: &str) -> Option<String> {
    replaced(line, &WRAPPER_TO_STRING, "$1.toString($2)")
}

fn diamond_operator(line: &str) -> Option<String> {
    replaced(line, &DIAMOND, "= new $1<>(")
}

fn replaced(line: &str, regex: &Regex, replacement: &str) -> Option<String> {
    if !regex.is_match(line) {
        return None;
    }
    Some(regex.replace_all(line, replacement).into_owned())
}

/// Minimal tree over one file's text: a root node spanning the whole file
/// with one child per physical line. Enough structure for the lexical
/// catalog while keeping the full [`SourceTree`] contract honest.
pub struct LineTree {
    id: u64,
    text_len: usize,
    lines: Vec<(usize, usize)>,
}

impl LineTree {
    /// Build the tree, or refuse input this engine cannot analyze.
    pub fn parse(text: &str) -> Option<Self> {
        if text.bytes().any(|byte| byte == 0) {
            return None;
        }

        let mut lines = Vec::new();
        let mut start = 0;
        for line in text.split_inclusive('\n') {
            lines.push((start, start + line.len()));
            start += line.len();
        }

        Some(Self {
            id: next_tree_id(),
            text_len: text.len(),
            lines,
        })
    }

    fn check(&self, node: NodeHandle) -> Result<u32, EngineError> {
        if node.tree() != self.id {
            return Err(EngineError::ForeignHandle {
                tree: self.id,
                handle_tree: node.tree(),
            });
        }
        let index = node.node();
        if index as usize > self.lines.len() {
            return Err(EngineError::UnknownNode {
                tree: self.id,
                node: index,
            });
        }
        Ok(index)
    }

    fn line_handles(&self) -> Vec<NodeHandle> {
        (1..=self.lines.len() as u32)
            .map(|index| NodeHandle::new(self.id, index))
            .collect()
    }
}

impl SourceTree for LineTree {
    fn root(&self) -> NodeHandle {
        NodeHandle::new(self.id, 0)
    }

    fn properties(&self, node: NodeHandle) -> Result<NodeProperties, EngineError> {
        let index = self.check(node)?;
        if index == 0 {
            return Ok(NodeProperties {
                kind: "source_file",
                start: 0,
                end: self.text_len,
            });
        }
        let (start, end) = self.lines[index as usize - 1];
        Ok(NodeProperties {
            kind: "line",
            start,
            end,
        })
    }

    fn children(&self, node: NodeHandle) -> Result<Vec<(&'static str, NodeHandle)>, EngineError> {
        let index = self.check(node)?;
        if index != 0 {
            return Ok(Vec::new());
        }
        Ok(self
            .line_handles()
            .into_iter()
            .map(|handle| ("line", handle))
            .collect())
    }

    fn child_lists(
        &self,
        node: NodeHandle,
    ) -> Result<Vec<(&'static str, Vec<NodeHandle>)>, EngineError> {
        let index = self.check(node)?;
        if index != 0 {
            return Ok(Vec::new());
        }
        Ok(vec![("lines", self.line_handles())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::generate_rewrites;

    #[test]
    fn redundant_boolean_literal_is_removed() {
        let source = "class A {\n  void f() {\n    if (ready == true) { go(); }\n  }\n}\n";
        let repairs = BuiltinRules.analyze(source);
        let fix = repairs.iter().find(|r| r.rule_id == 1125).expect("1125");
        assert!(fix.text.contains("if (ready) { go(); }"));
    }

    #[test]
    fn size_comparison_becomes_is_empty() {
        let source = "if (items.size() == 0) {\n  return;\n}\n";
        let repairs = BuiltinRules.analyze(source);
        let fix = repairs.iter().find(|r| r.rule_id == 1155).expect("1155");
        assert!(fix.text.contains("if (items.isEmpty()) {"));
    }

    #[test]
    fn wrapper_instantiation_becomes_static_call() {
        let source = "String s = new Integer(count).toString();\n";
        let repairs = BuiltinRules.analyze(source);
        let fix = repairs.iter().find(|r| r.rule_id == 1158).expect("1158");
        assert!(fix.text.contains("String s = Integer.toString(count);"));
    }

    #[test]
    fn diamond_operator_applies_to_assignments() {
        let source = "List<String> xs = new ArrayList<String>();\n";
        let repairs = BuiltinRules.analyze(source);
        let fix = repairs.iter().find(|r| r.rule_id == 2293).expect("2293");
        assert!(fix.text.contains("List<String> xs = new ArrayList<>();"));
    }

    #[test]
    fn clean_source_yields_no_repairs() {
        let source = "class A {\n  int x;\n}\n";
        assert!(generate_rewrites(&BuiltinRules, source).is_empty());
    }

    #[test]
    fn each_rule_fires_at_most_once_per_file() {
        let source = "if (a == true) {\n}\nif (b == true) {\n}\n";
        let repairs = BuiltinRules.analyze(source);
        let fixes: Vec<_> = repairs.iter().filter(|r| r.rule_id == 1125).collect();
        assert_eq!(fixes.len(), 1);
        // A single rewrite carries every occurrence of the rule's fix.
        assert!(fixes[0].text.contains("if (a) {"));
        assert!(fixes[0].text.contains("if (b) {"));
    }

    #[test]
    fn binary_content_is_unparseable() {
        assert!(LineTree::parse("a\0b").is_none());
        assert!(BuiltinRules.analyze("a\0b").is_empty());
    }

    #[test]
    fn foreign_handle_is_rejected() {
        let first = LineTree::parse("a\n").expect("tree");
        let second = LineTree::parse("b\n").expect("tree");
        let err = first.properties(second.root()).unwrap_err();
        assert!(matches!(err, EngineError::ForeignHandle { .. }));
    }

    #[test]
    fn line_nodes_cover_the_whole_file() {
        let text = "a\nbb\nno-newline";
        let tree = LineTree::parse(text).expect("tree");
        let root = tree.root();
        let lists = tree.child_lists(root).expect("lists");
        let (_, handles) = &lists[0];
        let mut covered = String::new();
        for handle in handles {
            let props = tree.properties(*handle).expect("props");
            assert_eq!(props.kind, "line");
            covered.push_str(&text[props.start..props.end]);
        }
        assert_eq!(covered, text);
    }

    #[test]
    fn unknown_node_is_rejected() {
        let tree = LineTree::parse("a\n").expect("tree");
        let bogus = NodeHandle::new(tree.root().tree(), 99);
        assert!(matches!(
            tree.properties(bogus),
            Err(EngineError::UnknownNode { .. })
        ));
    }
}
