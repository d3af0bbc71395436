use std::ops::Range;
use std::path::Path;

use serde::Serialize;
use tree_sitter::{Parser, TreeCursor};

use crate::error::{Error, Result};

/// Stable, process-unique node identity. Assigned once during the pre-order
/// traversal that builds the arena; replacement nodes copy the id of the node
/// they derive from, never mint a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// A point in the original text. Lines are 1-based, columns are 0-based byte
/// offsets within the line, matching what the grammar reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub start: Position,
    pub end: Position,
}

/// One node of the parsed tree. Owns no text; spans index into the source
/// the tree was parsed from.
#[derive(Debug)]
pub struct SyntaxNode {
    pub id: NodeId,
    pub kind: &'static str,
    /// Grammar field name this node fills in its parent, if any.
    pub field: Option<&'static str>,
    pub byte_range: Range<usize>,
    pub start: Position,
    pub end: Position,
    pub named: bool,
    children: Vec<u32>,
}

impl SyntaxNode {
    pub fn location(&self) -> Location {
        Location { start: self.start, end: self.end }
    }
}

/// An addressable syntax tree for one source file: a flat arena of nodes in
/// pre-order, plus the text it was parsed from.
#[derive(Debug)]
pub struct SourceTree {
    source: String,
    nodes: Vec<SyntaxNode>,
}

impl SourceTree {
    /// Parse `source` as JavaScript. Any syntax error is fatal for the file.
    pub fn parse(path: &Path, source: &str) -> Result<SourceTree> {
        let mut parser = Parser::new();
        let language = tree_sitter_javascript::LANGUAGE;
        parser
            .set_language(&language.into())
            .expect("grammar version mismatch");

        let tree = parser.parse(source, None).ok_or_else(|| Error::Parse {
            path: path.to_path_buf(),
            message: "parser produced no tree".into(),
        })?;
        if tree.root_node().has_error() {
            return Err(Error::Parse {
                path: path.to_path_buf(),
                message: first_error_message(&mut tree.walk()),
            });
        }

        let mut nodes = Vec::new();
        build_arena(tree.root_node(), None, &mut nodes);
        Ok(SourceTree { source: source.to_string(), nodes })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// All nodes in pre-order traversal order.
    pub fn nodes(&self) -> impl Iterator<Item = &SyntaxNode> {
        self.nodes.iter()
    }

    pub fn node(&self, id: NodeId) -> &SyntaxNode {
        &self.nodes[id.0 as usize - 1]
    }

    /// Serialize a subtree back to text: the original span, verbatim.
    pub fn text(&self, id: NodeId) -> &str {
        let node = self.node(id);
        &self.source[node.byte_range.clone()]
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &SyntaxNode> {
        self.node(id).children.iter().map(|&i| &self.nodes[i as usize - 1])
    }

    pub fn named_children(&self, id: NodeId) -> impl Iterator<Item = &SyntaxNode> {
        self.children(id).filter(|n| n.named)
    }

    pub fn child_by_field(&self, id: NodeId, field: &str) -> Option<&SyntaxNode> {
        self.children(id).find(|n| n.field == Some(field))
    }
}

/// Pre-order arena construction; ids start at 1.
fn build_arena(node: tree_sitter::Node, field: Option<&'static str>, arena: &mut Vec<SyntaxNode>) -> u32 {
    let id = arena.len() as u32 + 1;
    arena.push(SyntaxNode {
        id: NodeId(id),
        kind: node.kind(),
        field,
        byte_range: node.byte_range(),
        start: point_to_position(node.start_position()),
        end: point_to_position(node.end_position()),
        named: node.is_named(),
        children: Vec::new(),
    });

    let mut cursor = node.walk();
    if cursor.goto_first_child() {
        loop {
            let child_field = cursor.field_name();
            let child_id = build_arena(cursor.node(), child_field, arena);
            arena[id as usize - 1].children.push(child_id);
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
    id
}

fn point_to_position(point: tree_sitter::Point) -> Position {
    Position { line: point.row + 1, column: point.column }
}

fn first_error_message(cursor: &mut TreeCursor) -> String {
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            let pos = point_to_position(node.start_position());
            return format!("syntax error at line {}, column {}", pos.line, pos.column + 1);
        }
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        if !cursor.goto_next_sibling() {
            return "syntax error".into();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(source: &str) -> SourceTree {
        SourceTree::parse(&PathBuf::from("file.js"), source).unwrap()
    }

    #[test]
    fn ids_are_assigned_in_preorder_starting_at_one() {
        let tree = parse("var i = 1 + 2;");
        let ids: Vec<u32> = tree.nodes().map(|n| n.id.0).collect();
        assert_eq!(ids, (1..=ids.len() as u32).collect::<Vec<_>>());
        assert_eq!(tree.nodes().next().unwrap().kind, "program");
    }

    #[test]
    fn reparsing_assigns_identical_ids() {
        let a = parse("var i = 1 + 2;");
        let b = parse("var i = 1 + 2;");
        for (x, y) in a.nodes().zip(b.nodes()) {
            assert_eq!(x.id, y.id);
            assert_eq!(x.kind, y.kind);
            assert_eq!(x.byte_range, y.byte_range);
        }
    }

    #[test]
    fn subtree_text_is_original_span() {
        let tree = parse("var i = 1 + 2;");
        let binary = tree.nodes().find(|n| n.kind == "binary_expression").unwrap();
        assert_eq!(tree.text(binary.id), "1 + 2");
    }

    #[test]
    fn operator_child_is_addressable_by_field() {
        let tree = parse("var i = 1 + 2;");
        let binary = tree.nodes().find(|n| n.kind == "binary_expression").unwrap();
        let op = tree.child_by_field(binary.id, "operator").unwrap();
        assert_eq!(tree.text(op.id), "+");
    }

    #[test]
    fn positions_are_one_based_lines() {
        let tree = parse("\n\nvar i = 1 + 2;");
        let binary = tree.nodes().find(|n| n.kind == "binary_expression").unwrap();
        assert_eq!(binary.start.line, 3);
        assert_eq!(binary.start.column, 8);
    }

    #[test]
    fn syntax_error_is_fatal() {
        let err = SourceTree::parse(&PathBuf::from("bad.js"), "var i = ;;;(").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }
}
