use crate::error::{Error, Result};
use crate::tree::{NodeId, SourceTree, SyntaxNode};

/// A replacement node produced by a mutator: the serialized text of the
/// mutated subtree, carrying the identity of the node it derives from. The
/// identity is either the input node's (substitutions) or a child's
/// (deletions that collapse a parent onto a child) — never a fresh one. The
/// generator splices `text` over the original span of `origin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutatedNode {
    pub origin: NodeId,
    pub text: String,
}

/// The closed set of mutation rules. Each variant is stateless and pure: it
/// never touches the input tree, only derives replacement text from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutator {
    BinaryOperator,
    LogicalOperator,
    UnaryOperator,
    UpdateOperator,
    BooleanSubstitution,
    ArrayDeclarator,
    BlockStatement,
    RemoveConditionals,
}

const BINARY_OPERATORS: &[(&str, &[&str])] = &[
    ("+", &["-"]),
    ("-", &["+"]),
    ("*", &["/"]),
    ("/", &["*"]),
    ("%", &["*"]),
    ("<", &["<=", ">="]),
    ("<=", &["<", ">"]),
    (">", &[">=", "<="]),
    (">=", &[">", "<"]),
    ("==", &["!="]),
    ("!=", &["=="]),
    ("===", &["!=="]),
    ("!==", &["==="]),
];

const LOGICAL_OPERATORS: &[(&str, &[&str])] = &[("&&", &["||"]), ("||", &["&&"])];

const UNARY_OPERATORS: &[(&str, &[&str])] = &[("+", &["-"]), ("-", &["+"])];

const UPDATE_OPERATORS: &[(&str, &[&str])] = &[("++", &["--"]), ("--", &["++"])];

impl Mutator {
    pub fn name(&self) -> &'static str {
        match self {
            Mutator::BinaryOperator => "BinaryOperator",
            Mutator::LogicalOperator => "LogicalOperator",
            Mutator::UnaryOperator => "UnaryOperator",
            Mutator::UpdateOperator => "UpdateOperator",
            Mutator::BooleanSubstitution => "BooleanSubstitution",
            Mutator::ArrayDeclarator => "ArrayDeclarator",
            Mutator::BlockStatement => "BlockStatement",
            Mutator::RemoveConditionals => "RemoveConditionals",
        }
    }

    /// Apply this rule to one node, producing every listed alternative in
    /// table order. A node the rule does not recognize yields nothing.
    pub fn apply(&self, tree: &SourceTree, node: &SyntaxNode) -> Vec<MutatedNode> {
        match self {
            Mutator::BinaryOperator => operator_substitutions(tree, node, "binary_expression", BINARY_OPERATORS),
            Mutator::LogicalOperator => operator_substitutions(tree, node, "binary_expression", LOGICAL_OPERATORS),
            Mutator::UnaryOperator => operator_substitutions(tree, node, "unary_expression", UNARY_OPERATORS),
            Mutator::UpdateOperator => operator_substitutions(tree, node, "update_expression", UPDATE_OPERATORS),
            Mutator::BooleanSubstitution => boolean_substitution(tree, node),
            Mutator::ArrayDeclarator => array_declarator(tree, node),
            Mutator::BlockStatement => block_statement(tree, node),
            Mutator::RemoveConditionals => remove_conditionals(tree, node),
        }
    }
}

/// Replace the operator token inside an expression node, keeping the rest of
/// the subtree text verbatim. One replacement per listed alternative.
fn operator_substitutions(
    tree: &SourceTree,
    node: &SyntaxNode,
    kind: &str,
    table: &[(&str, &[&str])],
) -> Vec<MutatedNode> {
    if node.kind != kind {
        return Vec::new();
    }
    let Some(op) = tree.child_by_field(node.id, "operator") else {
        return Vec::new();
    };
    let op_text = tree.text(op.id);
    let Some((_, alternatives)) = table.iter().find(|(from, _)| *from == op_text) else {
        return Vec::new();
    };

    let subtree = tree.text(node.id);
    let rel = op.byte_range.start - node.byte_range.start;
    alternatives
        .iter()
        .map(|alt| MutatedNode {
            origin: node.id,
            text: format!("{}{}{}", &subtree[..rel], alt, &subtree[rel + op_text.len()..]),
        })
        .collect()
}

/// `true` <-> `false`, and `!a` -> `a`. The negation removal collapses the
/// unary expression onto its argument, so the replacement keeps the unary
/// expression's identity while taking the argument's text.
fn boolean_substitution(tree: &SourceTree, node: &SyntaxNode) -> Vec<MutatedNode> {
    match node.kind {
        "true" => vec![MutatedNode { origin: node.id, text: "false".into() }],
        "false" => vec![MutatedNode { origin: node.id, text: "true".into() }],
        "unary_expression" => {
            let is_negation = tree
                .child_by_field(node.id, "operator")
                .is_some_and(|op| tree.text(op.id) == "!");
            if !is_negation {
                return Vec::new();
            }
            match tree.child_by_field(node.id, "argument") {
                Some(argument) => vec![MutatedNode {
                    origin: node.id,
                    text: tree.text(argument.id).to_string(),
                }],
                None => Vec::new(),
            }
        }
        _ => Vec::new(),
    }
}

/// Empty out array literals and `Array(...)` / `new Array(...)` calls.
fn array_declarator(tree: &SourceTree, node: &SyntaxNode) -> Vec<MutatedNode> {
    match node.kind {
        "array" => {
            if tree.named_children(node.id).next().is_none() {
                return Vec::new();
            }
            vec![MutatedNode { origin: node.id, text: "[]".into() }]
        }
        "call_expression" | "new_expression" => {
            let callee_field = if node.kind == "call_expression" { "function" } else { "constructor" };
            let Some(callee) = tree.child_by_field(node.id, callee_field) else {
                return Vec::new();
            };
            if callee.kind != "identifier" || tree.text(callee.id) != "Array" {
                return Vec::new();
            }
            let Some(arguments) = tree.child_by_field(node.id, "arguments") else {
                return Vec::new();
            };
            if tree.named_children(arguments.id).next().is_none() {
                return Vec::new();
            }
            let subtree = tree.text(node.id);
            let rel = arguments.byte_range.start - node.byte_range.start;
            vec![MutatedNode { origin: node.id, text: format!("{}()", &subtree[..rel]) }]
        }
        _ => Vec::new(),
    }
}

/// Empty out non-empty statement blocks.
fn block_statement(tree: &SourceTree, node: &SyntaxNode) -> Vec<MutatedNode> {
    if node.kind != "statement_block" || tree.named_children(node.id).next().is_none() {
        return Vec::new();
    }
    vec![MutatedNode { origin: node.id, text: "{}".into() }]
}

/// Force conditions to constants. Loop conditions only get `false` so the
/// mutant cannot spin forever; if/ternary conditions get both `false` and
/// `true`. The replacement carries the condition node's identity, except for
/// a condition-less `for(;;)` where the whole statement is rewritten under
/// its own identity.
fn remove_conditionals(tree: &SourceTree, node: &SyntaxNode) -> Vec<MutatedNode> {
    match node.kind {
        "while_statement" | "do_statement" => match condition_expression(tree, node) {
            Some(test) => vec![MutatedNode { origin: test.id, text: "false".into() }],
            None => Vec::new(),
        },
        "for_statement" => for_condition(tree, node),
        "if_statement" => match condition_expression(tree, node) {
            Some(test) => vec![
                MutatedNode { origin: test.id, text: "false".into() },
                MutatedNode { origin: test.id, text: "true".into() },
            ],
            None => Vec::new(),
        },
        "ternary_expression" => match tree.child_by_field(node.id, "condition") {
            Some(test) => vec![
                MutatedNode { origin: test.id, text: "false".into() },
                MutatedNode { origin: test.id, text: "true".into() },
            ],
            None => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// The expression inside a `(condition)` field.
fn condition_expression<'t>(tree: &'t SourceTree, node: &SyntaxNode) -> Option<&'t SyntaxNode> {
    let condition = tree.child_by_field(node.id, "condition")?;
    if condition.kind == "parenthesized_expression" {
        tree.named_children(condition.id).next()
    } else {
        Some(condition)
    }
}

fn for_condition(tree: &SourceTree, node: &SyntaxNode) -> Vec<MutatedNode> {
    let Some(condition) = tree.child_by_field(node.id, "condition") else {
        return Vec::new();
    };
    match condition.kind {
        // `for (init; cond; incr)`: the condition slot holds `cond;`.
        "expression_statement" => match tree.named_children(condition.id).next() {
            Some(test) => vec![MutatedNode { origin: test.id, text: "false".into() }],
            None => Vec::new(),
        },
        // `for (init; ; incr)`: no condition to target, so rewrite the whole
        // statement with `false` in the empty slot.
        "empty_statement" => {
            let subtree = tree.text(node.id);
            let rel = condition.byte_range.start - node.byte_range.start;
            let len = condition.byte_range.len();
            vec![MutatedNode {
                origin: node.id,
                text: format!("{}false;{}", &subtree[..rel], &subtree[rel + len..]),
            }]
        }
        _ => Vec::new(),
    }
}

/// Mutator registry: name -> rule, in registration order. A closed dispatch
/// table built at startup; adding a mutator means adding an enum variant.
pub struct MutatorRegistry {
    entries: Vec<(String, Mutator)>,
}

pub const DEFAULT_MUTATORS: &[Mutator] = &[
    Mutator::BinaryOperator,
    Mutator::LogicalOperator,
    Mutator::UnaryOperator,
    Mutator::UpdateOperator,
    Mutator::BooleanSubstitution,
    Mutator::ArrayDeclarator,
    Mutator::BlockStatement,
    Mutator::RemoveConditionals,
];

impl MutatorRegistry {
    pub fn new() -> MutatorRegistry {
        MutatorRegistry { entries: Vec::new() }
    }

    /// Registry with every built-in mutator, in canonical order.
    pub fn with_defaults() -> MutatorRegistry {
        let mut registry = MutatorRegistry::new();
        for &mutator in DEFAULT_MUTATORS {
            registry.register(mutator.name(), mutator);
        }
        registry
    }

    /// Names must be unique; re-registering a name keeps the first entry.
    pub fn register(&mut self, name: &str, mutator: Mutator) {
        if !self.entries.iter().any(|(n, _)| n == name) {
            self.entries.push((name.to_string(), mutator));
        }
    }

    pub fn known_names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn create(&self, name: &str) -> Result<Mutator> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, m)| m)
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "unknown mutator '{}', known mutators: {}",
                    name,
                    self.known_names().join(", ")
                ))
            })
    }

    /// All registered mutators, in registration order.
    pub fn mutators(&self) -> Vec<Mutator> {
        self.entries.iter().map(|&(_, m)| m).collect()
    }
}

impl Default for MutatorRegistry {
    fn default() -> Self {
        MutatorRegistry::with_defaults()
    }
}
