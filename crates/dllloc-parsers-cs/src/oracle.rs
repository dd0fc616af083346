//! "Is this expression text?" capability used by the non-literal extraction mode.

use crate::tree::{NodeId, SyntaxKind, SyntaxTree};
use crate::ParsedUnit;
use dllloc_core::FIELD_NAME_SEPARATOR;
use rayon::prelude::*;
use std::collections::HashSet;

pub trait TypeOracle: Sync {
    fn is_text(&self, tree: &SyntaxTree, node: NodeId) -> bool;
}

/// Accepts string literals only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralOracle;

impl TypeOracle for LiteralOracle {
    fn is_text(&self, tree: &SyntaxTree, node: NodeId) -> bool {
        tree.node(node).kind == SyntaxKind::StringLiteral
    }
}

const TEXT_STATICS: &[&str] = &["Format", "Concat", "Join", "Copy", "Intern", "Empty"];

pub fn is_text_type(t: &str) -> bool {
    matches!(
        t.trim().trim_end_matches('?'),
        "string" | "String" | "System.String" | "global::System.String"
    )
}

/// Corpus-wide table of members declared as text, built once before analysis.
#[derive(Debug, Clone, Default)]
pub struct SemanticIndex {
    members: HashSet<String>,
    methods: HashSet<String>,
}

impl SemanticIndex {
    pub fn build(units: &[ParsedUnit]) -> Self {
        units
            .par_iter()
            .map(|u| Self::from_tree(&u.tree))
            .reduce(Self::default, |mut a, b| {
                a.members.extend(b.members);
                a.methods.extend(b.methods);
                a
            })
    }

    fn from_tree(tree: &SyntaxTree) -> Self {
        let mut index = Self::default();
        for id in tree.preorder() {
            let node = tree.node(id);
            let (Some(name), Some(ty)) = (node.name.as_deref(), node.type_name.as_deref()) else {
                continue;
            };
            if !is_text_type(ty) {
                continue;
            }
            match node.kind {
                SyntaxKind::Field => index
                    .members
                    .extend(name.split(FIELD_NAME_SEPARATOR).map(str::to_string)),
                SyntaxKind::Property => {
                    index.members.insert(name.to_string());
                }
                SyntaxKind::Method => {
                    index.methods.insert(name.to_string());
                }
                _ => {}
            }
        }
        index
    }

    pub fn is_text_member(&self, name: &str) -> bool {
        self.members.contains(name)
    }

    pub fn is_text_method(&self, name: &str) -> bool {
        self.methods.contains(name)
    }

    fn invocation_is_text(&self, tree: &SyntaxTree, id: NodeId) -> bool {
        let Some(function) = tree.child_by_field(id, "function") else {
            return false;
        };
        match tree.node(function).grammar {
            "member_access_expression" => {
                let name = tree
                    .child_by_field(function, "name")
                    .map(|n| tree.text(n))
                    .unwrap_or_default();
                let target = tree
                    .child_by_field(function, "expression")
                    .map(|n| tree.text(n))
                    .unwrap_or_default();
                name == "ToString"
                    || (is_text_type(target) && TEXT_STATICS.contains(&name))
                    || self.is_text_method(name)
            }
            "identifier" => self.is_text_method(tree.text(function)),
            _ => false,
        }
    }

    fn member_access_is_text(&self, tree: &SyntaxTree, id: NodeId) -> bool {
        // `a.B()` is judged as a whole by the invocation.
        if tree.node(id).field == Some("function") {
            return false;
        }
        let name = tree
            .child_by_field(id, "name")
            .map(|n| tree.text(n))
            .unwrap_or_default();
        let target = tree
            .child_by_field(id, "expression")
            .map(|n| tree.text(n))
            .unwrap_or_default();
        (is_text_type(target) && name == "Empty") || self.is_text_member(name)
    }

    fn identifier_is_text(&self, tree: &SyntaxTree, id: NodeId) -> bool {
        if matches!(tree.node(id).field, Some("name" | "function" | "type")) {
            return false;
        }
        let name = tree.text(id);
        let declares_itself = tree.parent(id).is_some_and(|p| {
            let parent = tree.node(p);
            matches!(parent.grammar, "variable_declarator" | "parameter")
                && parent.name.as_deref() == Some(name)
        });
        if declares_itself {
            return false;
        }
        match local_is_text(tree, id, name) {
            Some(local) => local,
            None => self.is_text_member(name),
        }
    }
}

/// Resolve `name` against parameters and locals of the enclosing member.
/// `None` when no local declaration of that name exists.
fn local_is_text(tree: &SyntaxTree, id: NodeId, name: &str) -> Option<bool> {
    let scope = tree.local_scope(id)?;
    tree.local_type(scope, name)
        .map(|ty| ty.is_some_and(is_text_type))
}

fn operator_text(tree: &SyntaxTree, id: NodeId) -> Option<&str> {
    let left = tree.child_by_field(id, "left")?;
    let right = tree.child_by_field(id, "right")?;
    tree.source()
        .get(tree.node(left).range.end..tree.node(right).range.start)
        .map(str::trim)
}

impl TypeOracle for SemanticIndex {
    fn is_text(&self, tree: &SyntaxTree, id: NodeId) -> bool {
        let node = tree.node(id);
        if matches!(
            node.kind,
            SyntaxKind::StringLiteral | SyntaxKind::InterpolatedString
        ) {
            return true;
        }
        let is = |field: &str| {
            tree.child_by_field(id, field)
                .is_some_and(|c| self.is_text(tree, c))
        };
        match node.grammar {
            "binary_expression" => operator_text(tree, id) == Some("+") && (is("left") || is("right")),
            "parenthesized_expression" => node
                .children
                .first()
                .is_some_and(|&c| self.is_text(tree, c)),
            "conditional_expression" => is("consequence") || is("alternative"),
            "cast_expression" => tree
                .child_by_field(id, "type")
                .is_some_and(|t| is_text_type(tree.text(t))),
            "invocation_expression" => self.invocation_is_text(tree, id),
            "member_access_expression" => self.member_access_is_text(tree, id),
            "identifier" => self.identifier_is_text(tree, id),
            _ => false,
        }
    }
}
