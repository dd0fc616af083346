//! Lowering of tree-sitter C# parse trees into the [`SyntaxTree`] arena.

use crate::tree::{NodeId, SyntaxKind, SyntaxNode, SyntaxTree};
use color_eyre::eyre::{eyre, Result};
use dllloc_core::FIELD_NAME_SEPARATOR;
use tree_sitter::{Parser, Tree};

pub fn csharp_parser() -> Result<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_c_sharp::LANGUAGE.into())
        .map_err(|e| eyre!("failed to load C# grammar: {e}"))?;
    Ok(parser)
}

fn classify(grammar: &str) -> SyntaxKind {
    match grammar {
        "compilation_unit" => SyntaxKind::Root,
        "class_declaration"
        | "struct_declaration"
        | "record_declaration"
        | "record_struct_declaration"
        | "interface_declaration"
        | "enum_declaration" => SyntaxKind::TypeDecl,
        "method_declaration" | "operator_declaration" | "conversion_operator_declaration" => {
            SyntaxKind::Method
        }
        "constructor_declaration" => SyntaxKind::Constructor,
        "destructor_declaration" => SyntaxKind::Destructor,
        "property_declaration" | "indexer_declaration" | "event_declaration" => {
            SyntaxKind::Property
        }
        "field_declaration" | "event_field_declaration" => SyntaxKind::Field,
        "block" => SyntaxKind::Statement,
        g if g.ends_with("_statement") => SyntaxKind::Statement,
        "string_literal" | "verbatim_string_literal" | "raw_string_literal" => {
            SyntaxKind::StringLiteral
        }
        "interpolated_string_expression" => SyntaxKind::InterpolatedString,
        _ => SyntaxKind::Other,
    }
}

/// Copy the named nodes of `parsed` into an arena, then resolve declaration
/// names and declared types.
pub fn lower(parsed: &Tree, text: String) -> SyntaxTree {
    let mut out = SyntaxTree::new(text);
    out.set_has_errors(parsed.root_node().has_error());

    let mut cursor = parsed.walk();
    // Effective arena parent for each cursor depth; anonymous tokens are skipped.
    let mut stack: Vec<Option<NodeId>> = Vec::new();
    loop {
        let node = cursor.node();
        let parent = stack.last().copied().flatten();
        let own = if node.is_named() {
            let grammar = node.kind();
            let mut lowered = SyntaxNode::new(
                classify(grammar),
                grammar,
                node.byte_range(),
                node.start_position().row + 1,
            );
            lowered.field = cursor.field_name();
            Some(out.push(parent, lowered))
        } else {
            parent
        };

        if cursor.goto_first_child() {
            stack.push(own);
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                resolve_names(&mut out);
                collect_locals(&mut out);
                return out;
            }
            stack.pop();
        }
    }
}

fn field_text(tree: &SyntaxTree, id: NodeId, field: &str) -> Option<String> {
    tree.child_by_field(id, field)
        .map(|c| tree.text(c).trim().to_string())
}

fn first_child_with_grammar(tree: &SyntaxTree, id: NodeId, grammar: &str) -> Option<NodeId> {
    tree.node(id)
        .children
        .iter()
        .copied()
        .find(|&c| tree.node(c).grammar == grammar)
}

fn declarator_name(tree: &SyntaxTree, id: NodeId) -> Option<String> {
    field_text(tree, id, "name").or_else(|| {
        first_child_with_grammar(tree, id, "identifier").map(|c| tree.text(c).to_string())
    })
}

fn declared_type(tree: &SyntaxTree, id: NodeId) -> Option<String> {
    field_text(tree, id, "type").or_else(|| field_text(tree, id, "returns"))
}

fn resolve_names(tree: &mut SyntaxTree) {
    let ids: Vec<NodeId> = tree.preorder().collect();
    for id in ids {
        let node = tree.node(id);
        let (name, type_name) = match (node.kind, node.grammar) {
            (SyntaxKind::Field, _) => {
                let decl = first_child_with_grammar(tree, id, "variable_declaration");
                let names: Vec<String> = decl
                    .map(|d| {
                        tree.node(d)
                            .children
                            .iter()
                            .filter(|&&c| tree.node(c).grammar == "variable_declarator")
                            .filter_map(|&c| declarator_name(tree, c))
                            .collect()
                    })
                    .unwrap_or_default();
                let names = (!names.is_empty()).then(|| names.join(FIELD_NAME_SEPARATOR));
                (names, decl.and_then(|d| declared_type(tree, d)))
            }
            (_, "indexer_declaration") => (Some("this".to_string()), declared_type(tree, id)),
            (_, "operator_declaration") | (_, "conversion_operator_declaration") => {
                (Some("operator".to_string()), declared_type(tree, id))
            }
            (SyntaxKind::Method | SyntaxKind::Property, _) => {
                (field_text(tree, id, "name"), declared_type(tree, id))
            }
            (SyntaxKind::Constructor | SyntaxKind::Destructor | SyntaxKind::TypeDecl, _) => {
                (field_text(tree, id, "name"), None)
            }
            (_, "local_function_statement") | (_, "parameter") => {
                (field_text(tree, id, "name"), declared_type(tree, id))
            }
            (_, "variable_declarator") => (declarator_name(tree, id), None),
            (_, "variable_declaration") => (None, declared_type(tree, id)),
            _ => continue,
        };
        let node = tree.node_mut(id);
        node.name = name;
        node.type_name = type_name;
    }
}

/// Build the per-member table of parameters and locals in one pre-order pass.
fn collect_locals(tree: &mut SyntaxTree) {
    let mut found = Vec::new();
    for id in tree.preorder() {
        let node = tree.node(id);
        let names: Vec<String> = match node.grammar {
            "parameter" => node.name.iter().cloned().collect(),
            "variable_declaration" => node
                .children
                .iter()
                .filter_map(|&c| tree.node(c).name.clone())
                .collect(),
            _ => continue,
        };
        let Some(scope) = tree.local_scope(id) else {
            continue;
        };
        for name in names {
            found.push((scope, name, node.type_name.clone()));
        }
    }
    for (scope, name, type_name) in found {
        tree.declare_local(scope, name, type_name);
    }
}
