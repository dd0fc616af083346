//! Index-addressed syntax arena.
//!
//! Nodes are stored in pre-order, so a node's id is always greater than its
//! parent's and a subtree occupies a contiguous id range.

use std::collections::HashMap;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Coarse classification the extractor cares about; everything else is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    Root,
    TypeDecl,
    Method,
    Constructor,
    Destructor,
    Property,
    Field,
    Statement,
    StringLiteral,
    InterpolatedString,
    Other,
}

impl SyntaxKind {
    /// Declarations that give spans their enclosing name.
    pub fn is_named_member(self) -> bool {
        matches!(
            self,
            SyntaxKind::Method
                | SyntaxKind::Constructor
                | SyntaxKind::Destructor
                | SyntaxKind::Property
                | SyntaxKind::Field
        )
    }
}

#[derive(Debug, Clone)]
pub struct SyntaxNode {
    pub kind: SyntaxKind,
    /// Grammar node kind as reported by the parser (`"invocation_expression"`, ...).
    pub grammar: &'static str,
    /// Field label of this node inside its parent (`"name"`, `"body"`, ...).
    pub field: Option<&'static str>,
    pub range: Range<usize>,
    /// 1-based line of `range.start`.
    pub line: usize,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Declared name for declarations, declarators and parameters.
    pub name: Option<String>,
    /// Declared type text for members, locals and parameters.
    pub type_name: Option<String>,
}

impl SyntaxNode {
    pub fn new(kind: SyntaxKind, grammar: &'static str, range: Range<usize>, line: usize) -> Self {
        Self {
            kind,
            grammar,
            field: None,
            range,
            line,
            parent: None,
            children: Vec::new(),
            name: None,
            type_name: None,
        }
    }

    pub fn with_field(mut self, field: &'static str) -> Self {
        self.field = Some(field);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct SyntaxTree {
    text: String,
    nodes: Vec<SyntaxNode>,
    has_errors: bool,
    /// Parameters and locals per member scope, with their declared types.
    locals: HashMap<NodeId, HashMap<String, Option<String>>>,
}

impl SyntaxTree {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            nodes: Vec::new(),
            has_errors: false,
            locals: HashMap::new(),
        }
    }

    /// Append `node` as the last child of `parent` (or as the root).
    /// Nodes must be pushed in pre-order.
    pub fn push(&mut self, parent: Option<NodeId>, mut node: SyntaxNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        node.parent = parent;
        if let Some(p) = parent {
            self.nodes[p.index()].children.push(id);
        }
        self.nodes.push(node);
        id
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut SyntaxNode {
        &mut self.nodes[id.index()]
    }

    pub(crate) fn set_has_errors(&mut self, v: bool) {
        self.has_errors = v;
    }

    /// Record a local declaration; the first one of a name in a scope wins.
    pub(crate) fn declare_local(&mut self, scope: NodeId, name: String, type_name: Option<String>) {
        self.locals
            .entry(scope)
            .or_default()
            .entry(name)
            .or_insert(type_name);
    }

    /// Member whose parameters and locals are visible from `id`.
    pub fn local_scope(&self, id: NodeId) -> Option<NodeId> {
        self.enclosing(id, |n| {
            matches!(
                n.kind,
                SyntaxKind::Method
                    | SyntaxKind::Constructor
                    | SyntaxKind::Destructor
                    | SyntaxKind::Property
            )
        })
    }

    /// Declared type of the parameter or local `name` in `scope`.
    /// `None` when the scope declares no such name.
    pub fn local_type(&self, scope: NodeId, name: &str) -> Option<Option<&str>> {
        self.locals
            .get(&scope)?
            .get(name)
            .map(|t| t.as_deref())
    }

    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    pub fn root(&self) -> Option<NodeId> {
        (!self.nodes.is_empty()).then_some(NodeId(0))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &SyntaxNode {
        &self.nodes[id.index()]
    }

    pub fn source(&self) -> &str {
        &self.text
    }

    pub fn text(&self, id: NodeId) -> &str {
        &self.text[self.node(id).range.clone()]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// All node ids in pre-order.
    pub fn preorder(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    /// Strict ancestors, innermost first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }

    /// Innermost node among `id` and its ancestors that satisfies `pred`.
    pub fn enclosing(&self, id: NodeId, pred: impl Fn(&SyntaxNode) -> bool) -> Option<NodeId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|&n| pred(self.node(n)))
    }

    /// True when `a` is a strict ancestor of `b`.
    pub fn is_ancestor_of(&self, a: NodeId, b: NodeId) -> bool {
        // Pre-order ids: an ancestor always has a smaller id.
        a < b && self.ancestors(b).any(|n| n == a)
    }

    pub fn child_by_field(&self, id: NodeId, field: &str) -> Option<NodeId> {
        self.node(id)
            .children
            .iter()
            .copied()
            .find(|&c| self.node(c).field == Some(field))
    }

    /// Descendants of `id` (excluding `id`) in pre-order.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let end = self
            .nodes
            .iter()
            .enumerate()
            .skip(id.index() + 1)
            .find(|(_, n)| !self.is_within(n, id))
            .map(|(i, _)| i)
            .unwrap_or(self.nodes.len());
        (id.index() as u32 + 1..end as u32).map(NodeId)
    }

    fn is_within(&self, node: &SyntaxNode, ancestor: NodeId) -> bool {
        let mut cur = node.parent;
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            if p < ancestor {
                return false;
            }
            cur = self.node(p).parent;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (SyntaxTree, [NodeId; 5]) {
        // root
        // ├── method
        // │   └── stmt
        // │       └── literal
        // └── field
        let text = "0123456789abcdefghij";
        let mut t = SyntaxTree::new(text);
        let root = t.push(None, SyntaxNode::new(SyntaxKind::Root, "compilation_unit", 0..20, 1));
        let method = t.push(
            Some(root),
            SyntaxNode::new(SyntaxKind::Method, "method_declaration", 0..10, 1).with_name("Run"),
        );
        let stmt = t.push(
            Some(method),
            SyntaxNode::new(SyntaxKind::Statement, "expression_statement", 2..9, 1),
        );
        let lit = t.push(
            Some(stmt),
            SyntaxNode::new(SyntaxKind::StringLiteral, "string_literal", 3..6, 1).with_field("arguments"),
        );
        let field = t.push(
            Some(root),
            SyntaxNode::new(SyntaxKind::Field, "field_declaration", 10..20, 2),
        );
        (t, [root, method, stmt, lit, field])
    }

    #[test]
    fn ancestry_queries() {
        let (t, [root, method, stmt, lit, field]) = sample();
        assert_eq!(t.ancestors(lit).collect::<Vec<_>>(), vec![stmt, method, root]);
        assert!(t.is_ancestor_of(method, lit));
        assert!(!t.is_ancestor_of(lit, method));
        assert!(!t.is_ancestor_of(field, lit));
        assert!(!t.is_ancestor_of(lit, lit));
        assert_eq!(
            t.enclosing(lit, |n| n.kind.is_named_member()),
            Some(method)
        );
        assert_eq!(t.text(lit), "345");
        assert_eq!(t.child_by_field(stmt, "arguments"), Some(lit));
    }

    #[test]
    fn descendants_cover_the_subtree_only() {
        let (t, [root, method, stmt, lit, field]) = sample();
        assert_eq!(t.descendants(method).collect::<Vec<_>>(), vec![stmt, lit]);
        assert_eq!(t.descendants(root).count(), 4);
        assert_eq!(t.descendants(field).count(), 0);
    }
}
