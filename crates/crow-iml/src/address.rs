//! Structural positions inside a document.
//!
//! A [`NodeAddress`] names a place in the markup (type + sibling index per
//! level), not a runtime object: every instantiation of the same position,
//! such as every row built from one item template, shares the address.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::catalog::TypeRef;

/// Sibling index of a template root.
pub const TEMPLATE_SLOT: i32 = -1;

// ── Node ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Node {
    ty: TypeRef,
    index: i32,
}

impl Node {
    pub fn new(ty: TypeRef, index: i32) -> Self {
        Self { ty, index }
    }

    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    pub fn index(&self) -> i32 {
        self.index
    }

    pub fn is_template_slot(&self) -> bool {
        self.index == TEMPLATE_SLOT
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.ty.name == other.ty.name
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ty.name.hash(state);
        self.index.hash(state);
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_template_slot() {
            write!(f, "{}.tmpl", self.ty.name)
        } else {
            write!(f, "{}.{}", self.ty.name, self.index)
        }
    }
}

// ── NodeAddress ───────────────────────────────────────────────────────────

/// Root-to-node path. The empty address stands for "the enclosing template
/// root", which only exists at runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodeAddress(Vec<Node>);

impl NodeAddress {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self(nodes)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Type of the addressed node.
    pub fn node_type(&self) -> Option<&TypeRef> {
        self.0.last().map(Node::ty)
    }

    pub fn parent(&self) -> Option<NodeAddress> {
        (!self.0.is_empty()).then(|| self.prefix(self.0.len() - 1))
    }

    /// The first `len` nodes.
    pub fn prefix(&self, len: usize) -> NodeAddress {
        NodeAddress(self.0[..len.min(self.0.len())].to_vec())
    }

    pub fn starts_with(&self, prefix: &NodeAddress) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Walks `levels` nodes up; `None` once the walk leaves the document.
    pub fn ascend(&self, levels: usize) -> Option<NodeAddress> {
        (levels < self.0.len()).then(|| self.prefix(self.0.len() - levels))
    }

    /// Nearest strict ancestor whose type is a templated control.
    pub fn enclosing_templated_control(&self) -> Option<NodeAddress> {
        let n = self.0.len();
        (0..n.saturating_sub(1))
            .rev()
            .find(|&i| self.0[i].ty.capability.is_templated())
            .map(|i| self.prefix(i + 1))
    }

    /// Length of the common leading run shared with `other`.
    pub fn common_prefix_len(&self, other: &NodeAddress) -> usize {
        self.0.iter().zip(&other.0).take_while(|(a, b)| a == b).count()
    }

    /// Whether a template boundary lies below the first node that follows
    /// `scope_len`. The node right after the scope may itself be a template
    /// root; anything deeper behind one belongs to another naming scope.
    pub fn crosses_template_below(&self, scope_len: usize) -> bool {
        self.0.iter().skip(scope_len + 1).any(Node::is_template_slot)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<template root>");
        }
        for (i, node) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{node}")?;
        }
        Ok(())
    }
}

/// An element declared with `Name="..."`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedNodeAddress {
    pub name: String,
    pub address: NodeAddress,
}

impl NamedNodeAddress {
    pub fn new(name: impl Into<String>, address: NodeAddress) -> Self {
        Self { name: name.into(), address }
    }
}

impl fmt::Display for NamedNodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.address)
    }
}

// ── NodeStack ─────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Frame {
    node: Node,
    /// Index the next child pushed under this frame receives.
    next_child: i32,
}

/// Mirrors the parse depth while a document is compiled.
#[derive(Debug, Default)]
pub struct NodeStack {
    frames: Vec<Frame>,
}

impl NodeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Pushes an ordinary child at the current frame's sibling index.
    pub fn push(&mut self, ty: TypeRef) {
        let index = self.frames.last().map_or(0, |f| f.next_child);
        self.push_at(ty, index);
    }

    /// Pushes a template root; it does not consume a sibling index.
    pub fn push_template(&mut self, ty: TypeRef) {
        self.push_at(ty, TEMPLATE_SLOT);
    }

    fn push_at(&mut self, ty: TypeRef, index: i32) {
        self.frames.push(Frame { node: Node::new(ty, index), next_child: 0 });
    }

    pub fn pop(&mut self) -> Option<Node> {
        self.frames.pop().map(|f| f.node)
    }

    pub fn increment_index(&mut self) {
        if let Some(f) = self.frames.last_mut() {
            f.next_child += 1;
        }
    }

    pub fn decrement_index(&mut self) {
        if let Some(f) = self.frames.last_mut() {
            f.next_child = (f.next_child - 1).max(0);
        }
    }

    pub fn reset_index(&mut self) {
        if let Some(f) = self.frames.last_mut() {
            f.next_child = 0;
        }
    }

    /// Immutable snapshot of the path to the current node.
    pub fn current_address(&self) -> NodeAddress {
        NodeAddress(self.frames.iter().map(|f| f.node.clone()).collect())
    }
}
