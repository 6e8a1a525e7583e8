//! The resolver's view of the program.

use quill_common::NodeId;
use quill_decl::{DeclId, DeclTree};

/// What a lexical level contributes to name resolution.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Component {
    /// The node does not declare anything (a statement, a name expression).
    Absent,
    /// The node declares a component that is not registered yet, so it
    /// cannot answer questions about names.
    Pending,
    /// The node declares a registered component.
    Ready(DeclId),
}

/// An import that may bind the first segment of a name.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImportBinding {
    /// The import node; its own resolver is keyed by this id.
    pub import: NodeId,
    /// The block that owns the import. The import shadows enclosing names
    /// from this level outward.
    pub block: NodeId,
}

/// Lexical environment implemented by a front end.
pub trait NameScope {
    /// The declaration tree names are resolved against.
    fn tree(&self) -> &DeclTree;

    /// Lexically enclosing node.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// The component declared by `node`, if any.
    fn component(&self, node: NodeId) -> Component;

    /// The innermost import visible from `node` whose alias is `name`.
    fn find_import(&self, node: NodeId, name: &str) -> Option<ImportBinding>;
}
