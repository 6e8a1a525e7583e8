//! Side table of name resolvers keyed by the node that owns them.
//!
//! The driver owns one table per compilation. Front ends create a resolver
//! lazily the first time a reference needs resolving and drive it through the
//! table, so resolver state survives between sweeps without being stored on
//! the (immutable) AST.

use rustc_hash::FxHashMap;

use quill_common::{DiagnosticSink, NodeId};
use quill_decl::Identity;

use crate::resolver::{NameResolver, ResolveResult};
use crate::scope::NameScope;

#[derive(Clone, Debug, Default)]
pub struct ResolverTable {
    resolvers: FxHashMap<NodeId, NameResolver>,
}

impl ResolverTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.resolvers.contains_key(&node)
    }

    #[must_use]
    pub fn get(&self, node: NodeId) -> Option<&NameResolver> {
        self.resolvers.get(&node)
    }

    /// Install a resolver for its node unless one exists already.
    pub fn ensure(&mut self, resolver: NameResolver) -> &NameResolver {
        self.resolvers.entry(resolver.node()).or_insert(resolver)
    }

    /// Drop the resolver owned by `node` (the node was discarded).
    pub fn remove(&mut self, node: NodeId) -> Option<NameResolver> {
        self.resolvers.remove(&node)
    }

    /// Resolve the name owned by `node`.
    ///
    /// The resolver is taken out of the table for the duration of the call, so
    /// a reference that reaches its own node again (an import cycle) sees no
    /// resolver and answers `Deferred`. A node without a resolver also answers
    /// `Deferred`: its owner has not run yet.
    pub fn resolve(
        &mut self,
        node: NodeId,
        scope: &dyn NameScope,
        errs: &mut DiagnosticSink,
    ) -> ResolveResult {
        let Some(mut resolver) = self.resolvers.remove(&node) else {
            return ResolveResult::Deferred;
        };
        let result = resolver.resolve(scope, self, errs);
        self.resolvers.insert(node, resolver);
        result
    }

    /// Resolve the name owned by `node` with deferral no longer permitted.
    pub fn force_resolve(
        &mut self,
        node: NodeId,
        scope: &dyn NameScope,
        errs: &mut DiagnosticSink,
    ) -> Option<Identity> {
        let mut resolver = self.resolvers.remove(&node)?;
        let identity = resolver.force_resolve(scope, self, errs);
        self.resolvers.insert(node, resolver);
        identity
    }

    /// Resolvers that are neither resolved nor failed.
    pub fn pending(&self) -> impl Iterator<Item = &NameResolver> {
        self.resolvers
            .values()
            .filter(|r| !r.is_resolved() && !r.is_error())
    }
}
