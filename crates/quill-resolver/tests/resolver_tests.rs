use rustc_hash::FxHashMap;

use quill_common::{DiagnosticSink, NodeId, diagnostic_codes};
use quill_decl::{Access, DeclId, DeclKind, DeclTree, Identity};
use quill_resolver::{
    Component, ImportBinding, NameResolver, NameScope, ResolveResult, ResolverTable, TypeMode,
};

/// A hand-built lexical environment: nodes with parents, components and imports.
#[derive(Default)]
struct TestScope {
    tree: DeclTree,
    parents: FxHashMap<NodeId, NodeId>,
    components: FxHashMap<NodeId, Component>,
    imports: Vec<(NodeId, String, NodeId)>,
    next: u32,
}

impl TestScope {
    fn node(&mut self, parent: Option<NodeId>, component: Component) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        if let Some(parent) = parent {
            self.parents.insert(id, parent);
        }
        self.components.insert(id, component);
        id
    }

    fn import(&mut self, block: NodeId, alias: &str) -> NodeId {
        let id = self.node(Some(block), Component::Absent);
        self.imports.push((block, alias.to_string(), id));
        id
    }

    fn class(&mut self, parent: DeclId, name: &str) -> DeclId {
        self.tree
            .add_child(parent, name, DeclKind::Class, Access::Public)
            .expect("class registers")
    }
}

impl NameScope for TestScope {
    fn tree(&self) -> &DeclTree {
        &self.tree
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.parents.get(&node).copied()
    }

    fn component(&self, node: NodeId) -> Component {
        self.components
            .get(&node)
            .copied()
            .unwrap_or(Component::Absent)
    }

    fn find_import(&self, node: NodeId, name: &str) -> Option<ImportBinding> {
        let mut current = Some(node);
        // a chain longer than the node count has a cycle
        for _ in 0..self.next {
            let Some(n) = current else { break };
            if let Some((block, _, import)) = self
                .imports
                .iter()
                .find(|(block, alias, _)| *block == n && alias == name)
            {
                return Some(ImportBinding {
                    import: *import,
                    block: *block,
                });
            }
            current = self.parent(n);
        }
        None
    }
}

fn codes(errs: &DiagnosticSink) -> Vec<(u32, String)> {
    errs.diagnostics()
        .iter()
        .map(|d| (d.code, d.message_text.clone()))
        .collect()
}

/// Module `app` with classes `Outer { Inner, run() }` and a reference node
/// inside `Inner`.
fn app_scope() -> (TestScope, NodeId, DeclId, DeclId, DeclId) {
    let mut scope = TestScope::default();
    let app = scope.tree.add_module("app");
    let outer = scope.class(app, "Outer");
    let inner = scope.class(outer, "Inner");
    scope
        .tree
        .add_child(outer, "run", DeclKind::Method, Access::Public)
        .expect("method registers");

    let module_node = scope.node(None, Component::Ready(app));
    let outer_node = scope.node(Some(module_node), Component::Ready(outer));
    let inner_node = scope.node(Some(outer_node), Component::Ready(inner));
    let reference = scope.node(Some(inner_node), Component::Absent);
    (scope, reference, app, outer, inner)
}

#[test]
fn test_first_name_resolves_through_enclosures() {
    let (scope, reference, _, outer, _) = app_scope();
    let mut table = ResolverTable::new();
    let mut errs = DiagnosticSink::new();

    let mut resolver = NameResolver::new(reference, ["Outer"]);
    assert!(resolver.is_first_time());
    assert_eq!(
        resolver.resolve(&scope, &mut table, &mut errs),
        ResolveResult::Resolved
    );
    assert!(!resolver.is_first_time());
    assert_eq!(resolver.identity(), Some(&Identity::Decl(outer)));
    assert_eq!(resolver.base_identity(), Some(&Identity::Decl(outer)));
    assert!(errs.is_empty(), "got: {:?}", codes(&errs));
}

#[test]
fn test_dotted_name_keeps_base_identity() {
    let (scope, reference, _, outer, inner) = app_scope();
    let mut table = ResolverTable::new();
    let mut errs = DiagnosticSink::new();

    let mut resolver = NameResolver::new(reference, ["Outer", "Inner"]);
    assert_eq!(
        resolver.resolve(&scope, &mut table, &mut errs),
        ResolveResult::Resolved
    );
    assert_eq!(resolver.decl(), Some(inner));
    assert_eq!(resolver.base_identity(), Some(&Identity::Decl(outer)));
    assert_eq!(resolver.stage_name(), "Resolved");
}

#[test]
fn test_module_names_resolve_globally() {
    let (scope, reference, app, _, inner) = app_scope();
    let mut table = ResolverTable::new();
    let mut errs = DiagnosticSink::new();

    let mut resolver = NameResolver::new(reference, ["app", "Outer", "Inner"]);
    assert_eq!(
        resolver.resolve(&scope, &mut table, &mut errs),
        ResolveResult::Resolved
    );
    assert_eq!(resolver.decl(), Some(inner));
    assert_eq!(resolver.base_identity(), Some(&Identity::Decl(app)));
}

#[test]
fn test_unresolvable_name_logs_exactly_once() {
    let (scope, reference, ..) = app_scope();
    let mut table = ResolverTable::new();
    let mut errs = DiagnosticSink::new();

    let mut resolver = NameResolver::new(reference, ["Missing", "Thing"]);
    for _ in 0..3 {
        assert_eq!(
            resolver.resolve(&scope, &mut table, &mut errs),
            ResolveResult::Error
        );
    }
    assert_eq!(resolver.force_resolve(&scope, &mut table, &mut errs), None);
    let diags = codes(&errs);
    assert_eq!(diags.len(), 1, "Expected a single diagnostic, got: {diags:?}");
    assert_eq!(diags[0].0, diagnostic_codes::NAME_UNRESOLVABLE);
}

#[test]
fn test_missing_member_is_name_missing() {
    let (scope, reference, ..) = app_scope();
    let mut table = ResolverTable::new();
    let mut errs = DiagnosticSink::new();

    let mut resolver = NameResolver::new(reference, ["Outer", "Nope"]);
    assert_eq!(
        resolver.resolve(&scope, &mut table, &mut errs),
        ResolveResult::Error
    );
    assert_eq!(errs.count_code(diagnostic_codes::NAME_MISSING), 1);
}

#[test]
fn test_method_is_a_dead_end_for_dot_names() {
    let (scope, reference, ..) = app_scope();
    let mut table = ResolverTable::new();
    let mut errs = DiagnosticSink::new();

    let mut resolver = NameResolver::new(reference, ["Outer", "run", "x"]);
    assert_eq!(
        resolver.resolve(&scope, &mut table, &mut errs),
        ResolveResult::Error
    );
    assert_eq!(errs.count_code(diagnostic_codes::NAME_UNRESOLVABLE), 1);
}

#[test]
fn test_unregistered_component_defers_until_ready() {
    let (mut scope, reference, _, outer, inner) = app_scope();
    let inner_node = scope.parent(reference).expect("inner node");
    scope.components.insert(inner_node, Component::Pending);

    let mut table = ResolverTable::new();
    let mut errs = DiagnosticSink::new();
    let mut resolver = NameResolver::new(reference, ["Outer"]);
    assert_eq!(
        resolver.resolve(&scope, &mut table, &mut errs),
        ResolveResult::Deferred
    );
    assert_eq!(resolver.stage_name(), "ResolveFirstName");

    scope.components.insert(inner_node, Component::Ready(inner));
    assert_eq!(
        resolver.resolve(&scope, &mut table, &mut errs),
        ResolveResult::Resolved
    );
    assert_eq!(resolver.decl(), Some(outer));
    assert!(errs.is_empty());
}

#[test]
fn test_pending_contribution_blocks_instead_of_failing() {
    let mut scope = TestScope::default();
    let app = scope.tree.add_module("app");
    let base = scope.class(app, "Base");
    let inherited = scope.class(base, "Inherited");
    let derived = scope.class(app, "Derived");
    let slot = scope.tree.add_contribution(derived).expect("slot");

    let module_node = scope.node(None, Component::Ready(app));
    let derived_node = scope.node(Some(module_node), Component::Ready(derived));
    let reference = scope.node(Some(derived_node), Component::Absent);

    let mut table = ResolverTable::new();
    let mut errs = DiagnosticSink::new();
    let mut resolver = NameResolver::new(reference, ["Inherited"]);
    assert_eq!(
        resolver.resolve(&scope, &mut table, &mut errs),
        ResolveResult::Blocked
    );
    assert!(resolver.last_result().is_some_and(ResolveResult::is_pending));
    assert!(errs.is_empty(), "blocked lookups must not log: {:?}", codes(&errs));

    scope
        .tree
        .set_contribution(derived, slot, Identity::Decl(base))
        .expect("set once");
    assert_eq!(
        resolver.resolve(&scope, &mut table, &mut errs),
        ResolveResult::Resolved
    );
    assert_eq!(resolver.decl(), Some(inherited));
}

#[test]
fn test_ambiguous_name_is_an_error_never_deferred() {
    let mut scope = TestScope::default();
    let app = scope.tree.add_module("app");
    scope.class(app, "Twin");
    scope.class(app, "Twin");
    let module_node = scope.node(None, Component::Ready(app));
    let reference = scope.node(Some(module_node), Component::Absent);

    let mut table = ResolverTable::new();
    let mut errs = DiagnosticSink::new();
    let mut resolver = NameResolver::new(reference, ["Twin"]);
    assert_eq!(
        resolver.resolve(&scope, &mut table, &mut errs),
        ResolveResult::Error
    );
    assert_eq!(errs.count_code(diagnostic_codes::NAME_AMBIGUOUS), 1);
}

#[test]
fn test_access_becomes_public_outside_outermost_class() {
    let mut scope = TestScope::default();
    let app = scope.tree.add_module("app");
    scope
        .tree
        .add_child(app, "Hidden", DeclKind::Class, Access::Private)
        .expect("class registers");
    let outer = scope.class(app, "Outer");
    let secret = scope
        .tree
        .add_child(outer, "Secret", DeclKind::Class, Access::Private)
        .expect("class registers");
    let inner = scope.class(outer, "Inner");

    let module_node = scope.node(None, Component::Ready(app));
    let outer_node = scope.node(Some(module_node), Component::Ready(outer));
    let inner_node = scope.node(Some(outer_node), Component::Ready(inner));
    let reference = scope.node(Some(inner_node), Component::Absent);

    let mut table = ResolverTable::new();
    let mut errs = DiagnosticSink::new();

    let mut visible = NameResolver::new(reference, ["Secret"]);
    assert_eq!(
        visible.resolve(&scope, &mut table, &mut errs),
        ResolveResult::Resolved
    );
    assert_eq!(visible.decl(), Some(secret));

    let mut hidden = NameResolver::new(reference, ["Hidden"]);
    assert_eq!(
        hidden.resolve(&scope, &mut table, &mut errs),
        ResolveResult::Error
    );
    assert_eq!(errs.count_code(diagnostic_codes::NAME_UNRESOLVABLE), 1);
}

#[test]
fn test_implicit_names_are_the_last_resort() {
    let (mut scope, reference, ..) = app_scope();
    let core = scope.tree.add_module("core");
    let int = scope.class(core, "Int");
    scope.tree.register_implicit("Int", int);

    let mut table = ResolverTable::new();
    let mut errs = DiagnosticSink::new();
    let mut resolver = NameResolver::new(reference, ["Int"]);
    assert_eq!(
        resolver.resolve(&scope, &mut table, &mut errs),
        ResolveResult::Resolved
    );
    assert_eq!(resolver.decl(), Some(int));
}

#[test]
fn test_import_alias_defers_until_target_settles() {
    let mut scope = TestScope::default();
    let lib = scope.tree.add_module("lib");
    let util = scope
        .tree
        .add_child(lib, "Util", DeclKind::Typedef, Access::Public)
        .expect("typedef registers");
    let impl_class = scope.class(lib, "UtilImpl");
    let helper = scope.class(impl_class, "Helper");
    let app = scope.tree.add_module("app");

    let app_node = scope.node(None, Component::Ready(app));
    let import = scope.import(app_node, "U");
    let reference = scope.node(Some(app_node), Component::Absent);

    let mut table = ResolverTable::new();
    let mut errs = DiagnosticSink::new();
    table.ensure(NameResolver::new(import, ["lib", "Util"]));
    table.ensure(NameResolver::new(reference, ["U", "Helper"]));

    assert_eq!(
        table.resolve(reference, &scope, &mut errs),
        ResolveResult::Deferred
    );
    assert_eq!(
        table.get(import).map(NameResolver::stage_name),
        Some("ResolveTurtles")
    );

    scope
        .tree
        .set_target(util, Identity::Decl(impl_class))
        .expect("target set once");
    assert_eq!(
        table.resolve(reference, &scope, &mut errs),
        ResolveResult::Resolved
    );
    assert_eq!(table.get(reference).and_then(NameResolver::decl), Some(helper));
    assert!(errs.is_empty(), "got: {:?}", codes(&errs));
}

#[test]
fn test_import_without_resolver_defers() {
    let mut scope = TestScope::default();
    let app = scope.tree.add_module("app");
    let app_node = scope.node(None, Component::Ready(app));
    let import = scope.import(app_node, "X");
    let reference = scope.node(Some(app_node), Component::Absent);

    let mut table = ResolverTable::new();
    let mut errs = DiagnosticSink::new();
    table.ensure(NameResolver::new(reference, ["X"]));
    assert_eq!(
        table.resolve(reference, &scope, &mut errs),
        ResolveResult::Deferred
    );

    assert!(!table.contains(import));
    assert_eq!(
        table.force_resolve(reference, &scope, &mut errs),
        None
    );
    assert_eq!(errs.count_code(diagnostic_codes::NAME_UNRESOLVABLE), 1);
    assert!(table.get(reference).is_some_and(NameResolver::is_error));
}

/// `Map<Key extends Hashable>` where `Hashable` declares a formal `Hash` and
/// a typedef `Alias`.
fn formal_scope() -> (TestScope, NodeId, DeclId, DeclId) {
    let mut scope = TestScope::default();
    let app = scope.tree.add_module("app");
    let hashable = scope.class(app, "Hashable");
    let hash = scope
        .tree
        .add_child(hashable, "Hash", DeclKind::Property, Access::Public)
        .expect("property registers");
    scope.tree.set_formal(hash).expect("formal");
    scope
        .tree
        .add_child(hashable, "Alias", DeclKind::Typedef, Access::Public)
        .expect("typedef registers");
    let map = scope.class(app, "Map");
    let key = scope
        .tree
        .add_child(map, "Key", DeclKind::Property, Access::Public)
        .expect("property registers");
    scope.tree.set_formal(key).expect("formal");

    let module_node = scope.node(None, Component::Ready(app));
    let reference = scope.node(Some(module_node), Component::Absent);
    (scope, reference, hashable, key)
}

#[test]
fn test_formal_dot_name_waits_for_bound() {
    let (mut scope, reference, hashable, key) = formal_scope();
    let mut table = ResolverTable::new();
    let mut errs = DiagnosticSink::new();

    let mut resolver = NameResolver::new(reference, ["Map", "Key", "Hash"]);
    assert_eq!(
        resolver.resolve(&scope, &mut table, &mut errs),
        ResolveResult::Blocked
    );
    let marker = resolver.progress_marker();
    assert_eq!(marker.1, 2, "Map and Key must stay resolved across suspension");

    scope
        .tree
        .set_bound(key, Identity::Decl(hashable))
        .expect("bound set once");
    assert_eq!(
        resolver.resolve(&scope, &mut table, &mut errs),
        ResolveResult::Resolved
    );
    assert_eq!(resolver.type_mode(), TypeMode::Value);
}

#[test]
fn test_type_goal_produces_formal_child_identity() {
    let (mut scope, reference, hashable, key) = formal_scope();
    scope
        .tree
        .set_bound(key, Identity::Decl(hashable))
        .expect("bound set once");
    let mut table = ResolverTable::new();
    let mut errs = DiagnosticSink::new();

    let mut resolver = NameResolver::for_type(reference, ["Map", "Key", "Hash"]);
    assert_eq!(
        resolver.resolve(&scope, &mut table, &mut errs),
        ResolveResult::Resolved
    );
    assert_eq!(resolver.type_mode(), TypeMode::FormalType);
    assert_eq!(
        resolver.identity(),
        Some(&Identity::FormalChild {
            formal: key,
            name: "Hash".to_string()
        })
    );
}

#[test]
fn test_typedef_inside_formal_type_is_rejected() {
    let (mut scope, reference, hashable, key) = formal_scope();
    scope
        .tree
        .set_bound(key, Identity::Decl(hashable))
        .expect("bound set once");
    let mut table = ResolverTable::new();
    let mut errs = DiagnosticSink::new();

    let mut resolver = NameResolver::for_type(reference, ["Map", "Key", "Alias"]);
    assert_eq!(
        resolver.resolve(&scope, &mut table, &mut errs),
        ResolveResult::Error
    );
    assert_eq!(errs.count_code(diagnostic_codes::TYPEDEF_UNEXPECTED), 1);
}

#[test]
fn test_typedef_identity_waits_in_turtles() {
    let mut scope = TestScope::default();
    let app = scope.tree.add_module("app");
    let p = scope
        .tree
        .add_child(app, "P", DeclKind::Typedef, Access::Public)
        .expect("typedef registers");
    let q = scope
        .tree
        .add_child(app, "Q", DeclKind::Typedef, Access::Public)
        .expect("typedef registers");
    let concrete = scope.class(app, "Concrete");
    let module_node = scope.node(None, Component::Ready(app));
    let reference = scope.node(Some(module_node), Component::Absent);

    let mut table = ResolverTable::new();
    let mut errs = DiagnosticSink::new();
    let mut resolver = NameResolver::for_type(reference, ["P"]);
    assert_eq!(
        resolver.resolve(&scope, &mut table, &mut errs),
        ResolveResult::Deferred
    );
    assert_eq!(resolver.stage_name(), "ResolveTurtles");

    scope.tree.set_target(p, Identity::Decl(q)).expect("p");
    assert_eq!(
        resolver.resolve(&scope, &mut table, &mut errs),
        ResolveResult::Deferred
    );
    scope.tree.set_target(q, Identity::Decl(concrete)).expect("q");
    assert_eq!(
        resolver.resolve(&scope, &mut table, &mut errs),
        ResolveResult::Resolved
    );
    assert_eq!(resolver.identity(), Some(&Identity::Decl(p)));
    assert_eq!(resolver.type_mode(), TypeMode::Type);
}

#[test]
fn test_cyclic_enclosure_chain_is_an_internal_error() {
    let mut scope = TestScope::default();
    let a = scope.node(None, Component::Absent);
    let b = scope.node(Some(a), Component::Absent);
    scope.parents.insert(a, b);

    let mut table = ResolverTable::new();
    let mut errs = DiagnosticSink::new();
    let mut resolver = NameResolver::new(b, ["Anything"]);
    assert_eq!(
        resolver.resolve(&scope, &mut table, &mut errs),
        ResolveResult::Error
    );
    let diags = codes(&errs);
    assert_eq!(diags.len(), 1, "Expected a single diagnostic, got: {diags:?}");
    assert_eq!(diags[0].0, diagnostic_codes::INTERNAL_ERROR);
}
