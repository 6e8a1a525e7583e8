use quill_decl::{
    Access, ChainEnd, DEFAULT_IMPLICITS, DeclError, DeclId, DeclKind, DeclTree, Identity,
    Resolution, ResolutionCollector,
};

#[derive(Default)]
struct Recorder {
    found: Option<DeclId>,
    ambiguous: Vec<DeclId>,
}

impl ResolutionCollector for Recorder {
    fn resolved_decl(&mut self, _tree: &DeclTree, decl: DeclId) -> Resolution {
        self.found = Some(decl);
        Resolution::Resolved
    }

    fn ambiguous(&mut self, _tree: &DeclTree, _name: &str, candidates: &[DeclId]) -> Resolution {
        self.ambiguous = candidates.to_vec();
        Resolution::Error
    }
}

fn lookup(tree: &DeclTree, id: DeclId, name: &str, access: Access) -> (Resolution, Recorder) {
    let mut recorder = Recorder::default();
    let result = tree.resolve_name(id, name, access, &mut recorder);
    (result, recorder)
}

fn class(tree: &mut DeclTree, parent: DeclId, name: &str) -> DeclId {
    tree.add_child(parent, name, DeclKind::Class, Access::Public)
        .expect("class registers")
}

#[test]
fn test_resolve_own_child() {
    let mut tree = DeclTree::new();
    let app = tree.add_module("app");
    let point = class(&mut tree, app, "Point");

    let (result, rec) = lookup(&tree, app, "Point", Access::Private);
    assert_eq!(result, Resolution::Resolved);
    assert_eq!(rec.found, Some(point));
    assert_eq!(tree.qualified_name(point), "app.Point");
}

#[test]
fn test_private_member_hidden_from_public_lookup() {
    let mut tree = DeclTree::new();
    let app = tree.add_module("app");
    let outer = class(&mut tree, app, "Outer");
    tree.add_child(outer, "secret", DeclKind::Property, Access::Private)
        .expect("property registers");

    assert_eq!(lookup(&tree, outer, "secret", Access::Public).0, Resolution::Unknown);
    assert_eq!(lookup(&tree, outer, "secret", Access::Private).0, Resolution::Resolved);
}

#[test]
fn test_duplicate_names_are_ambiguous() {
    let mut tree = DeclTree::new();
    let app = tree.add_module("app");
    let first = class(&mut tree, app, "Dup");
    let second = class(&mut tree, app, "Dup");

    let (result, rec) = lookup(&tree, app, "Dup", Access::Public);
    assert_eq!(result, Resolution::Error);
    assert_eq!(rec.ambiguous, vec![first, second]);
}

#[test]
fn test_pending_contribution_answers_possible() {
    let mut tree = DeclTree::new();
    let app = tree.add_module("app");
    let base = class(&mut tree, app, "Base");
    let inherited = class(&mut tree, base, "Inherited");
    let derived = class(&mut tree, app, "Derived");
    let slot = tree.add_contribution(derived).expect("slot");

    assert_eq!(lookup(&tree, derived, "Inherited", Access::Private).0, Resolution::Possible);
    assert_eq!(lookup(&tree, derived, "Nope", Access::Private).0, Resolution::Possible);

    tree.set_contribution(derived, slot, Identity::Decl(base)).expect("set once");
    let (result, rec) = lookup(&tree, derived, "Inherited", Access::Private);
    assert_eq!(result, Resolution::Resolved);
    assert_eq!(rec.found, Some(inherited));
    assert_eq!(lookup(&tree, derived, "Nope", Access::Private).0, Resolution::Unknown);
}

#[test]
fn test_private_members_of_contributions_are_not_inherited() {
    let mut tree = DeclTree::new();
    let app = tree.add_module("app");
    let base = class(&mut tree, app, "Base");
    tree.add_child(base, "hidden", DeclKind::Property, Access::Private)
        .expect("property registers");
    let derived = class(&mut tree, app, "Derived");
    let slot = tree.add_contribution(derived).expect("slot");
    tree.set_contribution(derived, slot, Identity::Decl(base)).expect("set once");

    assert_eq!(lookup(&tree, derived, "hidden", Access::Private).0, Resolution::Unknown);
}

#[test]
fn test_pending_facts_are_set_once() {
    let mut tree = DeclTree::new();
    let app = tree.add_module("app");
    let a = class(&mut tree, app, "A");
    let b = class(&mut tree, app, "B");
    let alias = tree.add_child(app, "Alias", DeclKind::Typedef, Access::Public).expect("typedef");

    assert!(!tree.is_settled(&Identity::Decl(alias)));
    tree.set_target(alias, Identity::Decl(a)).expect("first set");
    tree.set_target(alias, Identity::Decl(a)).expect("same value is idempotent");
    assert!(matches!(
        tree.set_target(alias, Identity::Decl(b)),
        Err(DeclError::AlreadyResolved { .. })
    ));
    assert!(tree.is_settled(&Identity::Decl(alias)));
    assert_eq!(tree.follow_typedefs(&Identity::Decl(alias)), ChainEnd::Decl(a));
}

#[test]
fn test_typedef_cycle_is_never_settled() {
    let mut tree = DeclTree::new();
    let app = tree.add_module("app");
    let p = tree.add_child(app, "P", DeclKind::Typedef, Access::Public).expect("typedef");
    let q = tree.add_child(app, "Q", DeclKind::Typedef, Access::Public).expect("typedef");
    tree.set_target(p, Identity::Decl(q)).expect("p");
    tree.set_target(q, Identity::Decl(p)).expect("q");

    assert_eq!(tree.follow_typedefs(&Identity::Decl(p)), ChainEnd::Cyclic);
    assert!(!tree.is_settled(&Identity::Decl(p)));
}

#[test]
fn test_follow_bounds_through_formal_chain() {
    let mut tree = DeclTree::new();
    let app = tree.add_module("app");
    let number = class(&mut tree, app, "Number");
    let list = class(&mut tree, app, "List");
    let element = tree
        .add_child(list, "Element", DeclKind::Property, Access::Public)
        .expect("property");
    tree.set_formal(element).expect("formal");
    let other = tree
        .add_child(list, "Other", DeclKind::TypeParameter, Access::Public)
        .expect("type parameter");

    assert_eq!(tree.follow_bounds(element), ChainEnd::Pending);
    tree.set_bound(element, Identity::Decl(other)).expect("bound");
    assert_eq!(tree.follow_bounds(element), ChainEnd::Pending);
    tree.set_bound(other, Identity::Decl(number)).expect("bound");
    assert_eq!(tree.follow_bounds(element), ChainEnd::Decl(number));
}

#[test]
fn test_outermost_class_skips_nested_classes() {
    let mut tree = DeclTree::new();
    let app = tree.add_module("app");
    let outer = class(&mut tree, app, "Outer");
    let inner = class(&mut tree, outer, "Inner");
    let method = tree
        .add_child(inner, "run", DeclKind::Method, Access::Public)
        .expect("method");

    assert_eq!(tree.outermost_class(method), outer);
    assert_eq!(tree.outermost_class(inner), outer);
    assert_eq!(tree.outermost_class(app), app);
}

#[test]
fn test_bind_default_implicits() {
    let mut tree = DeclTree::new();
    let core = tree.add_module("core");
    let int = class(&mut tree, core, "Int");
    let object = class(&mut tree, core, "Object");

    assert_eq!(tree.bind_implicits(&DEFAULT_IMPLICITS), 2);
    assert_eq!(tree.implicit("Int"), Some(int));
    assert_eq!(tree.implicit("Object"), Some(object));
    assert_eq!(tree.implicit("String"), None);
    assert_eq!(tree.find_path("core.Int"), Some(int));
}
