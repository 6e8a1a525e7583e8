//! Implicitly available names.
//!
//! Names in this table resolve anywhere, after the enclosing declarations and
//! the imports have all failed to match. Each entry maps a simple name to a
//! dotted path that is bound against the declaration tree once the program's
//! structure has been registered (see [`crate::DeclTree::bind_implicits`]).

use indexmap::IndexMap;
use once_cell::sync::Lazy;

/// Name-to-path table of implicit imports.
#[derive(Clone, Debug, Default)]
pub struct ImplicitNames {
    entries: IndexMap<String, String>,
}

impl ImplicitNames {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, path: &str) {
        self.entries.insert(name.to_string(), path.to_string());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The implicit names every program sees, rooted in the `core` module.
pub static DEFAULT_IMPLICITS: Lazy<ImplicitNames> = Lazy::new(|| {
    let mut names = ImplicitNames::new();
    for name in [
        "Object", "Type", "Boolean", "Int", "String", "Char", "Nullable", "Exception",
    ] {
        names.insert(name, &format!("core.{name}"));
    }
    names.insert("Null", "core.Nullable.Null");
    names.insert("True", "core.Boolean.True");
    names.insert("False", "core.Boolean.False");
    names
});
