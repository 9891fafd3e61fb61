use std::{cell::RefCell, fmt::Debug, rc::Rc};

use rustc_hash::FxHashMap;

use super::object::Object;

pub type ScopeRef = Rc<RefCell<Scope>>;

/// Name bindings of one lexical level. Closures keep their defining scope
/// alive through the `Rc`, and `let` mutates in place, so every closure
/// sharing a scope sees later bindings.
#[derive(Default)]
pub struct Scope {
    bindings: FxHashMap<String, Object>,
    parent: Option<ScopeRef>,
}

impl Scope {
    pub fn boxed(parent: Option<ScopeRef>) -> ScopeRef {
        Rc::new(RefCell::new(Self::new(parent)))
    }

    pub fn new(parent: Option<ScopeRef>) -> Self {
        Self {
            bindings: FxHashMap::default(),
            parent,
        }
    }

    pub fn get(&self, name: &str) -> Option<Object> {
        if let Some(value) = self.bindings.get(name) {
            Some(value.clone())
        } else if let Some(parent) = &self.parent {
            parent.borrow().get(name)
        } else {
            None
        }
    }

    /// Binds in this scope, silently replacing an existing local binding.
    pub fn set(&mut self, name: String, value: Object) {
        self.bindings.insert(name, value);
    }

    /// Local bindings only, sorted by name.
    pub fn bindings(&self) -> Vec<(String, Object)> {
        let mut bindings = self
            .bindings
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect::<Vec<_>>();
        bindings.sort_by(|(a, _), (b, _)| a.cmp(b));
        bindings
    }
}

impl Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Values may hold closures over this very scope, so only print names.
        let mut names = self.bindings.keys().collect::<Vec<_>>();
        names.sort();
        f.debug_struct(format!("Scope<{:?}>", std::ptr::from_ref(self)).as_str())
            .field("bindings", &names)
            .field("parent", &self.parent.as_ref().map(|p| p.as_ptr()))
            .finish()
    }
}
