//! Hierarchical variable store.
//!
//! Lookups walk from a scope up through its ancestors. Child scopes are
//! owned by their parent until deleted or dropped with `drop_kids`; the
//! parent link is weak so dropping a root releases the whole tree.
mod variable;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use uuid::Uuid;

pub use variable::{initialize_variable, VarValue, Variable};

#[derive(Debug)]
pub struct Scope {
    id: Uuid,
    vars: Mutex<HashMap<String, Variable>>,
    parent: Option<Weak<Scope>>,
    kids: Mutex<Vec<Arc<Scope>>>,
}

impl Scope {
    /// Create a root scope.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::with_parent(None))
    }

    fn with_parent(parent: Option<Weak<Scope>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            vars: Mutex::new(HashMap::new()),
            parent,
            kids: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Create a child scope owned by this one.
    pub fn new_scope(self: &Arc<Self>) -> Arc<Scope> {
        let kid = Arc::new(Self::with_parent(Some(Arc::downgrade(self))));
        self.lock_kids().push(Arc::clone(&kid));
        kid
    }

    /// Remove one child scope.
    pub fn delete_scope(&self, kid: &Arc<Scope>) {
        self.lock_kids().retain(|existing| !Arc::ptr_eq(existing, kid));
    }

    pub fn drop_kids(&self) {
        self.lock_kids().clear();
    }

    pub fn kid_count(&self) -> usize {
        self.lock_kids().len()
    }

    pub fn parent(&self) -> Option<Arc<Scope>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Walk parent links up to the ancestor without a parent.
    pub fn root(self: &Arc<Self>) -> Arc<Scope> {
        let mut current = Arc::clone(self);
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// Find a variable in this scope only, or create it there.
    pub fn var(&self, name: &str) -> Variable {
        self.lock_vars()
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Create a fresh variable in this scope, replacing any local one.
    pub fn new_var(&self, name: &str) -> Variable {
        let var = Variable::new();
        self.lock_vars().insert(name.to_string(), var.clone());
        var
    }

    /// Find a variable in this scope or any ancestor.
    pub fn find_var(&self, name: &str) -> Option<Variable> {
        if let Some(var) = self.find_local_var(name) {
            return Some(var);
        }
        self.parent().and_then(|parent| parent.find_var(name))
    }

    pub fn find_local_var(&self, name: &str) -> Option<Variable> {
        self.lock_vars().get(name).cloned()
    }

    pub fn has_local_var(&self, name: &str) -> bool {
        self.lock_vars().contains_key(name)
    }

    /// Names of variables held directly by this scope, sorted.
    pub fn local_var_names(&self) -> Vec<String> {
        let mut names = self.lock_vars().keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    pub fn erase_vars(&self, names: &[String]) {
        let mut vars = self.lock_vars();
        for name in names {
            vars.remove(name);
        }
    }

    fn lock_vars(&self) -> MutexGuard<'_, HashMap<String, Variable>> {
        self.vars.lock().expect("scope vars lock poisoned")
    }

    fn lock_kids(&self) -> MutexGuard<'_, Vec<Arc<Scope>>> {
        self.kids.lock().expect("scope kids lock poisoned")
    }
}
