use crate::ast::Type;
use crate::memory::Base;
use crate::RC;
use std::collections::BTreeMap;

/// Where a variable lives, and its declared type.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Binding {
    base: Base,
    type_: Type,
}

impl Binding {
    pub fn new(base: Base, type_: Type) -> Binding {
        Binding { base, type_ }
    }

    pub fn base(&self) -> Base {
        self.base
    }

    pub fn type_(&self) -> &Type {
        &self.type_
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
struct Scope {
    bindings: BTreeMap<String, Binding>,
    parent: Option<RC<Scope>>,
}

/// A chain of lexical scopes, innermost first.
///
/// The outermost scope holds globals. Every call starts a function scope
/// directly under the global scope, so callees never see their callers'
/// locals.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Environment {
    scope: RC<Scope>,
    depth: usize,
}

impl Default for Environment {
    fn default() -> Environment {
        Environment::new()
    }
}

impl Environment {
    /// An environment holding only the (empty) global scope.
    pub fn new() -> Environment {
        Environment {
            scope: RC::new(Scope {
                bindings: BTreeMap::new(),
                parent: None,
            }),
            depth: 0,
        }
    }

    /// Open a new innermost scope.
    pub fn push(&self) -> Environment {
        Environment {
            scope: RC::new(Scope {
                bindings: BTreeMap::new(),
                parent: Some(self.scope.clone()),
            }),
            depth: self.depth + 1,
        }
    }

    /// Number of scopes above the global scope.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Bind `name` in the innermost scope.
    pub fn bind<S: Into<String>>(&mut self, name: S, binding: Binding) {
        RC::make_mut(&mut self.scope)
            .bindings
            .insert(name.into(), binding);
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        let mut scope = Some(&self.scope);
        while let Some(current) = scope {
            if let Some(binding) = current.bindings.get(name) {
                return Some(binding);
            }
            scope = current.parent.as_ref();
        }
        None
    }

    fn ancestor(&self, depth: usize) -> Environment {
        let mut environment = self.clone();
        while environment.depth > depth {
            let parent = match environment.scope.parent.as_ref() {
                Some(parent) => parent.clone(),
                None => break,
            };
            environment = Environment {
                scope: parent,
                depth: environment.depth - 1,
            };
        }
        environment
    }

    /// A fresh function scope for a callee.
    pub fn enter_function(&self) -> Environment {
        self.ancestor(0).push()
    }

    /// The scope of the current function's parameters.
    pub fn function_scope(&self) -> Environment {
        self.ancestor(1)
    }

    /// The bases bound in scopes which are inside `outer`.
    pub fn bases_since(&self, outer: &Environment) -> Vec<Base> {
        let mut bases = Vec::new();
        let mut scope = Some(&self.scope);
        let mut depth = self.depth;
        while let Some(current) = scope {
            if depth <= outer.depth {
                break;
            }
            bases.extend(current.bindings.values().map(|binding| binding.base));
            scope = current.parent.as_ref();
            depth -= 1;
        }
        bases
    }

    /// Every visible binding, innermost shadowing outermost.
    pub fn bindings(&self) -> BTreeMap<&str, &Binding> {
        let mut bindings = BTreeMap::new();
        let mut scope = Some(&self.scope);
        while let Some(current) = scope {
            for (name, binding) in &current.bindings {
                bindings.entry(name.as_str()).or_insert(binding);
            }
            scope = current.parent.as_ref();
        }
        bindings
    }
}
