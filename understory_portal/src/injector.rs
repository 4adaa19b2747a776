// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Type-keyed provider lookup with parent fallback.

use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;

use hashbrown::HashMap;

/// A provider scope handed to components and templates when they are created.
///
/// Lookups walk from this scope to its parents and return the first match.
/// Cloning is cheap; scopes are immutable once built.
///
/// ```
/// use understory_portal::Injector;
///
/// #[derive(Debug, PartialEq)]
/// struct Theme(&'static str);
///
/// let root = Injector::builder().provide(Theme("dark")).build();
/// let child = Injector::builder().parent(&root).provide(42_u32).build();
///
/// assert_eq!(*child.get::<u32>().unwrap(), 42);
/// assert_eq!(*child.get::<Theme>().unwrap(), Theme("dark"));
/// assert!(root.get::<u32>().is_none());
/// ```
#[derive(Clone, Default)]
pub struct Injector {
    scope: Option<Rc<Scope>>,
}

struct Scope {
    providers: HashMap<TypeId, Rc<dyn Any>>,
    parent: Option<Injector>,
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut depth = 0;
        let mut current = self.scope.as_ref();
        while let Some(scope) = current {
            depth += 1;
            current = scope.parent.as_ref().and_then(|p| p.scope.as_ref());
        }
        f.debug_struct("Injector").field("depth", &depth).finish()
    }
}

impl Injector {
    /// An injector that provides nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start building a scope.
    pub fn builder() -> InjectorBuilder {
        InjectorBuilder {
            providers: HashMap::new(),
            parent: None,
        }
    }

    /// Look up a provided value of type `T`.
    pub fn get<T: 'static>(&self) -> Option<Rc<T>> {
        let mut current = self.scope.as_ref();
        while let Some(scope) = current {
            if let Some(value) = scope.providers.get(&TypeId::of::<T>()) {
                return Rc::clone(value).downcast::<T>().ok();
            }
            current = scope.parent.as_ref().and_then(|p| p.scope.as_ref());
        }
        None
    }

    /// Returns true if this scope and all its parents are empty.
    pub fn is_empty(&self) -> bool {
        self.scope.is_none()
    }
}

/// Builder for [`Injector`].
#[derive(Debug)]
pub struct InjectorBuilder {
    providers: HashMap<TypeId, Rc<dyn Any>>,
    parent: Option<Injector>,
}

impl InjectorBuilder {
    /// Provide `value`, replacing any earlier value of the same type in this scope.
    pub fn provide<T: 'static>(mut self, value: T) -> Self {
        self.providers.insert(TypeId::of::<T>(), Rc::new(value));
        self
    }

    /// Fall back to `parent` for types this scope does not provide.
    pub fn parent(mut self, parent: &Injector) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Finish the scope.
    pub fn build(self) -> Injector {
        if self.providers.is_empty() {
            return self.parent.unwrap_or_default();
        }
        Injector {
            scope: Some(Rc::new(Scope {
                providers: self.providers,
                parent: self.parent,
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_shadows_parent() {
        let root = Injector::builder().provide("root").build();
        let child = Injector::builder().parent(&root).provide("child").build();
        assert_eq!(*child.get::<&str>().unwrap(), "child");
        assert_eq!(*root.get::<&str>().unwrap(), "root");
    }

    #[test]
    fn empty_builder_collapses_to_parent() {
        let root = Injector::builder().provide(1_i64).build();
        let same = Injector::builder().parent(&root).build();
        assert_eq!(*same.get::<i64>().unwrap(), 1);
        assert!(Injector::builder().build().is_empty());
    }
}
