//! Type-keyed service registry.
//!
//! Values are stored under the [`TypeId`] of the type a handler will ask for.
//! A registry may have a parent; lookups that miss locally continue there, so
//! a per-run child sees every global binding while its own bindings stay
//! private to the run.
//!
//! ```text
//! Ware::registry()  ── parent ──┐
//!                               │
//!   Context #1 registry ────────┤   (bindings made during run #1)
//!   Context #2 registry ────────┘   (bindings made during run #2)
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Error;

type Binding = Arc<dyn Any + Send + Sync>;

/// A mapping from type to bound value, with an optional parent to fall back on.
#[derive(Default)]
pub struct Registry {
    bindings: RwLock<HashMap<TypeId, Binding>>,
    parent: Option<Arc<Registry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A child registry that resolves through `parent` when a type is not
    /// bound locally.
    pub fn with_parent(parent: Arc<Registry>) -> Self {
        Self { bindings: RwLock::default(), parent: Some(parent) }
    }

    pub fn set_parent(&mut self, parent: Arc<Registry>) {
        self.parent = Some(parent);
    }

    pub fn parent(&self) -> Option<&Arc<Registry>> {
        self.parent.as_ref()
    }

    /// Binds `value` under its own type, replacing any previous binding of
    /// that type in this registry. Parent bindings are shadowed, not touched.
    pub fn bind<T>(&self, value: T)
    where
        T: Clone + Send + Sync + 'static,
    {
        self.insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Binds `value` under an explicitly chosen type, usually a trait object.
    /// Handlers receive it by asking for `Arc<I>`.
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use ware::Registry;
    ///
    /// trait Greeter: Send + Sync { fn greet(&self) -> &'static str; }
    /// struct English;
    /// impl Greeter for English { fn greet(&self) -> &'static str { "hello" } }
    ///
    /// let registry = Registry::new();
    /// registry.bind_as::<dyn Greeter>(Arc::new(English));
    /// let greeter = registry.resolve::<Arc<dyn Greeter>>().unwrap();
    /// assert_eq!(greeter.greet(), "hello");
    /// ```
    pub fn bind_as<I>(&self, value: Arc<I>)
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.insert(TypeId::of::<Arc<I>>(), Arc::new(value));
    }

    /// Resolves `T` here or in the nearest ancestor that binds it.
    pub fn resolve<T>(&self) -> Result<T, Error>
    where
        T: Clone + 'static,
    {
        self.get::<T>().ok_or_else(Error::missing::<T>)
    }

    pub fn get<T>(&self) -> Option<T>
    where
        T: Clone + 'static,
    {
        let local = self.bindings.read().get(&TypeId::of::<T>()).cloned();
        match local {
            Some(binding) => binding.downcast_ref::<T>().cloned(),
            None => self.parent.as_ref()?.get::<T>(),
        }
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.bindings.read().contains_key(&TypeId::of::<T>())
            || self.parent.as_ref().is_some_and(|p| p.contains::<T>())
    }

    fn insert(&self, key: TypeId, value: Binding) {
        self.bindings.write().insert(key, value);
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("bindings", &self.bindings.read().len())
            .field("parent", &self.parent)
            .finish()
    }
}
