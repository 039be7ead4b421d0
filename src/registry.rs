// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(missing_debug_implementations)] // registry internals are not debug logged
use crate::Rc;
use core::fmt;
use dashmap::DashMap;

type String = Rc<str>;


/// Errors that can occur when interacting with a Registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    InvalidName { name: String, registry: String },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::InvalidName { name, registry } => {
                write!(f, "{registry} registration failed: The name '{name}' is invalid (empty or whitespace-only names are not allowed).")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Validates that a name is not empty or whitespace-only.
pub fn validate_name(name: &str, registry_name: &str) -> Result<(), RegistryError> {
    if name.trim().is_empty() {
        Err(RegistryError::InvalidName {
            name: String::from(name),
            registry: String::from(registry_name),
        })
    } else {
        Ok(())
    }
}

/// Generic thread-safe registry for items of type T using DashMap.
///
/// A scope keeps one registry per namespace (types, functions, objects).
pub struct Registry<T: ?Sized> {
    inner: DashMap<String, Rc<T>>,
    name: String,
}

impl<T: ?Sized> Registry<T> {
    /// Create a new, empty registry with a given name.
    pub fn new(registry_name: impl Into<String>) -> Self {
        Self {
            inner: DashMap::new(),
            name: registry_name.into(),
        }
    }

    /// Register an item, replacing any item previously registered under the same
    /// name. Returns the replaced item.
    pub fn insert(
        &self,
        name: impl Into<String>,
        item: Rc<T>,
    ) -> Result<Option<Rc<T>>, RegistryError> {
        let name = name.into();
        validate_name(&name, &self.name)?;
        Ok(self.inner.insert(name, item))
    }

    /// Retrieve an item by name, if it exists.
    pub fn get(&self, name: &str) -> Option<Rc<T>> {
        self.inner.get(name).map(|entry| Rc::clone(entry.value()))
    }

    /// Remove an item by name. Returns the removed item if it existed.
    pub fn remove(&self, name: &str) -> Option<Rc<T>> {
        self.inner.remove(name).map(|(_, v)| v)
    }

    /// List all registered item names.
    pub fn list_names(&self) -> Vec<String> {
        self.inner.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Finds the first item matching `predicate`.
    pub fn find(&self, predicate: impl Fn(&T) -> bool) -> Option<Rc<T>> {
        self.inner
            .iter()
            .find(|entry| predicate(&**entry.value()))
            .map(|entry| Rc::clone(entry.value()))
    }
}
