// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Runtime capability sets.
//!
//! A capability is a trait object type (`dyn Sink`, `dyn Handler`, ...) that a
//! registered type declares it can be viewed as. The set is consulted exactly once
//! per reference resolution: when a configured object is attached to an
//! interface-typed field, or handed to an interface-typed function parameter.

use crate::Rc;

use core::any::{type_name, Any, TypeId};
use core::fmt;
use std::collections::HashMap;

/// Type-erased shared object as stored by the scope.
pub type AnyObject = Rc<dyn Any + Send + Sync>;

type Caster = Rc<dyn Fn(AnyObject) -> Option<Box<dyn Any>> + Send + Sync>;

#[derive(Clone)]
struct Capability {
    name: &'static str,
    cast: Caster,
}

/// Set of trait object types a registered type can be viewed as.
#[derive(Clone, Default)]
pub struct CapabilitySet {
    entries: Rc<HashMap<TypeId, Capability>>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares that objects of type `T` can be viewed as `I`.
    ///
    /// `coerce` is almost always the identity closure `|it| it`; the unsizing
    /// coercion from `Rc<T>` to `Rc<I>` is checked by the compiler.
    pub fn provide<T, I>(&mut self, coerce: fn(Rc<T>) -> Rc<I>)
    where
        T: Any + Send + Sync,
        I: ?Sized + 'static,
    {
        let cast: Caster = Rc::new(move |object: AnyObject| {
            object
                .downcast::<T>()
                .ok()
                .map(|typed| Box::new(coerce(typed)) as Box<dyn Any>)
        });
        Rc::make_mut(&mut self.entries).insert(
            TypeId::of::<I>(),
            Capability {
                name: type_name::<I>(),
                cast,
            },
        );
    }

    /// Builder form of [`CapabilitySet::provide`].
    pub fn with<T, I>(mut self, coerce: fn(Rc<T>) -> Rc<I>) -> Self
    where
        T: Any + Send + Sync,
        I: ?Sized + 'static,
    {
        self.provide(coerce);
        self
    }

    pub fn implements<I: ?Sized + 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<I>())
    }

    /// Views `object` as `I`. Returns `None` when `I` is not part of the set or
    /// `object` is not of the type the set was declared for.
    pub fn cast<I: ?Sized + 'static>(&self, object: &AnyObject) -> Option<Rc<I>> {
        let capability = self.entries.get(&TypeId::of::<I>())?;
        (capability.cast)(Rc::clone(object))
            .and_then(|boxed| boxed.downcast::<Rc<I>>().ok())
            .map(|typed| *typed)
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.values().map(|c| c.name).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

/// An interface-typed slot: empty until a configured object providing `I` is
/// attached to it.
pub struct Dyn<I: ?Sized>(Option<Rc<I>>);

impl<I: ?Sized> Dyn<I> {
    pub fn new(object: Rc<I>) -> Self {
        Dyn(Some(object))
    }

    pub fn empty() -> Self {
        Dyn(None)
    }

    pub fn get(&self) -> Option<&Rc<I>> {
        self.0.as_ref()
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    pub fn set(&mut self, object: Option<Rc<I>>) {
        self.0 = object;
    }

    pub fn into_inner(self) -> Option<Rc<I>> {
        self.0
    }
}

impl<I: ?Sized> Default for Dyn<I> {
    fn default() -> Self {
        Dyn(None)
    }
}

impl<I: ?Sized> Clone for Dyn<I> {
    fn clone(&self) -> Self {
        Dyn(self.0.clone())
    }
}

impl<I: ?Sized> fmt::Debug for Dyn<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(_) => write!(f, "Dyn<{}>(set)", type_name::<I>()),
            None => write!(f, "Dyn<{}>(empty)", type_name::<I>()),
        }
    }
}

impl<I: ?Sized> From<Rc<I>> for Dyn<I> {
    fn from(object: Rc<I>) -> Self {
        Dyn(Some(object))
    }
}
