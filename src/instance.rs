// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::capability::{AnyObject, CapabilitySet};
use crate::record::{layout_of, Record};
use crate::Rc;

use core::any::{Any, TypeId};
use core::fmt;

/// A constructed object as held by a scope.
///
/// Instances are frozen: the underlying value is shared and can only be mutated
/// again while no other handle to it exists (see [`Instance::get_mut`]).
#[derive(Clone)]
pub struct Instance {
    type_name: Rc<str>,
    object: AnyObject,
    capabilities: CapabilitySet,
}

impl Instance {
    /// Wraps an arbitrary value, typically a bootstrap object that is not a record.
    pub fn new<T: Any + Send + Sync>(
        type_name: impl Into<Rc<str>>,
        value: T,
        capabilities: CapabilitySet,
    ) -> Self {
        Self::from_shared(type_name, Rc::new(value), capabilities)
    }

    pub fn from_shared<T: Any + Send + Sync>(
        type_name: impl Into<Rc<str>>,
        value: Rc<T>,
        capabilities: CapabilitySet,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            object: value,
            capabilities,
        }
    }

    /// Wraps a record, using its registered name and declared capabilities.
    pub fn of<R: Record>(record: R) -> Self {
        Self::of_shared(Rc::new(record))
    }

    pub fn of_shared<R: Record>(record: Rc<R>) -> Self {
        let layout = layout_of::<R>();
        Self {
            type_name: layout.type_name().clone(),
            object: record,
            capabilities: layout.capabilities().clone(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Rust type of the wrapped value.
    pub fn type_id(&self) -> TypeId {
        (*self.object).type_id()
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn is<T: Any>(&self) -> bool {
        self.object.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.object.downcast_ref::<T>()
    }

    /// Shared handle to the wrapped value if it is a `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Rc<T>> {
        Rc::clone(&self.object).downcast::<T>().ok()
    }

    /// Views the wrapped value as the capability `I`.
    pub fn cast<I: ?Sized + 'static>(&self) -> Option<Rc<I>> {
        self.capabilities.cast::<I>(&self.object)
    }

    pub fn implements<I: ?Sized + 'static>(&self) -> bool {
        self.capabilities.implements::<I>()
    }

    /// Mutable access to the wrapped value. `None` while the instance is shared.
    pub fn get_mut(&mut self) -> Option<&mut (dyn Any + Send + Sync)> {
        Rc::get_mut(&mut self.object)
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.get_mut()?.downcast_mut::<T>()
    }

    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.object, &other.object)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type_name", &self.type_name)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// A zero-valued object that has been created but not yet frozen.
///
/// Drafts are exclusively owned, so they can be populated field by field before
/// being turned into a shareable [`Instance`].
pub struct Draft {
    type_name: Rc<str>,
    object: Box<dyn Any + Send + Sync>,
    capabilities: CapabilitySet,
}

impl Draft {
    pub(crate) fn new(
        type_name: Rc<str>,
        object: Box<dyn Any + Send + Sync>,
        capabilities: CapabilitySet,
    ) -> Self {
        Self {
            type_name,
            object,
            capabilities,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn as_any_mut(&mut self) -> &mut (dyn Any + Send + Sync) {
        &mut *self.object
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.object.downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.object.downcast_mut::<T>()
    }

    pub fn freeze(self) -> Instance {
        Instance {
            type_name: self.type_name,
            object: Rc::from(self.object),
            capabilities: self.capabilities,
        }
    }
}

impl fmt::Debug for Draft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Draft")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}
