// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::capability::CapabilitySet;
use crate::defaults;
use crate::dynamic::{CallError, DynamicFunc};
use crate::instance::{Draft, Instance};
use crate::multi_error::MultiError;
use crate::record::{self, layout_of, FieldInfo, Record};
use crate::registry::{Registry, RegistryError};
use crate::value::Value;
use crate::Rc;

use core::any::{Any, TypeId};
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use lazy_static::lazy_static;
use log::{debug, error};
use thiserror::Error;

/// Errors raised by scope operations.
#[derive(Error, Debug)]
pub enum ScopeError {
    #[error("Could not find type {0}")]
    TypeNotFound(Rc<str>),

    #[error("Could not find constructor {0}")]
    ConstructorNotFound(Rc<str>),

    #[error("passed value is not a declared record type")]
    NotARecord,

    #[error("object {0} is shared and cannot be assigned")]
    Unaddressable(Rc<str>),

    #[error("field {type_name}.{field} is not exported for assignment")]
    Unexported { type_name: Rc<str>, field: Rc<str> },

    #[error("type {type_name} has no field {field}")]
    FieldNotFound { type_name: Rc<str>, field: Rc<str> },

    #[error("field {type_name}.{field} has an unsupported kind")]
    UnsupportedField { type_name: Rc<str>, field: Rc<str> },

    #[error("scope is sealed, cannot declare {0}")]
    Sealed(Rc<str>),

    /// Assignment completed with field-level errors; `partial` holds what was
    /// assigned.
    #[error("incomplete {}: {errors}", .partial.type_name())]
    Incomplete { partial: Instance, errors: MultiError },

    #[error(transparent)]
    Fields(MultiError),

    #[error(transparent)]
    Call(#[from] CallError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

type CreateFn = fn() -> Box<dyn Any + Send + Sync>;
type AssignFn = fn(&mut dyn Any, &Scope, &Value) -> Result<(), ScopeError>;
type AssignFieldFn = fn(&mut dyn Any, &Scope, &str, &Value) -> Result<(), ScopeError>;

/// A declared record type.
pub struct TypeDescriptor {
    name: Rc<str>,
    type_id: TypeId,
    rust_name: &'static str,
    fields: Vec<FieldInfo>,
    capabilities: CapabilitySet,
    create: CreateFn,
    assign: AssignFn,
    assign_field: AssignFieldFn,
}

fn create_record<R: Record>() -> Box<dyn Any + Send + Sync> {
    Box::new(R::default())
}

fn assign_record<R: Record>(
    target: &mut dyn Any,
    scope: &Scope,
    value: &Value,
) -> Result<(), ScopeError> {
    let target = target.downcast_mut::<R>().ok_or(ScopeError::NotARecord)?;
    record::populate(target, scope, value).map_err(ScopeError::Fields)
}

fn assign_record_field<R: Record>(
    target: &mut dyn Any,
    scope: &Scope,
    field: &str,
    value: &Value,
) -> Result<(), ScopeError> {
    let target = target.downcast_mut::<R>().ok_or(ScopeError::NotARecord)?;
    record::populate_field(target, scope, field, value)
}

impl TypeDescriptor {
    pub fn of<R: Record>() -> Self {
        let layout = layout_of::<R>();
        Self {
            name: layout.type_name().clone(),
            type_id: TypeId::of::<R>(),
            rust_name: core::any::type_name::<R>(),
            fields: layout.infos(),
            capabilities: layout.capabilities().clone(),
            create: create_record::<R>,
            assign: assign_record::<R>,
            assign_field: assign_record_field::<R>,
        }
    }

    pub fn name(&self) -> &Rc<str> {
        &self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn rust_name(&self) -> &'static str {
        self.rust_name
    }

    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Zero-valued instance of the type.
    pub fn create(&self) -> Draft {
        Draft::new(
            self.name.clone(),
            (self.create)(),
            self.capabilities.clone(),
        )
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("rust_name", &self.rust_name)
            .field("fields", &self.fields)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// A namespace of declared types, declared functions and constructed objects.
///
/// Object lookups walk the parent chain, nearest scope first. Declarations and
/// object registrations only ever touch the scope they are made on.
pub struct Scope {
    parent: Option<Rc<Scope>>,
    types: Registry<TypeDescriptor>,
    funcs: Registry<DynamicFunc>,
    objects: Registry<Instance>,
    sealed: AtomicBool,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("types", &self.types.list_names())
            .field("funcs", &self.funcs.list_names())
            .field("objects", &self.objects.list_names())
            .field("sealed", &self.is_sealed())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

impl Scope {
    pub fn new() -> Self {
        Self {
            parent: None,
            types: Registry::new("types"),
            funcs: Registry::new("funcs"),
            objects: Registry::new("objects"),
            sealed: AtomicBool::new(false),
        }
    }

    /// Nested scope whose lookups fall through to `parent`.
    pub fn child(parent: &Rc<Scope>) -> Self {
        Self {
            parent: Some(Rc::clone(parent)),
            ..Self::new()
        }
    }

    pub fn parent(&self) -> Option<&Rc<Scope>> {
        self.parent.as_ref()
    }

    fn ancestors(&self) -> impl Iterator<Item = &Scope> {
        core::iter::successors(Some(self), |scope| scope.parent.as_deref())
    }

    /// Ends the declaration phase. Types and functions can no longer be declared
    /// on this scope; objects stay mutable.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    fn ensure_open(&self, what: &str) -> Result<(), ScopeError> {
        if self.is_sealed() {
            return Err(ScopeError::Sealed(what.into()));
        }
        Ok(())
    }

    /// Declares the record type `R` under its registered name. Declaring the same
    /// name again replaces the previous descriptor.
    pub fn declare<R: Record>(&self) -> Result<Rc<TypeDescriptor>, ScopeError> {
        let descriptor = Rc::new(TypeDescriptor::of::<R>());
        self.ensure_open(descriptor.name())?;
        self.types
            .insert(descriptor.name().clone(), descriptor.clone())?;
        debug!("declared type {}", descriptor.name());
        Ok(descriptor)
    }

    /// Declares a function under its synthesized signature.
    pub fn declare_fn(&self, func: DynamicFunc) -> Result<Rc<str>, ScopeError> {
        let signature: Rc<str> = func.signature().into();
        self.define(&signature, func)?;
        Ok(signature)
    }

    /// Declares a function under an explicit name.
    pub fn define(&self, name: &str, func: DynamicFunc) -> Result<(), ScopeError> {
        self.ensure_open(name)?;
        self.funcs.insert(name, Rc::new(func))?;
        debug!("declared function {name}");
        Ok(())
    }

    pub fn type_of(&self, name: &str) -> Option<Rc<TypeDescriptor>> {
        self.ancestors().find_map(|scope| scope.types.get(name))
    }

    pub fn function(&self, name: &str) -> Option<Rc<DynamicFunc>> {
        self.ancestors().find_map(|scope| scope.funcs.get(name))
    }

    fn descriptor_for(&self, type_id: TypeId) -> Option<Rc<TypeDescriptor>> {
        self.ancestors()
            .find_map(|scope| scope.types.find(|d| d.type_id == type_id))
    }

    /// Registers `object` under `name` in this scope, replacing any previous one.
    pub fn set(&self, name: &str, object: Instance) -> Result<(), ScopeError> {
        self.objects.insert(name, Rc::new(object))?;
        Ok(())
    }

    /// Looks `name` up in this scope and then in its ancestors.
    pub fn get(&self, name: &str) -> Option<Instance> {
        self.ancestors()
            .find_map(|scope| scope.objects.get(name))
            .map(|object| (*object).clone())
    }

    /// Removes `name` from this scope only. Ancestors are not affected.
    pub fn remove(&self, name: &str) -> Option<Instance> {
        self.objects.remove(name).map(|object| (*object).clone())
    }

    pub fn object_names(&self) -> Vec<Rc<str>> {
        self.objects.list_names()
    }

    /// Allocates `type_name`, assigns `config` into it and, when `name` is not empty
    /// and assignment reported no error, registers the result under `name`.
    pub fn new_object(
        &self,
        name: &str,
        type_name: &str,
        config: &Value,
    ) -> Result<Instance, ScopeError> {
        let object = self.allocate(type_name, config)?;
        if !name.is_empty() {
            self.set(name, object.clone())?;
        }
        Ok(object)
    }

    /// Allocates `type_name` and assigns `config` into it.
    ///
    /// Field-level errors yield [`ScopeError::Incomplete`], which still carries the
    /// partially assigned object.
    pub fn allocate(&self, type_name: &str, config: &Value) -> Result<Instance, ScopeError> {
        let descriptor = self
            .type_of(type_name)
            .ok_or_else(|| ScopeError::TypeNotFound(type_name.into()))?;
        let mut draft = descriptor.create();
        let assigned = (descriptor.assign)(draft.as_any_mut(), self, config);
        let object = draft.freeze();
        match assigned {
            Ok(()) => Ok(object),
            Err(ScopeError::Fields(errors)) => Err(ScopeError::Incomplete {
                partial: object,
                errors,
            }),
            Err(err) => Err(err),
        }
    }

    /// Zero-valued, unfrozen instance of `type_name`.
    pub fn create(&self, type_name: &str) -> Result<Draft, ScopeError> {
        self.type_of(type_name)
            .map(|descriptor| descriptor.create())
            .ok_or_else(|| ScopeError::TypeNotFound(type_name.into()))
    }

    /// Assigns `config` into a value of a declared record type.
    pub fn assign(&self, target: &mut dyn Any, config: &Value) -> Result<(), ScopeError> {
        let descriptor = self
            .descriptor_for((*target).type_id())
            .ok_or(ScopeError::NotARecord)?;
        (descriptor.assign)(target, self, config)
    }

    /// Assigns `config` into a constructed object. Fails with
    /// [`ScopeError::Unaddressable`] while the object is shared.
    pub fn assign_instance(&self, object: &mut Instance, config: &Value) -> Result<(), ScopeError> {
        let name: Rc<str> = object.type_name().into();
        let target = object.get_mut().ok_or(ScopeError::Unaddressable(name))?;
        self.assign(target, config)
    }

    /// Assigns a single declared field of `target`.
    pub fn assign_field(
        &self,
        target: &mut dyn Any,
        field: &str,
        value: &Value,
    ) -> Result<(), ScopeError> {
        let descriptor = self
            .descriptor_for((*target).type_id())
            .ok_or(ScopeError::NotARecord)?;
        (descriptor.assign_field)(target, self, field, value)
    }

    /// Invokes the function `func_name` with `args` and, if it produced an object,
    /// registers it under `object_name`.
    pub fn call(
        &self,
        object_name: &str,
        func_name: &str,
        args: &Value,
    ) -> Result<Option<Instance>, ScopeError> {
        let func = self
            .function(func_name)
            .ok_or_else(|| ScopeError::ConstructorNotFound(func_name.into()))?;
        let result = func.call(self, args)?;
        if let Some(object) = &result {
            if !object_name.is_empty() {
                self.set(object_name, object.clone())?;
            }
        }
        Ok(result)
    }
}

lazy_static! {
    static ref GLOBAL: Rc<Scope> = {
        let scope = Scope::new();
        if let Err(err) = defaults::register(&scope) {
            error!("could not register default objects: {err}");
        }
        Rc::new(scope)
    };
}

/// The process-wide root scope, with the default objects and functions
/// registered.
pub fn global() -> Rc<Scope> {
    Rc::clone(&GLOBAL)
}
