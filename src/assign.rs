// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Recursive assignment of untyped values into typed destinations.
//!
//! Every destination kind implements [`Assign`]. Errors are aggregated: a failing
//! field, element or entry is reported and skipped while its siblings are still
//! processed.

use crate::capability::Dyn;
use crate::coerce::{Coerce, CoercionError};
use crate::multi_error::MultiError;
use crate::record::{self, Record};
use crate::scope::{Scope, ScopeError};
use crate::value::Value;
use crate::Rc;

use core::any::type_name;
use core::fmt;
use core::hash::Hash;
use std::collections::{BTreeMap, HashMap};

use log::warn;
use thiserror::Error;

/// Destination kind of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    String,
    Sequence,
    Mapping,
    Record,
    Optional,
    Reference,
    Interface,
    Any,
    Unsupported,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Bool => "bool",
            Kind::I8 => "i8",
            Kind::I16 => "i16",
            Kind::I32 => "i32",
            Kind::I64 => "i64",
            Kind::U8 => "u8",
            Kind::U16 => "u16",
            Kind::U32 => "u32",
            Kind::U64 => "u64",
            Kind::F32 => "f32",
            Kind::F64 => "f64",
            Kind::String => "string",
            Kind::Sequence => "sequence",
            Kind::Mapping => "mapping",
            Kind::Record => "record",
            Kind::Optional => "optional",
            Kind::Reference => "reference",
            Kind::Interface => "interface",
            Kind::Any => "any",
            Kind::Unsupported => "unsupported",
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Kind::Bool
                | Kind::I8
                | Kind::I16
                | Kind::I32
                | Kind::I64
                | Kind::U8
                | Kind::U16
                | Kind::U32
                | Kind::U64
                | Kind::F32
                | Kind::F64
                | Kind::String
        )
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field-level assignment failures.
#[derive(Error, Debug)]
pub enum AssignError {
    #[error("Expected a source value of type {expected} for {target}, found {found}")]
    SourceMismatch {
        target: Rc<str>,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{kind} assignment from {found} is not supported")]
    Unsupported { kind: Kind, found: &'static str },

    #[error("Mandatory value for {field} not defined in configuration of {record}")]
    MissingMandatory { record: Rc<str>, field: Rc<str> },

    #[error("Cannot find object {0}")]
    ObjectNotFound(Rc<str>),

    #[error("Cannot assign value. Expecting type {expected}, {name} is {found}")]
    TypeMismatch {
        name: Rc<str>,
        expected: Rc<str>,
        found: Rc<str>,
    },

    #[error("Object {name} does not implement interface {interface}")]
    DoesNotImplement {
        name: Rc<str>,
        interface: &'static str,
    },

    #[error("missing struct in object definition")]
    MissingStruct,

    #[error("struct is not of type string")]
    StructNotString,

    #[error("missing args in object definition")]
    MissingArgs,

    #[error("args is not of type object")]
    ArgsNotObject,

    #[error(transparent)]
    Scope(#[from] Box<ScopeError>),

    #[error(transparent)]
    Coercion(#[from] CoercionError),
}

impl From<AssignError> for MultiError {
    fn from(err: AssignError) -> Self {
        MultiError::from_error(err)
    }
}

impl From<CoercionError> for MultiError {
    fn from(err: CoercionError) -> Self {
        MultiError::from_error(err)
    }
}

/// A destination that can be populated from an untyped value.
///
/// `assign` either fully replaces `self` or leaves it untouched, except for
/// records and collections, which keep whatever parts were assigned successfully.
pub trait Assign: Default + Send + Sync + 'static {
    const KIND: Kind;

    fn assign(&mut self, scope: &Scope, value: &Value) -> Result<(), MultiError>;
}

macro_rules! assign_scalar {
    ($($t:ty => $kind:ident),* $(,)?) => {
        $(
            impl Assign for $t {
                const KIND: Kind = Kind::$kind;

                fn assign(&mut self, _scope: &Scope, value: &Value) -> Result<(), MultiError> {
                    *self = <$t as Coerce>::coerce(value)?;
                    Ok(())
                }
            }
        )*
    };
}

assign_scalar! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    isize => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    usize => U64,
    f32 => F32,
    f64 => F64,
    String => String,
}

impl<T: Assign> Assign for Vec<T> {
    const KIND: Kind = Kind::Sequence;

    fn assign(&mut self, scope: &Scope, value: &Value) -> Result<(), MultiError> {
        let Value::Array(items) = value else {
            return Err(AssignError::Unsupported {
                kind: Kind::Sequence,
                found: value.type_name(),
            }
            .into());
        };

        let mut errors = MultiError::new();
        let mut sequence = Vec::with_capacity(items.len());
        for item in items.iter() {
            let mut element = T::default();
            match element.assign(scope, item) {
                Ok(()) => sequence.push(element),
                Err(err) => {
                    errors.merge(err);
                }
            }
        }
        *self = sequence;
        errors.into_result()
    }
}

/// Assigns every entry of an object source, skipping entries whose key or value
/// fails.
fn assign_entries<K, V>(
    scope: &Scope,
    value: &Value,
    mut insert: impl FnMut(K, V),
) -> Result<(), MultiError>
where
    K: Assign,
    V: Assign,
{
    let Value::Object(entries) = value else {
        return Err(AssignError::Unsupported {
            kind: Kind::Mapping,
            found: value.type_name(),
        }
        .into());
    };

    let mut errors = MultiError::new();
    for (key, item) in entries.iter() {
        let mut k = K::default();
        if let Err(err) = k.assign(scope, &Value::String(key.clone())) {
            errors.merge(err);
            continue;
        }
        let mut v = V::default();
        match v.assign(scope, item) {
            Ok(()) => insert(k, v),
            Err(err) => {
                errors.merge(err);
            }
        }
    }
    errors.into_result()
}

impl<K, V> Assign for HashMap<K, V>
where
    K: Assign + Eq + Hash,
    V: Assign,
{
    const KIND: Kind = Kind::Mapping;

    fn assign(&mut self, scope: &Scope, value: &Value) -> Result<(), MultiError> {
        let mut map = HashMap::new();
        let result = assign_entries(scope, value, |k, v| {
            map.insert(k, v);
        });
        if value.as_object().is_ok() {
            *self = map;
        }
        result
    }
}

impl<K, V> Assign for BTreeMap<K, V>
where
    K: Assign + Ord,
    V: Assign,
{
    const KIND: Kind = Kind::Mapping;

    fn assign(&mut self, scope: &Scope, value: &Value) -> Result<(), MultiError> {
        let mut map = BTreeMap::new();
        let result = assign_entries(scope, value, |k, v| {
            map.insert(k, v);
        });
        if value.as_object().is_ok() {
            *self = map;
        }
        result
    }
}

impl<T: Record> Assign for T {
    const KIND: Kind = Kind::Record;

    fn assign(&mut self, scope: &Scope, value: &Value) -> Result<(), MultiError> {
        record::populate(self, scope, value)
    }
}

/// Owned storage for a non-shared referent; set only when assignment succeeds.
impl<T: Assign> Assign for Option<T> {
    const KIND: Kind = Kind::Optional;

    fn assign(&mut self, scope: &Scope, value: &Value) -> Result<(), MultiError> {
        let mut referent = T::default();
        referent.assign(scope, value)?;
        *self = Some(referent);
        Ok(())
    }
}

/// A record sub-object, either constructed inline from an object value or looked
/// up by name among the configured objects.
impl<R: Record> Assign for Rc<R> {
    const KIND: Kind = Kind::Reference;

    fn assign(&mut self, scope: &Scope, value: &Value) -> Result<(), MultiError> {
        if let Value::Object(_) = value {
            let mut inline = R::default();
            inline.assign(scope, value)?;
            *self = Rc::new(inline);
            return Ok(());
        }

        let name: Rc<str> = String::coerce(value)?.into();
        let Some(object) = scope.get(&name) else {
            warn!("Cannot find object {name}");
            return Err(AssignError::ObjectNotFound(name).into());
        };
        match object.downcast::<R>() {
            Some(shared) => {
                *self = shared;
                Ok(())
            }
            None => {
                let expected: Rc<str> = R::type_name().into();
                warn!(
                    "Cannot assign value. Expecting type {expected}, {name} is {}",
                    object.type_name()
                );
                Err(AssignError::TypeMismatch {
                    name,
                    expected,
                    found: object.type_name().into(),
                }
                .into())
            }
        }
    }
}

/// An interface-typed slot, filled either from an inline `{"struct", "args"}`
/// definition or from a named object. Either way the object must provide `I`.
impl<I> Assign for Dyn<I>
where
    I: ?Sized + Send + Sync + 'static,
{
    const KIND: Kind = Kind::Interface;

    fn assign(&mut self, scope: &Scope, value: &Value) -> Result<(), MultiError> {
        let (name, object) = match value {
            Value::Object(definition) => {
                let struct_name = match definition.get("struct") {
                    None => return Err(AssignError::MissingStruct.into()),
                    Some(Value::String(struct_name)) => struct_name.clone(),
                    Some(_) => return Err(AssignError::StructNotString.into()),
                };
                let args = match definition.get("args") {
                    None => return Err(AssignError::MissingArgs.into()),
                    Some(args @ Value::Object(_)) => args,
                    Some(_) => return Err(AssignError::ArgsNotObject.into()),
                };
                match scope.allocate(&struct_name, args) {
                    Ok(object) => (struct_name, object),
                    Err(ScopeError::Incomplete { errors, .. }) => return Err(errors),
                    Err(err) => return Err(AssignError::Scope(Box::new(err)).into()),
                }
            }
            _ => {
                let name: Rc<str> = String::coerce(value)?.into();
                match scope.get(&name) {
                    Some(object) => (name, object),
                    None => {
                        warn!("Cannot find object {name}");
                        return Err(AssignError::ObjectNotFound(name).into());
                    }
                }
            }
        };

        match object.cast::<I>() {
            Some(capability) => {
                self.set(Some(capability));
                Ok(())
            }
            None => {
                warn!("Object {name} does not implement interface {}", type_name::<I>());
                Err(AssignError::DoesNotImplement {
                    name,
                    interface: type_name::<I>(),
                }
                .into())
            }
        }
    }
}

/// Fields without a required capability take the configured value as is.
impl Assign for Value {
    const KIND: Kind = Kind::Any;

    fn assign(&mut self, _scope: &Scope, value: &Value) -> Result<(), MultiError> {
        *self = value.clone();
        Ok(())
    }
}
