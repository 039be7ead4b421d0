// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Record types and their field tables.
//!
//! A record declares its fields once through [`Record::declare`]. The resulting
//! [`Layout`] is compiled on first use and cached for the lifetime of the process,
//! so assignment never inspects the type again.

use crate::assign::{Assign, AssignError, Kind};
use crate::capability::CapabilitySet;
use crate::multi_error::MultiError;
use crate::scope::{Scope, ScopeError};
use crate::value::Value;
use crate::Rc;

use core::any::{Any, TypeId};
use core::fmt;

use dashmap::DashMap;
use lazy_static::lazy_static;
use log::{debug, warn};

/// A structured type that can be constructed from configuration.
///
/// The lifecycle hooks run after every successful field pass: `allocated` once,
/// then `init` until it succeeds or `retry` answers `false`. There is no bound on
/// the number of attempts; an implementation that may fail repeatedly must bound
/// itself in `retry`, and perform any backoff there.
pub trait Record: Default + Send + Sync + 'static {
    /// Registered name, `module.Type` by default.
    fn type_name() -> String {
        derive_type_name(core::any::type_name::<Self>())
    }

    fn declare(layout: &mut Layout<Self>);

    fn allocated(&mut self) {}

    fn init(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn retry(&mut self) -> bool {
        false
    }
}

/// `my_crate::handlers::Static<T>` becomes `handlers.Static`.
pub fn derive_type_name(rust_name: &str) -> String {
    let base = rust_name.split('<').next().unwrap_or(rust_name);
    let mut segments = base.rsplit("::");
    let name = segments.next().unwrap_or(base);
    match segments.next() {
        Some(module) => format!("{module}.{name}"),
        None => name.to_string(),
    }
}

type Assigner<T> = Box<dyn Fn(&mut T, &Scope, &Value) -> Result<(), MultiError> + Send + Sync>;

enum Access<T> {
    Settable(Assigner<T>),
    Hidden,
    Unsupported,
}

/// How a field takes part in assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAccess {
    Settable,
    /// Never bound from configuration.
    Hidden,
    /// Bound, but of a kind assignment cannot produce.
    Unsupported,
}

/// Public description of one declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: &'static str,
    pub binding: Rc<str>,
    pub mandatory: bool,
    pub kind: Kind,
    pub access: FieldAccess,
}

pub struct Field<T> {
    name: &'static str,
    binding: Rc<str>,
    mandatory: bool,
    kind: Kind,
    access: Access<T>,
}

impl<T> Field<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn binding(&self) -> &str {
        &self.binding
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn info(&self) -> FieldInfo {
        FieldInfo {
            name: self.name,
            binding: self.binding.clone(),
            mandatory: self.mandatory,
            kind: self.kind,
            access: match self.access {
                Access::Settable(_) => FieldAccess::Settable,
                Access::Hidden => FieldAccess::Hidden,
                Access::Unsupported => FieldAccess::Unsupported,
            },
        }
    }
}

/// Handle returned by the [`Layout`] field declarations.
pub struct FieldBuilder<'a, T> {
    field: &'a mut Field<T>,
}

impl<T> FieldBuilder<'_, T> {
    /// Binds the field from `name` instead of its declared name. An empty name
    /// keeps the declared one.
    pub fn bind(self, name: &str) -> Self {
        let name = name.trim();
        if !name.is_empty() {
            self.field.binding = name.into();
        }
        self
    }

    pub fn mandatory(self) -> Self {
        self.field.mandatory = true;
        self
    }

    /// Applies a tag of the form `"binding,option,..."`. `mandatory` is the only
    /// recognized option.
    pub fn tag(self, tag: &str) -> Self {
        let mut parts = tag.split(',');
        let mut builder = match parts.next() {
            Some(binding) => self.bind(binding),
            None => self,
        };
        for option in parts {
            match option.trim() {
                "mandatory" => builder = builder.mandatory(),
                "" => {}
                other => debug!("ignoring tag option `{other}` on field {}", builder.field.name),
            }
        }
        builder
    }
}

/// Compiled field table and capability set of a record type.
pub struct Layout<T> {
    type_name: Rc<str>,
    fields: Vec<Field<T>>,
    capabilities: CapabilitySet,
}

impl<T: Record> Layout<T> {
    fn new() -> Self {
        Self {
            type_name: T::type_name().into(),
            fields: Vec::new(),
            capabilities: CapabilitySet::new(),
        }
    }

    fn push(&mut self, name: &'static str, kind: Kind, access: Access<T>) -> FieldBuilder<'_, T> {
        self.fields.push(Field {
            name,
            binding: name.into(),
            mandatory: false,
            kind,
            access,
        });
        let last = self.fields.len() - 1;
        FieldBuilder {
            field: &mut self.fields[last],
        }
    }

    /// Declares a field bound from configuration. `accessor` projects the record
    /// onto the field, e.g. `|w| &mut w.count`.
    pub fn field<F: Assign>(
        &mut self,
        name: &'static str,
        accessor: fn(&mut T) -> &mut F,
    ) -> FieldBuilder<'_, T> {
        let assign: Assigner<T> =
            Box::new(move |target: &mut T, scope: &Scope, value: &Value| {
                accessor(target).assign(scope, value)
            });
        self.push(name, F::KIND, Access::Settable(assign))
    }

    /// Declares a field that is never bound from configuration.
    pub fn hidden(&mut self, name: &'static str) -> FieldBuilder<'_, T> {
        self.push(name, Kind::Unsupported, Access::Hidden)
    }

    /// Declares a field whose kind cannot be assigned. A configured value for it
    /// is reported and ignored.
    pub fn unsupported(&mut self, name: &'static str) -> FieldBuilder<'_, T> {
        self.push(name, Kind::Unsupported, Access::Unsupported)
    }

    /// Declares that the record can be viewed as the capability `I`.
    pub fn provide<I: ?Sized + 'static>(&mut self, coerce: fn(Rc<T>) -> Rc<I>) -> &mut Self {
        self.capabilities.provide::<T, I>(coerce);
        self
    }

    pub fn type_name(&self) -> &Rc<str> {
        &self.type_name
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn fields(&self) -> &[Field<T>] {
        &self.fields
    }

    pub fn field_named(&self, name: &str) -> Option<&Field<T>> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn infos(&self) -> Vec<FieldInfo> {
        self.fields.iter().map(Field::info).collect()
    }
}

impl<T> fmt::Debug for Layout<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layout")
            .field("type_name", &self.type_name)
            .field("fields", &self.fields.iter().map(|f| f.name).collect::<Vec<_>>())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

lazy_static! {
    static ref LAYOUTS: DashMap<TypeId, Rc<dyn Any + Send + Sync>> = DashMap::new();
}

/// Returns the compiled layout of `T`, declaring it on first use.
pub fn layout_of<T: Record>() -> Rc<Layout<T>> {
    let id = TypeId::of::<T>();
    let cached = LAYOUTS.get(&id).map(|entry| Rc::clone(entry.value()));
    if let Some(layout) = cached.and_then(|any| any.downcast::<Layout<T>>().ok()) {
        return layout;
    }

    let mut layout = Layout::new();
    T::declare(&mut layout);
    let layout = Rc::new(layout);
    LAYOUTS.insert(id, layout.clone());
    layout
}

/// Populates `target` from an object value and runs its lifecycle hooks.
pub(crate) fn populate<T: Record>(
    target: &mut T,
    scope: &Scope,
    value: &Value,
) -> Result<(), MultiError> {
    let layout = layout_of::<T>();
    let Value::Object(source) = value else {
        warn!(
            "Expected an object to populate {}, found {}",
            layout.type_name,
            value.type_name()
        );
        return Err(MultiError::from_error(AssignError::SourceMismatch {
            target: layout.type_name.clone(),
            expected: "object",
            found: value.type_name(),
        }));
    };

    let mut errors = MultiError::new();
    for field in &layout.fields {
        let configured = source.get(field.binding());
        match (&field.access, configured) {
            (Access::Hidden, _) => continue,
            (Access::Unsupported, Some(_)) => {
                warn!(
                    "Unsupported type for field {}.{}",
                    layout.type_name, field.name
                );
            }
            (Access::Settable(assign), Some(value)) => {
                errors.merge_result(assign(target, scope, value));
            }
            (_, None) if field.mandatory => {
                warn!(
                    "Mandatory value for {} not defined in configuration",
                    field.binding
                );
                errors.append(AssignError::MissingMandatory {
                    record: layout.type_name.clone(),
                    field: field.binding.clone(),
                });
            }
            (_, None) => {}
        }
    }

    target.allocated();
    loop {
        match target.init() {
            Ok(()) => break,
            Err(err) => {
                warn!("Error in init of {}: {err}", layout.type_name);
                if !target.retry() {
                    break;
                }
                debug!("Retrying init of {}", layout.type_name);
            }
        }
    }

    errors.into_result()
}

/// Assigns a single declared field of `target`.
pub(crate) fn populate_field<T: Record>(
    target: &mut T,
    scope: &Scope,
    name: &str,
    value: &Value,
) -> Result<(), ScopeError> {
    let layout = layout_of::<T>();
    let field = layout
        .field_named(name)
        .ok_or_else(|| ScopeError::FieldNotFound {
            type_name: layout.type_name.clone(),
            field: name.into(),
        })?;
    match &field.access {
        Access::Settable(assign) => assign(target, scope, value).map_err(ScopeError::Fields),
        Access::Hidden => Err(ScopeError::Unexported {
            type_name: layout.type_name.clone(),
            field: name.into(),
        }),
        Access::Unsupported => Err(ScopeError::UnsupportedField {
            type_name: layout.type_name.clone(),
            field: name.into(),
        }),
    }
}
