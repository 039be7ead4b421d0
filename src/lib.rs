// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Use README.md as crate documentation.
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

// Values and constructed objects cross threads, so shared ownership is atomic.
use std::sync::Arc as Rc;

mod assign;
mod capability;
mod coerce;
mod configuration;
mod defaults;
mod dynamic;
mod instance;
mod multi_error;
mod number;
mod record;
mod registry;
mod scope;
mod value;

pub use assign::{Assign, AssignError, Kind};
pub use capability::{AnyObject, CapabilitySet, Dyn};
pub use coerce::{float64_or_nan, parse_bool, Coerce, CoercionError};
pub use configuration::{ConfigError, Configuration, ObjectDefinition, Report};
pub use defaults::{Buffer, Logger, Sink, Stdout, LOG_NEW, STDOUT};
pub use dynamic::{CallError, Callable, DynamicFunc, Output, Param};
pub use instance::{Draft, Instance};
pub use multi_error::MultiError;
pub use number::Number;
pub use record::{derive_type_name, FieldAccess, FieldBuilder, FieldInfo, Layout, Record};
pub use registry::RegistryError;
pub use scope::{global, Scope, ScopeError, TypeDescriptor};
pub use value::Value;

#[cfg(test)]
mod tests;
