// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::scope::{Scope, ScopeError};
use crate::value::Value;
use crate::Rc;

use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration of {name}, please use either struct or func. Current values are struct '{struct_name}' and func '{func_name}'")]
    Ambiguous {
        name: Rc<str>,
        struct_name: Rc<str>,
        func_name: Rc<str>,
    },

    #[error("Invalid configuration of {0}, please set at least struct or func.")]
    Undefined(Rc<str>),

    #[error("Could not create object {name}. Reason: {source}")]
    Construction {
        name: Rc<str>,
        #[source]
        source: ScopeError,
    },
}

/// One object to construct, either from a declared type or through a function.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "struct")]
    pub struct_name: String,
    #[serde(default, rename = "func")]
    pub func_name: String,
    #[serde(default)]
    pub args: Value,
}

impl ObjectDefinition {
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.struct_name.is_empty(), self.func_name.is_empty()) {
            (false, false) => Err(ConfigError::Ambiguous {
                name: self.name.as_str().into(),
                struct_name: self.struct_name.as_str().into(),
                func_name: self.func_name.as_str().into(),
            }),
            (true, true) => Err(ConfigError::Undefined(self.name.as_str().into())),
            _ => Ok(()),
        }
    }
}

/// A configuration document: the list of objects to construct, in order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Configuration {
    #[serde(default, alias = "objects")]
    pub handlers: Vec<ObjectDefinition>,
}

/// Outcome of [`Configuration::process`].
#[derive(Debug, Default)]
pub struct Report {
    /// Names of the objects constructed, in order. Anonymous objects are listed
    /// with an empty name.
    pub created: Vec<Rc<str>>,
    pub failures: Vec<ConfigError>,
}

impl Report {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

impl Configuration {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed to parse configuration")
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json_str(&contents)
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("failed to parse configuration")
    }

    /// Constructs every defined object in `scope`. A failing definition is logged
    /// and recorded, and processing continues with the next one.
    pub fn process(&self, scope: &Scope) -> Report {
        let mut report = Report::default();
        for definition in &self.handlers {
            match Self::construct(definition, scope) {
                Ok(created) => report.created.extend(created),
                Err(err) => {
                    warn!("{err}");
                    report.failures.push(err);
                }
            }
        }
        report
    }

    fn construct(definition: &ObjectDefinition, scope: &Scope) -> Result<Option<Rc<str>>, ConfigError> {
        definition.validate()?;
        let name: Rc<str> = definition.name.as_str().into();
        let failed = |source: ScopeError| ConfigError::Construction {
            name: name.clone(),
            source,
        };
        let empty = Value::new_object();
        let args = if definition.args.is_null() {
            &empty
        } else {
            &definition.args
        };

        if !definition.struct_name.is_empty() {
            scope
                .new_object(&name, &definition.struct_name, args)
                .map_err(failed)?;
            info!(
                "Created successfully struct {name} of type {}",
                definition.struct_name
            );
            return Ok(Some(name));
        }

        let object = scope
            .call(&name, &definition.func_name, args)
            .map_err(failed)?;
        if object.is_some() {
            info!("Created {name} with {}", definition.func_name);
            Ok(Some(name))
        } else {
            Ok(None)
        }
    }
}
