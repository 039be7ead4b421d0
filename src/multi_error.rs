// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::fmt;
use std::error::Error as StdError;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Ordered collection of errors produced while processing one composite value.
///
/// An empty collection means "no error".
#[derive(Default)]
pub struct MultiError {
    errors: Vec<BoxError>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collection holding the single error `err`.
    pub fn from_error<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        let mut errors = Self::new();
        errors.append(err);
        errors
    }

    /// Records `err`.
    pub fn append<E>(&mut self, err: E) -> &mut Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.errors.push(Box::new(err));
        self
    }

    /// Records the error held by `result`, if any.
    pub fn append_result<E>(&mut self, result: Result<(), E>) -> &mut Self
    where
        E: StdError + Send + Sync + 'static,
    {
        if let Err(err) = result {
            self.append(err);
        }
        self
    }

    pub fn append_str(&mut self, message: impl Into<String>) -> &mut Self {
        let message: String = message.into();
        self.errors.push(message.into());
        self
    }

    /// Splices the errors recorded by `other` into this collection.
    pub fn merge(&mut self, other: MultiError) -> &mut Self {
        self.errors.extend(other.errors);
        self
    }

    /// Merges the aggregate held by `result`, if any.
    pub fn merge_result(&mut self, result: Result<(), MultiError>) -> &mut Self {
        if let Err(other) = result {
            self.merge(other);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(dyn StdError + Send + Sync + 'static)> {
        self.errors.iter().map(|e| &**e)
    }

    /// Finds the first recorded error of type `E`.
    pub fn find<E: StdError + 'static>(&self) -> Option<&E> {
        self.errors.iter().find_map(|e| e.downcast_ref::<E>())
    }

    pub fn error_or_none(self) -> Option<MultiError> {
        if self.errors.is_empty() {
            None
        } else {
            Some(self)
        }
    }

    pub fn into_result(self) -> Result<(), MultiError> {
        match self.error_or_none() {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.len() > 1 {
            f.write_str("Multiple errors: ")?;
        }
        for (idx, err) in self.errors.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.errors.iter().map(|e| e.to_string()))
            .finish()
    }
}

impl StdError for MultiError {}

impl IntoIterator for MultiError {
    type Item = BoxError;
    type IntoIter = std::vec::IntoIter<BoxError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}
