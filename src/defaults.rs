// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Objects and functions available to every configuration through the global
//! scope.

use crate::capability::{CapabilitySet, Dyn};
use crate::dynamic::DynamicFunc;
use crate::instance::Instance;
use crate::record::{Layout, Record};
use crate::scope::{Scope, ScopeError};

use std::io::Write;

use anyhow::{bail, Result};
use parking_lot::Mutex;

/// Name of the standard output sink.
pub const STDOUT: &str = "std.stdout";

/// Name of the logger constructor.
pub const LOG_NEW: &str = "log.New";

/// A line oriented output.
pub trait Sink: Send + Sync {
    fn write_line(&self, line: &str) -> Result<()>;
}

/// Writes lines to the process' standard output.
#[derive(Debug, Default)]
pub struct Stdout;

impl Sink for Stdout {
    fn write_line(&self, line: &str) -> Result<()> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}")?;
        Ok(())
    }
}

/// Keeps written lines in memory.
#[derive(Debug, Default)]
pub struct Buffer {
    lines: Mutex<Vec<String>>,
}

impl Buffer {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn contents(&self) -> String {
        self.lines.lock().join("\n")
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl Sink for Buffer {
    fn write_line(&self, line: &str) -> Result<()> {
        self.lines.lock().push(line.to_string());
        Ok(())
    }
}

impl Record for Buffer {
    fn type_name() -> String {
        "logging.Buffer".into()
    }

    fn declare(layout: &mut Layout<Self>) {
        layout.hidden("lines");
        layout.provide::<dyn Sink>(|it| it);
    }
}

/// Prefixes every message and writes it to a sink.
#[derive(Debug, Default)]
pub struct Logger {
    pub out: Dyn<dyn Sink>,
    pub prefix: String,
    pub flag: i64,
}

impl Logger {
    /// `flag` bit that includes the level name in every line.
    pub const LEVEL: i64 = 1;

    pub fn new(out: Dyn<dyn Sink>, prefix: String, flag: i64) -> Self {
        Self { out, prefix, flag }
    }

    pub fn format(&self, level: &str, message: &str) -> String {
        if self.flag & Self::LEVEL != 0 {
            format!("{}{level} {message}", self.prefix)
        } else {
            format!("{}{message}", self.prefix)
        }
    }

    pub fn log(&self, level: &str, message: &str) -> Result<()> {
        let Some(out) = self.out.get() else {
            bail!("logger {:?} has no output", self.prefix);
        };
        out.write_line(&self.format(level, message))
    }

    pub fn info(&self, message: &str) -> Result<()> {
        self.log("INFO", message)
    }

    pub fn warn(&self, message: &str) -> Result<()> {
        self.log("WARN", message)
    }
}

impl Record for Logger {
    fn type_name() -> String {
        "logging.Logger".into()
    }

    fn declare(layout: &mut Layout<Self>) {
        layout.field("out", |l| &mut l.out).mandatory();
        layout.field("prefix", |l| &mut l.prefix);
        layout.field("flag", |l| &mut l.flag);
    }
}

/// Registers the default types, objects and functions on `scope`.
pub fn register(scope: &Scope) -> Result<(), ScopeError> {
    scope.declare::<Logger>()?;
    scope.declare::<Buffer>()?;
    scope.set(
        STDOUT,
        Instance::new(
            "std.Stdout",
            Stdout,
            CapabilitySet::new().with::<Stdout, dyn Sink>(|it| it),
        ),
    )?;
    scope.define(
        LOG_NEW,
        DynamicFunc::new(Logger::new, &["out", "prefix", "flag"])?,
    )?;
    Ok(())
}
