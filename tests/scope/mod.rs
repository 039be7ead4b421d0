// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(test)]

use std::sync::Arc;
use std::thread;

use anyhow::{bail, Result};
use brot::*;

#[derive(Debug, Default)]
struct Widget {
    name: String,
    count: i64,
    secret: String,
}

impl Record for Widget {
    fn type_name() -> String {
        "test.Widget".into()
    }

    fn declare(layout: &mut Layout<Self>) {
        layout.field("name", |w| &mut w.name).mandatory();
        layout.field("count", |w| &mut w.count);
        layout.hidden("secret");
    }
}

trait Shape: Send + Sync {
    fn area(&self) -> f64;
}

#[derive(Debug, Default)]
struct Square {
    side: f64,
}

impl Shape for Square {
    fn area(&self) -> f64 {
        self.side * self.side
    }
}

impl Record for Square {
    fn type_name() -> String {
        "test.Square".into()
    }

    fn declare(layout: &mut Layout<Self>) {
        layout.field("side", |s| &mut s.side);
        layout.provide::<dyn Shape>(|it| it);
    }
}

#[derive(Default)]
struct Canvas {
    shape: Dyn<dyn Shape>,
}

impl Record for Canvas {
    fn type_name() -> String {
        "test.Canvas".into()
    }

    fn declare(layout: &mut Layout<Self>) {
        layout.field("shape", |c| &mut c.shape);
    }
}

#[derive(Debug, Default)]
struct Holder {
    widget: Arc<Widget>,
}

impl Record for Holder {
    fn type_name() -> String {
        "test.Holder".into()
    }

    fn declare(layout: &mut Layout<Self>) {
        layout.field("widget", |h| &mut h.widget);
    }
}

/// Fails `failures` times in `init`. Asks to be retried until `ceiling` attempts
/// have been made, or forever when `ceiling` is zero.
#[derive(Debug, Default)]
struct Flaky {
    failures: usize,
    ceiling: usize,
    attempts: usize,
    allocated: usize,
}

impl Record for Flaky {
    fn type_name() -> String {
        "test.Flaky".into()
    }

    fn declare(layout: &mut Layout<Self>) {
        layout.field("failures", |f| &mut f.failures);
        layout.field("ceiling", |f| &mut f.ceiling);
    }

    fn allocated(&mut self) {
        self.allocated += 1;
    }

    fn init(&mut self) -> Result<()> {
        self.attempts += 1;
        if self.attempts <= self.failures {
            bail!("attempt {} failed", self.attempts);
        }
        Ok(())
    }

    fn retry(&mut self) -> bool {
        self.ceiling == 0 || self.attempts < self.ceiling
    }
}

fn test_scope() -> Result<Scope> {
    crate::init_test_logging();
    let scope = Scope::new();
    scope.declare::<Widget>()?;
    scope.declare::<Square>()?;
    scope.declare::<Canvas>()?;
    scope.declare::<Holder>()?;
    scope.declare::<Flaky>()?;
    Ok(scope)
}

fn json(s: &str) -> Result<Value> {
    Value::from_json_str(s)
}

fn field_errors(scope: &Scope, type_name: &str, config: &str) -> Result<MultiError> {
    match scope.allocate(type_name, &json(config)?) {
        Err(ScopeError::Incomplete { errors, .. }) => Ok(errors),
        Ok(_) => bail!("{config} assigned without errors"),
        Err(err) => bail!("unexpected error for {config}: {err}"),
    }
}

#[test]
fn allocate_coerces_fields() -> Result<()> {
    let scope = test_scope()?;
    let object = scope.allocate("test.Widget", &json(r#"{"name": "widget", "count": "7"}"#)?)?;
    let Some(widget) = object.downcast_ref::<Widget>() else {
        bail!("expected a widget, got {}", object.type_name());
    };
    assert_eq!(widget.name, "widget");
    assert_eq!(widget.count, 7);
    assert_eq!(object.type_name(), "test.Widget");
    Ok(())
}

#[test]
fn missing_mandatory_field_yields_partial_instance() -> Result<()> {
    let scope = test_scope()?;
    match scope.new_object("w", "test.Widget", &json(r#"{"count": 7}"#)?) {
        Err(ScopeError::Incomplete { partial, errors }) => {
            assert_eq!(errors.len(), 1);
            assert!(matches!(
                errors.find::<AssignError>(),
                Some(AssignError::MissingMandatory { field, .. }) if &**field == "name"
            ));
            let Some(widget) = partial.downcast_ref::<Widget>() else {
                bail!("partial instance is not a widget");
            };
            assert_eq!(widget.name, "");
            assert_eq!(widget.count, 7);
        }
        other => bail!("expected an incomplete widget, got {other:?}"),
    }
    // Incomplete objects are not registered.
    assert!(scope.get("w").is_none());
    Ok(())
}

#[test]
fn failing_fields_do_not_stop_siblings() -> Result<()> {
    let scope = test_scope()?;
    let errors = field_errors(&scope, "test.Widget", r#"{"name": "w", "count": "many"}"#)?;
    assert_eq!(errors.len(), 1);
    assert!(errors.find::<CoercionError>().is_some());
    Ok(())
}

#[test]
fn source_must_be_an_object() -> Result<()> {
    let scope = test_scope()?;
    let errors = field_errors(&scope, "test.Widget", "[1, 2]")?;
    assert!(matches!(
        errors.find::<AssignError>(),
        Some(AssignError::SourceMismatch { found: "array", .. })
    ));
    Ok(())
}

#[test]
fn unknown_type() -> Result<()> {
    let scope = test_scope()?;
    assert!(matches!(
        scope.allocate("test.Nothing", &Value::new_object()),
        Err(ScopeError::TypeNotFound(name)) if &*name == "test.Nothing"
    ));
    assert!(matches!(
        scope.create("test.Nothing"),
        Err(ScopeError::TypeNotFound(_))
    ));
    Ok(())
}

#[test]
fn allocated_hook_runs_once() -> Result<()> {
    let scope = test_scope()?;
    let object = scope.allocate("test.Flaky", &json(r#"{"failures": 0, "ceiling": 3}"#)?)?;
    let Some(flaky) = object.downcast_ref::<Flaky>() else {
        bail!("expected flaky");
    };
    assert_eq!(flaky.allocated, 1);
    assert_eq!(flaky.attempts, 1);
    Ok(())
}

#[test]
fn init_is_retried_until_success() -> Result<()> {
    let scope = test_scope()?;
    let object = scope.allocate("test.Flaky", &json(r#"{"failures": 3}"#)?)?;
    let Some(flaky) = object.downcast_ref::<Flaky>() else {
        bail!("expected flaky");
    };
    assert_eq!(flaky.attempts, 4);
    assert_eq!(flaky.allocated, 1);
    Ok(())
}

#[test]
fn init_failure_without_retry_is_not_an_error() -> Result<()> {
    let scope = test_scope()?;
    let object = scope.allocate("test.Flaky", &json(r#"{"failures": 2, "ceiling": 1}"#)?)?;
    let Some(flaky) = object.downcast_ref::<Flaky>() else {
        bail!("expected flaky");
    };
    assert_eq!(flaky.attempts, 1);
    Ok(())
}

#[test]
fn engine_imposes_no_retry_bound() -> Result<()> {
    // The hook gives up at the ceiling. Any smaller attempt count would mean the
    // engine stopped on its own.
    let scope = test_scope()?;
    let object = scope.allocate(
        "test.Flaky",
        &json(r#"{"failures": 1000000, "ceiling": 5000}"#)?,
    )?;
    let Some(flaky) = object.downcast_ref::<Flaky>() else {
        bail!("expected flaky");
    };
    assert_eq!(flaky.attempts, 5000);
    Ok(())
}

#[test]
fn child_scope_shadows_parent() -> Result<()> {
    let parent = Arc::new(test_scope()?);
    parent.new_object("x", "test.Widget", &json(r#"{"name": "parent"}"#)?)?;

    let child = Scope::child(&parent);
    child.new_object("x", "test.Widget", &json(r#"{"name": "child"}"#)?)?;

    let name = |scope: &Scope| {
        scope
            .get("x")
            .and_then(|o| o.downcast::<Widget>())
            .map(|w| w.name.clone())
    };
    assert_eq!(name(&child).as_deref(), Some("child"));
    assert_eq!(name(&parent).as_deref(), Some("parent"));

    assert!(child.remove("x").is_some());
    assert_eq!(name(&child).as_deref(), Some("parent"));

    // Removal is local to the scope it is made on.
    assert!(child.remove("x").is_none());
    assert!(parent.get("x").is_some());
    Ok(())
}

#[test]
fn interface_from_inline_definition() -> Result<()> {
    let scope = test_scope()?;
    let object = scope.allocate(
        "test.Canvas",
        &json(r#"{"shape": {"struct": "test.Square", "args": {"side": 2}}}"#)?,
    )?;
    let Some(canvas) = object.downcast_ref::<Canvas>() else {
        bail!("expected canvas");
    };
    let Some(shape) = canvas.shape.get() else {
        bail!("shape was not set");
    };
    assert_eq!(shape.area(), 4.0);
    Ok(())
}

#[test]
fn interface_from_named_object() -> Result<()> {
    let scope = test_scope()?;
    scope.new_object("sq", "test.Square", &json(r#"{"side": "3"}"#)?)?;
    let object = scope.allocate("test.Canvas", &json(r#"{"shape": "sq"}"#)?)?;
    let Some(canvas) = object.downcast_ref::<Canvas>() else {
        bail!("expected canvas");
    };
    assert_eq!(canvas.shape.get().map(|s| s.area()), Some(9.0));
    Ok(())
}

#[test]
fn interface_definition_errors() -> Result<()> {
    let scope = test_scope()?;
    scope.new_object("w", "test.Widget", &json(r#"{"name": "w"}"#)?)?;

    let errors = field_errors(&scope, "test.Canvas", r#"{"shape": {"args": {}}}"#)?;
    assert!(matches!(errors.find::<AssignError>(), Some(AssignError::MissingStruct)));

    let errors = field_errors(&scope, "test.Canvas", r#"{"shape": {"struct": 1, "args": {}}}"#)?;
    assert!(matches!(errors.find::<AssignError>(), Some(AssignError::StructNotString)));

    let errors = field_errors(&scope, "test.Canvas", r#"{"shape": {"struct": "test.Square"}}"#)?;
    assert!(matches!(errors.find::<AssignError>(), Some(AssignError::MissingArgs)));

    let errors = field_errors(
        &scope,
        "test.Canvas",
        r#"{"shape": {"struct": "test.Square", "args": []}}"#,
    )?;
    assert!(matches!(errors.find::<AssignError>(), Some(AssignError::ArgsNotObject)));

    let errors = field_errors(&scope, "test.Canvas", r#"{"shape": "nowhere"}"#)?;
    assert!(matches!(
        errors.find::<AssignError>(),
        Some(AssignError::ObjectNotFound(name)) if &**name == "nowhere"
    ));

    let errors = field_errors(&scope, "test.Canvas", r#"{"shape": "w"}"#)?;
    assert!(matches!(
        errors.find::<AssignError>(),
        Some(AssignError::DoesNotImplement { name, .. }) if &**name == "w"
    ));

    let errors = field_errors(
        &scope,
        "test.Canvas",
        r#"{"shape": {"struct": "test.Widget", "args": {"name": "w"}}}"#,
    )?;
    assert!(matches!(
        errors.find::<AssignError>(),
        Some(AssignError::DoesNotImplement { .. })
    ));
    Ok(())
}

#[test]
fn inline_definition_errors_are_merged() -> Result<()> {
    let scope = test_scope()?;
    let errors = field_errors(
        &scope,
        "test.Canvas",
        r#"{"shape": {"struct": "test.Square", "args": {"side": "wide"}}}"#,
    )?;
    assert!(errors.find::<CoercionError>().is_some());
    Ok(())
}

#[test]
fn shared_reference_by_name() -> Result<()> {
    let scope = test_scope()?;
    let named = scope.new_object("w", "test.Widget", &json(r#"{"name": "shared"}"#)?)?;

    let object = scope.allocate("test.Holder", &json(r#"{"widget": "w"}"#)?)?;
    let Some(holder) = object.downcast_ref::<Holder>() else {
        bail!("expected holder");
    };
    let Some(widget) = named.downcast::<Widget>() else {
        bail!("expected widget");
    };
    assert!(Arc::ptr_eq(&holder.widget, &widget));
    Ok(())
}

#[test]
fn shared_reference_inline() -> Result<()> {
    let scope = test_scope()?;
    let object = scope.allocate("test.Holder", &json(r#"{"widget": {"name": "inline", "count": 2}}"#)?)?;
    let Some(holder) = object.downcast_ref::<Holder>() else {
        bail!("expected holder");
    };
    assert_eq!(holder.widget.name, "inline");
    assert_eq!(holder.widget.count, 2);
    Ok(())
}

#[test]
fn shared_reference_requires_exact_type() -> Result<()> {
    let scope = test_scope()?;
    scope.new_object("sq", "test.Square", &json(r#"{"side": 1}"#)?)?;
    let errors = field_errors(&scope, "test.Holder", r#"{"widget": "sq"}"#)?;
    assert!(matches!(
        errors.find::<AssignError>(),
        Some(AssignError::TypeMismatch { expected, found, .. })
            if &**expected == "test.Widget" && &**found == "test.Square"
    ));
    Ok(())
}

#[test]
fn single_field_assignment() -> Result<()> {
    let scope = test_scope()?;
    let mut draft = scope.create("test.Widget")?;
    scope.assign_field(draft.as_any_mut(), "count", &Value::from("12"))?;

    assert!(matches!(
        scope.assign_field(draft.as_any_mut(), "secret", &Value::from("x")),
        Err(ScopeError::Unexported { field, .. }) if &*field == "secret"
    ));
    assert!(matches!(
        scope.assign_field(draft.as_any_mut(), "colour", &Value::from("red")),
        Err(ScopeError::FieldNotFound { field, .. }) if &*field == "colour"
    ));

    let object = draft.freeze();
    let Some(widget) = object.downcast_ref::<Widget>() else {
        bail!("expected widget");
    };
    assert_eq!(widget.count, 12);
    assert_eq!(widget.name, "");
    Ok(())
}

#[test]
fn shared_instances_are_unaddressable() -> Result<()> {
    let scope = test_scope()?;
    let mut object = scope.allocate("test.Widget", &json(r#"{"name": "a"}"#)?)?;

    let other = object.clone();
    assert!(matches!(
        scope.assign_instance(&mut object, &json(r#"{"name": "b"}"#)?),
        Err(ScopeError::Unaddressable(name)) if &*name == "test.Widget"
    ));
    drop(other);

    scope.assign_instance(&mut object, &json(r#"{"name": "b", "count": 3}"#)?)?;
    let Some(widget) = object.downcast_ref::<Widget>() else {
        bail!("expected widget");
    };
    assert_eq!(widget.name, "b");
    assert_eq!(widget.count, 3);
    Ok(())
}

#[test]
fn assignment_needs_a_declared_record() -> Result<()> {
    let scope = test_scope()?;
    let mut number = 5u32;
    assert!(matches!(
        scope.assign(&mut number, &Value::new_object()),
        Err(ScopeError::NotARecord)
    ));

    let bare = Scope::new();
    let mut widget = Widget::default();
    assert!(matches!(
        bare.assign(&mut widget, &json(r#"{"name": "w"}"#)?),
        Err(ScopeError::NotARecord)
    ));

    scope.assign(&mut widget, &json(r#"{"name": "w"}"#)?)?;
    assert_eq!(widget.name, "w");
    Ok(())
}

#[test]
fn calling_functions() -> Result<()> {
    let scope = test_scope()?;
    assert!(matches!(
        scope.call("x", "nope.New", &Value::Null),
        Err(ScopeError::ConstructorNotFound(name)) if &*name == "nope.New"
    ));

    let signature = scope.declare_fn(DynamicFunc::new(
        |name: String, count: i64| Widget {
            name,
            count,
            ..Default::default()
        },
        &["name", "count"],
    )?)?;
    assert_eq!(&*signature, "fn(name: string, count: i64) -> test.Widget");

    let made = scope.call("made", &signature, &json(r#"{"name": "fn", "count": "5"}"#)?)?;
    assert!(made.is_some());
    let Some(widget) = scope.get("made").and_then(|o| o.downcast::<Widget>()) else {
        bail!("made was not registered");
    };
    assert_eq!(widget.count, 5);

    assert!(matches!(
        scope.call("bad", &signature, &json(r#"{"name": "fn"}"#)?),
        Err(ScopeError::Call(CallError::MissingArgument(_)))
    ));
    assert!(scope.get("bad").is_none());
    Ok(())
}

#[test]
fn descriptors_describe_fields() -> Result<()> {
    let scope = test_scope()?;
    let Some(descriptor) = scope.type_of("test.Widget") else {
        bail!("widget not declared");
    };
    let names: Vec<&str> = descriptor.fields().iter().map(|f| f.name).collect();
    assert_eq!(names, ["name", "count", "secret"]);
    assert!(descriptor.field("name").map(|f| f.mandatory).unwrap_or(false));
    assert_eq!(descriptor.field("count").map(|f| f.kind), Some(Kind::I64));
    assert!(scope
        .type_of("test.Square")
        .map(|d| d.capabilities().implements::<dyn Shape>())
        .unwrap_or(false));
    Ok(())
}

#[test]
fn sealed_scope_serves_concurrent_construction() -> Result<()> {
    let scope = Arc::new(test_scope()?);
    scope.seal();
    assert!(matches!(
        scope.declare::<Widget>(),
        Err(ScopeError::Sealed(_))
    ));

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let scope = scope.clone();
            thread::spawn(move || {
                let config = Value::from_json_str(&format!(r#"{{"name": "w{i}", "count": {i}}}"#))?;
                scope.new_object(&format!("w{i}"), "test.Widget", &config)?;
                anyhow::Ok(())
            })
        })
        .collect();
    for worker in workers {
        match worker.join() {
            Ok(result) => result?,
            Err(_) => bail!("worker panicked"),
        }
    }

    let mut names: Vec<String> = scope.object_names().iter().map(|n| n.to_string()).collect();
    names.sort();
    assert_eq!(names, ["w0", "w1", "w2", "w3"]);
    Ok(())
}

#[test]
fn global_scope_has_defaults() {
    let scope = global();
    assert!(scope.get(STDOUT).is_some());
    assert!(scope.function(LOG_NEW).is_some());
    assert!(scope.type_of("logging.Logger").is_some());
    assert!(Arc::ptr_eq(&scope, &global()));
}
