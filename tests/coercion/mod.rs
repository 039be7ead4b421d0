// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(test)]

use anyhow::{bail, Result};
use brot::*;
use serde::Deserialize;
use test_generator::test_resources;

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct TestCase {
    note: String,
    kind: String,
    input: Value,
    want: Option<Value>,
    error: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct YamlTest {
    cases: Vec<TestCase>,
}

fn widen<T, U>(result: Result<T, CoercionError>) -> Result<Value, CoercionError>
where
    U: From<T>,
    Value: From<U>,
{
    result.map(|v| Value::from(U::from(v)))
}

fn coerce_as(kind: &str, input: &Value) -> Result<Result<Value, CoercionError>> {
    Ok(match kind {
        "bool" => bool::coerce(input).map(Value::Bool),
        "string" => String::coerce(input).map(Value::from),
        "f32" => widen::<f32, f64>(f32::coerce(input)),
        "f64" => f64::coerce(input).map(Value::from),
        "i8" => widen::<i8, i64>(i8::coerce(input)),
        "i16" => widen::<i16, i64>(i16::coerce(input)),
        "i32" => widen::<i32, i64>(i32::coerce(input)),
        "i64" => i64::coerce(input).map(Value::from),
        "u8" => widen::<u8, u64>(u8::coerce(input)),
        "u16" => widen::<u16, u64>(u16::coerce(input)),
        "u32" => widen::<u32, u64>(u32::coerce(input)),
        "u64" => u64::coerce(input).map(Value::from),
        _ => bail!("unknown kind {kind}"),
    })
}

fn yaml_test_impl(file: &str) -> Result<()> {
    let yaml_str = std::fs::read_to_string(file)?;
    let test: YamlTest = serde_yaml::from_str(&yaml_str)?;

    println!("running {file}");

    for case in test.cases {
        print!("case {} ", case.note);
        let result = coerce_as(&case.kind, &case.input)?;
        match (result, &case.want, &case.error) {
            (Ok(actual), Some(want), None) => {
                if &actual != want {
                    bail!("{}: expected {want}, got {actual}", case.note);
                }
            }
            (Err(err), None, Some(expected)) => {
                let message = err.to_string();
                if !message.contains(expected.as_str()) {
                    bail!("{}: error `{message}` does not contain `{expected}`", case.note);
                }
            }
            (Ok(actual), None, Some(expected)) => {
                bail!("{}: expected error `{expected}`, got {actual}", case.note)
            }
            (Err(err), Some(want), None) => {
                bail!("{}: expected {want}, got error `{err}`", case.note)
            }
            _ => bail!("{}: exactly one of want or error must be given", case.note),
        }
        println!("passed");
    }

    println!("{} cases passed.", file);
    Ok(())
}

fn yaml_test(file: &str) -> Result<()> {
    match yaml_test_impl(file) {
        Ok(_) => Ok(()),
        Err(e) => {
            // If Err is returned, it doesn't always get printed by cargo test.
            // Therefore, panic with the error.
            panic!("{}", e);
        }
    }
}

#[test_resources("tests/coercion/cases/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}
