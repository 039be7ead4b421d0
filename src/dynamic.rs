// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Invocation of registered functions with named, untyped arguments.
//!
//! A [`DynamicFunc`] pairs a Rust function with one name per positional
//! parameter. Calling it looks every name up in an argument object and converts
//! the value with the parameter's [`Param`] filler. Argument errors abort the call;
//! they are not aggregated.

use crate::assign::Kind;
use crate::capability::Dyn;
use crate::coerce::{Coerce, CoercionError};
use crate::instance::Instance;
use crate::record::Record;
use crate::scope::Scope;
use crate::value::Value;
use crate::Rc;

use core::fmt;
use std::collections::BTreeMap;

use thiserror::Error;

type Arguments = BTreeMap<Rc<str>, Value>;

#[derive(Error, Debug)]
pub enum CallError {
    #[error("Number of func arguments and passed names does not match. Expected {expected}, received {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("missing argument {0}")]
    MissingArgument(Rc<str>),

    #[error("Could not set value of argument {name}: {source}")]
    InvalidArgument {
        name: Rc<str>,
        #[source]
        source: CoercionError,
    },

    #[error("arguments must be an object, found {0}")]
    ArgumentsNotObject(&'static str),

    #[error("call failed: {0}")]
    Failed(String),
}

/// A parameter type that can be filled from a named argument.
pub trait Param: Sized + 'static {
    const KIND: Kind;

    fn fill(scope: &Scope, name: &Rc<str>, value: &Value) -> Result<Self, CallError>;
}

macro_rules! param_scalar {
    ($($t:ty => $kind:ident),* $(,)?) => {
        $(
            impl Param for $t {
                const KIND: Kind = Kind::$kind;

                fn fill(_scope: &Scope, name: &Rc<str>, value: &Value) -> Result<Self, CallError> {
                    <$t as Coerce>::coerce(value).map_err(|source| CallError::InvalidArgument {
                        name: name.clone(),
                        source,
                    })
                }
            }
        )*
    };
}

param_scalar! {
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

/// Resolved by name in the calling scope. A name that does not resolve, or an
/// object that does not provide `I`, leaves the slot empty.
impl<I: ?Sized + 'static> Param for Dyn<I> {
    const KIND: Kind = Kind::Interface;

    fn fill(scope: &Scope, name: &Rc<str>, value: &Value) -> Result<Self, CallError> {
        let Value::String(object) = value else {
            return Err(CallError::InvalidArgument {
                name: name.clone(),
                source: CoercionError::UnexpectedType {
                    expected: "string",
                    found: value.type_name(),
                },
            });
        };
        let mut slot = Dyn::empty();
        slot.set(scope.get(object).and_then(|o| o.cast::<I>()));
        Ok(slot)
    }
}

impl Param for Value {
    const KIND: Kind = Kind::Any;

    fn fill(_scope: &Scope, _name: &Rc<str>, value: &Value) -> Result<Self, CallError> {
        Ok(value.clone())
    }
}

/// The result of a registered function, as seen by the scope.
pub trait Output: 'static {
    fn output_name() -> String;

    fn into_instance(self) -> Result<Option<Instance>, CallError>;
}

impl Output for () {
    fn output_name() -> String {
        "()".into()
    }

    fn into_instance(self) -> Result<Option<Instance>, CallError> {
        Ok(None)
    }
}

impl<R: Record> Output for R {
    fn output_name() -> String {
        <R as Record>::type_name()
    }

    fn into_instance(self) -> Result<Option<Instance>, CallError> {
        Ok(Some(Instance::of(self)))
    }
}

impl<R: Record> Output for Rc<R> {
    fn output_name() -> String {
        <R as Record>::type_name()
    }

    fn into_instance(self) -> Result<Option<Instance>, CallError> {
        Ok(Some(Instance::of_shared(self)))
    }
}

impl Output for Instance {
    fn output_name() -> String {
        "instance".into()
    }

    fn into_instance(self) -> Result<Option<Instance>, CallError> {
        Ok(Some(self))
    }
}

impl<T: Output> Output for Option<T> {
    fn output_name() -> String {
        T::output_name()
    }

    fn into_instance(self) -> Result<Option<Instance>, CallError> {
        match self {
            Some(output) => output.into_instance(),
            None => Ok(None),
        }
    }
}

impl<T: Output, E: fmt::Display + 'static> Output for Result<T, E> {
    fn output_name() -> String {
        T::output_name()
    }

    fn into_instance(self) -> Result<Option<Instance>, CallError> {
        match self {
            Ok(output) => output.into_instance(),
            Err(err) => Err(CallError::Failed(err.to_string())),
        }
    }
}

/// Functions of up to six [`Param`] parameters returning an [`Output`].
pub trait Callable<Args>: Send + Sync + 'static {
    const ARITY: usize;

    fn kinds() -> Vec<Kind>;

    fn output() -> String;

    fn invoke(
        &self,
        scope: &Scope,
        names: &[Rc<str>],
        args: &Arguments,
    ) -> Result<Option<Instance>, CallError>;
}

fn fill<P: Param>(scope: &Scope, name: &Rc<str>, args: &Arguments) -> Result<P, CallError> {
    let value = args
        .get(&**name)
        .ok_or_else(|| CallError::MissingArgument(name.clone()))?;
    P::fill(scope, name, value)
}

macro_rules! callable {
    ($($arg:ident),*) => {
        impl<Func, Out, $($arg,)*> Callable<($($arg,)*)> for Func
        where
            Func: Fn($($arg),*) -> Out + Send + Sync + 'static,
            Out: Output,
            $($arg: Param,)*
        {
            const ARITY: usize = <[&str]>::len(&[$(stringify!($arg)),*]);

            fn kinds() -> Vec<Kind> {
                vec![$($arg::KIND),*]
            }

            fn output() -> String {
                Out::output_name()
            }

            #[allow(non_snake_case, unused_variables, unused_mut)]
            fn invoke(
                &self,
                scope: &Scope,
                names: &[Rc<str>],
                args: &Arguments,
            ) -> Result<Option<Instance>, CallError> {
                let arity = <[&str]>::len(&[$(stringify!($arg)),*]);
                if names.len() != arity {
                    return Err(CallError::ArityMismatch {
                        expected: arity,
                        found: names.len(),
                    });
                }
                let mut names = names.iter();
                $(
                    let $arg = match names.next() {
                        Some(name) => fill::<$arg>(scope, name, args)?,
                        None => return Err(CallError::MissingArgument(stringify!($arg).into())),
                    };
                )*
                (self)($($arg),*).into_instance()
            }
        }
    };
}

callable!();
callable!(A1);
callable!(A1, A2);
callable!(A1, A2, A3);
callable!(A1, A2, A3, A4);
callable!(A1, A2, A3, A4, A5);
callable!(A1, A2, A3, A4, A5, A6);

type Invoker = Box<
    dyn Fn(&Scope, &[Rc<str>], &Arguments) -> Result<Option<Instance>, CallError> + Send + Sync,
>;

/// A function callable with named, untyped arguments.
pub struct DynamicFunc {
    names: Vec<Rc<str>>,
    kinds: Vec<Kind>,
    output: String,
    invoke: Invoker,
}

impl DynamicFunc {
    /// Wraps `func`, naming its parameters in order. The number of names must
    /// match the number of parameters.
    pub fn new<Args, F>(func: F, names: &[&str]) -> Result<Self, CallError>
    where
        Args: 'static,
        F: Callable<Args>,
    {
        if names.len() != F::ARITY {
            return Err(CallError::ArityMismatch {
                expected: F::ARITY,
                found: names.len(),
            });
        }
        Ok(Self {
            names: names.iter().map(|name| Rc::from(*name)).collect(),
            kinds: F::kinds(),
            output: F::output(),
            invoke: Box::new(
                move |scope: &Scope, names: &[Rc<str>], args: &Arguments| {
                    func.invoke(scope, names, args)
                },
            ),
        })
    }

    pub fn arity(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[Rc<str>] {
        &self.names
    }

    pub fn kinds(&self) -> &[Kind] {
        &self.kinds
    }

    /// `fn(out: interface, prefix: string, flag: i64) -> logging.Logger`
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .names
            .iter()
            .zip(&self.kinds)
            .map(|(name, kind)| format!("{name}: {kind}"))
            .collect();
        format!("fn({}) -> {}", params.join(", "), self.output)
    }

    /// Fills every parameter from `args` and invokes the function. `Null` is
    /// accepted as an empty argument object.
    pub fn call(&self, scope: &Scope, args: &Value) -> Result<Option<Instance>, CallError> {
        let empty = Arguments::new();
        let args = match args {
            Value::Object(args) => &**args,
            Value::Null => &empty,
            other => return Err(CallError::ArgumentsNotObject(other.type_name())),
        };
        (self.invoke)(scope, &self.names, args)
    }
}

impl fmt::Debug for DynamicFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}
