//! Function registry.
//!
//! Functions are registered once during setup, each as a descriptor plus
//! an implementation. After setup the registry is shared read-only behind
//! an `Arc`; calls resolve their implementation at construction time so
//! evaluation never consults the registry.

pub mod builtin;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use geo_types::Rect;
use tracing::{debug, warn};

use crate::error::{FilterError, Result};
use crate::expression::Expression;
use crate::record::Record;
use crate::types::Value;

// ──────────────────────────────────────────────
// Descriptors
// ──────────────────────────────────────────────

/// Declared type of a parameter or result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterType {
    Any,
    Number,
    Integer,
    Text,
    Bool,
    Geometry,
    List,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionParameter {
    pub name: String,
    pub kind: ParameterType,
    pub min_occurs: usize,
    /// `None` means unbounded.
    pub max_occurs: Option<usize>,
}

impl FunctionParameter {
    /// A parameter that must appear exactly once.
    pub fn required(name: impl Into<String>, kind: ParameterType) -> Self {
        FunctionParameter {
            name: name.into(),
            kind,
            min_occurs: 1,
            max_occurs: Some(1),
        }
    }

    /// A trailing parameter that may repeat.
    pub fn repeated(name: impl Into<String>, kind: ParameterType, min_occurs: usize) -> Self {
        FunctionParameter {
            name: name.into(),
            kind,
            min_occurs,
            max_occurs: None,
        }
    }
}

/// Name, ordered parameters and result type of a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDescriptor {
    pub name: String,
    pub parameters: Vec<FunctionParameter>,
    pub returns: ParameterType,
}

impl FunctionDescriptor {
    pub fn new(
        name: impl Into<String>,
        parameters: Vec<FunctionParameter>,
        returns: ParameterType,
    ) -> Self {
        FunctionDescriptor {
            name: name.into(),
            parameters,
            returns,
        }
    }

    /// Accepted argument counts as `(min, max)`; `max` is `None` when a
    /// parameter is unbounded.
    pub fn arg_count_range(&self) -> (usize, Option<usize>) {
        let min = self.parameters.iter().map(|p| p.min_occurs).sum();
        let max = self
            .parameters
            .iter()
            .try_fold(0usize, |acc, p| p.max_occurs.map(|m| acc + m));
        (min, max)
    }

    pub fn accepts_arg_count(&self, count: usize) -> bool {
        let (min, max) = self.arg_count_range();
        count >= min && max.map_or(true, |max| count <= max)
    }
}

// ──────────────────────────────────────────────
// Implementations
// ──────────────────────────────────────────────

/// The behaviour behind a registered function.
pub trait FunctionImpl: Send + Sync {
    /// Compute the result from already-evaluated arguments. Bad input
    /// yields `Value::Null`.
    fn invoke(&self, args: &[Value], record: &dyn Record) -> Value;

    /// For geometry transforms: given the extent the transformed output
    /// must cover, return the extent the untransformed input must cover.
    /// The geometry being transformed is the first argument. `None` means
    /// the transform cannot be inverted.
    fn invert_envelope(&self, _args: &[Expression], _target: Rect<f64>) -> Option<Rect<f64>> {
        None
    }
}

/// Any `Fn(&[Value]) -> Value` closure can be registered directly.
impl<F> FunctionImpl for F
where
    F: Fn(&[Value]) -> Value + Send + Sync,
{
    fn invoke(&self, args: &[Value], _record: &dyn Record) -> Value {
        self(args)
    }
}

/// A descriptor bound to its implementation.
#[derive(Clone)]
pub struct RegisteredFunction {
    pub descriptor: Arc<FunctionDescriptor>,
    pub implementation: Arc<dyn FunctionImpl>,
}

impl fmt::Debug for RegisteredFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredFunction")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

// ──────────────────────────────────────────────
// Calls
// ──────────────────────────────────────────────

/// A function applied to argument expressions.
///
/// Two calls are equal when their names and arguments are equal; the bound
/// implementation does not take part.
#[derive(Clone)]
pub struct FunctionCall {
    function: RegisteredFunction,
    args: Vec<Expression>,
}

impl FunctionCall {
    pub fn name(&self) -> &str {
        &self.function.descriptor.name
    }

    pub fn args(&self) -> &[Expression] {
        &self.args
    }

    pub fn descriptor(&self) -> &FunctionDescriptor {
        &self.function.descriptor
    }

    pub fn implementation(&self) -> &dyn FunctionImpl {
        self.function.implementation.as_ref()
    }

    /// Evaluate every argument, then invoke.
    pub fn evaluate(&self, record: &dyn Record) -> Value {
        let args: Vec<Value> = self.args.iter().map(|a| a.evaluate(record)).collect();
        self.function.implementation.invoke(&args, record)
    }

    /// Same call with different arguments, re-checked against the
    /// descriptor.
    pub fn with_args(&self, args: Vec<Expression>) -> Result<FunctionCall> {
        bind(self.function.clone(), args)
    }
}

impl PartialEq for FunctionCall {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name() && self.args == other.args
    }
}

impl fmt::Debug for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionCall")
            .field("name", &self.name())
            .field("args", &self.args)
            .finish()
    }
}

/// Renders as `name([arg1], [arg2])`.
impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name())?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "[{}]", arg)?;
        }
        f.write_str(")")
    }
}

fn bind(function: RegisteredFunction, args: Vec<Expression>) -> Result<FunctionCall> {
    if !function.descriptor.accepts_arg_count(args.len()) {
        let (min, max) = function.descriptor.arg_count_range();
        let expected = match max {
            Some(max) if max == min => format!("{}", min),
            Some(max) => format!("{} to {}", min, max),
            None => format!("at least {}", min),
        };
        return Err(FilterError::argument(format!(
            "function '{}' takes {} arguments, got {}",
            function.descriptor.name,
            expected,
            args.len()
        )));
    }
    Ok(FunctionCall { function, args })
}

// ──────────────────────────────────────────────
// Registry
// ──────────────────────────────────────────────

/// Name-keyed table of functions.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, RegisteredFunction>,
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in function.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    /// Register a function. A later registration under the same name
    /// replaces the earlier one.
    pub fn register(&mut self, descriptor: FunctionDescriptor, implementation: impl FunctionImpl + 'static) {
        self.register_arc(descriptor, Arc::new(implementation));
    }

    pub fn register_arc(&mut self, descriptor: FunctionDescriptor, implementation: Arc<dyn FunctionImpl>) {
        let name = descriptor.name.clone();
        let entry = RegisteredFunction {
            descriptor: Arc::new(descriptor),
            implementation,
        };
        if self.functions.insert(name.clone(), entry).is_some() {
            warn!(function = %name, "function registered twice; keeping the later registration");
        } else {
            debug!(function = %name, "registered function");
        }
    }

    /// Look a function up by exact name, then case-insensitively.
    pub fn find(&self, name: &str) -> Option<&RegisteredFunction> {
        if let Some(found) = self.functions.get(name) {
            return Some(found);
        }
        let lowered = name.to_lowercase();
        self.functions
            .iter()
            .find(|(key, _)| key.to_lowercase() == lowered)
            .map(|(_, f)| f)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Bind a call, checking the name and the argument count.
    pub fn call(&self, name: &str, args: Vec<Expression>) -> Result<FunctionCall> {
        let function = self
            .find(name)
            .cloned()
            .ok_or_else(|| FilterError::UnknownFunction {
                name: name.to_string(),
            })?;
        bind(function, args)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &FunctionDescriptor> {
        self.functions.values().map(|f| f.descriptor.as_ref())
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
