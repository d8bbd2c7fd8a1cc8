//! Value transforms
//!
//! A transform converts one tree-model value into the raw value written to a
//! bus signal. It is either a lookup table (first exact match wins) or an
//! arithmetic/boolean expression over the free variable `x`.
//!
//! Evaluation never fails loudly: a lookup miss or an expression error yields
//! `None`, which tells the caller to leave the signal out of the next frame.

use crate::types::{MapperError, Result, SignalValue};
use evalexpr::{ContextWithMutableVariables, HashMapContext, Node};

/// Name of the variable bound to the input value in expressions
pub const EXPRESSION_VARIABLE: &str = "x";

/// A validated transform declaration
#[derive(Debug, Clone)]
pub enum Transform {
    /// Ordered `(from, to)` pairs
    Lookup(Vec<LookupEntry>),
    /// Expression over `x`
    Expression(Expression),
}

/// One row of a lookup table
#[derive(Debug, Clone, PartialEq)]
pub struct LookupEntry {
    pub from: SignalValue,
    pub to: SignalValue,
}

/// An expression compiled once when the mapping is loaded
///
/// `/` is always true division: when the expression divides, integer
/// literals and an integer `x` are evaluated as floats, so `x / 40` with
/// `x = 50` is `1.25`. Expressions without `/` keep integer arithmetic.
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    compiled: std::result::Result<Node, String>,
    float_division: bool,
}

impl Expression {
    /// Compile an expression
    ///
    /// A syntax error is kept rather than returned; evaluating the expression
    /// later yields `None` for every input.
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let float_division = source.contains('/');
        let compiled = if float_division {
            evalexpr::build_operator_tree(&float_literals(&source))
        } else {
            evalexpr::build_operator_tree(&source)
        }
        .map_err(|e| e.to_string());
        if let Err(e) = &compiled {
            log::warn!("Expression '{}' does not compile: {}", source, e);
        }
        Self {
            source,
            compiled,
            float_division,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate with `x` bound to `input`
    pub fn evaluate(&self, input: &SignalValue) -> std::result::Result<SignalValue, String> {
        let node = self.compiled.as_ref().map_err(|e| e.clone())?;

        let variable = match input {
            SignalValue::Integer(v) if self.float_division => evalexpr::Value::Float(*v as f64),
            other => to_evalexpr(other),
        };
        let mut context = HashMapContext::new();
        context
            .set_value(EXPRESSION_VARIABLE.to_string(), variable)
            .map_err(|e| e.to_string())?;

        let result = node.eval_with_context(&context).map_err(|e| e.to_string())?;
        match from_evalexpr(&result) {
            Some(SignalValue::Float(v)) if !v.is_finite() => {
                Err(format!("expression produced {}", v))
            }
            Some(value) => Ok(value),
            None => Err(format!("expression produced non-scalar {:?}", result)),
        }
    }
}

/// Rewrite integer literals as float literals (`40` becomes `40.0`)
///
/// String literals and digits inside identifiers or existing float literals
/// are left alone.
fn float_literals(source: &str) -> String {
    let mut out = String::with_capacity(source.len() + 8);
    let mut chars = source.chars().peekable();
    let mut prev: Option<char> = None;

    while let Some(c) = chars.next() {
        if c == '"' {
            out.push(c);
            let mut escaped = false;
            for s in chars.by_ref() {
                out.push(s);
                if escaped {
                    escaped = false;
                } else if s == '\\' {
                    escaped = true;
                } else if s == '"' {
                    break;
                }
            }
            prev = Some('"');
            continue;
        }

        let starts_number = c.is_ascii_digit()
            && !prev.is_some_and(|p| p.is_alphanumeric() || p == '_' || p == '.' || p == ':');
        out.push(c);
        prev = Some(c);
        if !starts_number {
            continue;
        }

        while let Some(&d) = chars.peek() {
            if !d.is_ascii_digit() {
                break;
            }
            out.push(d);
            prev = Some(d);
            chars.next();
        }
        match chars.peek() {
            Some(&n) if n == '.' || n == '_' || n.is_alphanumeric() => {}
            _ => out.push_str(".0"),
        }
    }
    out
}

impl Transform {
    /// Validate a transform section from the mapping file
    ///
    /// `path` is only used for error messages.
    pub fn from_json(path: &str, section: &serde_json::Value) -> Result<Self> {
        let section = section
            .as_object()
            .ok_or_else(|| MapperError::invalid_mapping(path, "transform is not an object"))?;

        match (section.get("mapping"), section.get("math")) {
            (Some(_), Some(_)) => Err(MapperError::invalid_mapping(
                path,
                "transform can not have both mapping and math",
            )),
            (Some(mapping), None) => {
                let items = mapping.as_array().ok_or_else(|| {
                    MapperError::invalid_mapping(path, "transform mapping is not a list")
                })?;
                items
                    .iter()
                    .map(|item| lookup_entry(path, item))
                    .collect::<Result<Vec<_>>>()
                    .map(Transform::Lookup)
            }
            (None, Some(math)) => math
                .as_str()
                .map(|text| Transform::Expression(Expression::new(text)))
                .ok_or_else(|| MapperError::invalid_mapping(path, "math must be a string")),
            (None, None) => Err(MapperError::invalid_mapping(
                path,
                "unsupported transform, expected mapping or math",
            )),
        }
    }
}

fn lookup_entry(path: &str, item: &serde_json::Value) -> Result<LookupEntry> {
    let (from, to) = match (item.get("from"), item.get("to")) {
        (Some(from), Some(to)) => (from, to),
        _ => {
            return Err(MapperError::invalid_mapping(
                path,
                format!("mapping entry {} is missing from or to", item),
            ))
        }
    };
    let scalar = |value: &serde_json::Value| {
        SignalValue::from_json(value).ok_or_else(|| {
            MapperError::invalid_mapping(path, format!("mapping value {} is not a scalar", value))
        })
    };
    Ok(LookupEntry {
        from: scalar(from)?,
        to: scalar(to)?,
    })
}

/// Apply an optional transform to an input value
///
/// `None` as the transform is the identity. `None` as the result means the
/// update must be ignored for this signal.
pub fn apply(transform: Option<&Transform>, input: &SignalValue, signal_name: &str) -> Option<SignalValue> {
    let output = match transform {
        None => {
            log::debug!("No transform for {}, using value {}", signal_name, input);
            Some(input.clone())
        }
        Some(Transform::Lookup(entries)) => {
            let found = entries
                .iter()
                .find(|entry| entry.from == *input)
                .map(|entry| entry.to.clone());
            if found.is_none() {
                log::warn!("No mapping to {} found for value {}, signal ignored", signal_name, input);
            }
            found
        }
        Some(Transform::Expression(expression)) => match expression.evaluate(input) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!(
                    "Transformation '{}' failed for value {} for signal {}, signal ignored: {}",
                    expression.source(),
                    input,
                    signal_name,
                    e
                );
                None
            }
        },
    };

    if let Some(value) = &output {
        log::debug!("Transformed value {} for {}", value, signal_name);
    }
    output
}

fn to_evalexpr(value: &SignalValue) -> evalexpr::Value {
    match value {
        SignalValue::Boolean(v) => evalexpr::Value::Boolean(*v),
        SignalValue::Integer(v) => evalexpr::Value::Int(*v),
        SignalValue::Float(v) => evalexpr::Value::Float(*v),
        SignalValue::String(v) => evalexpr::Value::String(v.clone()),
    }
}

fn from_evalexpr(value: &evalexpr::Value) -> Option<SignalValue> {
    match value {
        evalexpr::Value::Boolean(v) => Some(SignalValue::Boolean(*v)),
        evalexpr::Value::Int(v) => Some(SignalValue::Integer(*v)),
        evalexpr::Value::Float(v) => Some(SignalValue::Float(*v)),
        evalexpr::Value::String(v) => Some(SignalValue::String(v.clone())),
        _ => None,
    }
}
