//! Runtime typing of parameter values.
//!
//! Settings and metadata are authored by hand, so parameter values arrive as
//! dynamically-typed [`serde_json::Value`]s. [`ParamType`] gives them a closed
//! set of type tags that the binder can compare against the declared schema.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

/// Type tag of a parameter, as declared in metadata or observed at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Mapping,
    Sequence,
    /// Declared slot that accepts any value.
    Any,
}

/// Returned by [`ParamType::from_str`] for an unrecognized type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownParamType(pub String);

impl fmt::Display for UnknownParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported parameter type '{}'", self.0)
    }
}

impl std::error::Error for UnknownParamType {}

impl ParamType {
    /// Runtime type of a value, or `None` for `null`.
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(Self::Boolean),
            Value::Number(_) => Some(Self::Number),
            Value::String(_) => Some(Self::String),
            Value::Array(_) => Some(Self::Sequence),
            Value::Object(_) => Some(Self::Mapping),
        }
    }

    /// Whether a non-null value satisfies this declared type.
    ///
    /// `null` is always accepted: it stands for "not supplied".
    pub fn accepts(&self, value: &Value) -> bool {
        match Self::of(value) {
            None => true,
            Some(found) => *self == Self::Any || *self == found,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Mapping => "mapping",
            Self::Sequence => "sequence",
            Self::Any => "any",
        }
    }
}

impl FromStr for ParamType {
    type Err = UnknownParamType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" | "str" => Ok(Self::String),
            "number" | "int" | "integer" | "float" => Ok(Self::Number),
            "boolean" | "bool" => Ok(Self::Boolean),
            "map" | "mapping" | "object" | "dict" => Ok(Self::Mapping),
            "list" | "sequence" | "array" => Ok(Self::Sequence),
            "" | "any" | "untyped" => Ok(Self::Any),
            _ => Err(UnknownParamType(s.to_string())),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
