//! Parameter binding: the single gate between user settings and templates.
//!
//! [`bind`] checks a [`Settings`] document against the archetype's
//! [`Metadata`] and produces the flat [`TemplateContext`] every file in the
//! run is rendered against. Validation is all-or-nothing: any version,
//! name or type problem aborts the run before output is produced.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::ValidationError;
use crate::metadata::{Metadata, Settings};
use crate::value::ParamType;

/// Bound parameter values, shared read-only by every file in a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TemplateContext(BTreeMap<String, Value>);

impl TemplateContext {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// The context as a JSON object, the shape the template engine consumes.
    pub fn to_json(&self) -> Value {
        Value::Object(self.0.clone().into_iter().collect())
    }
}

impl FromIterator<(String, Value)> for TemplateContext {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Validate `settings` against `metadata` and build the template context.
///
/// Every declared parameter ends up in the context: the supplied value if
/// present and non-null, else the declared default, else `null`.
pub fn bind(settings: &Settings, metadata: &Metadata) -> Result<TemplateContext, ValidationError> {
    if settings.version != metadata.version {
        return Err(ValidationError::VersionMismatch {
            settings: settings.version,
            metadata: metadata.version,
        });
    }

    // Unknown keys are rejected before any type is looked at.
    if let Some(name) = settings
        .parameters
        .keys()
        .find(|name| !metadata.parameters.contains_key(*name))
    {
        return Err(ValidationError::UnknownParameter(name.clone()));
    }

    let mut context = BTreeMap::new();
    for (name, declared) in &metadata.parameters {
        let expected: ParamType =
            declared
                .kind
                .parse()
                .map_err(|_| ValidationError::UnknownType {
                    name: name.clone(),
                    declared: declared.kind.clone(),
                })?;

        let value = match settings.parameters.get(name) {
            Some(value) if !value.is_null() => {
                if !expected.accepts(value) {
                    return Err(ValidationError::TypeMismatch {
                        name: name.clone(),
                        expected: expected.to_string(),
                        found: ParamType::of(value)
                            .map(|t| t.to_string())
                            .unwrap_or_else(|| "null".into()),
                    });
                }
                value.clone()
            }
            _ => {
                tracing::debug!(parameter = %name, "using declared default");
                declared.default.clone().unwrap_or(Value::Null)
            }
        };
        context.insert(name.clone(), value);
    }

    tracing::info!(parameters = context.len(), "bound settings to metadata");
    Ok(TemplateContext(context))
}
