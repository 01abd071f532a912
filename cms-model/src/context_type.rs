use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Shape descriptor of a context value: field name → type tag.
///
/// A descriptor is valid when every tag is a string or a number. The empty
/// descriptor marks a root (context-free) entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextType(Map<String, Value>);

impl ContextType {
    /// The empty descriptor.
    pub fn root() -> Self {
        Self::default()
    }

    /// Builds a descriptor from a JSON value. Non-objects yield `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn with(mut self, field: impl Into<String>, tag: impl Into<Value>) -> Self {
        self.0.insert(field.into(), tag.into());
        self
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        self.invalid_fields().next().is_none()
    }

    /// Fields whose tag is neither a string nor a number.
    pub fn invalid_fields(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(_, v)| !(v.is_string() || v.is_number()))
            .map(|(k, _)| k.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}
