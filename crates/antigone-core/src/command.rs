//! Commands submitted for evaluation.
//!
//! A command is free text plus the capabilities the caller declares. Parsing
//! is total: malformed input degrades to the empty command instead of
//! failing, so the engine always has something to evaluate.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Text under evaluation and the caller's declared capabilities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Content under evaluation
    #[serde(default)]
    pub text: String,

    /// Capability tokens the caller claims
    #[serde(default, alias = "caps")]
    pub capabilities: Vec<String>,
}

impl Command {
    /// A command with text and no capabilities.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            capabilities: Vec::new(),
        }
    }

    /// Add a declared capability.
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    /// Add several declared capabilities.
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities
            .extend(capabilities.into_iter().map(Into::into));
        self
    }

    /// Whether the caller declared `capability`.
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    /// Build a command from an arbitrary JSON value.
    ///
    /// - a string is the text, with no capabilities
    /// - an object supplies `text` and `capabilities` (or `caps`); fields of
    ///   the wrong type are ignored
    /// - anything else is the empty command
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(text) => Self::text(text.clone()),
            Value::Object(map) => {
                let text = map
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();

                let capabilities = map
                    .get("capabilities")
                    .or_else(|| map.get("caps"))
                    .and_then(Value::as_array)
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();

                Self { text, capabilities }
            }
            _ => Self::default(),
        }
    }

    /// Build a command from a raw request body.
    ///
    /// JSON bodies go through [`Command::from_value`]. A body that is not
    /// JSON at all is taken verbatim as the text.
    pub fn from_body(body: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(body) {
            Ok(value) => Self::from_value(&value),
            Err(_) => Self::text(String::from_utf8_lossy(body).into_owned()),
        }
    }
}

impl From<&str> for Command {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for Command {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}
