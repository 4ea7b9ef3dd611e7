//! Feature extensions
//!
//! An extension is a named, typed side-channel payload on a feature. The
//! payload is one of:
//!
//! - free text, merged by joining target and source with a newline
//! - a JSON document held in textual form, merged structurally
//! - an artifact list, merged with the same conflict rules as bundles
//!
//! In descriptor files an extension is written as
//! `{"name": "...", "kind": "text|json|artifacts", "payload": ...}`, where a
//! JSON payload is embedded as a document rather than a string.

use crate::artifact::Artifacts;
use crate::bundles::{merge_artifact, ArtifactMergeOptions};
use crate::errors::{MergeError, Result};
use crate::structured::{concat_arrays, merge_objects, merge_structured, ValueShape};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// Declared kind of an extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionKind {
    Text,
    Json,
    Artifacts,
}

impl fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExtensionKind::Text => "TEXT",
            ExtensionKind::Json => "JSON",
            ExtensionKind::Artifacts => "ARTIFACTS",
        };
        f.write_str(name)
    }
}

/// Extension content
#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionPayload {
    Text(String),
    /// JSON document in textual form
    Json(String),
    Artifacts(Artifacts),
}

impl ExtensionPayload {
    pub fn kind(&self) -> ExtensionKind {
        match self {
            ExtensionPayload::Text(_) => ExtensionKind::Text,
            ExtensionPayload::Json(_) => ExtensionKind::Json,
            ExtensionPayload::Artifacts(_) => ExtensionKind::Artifacts,
        }
    }
}

/// A named extension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ExtensionRepr", into = "ExtensionRepr")]
pub struct Extension {
    name: String,
    payload: ExtensionPayload,
}

#[derive(Serialize, Deserialize)]
struct ExtensionRepr {
    name: String,
    kind: ExtensionKind,
    #[serde(default)]
    payload: Value,
}

impl TryFrom<ExtensionRepr> for Extension {
    type Error = String;

    fn try_from(repr: ExtensionRepr) -> std::result::Result<Self, Self::Error> {
        let payload = match (repr.kind, repr.payload) {
            (ExtensionKind::Text, Value::String(text)) => ExtensionPayload::Text(text),
            (ExtensionKind::Text, Value::Null) => ExtensionPayload::Text(String::new()),
            (ExtensionKind::Text, other) => {
                return Err(format!(
                    "text extension '{}' requires a string payload, found {}",
                    repr.name,
                    ValueShape::of(&other)
                ))
            }
            (ExtensionKind::Json, value) => ExtensionPayload::Json(value.to_string()),
            (ExtensionKind::Artifacts, Value::Null) => ExtensionPayload::Artifacts(Artifacts::new()),
            (ExtensionKind::Artifacts, value) => ExtensionPayload::Artifacts(
                serde_json::from_value(value)
                    .map_err(|e| format!("artifacts extension '{}': {}", repr.name, e))?,
            ),
        };
        Ok(Extension {
            name: repr.name,
            payload,
        })
    }
}

impl From<Extension> for ExtensionRepr {
    fn from(extension: Extension) -> Self {
        let kind = extension.kind();
        let payload = match extension.payload {
            ExtensionPayload::Text(text) => Value::String(text),
            // Invalid JSON text is kept verbatim as a string
            ExtensionPayload::Json(text) => {
                serde_json::from_str(&text).unwrap_or(Value::String(text))
            }
            ExtensionPayload::Artifacts(artifacts) => {
                serde_json::to_value(artifacts).unwrap_or(Value::Null)
            }
        };
        ExtensionRepr {
            name: extension.name,
            kind,
            payload,
        }
    }
}

impl Extension {
    pub fn new(name: &str, payload: ExtensionPayload) -> Self {
        Self {
            name: name.to_string(),
            payload,
        }
    }

    pub fn text(name: &str, text: &str) -> Self {
        Self::new(name, ExtensionPayload::Text(text.to_string()))
    }

    pub fn json(name: &str, json: &str) -> Self {
        Self::new(name, ExtensionPayload::Json(json.to_string()))
    }

    pub fn artifacts(name: &str, artifacts: Artifacts) -> Self {
        Self::new(name, ExtensionPayload::Artifacts(artifacts))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ExtensionKind {
        self.payload.kind()
    }

    pub fn payload(&self) -> &ExtensionPayload {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut ExtensionPayload {
        &mut self.payload
    }

    /// The text of a text extension
    pub fn as_text(&self) -> Option<&str> {
        match &self.payload {
            ExtensionPayload::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The raw JSON text of a JSON extension
    pub fn as_json(&self) -> Option<&str> {
        match &self.payload {
            ExtensionPayload::Json(text) => Some(text),
            _ => None,
        }
    }

    /// The artifacts of an artifact-list extension
    pub fn as_artifacts(&self) -> Option<&Artifacts> {
        match &self.payload {
            ExtensionPayload::Artifacts(artifacts) => Some(artifacts),
            _ => None,
        }
    }

    /// Parse the payload of a JSON extension
    pub fn json_value(&self) -> Result<Option<Value>> {
        match &self.payload {
            ExtensionPayload::Json(text) => parse_payload(&self.name, text).map(Some),
            _ => Ok(None),
        }
    }
}

fn parse_payload(name: &str, text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(|source| {
        MergeError::InvalidPayload {
            name: name.to_string(),
            source,
        }
        .into()
    })
}

/// Merge JSON payload text, returning the merged text
fn merge_json_text(name: &str, target: &str, source: &str) -> Result<String> {
    let left = parse_payload(name, target)?;
    let right = parse_payload(name, source)?;

    let (left_shape, right_shape) = (ValueShape::of(&left), ValueShape::of(&right));
    if left_shape != right_shape {
        return Err(MergeError::PayloadShapeMismatch {
            name: name.to_string(),
            target_shape: left_shape.to_string(),
            source_shape: right_shape.to_string(),
        }
        .into());
    }

    let merged = match (&left, &right) {
        (Value::Array(l), Value::Array(r)) => Value::Array(concat_arrays(l, r)),
        (Value::Object(l), Value::Object(r)) => Value::Object(merge_objects(l, r)),
        _ => merge_structured(&left, &right),
    };
    Ok(merged.to_string())
}

/// Default merge of two same-named extensions
///
/// # Errors
///
/// - [`MergeError::ExtensionKindMismatch`] when the kinds differ
/// - [`MergeError::PayloadShapeMismatch`] / [`MergeError::InvalidPayload`]
///   for JSON payloads that cannot be combined
/// - any artifact conflict error for artifact lists
pub fn merge_extension(
    target: &mut Extension,
    source: &Extension,
    options: &ArtifactMergeOptions<'_>,
) -> Result<()> {
    debug!(extension = %target.name, kind = %target.kind(), "Default extension merge");
    match (&mut target.payload, &source.payload) {
        (ExtensionPayload::Text(text), ExtensionPayload::Text(incoming)) => {
            text.push('\n');
            text.push_str(incoming);
        }
        (ExtensionPayload::Json(text), ExtensionPayload::Json(incoming)) => {
            *text = merge_json_text(&target.name, text, incoming)?;
        }
        (ExtensionPayload::Artifacts(artifacts), ExtensionPayload::Artifacts(incoming)) => {
            for artifact in incoming {
                merge_artifact(artifacts, incoming, artifact, options)?;
            }
        }
        (current, incoming) => {
            return Err(MergeError::ExtensionKindMismatch {
                name: target.name.clone(),
                target_kind: current.kind().to_string(),
                source_kind: incoming.kind().to_string(),
            }
            .into());
        }
    }
    Ok(())
}
