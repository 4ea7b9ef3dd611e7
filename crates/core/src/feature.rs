//! Feature descriptor model
//!
//! A [`Feature`] is the unit that gets merged: bundles, configurations,
//! framework properties, variables, requirements, capabilities and extensions,
//! identified by an artifact id. Descriptors are (de)serialized with serde;
//! every collection defaults to empty so a minimal descriptor is just
//! `{"id": "group:artifact:version"}`.

use crate::artifact::ArtifactId;
use crate::bundles::Bundles;
use crate::configuration::Configurations;
use crate::extension::Extension;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

/// A requirement declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub namespace: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub directives: IndexMap<String, String>,
}

/// A capability declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    pub namespace: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub directives: IndexMap<String, String>,
}

impl Requirement {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            attributes: IndexMap::new(),
            directives: IndexMap::new(),
        }
    }

    pub fn with_directive(mut self, key: &str, value: &str) -> Self {
        self.directives.insert(key.to_string(), value.to_string());
        self
    }
}

impl Capability {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            attributes: IndexMap::new(),
            directives: IndexMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: Value) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }
}

/// A feature descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Feature {
    pub id: ArtifactId,

    #[serde(default, skip_serializing_if = "Bundles::is_empty")]
    pub bundles: Bundles,

    #[serde(default, skip_serializing_if = "Configurations::is_empty")]
    pub configurations: Configurations,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub framework_properties: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub variables: IndexMap<String, Option<String>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<Requirement>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<Capability>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<Extension>,

    /// Free-form descriptor metadata (title, description, vendor, ...)
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub metadata: IndexMap<String, Value>,
}

impl Feature {
    /// An empty feature with the given id
    pub fn new(id: ArtifactId) -> Self {
        Self {
            id,
            bundles: Bundles::new(),
            configurations: Configurations::new(),
            framework_properties: IndexMap::new(),
            variables: IndexMap::new(),
            requirements: Vec::new(),
            capabilities: Vec::new(),
            extensions: Vec::new(),
            metadata: IndexMap::new(),
        }
    }

    pub fn extension(&self, name: &str) -> Option<&Extension> {
        self.extensions.iter().find(|e| e.name() == name)
    }

    pub fn extension_mut(&mut self, name: &str) -> Option<&mut Extension> {
        self.extensions.iter_mut().find(|e| e.name() == name)
    }

    /// Insert an extension, replacing any existing one with the same name
    pub fn set_extension(&mut self, extension: Extension) {
        match self.extension_mut(extension.name()) {
            Some(current) => *current = extension,
            None => self.extensions.push(extension),
        }
    }
}

/// Append source requirements not already present in `target`
pub fn merge_requirements(target: &mut Vec<Requirement>, source: &[Requirement]) {
    for requirement in source {
        if !target.contains(requirement) {
            trace!(namespace = %requirement.namespace, "Adding requirement");
            target.push(requirement.clone());
        }
    }
}

/// Append source capabilities not already present in `target`
pub fn merge_capabilities(target: &mut Vec<Capability>, source: &[Capability]) {
    for capability in source {
        if !target.contains(capability) {
            trace!(namespace = %capability.namespace, "Adding capability");
            target.push(capability.clone());
        }
    }
}
