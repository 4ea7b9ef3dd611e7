//! Runtime configurations
//!
//! A configuration is a PID plus a property map. Merging is keyed by PID: a
//! source configuration overwrites matching target properties key by key, and
//! a configuration with an unknown PID is appended as a copy.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// A configuration identified by its PID
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub pid: String,
    #[serde(default)]
    pub properties: IndexMap<String, Value>,
}

impl Configuration {
    pub fn new(pid: &str) -> Self {
        Self {
            pid: pid.to_string(),
            properties: IndexMap::new(),
        }
    }

    /// Set a property, builder style
    pub fn with_property(mut self, key: &str, value: Value) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }
}

/// Ordered set of configurations, unique by PID
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configurations(Vec<Configuration>);

impl Configurations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, configuration: Configuration) {
        self.0.push(configuration);
    }

    pub fn get(&self, pid: &str) -> Option<&Configuration> {
        self.0.iter().find(|c| c.pid == pid)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Configuration> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Configuration>> for Configurations {
    fn from(configurations: Vec<Configuration>) -> Self {
        Self(configurations)
    }
}

/// Merge `source` configurations into `target`
pub fn merge_configurations(target: &mut Configurations, source: &Configurations) {
    for configuration in source.iter() {
        match target.0.iter_mut().find(|c| c.pid == configuration.pid) {
            Some(current) => {
                debug!(pid = %configuration.pid, "Overriding configuration properties");
                for (key, value) in &configuration.properties {
                    current.properties.insert(key.clone(), value.clone());
                }
            }
            None => target.push(configuration.clone()),
        }
    }
}
