//! Merge settings
//!
//! Settings that drive a merge can be kept in a TOML file next to the feature
//! descriptors:
//!
//! ```toml
//! artifact-overrides = ["org.example:api:HIGHEST", "*:*:LATEST"]
//! origin-key = "feature-origins"
//!
//! [variables]
//! port = "8080"
//!
//! [framework-properties]
//! "org.osgi.framework.bootdelegation" = "sun.*"
//!
//! [handlers."*"]
//! strict = "false"
//!
//! [handlers.api-regions]
//! strict = "true"
//! ```
//!
//! Settings layer: [`MergeSettings::layer`] puts an overlay (typically built
//! from command line flags) on top of a base (typically the file).

use crate::context::BuilderContext;
use crate::errors::{ConfigError, Result};
use crate::handler::HandlerConfigurations;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, instrument};

/// Merge settings loaded from TOML and/or command line flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct MergeSettings {
    /// Override rules in evaluation order
    pub artifact_overrides: Vec<String>,

    /// Metadata key used to record artifact origin
    pub origin_key: Option<String>,

    /// Context overrides for feature variables
    pub variables: IndexMap<String, String>,

    /// Context overrides for framework properties
    pub framework_properties: IndexMap<String, String>,

    /// Handler options by handler name, `*` for all handlers
    pub handlers: IndexMap<String, IndexMap<String, String>>,
}

impl MergeSettings {
    /// Parse settings from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            ConfigError::Parsing {
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Load settings from a TOML file
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            debug!("Failed to read merge settings: {}", e);
            ConfigError::Io(e)
        })?;
        let settings = Self::from_toml_str(&content)?;
        debug!(
            rules = settings.artifact_overrides.len(),
            handlers = settings.handlers.len(),
            "Loaded merge settings"
        );
        Ok(settings)
    }

    /// Put `overlay` on top of `self`
    ///
    /// - override rules of the overlay are evaluated first
    /// - scalar settings: overlay wins when set
    /// - maps: overlay entries replace base entries key by key
    pub fn layer(self, overlay: MergeSettings) -> MergeSettings {
        let mut artifact_overrides = overlay.artifact_overrides;
        artifact_overrides.extend(self.artifact_overrides);

        let mut variables = self.variables;
        variables.extend(overlay.variables);

        let mut framework_properties = self.framework_properties;
        framework_properties.extend(overlay.framework_properties);

        let mut handlers = self.handlers;
        for (name, options) in overlay.handlers {
            handlers.entry(name).or_default().extend(options);
        }

        MergeSettings {
            artifact_overrides,
            origin_key: overlay.origin_key.or(self.origin_key),
            variables,
            framework_properties,
            handlers,
        }
    }

    /// Build a merge context, parsing the override rules once
    pub fn into_context(self) -> Result<BuilderContext> {
        let mut ctx = BuilderContext::new()
            .with_override_rules(&self.artifact_overrides)?
            .with_handler_configurations(HandlerConfigurations::from(self.handlers));
        if let Some(key) = &self.origin_key {
            ctx = ctx.with_origin_key(key);
        }
        for (key, value) in &self.variables {
            ctx = ctx.with_variable(key, Some(value.as_str()));
        }
        for (key, value) in &self.framework_properties {
            ctx = ctx.with_framework_property(key, value);
        }
        Ok(ctx)
    }
}
