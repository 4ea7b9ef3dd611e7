//! Handler protocol for custom extension types
//!
//! External code can take over merging of specific extensions by registering
//! a [`MergeHandler`], and can finalize the merged feature with a
//! [`PostProcessHandler`]. Handlers are consulted in registration order; for
//! merging, the first handler whose [`MergeHandler::can_merge`] returns true
//! owns that extension.
//!
//! Each handler receives a [`HandlerContext`] carrying the artifact provider
//! and its resolved configuration: options registered under `*` overlaid by
//! options registered under the handler's own name.

use crate::artifact::ArtifactId;
use crate::errors::Result;
use crate::extension::Extension;
use crate::feature::Feature;
use indexmap::IndexMap;
use std::path::PathBuf;

/// Configuration key applying to every handler
pub const ALL_HANDLERS: &str = "*";

/// Lookup of artifact content, passed through to handlers untouched
pub trait ArtifactProvider: Send + Sync {
    /// Local path of the artifact's content, if it can be provided
    fn provide(&self, id: &ArtifactId) -> Option<PathBuf>;
}

/// Context handed to every handler invocation
pub struct HandlerContext<'a> {
    artifact_provider: Option<&'a dyn ArtifactProvider>,
    configuration: IndexMap<String, String>,
}

impl<'a> HandlerContext<'a> {
    pub fn new(
        artifact_provider: Option<&'a dyn ArtifactProvider>,
        configuration: IndexMap<String, String>,
    ) -> Self {
        Self {
            artifact_provider,
            configuration,
        }
    }

    pub fn artifact_provider(&self) -> Option<&'a dyn ArtifactProvider> {
        self.artifact_provider
    }

    /// Resolved handler configuration
    pub fn configuration(&self) -> &IndexMap<String, String> {
        &self.configuration
    }

    pub fn config_value(&self, key: &str) -> Option<&str> {
        self.configuration.get(key).map(String::as_str)
    }
}

impl std::fmt::Debug for HandlerContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerContext")
            .field("artifact_provider", &self.artifact_provider.is_some())
            .field("configuration", &self.configuration)
            .finish()
    }
}

/// Custom merge logic for extensions
pub trait MergeHandler: Send + Sync {
    /// Registration name, also the key of the handler's configuration
    fn name(&self) -> &str;

    /// Whether this handler owns merging of `extension`
    fn can_merge(&self, extension: &Extension) -> bool;

    /// Merge `incoming` from `source` into `target`
    ///
    /// `existing` is the same-named extension that was in `target` before
    /// this merge pass started, or `None` when the extension is seen for the
    /// first time. The handler writes its result into `target` itself.
    fn merge(
        &self,
        ctx: &HandlerContext<'_>,
        target: &mut Feature,
        source: &Feature,
        existing: Option<&Extension>,
        incoming: &Extension,
    ) -> Result<()>;
}

/// Finalization of a merged feature, called once per extension
pub trait PostProcessHandler: Send + Sync {
    /// Registration name, also the key of the handler's configuration
    fn name(&self) -> &str;

    fn post_process(
        &self,
        ctx: &HandlerContext<'_>,
        feature: &mut Feature,
        extension: &Extension,
    ) -> Result<()>;
}

/// Per-handler option maps keyed by handler name or [`ALL_HANDLERS`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerConfigurations {
    entries: IndexMap<String, IndexMap<String, String>>,
}

impl HandlerConfigurations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one option for `handler` (or `*`)
    pub fn set(&mut self, handler: &str, key: &str, value: &str) {
        self.entries
            .entry(handler.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    /// Add every option of `options` for `handler`, replacing existing keys
    pub fn extend(&mut self, handler: &str, options: IndexMap<String, String>) {
        self.entries
            .entry(handler.to_string())
            .or_default()
            .extend(options);
    }

    /// Effective configuration for the handler registered as `name`
    pub fn resolve(&self, name: &str) -> IndexMap<String, String> {
        let mut resolved = self.entries.get(ALL_HANDLERS).cloned().unwrap_or_default();
        if name != ALL_HANDLERS {
            if let Some(specific) = self.entries.get(name) {
                resolved.extend(specific.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        resolved
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<IndexMap<String, IndexMap<String, String>>> for HandlerConfigurations {
    fn from(entries: IndexMap<String, IndexMap<String, String>>) -> Self {
        Self { entries }
    }
}
