//! Builder context
//!
//! Everything a merge needs besides the features themselves: override rules,
//! the origin key, context overrides for variables and framework properties,
//! the registered handlers with their configuration, and the artifact provider
//! passed through to them.

use crate::errors::Result;
use crate::handler::{
    ArtifactProvider, HandlerConfigurations, HandlerContext, MergeHandler, PostProcessHandler,
};
use crate::override_rule::OverrideRule;
use indexmap::IndexMap;
use tracing::{debug, warn};

/// Inputs for merging features
pub struct BuilderContext {
    artifact_provider: Option<Box<dyn ArtifactProvider>>,
    artifact_overrides: Vec<OverrideRule>,
    origin_key: Option<String>,
    variables: IndexMap<String, Option<String>>,
    framework_properties: IndexMap<String, String>,
    handler_configurations: HandlerConfigurations,
    merge_handlers: Vec<Box<dyn MergeHandler>>,
    post_process_handlers: Vec<Box<dyn PostProcessHandler>>,
}

impl BuilderContext {
    /// Create an empty context with no rules, overrides or handlers
    pub fn new() -> Self {
        Self {
            artifact_provider: None,
            artifact_overrides: Vec::new(),
            origin_key: None,
            variables: IndexMap::new(),
            framework_properties: IndexMap::new(),
            handler_configurations: HandlerConfigurations::new(),
            merge_handlers: Vec::new(),
            post_process_handlers: Vec::new(),
        }
    }

    pub fn with_artifact_provider(mut self, provider: Box<dyn ArtifactProvider>) -> Self {
        self.artifact_provider = Some(provider);
        self
    }

    /// Append already parsed override rules, keeping evaluation order
    pub fn with_artifact_overrides(mut self, rules: Vec<OverrideRule>) -> Self {
        self.artifact_overrides.extend(rules);
        self
    }

    /// Parse and append override rules
    pub fn with_override_rules<S: AsRef<str>>(self, rules: &[S]) -> Result<Self> {
        let parsed = OverrideRule::parse_all(rules)?;
        debug!(count = parsed.len(), "Parsed artifact override rules");
        Ok(self.with_artifact_overrides(parsed))
    }

    pub fn with_origin_key(mut self, key: &str) -> Self {
        self.origin_key = Some(key.to_string());
        self
    }

    /// Force the value of a variable, whatever the features declare
    pub fn with_variable(mut self, key: &str, value: Option<&str>) -> Self {
        self.variables
            .insert(key.to_string(), value.map(str::to_string));
        self
    }

    /// Force the value of a framework property, whatever the features declare
    pub fn with_framework_property(mut self, key: &str, value: &str) -> Self {
        self.framework_properties
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_handler_configurations(mut self, configurations: HandlerConfigurations) -> Self {
        self.handler_configurations = configurations;
        self
    }

    /// Register a merge handler; earlier registrations take priority
    pub fn with_merge_handler(mut self, handler: Box<dyn MergeHandler>) -> Self {
        if self
            .merge_handlers
            .iter()
            .any(|h| h.name() == handler.name())
        {
            warn!("Merge handler with name '{}' already registered", handler.name());
        }
        self.merge_handlers.push(handler);
        self
    }

    /// Register a post-process handler
    pub fn with_post_process_handler(mut self, handler: Box<dyn PostProcessHandler>) -> Self {
        if self
            .post_process_handlers
            .iter()
            .any(|h| h.name() == handler.name())
        {
            warn!(
                "Post-process handler with name '{}' already registered",
                handler.name()
            );
        }
        self.post_process_handlers.push(handler);
        self
    }

    pub fn artifact_overrides(&self) -> &[OverrideRule] {
        &self.artifact_overrides
    }

    pub fn origin_key(&self) -> Option<&str> {
        self.origin_key.as_deref()
    }

    pub fn variables(&self) -> &IndexMap<String, Option<String>> {
        &self.variables
    }

    pub fn framework_properties(&self) -> &IndexMap<String, String> {
        &self.framework_properties
    }

    pub fn handler_configurations(&self) -> &HandlerConfigurations {
        &self.handler_configurations
    }

    pub fn merge_handlers(&self) -> &[Box<dyn MergeHandler>] {
        &self.merge_handlers
    }

    pub fn post_process_handlers(&self) -> &[Box<dyn PostProcessHandler>] {
        &self.post_process_handlers
    }

    /// Context for the handler registered as `handler_name`
    pub fn handler_context(&self, handler_name: &str) -> HandlerContext<'_> {
        HandlerContext::new(
            self.artifact_provider.as_deref(),
            self.handler_configurations.resolve(handler_name),
        )
    }
}

impl Default for BuilderContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BuilderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |names: Vec<&str>| names.join(", ");
        f.debug_struct("BuilderContext")
            .field("artifact_overrides", &self.artifact_overrides)
            .field("origin_key", &self.origin_key)
            .field("variables", &self.variables)
            .field("framework_properties", &self.framework_properties)
            .field("handler_configurations", &self.handler_configurations)
            .field(
                "merge_handlers",
                &names(self.merge_handlers.iter().map(|h| h.name()).collect()),
            )
            .field(
                "post_process_handlers",
                &names(self.post_process_handlers.iter().map(|h| h.name()).collect()),
            )
            .finish()
    }
}
