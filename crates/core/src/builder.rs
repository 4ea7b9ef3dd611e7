//! Feature merge orchestration
//!
//! [`merge_feature`] folds one source feature into a target. The parts are
//! merged in a fixed order: variables, bundles, configurations, framework
//! properties, requirements, capabilities, then extensions. Extensions go
//! through the registered merge handlers before falling back to the default
//! kind-based merge.
//!
//! [`FeatureBuilder::assemble`] folds a list of features left to right into a
//! fresh feature and runs the post-process pass once at the end.

use crate::artifact::ArtifactId;
use crate::bundles::{merge_bundles, ArtifactMergeOptions};
use crate::configuration::merge_configurations;
use crate::context::BuilderContext;
use crate::errors::{MergeError, Result};
use crate::extension::{merge_extension, Extension};
use crate::feature::{merge_capabilities, merge_requirements, Feature};
use crate::properties::{merge_framework_properties, merge_variables};
use tracing::{debug, info, instrument, trace};

/// Merge the extensions of `source` into `target`
///
/// Same-named extensions must share a kind. Every source extension, found in
/// `target` or not, is first offered to the merge handlers in registration
/// order; the first one that claims it does the merge. Unclaimed extensions
/// are merged by kind, or appended when `target` has none of that name.
pub fn merge_extensions(
    target: &mut Feature,
    source: &Feature,
    ctx: &BuilderContext,
) -> Result<()> {
    let options = ArtifactMergeOptions::new(
        Some(&source.id),
        ctx.artifact_overrides(),
        ctx.origin_key(),
    );

    // Handlers may rewrite target extensions while we scan
    let snapshot: Vec<Extension> = target.extensions.clone();

    for incoming in &source.extensions {
        let existing = snapshot.iter().find(|e| e.name() == incoming.name());
        if let Some(existing) = existing {
            if existing.kind() != incoming.kind() {
                return Err(MergeError::ExtensionKindMismatch {
                    name: incoming.name().to_string(),
                    target_kind: existing.kind().to_string(),
                    source_kind: incoming.kind().to_string(),
                }
                .into());
            }
        }

        if let Some(handler) = ctx.merge_handlers().iter().find(|h| h.can_merge(incoming)) {
            debug!(
                handler = handler.name(),
                extension = incoming.name(),
                first_sight = existing.is_none(),
                "Extension claimed by merge handler"
            );
            let handler_ctx = ctx.handler_context(handler.name());
            handler.merge(&handler_ctx, target, source, existing, incoming)?;
            continue;
        }

        match target.extension_mut(incoming.name()) {
            Some(current) => merge_extension(current, incoming, &options)?,
            None => {
                trace!(extension = incoming.name(), "Adopting extension");
                target.extensions.push(incoming.clone());
            }
        }
    }

    Ok(())
}

/// Offer every extension of `feature` to every post-process handler
pub fn post_process(feature: &mut Feature, ctx: &BuilderContext) -> Result<()> {
    if ctx.post_process_handlers().is_empty() {
        return Ok(());
    }

    let names: Vec<String> = feature
        .extensions
        .iter()
        .map(|e| e.name().to_string())
        .collect();
    for name in &names {
        for handler in ctx.post_process_handlers() {
            // Each handler sees what earlier handlers left behind
            let Some(extension) = feature.extension(name).cloned() else {
                trace!(extension = %name, "Extension removed during post-processing");
                break;
            };
            trace!(
                handler = handler.name(),
                extension = %name,
                "Post-processing extension"
            );
            let handler_ctx = ctx.handler_context(handler.name());
            handler.post_process(&handler_ctx, feature, &extension)?;
        }
    }
    Ok(())
}

/// Merge `source` into `target`
///
/// On error `target` is left as it was before the call.
#[instrument(skip_all, fields(target = %target.id, source = %source.id))]
pub fn merge_feature(target: &mut Feature, source: &Feature, ctx: &BuilderContext) -> Result<()> {
    let mut result = target.clone();
    let options = ArtifactMergeOptions::new(
        Some(&source.id),
        ctx.artifact_overrides(),
        ctx.origin_key(),
    );

    merge_variables(&mut result.variables, &source.variables, Some(ctx.variables()))?;
    merge_bundles(&mut result.bundles, &source.bundles, &options)?;
    merge_configurations(&mut result.configurations, &source.configurations);
    merge_framework_properties(
        &mut result.framework_properties,
        &source.framework_properties,
        Some(ctx.framework_properties()),
    )?;
    merge_requirements(&mut result.requirements, &source.requirements);
    merge_capabilities(&mut result.capabilities, &source.capabilities);
    merge_extensions(&mut result, source, ctx)?;

    debug!(
        bundles = result.bundles.len(),
        configurations = result.configurations.len(),
        extensions = result.extensions.len(),
        "Merged feature"
    );
    *target = result;
    Ok(())
}

/// Assembles features under a [`BuilderContext`]
#[derive(Debug)]
pub struct FeatureBuilder {
    context: BuilderContext,
}

impl FeatureBuilder {
    pub fn new(context: BuilderContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &BuilderContext {
        &self.context
    }

    /// Fold `features` in order into a new feature with the given id
    ///
    /// Post-processing runs once, after the last feature has been merged.
    #[instrument(skip_all, fields(id = %id, count = features.len()))]
    pub fn assemble(&self, id: ArtifactId, features: &[Feature]) -> Result<Feature> {
        let mut result = Feature::new(id);
        for (i, feature) in features.iter().enumerate() {
            debug!("Merging feature {} of {}: {}", i + 1, features.len(), feature.id);
            merge_feature(&mut result, feature, &self.context)?;
        }
        post_process(&mut result, &self.context)?;
        info!(
            "Assembled {} from {} features ({} bundles)",
            result.id,
            features.len(),
            result.bundles.len()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Artifact;
    use crate::errors::FeatmergeError;
    use crate::handler::{HandlerContext, MergeHandler, PostProcessHandler};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn id(value: &str) -> ArtifactId {
        ArtifactId::from_mvn_id(value).unwrap()
    }

    fn feature(value: &str) -> Feature {
        Feature::new(id(value))
    }

    /// Replaces the text of any extension named `name` with `claimed`
    struct Claiming {
        name: &'static str,
        calls: Arc<AtomicUsize>,
    }

    impl MergeHandler for Claiming {
        fn name(&self) -> &str {
            "claiming"
        }

        fn can_merge(&self, extension: &Extension) -> bool {
            extension.name() == self.name
        }

        fn merge(
            &self,
            _ctx: &HandlerContext<'_>,
            target: &mut Feature,
            _source: &Feature,
            _existing: Option<&Extension>,
            incoming: &Extension,
        ) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            target.set_extension(Extension::text(incoming.name(), "claimed"));
            Ok(())
        }
    }

    #[test]
    fn test_unclaimed_extension_is_appended() {
        let mut target = feature("g:t:1");
        let mut source = feature("g:s:1");
        source.extensions.push(Extension::text("notes", "hello"));

        merge_extensions(&mut target, &source, &BuilderContext::new()).unwrap();
        assert_eq!(target.extension("notes").and_then(|e| e.as_text()), Some("hello"));
    }

    #[test]
    fn test_handler_claims_on_first_sight() {
        let calls = Arc::new(AtomicUsize::new(0));
        let ctx = BuilderContext::new().with_merge_handler(Box::new(Claiming {
            name: "foo",
            calls: calls.clone(),
        }));
        let mut target = feature("g:t:1");
        let mut source = feature("g:s:1");
        source.extensions.push(Extension::text("foo", "x"));
        source.extensions.push(Extension::text("bar", "y"));

        merge_extensions(&mut target, &source, &ctx).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(target.extension("foo").and_then(|e| e.as_text()), Some("claimed"));
        assert_eq!(target.extension("bar").and_then(|e| e.as_text()), Some("y"));
    }

    /// Claims `foo` and writes a `bar` extension into the target
    struct Injecting;

    impl MergeHandler for Injecting {
        fn name(&self) -> &str {
            "injecting"
        }

        fn can_merge(&self, extension: &Extension) -> bool {
            extension.name() == "foo"
        }

        fn merge(
            &self,
            _ctx: &HandlerContext<'_>,
            target: &mut Feature,
            _source: &Feature,
            _existing: Option<&Extension>,
            incoming: &Extension,
        ) -> Result<()> {
            target.set_extension(incoming.clone());
            target.set_extension(Extension::text("bar", "injected"));
            Ok(())
        }
    }

    #[test]
    fn test_extension_added_by_handler_is_merged_not_duplicated() {
        let ctx = BuilderContext::new().with_merge_handler(Box::new(Injecting));
        let mut target = feature("g:t:1");
        let mut source = feature("g:s:1");
        source.extensions.push(Extension::text("foo", "f"));
        source.extensions.push(Extension::text("bar", "src"));

        merge_extensions(&mut target, &source, &ctx).unwrap();
        let extensions: Vec<(&str, Option<&str>)> = target
            .extensions
            .iter()
            .map(|e| (e.name(), e.as_text()))
            .collect();
        assert_eq!(
            extensions,
            vec![("foo", Some("f")), ("bar", Some("injected\nsrc"))]
        );
    }

    /// Rewrites the text of every extension it sees
    struct Rewrite;

    impl PostProcessHandler for Rewrite {
        fn name(&self) -> &str {
            "rewrite"
        }

        fn post_process(
            &self,
            _ctx: &HandlerContext<'_>,
            feature: &mut Feature,
            extension: &Extension,
        ) -> Result<()> {
            feature.set_extension(Extension::text(extension.name(), "rewritten"));
            Ok(())
        }
    }

    /// Records the text it is handed
    struct Observe(Arc<Mutex<Vec<String>>>);

    impl PostProcessHandler for Observe {
        fn name(&self) -> &str {
            "observe"
        }

        fn post_process(
            &self,
            _ctx: &HandlerContext<'_>,
            _feature: &mut Feature,
            extension: &Extension,
        ) -> Result<()> {
            if let Some(text) = extension.as_text() {
                self.0.lock().unwrap().push(text.to_string());
            }
            Ok(())
        }
    }

    /// Removes every extension it sees
    struct Remove;

    impl PostProcessHandler for Remove {
        fn name(&self) -> &str {
            "remove"
        }

        fn post_process(
            &self,
            _ctx: &HandlerContext<'_>,
            feature: &mut Feature,
            extension: &Extension,
        ) -> Result<()> {
            feature.extensions.retain(|e| e.name() != extension.name());
            Ok(())
        }
    }

    #[test]
    fn test_post_process_hands_over_current_extension() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let ctx = BuilderContext::new()
            .with_post_process_handler(Box::new(Rewrite))
            .with_post_process_handler(Box::new(Observe(seen.clone())));
        let mut feature = feature("g:t:1");
        feature.extensions.push(Extension::text("t", "orig"));

        post_process(&mut feature, &ctx).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["rewritten".to_string()]);
    }

    #[test]
    fn test_post_process_skips_removed_extension() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let ctx = BuilderContext::new()
            .with_post_process_handler(Box::new(Remove))
            .with_post_process_handler(Box::new(Observe(seen.clone())));
        let mut feature = feature("g:t:1");
        feature.extensions.push(Extension::text("t", "orig"));

        post_process(&mut feature, &ctx).unwrap();
        assert!(seen.lock().unwrap().is_empty());
        assert!(feature.extensions.is_empty());
    }

    #[test]
    fn test_kind_mismatch_is_checked_before_handlers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let ctx = BuilderContext::new().with_merge_handler(Box::new(Claiming {
            name: "foo",
            calls: calls.clone(),
        }));
        let mut target = feature("g:t:1");
        target.extensions.push(Extension::json("foo", "{}"));
        let mut source = feature("g:s:1");
        source.extensions.push(Extension::text("foo", "x"));

        let err = merge_extensions(&mut target, &source, &ctx).unwrap_err();
        assert!(matches!(
            err,
            FeatmergeError::Merge(MergeError::ExtensionKindMismatch { .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_merge_leaves_target_untouched() {
        let mut target = feature("g:t:1");
        target.bundles.push(Artifact::new(id("g:a:1")));
        target.framework_properties.insert("p".into(), "1".into());
        let before = target.clone();

        let mut source = feature("g:s:1");
        source.bundles.push(Artifact::new(id("g:b:1")));
        source.framework_properties.insert("p".into(), "2".into());

        assert!(merge_feature(&mut target, &source, &BuilderContext::new()).is_err());
        assert_eq!(target, before);
    }

    #[test]
    fn test_assemble_stamps_origin_with_source_id() {
        let builder = FeatureBuilder::new(BuilderContext::new().with_origin_key("origin"));
        let mut a = feature("g:a-feature:1");
        a.bundles.push(Artifact::new(id("g:bundle:1")));

        let result = builder.assemble(id("g:assembled:1"), &[a]).unwrap();
        let bundle = result.bundles.artifacts().iter().next().unwrap();
        assert_eq!(bundle.metadata()["origin"], "g:a-feature:1");
        assert_eq!(result.id.to_mvn_id(), "g:assembled:1");
    }
}
