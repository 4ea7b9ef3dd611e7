//! End-to-end feature assembly through the public API

use featmerge_core::artifact::{Artifact, ArtifactId, Artifacts, START_ORDER_KEY};
use featmerge_core::errors::{FeatmergeError, HandlerError, MergeError};
use featmerge_core::extension::Extension;
use featmerge_core::handler::{HandlerContext, MergeHandler, PostProcessHandler};
use featmerge_core::{BuilderContext, Feature, FeatureBuilder, Result};
use serde_json::json;
use std::sync::{Arc, Mutex};

const ORIGIN: &str = "feature-origins";

fn id(value: &str) -> ArtifactId {
    ArtifactId::from_mvn_id(value).unwrap()
}

fn bundle(value: &str) -> Artifact {
    Artifact::new(id(value))
}

fn feature(value: &str) -> Feature {
    Feature::new(id(value))
}

fn bundle_ids(feature: &Feature) -> Vec<String> {
    feature
        .bundles
        .artifacts()
        .iter()
        .map(|a| a.id().to_mvn_id())
        .collect()
}

/// Records every call, claims extensions with a given name
struct RecordingMerge {
    claims: &'static str,
    seen: Arc<Mutex<Vec<(String, bool)>>>,
}

impl MergeHandler for RecordingMerge {
    fn name(&self) -> &str {
        "recording"
    }

    fn can_merge(&self, extension: &Extension) -> bool {
        extension.name() == self.claims
    }

    fn merge(
        &self,
        ctx: &HandlerContext<'_>,
        target: &mut Feature,
        _source: &Feature,
        existing: Option<&Extension>,
        incoming: &Extension,
    ) -> Result<()> {
        self.seen
            .lock()
            .unwrap()
            .push((incoming.name().to_string(), existing.is_some()));
        let prefix = ctx.config_value("prefix").unwrap_or("");
        let previous = existing.and_then(|e| e.as_text()).unwrap_or("");
        let text = format!("{}{}[{}]", prefix, previous, incoming.as_text().unwrap_or(""));
        target.set_extension(Extension::text(incoming.name(), &text));
        Ok(())
    }
}

struct RecordingPostProcess {
    seen: Arc<Mutex<Vec<String>>>,
}

impl PostProcessHandler for RecordingPostProcess {
    fn name(&self) -> &str {
        "post"
    }

    fn post_process(
        &self,
        _ctx: &HandlerContext<'_>,
        _feature: &mut Feature,
        extension: &Extension,
    ) -> Result<()> {
        self.seen.lock().unwrap().push(extension.name().to_string());
        Ok(())
    }
}

struct Rejecting;

impl PostProcessHandler for Rejecting {
    fn name(&self) -> &str {
        "rejecting"
    }

    fn post_process(
        &self,
        _ctx: &HandlerContext<'_>,
        _feature: &mut Feature,
        extension: &Extension,
    ) -> Result<()> {
        Err(HandlerError::Failed {
            handler: self.name().to_string(),
            extension: extension.name().to_string(),
            message: "not allowed".to_string(),
        }
        .into())
    }
}

#[test]
fn test_framework_properties_fold_left_to_right() {
    let mut a = feature("g:a:1");
    a.framework_properties.insert("a".into(), "1".into());
    let mut b = feature("g:b:1");
    b.framework_properties.insert("b".into(), "2".into());
    let mut c = feature("g:c:1");
    c.framework_properties.insert("a".into(), "1".into());
    c.framework_properties.insert("c".into(), "3".into());

    let result = FeatureBuilder::new(BuilderContext::new())
        .assemble(id("g:out:1"), &[a, b, c])
        .unwrap();
    let keys: Vec<(&str, &str)> = result
        .framework_properties
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    assert_eq!(keys, vec![("a", "1"), ("b", "2"), ("c", "3")]);
}

#[test]
fn test_context_override_resolves_property_conflict() {
    let mut a = feature("g:a:1");
    a.framework_properties.insert("x".into(), "1".into());
    let mut b = feature("g:b:1");
    b.framework_properties.insert("x".into(), "2".into());

    let builder = FeatureBuilder::new(BuilderContext::new());
    let err = builder
        .assemble(id("g:out:1"), &[a.clone(), b.clone()])
        .unwrap_err();
    assert!(err.to_string().contains("Can't merge Property 'x'"));

    let builder = FeatureBuilder::new(BuilderContext::new().with_framework_property("x", "9"));
    let result = builder.assemble(id("g:out:1"), &[a, b]).unwrap();
    assert_eq!(result.framework_properties["x"], "9");
}

#[test]
fn test_highest_rule_picks_higher_osgi_version() {
    for (left, right, expected) in [
        ("g:lib:1.0.0", "g:lib:1.0.1", "g:lib:1.0.1"),
        ("g:lib:2.0.0", "g:lib:1.9.9", "g:lib:2.0.0"),
        ("g:lib:1.10.0", "g:lib:1.9.0", "g:lib:1.10.0"),
    ] {
        let mut a = feature("g:a:1");
        a.bundles.push(bundle(left));
        let mut b = feature("g:b:1");
        b.bundles.push(bundle(right));

        let ctx = BuilderContext::new()
            .with_override_rules(&["g:lib:HIGHEST"])
            .unwrap();
        let result = FeatureBuilder::new(ctx)
            .assemble(id("g:out:1"), &[a, b])
            .unwrap();
        assert_eq!(bundle_ids(&result), vec![expected]);
    }
}

#[test]
fn test_same_bundle_in_two_features_is_kept_once() {
    let mut a = feature("g:a:1");
    a.bundles.push(bundle("g:lib:1"));
    let mut b = feature("g:b:1");
    b.bundles.push(bundle("g:lib:1"));

    let result = FeatureBuilder::new(BuilderContext::new().with_origin_key(ORIGIN))
        .assemble(id("g:out:1"), &[a, b])
        .unwrap();
    assert_eq!(bundle_ids(&result), vec!["g:lib:1"]);
}

#[test]
fn test_feature_may_declare_two_versions_of_a_bundle() {
    let mut a = feature("g:a:1");
    a.bundles.push(bundle("g:lib:1"));
    a.bundles.push(bundle("g:lib:2"));

    let result = FeatureBuilder::new(BuilderContext::new().with_origin_key(ORIGIN))
        .assemble(id("g:out:1"), &[a])
        .unwrap();
    assert_eq!(bundle_ids(&result), vec!["g:lib:1", "g:lib:2"]);
    for artifact in result.bundles.artifacts() {
        assert_eq!(artifact.metadata()[ORIGIN], "g:a:1");
    }
}

#[test]
fn test_highest_keeps_top_version_declared_side_by_side() {
    let mut a = feature("g:fa:1");
    a.bundles.push(bundle("g:lib:1"));
    a.bundles.push(bundle("g:lib:5"));
    let mut b = feature("g:fb:1");
    b.bundles.push(bundle("g:lib:3"));

    let ctx = BuilderContext::new()
        .with_origin_key(ORIGIN)
        .with_override_rules(&["g:lib:HIGHEST"])
        .unwrap();
    let result = FeatureBuilder::new(ctx)
        .assemble(id("g:out:1"), &[a, b])
        .unwrap();
    assert_eq!(bundle_ids(&result), vec!["g:lib:5"]);
}

#[test]
fn test_bundles_merge_by_start_order_bucket() {
    let mut a = feature("g:a:1");
    a.bundles.push(bundle("g:late:1").with_metadata(START_ORDER_KEY, "20"));
    a.bundles.push(bundle("g:early:1").with_metadata(START_ORDER_KEY, "1"));
    a.bundles.push(bundle("g:default:1"));

    let result = FeatureBuilder::new(BuilderContext::new())
        .assemble(id("g:out:1"), &[a])
        .unwrap();
    assert_eq!(
        bundle_ids(&result),
        vec!["g:default:1", "g:early:1", "g:late:1"]
    );
}

#[test]
fn test_version_rule_synthesizes_artifact_without_metadata() {
    let mut a = feature("g:a:1");
    a.bundles
        .push(bundle("g:lib:1").with_metadata(START_ORDER_KEY, "5"));
    let mut b = feature("g:b:1");
    b.bundles
        .push(bundle("g:lib:2").with_metadata(START_ORDER_KEY, "5"));

    let ctx = BuilderContext::new()
        .with_override_rules(&["g:lib:3"])
        .unwrap();
    let result = FeatureBuilder::new(ctx)
        .assemble(id("g:out:1"), &[a, b])
        .unwrap();
    let bundles: Vec<&Artifact> = result.bundles.artifacts().iter().collect();
    assert_eq!(bundles.len(), 1);
    assert_eq!(bundles[0].id().to_mvn_id(), "g:lib:3");
    assert!(bundles[0].metadata().is_empty());
}

#[test]
fn test_text_extensions_concatenate() {
    let mut a = feature("g:a:1");
    a.extensions.push(Extension::text("repoinit", "A"));
    let mut b = feature("g:b:1");
    b.extensions.push(Extension::text("repoinit", "B"));

    let result = FeatureBuilder::new(BuilderContext::new())
        .assemble(id("g:out:1"), &[a, b])
        .unwrap();
    assert_eq!(
        result.extension("repoinit").and_then(|e| e.as_text()),
        Some("A\nB")
    );
}

#[test]
fn test_json_extensions_merge_structurally() {
    let mut a = feature("g:a:1");
    a.extensions.push(Extension::json("list", "[1,2]"));
    a.extensions
        .push(Extension::json("obj", r#"{"a":1,"b":{"c":1}}"#));
    let mut b = feature("g:b:1");
    b.extensions.push(Extension::json("list", "[3,4]"));
    b.extensions
        .push(Extension::json("obj", r#"{"b":{"d":2},"e":5}"#));

    let result = FeatureBuilder::new(BuilderContext::new())
        .assemble(id("g:out:1"), &[a, b])
        .unwrap();
    let value = |name: &str| result.extension(name).unwrap().json_value().unwrap();
    assert_eq!(value("list"), Some(json!([1, 2, 3, 4])));
    assert_eq!(value("obj"), Some(json!({"a": 1, "b": {"c": 1, "d": 2}, "e": 5})));
}

#[test]
fn test_json_shape_mismatch_aborts_assembly() {
    let mut a = feature("g:a:1");
    a.extensions.push(Extension::json("api-regions", "[]"));
    let mut b = feature("g:b:1");
    b.extensions.push(Extension::json("api-regions", "{}"));

    let err = FeatureBuilder::new(BuilderContext::new())
        .assemble(id("g:out:1"), &[a, b])
        .unwrap_err();
    assert!(matches!(
        err,
        FeatmergeError::Merge(MergeError::PayloadShapeMismatch { .. })
    ));
}

#[test]
fn test_artifact_list_extension_is_stamped_with_origin() {
    let mut a = feature("g:a:1");
    a.extensions.push(Extension::artifacts(
        "content-packages",
        Artifacts::from(vec![bundle("g:pkg:zip:1")]),
    ));
    let mut b = feature("g:b:1");
    b.extensions.push(Extension::artifacts(
        "content-packages",
        Artifacts::from(vec![bundle("g:other:zip:1")]),
    ));

    let result = FeatureBuilder::new(BuilderContext::new().with_origin_key(ORIGIN))
        .assemble(id("g:out:1"), &[a, b])
        .unwrap();
    let artifacts = result
        .extension("content-packages")
        .and_then(|e| e.as_artifacts())
        .unwrap();
    let origins: Vec<(String, Option<&String>)> = artifacts
        .iter()
        .map(|a| (a.id().to_mvn_id(), a.metadata().get(ORIGIN)))
        .collect();
    // the first feature's list is adopted as-is, only merged entries are stamped
    assert_eq!(
        origins,
        vec![
            ("g:pkg:zip:1".to_string(), None),
            ("g:other:zip:1".to_string(), Some(&"g:b:1".to_string())),
        ]
    );
}

#[test]
fn test_merge_handler_preferred_even_on_first_sight() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut configs = featmerge_core::handler::HandlerConfigurations::new();
    configs.set("*", "prefix", "");
    configs.set("recording", "prefix", ">");
    let ctx = BuilderContext::new()
        .with_handler_configurations(configs)
        .with_merge_handler(Box::new(RecordingMerge {
            claims: "foo",
            seen: seen.clone(),
        }));

    let mut a = feature("g:a:1");
    a.extensions.push(Extension::text("foo", "1"));
    let mut b = feature("g:b:1");
    b.extensions.push(Extension::text("foo", "2"));

    let result = FeatureBuilder::new(ctx)
        .assemble(id("g:out:1"), &[a, b])
        .unwrap();
    assert_eq!(
        *seen.lock().unwrap(),
        vec![("foo".to_string(), false), ("foo".to_string(), true)]
    );
    assert_eq!(
        result.extension("foo").and_then(|e| e.as_text()),
        Some(">>[1][2]")
    );
}

#[test]
fn test_post_process_runs_once_per_extension() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let ctx = BuilderContext::new().with_post_process_handler(Box::new(RecordingPostProcess {
        seen: seen.clone(),
    }));

    let mut a = feature("g:a:1");
    a.extensions.push(Extension::text("one", "a"));
    let mut b = feature("g:b:1");
    b.extensions.push(Extension::text("one", "b"));
    b.extensions.push(Extension::json("two", "{}"));
    let c = feature("g:c:1");

    FeatureBuilder::new(ctx)
        .assemble(id("g:out:1"), &[a, b, c])
        .unwrap();
    assert_eq!(*seen.lock().unwrap(), vec!["one", "two"]);
}

#[test]
fn test_post_process_failure_aborts_assembly() {
    let mut a = feature("g:a:1");
    a.extensions.push(Extension::text("one", "a"));

    let err = FeatureBuilder::new(BuilderContext::new().with_post_process_handler(Box::new(Rejecting)))
        .assemble(id("g:out:1"), &[a])
        .unwrap_err();
    assert!(matches!(err, FeatmergeError::Handler(_)));
    assert!(err.to_string().contains("Handler 'rejecting' failed on extension one"));
}

#[test]
fn test_requirements_capabilities_and_configurations() {
    let a: Feature = serde_json::from_value(json!({
        "id": "g:a:1",
        "configurations": [{"pid": "svc", "properties": {"x": 1, "y": 1}}],
        "requirements": [{"namespace": "osgi.ee"}],
        "capabilities": [{"namespace": "osgi.service"}]
    }))
    .unwrap();
    let b: Feature = serde_json::from_value(json!({
        "id": "g:b:1",
        "configurations": [
            {"pid": "svc", "properties": {"y": 2}},
            {"pid": "other~factory"}
        ],
        "requirements": [{"namespace": "osgi.ee"}, {"namespace": "osgi.wiring.package"}],
        "capabilities": [{"namespace": "osgi.service"}]
    }))
    .unwrap();

    let result = FeatureBuilder::new(BuilderContext::new())
        .assemble(id("g:out:1"), &[a, b])
        .unwrap();
    let svc = result.configurations.get("svc").unwrap();
    assert_eq!(svc.properties["x"], json!(1));
    assert_eq!(svc.properties["y"], json!(2));
    assert!(result.configurations.get("other~factory").is_some());
    assert_eq!(result.requirements.len(), 2);
    assert_eq!(result.capabilities.len(), 1);
}
