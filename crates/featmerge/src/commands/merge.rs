//! Merge command implementation
//!
//! Loads feature descriptors (JSON), layers the command line flags over the
//! optional settings file, folds the features and writes the merged feature
//! as pretty-printed JSON.

use anyhow::{Context, Result};
use featmerge_core::artifact::ArtifactId;
use featmerge_core::config::MergeSettings;
use featmerge_core::{Feature, FeatureBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Merge command arguments
#[derive(Debug, Clone)]
pub struct MergeArgs {
    pub inputs: Vec<PathBuf>,
    pub id: Option<String>,
    pub overrides: Vec<String>,
    pub origin_key: Option<String>,
    pub variables: Vec<(String, String)>,
    pub framework_properties: Vec<(String, String)>,
    pub config: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

impl MergeArgs {
    /// Settings given on the command line
    fn flag_settings(&self) -> MergeSettings {
        MergeSettings {
            artifact_overrides: self.overrides.clone(),
            origin_key: self.origin_key.clone(),
            variables: self.variables.iter().cloned().collect(),
            framework_properties: self.framework_properties.iter().cloned().collect(),
            handlers: Default::default(),
        }
    }
}

fn load_feature(path: &Path) -> Result<Feature> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read feature {}", path.display()))?;
    let feature: Feature = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse feature {}", path.display()))?;
    debug!(id = %feature.id, bundles = feature.bundles.len(), "Loaded {}", path.display());
    Ok(feature)
}

/// Execute the merge command
#[instrument(skip_all, fields(inputs = args.inputs.len()))]
pub fn execute_merge(args: MergeArgs) -> Result<()> {
    let base = match &args.config {
        Some(path) => MergeSettings::load(path)?,
        None => MergeSettings::default(),
    };
    let context = base.layer(args.flag_settings()).into_context()?;

    let features = args
        .inputs
        .iter()
        .map(|path| load_feature(path))
        .collect::<Result<Vec<_>>>()?;

    let id = match &args.id {
        Some(id) => ArtifactId::from_mvn_id(id)?,
        None => features
            .first()
            .map(|f| f.id.clone())
            .context("No input features given")?,
    };

    let merged = FeatureBuilder::new(context).assemble(id, &features)?;
    let json = serde_json::to_string_pretty(&merged)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, format!("{}\n", json))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            debug!("Wrote merged feature to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
