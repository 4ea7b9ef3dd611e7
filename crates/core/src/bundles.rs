//! Bundle sets and artifact merging
//!
//! Bundles are artifacts grouped into start-order buckets. Merging a source
//! collection into a target works artifact by artifact:
//!
//! 1. Find every target artifact conflicting with the incoming one (same
//!    coordinate ignoring version, or an alias cross-match).
//! 2. A conflicting artifact recorded as originating from the feature being
//!    merged is kept side by side with the incoming artifact.
//! 3. Any other conflict goes through [`select_override`]; the existing
//!    artifact is removed and the selected artifacts are inserted. When the
//!    target holds several versions, each one is resolved against the
//!    incoming artifact, and the incoming artifact is dropped if any of them
//!    wins over it.
//! 4. Every inserted artifact is a detached copy, stamped with the source
//!    feature's id under the origin key when it came from the source.

use crate::artifact::{Artifact, ArtifactId, Artifacts};
use crate::errors::Result;
use crate::override_rule::{select_override, OverrideRule};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Inputs shared by every artifact merge in one fold step
#[derive(Debug, Clone, Copy)]
pub struct ArtifactMergeOptions<'a> {
    /// Id of the feature being merged in, used for origin tracking
    pub source_feature: Option<&'a ArtifactId>,
    /// Override rules in evaluation order
    pub rules: &'a [OverrideRule],
    /// Metadata key recording the originating feature
    pub origin_key: Option<&'a str>,
}

impl<'a> ArtifactMergeOptions<'a> {
    pub fn new(
        source_feature: Option<&'a ArtifactId>,
        rules: &'a [OverrideRule],
        origin_key: Option<&'a str>,
    ) -> Self {
        Self {
            source_feature,
            rules,
            origin_key,
        }
    }

    /// Whether `artifact` was recorded as coming from the feature being merged
    fn is_same_origin(&self, artifact: &Artifact) -> bool {
        match (self.origin_key, self.source_feature) {
            (Some(key), Some(feature)) => artifact
                .metadata()
                .get(key)
                .is_some_and(|origin| *origin == feature.to_mvn_id()),
            _ => false,
        }
    }
}

/// The bundles of a feature
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bundles(Artifacts);

impl Bundles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, artifact: Artifact) {
        self.0.push(artifact);
    }

    pub fn artifacts(&self) -> &Artifacts {
        &self.0
    }

    pub fn artifacts_mut(&mut self) -> &mut Artifacts {
        &mut self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bundles grouped by ascending start order, declaration order within a bucket
    pub fn by_start_order(&self) -> Result<BTreeMap<u32, Vec<&Artifact>>> {
        let mut buckets: BTreeMap<u32, Vec<&Artifact>> = BTreeMap::new();
        for artifact in &self.0 {
            buckets.entry(artifact.start_order()?).or_default().push(artifact);
        }
        Ok(buckets)
    }
}

impl From<Vec<Artifact>> for Bundles {
    fn from(artifacts: Vec<Artifact>) -> Self {
        Self(Artifacts::from(artifacts))
    }
}

/// Merge one incoming artifact into `target`
///
/// `source` is the collection `incoming` belongs to; only artifacts present
/// there are stamped with the origin key.
pub fn merge_artifact(
    target: &mut Artifacts,
    source: &Artifacts,
    incoming: &Artifact,
    options: &ArtifactMergeOptions<'_>,
) -> Result<()> {
    let conflicts = target.find_conflicting(incoming)?;

    let mut selected: Vec<Artifact> = Vec::new();
    let mut incoming_rejected = false;
    let mut select = |artifact: Artifact| {
        if !selected.iter().any(|s| s.id() == artifact.id()) {
            selected.push(artifact);
        }
    };

    for existing in &conflicts {
        if existing.id() != incoming.id() && options.is_same_origin(existing) {
            debug!(
                "Keeping {} side by side with {} from the same feature",
                incoming, existing
            );
            select(incoming.clone());
            continue;
        }

        let chosen = select_override(existing, incoming, options.rules)?;
        if !chosen.iter().any(|a| a.id() == incoming.id()) {
            incoming_rejected = true;
        }
        let removed = target.remove_all_same(existing.id());
        debug!(
            removed,
            "Resolved conflict between {} and {} to [{}]",
            existing,
            incoming,
            chosen
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        for artifact in chosen {
            select(artifact);
        }
    }

    if conflicts.is_empty() {
        select(incoming.clone());
    }
    if incoming_rejected {
        selected.retain(|a| a.id() != incoming.id());
    }

    for artifact in selected {
        let stamp = match (options.origin_key, options.source_feature) {
            (Some(key), Some(feature))
                if source.contains_id(artifact.id()) && !artifact.metadata().contains_key(key) =>
            {
                Some((key, feature.to_mvn_id()))
            }
            _ => None,
        };
        // clone detaches the copy from the source collection
        let mut copy = artifact.clone();
        if let Some((key, origin)) = stamp {
            copy.metadata_mut().insert(key.to_string(), origin);
        }
        target.push(copy);
    }

    Ok(())
}

/// Merge all bundles of `source` into `target`, bucket by bucket
pub fn merge_bundles(
    target: &mut Bundles,
    source: &Bundles,
    options: &ArtifactMergeOptions<'_>,
) -> Result<()> {
    for (start_order, bucket) in source.by_start_order()? {
        debug!(start_order, count = bucket.len(), "Merging bundle bucket");
        for incoming in bucket {
            merge_artifact(target.artifacts_mut(), source.artifacts(), incoming, options)?;
        }
    }
    Ok(())
}
