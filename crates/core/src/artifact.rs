//! Artifact coordinates and artifact collections
//!
//! An artifact is addressed by a Maven-style coordinate
//! `groupId:artifactId[:type[:classifier]]:version` and carries a free-form
//! string metadata map. Two well-known metadata keys drive merging:
//!
//! - `alias`: comma-separated alternate coordinates. An alias without a
//!   version is treated as version `0.0.0`.
//! - `start-order`: the start-order bucket of a bundle (default `0`).
//!
//! # Examples
//!
//! ```
//! use featmerge_core::artifact::ArtifactId;
//!
//! let id = ArtifactId::from_mvn_id("org.apache.felix:org.apache.felix.scr:2.1.0").unwrap();
//! assert_eq!(id.group_id(), "org.apache.felix");
//! assert_eq!(id.coordinate_prefix(), "org.apache.felix:org.apache.felix.scr:");
//!
//! let zip = ArtifactId::from_mvn_id("g:a:zip:docs:1.0").unwrap();
//! assert_eq!(zip.to_mvn_id(), "g:a:zip:docs:1.0");
//! ```

use crate::errors::{ArtifactError, Result};
use crate::version::OsgiVersion;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Metadata key holding comma-separated alias coordinates
pub const ALIAS_KEY: &str = "alias";

/// Metadata key holding the start-order bucket of a bundle
pub const START_ORDER_KEY: &str = "start-order";

/// Default packaging type
pub const DEFAULT_TYPE: &str = "jar";

/// Version assigned to aliases that omit one
pub const ALIAS_DEFAULT_VERSION: &str = "0.0.0";

/// Immutable artifact coordinate
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactId {
    group_id: String,
    artifact_id: String,
    version: String,
    classifier: Option<String>,
    artifact_type: String,
}

impl ArtifactId {
    /// Create a coordinate with the default `jar` type and no classifier
    pub fn new(group_id: &str, artifact_id: &str, version: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: version.to_string(),
            classifier: None,
            artifact_type: DEFAULT_TYPE.to_string(),
        }
    }

    /// Parse `groupId:artifactId[:type[:classifier]]:version`
    pub fn from_mvn_id(value: &str) -> Result<Self> {
        let invalid = |reason: &str| ArtifactError::InvalidCoordinate {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = value.trim().split(':').map(str::trim).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid("coordinate segments must not be empty").into());
        }

        let id = match parts.as_slice() {
            [g, a, v] => Self::new(g, a, v),
            [g, a, t, v] => Self {
                artifact_type: (*t).to_string(),
                ..Self::new(g, a, v)
            },
            [g, a, t, c, v] => Self {
                artifact_type: (*t).to_string(),
                classifier: Some((*c).to_string()),
                ..Self::new(g, a, v)
            },
            _ => {
                return Err(invalid(
                    "expected groupId:artifactId[:type[:classifier]]:version",
                )
                .into())
            }
        };
        Ok(id)
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn artifact_id(&self) -> &str {
        &self.artifact_id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn classifier(&self) -> Option<&str> {
        self.classifier.as_deref()
    }

    pub fn artifact_type(&self) -> &str {
        &self.artifact_type
    }

    /// Canonical coordinate string
    ///
    /// The type is only written when it is not `jar` or a classifier is present.
    pub fn to_mvn_id(&self) -> String {
        format!("{}{}", self.coordinate_prefix(), self.version)
    }

    /// The coordinate string without its version, ending in `:`
    ///
    /// This is the left-hand side an override rule must carry to apply to
    /// this artifact.
    pub fn coordinate_prefix(&self) -> String {
        let mut prefix = format!("{}:{}:", self.group_id, self.artifact_id);
        if self.classifier.is_some() || self.artifact_type != DEFAULT_TYPE {
            prefix.push_str(&self.artifact_type);
            prefix.push(':');
            if let Some(classifier) = &self.classifier {
                prefix.push_str(classifier);
                prefix.push(':');
            }
        }
        prefix
    }

    /// Same artifact ignoring the version
    pub fn is_same(&self, other: &ArtifactId) -> bool {
        self.group_id == other.group_id
            && self.artifact_id == other.artifact_id
            && self.classifier == other.classifier
            && self.artifact_type == other.artifact_type
    }

    /// The version interpreted with OSGi ordering
    pub fn osgi_version(&self) -> OsgiVersion {
        OsgiVersion::parse(&self.version)
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_mvn_id())
    }
}

impl FromStr for ArtifactId {
    type Err = crate::errors::FeatmergeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_mvn_id(s)
    }
}

impl TryFrom<String> for ArtifactId {
    type Error = crate::errors::FeatmergeError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_mvn_id(&value)
    }
}

impl From<ArtifactId> for String {
    fn from(id: ArtifactId) -> Self {
        id.to_mvn_id()
    }
}

/// An artifact: a coordinate plus mutable metadata
///
/// Deserializes from either a bare coordinate string or an object with an
/// `id` field and arbitrary string metadata entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ArtifactRepr")]
pub struct Artifact {
    id: ArtifactId,
    #[serde(flatten)]
    metadata: IndexMap<String, String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ArtifactRepr {
    Coordinate(ArtifactId),
    Detailed {
        id: ArtifactId,
        #[serde(flatten)]
        metadata: IndexMap<String, String>,
    },
}

impl From<ArtifactRepr> for Artifact {
    fn from(repr: ArtifactRepr) -> Self {
        match repr {
            ArtifactRepr::Coordinate(id) => Artifact::new(id),
            ArtifactRepr::Detailed { id, metadata } => Artifact { id, metadata },
        }
    }
}

impl Artifact {
    pub fn new(id: ArtifactId) -> Self {
        Self {
            id,
            metadata: IndexMap::new(),
        }
    }

    /// Attach a metadata entry, builder style
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn id(&self) -> &ArtifactId {
        &self.id
    }

    pub fn metadata(&self) -> &IndexMap<String, String> {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut IndexMap<String, String> {
        &mut self.metadata
    }

    /// Start-order bucket, `0` when unset
    pub fn start_order(&self) -> Result<u32> {
        match self.metadata.get(START_ORDER_KEY) {
            None => Ok(0),
            Some(value) => value.trim().parse::<u32>().map_err(|_| {
                ArtifactError::InvalidStartOrder {
                    artifact: self.id.to_mvn_id(),
                    value: value.clone(),
                }
                .into()
            }),
        }
    }

    /// Alias coordinates declared in metadata, versionless aliases at `0.0.0`
    pub fn aliases(&self) -> Result<Vec<ArtifactId>> {
        let Some(aliases) = self.metadata.get(ALIAS_KEY) else {
            return Ok(Vec::new());
        };

        aliases
            .split(',')
            .map(str::trim)
            .filter(|alias| !alias.is_empty())
            .map(|alias| {
                if alias.matches(':').count() == 1 {
                    ArtifactId::from_mvn_id(&format!("{}:{}", alias, ALIAS_DEFAULT_VERSION))
                } else {
                    ArtifactId::from_mvn_id(alias)
                }
            })
            .collect()
    }

    /// The artifact's own coordinate followed by its aliases
    pub fn ids_including_aliases(&self) -> Result<Vec<ArtifactId>> {
        let mut ids = vec![self.id.clone()];
        ids.extend(self.aliases()?);
        Ok(ids)
    }

    /// Override-rule prefixes for the coordinate and every alias, deduplicated
    pub fn prefixes_including_aliases(&self) -> Result<Vec<String>> {
        let mut prefixes: Vec<String> = Vec::new();
        for id in self.ids_including_aliases()? {
            let prefix = id.coordinate_prefix();
            if !prefixes.contains(&prefix) {
                prefixes.push(prefix);
            }
        }
        Ok(prefixes)
    }

    /// Whether any alias names the same group and artifact as `id`
    fn has_alias_for(&self, id: &ArtifactId) -> Result<bool> {
        Ok(self
            .aliases()?
            .iter()
            .any(|alias| alias.group_id() == id.group_id() && alias.artifact_id() == id.artifact_id()))
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Ordered artifact collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Artifacts(Vec<Artifact>);

impl Artifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, artifact: Artifact) {
        self.0.push(artifact);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Artifact> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every artifact with the same coordinate ignoring version
    pub fn same_as<'a>(&'a self, id: &'a ArtifactId) -> impl Iterator<Item = &'a Artifact> + 'a {
        self.0.iter().filter(move |a| a.id.is_same(id))
    }

    /// Remove every artifact with the same coordinate ignoring version
    pub fn remove_all_same(&mut self, id: &ArtifactId) -> usize {
        let before = self.0.len();
        self.0.retain(|a| !a.id.is_same(id));
        before - self.0.len()
    }

    /// Whether an artifact with exactly this coordinate (including version) is present
    pub fn contains_id(&self, id: &ArtifactId) -> bool {
        self.0.iter().any(|a| &a.id == id)
    }

    /// Snapshot of every artifact conflicting with `candidate`
    ///
    /// Matches direct coordinates as well as alias cross-matches in both
    /// directions. The result is deduplicated by coordinate and keeps
    /// collection order.
    pub fn find_conflicting(&self, candidate: &Artifact) -> Result<Vec<Artifact>> {
        let mut found: Vec<Artifact> = Vec::new();
        for id in candidate.ids_including_aliases()? {
            for same in self.same_as(&id) {
                if !found.iter().any(|f| f.id == same.id) {
                    found.push(same.clone());
                }
            }
            for artifact in &self.0 {
                if artifact.has_alias_for(&id)? && !found.iter().any(|f| f.id == artifact.id) {
                    found.push(artifact.clone());
                }
            }
        }
        Ok(found)
    }
}

impl From<Vec<Artifact>> for Artifacts {
    fn from(artifacts: Vec<Artifact>) -> Self {
        Self(artifacts)
    }
}

impl<'a> IntoIterator for &'a Artifacts {
    type Item = &'a Artifact;
    type IntoIter = std::slice::Iter<'a, Artifact>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
