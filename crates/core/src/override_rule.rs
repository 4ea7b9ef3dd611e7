//! Artifact override rules
//!
//! When two coordinate-compatible artifacts meet during a merge, an ordered
//! list of override rules decides which of them survive. A rule has the form
//! `groupId:artifactId:<policy>` (the left-hand side may also carry a type and
//! classifier) or the catch-all `*:*:<policy>`, where the policy is one of:
//!
//! - `ALL`: keep both artifacts
//! - `HIGHEST`: keep the artifact with the higher OSGi version
//! - `LATEST`: keep the artifact seen last (the incoming one)
//! - an exact version: keep the side carrying that version, or synthesize a
//!   new artifact at that version when neither side does
//!
//! Rules are parsed once into [`OverrideRule`] values and then evaluated in
//! list order by [`select_override`].
//!
//! # Examples
//!
//! ```
//! use featmerge_core::artifact::{Artifact, ArtifactId};
//! use featmerge_core::override_rule::{select_override, OverrideRule};
//!
//! let rules = vec![OverrideRule::parse("org.example:api:HIGHEST").unwrap()];
//! let existing = Artifact::new(ArtifactId::from_mvn_id("org.example:api:1.0.0").unwrap());
//! let incoming = Artifact::new(ArtifactId::from_mvn_id("org.example:api:1.2.0").unwrap());
//!
//! let selected = select_override(&existing, &incoming, &rules).unwrap();
//! assert_eq!(selected.len(), 1);
//! assert_eq!(selected[0].id().version(), "1.2.0");
//! ```

use crate::artifact::{Artifact, ArtifactId};
use crate::errors::{MergeError, Result};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Left-hand side that applies to every artifact
pub const CATCH_ALL: &str = "*:*:";

const SELECT_ALL: &str = "ALL";
const SELECT_HIGHEST: &str = "HIGHEST";
const SELECT_LATEST: &str = "LATEST";

/// Which artifacts a rule applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleTarget {
    /// `*:*:` applies to every coordinate family
    CatchAll,
    /// A coordinate prefix such as `org.example:api:`
    Prefix(String),
}

/// How a rule resolves a conflict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverridePolicy {
    All,
    Highest,
    Latest,
    Version(String),
}

/// A parsed override rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideRule {
    target: RuleTarget,
    policy: OverridePolicy,
    raw: String,
}

impl OverrideRule {
    /// Parse a rule string
    pub fn parse(rule: &str) -> Result<Self> {
        let raw = rule.trim();
        let invalid = |reason: &str| MergeError::InvalidOverrideRule {
            rule: rule.to_string(),
            reason: reason.to_string(),
        };

        let Some(idx) = raw.rfind(':') else {
            return Err(invalid("expected groupId:artifactId:<ALL|HIGHEST|LATEST|version>").into());
        };
        let (lhs, policy) = (&raw[..=idx], raw[idx + 1..].trim());
        if policy.is_empty() {
            return Err(invalid("missing policy after the last ':'").into());
        }
        if lhs.matches(':').count() < 2 || lhs.split(':').take(2).any(|s| s.trim().is_empty()) {
            return Err(invalid("left-hand side must be groupId:artifactId:").into());
        }

        let target = if lhs == CATCH_ALL {
            RuleTarget::CatchAll
        } else {
            RuleTarget::Prefix(lhs.to_string())
        };
        let policy = match policy {
            SELECT_ALL => OverridePolicy::All,
            SELECT_HIGHEST => OverridePolicy::Highest,
            SELECT_LATEST => OverridePolicy::Latest,
            version => {
                if target != RuleTarget::CatchAll {
                    // A version rule must describe a valid coordinate
                    ArtifactId::from_mvn_id(raw)?;
                }
                OverridePolicy::Version(version.to_string())
            }
        };

        Ok(Self {
            target,
            policy,
            raw: raw.to_string(),
        })
    }

    /// Parse every rule in order, failing on the first invalid one
    pub fn parse_all<S: AsRef<str>>(rules: &[S]) -> Result<Vec<Self>> {
        rules.iter().map(|r| Self::parse(r.as_ref())).collect()
    }

    pub fn target(&self) -> &RuleTarget {
        &self.target
    }

    pub fn policy(&self) -> &OverridePolicy {
        &self.policy
    }

    /// Whether this rule applies to artifacts with the given coordinate prefix
    pub fn applies_to(&self, prefix: &str) -> bool {
        match &self.target {
            RuleTarget::CatchAll => true,
            RuleTarget::Prefix(p) => p == prefix,
        }
    }

    /// The artifact a version rule synthesizes for `prefix`
    fn synthesized_id(&self, prefix: &str, version: &str) -> Result<ArtifactId> {
        match &self.target {
            RuleTarget::CatchAll => ArtifactId::from_mvn_id(&format!("{}{}", prefix, version)),
            RuleTarget::Prefix(_) => ArtifactId::from_mvn_id(&self.raw),
        }
    }
}

impl FromStr for OverrideRule {
    type Err = crate::errors::FeatmergeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for OverrideRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Coordinate prefixes shared by both artifacts, aliases included
fn common_prefixes(a1: &Artifact, a2: &Artifact) -> Result<Vec<String>> {
    let other = a2.prefixes_including_aliases()?;
    Ok(a1
        .prefixes_including_aliases()?
        .into_iter()
        .filter(|p| other.contains(p))
        .collect())
}

/// Select the artifacts that survive a conflict between `existing` and `incoming`
///
/// Identical coordinates (version included) are not a conflict and yield
/// `incoming`. Otherwise the first rule matching a common prefix decides;
/// version rules accumulate across prefixes and rules, deduplicated. A
/// synthesized artifact carries no metadata.
///
/// # Errors
///
/// - [`MergeError::NoCommonPrefix`] when the artifacts share no coordinate
///   family at all
/// - [`MergeError::OverrideRuleRequired`] when no rule applies
pub fn select_override(
    existing: &Artifact,
    incoming: &Artifact,
    rules: &[OverrideRule],
) -> Result<Vec<Artifact>> {
    if existing.id() == incoming.id() {
        return Ok(vec![incoming.clone()]);
    }

    let prefixes = common_prefixes(existing, incoming)?;
    if prefixes.is_empty() {
        return Err(MergeError::NoCommonPrefix {
            existing: existing.to_string(),
            incoming: incoming.to_string(),
        }
        .into());
    }

    let mut result: Vec<Artifact> = Vec::new();
    let mut add = |artifact: &Artifact| {
        if !result.iter().any(|a| a.id() == artifact.id()) {
            result.push(artifact.clone());
        }
    };

    for prefix in &prefixes {
        for rule in rules.iter().filter(|r| r.applies_to(prefix)) {
            match rule.policy() {
                OverridePolicy::All => {
                    debug!(rule = %rule, "Keeping both {} and {}", existing, incoming);
                    return Ok(vec![existing.clone(), incoming.clone()]);
                }
                OverridePolicy::Highest => {
                    let winner = if existing.id().osgi_version() > incoming.id().osgi_version() {
                        existing
                    } else {
                        incoming
                    };
                    debug!(rule = %rule, "Selected highest version {}", winner);
                    return Ok(vec![winner.clone()]);
                }
                OverridePolicy::Latest => {
                    debug!(rule = %rule, "Selected latest {}", incoming);
                    return Ok(vec![incoming.clone()]);
                }
                OverridePolicy::Version(version) => {
                    // Prefer an existing side so its metadata survives
                    if existing.id().version() == version {
                        add(existing);
                    } else if incoming.id().version() == version {
                        add(incoming);
                    } else {
                        let id = rule.synthesized_id(prefix, version)?;
                        debug!(rule = %rule, "Synthesized override artifact {}", id);
                        add(&Artifact::new(id));
                    }
                }
            }
        }
    }

    if !result.is_empty() {
        return Ok(result);
    }

    Err(MergeError::OverrideRuleRequired {
        existing: existing.to_string(),
        incoming: incoming.to_string(),
        prefixes,
    }
    .into())
}
