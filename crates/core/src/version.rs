//! OSGi-style version ordering
//!
//! Artifact versions are Maven-style strings (`1.2.3`, `1.2.3-SNAPSHOT`, `2.0`).
//! The `HIGHEST` override policy compares them the way an OSGi framework would:
//! three numeric components followed by a qualifier compared lexically.
//!
//! ## Mapping rules
//!
//! - Up to three leading dot-separated numeric components become
//!   `major.minor.micro`; missing components are `0`.
//! - The first non-numeric component, any fourth component, and everything
//!   after the first `-` form the qualifier.
//! - The empty qualifier sorts before every non-empty qualifier, so
//!   `1.0.0` < `1.0.0.SNAPSHOT` < `1.0.1`.
//!
//! ```rust
//! use featmerge_core::version::OsgiVersion;
//!
//! assert!(OsgiVersion::parse("1.0.1") > OsgiVersion::parse("1.0.0"));
//! assert!(OsgiVersion::parse("2.0.0") > OsgiVersion::parse("1.9.9"));
//! assert_eq!(OsgiVersion::parse("1.2-SNAPSHOT").to_string(), "1.2.0.SNAPSHOT");
//! ```

use std::cmp::Ordering;
use std::fmt;

/// A version with OSGi comparison semantics
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct OsgiVersion {
    pub major: u64,
    pub minor: u64,
    pub micro: u64,
    pub qualifier: String,
}

impl OsgiVersion {
    /// Parse a Maven-style version string.
    ///
    /// Parsing is lenient and never fails: anything that is not a leading
    /// numeric component ends up in the qualifier.
    pub fn parse(version: &str) -> Self {
        let version = version.trim();
        let (main, dash_qualifier) = match version.split_once('-') {
            Some((main, rest)) => (main, Some(rest)),
            None => (version, None),
        };

        let mut numbers = [0u64; 3];
        let mut qualifier_parts: Vec<&str> = Vec::new();
        for (index, part) in main.split('.').enumerate() {
            if !qualifier_parts.is_empty() || index >= numbers.len() {
                qualifier_parts.push(part);
                continue;
            }
            match part.parse::<u64>() {
                Ok(n) => numbers[index] = n,
                Err(_) if part.is_empty() => {}
                Err(_) => qualifier_parts.push(part),
            }
        }

        let mut qualifier = qualifier_parts.join(".");
        if let Some(rest) = dash_qualifier {
            if qualifier.is_empty() {
                qualifier = rest.to_string();
            } else {
                qualifier.push('-');
                qualifier.push_str(rest);
            }
        }

        Self {
            major: numbers[0],
            minor: numbers[1],
            micro: numbers[2],
            qualifier,
        }
    }
}

impl Ord for OsgiVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.micro.cmp(&other.micro))
            .then_with(|| self.qualifier.cmp(&other.qualifier))
    }
}

impl PartialOrd for OsgiVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for OsgiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}
