//! Key/value map merging with context overrides
//!
//! Variables and framework properties are merged with the same rule set:
//!
//! - A context override for a key always wins, whatever target and source say.
//! - Otherwise a key already present in the target keeps its value.
//! - A source value that disagrees with a non-null target value is a fatal
//!   conflict; the caller must supply an override.
//! - A source value is adopted when the target has no value for the key.
//!
//! Variables may be declared without a value, so the algorithm is written
//! against [`MapValue`], implemented for `String` and `Option<String>`.

use crate::errors::{MergeError, Result};
use indexmap::IndexMap;
use tracing::trace;

/// Type label used in conflict messages for variables
pub const VARIABLE_KIND: &str = "Variable";

/// Type label used in conflict messages for framework properties
pub const PROPERTY_KIND: &str = "Property";

/// A map value that may be null
pub trait MapValue: Clone + PartialEq {
    /// The value, or `None` when null
    fn value(&self) -> Option<&str>;
}

impl MapValue for String {
    fn value(&self) -> Option<&str> {
        Some(self)
    }
}

impl MapValue for Option<String> {
    fn value(&self) -> Option<&str> {
        self.as_deref()
    }
}

/// Merge `source` into `target` under an optional context override map
///
/// `kind` is the human-readable label ("Variable", "Property") used in
/// conflict messages. On error `target` is left untouched.
pub fn merge_with_context_override<V: MapValue>(
    kind: &str,
    target: &mut IndexMap<String, V>,
    source: &IndexMap<String, V>,
    overrides: Option<&IndexMap<String, V>>,
) -> Result<()> {
    let override_for = |key: &str| overrides.and_then(|o| o.get(key));

    let mut result: IndexMap<String, V> = IndexMap::with_capacity(target.len() + source.len());
    for (key, value) in target.iter() {
        let value = override_for(key.as_str()).unwrap_or(value);
        result.insert(key.clone(), value.clone());
    }

    for (key, value) in source {
        if let Some(forced) = override_for(key.as_str()) {
            trace!(kind, key = %key, "Context override applied");
            result.insert(key.clone(), forced.clone());
            continue;
        }

        match value.value() {
            Some(incoming) => match target.get(key).and_then(|v| v.value()) {
                Some(existing) if existing != incoming => {
                    return Err(MergeError::AmbiguousValue {
                        kind: kind.to_string(),
                        key: key.clone(),
                        incoming: incoming.to_string(),
                        existing: existing.to_string(),
                    }
                    .into());
                }
                Some(_) => {}
                None => {
                    trace!(kind, key = %key, "Adopting source value");
                    result.insert(key.clone(), value.clone());
                }
            },
            None => {
                if !target.contains_key(key) {
                    result.insert(key.clone(), value.clone());
                }
            }
        }
    }

    *target = result;
    Ok(())
}

/// Merge feature variables
pub fn merge_variables(
    target: &mut IndexMap<String, Option<String>>,
    source: &IndexMap<String, Option<String>>,
    overrides: Option<&IndexMap<String, Option<String>>>,
) -> Result<()> {
    merge_with_context_override(VARIABLE_KIND, target, source, overrides)
}

/// Merge framework properties
pub fn merge_framework_properties(
    target: &mut IndexMap<String, String>,
    source: &IndexMap<String, String>,
    overrides: Option<&IndexMap<String, String>>,
) -> Result<()> {
    merge_with_context_override(PROPERTY_KIND, target, source, overrides)
}
