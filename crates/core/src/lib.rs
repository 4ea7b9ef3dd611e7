//! Core library for merging feature descriptors
//!
//! This crate contains the merge engine: artifact override resolution, map
//! and structured-value merging, bundle and extension merging, the feature
//! fold with its handler protocol, plus settings, logging and error handling.

pub mod artifact;
pub mod builder;
pub mod bundles;
pub mod config;
pub mod configuration;
pub mod context;
pub mod errors;
pub mod extension;
pub mod feature;
pub mod handler;
pub mod logging;
pub mod override_rule;
pub mod properties;
pub mod structured;
pub mod version;

pub use builder::{merge_feature, FeatureBuilder};
pub use context::BuilderContext;
pub use errors::{FeatmergeError, Result};
pub use feature::Feature;
