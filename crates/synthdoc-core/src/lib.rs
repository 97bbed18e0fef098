//! Core contracts and helpers for synthdoc.
//!
//! This crate defines the model schema types, the normalizer that fills in
//! defaults and inlines `$ref` subtrees, the dependency graph used to order
//! models, and structural validation shared by the generator and the CLI.

pub mod error;
pub mod graph;
pub mod model;
pub mod normalize;
pub mod validation;

pub use error::{Error, Result};
pub use graph::{DependencyGraph, DependencyReport, build_dependency_report};
pub use model::{
    HookRef, HookSpec, KeySpec, Model, ModelData, Properties, Property, PropertyData,
    PropertyType, Seed,
};
pub use normalize::{NormalizeOptions, NormalizedModels, normalize_model, normalize_models};
pub use validation::{
    IssueSeverity, ValidationIssue, ValidationReport, model_json_schema, validate_model,
    validate_model_json,
};

/// Current contract version for model files.
pub const MODEL_SCHEMA_VERSION: &str = "0.1";
