use thiserror::Error;

/// Core error type shared across synthdoc crates.
#[derive(Debug, Error)]
pub enum Error {
    /// The model violates a structural requirement.
    #[error("invalid model: {0}")]
    InvalidModel(String),
    /// A `$ref` target could not be found (or refers back to itself).
    #[error("unresolved reference '{reference}' in model '{model}'")]
    UnresolvedRef { model: String, reference: String },
    /// Two or more models depend on each other.
    #[error("cyclic dependencies between models: {}", .0.join(", "))]
    CyclicDependencies(Vec<String>),
    /// A model names a dependency that is not part of the model set.
    #[error("model '{model}' depends on unknown model '{dependency}'")]
    UnknownDependency { model: String, dependency: String },
    /// Two models share the same name.
    #[error("duplicate model name: {0}")]
    DuplicateModel(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("schema error: {0}")]
    Schema(String),
}

/// Convenience alias for results returned by synthdoc crates.
pub type Result<T> = std::result::Result<T, Error>;
