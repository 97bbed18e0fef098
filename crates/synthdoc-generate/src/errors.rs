use thiserror::Error;

/// Errors emitted by the generation engine.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid model: {0}")]
    InvalidModel(String),
    #[error(transparent)]
    Core(#[from] synthdoc_core::Error),
    #[error("unknown hook '{hook}' referenced by {model} at {location}")]
    UnknownHook {
        model: String,
        location: String,
        hook: String,
    },
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("hook '{hook}' failed for {model}.{field}: {message}")]
    Hook {
        model: String,
        field: String,
        hook: String,
        message: String,
    },
    #[error("input '{input}' for model '{model}' unavailable: {message}")]
    Input {
        model: String,
        input: String,
        message: String,
    },
    #[error("sink error: {0}")]
    Sink(String),
    #[error("generation cancelled")]
    Cancelled,
    #[error("build task failed: {0}")]
    Task(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
