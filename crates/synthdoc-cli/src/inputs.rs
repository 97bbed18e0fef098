use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use synthdoc_core::Model;
use synthdoc_generate::{GenerationError, InputSource};

/// Reads input datasets as JSON files relative to each model's `root`.
#[derive(Debug, Clone, Default)]
pub struct FileInputSource {
    fallback_root: PathBuf,
}

impl FileInputSource {
    pub fn new(fallback_root: impl Into<PathBuf>) -> Self {
        Self {
            fallback_root: fallback_root.into(),
        }
    }

    fn resolve(&self, model: &Model, reference: &str) -> PathBuf {
        let reference = Path::new(reference);
        if reference.is_absolute() {
            return reference.to_path_buf();
        }
        match &model.root {
            Some(root) => Path::new(root).join(reference),
            None => self.fallback_root.join(reference),
        }
    }
}

#[async_trait]
impl InputSource for FileInputSource {
    async fn load(
        &self,
        model: &Model,
        name: &str,
        reference: &str,
    ) -> Result<Value, GenerationError> {
        let path = self.resolve(model, reference);
        let failed = |message: String| GenerationError::Input {
            model: model.name.clone(),
            input: name.to_string(),
            message,
        };
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| failed(format!("{}: {err}", path.display())))?;
        let dataset = serde_json::from_str(&content)
            .map_err(|err| failed(format!("{}: {err}", path.display())))?;
        tracing::debug!(model = %model.name, input = name, path = %path.display(), "input loaded");
        Ok(dataset)
    }
}
