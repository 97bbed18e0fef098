use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use synthdoc_core::Model;

use crate::errors::GenerationError;

/// Input datasets resolved for one model, by input name.
pub type Inputs = BTreeMap<String, Value>;

/// Resolves the `data.inputs` references of a model.
#[async_trait]
pub trait InputSource: Send + Sync {
    async fn load(&self, model: &Model, name: &str, reference: &str)
    -> Result<Value, GenerationError>;
}

/// In-memory datasets keyed by reference.
#[derive(Debug, Clone, Default)]
pub struct StaticInputs {
    datasets: BTreeMap<String, Value>,
}

impl StaticInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reference: impl Into<String>, dataset: Value) -> Self {
        self.datasets.insert(reference.into(), dataset);
        self
    }
}

#[async_trait]
impl InputSource for StaticInputs {
    async fn load(
        &self,
        model: &Model,
        name: &str,
        reference: &str,
    ) -> Result<Value, GenerationError> {
        self.datasets
            .get(reference)
            .cloned()
            .ok_or_else(|| GenerationError::Input {
                model: model.name.clone(),
                input: name.to_string(),
                message: format!("no dataset registered for '{reference}'"),
            })
    }
}

/// Load every input a model declares; any failure aborts the model.
pub async fn load_inputs(source: &dyn InputSource, model: &Model) -> Result<Inputs, GenerationError> {
    let mut inputs = Inputs::new();
    for (name, reference) in &model.data.inputs {
        let dataset = source.load(model, name, reference).await?;
        inputs.insert(name.clone(), dataset);
    }
    Ok(inputs)
}
