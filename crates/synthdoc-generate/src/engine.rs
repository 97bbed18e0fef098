use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use synthdoc_core::{
    DependencyGraph, KeySpec, Model, NormalizeOptions, Property, normalize_models,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::builder::DocumentBuilder;
use crate::errors::GenerationError;
use crate::faker::Faker;
use crate::hooks::HookRegistry;
use crate::inputs::{InputSource, StaticInputs, load_inputs};
use crate::model::{DeliveryMode, GenerateOptions, GenerationIssue, GenerationReport, ModelReport};
use crate::random::SeededRandomContext;
use crate::scheduler::{BatchDelivery, Delivery, GenerationScheduler, StreamDelivery};
use crate::sink::DocumentSink;
use crate::store::DocumentStore;

/// Outcome of a full run.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub report: GenerationReport,
    /// Models in the order they were generated.
    pub order: Vec<String>,
}

/// Runs a model set end to end: normalize, order, then generate each model
/// after its dependencies.
pub struct GenerationEngine {
    options: GenerateOptions,
    hooks: Arc<HookRegistry>,
    inputs: Arc<dyn InputSource>,
}

impl GenerationEngine {
    pub fn new(options: GenerateOptions) -> Self {
        Self {
            options,
            hooks: Arc::new(HookRegistry::new()),
            inputs: Arc::new(StaticInputs::new()),
        }
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    pub fn with_inputs(mut self, inputs: impl InputSource + 'static) -> Self {
        self.inputs = Arc::new(inputs);
        self
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    /// Generate every model and hand the documents to `sink`.
    ///
    /// Configuration problems (unknown hooks, unknown faker ids, cycles,
    /// bad `$ref`s) fail before any document is built. Cancelling `cancel`
    /// stops dispatch, drains in-flight builds and returns
    /// [`GenerationError::Cancelled`]. A sink that closes on its own ends the
    /// run early with `report.cancelled` set.
    pub async fn run(
        &self,
        models: Vec<Model>,
        sink: &dyn DocumentSink,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, GenerationError> {
        let started = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        let mut report = GenerationReport::new(run_id.clone(), self.options.mode);

        let normalized = normalize_models(
            models,
            &NormalizeOptions {
                count_override: self.options.count_override,
                seed_override: self.options.seed_override,
            },
        )?;
        for issue in normalized
            .report
            .errors
            .into_iter()
            .chain(normalized.report.warnings)
        {
            report.record_warning(GenerationIssue::from(issue));
        }
        let models = normalized.models;

        let faker = Faker::new(self.options.locale)?;
        for model in &models {
            self.hooks.check_model(model)?;
            check_fake_templates(model, &faker)?;
        }
        let graph = DependencyGraph::build(&models)?;
        let order = graph.order().to_vec();

        info!(
            run_id = %run_id,
            models = models.len(),
            mode = %self.options.mode,
            concurrency = self.options.concurrency_limit(),
            strict = self.options.strict,
            "generation started"
        );

        let by_name: BTreeMap<&str, &Model> = models
            .iter()
            .map(|model| (model.name.as_str(), model))
            .collect();
        let store = DocumentStore::new();
        let mut completed = BTreeSet::new();

        for name in &order {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let Some(model) = by_name.get(name.as_str()) else {
                continue;
            };

            let (model_report, stopped) = self.run_model(model, &graph, &store, sink, cancel).await?;
            if model_report.duplicates > 0 {
                report.record_warning(GenerationIssue::warning(
                    "duplicate_key",
                    Some(name.as_str()),
                    format!(
                        "{} documents dropped for duplicate keys",
                        model_report.duplicates
                    ),
                ));
            }
            report.record_model(model_report);
            if stopped {
                report.cancelled = true;
                break;
            }

            completed.insert(name.as_str());
            release_finished(&graph, &store, &completed, name);
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        if cancel.is_cancelled() {
            warn!(
                run_id = %run_id,
                documents = report.documents_total,
                duration_ms = report.duration_ms,
                "generation cancelled"
            );
            return Err(GenerationError::Cancelled);
        }

        info!(
            run_id = %run_id,
            documents = report.documents_total,
            hook_errors = report.hook_errors_total,
            duplicates = report.duplicates_total,
            duration_ms = report.duration_ms,
            cancelled = report.cancelled,
            "generation completed"
        );
        Ok(GenerationResult { report, order })
    }

    async fn run_model(
        &self,
        model: &Model,
        graph: &DependencyGraph,
        store: &DocumentStore,
        sink: &dyn DocumentSink,
        cancel: &CancellationToken,
    ) -> Result<(ModelReport, bool), GenerationError> {
        let started = Instant::now();
        let count = model.count();
        info!(model = %model.name, count, seed = ?model.seed_value(), "generating model");

        let inputs = load_inputs(self.inputs.as_ref(), model).await?;
        let random = SeededRandomContext::new(model.seed_value(), self.options.locale)?;
        let builder = Arc::new(
            DocumentBuilder::new(Arc::new(model.clone()), Arc::clone(&self.hooks), random)
                .with_inputs(inputs)
                .with_store(store.clone())
                .strict(self.options.strict),
        );

        builder.run_model_hook("data.pre_run", model.data.pre_run.as_ref())?;

        let retain = graph.has_dependants(&model.name);
        let mut delivery: Box<dyn Delivery> = match self.options.mode {
            DeliveryMode::Batch => Box::new(BatchDelivery::new(retain)),
            DeliveryMode::Stream => Box::new(StreamDelivery::new(retain)),
        };
        let scheduler = GenerationScheduler::new(self.options.concurrency_limit(), cancel.clone());
        let outcome = scheduler
            .run(Arc::clone(&builder), count, delivery.as_mut(), sink)
            .await?;

        let stopped = outcome.stopped();
        if !stopped {
            builder.run_model_hook("data.post_run", model.data.post_run.as_ref())?;
            if retain {
                store.insert(&model.name, outcome.retained);
            }
        }

        let report = ModelReport {
            model: model.name.clone(),
            requested: count,
            generated: builder.generated(),
            delivered: outcome.delivered,
            duplicates: outcome.duplicates,
            hook_errors: builder.hook_errors(),
            seed: model.seed_value(),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            model = %report.model,
            documents = report.delivered,
            duplicates = report.duplicates,
            hook_errors = report.hook_errors,
            duration_ms = report.duration_ms,
            "model completed"
        );
        Ok((report, stopped))
    }
}

/// Drop stored documents of `model`'s dependencies once nothing left needs them.
fn release_finished(
    graph: &DependencyGraph,
    store: &DocumentStore,
    completed: &BTreeSet<&str>,
    model: &str,
) {
    for dependency in graph.dependencies(model) {
        if graph
            .dependants(dependency)
            .all(|dependant| completed.contains(dependant))
        {
            let released = store.release(dependency);
            debug!(model = dependency, documents = released, "dependency documents released");
        }
    }
}

fn check_fake_templates(model: &Model, faker: &Faker) -> Result<(), GenerationError> {
    let mut pending: Vec<(String, &Property)> = model
        .properties
        .iter()
        .map(|(name, property)| (format!("properties.{name}"), property))
        .collect();
    if let Some(KeySpec::Built(property)) = &model.key {
        pending.push(("key".to_string(), property.as_ref()));
    }

    while let Some((path, property)) = pending.pop() {
        if let Some(template) = property.data.fake.as_deref() {
            let unknown = faker.unknown_ids(template);
            if !unknown.is_empty() {
                return Err(GenerationError::InvalidModel(format!(
                    "{}: {path}.data.fake uses unknown faker ids: {}",
                    model.name,
                    unknown.join(", ")
                )));
            }
        }
        if let Some(items) = property.items.as_deref() {
            pending.push((format!("{path}.items"), items));
        }
        for (name, child) in property.properties.iter() {
            pending.push((format!("{path}.properties.{name}"), child));
        }
    }
    Ok(())
}
