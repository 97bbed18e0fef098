use std::collections::BTreeSet;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{KeySpec, Model, ModelData, Properties, Property, Seed};
use crate::validation::{ValidationIssue, ValidationReport, validate_model};

const DEFINITIONS_PREFIX: &str = "#/definitions/";

/// Run-level overrides applied while normalizing.
#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    /// Global document cap; wins over every model-level count.
    pub count_override: Option<u64>,
    /// Global seed; wins over every model-level seed.
    pub seed_override: Option<u64>,
}

/// Models that passed validation, plus everything reported along the way.
#[derive(Debug, Clone, Default)]
pub struct NormalizedModels {
    pub models: Vec<Model>,
    pub report: ValidationReport,
}

/// Normalize a full model set.
///
/// Models with validation errors are dropped from the result and reported;
/// the remaining models are still normalized. Duplicate names and
/// unresolvable `$ref` targets abort the whole call.
pub fn normalize_models(models: Vec<Model>, options: &NormalizeOptions) -> Result<NormalizedModels> {
    let mut names = BTreeSet::new();
    for model in &models {
        if !names.insert(model.name.clone()) {
            return Err(Error::DuplicateModel(model.name.clone()));
        }
    }

    let mut normalized = NormalizedModels::default();
    for mut model in models {
        let report = normalize_model(&mut model, options)?;
        let rejected = report.has_errors_for(&model.name);
        for issue in report.errors.iter().chain(report.warnings.iter()) {
            warn!(
                model = %model.name,
                code = %issue.code,
                path = %issue.path,
                message = %issue.message,
                "model validation issue"
            );
        }
        normalized.report.merge(report);
        if rejected {
            warn!(model = %model.name, "model rejected");
            continue;
        }
        normalized.models.push(model);
    }

    Ok(normalized)
}

/// Fill defaults, fold the seed, inline `$ref` subtrees and settle the count.
pub fn normalize_model(model: &mut Model, options: &NormalizeOptions) -> Result<ValidationReport> {
    let mut report = validate_model(model);

    model.seed = match options.seed_override {
        Some(seed) => Some(Seed::Number(seed)),
        None => model.seed.as_ref().map(|seed| Seed::Number(seed.value())),
    };

    let model_name = model.name.clone();
    let raw_definitions = model.definitions.clone();
    let mut resolver = RefResolver::new(&model_name, &raw_definitions);
    let names: Vec<String> = raw_definitions.names().map(str::to_string).collect();
    for name in &names {
        resolver.definition(name, name)?;
    }
    let definitions = resolver.resolved.clone();

    for (_, property) in model.properties.iter_mut() {
        resolver.property(property)?;
    }
    if let Some(KeySpec::Built(property)) = model.key.as_mut() {
        resolver.property(property)?;
    }
    model.definitions = definitions;

    for (name, property) in model.properties.iter_mut() {
        fill_property_defaults(&model.name, &format!("/properties/{name}"), property, &mut report);
    }

    let count = resolve_count(&model.data, options.count_override, model.seed_value());
    model.data.count = Some(count);
    debug!(model = %model.name, count, seed = ?model.seed_value(), "model normalized");

    Ok(report)
}

fn resolve_count(data: &ModelData, count_override: Option<u64>, seed: Option<u64>) -> u64 {
    if let Some(count) = count_override {
        return count;
    }
    if let Some(count) = data.count {
        return count;
    }
    match data.max {
        Some(max) if max > 0 => {
            let min = data.min.unwrap_or(0).min(max);
            let mut rng = match seed {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => ChaCha8Rng::from_rng(&mut rand::rng()),
            };
            rng.random_range(min..=max)
        }
        _ => 1,
    }
}

fn fill_property_defaults(
    model: &str,
    path: &str,
    property: &mut Property,
    report: &mut ValidationReport,
) {
    let data = &mut property.data;
    if data.max > 0 && data.min > data.max {
        report.push(ValidationIssue::warning(
            "min_exceeds_max",
            Some(model),
            path,
            format!("min {} exceeds max {}; using max = min", data.min, data.max),
        ));
        data.max = data.min;
    }
    if let Some(items) = property.items.as_mut() {
        fill_property_defaults(model, &format!("{path}/items"), items, report);
    }
    for (name, child) in property.properties.iter_mut() {
        fill_property_defaults(model, &format!("{path}/properties/{name}"), child, report);
    }
}

/// Inlines `$ref` targets; definitions resolve before the properties using them.
struct RefResolver<'a> {
    model: &'a str,
    raw: &'a Properties,
    resolved: Properties,
    visiting: Vec<String>,
}

impl<'a> RefResolver<'a> {
    fn new(model: &'a str, raw: &'a Properties) -> Self {
        Self {
            model,
            raw,
            resolved: Properties::new(),
            visiting: Vec::new(),
        }
    }

    fn definition(&mut self, name: &str, reference: &str) -> Result<Property> {
        if let Some(done) = self.resolved.get(name) {
            return Ok(done.clone());
        }
        if self.visiting.iter().any(|visiting| visiting == name) {
            return Err(self.unresolved(reference));
        }
        let mut property = self
            .raw
            .get(name)
            .cloned()
            .ok_or_else(|| self.unresolved(reference))?;

        self.visiting.push(name.to_string());
        self.property(&mut property)?;
        self.visiting.pop();

        self.resolved.insert(name, property.clone());
        Ok(property)
    }

    fn property(&mut self, property: &mut Property) -> Result<()> {
        if let Some(reference) = property.reference.take() {
            let name = reference
                .strip_prefix(DEFINITIONS_PREFIX)
                .unwrap_or(&reference)
                .to_string();
            let target = self.definition(&name, &reference)?;
            let own_data = std::mem::take(&mut property.data);
            let own_description = property.description.take();
            *property = target;
            if !own_data.is_empty() {
                property.data = own_data;
            }
            if own_description.is_some() {
                property.description = own_description;
            }
        }
        if let Some(items) = property.items.as_mut() {
            self.property(items)?;
        }
        for (_, child) in property.properties.iter_mut() {
            self.property(child)?;
        }
        Ok(())
    }

    fn unresolved(&self, reference: &str) -> Error {
        Error::UnresolvedRef {
            model: self.model.to_string(),
            reference: reference.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertyType;
    use serde_json::json;

    fn model(value: serde_json::Value) -> Model {
        serde_json::from_value(value).expect("parse model")
    }

    #[test]
    fn refs_are_inlined_through_nested_definitions() {
        let mut users = model(json!({
            "name": "users",
            "type": "object",
            "key": "id",
            "definitions": {
                "address": {
                    "type": "object",
                    "properties": { "city": { "$ref": "#/definitions/city" } }
                },
                "city": { "type": "string", "data": { "fake": "{{address.city}}" } }
            },
            "properties": {
                "home": { "$ref": "#/definitions/address" },
                "work": { "$ref": "address", "description": "office" }
            }
        }));

        normalize_model(&mut users, &NormalizeOptions::default()).expect("normalize");

        let home = users.properties.get("home").expect("home");
        assert_eq!(home.ty, PropertyType::Object);
        let city = home.properties.get("city").expect("city");
        assert_eq!(city.ty, PropertyType::String);
        assert_eq!(city.data.fake.as_deref(), Some("{{address.city}}"));
        assert!(city.reference.is_none());

        let work = users.properties.get("work").expect("work");
        assert_eq!(work.description.as_deref(), Some("office"));
        assert!(work.properties.get("city").is_some());
    }

    #[test]
    fn unresolvable_ref_is_fatal() {
        let mut users = model(json!({
            "name": "users",
            "type": "object",
            "properties": { "home": { "$ref": "#/definitions/missing" } }
        }));

        let err = normalize_model(&mut users, &NormalizeOptions::default()).unwrap_err();
        assert!(matches!(err, Error::UnresolvedRef { ref reference, .. } if reference == "#/definitions/missing"));
    }

    #[test]
    fn self_referencing_definitions_are_rejected() {
        let mut users = model(json!({
            "name": "users",
            "type": "object",
            "definitions": { "loop": { "type": "object", "properties": { "next": { "$ref": "loop" } } } },
            "properties": {}
        }));

        assert!(normalize_model(&mut users, &NormalizeOptions::default()).is_err());
    }

    #[test]
    fn count_prefers_override_then_count_then_range() {
        let data = ModelData {
            count: Some(7),
            min: Some(1),
            max: Some(3),
            ..ModelData::default()
        };
        assert_eq!(resolve_count(&data, Some(2), None), 2);
        assert_eq!(resolve_count(&data, None, None), 7);

        let ranged = ModelData {
            min: Some(4),
            max: Some(9),
            ..ModelData::default()
        };
        for seed in 0..20 {
            let count = resolve_count(&ranged, None, Some(seed));
            assert!((4..=9).contains(&count));
            assert_eq!(count, resolve_count(&ranged, None, Some(seed)));
        }

        assert_eq!(resolve_count(&ModelData::default(), None, None), 1);
    }

    #[test]
    fn string_seed_is_folded_during_normalization() {
        let mut users = model(json!({ "name": "users", "type": "object", "seed": "ab" }));
        normalize_model(&mut users, &NormalizeOptions::default()).expect("normalize");
        assert_eq!(users.seed, Some(Seed::Number(195)));
    }

    #[test]
    fn invalid_models_are_dropped_without_aborting_others() {
        let models = vec![
            model(json!({ "name": "broken" })),
            model(json!({ "name": "users", "type": "object", "key": "id" })),
        ];

        let normalized = normalize_models(models, &NormalizeOptions::default()).expect("normalize");
        let names: Vec<&str> = normalized.models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["users"]);
        assert!(normalized.report.has_errors_for("broken"));
    }

    #[test]
    fn duplicate_model_names_are_fatal() {
        let models = vec![
            model(json!({ "name": "users", "type": "object" })),
            model(json!({ "name": "users", "type": "object" })),
        ];
        assert!(matches!(
            normalize_models(models, &NormalizeOptions::default()),
            Err(Error::DuplicateModel(_))
        ));
    }
}
