use std::collections::BTreeSet;

use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::{Model, Property, PropertyType};

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Error,
    Warning,
}

/// Structured validation issue with location and hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub code: String,
    pub model: Option<String>,
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn error(
        code: impl Into<String>,
        model: Option<&str>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: IssueSeverity::Error,
            code: code.into(),
            model: model.map(str::to_string),
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn warning(
        code: impl Into<String>,
        model: Option<&str>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: IssueSeverity::Warning,
            ..Self::error(code, model, path, message)
        }
    }
}

/// Aggregated validation report with errors and warnings.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Returns true when there are no errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        match issue.severity {
            IssueSeverity::Error => self.errors.push(issue),
            IssueSeverity::Warning => self.warnings.push(issue),
        }
    }

    /// Merge another report into this one.
    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// True when any error was raised for the named model.
    pub fn has_errors_for(&self, model: &str) -> bool {
        self.errors
            .iter()
            .any(|issue| issue.model.as_deref() == Some(model))
    }
}

/// JSON Schema describing a model file.
pub fn model_json_schema() -> Result<Value> {
    let schema = schemars::schema_for!(Model);
    Ok(serde_json::to_value(schema)?)
}

/// Validate raw model JSON against the model JSON Schema.
pub fn validate_model_json(raw: &Value) -> Result<ValidationReport> {
    let schema = model_json_schema()?;
    let compiled = JSONSchema::compile(&schema).map_err(|err| Error::Schema(err.to_string()))?;
    let model = raw.get("name").and_then(Value::as_str);

    let mut report = ValidationReport::default();
    if let Err(errors) = compiled.validate(raw) {
        for error in errors {
            let path = normalized_json_pointer(&error.instance_path.to_string());
            report.push(ValidationIssue::error(
                "schema_violation",
                model,
                path,
                error.to_string(),
            ));
        }
    }
    Ok(report)
}

/// Structural checks on a parsed model.
///
/// This checks:
/// - the model has a name and a root `type`
/// - a `key` is configured (warning only, the fallback key applies)
/// - a model does not list itself or the same dependency twice
/// - array properties describe their items
pub fn validate_model(model: &Model) -> ValidationReport {
    let mut report = ValidationReport::default();
    let name = Some(model.name.as_str());

    if model.name.trim().is_empty() {
        report.push(ValidationIssue::error(
            "missing_name",
            None,
            "/name",
            "model name must not be empty",
        ));
    }

    if model.ty.is_none() {
        report.push(ValidationIssue::error(
            "missing_type",
            name,
            "/type",
            format!("model '{}' does not declare a type", model.name),
        ));
    }

    if model.key.is_none() {
        report.push(ValidationIssue::warning(
            "missing_key",
            name,
            "/key",
            format!(
                "model '{}' has no key; documents fall back to '{}_<index>'",
                model.name, model.name
            ),
        ));
    }

    let mut seen = BTreeSet::new();
    for dependency in &model.data.dependencies {
        if dependency == &model.name {
            report.push(ValidationIssue::error(
                "self_dependency",
                name,
                "/data/dependencies",
                format!("model '{}' depends on itself", model.name),
            ));
        }
        if !seen.insert(dependency) {
            report.push(ValidationIssue::warning(
                "duplicate_dependency",
                name,
                "/data/dependencies",
                format!("dependency '{dependency}' listed more than once"),
            ));
        }
    }

    for (field, property) in model.properties.iter() {
        validate_property(model, &format!("/properties/{field}"), property, &mut report);
    }

    report
}

fn validate_property(model: &Model, path: &str, property: &Property, report: &mut ValidationReport) {
    if property.ty == PropertyType::Array && property.items.is_none() && !property.data.has_generator()
    {
        report.push(ValidationIssue::warning(
            "array_without_items",
            Some(&model.name),
            path,
            "array property has no items; it will stay empty",
        ));
    }
    if let Some(items) = &property.items {
        validate_property(model, &format!("{path}/items"), items, report);
    }
    for (field, child) in property.properties.iter() {
        validate_property(model, &format!("{path}/properties/{field}"), child, report);
    }
}

fn normalized_json_pointer(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_type_is_an_error_and_missing_key_a_warning() {
        let model: Model =
            serde_json::from_value(json!({ "name": "users" })).expect("parse model");
        let report = validate_model(&model);

        assert!(!report.is_ok());
        assert_eq!(report.errors[0].code, "missing_type");
        assert_eq!(report.warnings[0].code, "missing_key");
        assert!(report.has_errors_for("users"));
    }

    #[test]
    fn json_schema_accepts_a_well_formed_model() {
        let raw = json!({
            "name": "users",
            "type": "object",
            "key": "id",
            "data": { "count": 3 },
            "properties": {
                "id": { "type": "integer", "data": { "build": "sequence" } },
                "tags": {
                    "type": "array",
                    "data": { "min": 1, "max": 3 },
                    "items": { "type": "string", "data": { "fake": "{{lorem.word}}" } }
                }
            }
        });

        let report = validate_model_json(&raw).expect("validate");
        assert!(report.is_ok(), "unexpected errors: {:?}", report.errors);
    }

    #[test]
    fn json_schema_flags_wrong_field_kinds() {
        let raw = json!({ "name": "users", "type": "object", "data": { "dependencies": "orders" } });

        let report = validate_model_json(&raw).expect("validate");
        assert!(!report.is_ok());
        assert_eq!(report.errors[0].code, "schema_violation");
    }
}
