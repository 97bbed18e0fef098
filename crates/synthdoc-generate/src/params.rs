use serde_json::{Map, Value};

use crate::errors::GenerationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Bool,
    Int,
    Float,
    String,
    Array,
    /// Any JSON value, including null.
    Any,
}

#[derive(Clone, Copy, Debug)]
pub struct ParamSpec {
    pub key: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

impl ParamSpec {
    pub const fn new(key: &'static str, kind: ParamKind, required: bool) -> Self {
        Self {
            key,
            kind,
            required,
        }
    }
}

pub struct ParamMap<'a> {
    map: Option<&'a Map<String, Value>>,
}

pub fn validate_params<'a>(
    params: Option<&'a Value>,
    specs: &[ParamSpec],
    ctx: &str,
) -> Result<ParamMap<'a>, GenerationError> {
    let map = match params {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map),
        Some(_) => {
            return Err(GenerationError::InvalidParams(format!(
                "{ctx}: params must be a JSON object"
            )));
        }
    };

    if let Some(map) = map {
        for (key, value) in map {
            let Some(spec) = specs.iter().find(|spec| spec.key == key.as_str()) else {
                return Err(GenerationError::InvalidParams(format!(
                    "{ctx}: unknown param '{key}'"
                )));
            };
            validate_kind(ctx, key, spec.kind, value)?;
        }
    }

    for spec in specs {
        if spec.required && !map.is_some_and(|map| map.contains_key(spec.key)) {
            return Err(GenerationError::InvalidParams(format!(
                "{ctx}: missing required param '{}'",
                spec.key
            )));
        }
    }

    Ok(ParamMap { map })
}

impl<'a> ParamMap<'a> {
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.and_then(|map| map.get(key))
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_str(&self, key: &str) -> Option<&'a str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_array(&self, key: &str) -> Option<&'a Vec<Value>> {
        self.get(key).and_then(Value::as_array)
    }

    /// Required string param; validation already guaranteed presence.
    pub fn require_str(&self, key: &str, ctx: &str) -> Result<&'a str, GenerationError> {
        self.get_str(key).ok_or_else(|| {
            GenerationError::InvalidParams(format!("{ctx}: missing required param '{key}'"))
        })
    }
}

fn validate_kind(
    ctx: &str,
    key: &str,
    kind: ParamKind,
    value: &Value,
) -> Result<(), GenerationError> {
    let valid = match kind {
        ParamKind::Bool => value.is_boolean(),
        ParamKind::Int => value.as_i64().is_some(),
        ParamKind::Float => value.as_f64().is_some(),
        ParamKind::String => value.is_string(),
        ParamKind::Array => value.is_array(),
        ParamKind::Any => true,
    };

    if valid {
        Ok(())
    } else {
        Err(GenerationError::InvalidParams(format!(
            "{ctx}: invalid value for param '{key}'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SPECS: &[ParamSpec] = &[
        ParamSpec::new("min", ParamKind::Int, true),
        ParamSpec::new("label", ParamKind::String, false),
    ];

    #[test]
    fn accepts_declared_params() {
        let params = json!({ "min": 3, "label": "x" });
        let map = validate_params(Some(&params), SPECS, "test").expect("valid");
        assert_eq!(map.get_i64("min"), Some(3));
        assert_eq!(map.get_str("label"), Some("x"));
    }

    #[test]
    fn rejects_unknown_missing_and_mistyped_params() {
        let unknown = json!({ "min": 1, "other": true });
        assert!(validate_params(Some(&unknown), SPECS, "test").is_err());

        let missing = json!({ "label": "x" });
        assert!(validate_params(Some(&missing), SPECS, "test").is_err());

        let mistyped = json!({ "min": "three" });
        assert!(validate_params(Some(&mistyped), SPECS, "test").is_err());

        assert!(validate_params(Some(&json!([1])), SPECS, "test").is_err());
    }
}
