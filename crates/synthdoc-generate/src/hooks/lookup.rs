use rand::Rng;
use serde_json::{Value, json};

use crate::document::get_path;
use crate::errors::GenerationError;
use crate::hooks::{Hook, HookContext, HookRegistry};
use crate::params::{ParamKind, ParamSpec, validate_params};

const PICK_PARAMS: &[ParamSpec] = &[ParamSpec::new("values", ParamKind::Array, true)];
const INPUT_PICK_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("input", ParamKind::String, true),
    ParamSpec::new("field", ParamKind::String, false),
];
const REF_PICK_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("model", ParamKind::String, true),
    ParamSpec::new("field", ParamKind::String, false),
];
const FIELD_COPY_PARAMS: &[ParamSpec] = &[ParamSpec::new("field", ParamKind::String, true)];
const COUNTER_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("name", ParamKind::String, false),
    ParamSpec::new("start", ParamKind::Int, false),
    ParamSpec::new("step", ParamKind::Int, false),
];

const DEFAULT_COUNTER: &str = "counter";

pub fn register(registry: &mut HookRegistry) {
    registry.register(Box::new(PickHook));
    registry.register(Box::new(InputPickHook));
    registry.register(Box::new(RefPickHook));
    registry.register(Box::new(FieldCopyHook));
    registry.register(Box::new(GlobalsCounterHook));
}

struct PickHook;

impl Hook for PickHook {
    fn id(&self) -> &'static str {
        "pick"
    }

    fn validate(&self, params: Option<&Value>) -> Result<(), GenerationError> {
        let params = validate_params(params, PICK_PARAMS, self.id())?;
        if params.get_array("values").is_some_and(Vec::is_empty) {
            return Err(GenerationError::InvalidParams(
                "pick: values must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn call(
        &self,
        ctx: &mut HookContext<'_>,
        params: Option<&Value>,
    ) -> Result<Option<Value>, GenerationError> {
        let params = validate_params(params, PICK_PARAMS, self.id())?;
        let values = params.get_array("values").map(Vec::as_slice).unwrap_or_default();
        Ok(choose(values, ctx.rng).cloned())
    }
}

/// Random element of an input dataset, optionally narrowed to a field.
struct InputPickHook;

impl Hook for InputPickHook {
    fn id(&self) -> &'static str {
        "input.pick"
    }

    fn validate(&self, params: Option<&Value>) -> Result<(), GenerationError> {
        validate_params(params, INPUT_PICK_PARAMS, self.id()).map(|_| ())
    }

    fn call(
        &self,
        ctx: &mut HookContext<'_>,
        params: Option<&Value>,
    ) -> Result<Option<Value>, GenerationError> {
        let params = validate_params(params, INPUT_PICK_PARAMS, self.id())?;
        let input = params.require_str("input", self.id())?;
        let dataset = ctx
            .inputs
            .get(input)
            .ok_or_else(|| ctx.error(self.id(), format!("input '{input}' is not loaded")))?;
        let Value::Array(rows) = dataset else {
            return Err(ctx.error(self.id(), format!("input '{input}' is not an array")));
        };
        let Some(row) = choose(rows.as_slice(), ctx.rng) else {
            return Ok(None);
        };
        Ok(match params.get_str("field") {
            Some(field) => match row {
                Value::Object(map) => get_path(map, field.split('.')).cloned(),
                _ => None,
            },
            None => Some(row.clone()),
        })
    }
}

/// Random completed document of a dependency model: a field of it, or its key.
struct RefPickHook;

impl Hook for RefPickHook {
    fn id(&self) -> &'static str {
        "ref.pick"
    }

    fn validate(&self, params: Option<&Value>) -> Result<(), GenerationError> {
        validate_params(params, REF_PICK_PARAMS, self.id()).map(|_| ())
    }

    fn call(
        &self,
        ctx: &mut HookContext<'_>,
        params: Option<&Value>,
    ) -> Result<Option<Value>, GenerationError> {
        let params = validate_params(params, REF_PICK_PARAMS, self.id())?;
        let model = params.require_str("model", self.id())?;
        let documents = ctx.dependency(model).ok_or_else(|| {
            ctx.error(
                self.id(),
                format!("documents of '{model}' are not available; is it a dependency?"),
            )
        })?;
        let Some(document) = choose(documents.as_slice(), ctx.rng) else {
            return Ok(None);
        };
        Ok(match params.get_str("field") {
            Some(field) => document.get(field).cloned(),
            None => Some(Value::String(document.key.clone())),
        })
    }
}

struct FieldCopyHook;

impl Hook for FieldCopyHook {
    fn id(&self) -> &'static str {
        "field.copy"
    }

    fn validate(&self, params: Option<&Value>) -> Result<(), GenerationError> {
        validate_params(params, FIELD_COPY_PARAMS, self.id()).map(|_| ())
    }

    fn call(
        &self,
        ctx: &mut HookContext<'_>,
        params: Option<&Value>,
    ) -> Result<Option<Value>, GenerationError> {
        let params = validate_params(params, FIELD_COPY_PARAMS, self.id())?;
        let field = params.require_str("field", self.id())?;
        Ok(ctx.lookup(field).cloned())
    }
}

/// Shared counter in the globals bag; returns the value after incrementing.
///
/// Concurrent builds of one model race for the next value, so the mapping
/// from generation index to counter value is not reproducible. Use
/// `sequence` when it has to be.
struct GlobalsCounterHook;

impl Hook for GlobalsCounterHook {
    fn id(&self) -> &'static str {
        "globals.counter"
    }

    fn validate(&self, params: Option<&Value>) -> Result<(), GenerationError> {
        validate_params(params, COUNTER_PARAMS, self.id()).map(|_| ())
    }

    fn call(
        &self,
        ctx: &mut HookContext<'_>,
        params: Option<&Value>,
    ) -> Result<Option<Value>, GenerationError> {
        let params = validate_params(params, COUNTER_PARAMS, self.id())?;
        let name = params.get_str("name").unwrap_or(DEFAULT_COUNTER);
        let start = params.get_i64("start").unwrap_or(1);
        let step = params.get_i64("step").unwrap_or(1);
        let next = ctx.globals.update(name, |current| match current.and_then(Value::as_i64) {
            Some(value) => json!(value.wrapping_add(step)),
            None => json!(start),
        });
        Ok(Some(next))
    }
}

fn choose<'v, T>(values: &'v [T], rng: &mut dyn rand::RngCore) -> Option<&'v T> {
    if values.is_empty() {
        return None;
    }
    values.get(rng.random_range(0..values.len()))
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, json};

    use crate::document::Document;
    use crate::hooks::testing::Fixture;

    #[test]
    fn pick_returns_one_of_the_values() {
        let mut fixture = Fixture::new();
        for index in 0..20 {
            let value = fixture
                .call("pick", json!({ "values": ["a", "b", "c"] }), index)
                .expect("pick")
                .expect("value");
            assert!(["a", "b", "c"].contains(&value.as_str().expect("string")));
        }
    }

    #[test]
    fn input_pick_reads_rows_and_fields() {
        let mut fixture = Fixture::new();
        fixture.inputs.insert(
            "cities".to_string(),
            json!([{ "name": "Lisbon", "geo": { "country": "PT" } }]),
        );
        let row = fixture.call("input.pick", json!({ "input": "cities" }), 0).expect("pick");
        assert_eq!(row, Some(json!({ "name": "Lisbon", "geo": { "country": "PT" } })));
        let field = fixture
            .call("input.pick", json!({ "input": "cities", "field": "geo.country" }), 0)
            .expect("pick");
        assert_eq!(field, Some(json!("PT")));
        assert!(fixture.call("input.pick", json!({ "input": "missing" }), 0).is_err());
    }

    #[test]
    fn ref_pick_uses_dependency_documents() {
        let mut fixture = Fixture::new();
        let mut body = Map::new();
        body.insert("email".to_string(), json!("ada@example.com"));
        fixture.store.insert("users", vec![Document::new("u1", "users", body)]);

        let key = fixture.call("ref.pick", json!({ "model": "users" }), 0).expect("ref");
        assert_eq!(key, Some(json!("u1")));
        let email = fixture
            .call("ref.pick", json!({ "model": "users", "field": "email" }), 0)
            .expect("ref");
        assert_eq!(email, Some(json!("ada@example.com")));
        assert!(fixture.call("ref.pick", json!({ "model": "ghosts" }), 0).is_err());
    }

    #[test]
    fn field_copy_and_counter() {
        let mut fixture = Fixture::new();
        fixture.document.insert("name".to_string(), json!("Ada"));
        assert_eq!(
            fixture.call("field.copy", json!({ "field": "name" }), 0).expect("copy"),
            Some(json!("Ada"))
        );
        assert_eq!(
            fixture.call("field.copy", json!({ "field": "nope" }), 0).expect("copy"),
            None
        );

        let params = json!({ "name": "ids", "start": 10, "step": 10 });
        let first = fixture.call("globals.counter", params.clone(), 0).expect("counter");
        let second = fixture.call("globals.counter", params, 1).expect("counter");
        assert_eq!((first, second), (Some(json!(10)), Some(json!(20))));
    }
}
