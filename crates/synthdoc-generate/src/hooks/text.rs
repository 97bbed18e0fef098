use serde_json::Value;

use crate::errors::GenerationError;
use crate::faker::Faker;
use crate::hooks::{Hook, HookContext, HookRegistry};
use crate::params::{ParamKind, ParamSpec, validate_params};

const FAKER_PARAMS: &[ParamSpec] = &[ParamSpec::new("id", ParamKind::String, true)];
const TEMPLATE_PARAMS: &[ParamSpec] = &[ParamSpec::new("template", ParamKind::String, true)];
const CONCAT_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("fields", ParamKind::Array, true),
    ParamSpec::new("separator", ParamKind::String, false),
];
const CASE_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("mode", ParamKind::String, true),
    ParamSpec::new("field", ParamKind::String, false),
];

const INDEX_PLACEHOLDER: &str = "index";
const DOCUMENT_PREFIX: &str = "doc.";

pub fn register(registry: &mut HookRegistry) {
    registry.register(Box::new(FakerHook));
    registry.register(Box::new(TemplateHook));
    registry.register(Box::new(ConcatHook));
    registry.register(Box::new(CaseHook));
}

struct FakerHook;

impl Hook for FakerHook {
    fn id(&self) -> &'static str {
        "faker"
    }

    fn validate(&self, params: Option<&Value>) -> Result<(), GenerationError> {
        let params = validate_params(params, FAKER_PARAMS, self.id())?;
        let id = params.require_str("id", self.id())?;
        if !Faker::supports(id) {
            return Err(GenerationError::InvalidParams(format!(
                "faker: unsupported faker id '{id}'"
            )));
        }
        Ok(())
    }

    fn call(
        &self,
        ctx: &mut HookContext<'_>,
        params: Option<&Value>,
    ) -> Result<Option<Value>, GenerationError> {
        let params = validate_params(params, FAKER_PARAMS, self.id())?;
        let id = params.require_str("id", self.id())?;
        let value = ctx.faker.generate(id, ctx.rng)?;
        Ok(Some(Value::String(value)))
    }
}

/// Faker template that can also reference `{{index}}` and `{{doc.<path>}}`.
struct TemplateHook;

impl Hook for TemplateHook {
    fn id(&self) -> &'static str {
        "template"
    }

    fn validate(&self, params: Option<&Value>) -> Result<(), GenerationError> {
        validate_params(params, TEMPLATE_PARAMS, self.id()).map(|_| ())
    }

    fn call(
        &self,
        ctx: &mut HookContext<'_>,
        params: Option<&Value>,
    ) -> Result<Option<Value>, GenerationError> {
        let params = validate_params(params, TEMPLATE_PARAMS, self.id())?;
        let template = params.require_str("template", self.id())?;
        let index = ctx.index;
        let document = &*ctx.document;
        let expanded = ctx.faker.expand_with(template, ctx.rng, |id| {
            if id == INDEX_PLACEHOLDER {
                return Some(index.to_string());
            }
            let path = id.strip_prefix(DOCUMENT_PREFIX)?;
            crate::document::get_path(document, path.split('.')).map(display)
        })?;
        Ok(Some(Value::String(expanded)))
    }
}

struct ConcatHook;

impl Hook for ConcatHook {
    fn id(&self) -> &'static str {
        "concat"
    }

    fn validate(&self, params: Option<&Value>) -> Result<(), GenerationError> {
        validate_params(params, CONCAT_PARAMS, self.id()).map(|_| ())
    }

    fn call(
        &self,
        ctx: &mut HookContext<'_>,
        params: Option<&Value>,
    ) -> Result<Option<Value>, GenerationError> {
        let params = validate_params(params, CONCAT_PARAMS, self.id())?;
        let separator = params.get_str("separator").unwrap_or(" ");
        let fields = params.get_array("fields").cloned().unwrap_or_default();
        let mut parts = Vec::with_capacity(fields.len());
        for field in &fields {
            let path = field
                .as_str()
                .ok_or_else(|| ctx.error(self.id(), "fields must be strings"))?;
            if let Some(value) = ctx.lookup(path) {
                parts.push(display(value));
            }
        }
        Ok(Some(Value::String(parts.join(separator))))
    }
}

/// Re-case a string: the named `field`, or the working value.
struct CaseHook;

impl Hook for CaseHook {
    fn id(&self) -> &'static str {
        "case"
    }

    fn validate(&self, params: Option<&Value>) -> Result<(), GenerationError> {
        let params = validate_params(params, CASE_PARAMS, self.id())?;
        let mode = params.require_str("mode", self.id())?;
        if !matches!(mode, "upper" | "lower" | "title") {
            return Err(GenerationError::InvalidParams(format!(
                "case: unknown mode '{mode}'"
            )));
        }
        Ok(())
    }

    fn call(
        &self,
        ctx: &mut HookContext<'_>,
        params: Option<&Value>,
    ) -> Result<Option<Value>, GenerationError> {
        let params = validate_params(params, CASE_PARAMS, self.id())?;
        let mode = params.require_str("mode", self.id())?;
        let source = match params.get_str("field") {
            Some(path) => ctx.lookup(path).cloned(),
            None => ctx.current.clone(),
        };
        let Some(Value::String(text)) = source else {
            return Ok(None);
        };
        let value = match mode {
            "upper" => text.to_uppercase(),
            "lower" => text.to_lowercase(),
            "title" => title_case(&text),
            other => return Err(ctx.error(self.id(), format!("unknown mode '{other}'"))),
        };
        Ok(Some(Value::String(value)))
    }
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
