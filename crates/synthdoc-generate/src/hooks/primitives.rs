use rand::Rng;
use serde_json::{Value, json};

use crate::errors::GenerationError;
use crate::hooks::{Hook, HookContext, HookRegistry};
use crate::params::{ParamKind, ParamSpec, validate_params};

const DEFAULT_INT_MIN: i64 = 0;
const DEFAULT_INT_MAX: i64 = 100;
const DEFAULT_FLOAT_MIN: f64 = 0.0;
const DEFAULT_FLOAT_MAX: f64 = 1.0;

const SEQUENCE_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("start", ParamKind::Int, false),
    ParamSpec::new("step", ParamKind::Int, false),
];
const INT_RANGE_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("min", ParamKind::Int, false),
    ParamSpec::new("max", ParamKind::Int, false),
];
const FLOAT_RANGE_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("min", ParamKind::Float, false),
    ParamSpec::new("max", ParamKind::Float, false),
    ParamSpec::new("precision", ParamKind::Int, false),
];
const BOOL_PARAMS: &[ParamSpec] = &[ParamSpec::new("probability", ParamKind::Float, false)];

pub fn register(registry: &mut HookRegistry) {
    registry.register(Box::new(SequenceHook));
    registry.register(Box::new(IntRangeHook));
    registry.register(Box::new(FloatRangeHook));
    registry.register(Box::new(BoolHook));
    registry.register(Box::new(UuidHook));
    registry.register(Box::new(OmitHook));
    registry.register(Box::new(NullHook));
}

/// `start + step * index`; stable for a given generation index.
struct SequenceHook;

impl Hook for SequenceHook {
    fn id(&self) -> &'static str {
        "sequence"
    }

    fn validate(&self, params: Option<&Value>) -> Result<(), GenerationError> {
        validate_params(params, SEQUENCE_PARAMS, self.id()).map(|_| ())
    }

    fn call(
        &self,
        ctx: &mut HookContext<'_>,
        params: Option<&Value>,
    ) -> Result<Option<Value>, GenerationError> {
        let params = validate_params(params, SEQUENCE_PARAMS, self.id())?;
        let start = params.get_i64("start").unwrap_or(0);
        let step = params.get_i64("step").unwrap_or(1);
        let index = i64::try_from(ctx.index).unwrap_or(i64::MAX);
        Ok(Some(json!(start.wrapping_add(step.wrapping_mul(index)))))
    }
}

struct IntRangeHook;

impl Hook for IntRangeHook {
    fn id(&self) -> &'static str {
        "int.range"
    }

    fn validate(&self, params: Option<&Value>) -> Result<(), GenerationError> {
        let params = validate_params(params, INT_RANGE_PARAMS, self.id())?;
        int_bounds(params.get_i64("min"), params.get_i64("max")).map(|_| ())
    }

    fn call(
        &self,
        ctx: &mut HookContext<'_>,
        params: Option<&Value>,
    ) -> Result<Option<Value>, GenerationError> {
        let params = validate_params(params, INT_RANGE_PARAMS, self.id())?;
        let (min, max) = int_bounds(params.get_i64("min"), params.get_i64("max"))?;
        Ok(Some(json!(ctx.rng.random_range(min..=max))))
    }
}

fn int_bounds(min: Option<i64>, max: Option<i64>) -> Result<(i64, i64), GenerationError> {
    let min = min.unwrap_or(DEFAULT_INT_MIN);
    let max = max.unwrap_or(DEFAULT_INT_MAX.max(min));
    if min > max {
        return Err(GenerationError::InvalidParams(
            "int.range: min must be <= max".to_string(),
        ));
    }
    Ok((min, max))
}

struct FloatRangeHook;

impl Hook for FloatRangeHook {
    fn id(&self) -> &'static str {
        "float.range"
    }

    fn validate(&self, params: Option<&Value>) -> Result<(), GenerationError> {
        let params = validate_params(params, FLOAT_RANGE_PARAMS, self.id())?;
        float_bounds(params.get_f64("min"), params.get_f64("max")).map(|_| ())
    }

    fn call(
        &self,
        ctx: &mut HookContext<'_>,
        params: Option<&Value>,
    ) -> Result<Option<Value>, GenerationError> {
        let params = validate_params(params, FLOAT_RANGE_PARAMS, self.id())?;
        let (min, max) = float_bounds(params.get_f64("min"), params.get_f64("max"))?;
        let mut value = if min == max {
            min
        } else {
            ctx.rng.random_range(min..=max)
        };
        if let Some(precision) = params.get_i64("precision") {
            let factor = 10_f64.powi(precision.clamp(0, 12) as i32);
            value = (value * factor).round() / factor;
        }
        Ok(Some(json!(value)))
    }
}

fn float_bounds(min: Option<f64>, max: Option<f64>) -> Result<(f64, f64), GenerationError> {
    let min = min.unwrap_or(DEFAULT_FLOAT_MIN);
    let max = max.unwrap_or(DEFAULT_FLOAT_MAX.max(min));
    if !min.is_finite() || !max.is_finite() || min > max {
        return Err(GenerationError::InvalidParams(
            "float.range: min must be <= max".to_string(),
        ));
    }
    Ok((min, max))
}

struct BoolHook;

impl Hook for BoolHook {
    fn id(&self) -> &'static str {
        "bool"
    }

    fn validate(&self, params: Option<&Value>) -> Result<(), GenerationError> {
        validate_params(params, BOOL_PARAMS, self.id()).map(|_| ())
    }

    fn call(
        &self,
        ctx: &mut HookContext<'_>,
        params: Option<&Value>,
    ) -> Result<Option<Value>, GenerationError> {
        let params = validate_params(params, BOOL_PARAMS, self.id())?;
        let probability = params.get_f64("probability").unwrap_or(0.5).clamp(0.0, 1.0);
        Ok(Some(Value::Bool(ctx.rng.random_bool(probability))))
    }
}

/// Version 4 UUID drawn from the document RNG, so seeded runs repeat it.
struct UuidHook;

impl Hook for UuidHook {
    fn id(&self) -> &'static str {
        "uuid"
    }

    fn validate(&self, params: Option<&Value>) -> Result<(), GenerationError> {
        validate_params(params, &[], self.id()).map(|_| ())
    }

    fn call(
        &self,
        ctx: &mut HookContext<'_>,
        params: Option<&Value>,
    ) -> Result<Option<Value>, GenerationError> {
        validate_params(params, &[], self.id())?;
        let mut bytes = [0_u8; 16];
        ctx.rng.fill_bytes(&mut bytes);
        let uuid = uuid::Builder::from_random_bytes(bytes).into_uuid();
        Ok(Some(Value::String(uuid.to_string())))
    }
}

/// Always undefined; drops array items and leaves fields untouched.
struct OmitHook;

impl Hook for OmitHook {
    fn id(&self) -> &'static str {
        "omit"
    }

    fn call(
        &self,
        _ctx: &mut HookContext<'_>,
        _params: Option<&Value>,
    ) -> Result<Option<Value>, GenerationError> {
        Ok(None)
    }
}

struct NullHook;

impl Hook for NullHook {
    fn id(&self) -> &'static str {
        "null"
    }

    fn call(
        &self,
        _ctx: &mut HookContext<'_>,
        _params: Option<&Value>,
    ) -> Result<Option<Value>, GenerationError> {
        Ok(Some(Value::Null))
    }
}
