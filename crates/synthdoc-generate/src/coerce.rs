use serde_json::{Number, Value};
use synthdoc_core::PropertyType;

const FALSE_LITERALS: &[&str] = &["false", "0", "undefined", "null", ""];

/// Empty value a field holds before its build phase runs.
pub fn zero_value(ty: PropertyType) -> Value {
    match ty {
        PropertyType::String => Value::String(String::new()),
        PropertyType::Integer => Value::from(0),
        PropertyType::Double => Value::from(0.0),
        PropertyType::Boolean => Value::Bool(false),
        PropertyType::Object => Value::Object(Default::default()),
        PropertyType::Array => Value::Array(Vec::new()),
        PropertyType::Null => Value::Null,
    }
}

/// Coerce a built value to its declared type.
///
/// Unknown or `null` types leave the value alone, as do numeric strings that
/// fail to parse. `null` only changes for booleans, where it becomes `false`.
pub fn transform_value_to_type(ty: Option<PropertyType>, value: Value) -> Value {
    let Some(ty) = ty else {
        return value;
    };
    match ty {
        PropertyType::Null | PropertyType::Object | PropertyType::Array => value,
        PropertyType::String => to_string(value),
        PropertyType::Integer => to_integer(value),
        PropertyType::Double => to_double(value),
        PropertyType::Boolean => Value::Bool(truthy(&value)),
    }
}

fn to_string(value: Value) -> Value {
    match value {
        Value::Null | Value::String(_) => value,
        Value::Bool(flag) => Value::String(flag.to_string()),
        Value::Number(number) => Value::String(number.to_string()),
        other => Value::String(other.to_string()),
    }
}

fn to_integer(value: Value) -> Value {
    let parsed = match &value {
        Value::Number(number) if number.is_f64() => number.as_f64().and_then(truncate),
        Value::String(text) => parse_integer(text.trim()),
        _ => None,
    };
    parsed.unwrap_or(value)
}

fn parse_integer(text: &str) -> Option<Value> {
    match text.parse::<i64>() {
        Ok(integer) => Some(Value::from(integer)),
        Err(_) => text.parse::<f64>().ok().and_then(truncate),
    }
}

fn truncate(float: f64) -> Option<Value> {
    float.is_finite().then(|| Value::from(float.trunc() as i64))
}

fn to_double(value: Value) -> Value {
    let parsed = match &value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(value)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|float| float != 0.0),
        Value::String(text) => !FALSE_LITERALS.contains(&text.trim()),
        Value::Array(_) | Value::Object(_) => true,
    }
}
