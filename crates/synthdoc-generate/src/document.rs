use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// A generated instance of a model.
///
/// `key` and `model` are identity metadata and stay out of the serialized
/// form, which is the body alone.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub key: String,
    pub model: String,
    pub body: Map<String, Value>,
}

impl Document {
    pub fn new(key: impl Into<String>, model: impl Into<String>, body: Map<String, Value>) -> Self {
        Self {
            key: key.into(),
            model: model.into(),
            body,
        }
    }

    /// Dotted path lookup into the body.
    pub fn get(&self, path: &str) -> Option<&Value> {
        get_path(&self.body, path.split('.'))
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.body)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.body.serialize(serializer)
    }
}

pub(crate) fn get_path<'a, I, S>(body: &'a Map<String, Value>, path: I) -> Option<&'a Value>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut segments = path.into_iter();
    let first = segments.next()?;
    let mut current = body.get(first.as_ref())?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment.as_ref())?,
            Value::Array(items) => items.get(segment.as_ref().parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Set a value at `path`, replacing non-object intermediates with objects.
pub(crate) fn set_path(body: &mut Map<String, Value>, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = body;
    for segment in parents {
        let slot = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(map) = slot else {
            return;
        };
        current = map;
    }
    current.insert(last.clone(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_only_the_body() {
        let body = json!({ "name": "Ada" }).as_object().cloned().unwrap_or_default();
        let document = Document::new("users_0", "users", body);
        assert_eq!(serde_json::to_value(&document).expect("json"), json!({ "name": "Ada" }));
    }

    #[test]
    fn paths_read_and_write_nested_fields() {
        let mut body = Map::new();
        let path = vec!["a".to_string(), "b".to_string()];
        set_path(&mut body, &path, json!(1));
        set_path(&mut body, &["list".to_string()], json!([{ "x": 5 }]));
        let document = Document::new("k", "m", body);
        assert_eq!(document.get("a.b"), Some(&json!(1)));
        assert_eq!(document.get("list.0.x"), Some(&json!(5)));
        assert_eq!(document.get("a.missing"), None);
    }
}
