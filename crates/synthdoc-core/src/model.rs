use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use schemars::r#gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{Error, Result};

/// Accepted spellings for property types, in canonical-first groups.
pub const TYPE_SPELLINGS: &[&str] = &[
    "string",
    "number",
    "integer",
    "long",
    "double",
    "float",
    "boolean",
    "bool",
    "object",
    "structure",
    "array",
    "null",
];

/// Closed set of value types a property can declare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PropertyType {
    String,
    /// `number`, `integer` and `long`; coerced with an integer parse.
    Integer,
    /// `double` and `float`.
    Double,
    Boolean,
    Object,
    Array,
    /// Explicit `null` or an absent type.
    #[default]
    Null,
}

impl PropertyType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Double => "double",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Null => "null",
        }
    }

    pub fn is_object(self) -> bool {
        self == Self::Object
    }

    pub fn is_array(self) -> bool {
        self == Self::Array
    }
}

impl FromStr for PropertyType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "string" => Ok(Self::String),
            "number" | "integer" | "long" => Ok(Self::Integer),
            "double" | "float" => Ok(Self::Double),
            "boolean" | "bool" => Ok(Self::Boolean),
            "object" | "structure" => Ok(Self::Object),
            "array" => Ok(Self::Array),
            "null" => Ok(Self::Null),
            other => Err(Error::InvalidModel(format!(
                "unknown property type '{other}'"
            ))),
        }
    }
}

impl TryFrom<String> for PropertyType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PropertyType> for String {
    fn from(value: PropertyType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl JsonSchema for PropertyType {
    fn schema_name() -> String {
        "PropertyType".to_string()
    }

    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        SchemaObject {
            instance_type: Some(InstanceType::String.into()),
            enum_values: Some(TYPE_SPELLINGS.iter().map(|name| Value::from(*name)).collect()),
            ..Default::default()
        }
        .into()
    }
}

/// Reference to a registered hook; accepts a bare name or a full spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum HookRef {
    Name(String),
    Spec(HookSpec),
}

/// Hook spec with optional params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HookSpec {
    pub hook: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl HookRef {
    pub fn name(&self) -> &str {
        match self {
            HookRef::Name(name) => name.as_str(),
            HookRef::Spec(spec) => spec.hook.as_str(),
        }
    }

    pub fn params(&self) -> Option<&Value> {
        match self {
            HookRef::Name(_) => None,
            HookRef::Spec(spec) => spec.params.as_ref(),
        }
    }
}

/// Determinism seed; string seeds fold to the sum of their character codes.
///
/// Any JSON number is accepted. Negative and fractional seeds keep their bit
/// pattern as the numeric seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Seed {
    Number(u64),
    Signed(i64),
    Float(f64),
    Text(String),
}

impl Seed {
    pub fn value(&self) -> u64 {
        match self {
            Seed::Number(value) => *value,
            Seed::Signed(value) => *value as u64,
            Seed::Float(value) => value.to_bits(),
            Seed::Text(text) => text.chars().map(|ch| u64::from(u32::from(ch))).sum(),
        }
    }
}

/// How a document's identity key is derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum KeySpec {
    /// Dotted path into the completed document.
    Path(String),
    /// Property built against the completed document.
    Built(Box<Property>),
}

/// Ordered property map; iteration follows declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(Vec<(String, Property)>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.0.iter().map(|(name, property)| (name.as_str(), property))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Property)> {
        self.0
            .iter_mut()
            .map(|(name, property)| (name.as_str(), property))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, property)| property)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.0
            .iter_mut()
            .find(|(key, _)| key == name)
            .map(|(_, property)| property)
    }

    /// Insert or replace in place, keeping the original position.
    pub fn insert(&mut self, name: impl Into<String>, property: Property) {
        let name = name.into();
        match self.get_mut(&name) {
            Some(existing) => *existing = property,
            None => self.0.push((name, property)),
        }
    }
}

impl FromIterator<(String, Property)> for Properties {
    fn from_iter<T: IntoIterator<Item = (String, Property)>>(iter: T) -> Self {
        let mut properties = Properties::new();
        for (name, property) in iter {
            properties.insert(name, property);
        }
        properties
    }
}

impl Serialize for Properties {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, property) in &self.0 {
            map.serialize_entry(name, property)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Properties {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct PropertiesVisitor;

        impl<'de> Visitor<'de> for PropertiesVisitor {
            type Value = Properties;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of property name to property")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Properties, A::Error> {
                let mut properties = Properties::new();
                while let Some((name, property)) = access.next_entry::<String, Property>()? {
                    properties.insert(name, property);
                }
                Ok(properties)
            }
        }

        deserializer.deserialize_map(PropertiesVisitor)
    }
}

impl JsonSchema for Properties {
    fn schema_name() -> String {
        "Properties".to_string()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        <BTreeMap<String, Property>>::json_schema(generator)
    }
}

/// Per-property generation instructions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PropertyData {
    /// Static literal; wins over every hook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<HookRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_build: Option<HookRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_build: Option<HookRef>,
    /// Templated fake value, e.g. `{{name.first_name}} {{name.last_name}}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fake: Option<String>,
    #[serde(default)]
    pub min: u64,
    #[serde(default)]
    pub max: u64,
    #[serde(default)]
    pub count: u64,
}

impl PropertyData {
    /// True when a literal, build hook or fake pattern decides the value.
    pub fn has_generator(&self) -> bool {
        self.value.is_some() || self.build.is_some() || self.fake.is_some()
    }

    /// True when any array cardinality setting is present.
    pub fn has_cardinality(&self) -> bool {
        self.count > 0 || self.max > 0
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One schema node: a field or an array item descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Property {
    #[serde(rename = "type", default)]
    pub ty: PropertyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "PropertyData::is_empty")]
    pub data: PropertyData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Property>>,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
}

impl Property {
    pub fn of_type(ty: PropertyType) -> Self {
        Self {
            ty,
            ..Self::default()
        }
    }

    /// Object properties without their own generator are built field by field.
    pub fn is_container(&self) -> bool {
        self.ty.is_object() && !self.data.has_generator()
    }
}

/// Model-level settings and lifecycle hooks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModelData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    /// Models that must finish generating first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    /// Named datasets resolved by an input source before generation.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_run: Option<HookRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_run: Option<HookRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_build: Option<HookRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_build: Option<HookRef>,
}

/// A named schema unit describing one kind of document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Model {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<KeySpec>,
    /// Base path used to resolve relative input references.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<PropertyType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<Seed>,
    #[serde(default)]
    pub data: ModelData,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub definitions: Properties,
    #[serde(default)]
    pub properties: Properties,
}

impl Model {
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Numeric seed, if the model is deterministic.
    pub fn seed_value(&self) -> Option<u64> {
        self.seed.as_ref().map(Seed::value)
    }

    /// Target document count; 1 until normalization decides otherwise.
    pub fn count(&self) -> u64 {
        self.data.count.unwrap_or(1)
    }

    /// Every hook the model references, paired with a readable location.
    pub fn hook_refs(&self) -> Vec<(String, &HookRef)> {
        let mut refs = Vec::new();
        let model_hooks = [
            ("data.pre_run", &self.data.pre_run),
            ("data.post_run", &self.data.post_run),
            ("data.pre_build", &self.data.pre_build),
            ("data.post_build", &self.data.post_build),
        ];
        for (slot, hook) in model_hooks {
            if let Some(hook) = hook {
                refs.push((slot.to_string(), hook));
            }
        }
        if let Some(KeySpec::Built(property)) = &self.key {
            collect_property_hooks("key", property, &mut refs);
        }
        for (name, property) in self.properties.iter() {
            collect_property_hooks(&format!("properties.{name}"), property, &mut refs);
        }
        refs
    }
}

fn collect_property_hooks<'a>(
    path: &str,
    property: &'a Property,
    refs: &mut Vec<(String, &'a HookRef)>,
) {
    let slots = [
        ("build", &property.data.build),
        ("pre_build", &property.data.pre_build),
        ("post_build", &property.data.post_build),
    ];
    for (slot, hook) in slots {
        if let Some(hook) = hook {
            refs.push((format!("{path}.data.{slot}"), hook));
        }
    }
    if let Some(items) = &property.items {
        collect_property_hooks(&format!("{path}.items"), items, refs);
    }
    for (name, child) in property.properties.iter() {
        collect_property_hooks(&format!("{path}.properties.{name}"), child, refs);
    }
}
