//! Schema-driven property materialization.
//!
//! Resource properties arrive as untyped nested JSON. [`materialize`] walks a
//! [`PropertySchema`] and the raw data side by side, checks types and
//! required-ness, and builds typed [`Properties`], turning nested property
//! objects into [`PropertyObject`]s with their own schema.
//!
//! # Example
//!
//! ```
//! use custom_resource_sdk::schema::{PropertySchema, PropertyType};
//! use custom_resource_sdk::validation::materialize;
//! use serde_json::json;
//!
//! let schema = PropertySchema::new("Queue")
//!     .with_required("Name", PropertyType::String)
//!     .with_optional("Retention", PropertyType::Integer);
//!
//! let raw = json!({"Name": "jobs", "Retention": 60});
//! let properties = materialize(&schema, raw.as_object().unwrap()).unwrap();
//! assert_eq!(properties.get_str("Name"), Some("jobs"));
//!
//! let raw = json!({"Retention": "a minute"});
//! assert!(materialize(&schema, raw.as_object().unwrap()).is_err());
//! ```

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::Error;
use crate::schema::{PropertySchema, PropertyType};

/// Key of an import reference object.
pub const IMPORT_VALUE_KEY: &str = "Fn::ImportValue";

/// A materialized property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// A string.
    String(String),
    /// An integer.
    Integer(i64),
    /// A floating point number.
    Float(f64),
    /// A boolean.
    Boolean(bool),
    /// An opaque JSON object.
    Map(Map<String, Value>),
    /// An opaque JSON value.
    Json(Value),
    /// A list of values.
    List(Vec<PropertyValue>),
    /// A nested property object.
    Object(PropertyObject),
    /// A reference to an exported value.
    Import(String),
}

impl PropertyValue {
    /// The string, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The integer, if this is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The number, if this is an integer or a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// The boolean, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// The elements, if this is a list.
    pub fn as_list(&self) -> Option<&[PropertyValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// The nested object, if this is one.
    pub fn as_object(&self) -> Option<&PropertyObject> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// The raw map, if this is a map.
    pub fn as_map(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Convert back to wire JSON.
    pub fn to_json(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Integer(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::Boolean(b) => Value::Bool(*b),
            Self::Map(map) => Value::Object(map.clone()),
            Self::Json(value) => value.clone(),
            Self::List(items) => Value::Array(items.iter().map(PropertyValue::to_json).collect()),
            Self::Object(obj) => obj.properties.to_json(),
            Self::Import(name) => {
                let mut map = Map::new();
                map.insert(IMPORT_VALUE_KEY.to_string(), Value::String(name.clone()));
                Value::Object(map)
            },
        }
    }
}

/// A nested property object materialized from its schema.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyObject {
    type_name: String,
    properties: Properties,
}

impl PropertyObject {
    /// Name of the property type this object was built from.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The object's own properties.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }
}

/// Materialized properties of a resource or nested property object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(BTreeMap<String, PropertyValue>);

impl Properties {
    /// Look up a property.
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.0.get(name)
    }

    /// Look up a string property.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PropertyValue::as_str)
    }

    /// Whether a property is set.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Number of properties set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no property is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the properties in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Convert back to wire JSON.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        )
    }
}

/// Materialize raw properties against a schema.
///
/// All problems found are reported together in one
/// [`Error::PropertyValidation`], each naming the dotted path of the
/// offending property.
pub fn materialize(schema: &PropertySchema, raw: &Map<String, Value>) -> Result<Properties, Error> {
    let mut problems = Vec::new();
    let properties = materialize_object(schema, raw, "", &mut problems);
    if problems.is_empty() {
        Ok(properties)
    } else {
        Err(Error::PropertyValidation(format!(
            "{}: {}",
            schema.name,
            problems.join("; ")
        )))
    }
}

/// Check raw properties against a schema, returning every problem found.
pub fn validate(schema: &PropertySchema, raw: &Map<String, Value>) -> Vec<String> {
    let mut problems = Vec::new();
    materialize_object(schema, raw, "", &mut problems);
    problems
}

fn materialize_object(
    schema: &PropertySchema,
    raw: &Map<String, Value>,
    path: &str,
    problems: &mut Vec<String>,
) -> Properties {
    let mut properties = BTreeMap::new();

    for name in raw.keys() {
        if !schema.contains(name) {
            problems.push(format!(
                "'{}' is not a property of {}",
                join_path(path, name),
                schema.name
            ));
        }
    }

    for (name, spec) in &schema.properties {
        let prop_path = join_path(path, name);
        match raw.get(name) {
            None | Some(Value::Null) => {
                if spec.required {
                    problems.push(format!("missing required property '{}'", prop_path));
                }
            },
            Some(value) => {
                if let Some(v) = materialize_value(&spec.property_type, value, &prop_path, problems)
                {
                    properties.insert(name.clone(), v);
                }
            },
        }
    }

    Properties(properties)
}

fn materialize_value(
    property_type: &PropertyType,
    value: &Value,
    path: &str,
    problems: &mut Vec<String>,
) -> Option<PropertyValue> {
    match property_type {
        PropertyType::String => match value {
            Value::String(s) => Some(PropertyValue::String(s.clone())),
            _ => type_problem(path, property_type, value, problems),
        },
        PropertyType::Integer => match as_integer(value) {
            Some(i) => Some(PropertyValue::Integer(i)),
            None => type_problem(path, property_type, value, problems),
        },
        PropertyType::Float => match value.as_f64() {
            Some(f) => Some(PropertyValue::Float(f)),
            None => type_problem(path, property_type, value, problems),
        },
        PropertyType::Boolean => match value {
            Value::Bool(b) => Some(PropertyValue::Boolean(*b)),
            _ => type_problem(path, property_type, value, problems),
        },
        PropertyType::Map => match value {
            Value::Object(map) => Some(PropertyValue::Map(map.clone())),
            _ => type_problem(path, property_type, value, problems),
        },
        PropertyType::Json => Some(PropertyValue::Json(value.clone())),
        PropertyType::List(element_type) => match value {
            Value::Array(items) => {
                let before = problems.len();
                let elements: Vec<PropertyValue> = items
                    .iter()
                    .enumerate()
                    .filter_map(|(i, item)| {
                        let item_path = format!("{}.{}", path, i);
                        materialize_value(element_type, item, &item_path, problems)
                    })
                    .collect();
                (problems.len() == before).then_some(PropertyValue::List(elements))
            },
            _ => type_problem(path, property_type, value, problems),
        },
        PropertyType::OneOf(types) => {
            for candidate in types {
                let mut scratch = Vec::new();
                if let Some(v) = materialize_value(candidate, value, path, &mut scratch) {
                    if scratch.is_empty() {
                        return Some(v);
                    }
                }
            }
            type_problem(path, property_type, value, problems)
        },
        PropertyType::Object(schema) => match value {
            Value::Object(map) => {
                let before = problems.len();
                let properties = materialize_object(schema, map, path, problems);
                (problems.len() == before).then(|| {
                    PropertyValue::Object(PropertyObject {
                        type_name: schema.name.clone(),
                        properties,
                    })
                })
            },
            _ => type_problem(path, property_type, value, problems),
        },
        PropertyType::ImportValue => match import_name(value) {
            Some(name) => Some(PropertyValue::Import(name.to_string())),
            None => type_problem(path, property_type, value, problems),
        },
    }
}

// Helper functions

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

/// JSON type name of a value, as used in error messages.
pub(crate) fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        _ => None,
    }
}

fn import_name(value: &Value) -> Option<&str> {
    let obj = value.as_object()?;
    if obj.len() != 1 {
        return None;
    }
    obj.get(IMPORT_VALUE_KEY)?.as_str()
}

fn type_problem(
    path: &str,
    expected: &PropertyType,
    got: &Value,
    problems: &mut Vec<String>,
) -> Option<PropertyValue> {
    problems.push(format!(
        "invalid type for '{}': expected {}, got {}",
        path,
        expected.describe(),
        value_type_name(got)
    ));
    None
}
