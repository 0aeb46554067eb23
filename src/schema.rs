//! Schema types for describing resource properties.
//!
//! A [`PropertySchema`] declares, for every property a resource type accepts,
//! the expected [`PropertyType`] and whether the property is required. Nested
//! property objects carry their own schema, so a schema is a tree that
//! [`crate::validation`] walks to materialize raw event data.

use serde::Serialize;
use std::collections::BTreeMap;

/// Name of the property implicitly carried by every resource type.
pub const SERVICE_TOKEN: &str = "ServiceToken";

/// Prefix shared by all canonical custom resource type names.
pub const CUSTOM_RESOURCE_PREFIX: &str = "Custom::";

/// The expected type of a property value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    /// A string value.
    String,
    /// An integer. Floats without a fractional part are accepted.
    Integer,
    /// Any number.
    Float,
    /// A boolean value.
    Boolean,
    /// Any JSON object, kept as-is.
    Map,
    /// Any JSON value, kept as-is.
    Json,
    /// A homogeneous list whose elements all match the element type.
    List(Box<PropertyType>),
    /// A union: the value must match at least one of the types.
    OneOf(Vec<PropertyType>),
    /// A nested property object with its own schema.
    Object(Box<PropertySchema>),
    /// A reference to an exported value, `{"Fn::ImportValue": name}`.
    ImportValue,
}

impl PropertyType {
    /// Create a list type.
    pub fn list(element_type: PropertyType) -> Self {
        Self::List(Box::new(element_type))
    }

    /// Create a union type.
    pub fn one_of(types: impl IntoIterator<Item = PropertyType>) -> Self {
        Self::OneOf(types.into_iter().collect())
    }

    /// Create a nested object type.
    pub fn object(schema: PropertySchema) -> Self {
        Self::Object(Box::new(schema))
    }

    /// A short human-readable name, used in validation errors.
    pub fn describe(&self) -> String {
        match self {
            Self::String => "string".to_string(),
            Self::Integer => "integer".to_string(),
            Self::Float => "float".to_string(),
            Self::Boolean => "boolean".to_string(),
            Self::Map => "map".to_string(),
            Self::Json => "json".to_string(),
            Self::List(element) => format!("list of {}", element.describe()),
            Self::OneOf(types) => {
                let names: Vec<String> = types.iter().map(PropertyType::describe).collect();
                format!("one of ({})", names.join(", "))
            },
            Self::Object(schema) => schema.name.clone(),
            Self::ImportValue => "import reference".to_string(),
        }
    }
}

/// Declares a single property: its type and whether it is required.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertySpec {
    /// The expected type.
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    /// The property must be present and non-null.
    pub required: bool,
    /// Human-readable description of the property.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PropertySpec {
    /// A required property of the given type.
    pub fn required(property_type: PropertyType) -> Self {
        Self {
            property_type,
            required: true,
            description: None,
        }
    }

    /// An optional property of the given type.
    pub fn optional(property_type: PropertyType) -> Self {
        Self {
            property_type,
            required: false,
            description: None,
        }
    }

    /// Set the description for this property.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// The property schema of a resource type or nested property object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertySchema {
    /// Name of the resource or property type this schema belongs to.
    pub name: String,
    /// Declared properties, keyed by their wire name.
    pub properties: BTreeMap<String, PropertySpec>,
}

impl PropertySchema {
    /// Create an empty schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Declare a property.
    pub fn with_property(mut self, name: impl Into<String>, spec: PropertySpec) -> Self {
        self.properties.insert(name.into(), spec);
        self
    }

    /// Declare a required property.
    pub fn with_required(self, name: impl Into<String>, property_type: PropertyType) -> Self {
        self.with_property(name, PropertySpec::required(property_type))
    }

    /// Declare an optional property.
    pub fn with_optional(self, name: impl Into<String>, property_type: PropertyType) -> Self {
        self.with_property(name, PropertySpec::optional(property_type))
    }

    /// Merge a schema fragment into this one. Entries of the fragment replace
    /// entries of the same name.
    pub fn merge(mut self, fragment: PropertySchema) -> Self {
        self.properties.extend(fragment.properties);
        self
    }

    /// Look up a declared property.
    pub fn get(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.get(name)
    }

    /// Whether a property is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Names of the required properties.
    pub fn required_properties(&self) -> impl Iterator<Item = &str> {
        self.properties
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(name, _)| name.as_str())
    }
}

/// The schema fragment merged into every resource type: the `ServiceToken`
/// reference to the dispatching endpoint.
pub fn base_resource_schema() -> PropertySchema {
    PropertySchema::new("Resource").with_property(
        SERVICE_TOKEN,
        PropertySpec::required(PropertyType::ImportValue)
            .with_description("Reference to the function that handles this resource"),
    )
}

/// Derive the canonical type name from an optional namespace prefix and the
/// type's own name.
///
/// # Examples
///
/// ```
/// use custom_resource_sdk::schema::canonical_resource_type;
///
/// assert_eq!(canonical_resource_type(None, "Foo"), "Custom::Foo");
/// assert_eq!(
///     canonical_resource_type(Some("AWS.DynamoDB"), "Table"),
///     "Custom::AWS.DynamoDB.Table"
/// );
/// ```
pub fn canonical_resource_type(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}{}.{}", CUSTOM_RESOURCE_PREFIX, prefix, name),
        None => format!("{}{}", CUSTOM_RESOURCE_PREFIX, name),
    }
}
