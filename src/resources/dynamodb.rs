//! DynamoDB resource types.

use async_trait::async_trait;

use crate::error::Error;
use crate::registry::Namespace;
use crate::resource::{Resource, ResourceDescriptor, ResourceType};
use crate::schema::{PropertySchema, PropertyType};
use crate::validation::{Properties, PropertyValue};

/// Prefix of every canonical name in this module.
pub const RESOURCE_TYPE_PREFIX: &str = "AWS.DynamoDB";

/// A global secondary index of a [`Table`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalSecondaryIndex {
    /// Index name.
    pub name: String,
}

impl GlobalSecondaryIndex {
    /// Nested property schema.
    pub fn schema() -> PropertySchema {
        PropertySchema::new("GlobalSecondaryIndex").with_required("Name", PropertyType::String)
    }

    fn from_value(value: &PropertyValue) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self {
            name: object.properties().get_str("Name")?.to_string(),
        })
    }
}

/// `Custom::AWS.DynamoDB.Table`
///
/// Lifecycle methods accept the declared properties and do nothing else.
#[derive(Debug, Clone)]
pub struct Table {
    /// Declared indexes.
    pub global_secondary_indexes: Vec<GlobalSecondaryIndex>,
    /// Explicit table name.
    pub table_name: Option<String>,
}

#[async_trait]
impl Resource for Table {}

impl ResourceType for Table {
    const NAME: &'static str = "Table";

    fn schema() -> PropertySchema {
        PropertySchema::new(Self::NAME)
            .with_required(
                "GlobalSecondaryIndexes",
                PropertyType::list(PropertyType::object(GlobalSecondaryIndex::schema())),
            )
            .with_optional("TableName", PropertyType::String)
    }

    fn from_properties(_logical_id: &str, properties: Properties) -> Result<Self, Error> {
        let global_secondary_indexes = properties
            .get("GlobalSecondaryIndexes")
            .and_then(PropertyValue::as_list)
            .unwrap_or_default()
            .iter()
            .filter_map(GlobalSecondaryIndex::from_value)
            .collect();
        Ok(Self {
            global_secondary_indexes,
            table_name: properties.get_str("TableName").map(str::to_string),
        })
    }
}

pub(crate) fn namespace() -> Namespace {
    Namespace::new(module_path!())
        .with_prefix(RESOURCE_TYPE_PREFIX)
        .with_type(ResourceDescriptor::of::<Table>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{assert_failed, assert_success, ResourceTester};
    use serde_json::json;

    fn tester() -> ResourceTester<Table> {
        ResourceTester::new().with_prefix(RESOURCE_TYPE_PREFIX)
    }

    #[test]
    fn test_from_properties() {
        let descriptor = ResourceDescriptor::of::<Table>();
        let raw = json!({
            "GlobalSecondaryIndexes": [{"Name": "by-owner"}, {"Name": "by-date"}],
            "TableName": "orders",
        });
        assert!(descriptor
            .from_dict("Orders", raw.as_object().unwrap(), "ProviderArn")
            .is_ok());

        let properties =
            crate::validation::materialize(&Table::schema(), raw.as_object().unwrap()).unwrap();
        let table = Table::from_properties("Orders", properties).unwrap();
        assert_eq!(
            table.global_secondary_indexes,
            vec![
                GlobalSecondaryIndex { name: "by-owner".to_string() },
                GlobalSecondaryIndex { name: "by-date".to_string() },
            ]
        );
        assert_eq!(table.table_name.as_deref(), Some("orders"));
    }

    #[tokio::test]
    async fn test_table_lifecycle() {
        let tester = tester();
        assert_eq!(tester.resource_type(), "Custom::AWS.DynamoDB.Table");

        let response = tester
            .lifecycle_crud(
                json!({"GlobalSecondaryIndexes": [{"Name": "a"}]}),
                json!({"GlobalSecondaryIndexes": [{"Name": "b"}], "TableName": "t"}),
            )
            .await
            .unwrap();
        assert_success(&response);
    }

    #[tokio::test]
    async fn test_index_name_required() {
        let response = tester()
            .create(json!({"GlobalSecondaryIndexes": [{"Nme": "typo"}]}))
            .await
            .unwrap();
        assert_failed(&response, "PropertyValidationError");
    }
}
