//! CloudFront resource types.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::info;

use crate::error::Error;
use crate::registry::Namespace;
use crate::resource::{Resource, ResourceDescriptor, ResourceOutput, ResourceType};
use crate::schema::{PropertySchema, PropertyType};
use crate::session::Session;
use crate::types::Request;
use crate::validation::Properties;

/// Prefix of every canonical name in this module.
pub const RESOURCE_TYPE_PREFIX: &str = "AWS.CloudFront";

/// Settings of an origin access identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginAccessIdentityConfig {
    /// Unique value that prevents accidental duplicate creation.
    pub caller_reference: String,
    /// Free-form comment, empty when unset.
    pub comment: String,
}

/// An origin access identity as returned by CloudFront.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginAccessIdentityRecord {
    /// The identity id.
    pub id: String,
    /// Canonical user id to grant S3 read access to.
    pub s3_canonical_user_id: String,
}

/// The CloudFront operations the built-in types need.
///
/// Resource methods find it in the [`Session`] as `Arc<dyn CloudFrontApi>`.
#[async_trait]
pub trait CloudFrontApi: Send + Sync {
    /// Create an origin access identity.
    async fn create_origin_access_identity(
        &self,
        config: &OriginAccessIdentityConfig,
    ) -> Result<OriginAccessIdentityRecord, Error>;

    /// Replace the configuration of an origin access identity.
    async fn update_origin_access_identity(
        &self,
        id: &str,
        config: &OriginAccessIdentityConfig,
    ) -> Result<OriginAccessIdentityRecord, Error>;

    /// Delete an origin access identity.
    async fn delete_origin_access_identity(&self, id: &str) -> Result<(), Error>;
}

/// `Custom::AWS.CloudFront.OriginAccessIdentity`
#[derive(Debug, Clone)]
pub struct OriginAccessIdentity {
    config: OriginAccessIdentityConfig,
}

impl OriginAccessIdentity {
    fn client(session: &Session) -> Result<&Arc<dyn CloudFrontApi>, Error> {
        session.require_client::<Arc<dyn CloudFrontApi>>()
    }

    fn output(record: OriginAccessIdentityRecord) -> ResourceOutput {
        let mut data = Map::new();
        data.insert(
            "S3CanonicalUserId".to_string(),
            Value::String(record.s3_canonical_user_id),
        );
        ResourceOutput::WithData(record.id, data)
    }
}

#[async_trait]
impl Resource for OriginAccessIdentity {
    async fn create(&self, _request: &Request, session: &Session) -> Result<ResourceOutput, Error> {
        let record = Self::client(session)?
            .create_origin_access_identity(&self.config)
            .await?;
        info!(id = %record.id, "Created origin access identity");
        Ok(Self::output(record))
    }

    async fn update(&self, request: &Request, session: &Session) -> Result<ResourceOutput, Error> {
        let id = request.physical_resource_id().unwrap_or_default();
        let record = Self::client(session)?
            .update_origin_access_identity(id, &self.config)
            .await?;
        Ok(Self::output(record))
    }

    async fn delete(&self, request: &Request, session: &Session) -> Result<ResourceOutput, Error> {
        let id = request.physical_resource_id().unwrap_or_default();
        Self::client(session)?
            .delete_origin_access_identity(id)
            .await?;
        info!(id, "Deleted origin access identity");
        Ok(ResourceOutput::Implicit)
    }
}

impl ResourceType for OriginAccessIdentity {
    const NAME: &'static str = "OriginAccessIdentity";

    fn schema() -> PropertySchema {
        PropertySchema::new(Self::NAME)
            .with_required("CallerReference", PropertyType::String)
            .with_optional("Comment", PropertyType::String)
    }

    fn from_properties(_logical_id: &str, properties: Properties) -> Result<Self, Error> {
        Ok(Self {
            config: OriginAccessIdentityConfig {
                caller_reference: properties
                    .get_str("CallerReference")
                    .unwrap_or_default()
                    .to_string(),
                comment: properties.get_str("Comment").unwrap_or_default().to_string(),
            },
        })
    }
}

pub(crate) fn namespace() -> Namespace {
    Namespace::new(module_path!())
        .with_prefix(RESOURCE_TYPE_PREFIX)
        .with_type(ResourceDescriptor::of::<OriginAccessIdentity>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{assert_failed, assert_success, ResourceTester};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeCloudFront {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CloudFrontApi for FakeCloudFront {
        async fn create_origin_access_identity(
            &self,
            config: &OriginAccessIdentityConfig,
        ) -> Result<OriginAccessIdentityRecord, Error> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("create:{}:{}", config.caller_reference, config.comment));
            Ok(OriginAccessIdentityRecord {
                id: "E2QWRUHAPOMQZL".to_string(),
                s3_canonical_user_id: "b970b42360b81c8ddbd79d2f5df0069ba9033c8a".to_string(),
            })
        }

        async fn update_origin_access_identity(
            &self,
            id: &str,
            config: &OriginAccessIdentityConfig,
        ) -> Result<OriginAccessIdentityRecord, Error> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("update:{}:{}", id, config.comment));
            Ok(OriginAccessIdentityRecord {
                id: id.to_string(),
                s3_canonical_user_id: "updated".to_string(),
            })
        }

        async fn delete_origin_access_identity(&self, id: &str) -> Result<(), Error> {
            if id == "missing" {
                return Err(Error::custom("NoSuchCloudFrontOriginAccessIdentity"));
            }
            self.calls.lock().unwrap().push(format!("delete:{}", id));
            Ok(())
        }
    }

    fn tester() -> (ResourceTester<OriginAccessIdentity>, Arc<FakeCloudFront>) {
        let fake = Arc::new(FakeCloudFront::default());
        let client: Arc<dyn CloudFrontApi> = fake.clone();
        let tester = ResourceTester::new()
            .with_prefix(RESOURCE_TYPE_PREFIX)
            .with_session(Session::new().with_client(client));
        (tester, fake)
    }

    #[test]
    fn test_resource_type_name() {
        let descriptor = ResourceDescriptor::of::<OriginAccessIdentity>()
            .with_prefix(Some(RESOURCE_TYPE_PREFIX));
        assert_eq!(
            descriptor.resource_type(),
            "Custom::AWS.CloudFront.OriginAccessIdentity"
        );
        assert!(descriptor.schema().contains("CallerReference"));
    }

    #[tokio::test]
    async fn test_create() {
        let (tester, fake) = tester();
        let response = tester
            .create(json!({"CallerReference": "ref-1", "Comment": "site"}))
            .await
            .unwrap();

        assert_success(&response);
        assert_eq!(response["PhysicalResourceId"], "E2QWRUHAPOMQZL");
        assert_eq!(
            response["Data"]["S3CanonicalUserId"],
            "b970b42360b81c8ddbd79d2f5df0069ba9033c8a"
        );
        assert_eq!(fake.calls.lock().unwrap().as_slice(), ["create:ref-1:site"]);
    }

    #[tokio::test]
    async fn test_update_and_delete_use_physical_id() {
        let (tester, fake) = tester();
        let response = tester
            .update(
                "E2QWRUHAPOMQZL",
                json!({"CallerReference": "ref-1"}),
                json!({"CallerReference": "ref-1", "Comment": "new"}),
            )
            .await
            .unwrap();
        assert_success(&response);
        assert_eq!(response["PhysicalResourceId"], "E2QWRUHAPOMQZL");

        let response = tester
            .delete("E2QWRUHAPOMQZL", json!({"CallerReference": "ref-1"}))
            .await
            .unwrap();
        assert_success(&response);
        assert_eq!(response["PhysicalResourceId"], "E2QWRUHAPOMQZL");

        assert_eq!(
            fake.calls.lock().unwrap().as_slice(),
            ["update:E2QWRUHAPOMQZL:new", "delete:E2QWRUHAPOMQZL"]
        );
    }

    #[tokio::test]
    async fn test_client_error_fails_request() {
        let (tester, _) = tester();
        let response = tester
            .delete("missing", json!({"CallerReference": "ref-1"}))
            .await
            .unwrap();
        assert_failed(&response, "NoSuchCloudFrontOriginAccessIdentity");
    }

    #[tokio::test]
    async fn test_missing_client() {
        let tester = ResourceTester::<OriginAccessIdentity>::new();
        let response = tester
            .create(json!({"CallerReference": "ref-1"}))
            .await
            .unwrap();
        assert_failed(&response, "MissingClientError");
    }

    #[tokio::test]
    async fn test_caller_reference_required() {
        let (tester, fake) = tester();
        let response = tester.create(json!({"Comment": "x"})).await.unwrap();
        assert_failed(&response, "CallerReference");
        assert!(fake.calls.lock().unwrap().is_empty());
    }
}
