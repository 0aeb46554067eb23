//! Testing utilities for resource type implementations.
//!
//! This module lets resource types be exercised through the full dispatcher
//! without a network: responses are captured by a [`RecordingTransport`]
//! instead of being PUT to a presigned URL.
//!
//! # Example
//!
//! ```ignore
//! use custom_resource_sdk::testing::{assert_success, ResourceTester};
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_bucket() {
//!     let tester = ResourceTester::<Bucket>::new();
//!
//!     let response = tester.create(json!({"BucketName": "logs"})).await.unwrap();
//!
//!     assert_success(&response);
//!     assert_eq!(response["PhysicalResourceId"], "logs");
//! }
//! ```

use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use serde_json::{json, Map, Value};

use crate::delivery::{DeliveryFailure, ResponseTransport};
use crate::error::Error;
use crate::handler::{Dispatcher, HandlerOptions};
use crate::registry::ResourceRegistry;
use crate::resource::{ResourceDescriptor, ResourceType};
use crate::session::Session;
use crate::types::RequestType;

/// Callback URL used by every fixture.
pub const TEST_RESPONSE_URL: &str = "https://example.com/";

/// Stack id used by every fixture.
pub const TEST_STACK_ID: &str = "arn:aws:cloudformation:us-east-2:namespace:stack/stack-name/guid";

/// Logical id used by every fixture.
pub const TEST_LOGICAL_RESOURCE_ID: &str = "BigCustomMan";

/// Physical id carried by the update and delete fixtures.
pub const TEST_PHYSICAL_RESOURCE_ID: &str = "custom resource provider-defined physical id";

fn fixture_properties() -> Value {
    json!({
        "key1": "string",
        "key2": ["list"],
        "key3": {"key4": "map"},
    })
}

/// A create event for `Custom::MyCustomResourceType`.
pub fn create_event() -> Value {
    json!({
        "RequestType": "Create",
        "RequestId": "unique id for this create request",
        "ResponseURL": TEST_RESPONSE_URL,
        "ResourceType": "Custom::MyCustomResourceType",
        "LogicalResourceId": TEST_LOGICAL_RESOURCE_ID,
        "StackId": TEST_STACK_ID,
        "ResourceProperties": fixture_properties(),
    })
}

/// An update event for `Custom::MyCustomResourceType`.
pub fn update_event() -> Value {
    json!({
        "RequestType": "Update",
        "RequestId": "unique id for this update request",
        "ResponseURL": TEST_RESPONSE_URL,
        "ResourceType": "Custom::MyCustomResourceType",
        "LogicalResourceId": TEST_LOGICAL_RESOURCE_ID,
        "StackId": TEST_STACK_ID,
        "PhysicalResourceId": TEST_PHYSICAL_RESOURCE_ID,
        "ResourceProperties": {
            "key1": "new-string",
            "key2": ["new-list"],
            "key3": {"key4": "new-map"},
        },
        "OldResourceProperties": fixture_properties(),
    })
}

/// A delete event for `Custom::MyCustomResourceType`.
pub fn delete_event() -> Value {
    json!({
        "RequestType": "Delete",
        "RequestId": "unique id for this delete request",
        "ResponseURL": TEST_RESPONSE_URL,
        "ResourceType": "Custom::MyCustomResourceType",
        "LogicalResourceId": TEST_LOGICAL_RESOURCE_ID,
        "StackId": TEST_STACK_ID,
        "PhysicalResourceId": TEST_PHYSICAL_RESOURCE_ID,
        "ResourceProperties": fixture_properties(),
    })
}

/// Builds wire events field by field.
///
/// ```
/// use custom_resource_sdk::testing::EventBuilder;
/// use custom_resource_sdk::types::RequestType;
/// use serde_json::json;
///
/// let event = EventBuilder::new(RequestType::Update, "Custom::Queue")
///     .physical_resource_id("queue-1")
///     .properties(json!({"Name": "jobs"}))
///     .build();
/// assert_eq!(event["OldResourceProperties"], json!({}));
/// ```
#[derive(Debug, Clone)]
pub struct EventBuilder {
    request_type: RequestType,
    request_id: String,
    response_url: String,
    resource_type: String,
    logical_resource_id: String,
    stack_id: String,
    physical_resource_id: String,
    properties: Value,
    old_properties: Value,
}

impl EventBuilder {
    /// Start an event of the given request and resource type, using the
    /// fixture identifiers.
    pub fn new(request_type: RequestType, resource_type: impl Into<String>) -> Self {
        Self {
            request_type,
            request_id: format!(
                "unique id for this {} request",
                request_type.method_name()
            ),
            response_url: TEST_RESPONSE_URL.to_string(),
            resource_type: resource_type.into(),
            logical_resource_id: TEST_LOGICAL_RESOURCE_ID.to_string(),
            stack_id: TEST_STACK_ID.to_string(),
            physical_resource_id: TEST_PHYSICAL_RESOURCE_ID.to_string(),
            properties: json!({}),
            old_properties: json!({}),
        }
    }

    /// Set the request id.
    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = id.into();
        self
    }

    /// Set the callback URL.
    pub fn response_url(mut self, url: impl Into<String>) -> Self {
        self.response_url = url.into();
        self
    }

    /// Set the logical id.
    pub fn logical_resource_id(mut self, id: impl Into<String>) -> Self {
        self.logical_resource_id = id.into();
        self
    }

    /// Set the stack id.
    pub fn stack_id(mut self, id: impl Into<String>) -> Self {
        self.stack_id = id.into();
        self
    }

    /// Set the physical id. Ignored for create events.
    pub fn physical_resource_id(mut self, id: impl Into<String>) -> Self {
        self.physical_resource_id = id.into();
        self
    }

    /// Set the resource properties.
    pub fn properties(mut self, properties: Value) -> Self {
        self.properties = properties;
        self
    }

    /// Set the pre-update properties. Ignored unless this is an update event.
    pub fn old_properties(mut self, properties: Value) -> Self {
        self.old_properties = properties;
        self
    }

    /// Produce the wire event.
    pub fn build(self) -> Value {
        let mut event = json!({
            "RequestType": self.request_type.as_str(),
            "RequestId": self.request_id,
            "ResponseURL": self.response_url,
            "ResourceType": self.resource_type,
            "LogicalResourceId": self.logical_resource_id,
            "StackId": self.stack_id,
            "ResourceProperties": self.properties,
        });
        if let Value::Object(map) = &mut event {
            match self.request_type {
                RequestType::Create => {},
                RequestType::Update => {
                    map.insert(
                        "PhysicalResourceId".to_string(),
                        Value::String(self.physical_resource_id),
                    );
                    map.insert("OldResourceProperties".to_string(), self.old_properties);
                },
                RequestType::Delete => {
                    map.insert(
                        "PhysicalResourceId".to_string(),
                        Value::String(self.physical_resource_id),
                    );
                },
            }
        }
        event
    }
}

#[derive(Debug, Default)]
struct Recorded {
    puts: Vec<(String, Value)>,
}

/// A [`ResponseTransport`] that records every PUT instead of sending it.
///
/// Clones share the same record, so a clone can be handed to a
/// [`Dispatcher`] and inspected afterwards.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    recorded: Arc<Mutex<Recorded>>,
    failure: Option<DeliveryFailure>,
}

impl RecordingTransport {
    /// A transport that accepts every PUT.
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that records every PUT and then fails it.
    pub fn failing(failure: DeliveryFailure) -> Self {
        Self {
            recorded: Arc::default(),
            failure: Some(failure),
        }
    }

    /// Every attempted PUT as `(url, body)`, oldest first.
    pub fn puts(&self) -> Vec<(String, Value)> {
        self.lock().puts.clone()
    }

    /// The most recent PUT.
    pub fn last_put(&self) -> Option<(String, Value)> {
        self.lock().puts.last().cloned()
    }

    /// Number of attempted PUTs.
    pub fn put_count(&self) -> usize {
        self.lock().puts.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl ResponseTransport for RecordingTransport {
    async fn put_json(&self, url: &str, body: &Value) -> Result<(), DeliveryFailure> {
        self.lock().puts.push((url.to_string(), body.clone()));
        match &self.failure {
            None => Ok(()),
            Some(failure) => Err(failure.clone()),
        }
    }
}

/// A test harness for one resource type.
///
/// Each call builds an event for the type, runs it through a [`Dispatcher`]
/// whose registry holds only that type, and returns the response that would
/// have been delivered.
///
/// # Example
///
/// ```ignore
/// use custom_resource_sdk::testing::ResourceTester;
///
/// let tester = ResourceTester::<Bucket>::new().with_session(session);
/// let response = tester.create(json!({"BucketName": "logs"})).await.unwrap();
/// ```
pub struct ResourceTester<T: ResourceType> {
    descriptor: ResourceDescriptor,
    session: Session,
    options: HandlerOptions,
    transport: RecordingTransport,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ResourceType> Default for ResourceTester<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ResourceType> ResourceTester<T> {
    /// Create a tester for `T` with no namespace prefix.
    pub fn new() -> Self {
        Self {
            descriptor: ResourceDescriptor::of::<T>(),
            session: Session::new(),
            options: HandlerOptions::default(),
            transport: RecordingTransport::new(),
            _marker: PhantomData,
        }
    }

    /// Register the type under a namespace prefix.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.descriptor = ResourceDescriptor::of::<T>().with_prefix(Some(prefix));
        self
    }

    /// Hand a clone of `session` to every invocation.
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    /// Set the dispatcher options.
    pub fn with_options(mut self, options: HandlerOptions) -> Self {
        self.options = options;
        self
    }

    /// Canonical resource type under test.
    pub fn resource_type(&self) -> &str {
        self.descriptor.resource_type()
    }

    /// The transport capturing responses.
    pub fn transport(&self) -> &RecordingTransport {
        &self.transport
    }

    /// Start an event of the type under test.
    pub fn event(&self, request_type: RequestType) -> EventBuilder {
        EventBuilder::new(request_type, self.resource_type())
    }

    /// Run a create request.
    pub async fn create(&self, properties: Value) -> Result<Map<String, Value>, Error> {
        self.handle(&self.event(RequestType::Create).properties(properties).build())
            .await
    }

    /// Run an update request.
    pub async fn update(
        &self,
        physical_resource_id: &str,
        old_properties: Value,
        properties: Value,
    ) -> Result<Map<String, Value>, Error> {
        let event = self
            .event(RequestType::Update)
            .physical_resource_id(physical_resource_id)
            .old_properties(old_properties)
            .properties(properties)
            .build();
        self.handle(&event).await
    }

    /// Run a delete request.
    pub async fn delete(
        &self,
        physical_resource_id: &str,
        properties: Value,
    ) -> Result<Map<String, Value>, Error> {
        let event = self
            .event(RequestType::Delete)
            .physical_resource_id(physical_resource_id)
            .properties(properties)
            .build();
        self.handle(&event).await
    }

    /// Run any event through the dispatcher.
    pub async fn handle(&self, event: &Value) -> Result<Map<String, Value>, Error> {
        self.dispatcher()?.handle(event).await
    }

    /// Run a full lifecycle: create, update to `updated`, delete.
    ///
    /// Stops at the first failed response. Returns the update response.
    pub async fn lifecycle_crud(
        &self,
        initial: Value,
        updated: Value,
    ) -> Result<Map<String, Value>, Error> {
        let created = self.create(initial.clone()).await?;
        check_success(&created)?;
        let physical_resource_id = response_physical_id(&created);

        let response = self
            .update(&physical_resource_id, initial, updated.clone())
            .await?;
        check_success(&response)?;
        let physical_resource_id = response_physical_id(&response);

        let deleted = self.delete(&physical_resource_id, updated).await?;
        check_success(&deleted)?;
        Ok(response)
    }

    fn dispatcher(&self) -> Result<Dispatcher, Error> {
        let registry = ResourceRegistry::from_descriptors([self.descriptor.clone()])?;
        let session = self.session.clone();
        Ok(Dispatcher::new(self.transport.clone())
            .with_registry(Arc::new(registry))
            .with_options(self.options.clone())
            .with_session_factory(move || session.clone()))
    }
}

fn response_physical_id(response: &Map<String, Value>) -> String {
    response
        .get("PhysicalResourceId")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn check_success(response: &Map<String, Value>) -> Result<(), Error> {
    if response.get("Status").and_then(Value::as_str) == Some("SUCCESS") {
        return Ok(());
    }
    Err(Error::custom(format!(
        "expected SUCCESS response, got {}",
        response.get("Reason").and_then(Value::as_str).unwrap_or("no reason")
    )))
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a delivered response reports success.
///
/// # Panics
///
/// Panics if the response status is not `SUCCESS`.
pub fn assert_success(response: &Map<String, Value>) {
    assert_eq!(
        response.get("Status").and_then(Value::as_str),
        Some("SUCCESS"),
        "Expected SUCCESS response, but got: {:?}",
        response.get("Reason")
    );
}

/// Assert that a delivered response reports failure with a reason
/// containing `substring`.
///
/// # Panics
///
/// Panics if the response succeeded or the reason does not match.
pub fn assert_failed(response: &Map<String, Value>, substring: &str) {
    assert_eq!(
        response.get("Status").and_then(Value::as_str),
        Some("FAILED"),
        "Expected FAILED response, but got SUCCESS"
    );
    let reason = response
        .get("Reason")
        .and_then(Value::as_str)
        .unwrap_or_default();
    assert!(
        reason.contains(substring),
        "Expected reason containing '{}', but got '{}'",
        substring,
        reason
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Resource, ResourceOutput};
    use crate::schema::{PropertySchema, PropertyType};
    use crate::types::{Request, RequestKind};
    use crate::validation::Properties;

    struct Queue {
        name: String,
    }

    #[async_trait::async_trait]
    impl Resource for Queue {
        async fn create(
            &self,
            _request: &Request,
            _session: &Session,
        ) -> Result<ResourceOutput, Error> {
            let mut data = Map::new();
            data.insert("Arn".to_string(), json!(format!("arn:aws:sqs:::{}", self.name)));
            Ok((self.name.clone(), data).into())
        }

        async fn update(
            &self,
            _request: &Request,
            _session: &Session,
        ) -> Result<ResourceOutput, Error> {
            Ok(self.name.as_str().into())
        }

        async fn delete(
            &self,
            request: &Request,
            _session: &Session,
        ) -> Result<ResourceOutput, Error> {
            if request.physical_resource_id() == Some("locked") {
                return Err(Error::custom("queue is locked"));
            }
            Ok(ResourceOutput::Implicit)
        }
    }

    impl ResourceType for Queue {
        const NAME: &'static str = "Queue";

        fn schema() -> PropertySchema {
            PropertySchema::new(Self::NAME).with_required("Name", PropertyType::String)
        }

        fn from_properties(_logical_id: &str, properties: Properties) -> Result<Self, Error> {
            Ok(Self {
                name: properties.get_str("Name").unwrap_or_default().to_string(),
            })
        }
    }

    #[test]
    fn test_fixtures_parse() {
        for event in [create_event(), update_event(), delete_event()] {
            assert!(Request::parse(&event).is_ok());
        }
    }

    #[test]
    fn test_event_builder() {
        let event = EventBuilder::new(RequestType::Delete, "Custom::Queue")
            .physical_resource_id("q-1")
            .properties(json!({"Name": "jobs"}))
            .build();
        let request = Request::parse(&event).unwrap();
        assert_eq!(
            request.kind,
            RequestKind::Delete {
                physical_resource_id: "q-1".to_string()
            }
        );
        assert_eq!(request.request_id, "unique id for this delete request");

        let create = EventBuilder::new(RequestType::Create, "Custom::Queue").build();
        assert!(create.get("PhysicalResourceId").is_none());
    }

    #[tokio::test]
    async fn test_recording_transport() {
        let transport = RecordingTransport::new();
        transport.put_json("https://a/", &json!({"n": 1})).await.unwrap();
        transport.put_json("https://b/", &json!({"n": 2})).await.unwrap();

        assert_eq!(transport.put_count(), 2);
        assert_eq!(transport.puts()[0].0, "https://a/");
        assert_eq!(transport.last_put().unwrap().1, json!({"n": 2}));
    }

    #[tokio::test]
    async fn test_failing_transport_records_attempt() {
        let transport = RecordingTransport::failing(DeliveryFailure::Status {
            status: 500,
            body: "oops".to_string(),
        });
        let clone = transport.clone();
        let err = clone.put_json("https://a/", &json!({})).await.unwrap_err();
        assert_eq!(err.kind(), "HTTPError");
        assert_eq!(transport.put_count(), 1);
    }

    #[tokio::test]
    async fn test_tester_create() {
        let tester = ResourceTester::<Queue>::new();
        assert_eq!(tester.resource_type(), "Custom::Queue");

        let response = tester.create(json!({"Name": "jobs"})).await.unwrap();
        assert_success(&response);
        assert_eq!(response["PhysicalResourceId"], "jobs");
        assert_eq!(response["Data"]["Arn"], "arn:aws:sqs:::jobs");
        assert_eq!(tester.transport().put_count(), 1);
    }

    #[tokio::test]
    async fn test_tester_with_prefix() {
        let tester = ResourceTester::<Queue>::new().with_prefix("Acme.Messaging");
        assert_eq!(tester.resource_type(), "Custom::Acme.Messaging.Queue");
        let response = tester.create(json!({"Name": "jobs"})).await.unwrap();
        assert_success(&response);
    }

    #[tokio::test]
    async fn test_tester_reports_failures() {
        let tester = ResourceTester::<Queue>::new();

        let response = tester.create(json!({})).await.unwrap();
        assert_failed(&response, "PropertyValidationError");

        let response = tester.delete("locked", json!({"Name": "jobs"})).await.unwrap();
        assert_failed(&response, "queue is locked");
        assert_eq!(response["PhysicalResourceId"], "locked");
    }

    #[tokio::test]
    async fn test_tester_lifecycle_crud() {
        let tester = ResourceTester::<Queue>::new();
        let response = tester
            .lifecycle_crud(json!({"Name": "jobs"}), json!({"Name": "jobs-v2"}))
            .await
            .unwrap();

        assert_eq!(response["PhysicalResourceId"], "jobs-v2");
        assert_eq!(tester.transport().put_count(), 3);
    }

    #[test]
    #[should_panic(expected = "Expected SUCCESS response")]
    fn test_assert_success_fails() {
        let mut response = Map::new();
        response.insert("Status".to_string(), json!("FAILED"));
        assert_success(&response);
    }
}
