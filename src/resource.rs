//! The capability contract every resource type implements.
//!
//! A resource type is a Rust type implementing [`Resource`] (the lifecycle
//! methods) and [`ResourceType`] (its name, property schema and constructor).
//! [`ResourceDescriptor::of`] captures both into a value the registry can
//! index by canonical type name.
//!
//! # Example
//!
//! ```
//! use custom_resource_sdk::{
//!     async_trait, Error, Properties, Request, Resource, ResourceOutput, ResourceType, Session,
//! };
//! use custom_resource_sdk::schema::{PropertySchema, PropertyType};
//!
//! struct Greeting {
//!     message: String,
//! }
//!
//! #[async_trait]
//! impl Resource for Greeting {
//!     async fn create(
//!         &self,
//!         _request: &Request,
//!         _session: &Session,
//!     ) -> Result<ResourceOutput, Error> {
//!         Ok(self.message.as_str().into())
//!     }
//! }
//!
//! impl ResourceType for Greeting {
//!     const NAME: &'static str = "Greeting";
//!
//!     fn schema() -> PropertySchema {
//!         PropertySchema::new(Self::NAME).with_required("Message", PropertyType::String)
//!     }
//!
//!     fn from_properties(_logical_id: &str, properties: Properties) -> Result<Self, Error> {
//!         Ok(Self {
//!             message: properties.get_str("Message").unwrap_or_default().to_string(),
//!         })
//!     }
//! }
//! ```

use std::any::TypeId;

use serde_json::{Map, Value};

use crate::error::Error;
use crate::schema::{base_resource_schema, canonical_resource_type, PropertySchema, SERVICE_TOKEN};
use crate::session::Session;
use crate::types::{Request, RequestType, Response};
use crate::validation::{materialize, Properties, IMPORT_VALUE_KEY};

/// The value a lifecycle method produces.
///
/// The dispatcher normalizes every variant into a [`Response`]; see
/// [`crate::handler::unpack_response`].
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceOutput {
    /// No explicit result: the physical id is derived from the request.
    Implicit,
    /// The physical id of the resource.
    PhysicalId(String),
    /// The physical id plus attributes exposed to the template.
    WithData(String, Map<String, Value>),
    /// A fully built response, passed through unchanged.
    Response(Response),
    /// A loosely-typed result: `null`, a string, or a `[id, {data}]` pair.
    Value(Value),
}

impl From<()> for ResourceOutput {
    fn from(_: ()) -> Self {
        Self::Implicit
    }
}

impl From<String> for ResourceOutput {
    fn from(id: String) -> Self {
        Self::PhysicalId(id)
    }
}

impl From<&str> for ResourceOutput {
    fn from(id: &str) -> Self {
        Self::PhysicalId(id.to_string())
    }
}

impl From<(String, Map<String, Value>)> for ResourceOutput {
    fn from((id, data): (String, Map<String, Value>)) -> Self {
        Self::WithData(id, data)
    }
}

impl From<Response> for ResourceOutput {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

impl From<Value> for ResourceOutput {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// Lifecycle methods of a resource instance.
///
/// Each method receives the request and the session handle. Methods a type
/// does not override do nothing and return [`ResourceOutput::Implicit`].
#[async_trait::async_trait]
pub trait Resource: Send + Sync {
    /// Create the underlying resource.
    async fn create(&self, request: &Request, session: &Session) -> Result<ResourceOutput, Error> {
        let _ = (request, session);
        Ok(ResourceOutput::Implicit)
    }

    /// Update the underlying resource.
    async fn update(&self, request: &Request, session: &Session) -> Result<ResourceOutput, Error> {
        let _ = (request, session);
        Ok(ResourceOutput::Implicit)
    }

    /// Delete the underlying resource.
    async fn delete(&self, request: &Request, session: &Session) -> Result<ResourceOutput, Error> {
        let _ = (request, session);
        Ok(ResourceOutput::Implicit)
    }
}

/// Invoke the lifecycle method matching a request type.
pub async fn invoke(
    resource: &dyn Resource,
    request_type: RequestType,
    request: &Request,
    session: &Session,
) -> Result<ResourceOutput, Error> {
    match request_type {
        RequestType::Create => resource.create(request, session).await,
        RequestType::Update => resource.update(request, session).await,
        RequestType::Delete => resource.delete(request, session).await,
    }
}

/// Static description of a resource type.
pub trait ResourceType: Resource + Sized + 'static {
    /// The type's own name, the last part of its canonical name.
    const NAME: &'static str;

    /// A canonical name that replaces the derived one.
    const RESOURCE_TYPE: Option<&'static str> = None;

    /// The declared properties, without the implicit `ServiceToken`.
    fn schema() -> PropertySchema;

    /// Build an instance from its logical id and validated properties.
    fn from_properties(logical_id: &str, properties: Properties) -> Result<Self, Error>;
}

type Constructor = fn(&str, Properties) -> Result<Box<dyn Resource>, Error>;

fn construct<T: ResourceType>(
    logical_id: &str,
    properties: Properties,
) -> Result<Box<dyn Resource>, Error> {
    Ok(Box::new(T::from_properties(logical_id, properties)?))
}

/// A resource type captured as a value: canonical name, merged schema and
/// constructor.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    name: &'static str,
    rust_type: &'static str,
    type_id: TypeId,
    resource_type: String,
    explicit_type: bool,
    schema: PropertySchema,
    construct: Constructor,
}

impl ResourceDescriptor {
    /// Describe a resource type. The canonical name has no prefix until
    /// [`ResourceDescriptor::with_prefix`] is applied.
    pub fn of<T: ResourceType>() -> Self {
        Self {
            name: T::NAME,
            rust_type: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
            resource_type: T::RESOURCE_TYPE
                .map(str::to_string)
                .unwrap_or_else(|| canonical_resource_type(None, T::NAME)),
            explicit_type: T::RESOURCE_TYPE.is_some(),
            schema: T::schema().merge(base_resource_schema()),
            construct: construct::<T>,
        }
    }

    /// Apply the namespace prefix to the canonical name. Types declaring an
    /// explicit `RESOURCE_TYPE` keep it.
    pub fn with_prefix(mut self, prefix: Option<&str>) -> Self {
        if !self.explicit_type {
            self.resource_type = canonical_resource_type(prefix, self.name);
        }
        self
    }

    /// The canonical resource type name.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// The type's own name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The full Rust path of the implementing type.
    pub fn rust_type(&self) -> &'static str {
        self.rust_type
    }

    /// Module path the implementing type is defined in.
    pub fn module_path(&self) -> &'static str {
        let path = self.rust_type.split('<').next().unwrap_or(self.rust_type);
        path.rsplit_once("::").map_or("", |(module, _)| module)
    }

    /// Identity of the implementing type.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The schema, including the implicit `ServiceToken`.
    pub fn schema(&self) -> &PropertySchema {
        &self.schema
    }

    /// Build a resource instance from raw event properties.
    ///
    /// `ServiceToken` is always injected as a reference to
    /// `service_token_export`, replacing any value present in `raw`. The
    /// remaining properties are validated against the schema.
    pub fn from_dict(
        &self,
        logical_id: &str,
        raw: &Map<String, Value>,
        service_token_export: &str,
    ) -> Result<Box<dyn Resource>, Error> {
        let mut raw = raw.clone();
        let mut token = Map::new();
        token.insert(
            IMPORT_VALUE_KEY.to_string(),
            Value::String(service_token_export.to_string()),
        );
        raw.insert(SERVICE_TOKEN.to_string(), Value::Object(token));

        let properties = materialize(&self.schema, &raw)?;
        (self.construct)(logical_id, properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PropertyType;
    use serde_json::json;

    struct MyResource;

    #[async_trait::async_trait]
    impl Resource for MyResource {}

    impl ResourceType for MyResource {
        const NAME: &'static str = "MyResource";

        fn schema() -> PropertySchema {
            PropertySchema::new(Self::NAME)
        }

        fn from_properties(_logical_id: &str, _properties: Properties) -> Result<Self, Error> {
            Ok(Self)
        }
    }

    struct Named {
        logical_id: String,
        properties: Properties,
    }

    #[async_trait::async_trait]
    impl Resource for Named {
        async fn create(
            &self,
            _request: &Request,
            _session: &Session,
        ) -> Result<ResourceOutput, Error> {
            Ok(format!("{}-{}", self.logical_id, self.properties.len()).into())
        }
    }

    impl ResourceType for Named {
        const NAME: &'static str = "Named";
        const RESOURCE_TYPE: Option<&'static str> = Some("Custom::Explicit");

        fn schema() -> PropertySchema {
            PropertySchema::new(Self::NAME).with_required("Label", PropertyType::String)
        }

        fn from_properties(logical_id: &str, properties: Properties) -> Result<Self, Error> {
            Ok(Self {
                logical_id: logical_id.to_string(),
                properties,
            })
        }
    }

    fn request() -> Request {
        Request::parse(&crate::testing::create_event()).unwrap()
    }

    #[test]
    fn test_resource_includes_service_token() {
        let descriptor = ResourceDescriptor::of::<MyResource>();
        assert!(descriptor
            .schema()
            .get(SERVICE_TOKEN)
            .is_some_and(|spec| spec.required));
    }

    #[test]
    fn test_resource_has_resource_name() {
        let descriptor = ResourceDescriptor::of::<MyResource>();
        assert_eq!(descriptor.resource_type(), "Custom::MyResource");
        assert_eq!(descriptor.name(), "MyResource");

        let prefixed = descriptor.with_prefix(Some("Acme.Storage"));
        assert_eq!(prefixed.resource_type(), "Custom::Acme.Storage.MyResource");
    }

    #[test]
    fn test_explicit_resource_type_ignores_prefix() {
        let descriptor = ResourceDescriptor::of::<Named>().with_prefix(Some("Acme"));
        assert_eq!(descriptor.resource_type(), "Custom::Explicit");
    }

    #[test]
    fn test_module_path() {
        let descriptor = ResourceDescriptor::of::<MyResource>();
        assert_eq!(descriptor.module_path(), module_path!());
        assert_eq!(descriptor.type_id(), TypeId::of::<MyResource>());
    }

    #[test]
    fn test_default_methods_are_noops() {
        let resource = MyResource;
        let request = request();
        let session = Session::new();
        for request_type in [RequestType::Create, RequestType::Update, RequestType::Delete] {
            let output =
                tokio_test::block_on(invoke(&resource, request_type, &request, &session)).unwrap();
            assert_eq!(output, ResourceOutput::Implicit);
        }
    }

    #[test]
    fn test_from_dict_injects_service_token() {
        let descriptor = ResourceDescriptor::of::<Named>();
        let raw = json!({"Label": "x", "ServiceToken": "arn:aws:lambda:user-supplied"});
        let resource = descriptor
            .from_dict("Thing", raw.as_object().unwrap(), "ProviderArn")
            .unwrap();

        let output =
            tokio_test::block_on(resource.create(&request(), &Session::new())).unwrap();
        // Label plus the injected ServiceToken.
        assert_eq!(output, ResourceOutput::PhysicalId("Thing-2".to_string()));
    }

    #[test]
    fn test_from_dict_validates() {
        let descriptor = ResourceDescriptor::of::<Named>();
        let raw = json!({"Label": 7});
        let err = descriptor
            .from_dict("Thing", raw.as_object().unwrap(), "ProviderArn")
            .err()
            .unwrap();
        assert!(matches!(err, Error::PropertyValidation(_)));
    }

    #[test]
    fn test_output_conversions() {
        assert_eq!(ResourceOutput::from(()), ResourceOutput::Implicit);
        assert_eq!(
            ResourceOutput::from("abc"),
            ResourceOutput::PhysicalId("abc".to_string())
        );
        let mut data = Map::new();
        data.insert("x".to_string(), json!(1));
        assert_eq!(
            ResourceOutput::from(("abc".to_string(), data.clone())),
            ResourceOutput::WithData("abc".to_string(), data)
        );
        assert_eq!(
            ResourceOutput::from(json!(null)),
            ResourceOutput::Value(Value::Null)
        );
    }
}
