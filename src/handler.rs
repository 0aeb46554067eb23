//! The event dispatcher.
//!
//! [`Dispatcher::handle`] takes one raw custom resource event through the
//! whole protocol:
//!
//! 1. Parse the event into a [`Request`]. A parse failure is returned as is:
//!    without request identifiers no response can be built.
//! 2. Resolve the resource type in the registry.
//! 3. Build the resource from the event's properties.
//! 4. Invoke the lifecycle method matching the request type with a fresh
//!    [`Session`].
//! 5. Normalize the method's output into a [`Response`].
//!
//! Any error in steps 2-5, including a panic in resource code, becomes a
//! `FAILED` response. Exactly one response is delivered per parsed event.

use std::env;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use tracing::{error, info, instrument, warn, Span};

use crate::delivery::{deliver, DeliveryConfig, HttpTransport, ResponseTransport};
use crate::error::Error;
use crate::registry::{get_mapping, ResourceRegistry};
use crate::resource::{invoke, ResourceOutput};
use crate::session::Session;
use crate::types::{canonical_json, Request, Response, Status};
use crate::validation::value_type_name;

/// Default name of the export the implicit `ServiceToken` refers to.
pub const DEFAULT_SERVICE_TOKEN_EXPORT: &str = "CustomResourceProviderArn";

/// Environment variable overriding [`HandlerOptions::service_token_export`].
pub const ENV_SERVICE_TOKEN_EXPORT: &str = "CUSTOM_RESOURCE_SERVICE_TOKEN_EXPORT";

/// Environment variable setting the delivery connect timeout, in seconds.
pub const ENV_CONNECT_TIMEOUT_SECS: &str = "CUSTOM_RESOURCE_CONNECT_TIMEOUT_SECS";

/// Environment variable setting the delivery request timeout, in seconds.
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "CUSTOM_RESOURCE_REQUEST_TIMEOUT_SECS";

/// Options for configuring the dispatcher.
#[derive(Debug, Clone)]
pub struct HandlerOptions {
    /// Export name referenced by every resource's `ServiceToken`.
    pub service_token_export: String,
    /// HTTP settings for response delivery.
    pub delivery: DeliveryConfig,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            service_token_export: DEFAULT_SERVICE_TOKEN_EXPORT.to_string(),
            delivery: DeliveryConfig::default(),
        }
    }
}

impl HandlerOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read options from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Ok(export) = env::var(ENV_SERVICE_TOKEN_EXPORT) {
            if !export.is_empty() {
                options.service_token_export = export;
            }
        }
        options.delivery.connect_timeout = env_secs(ENV_CONNECT_TIMEOUT_SECS);
        options.delivery.request_timeout = env_secs(ENV_REQUEST_TIMEOUT_SECS);
        options
    }

    /// Set the export name referenced by `ServiceToken`.
    pub fn with_service_token_export(mut self, export: impl Into<String>) -> Self {
        self.service_token_export = export.into();
        self
    }

    /// Set the delivery connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.delivery.connect_timeout = Some(timeout);
        self
    }

    /// Set the delivery request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.delivery.request_timeout = Some(timeout);
        self
    }

    /// Set the User-Agent used for delivery.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.delivery.user_agent = Some(user_agent.into());
        self
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(e) => {
            warn!(variable = name, value = %raw, error = %e, "Ignoring invalid timeout");
            None
        },
    }
}

type SessionFactory = Arc<dyn Fn() -> Session + Send + Sync>;

/// Where the dispatcher looks resource types up.
#[derive(Clone)]
enum RegistrySource {
    /// The process-wide cached mapping of built-in types.
    Global,
    /// A registry supplied by the caller.
    Fixed(Arc<ResourceRegistry>),
}

/// Dispatches custom resource events to resource types and reports the
/// outcome to the callback URL.
#[derive(Clone)]
pub struct Dispatcher {
    registry: RegistrySource,
    transport: Arc<dyn ResponseTransport>,
    sessions: SessionFactory,
    options: HandlerOptions,
}

impl Dispatcher {
    /// Create a dispatcher over the built-in registry, delivering through
    /// `transport`.
    pub fn new(transport: impl ResponseTransport + 'static) -> Self {
        Self {
            registry: RegistrySource::Global,
            transport: Arc::new(transport),
            sessions: Arc::new(Session::new),
            options: HandlerOptions::default(),
        }
    }

    /// Create a dispatcher delivering over HTTP.
    pub fn http(options: HandlerOptions) -> Result<Self, Error> {
        let transport = HttpTransport::new(&options.delivery)?;
        Ok(Self::new(transport).with_options(options))
    }

    /// Use a caller-supplied registry instead of the built-in one.
    pub fn with_registry(mut self, registry: Arc<ResourceRegistry>) -> Self {
        self.registry = RegistrySource::Fixed(registry);
        self
    }

    /// Set the factory producing the session handed to each invocation.
    pub fn with_session_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Session + Send + Sync + 'static,
    {
        self.sessions = Arc::new(factory);
        self
    }

    /// Set the options.
    pub fn with_options(mut self, options: HandlerOptions) -> Self {
        self.options = options;
        self
    }

    /// The options in use.
    pub fn options(&self) -> &HandlerOptions {
        &self.options
    }

    /// Handle one raw event and return the wire response that was delivered.
    ///
    /// Fails only when the event cannot be parsed (nothing is delivered) or
    /// when delivery itself fails.
    #[instrument(
        skip_all,
        name = "custom_resource.handle",
        fields(
            request_id = tracing::field::Empty,
            request_type = tracing::field::Empty,
            resource_type = tracing::field::Empty,
        )
    )]
    pub async fn handle(&self, event: &Value) -> Result<Map<String, Value>, Error> {
        let request = Request::parse(event)?;

        let span = Span::current();
        span.record("request_id", request.request_id.as_str());
        span.record("request_type", request.request_type().as_str());
        span.record("resource_type", request.resource_type.as_str());
        info!(
            logical_resource_id = %request.logical_resource_id,
            "Handling custom resource event"
        );

        let response = match self.dispatch(&request).await {
            Ok(response) => {
                info!(
                    physical_resource_id = %response.physical_resource_id(),
                    "Resource method completed"
                );
                response
            },
            Err(e) => {
                error!(error = %e, kind = e.kind(), "Caught error, failing request");
                failure_response(&request, &e)?
            },
        };

        deliver(self.transport.as_ref(), &request.response_url, &response).await
    }

    /// Handle one event on a fresh current-thread runtime.
    pub fn handle_blocking(&self, event: &Value) -> Result<Map<String, Value>, Error> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.handle(event))
    }

    async fn dispatch(&self, request: &Request) -> Result<Response, Error> {
        let registry = match &self.registry {
            RegistrySource::Global => get_mapping()?,
            RegistrySource::Fixed(registry) => Arc::clone(registry),
        };
        let descriptor = registry.get(&request.resource_type)?;
        let resource = descriptor.from_dict(
            &request.logical_resource_id,
            &request.resource_properties,
            &self.options.service_token_export,
        )?;

        let session = (self.sessions)();
        let request_type = request.request_type();
        let output = AssertUnwindSafe(invoke(resource.as_ref(), request_type, request, &session))
            .catch_unwind()
            .await
            .map_err(|payload| {
                Error::Panic(format!(
                    "{} method panicked: {}",
                    request_type.method_name(),
                    panic_message(payload.as_ref())
                ))
            })??;

        unpack_response(request, output)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Build the `FAILED` response for an error raised while dispatching.
pub fn failure_response(request: &Request, err: &Error) -> Result<Response, Error> {
    Response::from_request(request, Status::Failed)
        .with_reason(err.reason())
        .with_physical_resource_id(canonical_physical_resource_id(request)?)
        .build()
}

/// The physical id used when a method does not choose one.
///
/// Update and delete requests keep the id already assigned. Create requests
/// get the hex SHA-256 of the sorted-key JSON of the stack id, logical id
/// and properties, so equivalent creates produce the same id. The JSON uses
/// `", "` / `": "` separators and `\uXXXX` escapes for non-ASCII text, which
/// keeps ids identical to those issued by earlier Python-based providers.
pub fn canonical_physical_resource_id(request: &Request) -> Result<String, Error> {
    if let Some(id) = request.physical_resource_id() {
        return Ok(id.to_string());
    }
    let canonical = canonical_json(&json!({
        "stack_id": request.stack_id,
        "logical_resource_id": request.logical_resource_id,
        "resource_properties": request.resource_properties,
    }))?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

/// Normalize a lifecycle method's output into a successful response.
///
/// Loosely-typed [`ResourceOutput::Value`] results are accepted as `null`
/// (implicit id), a string (the id) or a two-element `[id, {data}]` array;
/// anything else is an [`Error::InvalidReturnType`].
pub fn unpack_response(request: &Request, output: ResourceOutput) -> Result<Response, Error> {
    let (physical_resource_id, data) = match output {
        ResourceOutput::Response(response) => return Ok(response),
        ResourceOutput::Implicit => (canonical_physical_resource_id(request)?, Map::new()),
        ResourceOutput::PhysicalId(id) => (id, Map::new()),
        ResourceOutput::WithData(id, data) => (id, data),
        ResourceOutput::Value(value) => match value {
            Value::Null => (canonical_physical_resource_id(request)?, Map::new()),
            Value::String(id) => (id, Map::new()),
            Value::Array(items) => match <[Value; 2]>::try_from(items) {
                Ok([Value::String(id), Value::Object(data)]) => (id, data),
                Ok(pair) => return Err(invalid_return_type(&Value::Array(pair.into()))),
                Err(items) => return Err(invalid_return_type(&Value::Array(items))),
            },
            other => return Err(invalid_return_type(&other)),
        },
    };

    Response::from_request(request, Status::Success)
        .with_physical_resource_id(physical_resource_id)
        .with_data(data)
        .build()
}

fn invalid_return_type(value: &Value) -> Error {
    Error::InvalidReturnType(format!(
        "Method returned {} ({}), expecting one of: Response, (String, Map), String, or nothing.",
        value,
        value_type_name(value)
    ))
}

/// Handle one event with an HTTP dispatcher configured from the environment.
pub async fn handle_event(event: &Value) -> Result<Map<String, Value>, Error> {
    Dispatcher::http(HandlerOptions::from_env())?
        .handle(event)
        .await
}
