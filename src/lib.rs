//! Custom Resource SDK
//!
//! This crate implements the provider side of the CloudFormation custom
//! resource protocol. A provider receives lifecycle events (`Create`,
//! `Update`, `Delete`) for resources whose type starts with `Custom::`,
//! performs the work, and reports the outcome with an HTTP PUT of a JSON
//! document to the presigned URL carried by the event.
//!
//! # Overview
//!
//! - **Event model** ([`types`]): typed requests parsed from the wire format and
//!   responses serialized back to it
//! - **Resource types** ([`resource`]): the [`Resource`] lifecycle trait and the
//!   [`ResourceType`] description every type provides
//! - **Property schemas** ([`schema`], [`validation`]): declared property types
//!   and validation of event properties against them
//! - **Registry** ([`registry`]): canonical type names resolved to resource types
//! - **Dispatcher** ([`handler`]): parse, dispatch, normalize, deliver
//! - **Delivery** ([`delivery`]): HTTP PUT of the response
//! - **Logging**: integration with `tracing`
//!
//! # Quick Start
//!
//! ```ignore
//! use custom_resource_sdk::{Dispatcher, HandlerOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), custom_resource_sdk::Error> {
//!     custom_resource_sdk::try_init_logging();
//!
//!     let event: serde_json::Value = serde_json::from_reader(std::io::stdin())?;
//!     let dispatcher = Dispatcher::http(HandlerOptions::from_env())?;
//!     dispatcher.handle(&event).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Failure Handling
//!
//! Every event that parses produces exactly one delivered response. Errors
//! raised while resolving, building or running a resource (panics included)
//! are reported as a `FAILED` response whose reason is `"<Kind>: <message>"`.
//! Only unparseable events and delivery failures surface as `Err`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod delivery;
pub mod error;
pub mod handler;
pub mod logging;
pub mod registry;
pub mod resource;
pub mod resources;
pub mod schema;
pub mod session;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use delivery::{DeliveryFailure, HttpTransport, ResponseTransport};
pub use error::Error;
pub use handler::{
    canonical_physical_resource_id, handle_event, unpack_response, Dispatcher, HandlerOptions,
};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use registry::{get_mapping, ResourceRegistry};
pub use resource::{Resource, ResourceDescriptor, ResourceOutput, ResourceType};
pub use session::Session;
pub use types::{Request, RequestType, Response, Status};
pub use validation::{Properties, PropertyValue};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
