//! Event model: inbound lifecycle requests and outbound responses.
//!
//! Both types mirror the CloudFormation custom resource wire format, which
//! uses PascalCase field names (`RequestType`, `ResponseURL`, ...). Field names
//! are translated to snake_case on the way in and back to PascalCase on the
//! way out.

use std::fmt;
use std::io;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::ser::Formatter;
use serde_json::{Map, Value};

use crate::error::Error;

/// Maximum size of a physical resource id, in bytes.
pub const MAX_PHYSICAL_RESOURCE_ID_LEN: usize = 1024;

const PHYSICAL_ID_TOO_LONG: &str = "Physical resource ID can be up to 1KB in size";

/// The lifecycle operation an event asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestType {
    /// Create a new resource.
    Create,
    /// Update an existing resource.
    Update,
    /// Delete an existing resource.
    Delete,
}

impl RequestType {
    /// The wire name of the request type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
        }
    }

    /// The name of the resource method that handles this request type.
    pub fn method_name(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Create" => Ok(Self::Create),
            "Update" => Ok(Self::Update),
            "Delete" => Ok(Self::Delete),
            other => Err(Error::EventSerialization(format!(
                "RequestType must be one of Create, Update, Delete, got '{}'",
                other
            ))),
        }
    }
}

/// Variant-specific request data.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestKind {
    /// A create request carries no extra fields.
    Create,
    /// An update request.
    Update {
        /// The id assigned to the resource when it was created.
        physical_resource_id: String,
        /// The properties before this update.
        old_resource_properties: Map<String, Value>,
    },
    /// A delete request.
    Delete {
        /// The id assigned to the resource when it was created.
        physical_resource_id: String,
    },
}

/// One lifecycle event for a custom resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Unique id of this request.
    pub request_id: String,
    /// Presigned URL the response must be sent to.
    pub response_url: String,
    /// Canonical resource type, e.g. `Custom::Foo`.
    pub resource_type: String,
    /// Logical id of the resource in the stack template.
    pub logical_resource_id: String,
    /// Id of the stack the resource belongs to.
    pub stack_id: String,
    /// The resource's properties as declared in the template.
    pub resource_properties: Map<String, Value>,
    /// Variant-specific fields.
    pub kind: RequestKind,
}

/// Fields shared by every request type.
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireRequest {
    request_type: String,
    request_id: String,
    #[serde(rename = "ResponseURL")]
    response_url: String,
    resource_type: String,
    logical_resource_id: String,
    stack_id: String,
    resource_properties: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireUpdate {
    physical_resource_id: String,
    old_resource_properties: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireDelete {
    physical_resource_id: String,
}

impl Request {
    /// Parse an inbound wire event.
    ///
    /// The variant is chosen from `RequestType`. Unknown fields are ignored.
    /// An unrecognized `RequestType` falls back to the shared base shape,
    /// which then fails validation of the request type itself. Every failure
    /// is an [`Error::EventSerialization`] embedding the raw event.
    ///
    /// # Examples
    ///
    /// ```
    /// use custom_resource_sdk::types::{Request, RequestType};
    /// use serde_json::json;
    ///
    /// let request = Request::parse(&json!({
    ///     "RequestType": "Create",
    ///     "RequestId": "req-1",
    ///     "ResponseURL": "https://example.com/",
    ///     "ResourceType": "Custom::Foo",
    ///     "LogicalResourceId": "Foo",
    ///     "StackId": "stack",
    ///     "ResourceProperties": {},
    /// }))
    /// .unwrap();
    /// assert_eq!(request.request_type(), RequestType::Create);
    /// ```
    pub fn parse(raw: &Value) -> Result<Self, Error> {
        Self::parse_inner(raw).map_err(|reason| {
            Error::EventSerialization(format!(
                "Couldn't instantiate request object: {}; Source object: {}",
                reason,
                canonical_json(raw).unwrap_or_else(|_| canonicalize(raw).to_string())
            ))
        })
    }

    fn parse_inner(raw: &Value) -> Result<Self, String> {
        let base: WireRequest = serde_json::from_value(raw.clone()).map_err(|e| e.to_string())?;

        let request_type = base
            .request_type
            .parse::<RequestType>()
            .map_err(|e| e.message())?;

        let kind = match request_type {
            RequestType::Create => RequestKind::Create,
            RequestType::Update => {
                let update: WireUpdate =
                    serde_json::from_value(raw.clone()).map_err(|e| e.to_string())?;
                RequestKind::Update {
                    physical_resource_id: update.physical_resource_id,
                    old_resource_properties: update.old_resource_properties,
                }
            },
            RequestType::Delete => {
                let delete: WireDelete =
                    serde_json::from_value(raw.clone()).map_err(|e| e.to_string())?;
                RequestKind::Delete {
                    physical_resource_id: delete.physical_resource_id,
                }
            },
        };

        let request = Self {
            request_id: base.request_id,
            response_url: base.response_url,
            resource_type: base.resource_type,
            logical_resource_id: base.logical_resource_id,
            stack_id: base.stack_id,
            resource_properties: base.resource_properties,
            kind,
        };
        request.check_fields()?;
        Ok(request)
    }

    fn check_fields(&self) -> Result<(), String> {
        let mut fields = vec![
            ("RequestId", self.request_id.as_str()),
            ("ResponseURL", self.response_url.as_str()),
            ("ResourceType", self.resource_type.as_str()),
            ("LogicalResourceId", self.logical_resource_id.as_str()),
            ("StackId", self.stack_id.as_str()),
        ];
        if let Some(id) = self.physical_resource_id() {
            if id.len() > MAX_PHYSICAL_RESOURCE_ID_LEN {
                return Err(PHYSICAL_ID_TOO_LONG.to_string());
            }
            fields.push(("PhysicalResourceId", id));
        }
        match fields.iter().find(|(_, value)| value.is_empty()) {
            Some((name, _)) => Err(format!("field `{}` must not be empty", name)),
            None => Ok(()),
        }
    }

    /// The lifecycle operation requested.
    pub fn request_type(&self) -> RequestType {
        match self.kind {
            RequestKind::Create => RequestType::Create,
            RequestKind::Update { .. } => RequestType::Update,
            RequestKind::Delete { .. } => RequestType::Delete,
        }
    }

    /// The previously assigned physical id, for update and delete requests.
    pub fn physical_resource_id(&self) -> Option<&str> {
        match &self.kind {
            RequestKind::Create => None,
            RequestKind::Update {
                physical_resource_id,
                ..
            }
            | RequestKind::Delete {
                physical_resource_id,
            } => Some(physical_resource_id),
        }
    }

    /// The properties before an update.
    pub fn old_resource_properties(&self) -> Option<&Map<String, Value>> {
        match &self.kind {
            RequestKind::Update {
                old_resource_properties,
                ..
            } => Some(old_resource_properties),
            _ => None,
        }
    }
}

/// Rebuild a JSON value with every object's keys in sorted order.
pub(crate) fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            Value::Object(
                keys.into_iter()
                    .map(|key| (key.clone(), canonicalize(&map[key])))
                    .collect(),
            )
        },
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Render a value as sorted-key JSON with `", "` and `": "` separators and
/// every character outside printable ASCII written as a `\uXXXX` escape.
///
/// This is the rendering hashed into default physical ids, so it must stay
/// byte-stable across releases.
pub(crate) fn canonical_json(value: &Value) -> Result<String, Error> {
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, SpacedAsciiFormatter);
    canonicalize(value).serialize(&mut serializer)?;
    String::from_utf8(out).map_err(|e| Error::EventSerialization(e.to_string()))
}

struct SpacedAsciiFormatter;

impl Formatter for SpacedAsciiFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, c) in fragment.char_indices() {
            if (' '..='~').contains(&c) {
                continue;
            }
            writer.write_all(fragment[start..i].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = i + c.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

/// Outcome reported back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// The operation succeeded.
    Success,
    /// The operation failed.
    Failed,
}

impl From<bool> for Status {
    fn from(success: bool) -> Self {
        if success {
            Self::Success
        } else {
            Self::Failed
        }
    }
}

/// The response reported for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Response {
    physical_resource_id: String,
    stack_id: String,
    request_id: String,
    logical_resource_id: String,
    status: Status,
    reason: String,
    data: Map<String, Value>,
    no_echo: bool,
}

impl Response {
    /// Start a response for a request, copying its identity fields.
    ///
    /// If no physical id is set on the builder, the request's own physical id
    /// (update and delete requests) is used.
    ///
    /// # Examples
    ///
    /// ```
    /// use custom_resource_sdk::testing::update_event;
    /// use custom_resource_sdk::types::{Request, Response, Status};
    ///
    /// let request = Request::parse(&update_event()).unwrap();
    /// let response = Response::from_request(&request, Status::Success).build().unwrap();
    /// assert_eq!(Some(response.physical_resource_id()), request.physical_resource_id());
    /// ```
    pub fn from_request(request: &Request, status: impl Into<Status>) -> ResponseBuilder {
        ResponseBuilder {
            physical_resource_id: request.physical_resource_id().map(str::to_string),
            stack_id: request.stack_id.clone(),
            request_id: request.request_id.clone(),
            logical_resource_id: request.logical_resource_id.clone(),
            status: status.into(),
            reason: String::new(),
            data: Map::new(),
            no_echo: false,
        }
    }

    /// The physical id of the resource.
    pub fn physical_resource_id(&self) -> &str {
        &self.physical_resource_id
    }

    /// Id of the stack.
    pub fn stack_id(&self) -> &str {
        &self.stack_id
    }

    /// Id of the originating request.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Logical id of the resource.
    pub fn logical_resource_id(&self) -> &str {
        &self.logical_resource_id
    }

    /// Outcome of the operation.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Diagnostic text, non-empty for failures.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Attributes exposed to the stack template.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Whether the data must be masked when displayed.
    pub fn no_echo(&self) -> bool {
        self.no_echo
    }

    /// Serialize to the PascalCase wire format.
    pub fn to_dict(&self) -> Result<Map<String, Value>, Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(Error::EventSerialization(format!(
                "response serialized to a non-object: {}",
                other
            ))),
        }
    }
}

/// Builder returned by [`Response::from_request`].
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    physical_resource_id: Option<String>,
    stack_id: String,
    request_id: String,
    logical_resource_id: String,
    status: Status,
    reason: String,
    data: Map<String, Value>,
    no_echo: bool,
}

impl ResponseBuilder {
    /// Set the physical id explicitly.
    pub fn with_physical_resource_id(mut self, id: impl Into<String>) -> Self {
        self.physical_resource_id = Some(id.into());
        self
    }

    /// Set the reason text.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Set the data attributes.
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// Mask the data attributes when displayed.
    pub fn with_no_echo(mut self, no_echo: bool) -> Self {
        self.no_echo = no_echo;
        self
    }

    /// Validate and build the response.
    ///
    /// Fails with [`Error::EventSerialization`] when no physical id is
    /// available or it exceeds [`MAX_PHYSICAL_RESOURCE_ID_LEN`] bytes.
    pub fn build(self) -> Result<Response, Error> {
        let physical_resource_id = self.physical_resource_id.ok_or_else(|| {
            Error::EventSerialization("Physical resource ID is required".to_string())
        })?;
        if physical_resource_id.len() > MAX_PHYSICAL_RESOURCE_ID_LEN {
            return Err(Error::EventSerialization(PHYSICAL_ID_TOO_LONG.to_string()));
        }
        Ok(Response {
            physical_resource_id,
            stack_id: self.stack_id,
            request_id: self.request_id,
            logical_resource_id: self.logical_resource_id,
            status: self.status,
            reason: self.reason,
            data: self.data,
            no_echo: self.no_echo,
        })
    }
}
