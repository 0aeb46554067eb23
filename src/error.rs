//! Error types for the custom resource SDK.

use std::error::Error as StdError;

use thiserror::Error;

/// Errors raised while handling a custom resource event.
///
/// Every variant except [`Error::EventSerialization`] raised while parsing the
/// inbound event is converted by the dispatcher into a `FAILED` response whose
/// reason is [`Error::reason`].
#[derive(Debug, Error)]
pub enum Error {
    /// The inbound event or an outbound response could not be built.
    #[error("Event serialization error: {0}")]
    EventSerialization(String),

    /// No registered resource type matches the event's `ResourceType`.
    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    /// A resource method returned a value of an unsupported shape.
    #[error("Invalid return type: {0}")]
    InvalidReturnType(String),

    /// The response could not be delivered to the callback URL.
    #[error("CloudFormation reporting error: {0}")]
    CloudFormationReporting(String),

    /// Resource properties did not match the declared schema.
    #[error("Property validation error: {0}")]
    PropertyValidation(String),

    /// Two resource types share one canonical name.
    #[error("Duplicate resource type: {0}")]
    DuplicateResourceType(String),

    /// A resource asked the session for a client it does not carry.
    #[error("Missing client: {0}")]
    MissingClient(String),

    /// An error raised by resource code.
    #[error("{kind}: {source}")]
    Resource {
        /// Short type name of the underlying error.
        kind: String,
        /// The underlying error.
        source: Box<dyn StdError + Send + Sync>,
    },

    /// A resource method panicked.
    #[error("Resource panicked: {0}")]
    Panic(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The blocking runtime could not be started.
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

impl Error {
    /// Wrap an error raised by resource code, keeping its type name as the kind.
    ///
    /// # Examples
    ///
    /// ```
    /// use custom_resource_sdk::Error;
    ///
    /// let err = Error::resource(std::fmt::Error);
    /// assert_eq!(err.kind(), "Error");
    /// ```
    pub fn resource<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Resource {
            kind: short_type_name::<E>().to_string(),
            source: Box::new(err),
        }
    }

    /// Build a resource error from a plain message.
    pub fn custom(msg: impl Into<String>) -> Self {
        let msg: String = msg.into();
        Self::Resource {
            kind: "ResourceError".to_string(),
            source: msg.into(),
        }
    }

    /// A stable identifier for the kind of error.
    pub fn kind(&self) -> &str {
        match self {
            Self::EventSerialization(_) => "EventSerializationError",
            Self::UnknownResourceType(_) => "UnknownResourceTypeError",
            Self::InvalidReturnType(_) => "InvalidReturnTypeError",
            Self::CloudFormationReporting(_) => "CloudFormationReportingError",
            Self::PropertyValidation(_) => "PropertyValidationError",
            Self::DuplicateResourceType(_) => "DuplicateResourceTypeError",
            Self::MissingClient(_) => "MissingClientError",
            Self::Resource { kind, .. } => kind.as_str(),
            Self::Panic(_) => "PanicError",
            Self::Serialization(_) => "SerializationError",
            Self::Runtime(_) => "RuntimeError",
        }
    }

    /// The error message without its kind.
    pub fn message(&self) -> String {
        match self {
            Self::EventSerialization(msg)
            | Self::UnknownResourceType(msg)
            | Self::InvalidReturnType(msg)
            | Self::CloudFormationReporting(msg)
            | Self::PropertyValidation(msg)
            | Self::DuplicateResourceType(msg)
            | Self::MissingClient(msg)
            | Self::Panic(msg) => msg.clone(),
            Self::Resource { source, .. } => source.to_string(),
            Self::Serialization(err) => err.to_string(),
            Self::Runtime(err) => err.to_string(),
        }
    }

    /// A short diagnostic of the form `{kind}: {message}`, used as the
    /// `Reason` of failed responses.
    pub fn reason(&self) -> String {
        format!("{}: {}", self.kind(), self.message())
    }
}

/// Last path segment of a type name, without generic arguments.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("bucket is not empty")]
    struct BucketNotEmpty;

    #[test]
    fn test_error_display() {
        let err = Error::UnknownResourceType("Custom::Foo is not a known resource type".into());
        assert_eq!(
            format!("{}", err),
            "Unknown resource type: Custom::Foo is not a known resource type"
        );

        let err = Error::EventSerialization("missing field".to_string());
        assert_eq!(format!("{}", err), "Event serialization error: missing field");
    }

    #[test]
    fn test_reason_combines_kind_and_message() {
        let err = Error::InvalidReturnType("Method returned 3".to_string());
        assert_eq!(err.reason(), "InvalidReturnTypeError: Method returned 3");

        let err = Error::CloudFormationReporting("connection refused".to_string());
        assert_eq!(
            err.reason(),
            "CloudFormationReportingError: connection refused"
        );
    }

    #[test]
    fn test_resource_error_keeps_type_name() {
        let err = Error::resource(BucketNotEmpty);
        assert_eq!(err.kind(), "BucketNotEmpty");
        assert_eq!(err.message(), "bucket is not empty");
        assert_eq!(err.reason(), "BucketNotEmpty: bucket is not empty");
        assert!(StdError::source(&err).is_some());
    }

    #[test]
    fn test_custom_error() {
        let err = Error::custom("quota exceeded");
        assert_eq!(err.reason(), "ResourceError: quota exceeded");
    }

    #[test]
    fn test_serialization_from() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert_eq!(err.kind(), "SerializationError");
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<BucketNotEmpty>(), "BucketNotEmpty");
        assert_eq!(short_type_name::<Vec<String>>(), "Vec");
    }
}
