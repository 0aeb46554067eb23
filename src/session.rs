//! The external session handle passed to resource methods.
//!
//! A [`Session`] is an opaque bag of backend clients keyed by type. The
//! dispatcher never inspects it; it asks the configured session factory for a
//! fresh one per event and hands it to the resource method unchanged.
//!
//! ```
//! use std::sync::Arc;
//! use custom_resource_sdk::Session;
//!
//! struct QueueClient {
//!     endpoint: String,
//! }
//!
//! let session = Session::new().with_client(Arc::new(QueueClient {
//!     endpoint: "http://localhost:9324".to_string(),
//! }));
//!
//! let client = session.client::<Arc<QueueClient>>().unwrap();
//! assert_eq!(client.endpoint, "http://localhost:9324");
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Error;

/// Opaque handle giving resource methods access to backend clients.
#[derive(Clone, Default)]
pub struct Session {
    clients: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Session {
    /// Create an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client, replacing any previous client of the same type.
    pub fn with_client<T: Any + Send + Sync>(mut self, client: T) -> Self {
        self.clients.insert(TypeId::of::<T>(), Arc::new(client));
        self
    }

    /// Look up a client by type.
    pub fn client<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.clients
            .get(&TypeId::of::<T>())
            .and_then(|client| client.downcast_ref::<T>())
    }

    /// Look up a client by type, failing with [`Error::MissingClient`].
    pub fn require_client<T: Any + Send + Sync>(&self) -> Result<&T, Error> {
        self.client::<T>().ok_or_else(|| {
            Error::MissingClient(format!(
                "session has no client of type {}",
                std::any::type_name::<T>()
            ))
        })
    }

    /// Number of clients carried.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether the session carries no client.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("clients", &self.clients.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Region(&'static str);

    #[test]
    fn test_client_lookup() {
        let session = Session::new().with_client(Region("us-east-2"));
        assert_eq!(session.client::<Region>(), Some(&Region("us-east-2")));
        assert_eq!(session.client::<String>(), None);
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn test_client_replaced() {
        let session = Session::new()
            .with_client(Region("us-east-1"))
            .with_client(Region("eu-west-1"));
        assert_eq!(session.client::<Region>(), Some(&Region("eu-west-1")));
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn test_require_client() {
        let session = Session::new();
        assert!(session.is_empty());
        let err = session.require_client::<Region>().unwrap_err();
        assert!(matches!(err, Error::MissingClient(_)));
        assert!(err.message().contains("Region"));
    }
}
