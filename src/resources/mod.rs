//! Built-in resource types.
//!
//! Each submodule declares a `RESOURCE_TYPE_PREFIX` and lists its types in a
//! [`Namespace`]; [`namespace`] ties them together for the registry loader.

pub mod cloudfront;
pub mod dynamodb;

use crate::registry::Namespace;

/// The root of the built-in namespace tree.
pub fn namespace() -> Namespace {
    Namespace::new(module_path!())
        .with_child(cloudfront::namespace())
        .with_child(dynamodb::namespace())
}
