//! Discovery and lookup of resource types.
//!
//! Resource types live under a tree of [`Namespace`]s rooted at
//! [`crate::resources::namespace`]. [`load_resource_types`] walks the tree and
//! yields each type once, from the namespace it is defined in, with that
//! namespace's prefix applied to its canonical name. [`get_mapping`] indexes
//! the result by canonical name and caches it for the life of the process.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use crate::error::Error;
use crate::resource::ResourceDescriptor;

/// A module of resource types.
#[derive(Debug, Clone)]
pub struct Namespace {
    path: &'static str,
    prefix: Option<&'static str>,
    types: Vec<ResourceDescriptor>,
    children: Vec<Namespace>,
}

impl Namespace {
    /// Create an empty namespace for a module path, usually `module_path!()`.
    pub fn new(path: &'static str) -> Self {
        Self {
            path,
            prefix: None,
            types: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Set the resource type prefix declared by the module.
    pub fn with_prefix(mut self, prefix: &'static str) -> Self {
        self.prefix = Some(prefix);
        self
    }

    /// List a resource type visible in the module.
    pub fn with_type(mut self, descriptor: ResourceDescriptor) -> Self {
        self.types.push(descriptor);
        self
    }

    /// Add a nested namespace.
    pub fn with_child(mut self, child: Namespace) -> Self {
        self.children.push(child);
        self
    }

    /// The module path.
    pub fn path(&self) -> &'static str {
        self.path
    }

    /// The declared prefix, if any.
    pub fn prefix(&self) -> Option<&'static str> {
        self.prefix
    }
}

/// Load every resource type under the built-in namespace.
pub fn load_resource_types() -> Vec<ResourceDescriptor> {
    load_resource_types_from(&crate::resources::namespace())
}

/// Load every resource type under a namespace, depth-first.
///
/// A type listed by a namespace other than the module it is defined in is a
/// re-export and is skipped there. A type is yielded at most once.
pub fn load_resource_types_from(root: &Namespace) -> Vec<ResourceDescriptor> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    walk(root, &mut seen, &mut found);
    found
}

fn walk(namespace: &Namespace, seen: &mut HashSet<TypeId>, found: &mut Vec<ResourceDescriptor>) {
    for descriptor in &namespace.types {
        if descriptor.module_path() != namespace.path {
            debug!(
                namespace = namespace.path,
                rust_type = descriptor.rust_type(),
                "Skipping re-exported resource type"
            );
            continue;
        }
        if seen.insert(descriptor.type_id()) {
            found.push(descriptor.clone().with_prefix(namespace.prefix));
        }
    }
    for child in &namespace.children {
        walk(child, seen, found);
    }
}

/// Resource types indexed by canonical name.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    mapping: HashMap<String, ResourceDescriptor>,
}

impl ResourceRegistry {
    /// Index descriptors by canonical name.
    ///
    /// Two descriptors of different types with the same canonical name fail
    /// with [`Error::DuplicateResourceType`].
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = ResourceDescriptor>,
    ) -> Result<Self, Error> {
        let mut mapping: HashMap<String, ResourceDescriptor> = HashMap::new();
        for descriptor in descriptors {
            if let Some(existing) = mapping.get(descriptor.resource_type()) {
                if existing.type_id() == descriptor.type_id() {
                    continue;
                }
                return Err(Error::DuplicateResourceType(format!(
                    "{} is defined by both {} and {}",
                    descriptor.resource_type(),
                    existing.rust_type(),
                    descriptor.rust_type()
                )));
            }
            mapping.insert(descriptor.resource_type().to_string(), descriptor);
        }
        Ok(Self { mapping })
    }

    /// Look up a resource type by canonical name.
    pub fn get(&self, resource_type: &str) -> Result<&ResourceDescriptor, Error> {
        self.mapping.get(resource_type).ok_or_else(|| {
            Error::UnknownResourceType(format!("{} is not a known resource type", resource_type))
        })
    }

    /// Whether a canonical name is registered.
    pub fn contains(&self, resource_type: &str) -> bool {
        self.mapping.contains_key(resource_type)
    }

    /// Registered canonical names, sorted.
    pub fn resource_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.mapping.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    /// Whether no type is registered.
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

static MAPPING: RwLock<Option<Arc<ResourceRegistry>>> = RwLock::new(None);

/// The process-wide registry of built-in resource types.
///
/// Built on first use and cached until [`clear_mapping_cache`]. Concurrent
/// first calls build it once.
pub fn get_mapping() -> Result<Arc<ResourceRegistry>, Error> {
    if let Some(registry) = MAPPING.read().unwrap_or_else(|e| e.into_inner()).as_ref() {
        return Ok(Arc::clone(registry));
    }

    let mut guard = MAPPING.write().unwrap_or_else(|e| e.into_inner());
    if let Some(registry) = guard.as_ref() {
        return Ok(Arc::clone(registry));
    }

    let registry = Arc::new(ResourceRegistry::from_descriptors(load_resource_types())?);
    info!(
        resource_types = registry.len(),
        "Loaded custom resource types"
    );
    *guard = Some(Arc::clone(&registry));
    Ok(registry)
}

/// Drop the cached registry so the next [`get_mapping`] rebuilds it.
pub fn clear_mapping_cache() {
    let mut guard = MAPPING.write().unwrap_or_else(|e| e.into_inner());
    if guard.take().is_some() {
        warn!("Cleared cached resource type mapping");
    }
}
