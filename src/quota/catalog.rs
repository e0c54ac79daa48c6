//! Resource Catalog
//!
//! Read-only map from each [`ModelName`] to its deployments and their
//! per-window token capacity. Built once at startup from a TOML file whose
//! entries name the environment variables that hold endpoint, API key and
//! deployment name.
//!
//! ```toml
//! [[models."text-embedding-3-small"]]
//! name = "east-us"
//! endpoint_env = "AZURE_EASTUS_ENDPOINT"
//! api_key_env = "AZURE_EASTUS_API_KEY"
//! deployment_env = "AZURE_EASTUS_EMBED_3_SMALL"
//! quota = 350
//! ```
//!
//! `quota` is in thousands of tokens per minute. Array order is the order in
//! which resources are tried.

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

use super::error::CatalogError;
use super::model::ModelName;

/// Catalog `quota` values are stated in this many tokens
pub const QUOTA_UNIT: u64 = 1000;

/// One backend deployment of a model
#[derive(Clone, PartialEq, Eq)]
pub struct Resource {
    /// Name, unique within its model
    pub name: String,

    /// Raw tokens allowed per rolling window
    pub capacity: u64,

    /// Deployment name on the provider side
    pub deployment: String,

    /// Service endpoint URL
    pub endpoint: String,

    api_key: String,
}

impl Resource {
    /// Create a resource with a capacity in raw tokens
    pub fn new(
        name: impl Into<String>,
        capacity: u64,
        deployment: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            capacity,
            deployment: deployment.into(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    /// Resource with only a name and capacity, for tests and benches
    pub fn with_capacity(name: impl Into<String>, capacity: u64) -> Self {
        let name = name.into();
        Self::new(name.clone(), capacity, name, String::new(), String::new())
    }

    /// API key for the deployment
    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("deployment", &self.deployment)
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ENDPOINT={} deployment={} capacity={} api_key=[REDACTED]",
            self.name, self.endpoint, self.deployment, self.capacity
        )
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    models: BTreeMap<String, Vec<ResourceEntry>>,
}

#[derive(Debug, Deserialize)]
struct ResourceEntry {
    name: String,
    endpoint_env: String,
    api_key_env: String,
    deployment_env: String,
    quota: u64,
}

/// Static model → resources mapping
#[derive(Debug, Clone, Default)]
pub struct ResourceCatalog {
    models: BTreeMap<ModelName, Vec<Resource>>,
}

impl ResourceCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a model with its resources in try-order
    pub fn with_model(mut self, model: ModelName, resources: Vec<Resource>) -> Self {
        self.models.insert(model, resources);
        self
    }

    /// Load a catalog file, resolving variables from the process environment
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_toml_str_with(&content, |var| std::env::var(var).ok())?;
        debug!(path = %path.display(), "Loaded resource catalog");
        Ok(catalog)
    }

    /// Parse catalog TOML, resolving variables through `lookup`
    pub fn from_toml_str_with<F>(content: &str, lookup: F) -> Result<Self, CatalogError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file: CatalogFile = toml::from_str(content)?;

        for name in file.models.keys() {
            if ModelName::from_str(name).is_err() {
                warn!(model = %name, "Model in catalog is not defined in source code");
            }
        }

        let mut models = BTreeMap::new();
        for model in ModelName::ALL {
            let Some(entries) = file.models.get(model.as_str()) else {
                warn!(model = %model, "Model is not defined in catalog");
                continue;
            };

            let mut seen = HashSet::new();
            let mut resources = Vec::with_capacity(entries.len());
            for entry in entries {
                if !seen.insert(entry.name.as_str()) {
                    return Err(CatalogError::DuplicateResource {
                        model,
                        resource: entry.name.clone(),
                    });
                }
                if entry.quota == 0 {
                    return Err(CatalogError::ZeroQuota {
                        model,
                        resource: entry.name.clone(),
                    });
                }

                let capacity = entry.quota.checked_mul(QUOTA_UNIT).ok_or_else(|| {
                    CatalogError::QuotaOverflow {
                        model,
                        resource: entry.name.clone(),
                    }
                })?;

                let resolve = |var: &str| {
                    lookup(var).ok_or_else(|| CatalogError::MissingEnv {
                        model: model.to_string(),
                        resource: entry.name.clone(),
                        var: var.to_string(),
                    })
                };

                resources.push(Resource::new(
                    entry.name.clone(),
                    capacity,
                    resolve(&entry.deployment_env)?,
                    resolve(&entry.endpoint_env)?,
                    resolve(&entry.api_key_env)?,
                ));
            }
            models.insert(model, resources);
        }

        Ok(Self { models })
    }

    /// Resources of a model in try-order; empty if the model is not deployed
    pub fn resources(&self, model: ModelName) -> &[Resource] {
        self.models.get(&model).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Look up one resource by name
    pub fn resource(&self, model: ModelName, name: &str) -> Option<&Resource> {
        self.resources(model).iter().find(|r| r.name == name)
    }

    /// Capacity of one resource, in raw tokens
    pub fn capacity(&self, model: ModelName, name: &str) -> Option<u64> {
        self.resource(model, name).map(|r| r.capacity)
    }

    /// Models that have at least one entry in the catalog
    pub fn models(&self) -> impl Iterator<Item = ModelName> + '_ {
        self.models.keys().copied()
    }

    /// Total number of resources across all models
    pub fn resource_count(&self) -> usize {
        self.models.values().map(Vec::len).sum()
    }
}
