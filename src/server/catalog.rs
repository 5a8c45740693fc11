//! Product price catalog.
//!
//! Resolves a request string to the response sent back to the client. The
//! built-in table can be replaced by a YAML file of the form:
//!
//! ```yaml
//! products:
//!   processor: "$200"
//!   memory: "$100"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::error::{Result, ServerError};

/// Response for any request the catalog does not recognise.
pub const UNKNOWN_COMPONENT: &str = "Unknown component";

/// Turns a request into a response. Must be total: every input gets an answer.
pub trait Catalog: Send + Sync {
    fn resolve(&self, request: &str) -> String;
}

/// Exact-match lookup table from product name to price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceCatalog {
    #[serde(default)]
    products: HashMap<String, String>,
}

impl PriceCatalog {
    /// Create a catalog from `(product, price)` pairs.
    pub fn new<I, K, V>(products: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            products: products
                .into_iter()
                .map(|(name, price)| (name.into(), price.into()))
                .collect(),
        }
    }

    /// Load a catalog from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading price catalog");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load a catalog from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let catalog: PriceCatalog = serde_yaml::from_str(yaml)
            .map_err(|e| ServerError::Config(format!("invalid catalog: {}", e)))?;
        info!(products = catalog.len(), "Price catalog loaded");
        Ok(catalog)
    }

    /// Number of known products.
    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl Default for PriceCatalog {
    fn default() -> Self {
        Self::new([
            ("processor", "$200"),
            ("memory", "$100"),
            ("harddisk", "$80"),
        ])
    }
}

impl Catalog for PriceCatalog {
    fn resolve(&self, request: &str) -> String {
        self.products
            .get(request)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_COMPONENT.to_string())
    }
}
