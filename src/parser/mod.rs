pub mod types;
pub mod yaml;

use anyhow::{Context, Result};
use std::path::Path;

pub use types::{CollectField, EndpointCatalog, EndpointDescriptor, RequiredField};

/// Load the catalog at `path`, or the built-in ON API catalog
pub fn load_catalog(path: Option<&Path>) -> Result<EndpointCatalog> {
    match path {
        Some(p) => yaml::parse_catalog_file(p)
            .with_context(|| format!("Failed to load catalog: {}", p.display())),
        None => yaml::default_catalog().context("Built-in catalog is invalid"),
    }
}
