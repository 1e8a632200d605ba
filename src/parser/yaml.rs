use super::types::{
    CollectField, DescriptorError, EndpointCatalog, EndpointDescriptor, RequiredField,
    DEFAULT_LOGIN_PATH, DEFAULT_TOKEN_PARAMETER,
};
use crate::runner::resolver::placeholders;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Catalog shipped with the crate: the full ON API endpoint sequence
const DEFAULT_CATALOG: &str = include_str!("../../catalog/on_api.yaml");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("catalog has {} invalid endpoint(s):\n{}", .0.len(), list_invalid(.0))]
    Invalid(Vec<InvalidEndpoint>),
}

/// One rejected catalog entry
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidEndpoint {
    pub index: usize,
    pub path: String,
    pub reason: String,
}

impl fmt::Display for InvalidEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  [{}] {}: {}", self.index, self.path, self.reason)
    }
}

fn list_invalid(items: &[InvalidEndpoint]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCatalog {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    login: Option<String>,
    #[serde(default)]
    token_parameter: Option<String>,
    #[serde(default)]
    endpoints: Vec<RawEndpoint>,
}

#[derive(Debug, Deserialize)]
struct RawEndpoint {
    path: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    requires: Vec<FieldSpec>,
    #[serde(default)]
    collect: Vec<FieldSpec>,
    #[serde(default)]
    params: serde_yaml::Mapping,
}

/// `- Field` or `- Field: alias`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FieldSpec {
    Name(String),
    Aliased(serde_yaml::Mapping),
}

impl FieldSpec {
    fn into_pair(self) -> Result<(String, String), String> {
        match self {
            FieldSpec::Name(name) => Ok((name.clone(), name)),
            FieldSpec::Aliased(map) => {
                if map.len() != 1 {
                    return Err(format!(
                        "field mapping must have exactly one entry, found {}",
                        map.len()
                    ));
                }
                let (k, v) = map
                    .into_iter()
                    .next()
                    .ok_or_else(|| "empty field mapping".to_string())?;
                Ok((scalar_to_string(&k)?, scalar_to_string(&v)?))
            }
        }
    }
}

fn scalar_to_string(value: &serde_yaml::Value) -> Result<String, String> {
    match value {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!("expected a scalar value, found {:?}", other)),
    }
}

/// Load a catalog from a YAML file
pub fn parse_catalog_file(path: &Path) -> Result<EndpointCatalog, CatalogError> {
    let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_catalog_content(&content)
}

/// The built-in ON API catalog
pub fn default_catalog() -> Result<EndpointCatalog, CatalogError> {
    parse_catalog_content(DEFAULT_CATALOG)
}

/// Parse and validate catalog YAML.
///
/// Every endpoint is checked before returning, so all invalid entries are
/// reported together.
pub fn parse_catalog_content(content: &str) -> Result<EndpointCatalog, CatalogError> {
    let raw: RawCatalog = serde_yaml::from_str(content)?;

    let mut invalid = Vec::new();

    let login_path = raw.login.as_deref().unwrap_or(DEFAULT_LOGIN_PATH);
    let login = match EndpointDescriptor::login(login_path) {
        Ok(d) => Some(d),
        Err(e) => {
            invalid.push(InvalidEndpoint {
                index: 0,
                path: format!("login ({})", login_path),
                reason: e.to_string(),
            });
            None
        }
    };

    let mut endpoints = Vec::with_capacity(raw.endpoints.len());
    for (i, entry) in raw.endpoints.into_iter().enumerate() {
        let index = i + 1;
        let path = entry.path.clone();
        match build_endpoint(entry) {
            Ok(descriptor) => {
                warn_unreferenced_placeholders(&descriptor);
                endpoints.push(descriptor);
            }
            Err(reason) => invalid.push(InvalidEndpoint {
                index,
                path,
                reason,
            }),
        }
    }

    match login {
        Some(login) if invalid.is_empty() => Ok(EndpointCatalog {
            name: raw.name.unwrap_or_else(|| "API".to_string()),
            login,
            token_parameter: raw
                .token_parameter
                .unwrap_or_else(|| DEFAULT_TOKEN_PARAMETER.to_string()),
            endpoints,
        }),
        _ => Err(CatalogError::Invalid(invalid)),
    }
}

fn build_endpoint(entry: RawEndpoint) -> Result<EndpointDescriptor, String> {
    let required = entry
        .requires
        .into_iter()
        .map(|spec| spec.into_pair().map(|(f, a)| RequiredField::aliased(&f, &a)))
        .collect::<Result<Vec<_>, _>>()?;

    let collect = entry
        .collect
        .into_iter()
        .map(|spec| spec.into_pair().map(|(s, t)| CollectField::aliased(&s, &t)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut params = Vec::with_capacity(entry.params.len());
    for (k, v) in &entry.params {
        params.push((scalar_to_string(k)?, scalar_to_string(v)?));
    }

    EndpointDescriptor::new(&entry.path, required, collect, params)
        .map(|d| d.with_name(entry.name))
        .map_err(|e: DescriptorError| e.to_string())
}

/// Placeholders without a matching required field stay literal in the URL
fn warn_unreferenced_placeholders(descriptor: &EndpointDescriptor) {
    for token in placeholders(&descriptor.path_pattern) {
        if !descriptor.required_fields.iter().any(|r| r.field == token) {
            log::warn!(
                "{}: placeholder `:{}` is not a required field and will not be substituted",
                descriptor.label(),
                token
            );
        }
    }
}
