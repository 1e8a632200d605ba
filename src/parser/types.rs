use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::runner::context::{TOKEN_FIELD, USER_ID_FIELD};

/// Default login endpoint of the ON API
pub const DEFAULT_LOGIN_PATH: &str = "authentication/login";

/// Query parameter carrying the access token
pub const DEFAULT_TOKEN_PARAMETER: &str = "t";

/// Problems found while building an endpoint descriptor
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DescriptorError {
    #[error("endpoint path is empty")]
    EmptyPath,

    #[error("{path}: empty field name in `{section}`")]
    EmptyFieldName { path: String, section: &'static str },

    #[error("{path}: required field `{field}` is declared more than once (aliases: {aliases})")]
    DuplicateRequiredField {
        path: String,
        field: String,
        aliases: String,
    },
}

/// A session field an endpoint needs before it can be requested.
///
/// When the field does not appear as `:field` in the path it is sent as the
/// query parameter `alias`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredField {
    pub field: String,
    pub alias: String,
}

impl RequiredField {
    pub fn new(field: &str) -> Self {
        Self::aliased(field, field)
    }

    pub fn aliased(field: &str, alias: &str) -> Self {
        Self {
            field: field.to_string(),
            alias: alias.to_string(),
        }
    }
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field == self.alias {
            f.write_str(&self.field)
        } else {
            write!(f, "{}→{}", self.field, self.alias)
        }
    }
}

/// A response field to capture into the session under `store_as`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectField {
    pub source: String,
    pub store_as: String,
}

impl CollectField {
    pub fn new(source: &str) -> Self {
        Self::aliased(source, source)
    }

    pub fn aliased(source: &str, store_as: &str) -> Self {
        Self {
            source: source.to_string(),
            store_as: store_as.to_string(),
        }
    }
}

impl fmt::Display for CollectField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.source == self.store_as {
            f.write_str(&self.source)
        } else {
            write!(f, "{}→{}", self.source, self.store_as)
        }
    }
}

/// Immutable declaration of one endpoint test
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDescriptor {
    /// Optional group name, used for console output only
    pub name: Option<String>,
    pub path_pattern: String,
    pub required_fields: Vec<RequiredField>,
    pub collect: Vec<CollectField>,
    pub static_parameters: Vec<(String, String)>,
}

impl EndpointDescriptor {
    /// Build a descriptor, rejecting empty names and duplicated required fields.
    ///
    /// Surrounding whitespace and leading `/` are stripped from the pattern;
    /// the result is the descriptor's label.
    pub fn new(
        path_pattern: &str,
        required_fields: Vec<RequiredField>,
        collect: Vec<CollectField>,
        static_parameters: Vec<(String, String)>,
    ) -> Result<Self, DescriptorError> {
        let path = path_pattern.trim().trim_start_matches('/');
        if path.is_empty() {
            return Err(DescriptorError::EmptyPath);
        }

        for req in &required_fields {
            if req.field.trim().is_empty() || req.alias.trim().is_empty() {
                return Err(DescriptorError::EmptyFieldName {
                    path: path.to_string(),
                    section: "requires",
                });
            }
            let aliases: Vec<&str> = required_fields
                .iter()
                .filter(|r| r.field == req.field)
                .map(|r| r.alias.as_str())
                .collect();
            if aliases.len() > 1 {
                return Err(DescriptorError::DuplicateRequiredField {
                    path: path.to_string(),
                    field: req.field.clone(),
                    aliases: aliases.join(", "),
                });
            }
        }

        if collect
            .iter()
            .any(|c| c.source.trim().is_empty() || c.store_as.trim().is_empty())
        {
            return Err(DescriptorError::EmptyFieldName {
                path: path.to_string(),
                section: "collect",
            });
        }

        if static_parameters.iter().any(|(k, _)| k.trim().is_empty()) {
            return Err(DescriptorError::EmptyFieldName {
                path: path.to_string(),
                section: "params",
            });
        }

        Ok(Self {
            name: None,
            path_pattern: path.to_string(),
            required_fields,
            collect,
            static_parameters,
        })
    }

    pub fn builder(path_pattern: &str) -> EndpointDescriptorBuilder {
        EndpointDescriptorBuilder {
            path_pattern: path_pattern.to_string(),
            name: None,
            required_fields: Vec::new(),
            collect: Vec::new(),
            static_parameters: Vec::new(),
        }
    }

    /// The login descriptor: no prerequisites, captures token and user ID
    pub fn login(path: &str) -> Result<Self, DescriptorError> {
        Self::new(
            path,
            Vec::new(),
            vec![CollectField::new(TOKEN_FIELD), CollectField::new(USER_ID_FIELD)],
            Vec::new(),
        )
    }

    /// Label used in reports: always the unresolved pattern
    pub fn label(&self) -> &str {
        &self.path_pattern
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }
}

/// Incremental construction of an [`EndpointDescriptor`]
pub struct EndpointDescriptorBuilder {
    path_pattern: String,
    name: Option<String>,
    required_fields: Vec<RequiredField>,
    collect: Vec<CollectField>,
    static_parameters: Vec<(String, String)>,
}

impl EndpointDescriptorBuilder {
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn require(mut self, field: &str) -> Self {
        self.required_fields.push(RequiredField::new(field));
        self
    }

    pub fn require_as(mut self, field: &str, alias: &str) -> Self {
        self.required_fields.push(RequiredField::aliased(field, alias));
        self
    }

    pub fn collect(mut self, field: &str) -> Self {
        self.collect.push(CollectField::new(field));
        self
    }

    pub fn collect_as(mut self, source: &str, store_as: &str) -> Self {
        self.collect.push(CollectField::aliased(source, store_as));
        self
    }

    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.static_parameters
            .push((key.to_string(), value.to_string()));
        self
    }

    pub fn build(self) -> Result<EndpointDescriptor, DescriptorError> {
        EndpointDescriptor::new(
            &self.path_pattern,
            self.required_fields,
            self.collect,
            self.static_parameters,
        )
        .map(|d| d.with_name(self.name))
    }
}

/// A validated, ordered list of endpoint tests for one API
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointCatalog {
    pub name: String,
    pub login: EndpointDescriptor,
    pub token_parameter: String,
    pub endpoints: Vec<EndpointDescriptor>,
}

impl EndpointCatalog {
    pub fn new(name: &str, endpoints: Vec<EndpointDescriptor>) -> Result<Self, DescriptorError> {
        Ok(Self {
            name: name.to_string(),
            login: EndpointDescriptor::login(DEFAULT_LOGIN_PATH)?,
            token_parameter: DEFAULT_TOKEN_PARAMETER.to_string(),
            endpoints,
        })
    }

    /// Keep only endpoints whose label matches one of `patterns`.
    ///
    /// Order is preserved; an empty filter keeps everything.
    pub fn filtered(&self, patterns: &[String]) -> Self {
        if patterns.is_empty() {
            return self.clone();
        }
        Self {
            endpoints: self
                .endpoints
                .iter()
                .filter(|e| patterns.iter().any(|p| e.label().contains(p.as_str())))
                .cloned()
                .collect(),
            ..self.clone()
        }
    }
}
