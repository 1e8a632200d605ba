use super::context::SessionState;
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Query parameter carrying the login password
pub const PASSWORD_PARAMETER: &str = "password";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid request URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("HTTP {status}: response is not valid JSON ({reason})")]
    InvalidJson { status: u16, reason: String },
}

/// Ordered query parameters; setting an existing name replaces its value in place
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: &str) {
        match self.pairs.iter_mut().find(|(k, _)| k == key) {
            Some(pair) => pair.1 = value.to_string(),
            None => self.pairs.push((key.to_string(), value.to_string())),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.pairs.iter().position(|(k, _)| k == key)?;
        Some(self.pairs.remove(pos).1)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Apply every pair of `other`, overriding equal names
    pub fn merge(&mut self, other: QueryParams) {
        for (k, v) in other.pairs {
            self.set(&k, &v);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Status and body exactly as received
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// A response whose body parsed as JSON
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub json: Value,
    pub raw_body: String,
}

/// Blocking GET transport
pub trait Transport {
    fn get(&self, url: &Url) -> Result<RawResponse, TransportError>;
}

/// Transport backed by a blocking reqwest client
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// Build a client; without `timeout` the reqwest default applies
    pub fn new(timeout: Option<Duration>, user_agent: Option<&str>) -> Result<Self, TransportError> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(ua) = user_agent {
            builder = builder.user_agent(ua.to_string());
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, url: &Url) -> Result<RawResponse, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| TransportError::Request(e.without_url().to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| TransportError::Body(e.without_url().to_string()))?;
        Ok(RawResponse { status, body })
    }
}

/// Builds request URLs against one API base and performs the GET
pub struct Dispatcher<T: Transport> {
    base_url: String,
    token_parameter: String,
    transport: T,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(base_url: &str, token_parameter: &str, transport: T) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token_parameter: token_parameter.to_string(),
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `base/path?query`, with the session token appended last when known
    pub fn build_url(
        &self,
        path: &str,
        params: &QueryParams,
        state: &SessionState,
    ) -> Result<Url, TransportError> {
        let raw = format!("{}/{}", self.base_url, path);
        let mut url = Url::parse(&raw).map_err(|e| TransportError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })?;

        let mut query = params.clone();
        if let Some(token) = state.token() {
            query.remove(&self.token_parameter);
            query.set(&self.token_parameter, &token.to_string());
        }

        if query.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(query.iter());
        }
        Ok(url)
    }

    /// Perform one GET and parse the body as JSON. No retries.
    pub fn dispatch(
        &self,
        path: &str,
        params: &QueryParams,
        state: &SessionState,
    ) -> Result<HttpResponse, TransportError> {
        let url = self.build_url(path, params, state)?;
        log::debug!("GET {}", self.redacted(&url));

        let raw = self.transport.get(&url)?;
        let json = serde_json::from_str(&raw.body).map_err(|e| TransportError::InvalidJson {
            status: raw.status,
            reason: e.to_string(),
        })?;

        Ok(HttpResponse {
            status: raw.status,
            json,
            raw_body: raw.body,
        })
    }

    /// `url` as it may appear in logs: token and password values hidden
    pub fn redacted(&self, url: &Url) -> String {
        mask_query_params(url, &[self.token_parameter.as_str(), PASSWORD_PARAMETER])
    }
}

/// Render `url` with the values of `params` hidden, for logs
pub fn mask_query_params(url: &Url, params: &[&str]) -> String {
    if url.query().is_none() {
        return url.to_string();
    }
    let mut masked = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            if params.iter().any(|p| *p == k) {
                (k.into_owned(), "***".to_string())
            } else {
                (k.into_owned(), v.into_owned())
            }
        })
        .collect();
    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FixedTransport {
        body: String,
        requested: RefCell<Vec<String>>,
    }

    impl Transport for FixedTransport {
        fn get(&self, url: &Url) -> Result<RawResponse, TransportError> {
            self.requested.borrow_mut().push(url.to_string());
            Ok(RawResponse {
                status: 200,
                body: self.body.clone(),
            })
        }
    }

    fn dispatcher(body: &str) -> Dispatcher<FixedTransport> {
        Dispatcher::new(
            "https://school.myschoolapp.com/api/",
            "t",
            FixedTransport {
                body: body.to_string(),
                requested: RefCell::new(Vec::new()),
            },
        )
    }

    #[test]
    fn test_build_url_encodes_params() {
        let d = dispatcher("{}");
        let mut params = QueryParams::new();
        params.set("lastUpdateDate", "01/01/2018");
        params.set("name", "a b&c");

        let url = d.build_url("datasync/Changes", &params, &SessionState::new()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://school.myschoolapp.com/api/datasync/Changes?lastUpdateDate=01%2F01%2F2018&name=a+b%26c"
        );
    }

    #[test]
    fn test_token_appended_and_overrides() {
        let d = dispatcher("{}");
        let mut state = SessionState::new();
        state.set("Token", "secret");
        let mut params = QueryParams::new();
        params.set("t", "stale");
        params.set("userID", "42");

        let url = d.build_url("user/address", &params, &state).unwrap();
        assert_eq!(url.query(), Some("userID=42&t=secret"));
    }

    #[test]
    fn test_token_sent_even_with_unresolved_placeholder() {
        let d = dispatcher("{}");
        let mut state = SessionState::new();
        state.set("Token", "secret");

        let url = d
            .build_url("list/:ListId", &QueryParams::new(), &state)
            .unwrap();
        assert_eq!(url.path(), "/api/list/:ListId");
        assert_eq!(url.query(), Some("t=secret"));
    }

    #[test]
    fn test_encoded_segment_survives_url_building() {
        let d = dispatcher("{}");
        let mut state = SessionState::new();
        state.set("Token", "secret");
        state.set("ListId", "a?b=1");

        let resolved = crate::runner::resolver::resolve("list/:ListId", &state, &["ListId"]);
        let url = d.build_url(&resolved.path, &QueryParams::new(), &state).unwrap();
        assert_eq!(url.path(), "/api/list/a%3Fb=1");
        assert_eq!(url.query(), Some("t=secret"));
    }

    #[test]
    fn test_dispatch_parses_json() {
        let d = dispatcher(r#"{"UserId": 42}"#);
        let response = d
            .dispatch("user/42", &QueryParams::new(), &SessionState::new())
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.json["UserId"], 42);
        assert_eq!(d.transport().requested.borrow().len(), 1);
    }

    #[test]
    fn test_dispatch_rejects_non_json() {
        let d = dispatcher("<html>gateway timeout</html>");
        let err = d
            .dispatch("user", &QueryParams::new(), &SessionState::new())
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidJson { status: 200, .. }));
    }

    #[test]
    fn test_mask_query_params() {
        let url = Url::parse("https://x.test/api/user?t=secret&userID=1").unwrap();
        assert_eq!(
            mask_query_params(&url, &["t"]),
            "https://x.test/api/user?t=***&userID=1"
        );
    }

    #[test]
    fn test_logged_login_url_hides_password() {
        let d = dispatcher("{}");
        let mut params = QueryParams::new();
        params.set("username", "jdoe");
        params.set(PASSWORD_PARAMETER, "hunter2");

        let url = d
            .build_url("authentication/login", &params, &SessionState::new())
            .unwrap();
        assert!(url.as_str().contains("hunter2"));

        let logged = d.redacted(&url);
        assert!(!logged.contains("hunter2"));
        assert_eq!(
            logged,
            "https://school.myschoolapp.com/api/authentication/login?username=jdoe&password=***"
        );
    }

    #[test]
    fn test_logged_url_hides_token() {
        let d = dispatcher("{}");
        let mut state = SessionState::new();
        state.set("Token", "secret");

        let url = d.build_url("user/42", &QueryParams::new(), &state).unwrap();
        assert_eq!(
            d.redacted(&url),
            "https://school.myschoolapp.com/api/user/42?t=***"
        );
    }
}
