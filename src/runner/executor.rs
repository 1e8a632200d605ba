use std::time::Instant;
use uuid::Uuid;

use super::classifier::{aggregate, classify};
use super::context::SessionState;
use super::dispatcher::{Dispatcher, QueryParams, Transport, PASSWORD_PARAMETER};
use super::events::{EventEmitter, TestEvent};
use super::gate::{evaluate, GateDecision};
use super::state::{TestOutcome, TestRun};
use crate::parser::types::{CollectField, EndpointCatalog, EndpointDescriptor};

/// Login credentials, sent as `username` / `password` query parameters
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl Credentials {
    /// Both parts must be present and non-empty
    pub fn from_parts(username: Option<String>, password: Option<String>) -> Option<Self> {
        match (username, password) {
            (Some(u), Some(p)) if !u.trim().is_empty() && !p.is_empty() => Some(Self {
                username: u.trim().to_string(),
                password: p,
            }),
            _ => None,
        }
    }

    fn to_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        params.set("username", &self.username);
        params.set(PASSWORD_PARAMETER, &self.password);
        params
    }
}

/// Runs endpoint descriptors in order against a session.
///
/// The runner holds no session data itself; every call takes the
/// [`SessionState`] it should read and update.
pub struct TestExecutor<T: Transport> {
    dispatcher: Dispatcher<T>,
    emitter: EventEmitter,
}

impl<T: Transport> TestExecutor<T> {
    pub fn new(dispatcher: Dispatcher<T>, emitter: EventEmitter) -> Self {
        Self {
            dispatcher,
            emitter,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<T> {
        &self.dispatcher
    }

    /// Authenticate and run every endpoint of `catalog` on a fresh session
    pub fn run_session(&self, catalog: &EndpointCatalog, credentials: &Credentials) -> TestRun {
        let mut run = TestRun::new(&Uuid::new_v4().to_string(), &credentials.username);
        let mut state = SessionState::new();

        self.emitter.emit(TestEvent::SessionStarted {
            session_id: run.session_id.clone(),
            api: self.dispatcher.base_url().to_string(),
            endpoint_count: catalog.endpoints.len() + 1,
        });
        log::info!(
            "starting run {} against {} ({} endpoints)",
            run.session_id,
            self.dispatcher.base_url(),
            catalog.endpoints.len()
        );
        run.start();

        run.record(self.authenticate(&catalog.login, credentials, &mut state));
        if state.is_authenticated() {
            self.emitter.emit(TestEvent::Authenticated {
                principal: credentials.username.clone(),
            });
        } else {
            log::warn!("login did not return a token; dependent endpoints will be skipped");
        }

        for outcome in self.run_sequence(&catalog.endpoints, &mut state, 1) {
            run.record(outcome);
        }

        run.finish();
        let summary = run.summary();
        log::info!(
            "finished run {}: {} success, {} skipped, {} unauthorized, {} error",
            run.session_id,
            summary.success,
            summary.skipped,
            summary.unauthorized,
            summary.error
        );
        self.emitter.emit(TestEvent::SessionFinished { summary });
        run
    }

    /// Call the login endpoint unconditionally, capturing `Token` and `UserId`
    pub fn authenticate(
        &self,
        login: &EndpointDescriptor,
        credentials: &Credentials,
        state: &mut SessionState,
    ) -> TestOutcome {
        self.emit_started(0, login.label());
        let outcome = self.request(
            0,
            login.label(),
            &login.path_pattern,
            &credentials.to_params(),
            &login.collect,
            state,
        );
        self.emit_finished(&outcome);
        outcome
    }

    /// Evaluate `descriptors` in declaration order; indices start at `first_index`
    pub fn run_sequence(
        &self,
        descriptors: &[EndpointDescriptor],
        state: &mut SessionState,
        first_index: usize,
    ) -> Vec<TestOutcome> {
        let mut outcomes = Vec::with_capacity(descriptors.len());
        let mut current_group: Option<&str> = None;

        for (offset, descriptor) in descriptors.iter().enumerate() {
            if let Some(name) = descriptor.name.as_deref() {
                if current_group != Some(name) {
                    self.emitter.emit(TestEvent::GroupStarted {
                        name: name.to_string(),
                    });
                    current_group = Some(name);
                }
            }
            outcomes.push(self.execute(first_index + offset, descriptor, state));
        }

        outcomes
    }

    /// Gate, resolve, dispatch and classify a single descriptor
    pub fn execute(
        &self,
        index: usize,
        descriptor: &EndpointDescriptor,
        state: &mut SessionState,
    ) -> TestOutcome {
        self.emit_started(index, descriptor.label());

        let outcome = match evaluate(descriptor, state) {
            GateDecision::Skip { missing } => {
                log::debug!("{}: skipped, missing {:?}", descriptor.label(), missing);
                TestOutcome::skipped(index, descriptor.label(), &missing)
            }
            GateDecision::Dispatch { path, params } => self.request(
                index,
                &path.pattern,
                &path.path,
                &params,
                &descriptor.collect,
                state,
            ),
        };

        self.emit_finished(&outcome);
        outcome
    }

    fn request(
        &self,
        index: usize,
        label: &str,
        path: &str,
        params: &QueryParams,
        collect: &[CollectField],
        state: &mut SessionState,
    ) -> TestOutcome {
        let started = Instant::now();
        let result = self.dispatcher.dispatch(path, params, state);
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(response) => {
                let stored = aggregate(&response.json, collect, state);
                if !stored.is_empty() {
                    log::debug!("{}: captured {}", label, stored.join(", "));
                    self.emitter.emit(TestEvent::Log {
                        message: format!("captured {}", stored.join(", ")),
                    });
                }
                let classification = classify(&response);
                TestOutcome {
                    index,
                    label: label.to_string(),
                    status: classification.status,
                    detail: classification.detail,
                    http_status: Some(response.status),
                    duration_ms: Some(duration_ms),
                }
            }
            Err(e) => {
                log::warn!("{}: {}", label, e);
                TestOutcome::error(index, label, e.to_string(), duration_ms)
            }
        }
    }

    fn emit_started(&self, index: usize, label: &str) {
        self.emitter.emit(TestEvent::EndpointStarted {
            index,
            label: label.to_string(),
        });
    }

    fn emit_finished(&self, outcome: &TestOutcome) {
        self.emitter.emit(TestEvent::EndpointFinished {
            index: outcome.index,
            label: outcome.label.clone(),
            status: outcome.status,
            detail: outcome.detail.clone(),
            duration_ms: outcome.duration_ms,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::dispatcher::{RawResponse, TransportError};
    use crate::runner::state::OutcomeStatus;
    use reqwest::Url;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Answers by URL path; records every requested URL
    #[derive(Default)]
    struct ScriptedTransport {
        routes: HashMap<String, (u16, String)>,
        requested: RefCell<Vec<Url>>,
    }

    impl ScriptedTransport {
        fn route(mut self, path: &str, status: u16, body: &str) -> Self {
            self.routes
                .insert(format!("/api/{}", path), (status, body.to_string()));
            self
        }
    }

    impl Transport for ScriptedTransport {
        fn get(&self, url: &Url) -> Result<RawResponse, TransportError> {
            self.requested.borrow_mut().push(url.clone());
            match self.routes.get(url.path()) {
                Some((status, body)) => Ok(RawResponse {
                    status: *status,
                    body: body.clone(),
                }),
                None => Err(TransportError::Request("connection refused".to_string())),
            }
        }
    }

    fn executor(transport: ScriptedTransport) -> TestExecutor<ScriptedTransport> {
        TestExecutor::new(
            Dispatcher::new("https://school.test/api", "t", transport),
            EventEmitter::silent(),
        )
    }

    fn credentials() -> Credentials {
        Credentials::from_parts(Some("jdoe".to_string()), Some("pw".to_string())).unwrap()
    }

    #[test]
    fn test_credentials_require_both_parts() {
        assert!(Credentials::from_parts(None, Some("pw".to_string())).is_none());
        assert!(Credentials::from_parts(Some(" ".to_string()), Some("pw".to_string())).is_none());
        assert!(Credentials::from_parts(Some("jdoe".to_string()), Some(String::new())).is_none());
    }

    #[test]
    fn test_authenticate_seeds_token_and_user() {
        let exec = executor(ScriptedTransport::default().route(
            "authentication/login",
            200,
            r#"{"Token": "abc", "UserId": 42}"#,
        ));
        let mut state = SessionState::new();
        let login = EndpointDescriptor::login("authentication/login").unwrap();

        let outcome = exec.authenticate(&login, &credentials(), &mut state);
        assert_eq!(outcome.status, OutcomeStatus::Success);
        assert_eq!(outcome.label, "authentication/login");
        assert_eq!(state.get("Token").unwrap().to_string(), "abc");
        assert_eq!(state.get("UserId").unwrap().to_string(), "42");

        let requested = exec.dispatcher().transport().requested.borrow();
        assert_eq!(requested[0].query(), Some("username=jdoe&password=pw"));
    }

    #[test]
    fn test_skipped_endpoint_makes_no_request() {
        let exec = executor(ScriptedTransport::default());
        let mut state = SessionState::new();
        let d = EndpointDescriptor::builder("user/address")
            .require_as("UserId", "userID")
            .require_as("AddressTypeId", "type")
            .build()
            .unwrap();

        let outcome = exec.execute(5, &d, &mut state);
        assert_eq!(outcome.status, OutcomeStatus::Skipped);
        assert_eq!(outcome.index, 5);
        assert!(outcome.detail.ends_with("UserId, AddressTypeId"));
        assert!(exec.dispatcher().transport().requested.borrow().is_empty());
    }

    #[test]
    fn test_transport_failure_is_contained() {
        let exec = executor(
            ScriptedTransport::default().route("academics/department", 200, r#"[]"#),
        );
        let mut state = SessionState::new();
        let descriptors = vec![
            EndpointDescriptor::builder("academics/course").build().unwrap(),
            EndpointDescriptor::builder("academics/department").build().unwrap(),
        ];

        let outcomes = exec.run_sequence(&descriptors, &mut state, 1);
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].status, OutcomeStatus::Error);
        assert!(outcomes[0].detail.contains("connection refused"));
        assert_eq!(outcomes[1].status, OutcomeStatus::Success);
        assert_eq!(outcomes[1].index, 2);
    }

    #[test]
    fn test_unauthorized_still_aggregates() {
        let exec = executor(ScriptedTransport::default().route(
            "role/ListAll",
            403,
            r#"{"ErrorType": "INVALID_AUTHORIZATION", "RoleId": 9}"#,
        ));
        let mut state = SessionState::new();
        let d = EndpointDescriptor::builder("role/ListAll")
            .collect("RoleId")
            .build()
            .unwrap();

        let outcome = exec.execute(1, &d, &mut state);
        assert_eq!(outcome.status, OutcomeStatus::Unauthorized);
        assert_eq!(outcome.http_status, Some(403));
        assert!(state.has("RoleId"));
    }

    #[test]
    fn test_captured_fields_are_reported_as_log_events() {
        let (emitter, receiver) = EventEmitter::new();
        let exec = TestExecutor::new(
            Dispatcher::new(
                "https://school.test/api",
                "t",
                ScriptedTransport::default().route(
                    "athletics/team",
                    200,
                    r#"[{"Id": 7, "Name": "Varsity"}]"#,
                ),
            ),
            emitter,
        );
        let mut state = SessionState::new();
        let d = EndpointDescriptor::builder("athletics/team")
            .collect_as("Id", "TeamId")
            .collect("Missing")
            .build()
            .unwrap();

        exec.execute(1, &d, &mut state);
        drop(exec);

        let logs: Vec<String> = receiver
            .iter()
            .filter_map(|e| match e {
                TestEvent::Log { message } => Some(message),
                _ => None,
            })
            .collect();
        assert_eq!(logs, vec!["captured TeamId".to_string()]);
    }

    #[test]
    fn test_nothing_captured_emits_no_log() {
        let (emitter, receiver) = EventEmitter::new();
        let exec = TestExecutor::new(
            Dispatcher::new(
                "https://school.test/api",
                "t",
                ScriptedTransport::default().route("academics/course", 200, r#"[]"#),
            ),
            emitter,
        );
        let mut state = SessionState::new();
        let d = EndpointDescriptor::builder("academics/course")
            .collect("CourseId")
            .build()
            .unwrap();

        exec.execute(1, &d, &mut state);
        drop(exec);

        assert!(!receiver
            .iter()
            .any(|e| matches!(e, TestEvent::Log { .. })));
    }

    #[test]
    fn test_run_session_records_login_first() {
        let exec = executor(
            ScriptedTransport::default()
                .route("authentication/login", 200, r#"{"Token": "abc", "UserId": 42}"#)
                .route("user/42", 200, r#"{"FirstName": "Jane"}"#),
        );
        let catalog = EndpointCatalog::new(
            "test",
            vec![
                EndpointDescriptor::builder("user/:UserId")
                    .require("UserId")
                    .build()
                    .unwrap(),
                EndpointDescriptor::builder("list/:ListId")
                    .require("ListId")
                    .build()
                    .unwrap(),
            ],
        )
        .unwrap();

        let run = exec.run_session(&catalog, &credentials());
        let labels: Vec<&str> = run.outcomes.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["authentication/login", "user/:UserId", "list/:ListId"]
        );
        assert_eq!(run.principal, "jdoe");
        assert_eq!(run.outcomes[1].status, OutcomeStatus::Success);
        assert_eq!(run.outcomes[2].status, OutcomeStatus::Skipped);

        let requested = exec.dispatcher().transport().requested.borrow();
        assert_eq!(requested.len(), 2);
        assert_eq!(requested[1].path(), "/api/user/42");
        assert_eq!(requested[1].query(), Some("t=abc"));
    }
}
