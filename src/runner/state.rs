use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Classified result of one endpoint test
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Skipped,
    Success,
    Unauthorized,
    Error,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Skipped => "skipped",
            OutcomeStatus::Success => "success",
            OutcomeStatus::Unauthorized => "unauthorized",
            OutcomeStatus::Error => "error",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one endpoint, labeled by its unresolved path pattern
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestOutcome {
    pub index: usize,
    pub label: String,
    pub status: OutcomeStatus,
    pub detail: String,
    /// HTTP status, when a response arrived
    pub http_status: Option<u16>,
    pub duration_ms: Option<u64>,
}

impl TestOutcome {
    pub fn skipped(index: usize, label: &str, missing: &[String]) -> Self {
        Self {
            index,
            label: label.to_string(),
            status: OutcomeStatus::Skipped,
            detail: format!(
                "No request made because required information is missing: {}",
                missing.join(", ")
            ),
            http_status: None,
            duration_ms: None,
        }
    }

    pub fn error(index: usize, label: &str, message: String, duration_ms: u64) -> Self {
        Self {
            index,
            label: label.to_string(),
            status: OutcomeStatus::Error,
            detail: message,
            http_status: None,
            duration_ms: Some(duration_ms),
        }
    }
}

/// Ordered outcomes of one authenticated run
#[derive(Debug, Clone)]
pub struct TestRun {
    pub session_id: String,
    pub principal: String,
    pub outcomes: Vec<TestOutcome>,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
}

impl TestRun {
    pub fn new(session_id: &str, principal: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            principal: principal.to_string(),
            outcomes: Vec::new(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
    }

    pub fn record(&mut self, outcome: TestOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Instant::now());
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            session_id: self.session_id.clone(),
            total: self.outcomes.len() as u32,
            ..RunSummary::default()
        };

        for outcome in &self.outcomes {
            match outcome.status {
                OutcomeStatus::Success => summary.success += 1,
                OutcomeStatus::Skipped => summary.skipped += 1,
                OutcomeStatus::Unauthorized => summary.unauthorized += 1,
                OutcomeStatus::Error => summary.error += 1,
            }
        }

        summary.total_duration_ms = self.started_at.map(|start| {
            self.finished_at
                .unwrap_or_else(Instant::now)
                .duration_since(start)
                .as_millis() as u64
        });

        summary
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub session_id: String,
    pub total: u32,
    pub success: u32,
    pub skipped: u32,
    pub unauthorized: u32,
    pub error: u32,
    pub total_duration_ms: Option<u64>,
}
