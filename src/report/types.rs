use crate::runner::state::{RunSummary, TestOutcome, TestRun};
use serde::{Deserialize, Serialize};

/// Test results for report generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResults {
    pub session_id: String,
    /// Display name of the authenticated user
    pub principal: String,
    pub api: String,
    pub outcomes: Vec<TestOutcome>,
    pub summary: RunSummary,
    pub generated_at: String,
}

impl TestResults {
    pub fn from_run(run: &TestRun, api: &str) -> Self {
        Self {
            session_id: run.session_id.clone(),
            principal: run.principal.clone(),
            api: api.to_string(),
            outcomes: run.outcomes.clone(),
            summary: run.summary(),
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}
