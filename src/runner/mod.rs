pub mod classifier;
pub mod context;
pub mod dispatcher;
pub mod events;
pub mod executor;
pub mod gate;
pub mod resolver;
pub mod state;

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::thread::JoinHandle;
use std::time::Duration;

pub use context::SessionState;
pub use events::*;
pub use executor::{Credentials, TestExecutor};
pub use state::*;

use crate::parser::load_catalog;
use crate::report::{self, types::TestResults};
use dispatcher::{Dispatcher, ReqwestTransport};

/// Settings for one `run` invocation
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub api: String,
    pub catalog: Option<PathBuf>,
    pub credentials: Option<Credentials>,
    pub output: PathBuf,
    pub report: bool,
    /// Only run endpoints whose label contains one of these
    pub only: Vec<String>,
    pub timeout: Option<Duration>,
    pub user_agent: Option<String>,
}

/// What a run produced
#[derive(Debug)]
pub enum RunReport {
    /// No credentials were supplied; only the credential form was produced
    CredentialsRequired,
    Completed(TestResults),
}

/// Run the endpoint catalog against the API
pub fn run_tests(options: &RunOptions) -> Result<RunReport> {
    let catalog = load_catalog(options.catalog.as_deref())?.filtered(&options.only);

    let Some(credentials) = options.credentials.as_ref() else {
        show_credential_form(&catalog.name, options)?;
        return Ok(RunReport::CredentialsRequired);
    };

    let transport = ReqwestTransport::new(options.timeout, options.user_agent.as_deref())
        .context("Failed to build HTTP client")?;
    let dispatcher = Dispatcher::new(&options.api, &catalog.token_parameter, transport);

    let (emitter, receiver) = EventEmitter::new();
    let listener = ConsoleEventListener::spawn(receiver);

    let executor = TestExecutor::new(dispatcher, emitter);
    let run = executor.run_session(&catalog, credentials);
    let results = TestResults::from_run(&run, executor.dispatcher().base_url());

    // Dropping the executor closes the event channel so the listener can exit
    drop(executor);
    join_listener(listener);

    if options.report {
        println!("\n{} Writing reports...", "📊".to_string().blue());
        report::write_all(&results, &options.output)?;
    }

    Ok(RunReport::Completed(results))
}

/// Wait for the console listener; a panic there only costs console output
fn join_listener(listener: JoinHandle<()>) {
    if let Err(panic) = listener.join() {
        let reason = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        log::warn!("console listener stopped: {}", reason);
    }
}

fn show_credential_form(title: &str, options: &RunOptions) -> Result<()> {
    println!(
        "{} No credentials supplied; nothing was run.",
        "ℹ".blue()
    );
    println!(
        "  Provide {} and {} (or set {} / {}).",
        "--username".cyan(),
        "--password".cyan(),
        "ON_API_USERNAME".cyan(),
        "ON_API_PASSWORD".cyan()
    );

    if options.report {
        std::fs::create_dir_all(&options.output).with_context(|| {
            format!("Failed to create output dir: {}", options.output.display())
        })?;
        let path = options.output.join("login.html");
        let html = report::html::generate_login_form(&format!("{} Tester", title), &options.api);
        std::fs::write(&path, html)?;
        println!("  Credential form saved to: {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_listener_survives_listener_panic() {
        let listener = std::thread::spawn(|| panic!("render failed"));
        join_listener(listener);

        let listener = std::thread::spawn(|| {});
        join_listener(listener);
    }

    #[test]
    fn test_no_credentials_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let options = RunOptions {
            // Unroutable: any request would fail loudly
            api: "http://127.0.0.1:9/api".to_string(),
            catalog: None,
            credentials: None,
            output: dir.path().to_path_buf(),
            report: true,
            only: Vec::new(),
            timeout: Some(Duration::from_millis(10)),
            user_agent: None,
        };

        let report = run_tests(&options).unwrap();
        assert!(matches!(report, RunReport::CredentialsRequired));

        let form = std::fs::read_to_string(dir.path().join("login.html")).unwrap();
        assert!(form.contains("Blackbaud ON API Tester"));
        assert!(!dir.path().join("results.json").exists());
    }
}
