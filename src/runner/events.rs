use super::state::{OutcomeStatus, RunSummary};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

/// Test execution events for real-time updates
#[derive(Debug, Clone)]
pub enum TestEvent {
    // Session events
    SessionStarted {
        session_id: String,
        api: String,
        endpoint_count: usize,
    },
    Authenticated {
        principal: String,
    },
    SessionFinished {
        summary: RunSummary,
    },

    // Endpoint events
    GroupStarted {
        name: String,
    },
    EndpointStarted {
        index: usize,
        label: String,
    },
    EndpointFinished {
        index: usize,
        label: String,
        status: OutcomeStatus,
        detail: String,
        duration_ms: Option<u64>,
    },

    Log {
        message: String,
    },
}

/// Event emitter for broadcasting test events
pub struct EventEmitter {
    sender: Option<Sender<TestEvent>>,
}

impl EventEmitter {
    pub fn new() -> (Self, Receiver<TestEvent>) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// An emitter nobody listens to
    pub fn silent() -> Self {
        Self { sender: None }
    }

    pub fn emit(&self, event: TestEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::silent()
    }
}

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration as StdDuration;

/// Console event listener for printing real-time updates
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    /// Print events on a background thread until every sender is dropped
    pub fn spawn(receiver: Receiver<TestEvent>) -> JoinHandle<()> {
        std::thread::spawn(move || Self::listen(receiver))
    }

    pub fn listen(receiver: Receiver<TestEvent>) {
        use colored::Colorize;
        use std::io::IsTerminal;

        let interactive = std::io::stdout().is_terminal();
        let mut spinner: Option<ProgressBar> = None;

        while let Ok(event) = receiver.recv() {
            match event {
                TestEvent::SessionStarted {
                    session_id,
                    api,
                    endpoint_count,
                } => {
                    println!(
                        "\n{} Test session started: {}",
                        "▶".green().bold(),
                        session_id.cyan()
                    );
                    println!("  API: {}", api.cyan());
                    println!("  Endpoints: {}", endpoint_count);
                }

                TestEvent::Authenticated { principal } => {
                    println!("  {} Authenticated as {}", "🔑".to_string().blue(), principal.bold());
                }

                TestEvent::GroupStarted { name } => {
                    println!("\n  {} {}", "→".blue(), name.white().bold());
                }

                TestEvent::EndpointStarted { index, label } => {
                    let pb = if interactive {
                        ProgressBar::new_spinner()
                    } else {
                        ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden())
                    };
                    if let Ok(style) = ProgressStyle::default_spinner()
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .template("    {spinner} {msg}")
                    {
                        pb.set_style(style);
                    }
                    pb.set_message(format!("[{}] {}... ", index, label.dimmed()));
                    pb.enable_steady_tick(StdDuration::from_millis(100));
                    spinner = Some(pb);
                }

                TestEvent::EndpointFinished {
                    index,
                    label,
                    status,
                    detail,
                    duration_ms,
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }

                    let symbol = match status {
                        OutcomeStatus::Success => "✓".green(),
                        OutcomeStatus::Skipped => "○".yellow(),
                        OutcomeStatus::Unauthorized => "⊘".magenta(),
                        OutcomeStatus::Error => "✗".red(),
                    };
                    let timing = duration_ms
                        .map(|d| format!(" ({}ms)", d))
                        .unwrap_or_default();

                    match status {
                        OutcomeStatus::Success => {
                            println!("    {} [{}] {}{}", symbol, index, label, timing.dimmed())
                        }
                        _ => println!(
                            "    {} [{}] {}{} {}",
                            symbol,
                            index,
                            label,
                            timing.dimmed(),
                            first_line(&detail).dimmed()
                        ),
                    }
                }

                TestEvent::SessionFinished { summary } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("\n{} Test session finished", "■".blue().bold());
                    println!("  Total endpoints: {}", summary.total);
                    println!(
                        "  {} success, {} skipped, {} unauthorized, {} error",
                        summary.success.to_string().green(),
                        summary.skipped.to_string().yellow(),
                        summary.unauthorized.to_string().magenta(),
                        summary.error.to_string().red()
                    );
                    if let Some(duration) = summary.total_duration_ms {
                        println!("  Duration: {}ms", duration);
                    }
                }

                TestEvent::Log { message } => match &spinner {
                    Some(pb) => pb.println(format!("      {}", message)),
                    None => println!("      {}", message),
                },
            }
        }
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}
