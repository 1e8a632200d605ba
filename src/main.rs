use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use on_api_tester::parser::{self, EndpointCatalog};
use on_api_tester::runner::{self, Credentials, RunOptions, RunReport};
use on_api_tester::utils::config::Config;
use on_api_tester::report;

#[derive(Parser)]
#[command(name = "on-api-tester")]
#[command(author = "NL Team")]
#[command(version)]
#[command(about = "Conditional, stateful endpoint tester for the Blackbaud ON API", long_about = None)]
struct Cli {
    /// Config file (defaults to the per-user config.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate and run every endpoint in the catalog
    Run {
        /// API base URL, e.g. https://school.myschoolapp.com/api
        #[arg(long, env = "ON_API_URL")]
        api: Option<String>,

        #[arg(short, long, env = "ON_API_USERNAME")]
        username: Option<String>,

        #[arg(short, long, env = "ON_API_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Endpoint catalog YAML (built-in ON API catalog if omitted)
        #[arg(short, long)]
        catalog: Option<PathBuf>,

        /// Output directory for reports
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Generate reports (JSON, HTML, JUnit)
        #[arg(long, default_value = "false")]
        report: bool,

        /// Only run endpoints whose path contains this text (repeatable)
        #[arg(long)]
        only: Vec<String>,

        /// Per-request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Validate and list the endpoint catalog
    Catalog {
        /// Endpoint catalog YAML (built-in ON API catalog if omitted)
        #[arg(short, long)]
        catalog: Option<PathBuf>,
    },

    /// Generate report from saved test results
    Report {
        /// Path to results.json
        results: PathBuf,

        /// Output format (json, html, junit)
        #[arg(short, long, default_value = "html")]
        format: String,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            api,
            username,
            password,
            catalog,
            output,
            report,
            only,
            timeout,
        } => {
            let api = api
                .map(|a| a.trim().trim_end_matches('/').to_string())
                .or(config.api.clone())
                .ok_or_else(|| {
                    anyhow::anyhow!("No API base URL: pass --api, set ON_API_URL, or add `api` to the config file")
                })?;
            let output = output.unwrap_or_else(|| config.output_dir.clone());

            println!("{} Testing API: {}", "▶".green().bold(), api.cyan());
            if !only.is_empty() {
                println!("  Only: {}", only.join(", ").yellow());
            }
            if report {
                println!("  Reports: {}", output.display().to_string().cyan());
            }

            let options = RunOptions {
                api,
                catalog: catalog.or(config.catalog.clone()),
                credentials: Credentials::from_parts(username, password),
                output,
                report,
                only,
                timeout: timeout
                    .map(std::time::Duration::from_secs)
                    .or(config.timeout()),
                user_agent: config.user_agent.clone(),
            };

            match runner::run_tests(&options)? {
                RunReport::CredentialsRequired => {}
                RunReport::Completed(results) => {
                    println!(
                        "\n{} Finished for {}: {}/{} endpoints succeeded",
                        "✅".green(),
                        results.principal.cyan(),
                        results.summary.success,
                        results.summary.total
                    );
                }
            }
        }

        Commands::Catalog { catalog } => {
            let path = catalog.or(config.catalog.clone());
            let catalog = parser::load_catalog(path.as_deref())?;
            print_catalog(&catalog);
        }

        Commands::Report {
            results,
            format,
            output,
        } => {
            println!(
                "{} Generating {} report from: {}",
                "📊".to_string().blue(),
                format.cyan(),
                results.display()
            );
            report::generate_report(&results, &format, output.as_deref())?;
        }
    }

    Ok(())
}

fn print_catalog(catalog: &EndpointCatalog) {
    println!(
        "{} {} ({} endpoints, token parameter `{}`)",
        "📋".to_string().blue(),
        catalog.name.white().bold(),
        catalog.endpoints.len(),
        catalog.token_parameter
    );
    println!("  [0] {} {}", catalog.login.label(), "(login)".dimmed());

    for (i, endpoint) in catalog.endpoints.iter().enumerate() {
        let requires: Vec<String> = endpoint
            .required_fields
            .iter()
            .map(|r| r.to_string())
            .collect();
        let collect: Vec<String> = endpoint.collect.iter().map(|c| c.to_string()).collect();
        let params: Vec<String> = endpoint
            .static_parameters
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        let mut line = format!("  [{}] {}", i + 1, endpoint.label());
        if !requires.is_empty() {
            line.push_str(&format!(" {} {}", "requires".yellow(), requires.join(", ")));
        }
        if !collect.is_empty() {
            line.push_str(&format!(" {} {}", "collects".green(), collect.join(", ")));
        }
        if !params.is_empty() {
            line.push_str(&format!(" {} {}", "params".cyan(), params.join("&")));
        }
        println!("{}", line);
    }
}
