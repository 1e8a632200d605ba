use super::types::TestResults;
use crate::runner::state::OutcomeStatus;
use anyhow::Result;
use std::path::Path;

const STYLE: &str = r#"
        :root {
            --bg-primary: #0a0f1d;
            --bg-secondary: #141b2d;
            --bg-tertiary: #1f2937;
            --border: #374151;
            --text-primary: #f9fafb;
            --text-secondary: #9ca3af;
            --green: #10b981;
            --red: #ef4444;
            --yellow: #f59e0b;
            --purple: #8b5cf6;
        }

        * {
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }

        body {
            font-family: 'Inter', system-ui, -apple-system, sans-serif;
            background: var(--bg-primary);
            color: var(--text-primary);
            line-height: 1.5;
            padding: 3rem 1rem;
        }

        .container {
            max-width: 1100px;
            margin: 0 auto;
        }

        header {
            margin-bottom: 2rem;
        }

        h1 {
            font-size: 2.25rem;
            font-weight: 800;
            letter-spacing: -0.025em;
        }

        .subtitle {
            color: var(--text-secondary);
            font-size: 1rem;
        }

        .summary {
            display: grid;
            grid-template-columns: repeat(5, 1fr);
            gap: 1rem;
            margin-bottom: 2rem;
        }

        .stat {
            background: var(--bg-secondary);
            border: 1px solid var(--border);
            border-radius: 0.75rem;
            padding: 1rem;
        }

        .stat-value {
            font-size: 1.75rem;
            font-weight: 700;
        }

        .stat-label {
            color: var(--text-secondary);
            font-size: 0.75rem;
            text-transform: uppercase;
        }

        .stat.success .stat-value { color: var(--green); }
        .stat.skipped .stat-value { color: var(--yellow); }
        .stat.unauthorized .stat-value { color: var(--purple); }
        .stat.error .stat-value { color: var(--red); }

        details.outcome {
            background: var(--bg-secondary);
            border: 1px solid var(--border);
            border-left-width: 4px;
            border-radius: 0.5rem;
            margin-bottom: 0.5rem;
            padding: 0.75rem 1rem;
        }

        details.outcome.success { border-left-color: var(--green); }
        details.outcome.skipped { border-left-color: var(--yellow); }
        details.outcome.unauthorized { border-left-color: var(--purple); }
        details.outcome.error { border-left-color: var(--red); }

        details.outcome summary {
            cursor: pointer;
            font-family: 'JetBrains Mono', monospace;
            display: flex;
            justify-content: space-between;
        }

        .badge {
            font-size: 0.75rem;
            font-weight: 600;
            text-transform: uppercase;
            color: var(--text-secondary);
        }

        pre {
            margin-top: 0.75rem;
            padding: 0.75rem;
            background: var(--bg-tertiary);
            border-radius: 0.5rem;
            overflow-x: auto;
            font-size: 0.8125rem;
        }

        form {
            max-width: 360px;
            display: flex;
            flex-direction: column;
            gap: 0.75rem;
        }

        input {
            padding: 0.5rem 0.75rem;
            border-radius: 0.5rem;
            border: 1px solid var(--border);
            background: var(--bg-secondary);
            color: var(--text-primary);
        }

        button {
            padding: 0.5rem 0.75rem;
            border-radius: 0.5rem;
            border: none;
            background: var(--purple);
            color: white;
            font-weight: 600;
        }

        .meta {
            margin-top: 3rem;
            padding-top: 1.5rem;
            border-top: 1px solid var(--border);
            color: var(--text-secondary);
            font-size: 0.875rem;
            display: flex;
            justify-content: center;
            gap: 2rem;
        }
"#;

/// Generate HTML report
pub fn generate(results: &TestResults, output: Option<&Path>) -> Result<()> {
    let html = generate_html(results);

    if let Some(path) = output {
        std::fs::write(path, html)?;
        println!("HTML report saved to: {}", path.display());
    } else {
        println!("{}", html);
    }

    Ok(())
}

/// Results page: one collapsible block per outcome, in run order
pub fn generate_html(results: &TestResults) -> String {
    let summary = &results.summary;

    let mut outcomes_html = String::new();
    for outcome in &results.outcomes {
        let class = outcome.status.as_str();
        let http = outcome
            .http_status
            .map(|s| format!(" · HTTP {}", s))
            .unwrap_or_default();
        let open = if outcome.status == OutcomeStatus::Success {
            ""
        } else {
            " open"
        };

        outcomes_html.push_str(&format!(
            r#"
        <details class="outcome {class}"{open}>
            <summary><span>{label}</span><span class="badge">{class}{http}</span></summary>
            <pre>{detail}</pre>
        </details>"#,
            class = class,
            open = open,
            label = html_escape(&outcome.label),
            http = http,
            detail = html_escape(&outcome.detail),
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>API Test Report - {principal}</title>
    <style>{style}</style>
</head>
<body>
    <div class="container">
        <header>
            <h1>API Test Report</h1>
            <div class="subtitle">{principal} · {api}</div>
        </header>

        <div class="summary">
            <div class="stat"><div class="stat-value">{total}</div><div class="stat-label">Endpoints</div></div>
            <div class="stat success"><div class="stat-value">{success}</div><div class="stat-label">Success</div></div>
            <div class="stat skipped"><div class="stat-value">{skipped}</div><div class="stat-label">Skipped</div></div>
            <div class="stat unauthorized"><div class="stat-value">{unauthorized}</div><div class="stat-label">Unauthorized</div></div>
            <div class="stat error"><div class="stat-value">{error}</div><div class="stat-label">Error</div></div>
        </div>
        {outcomes_html}

        <div class="meta">
            <span>Session: {session}</span>
            <span>Duration: {duration}</span>
            <span>Generated: {generated}</span>
        </div>
    </div>
</body>
</html>"#,
        principal = html_escape(&results.principal),
        api = html_escape(&results.api),
        style = STYLE,
        total = summary.total,
        success = summary.success,
        skipped = summary.skipped,
        unauthorized = summary.unauthorized,
        error = summary.error,
        outcomes_html = outcomes_html,
        session = html_escape(&results.session_id),
        duration = format_duration(summary.total_duration_ms.unwrap_or(0)),
        generated = html_escape(&results.generated_at),
    )
}

/// Credential form shown when a run has no username/password
pub fn generate_login_form(title: &str, api: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{style}</style>
</head>
<body>
    <div class="container">
        <header>
            <h1>{title}</h1>
            <div class="subtitle">{api}</div>
        </header>
        <form method="get">
            <input type="text" name="username" placeholder="Username" autocomplete="username" required>
            <input type="password" name="password" placeholder="Password" autocomplete="current-password" required>
            <button type="submit">Run tests</button>
        </form>
    </div>
</body>
</html>"#,
        title = html_escape(title),
        api = html_escape(api),
        style = STYLE,
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let minutes = ms / 60000;
        let seconds = (ms % 60000) as f64 / 1000.0;
        format!("{}m {:.0}s", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::state::{RunSummary, TestOutcome};

    #[test]
    fn test_results_page_keeps_order_and_escapes() {
        let results = TestResults {
            session_id: "s1".to_string(),
            principal: "jdoe".to_string(),
            api: "https://school.test/api".to_string(),
            outcomes: vec![
                TestOutcome {
                    index: 0,
                    label: "authentication/login".to_string(),
                    status: OutcomeStatus::Success,
                    detail: r#"{"Token": "<abc>"}"#.to_string(),
                    http_status: Some(200),
                    duration_ms: Some(12),
                },
                TestOutcome::skipped(1, "user/address", &["AddressTypeId".to_string()]),
            ],
            summary: RunSummary {
                session_id: "s1".to_string(),
                total: 2,
                success: 1,
                skipped: 1,
                ..RunSummary::default()
            },
            generated_at: "now".to_string(),
        };

        let html = generate_html(&results);
        let login = html.find("authentication/login").unwrap();
        let address = html.find("user/address").unwrap();
        assert!(login < address);
        assert!(html.contains("&lt;abc&gt;"));
        assert!(html.contains(r#"<details class="outcome skipped" open>"#));
        assert!(html.contains("HTTP 200"));
    }

    #[test]
    fn test_login_form_has_credential_fields() {
        let html = generate_login_form("Blackbaud ON API Tester", "https://school.test/api");
        assert!(html.contains(r#"name="username""#));
        assert!(html.contains(r#"name="password""#));
        assert!(!html.contains("<details"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(500), "500ms");
        assert_eq!(format_duration(1500), "1.5s");
        assert_eq!(format_duration(125000), "2m 5s");
    }
}
