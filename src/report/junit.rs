use super::types::TestResults;
use crate::runner::state::{OutcomeStatus, TestOutcome};
use anyhow::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;
use std::path::Path;

/// Generate JUnit XML report string from TestResults
pub fn generate_junit_xml(results: &TestResults) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let summary = &results.summary;
    let seconds = (summary.total_duration_ms.unwrap_or(0) as f64 / 1000.0).to_string();

    let mut suites_start = BytesStart::new("testsuites");
    suites_start.push_attribute(("name", "on-api-tester-run"));
    suites_start.push_attribute(("tests", summary.total.to_string().as_str()));
    suites_start.push_attribute(("failures", summary.unauthorized.to_string().as_str()));
    suites_start.push_attribute(("errors", summary.error.to_string().as_str()));
    suites_start.push_attribute(("skipped", summary.skipped.to_string().as_str()));
    suites_start.push_attribute(("time", seconds.as_str()));
    writer.write_event(Event::Start(suites_start))?;

    // One suite per run: the endpoints share a session
    let mut suite_start = BytesStart::new("testsuite");
    suite_start.push_attribute(("name", results.api.as_str()));
    suite_start.push_attribute(("tests", summary.total.to_string().as_str()));
    suite_start.push_attribute(("failures", summary.unauthorized.to_string().as_str()));
    suite_start.push_attribute(("errors", summary.error.to_string().as_str()));
    suite_start.push_attribute(("skipped", summary.skipped.to_string().as_str()));
    suite_start.push_attribute(("id", results.session_id.as_str()));
    suite_start.push_attribute(("time", seconds.as_str()));
    suite_start.push_attribute(("timestamp", results.generated_at.as_str()));
    writer.write_event(Event::Start(suite_start))?;

    for outcome in &results.outcomes {
        write_test_case(&mut writer, outcome, &results.principal)?;
    }

    writer.write_event(Event::End(BytesEnd::new("testsuite")))?;
    writer.write_event(Event::End(BytesEnd::new("testsuites")))?;

    let result = writer.into_inner().into_inner();
    Ok(String::from_utf8(result)?)
}

fn write_test_case<W: std::io::Write>(
    writer: &mut Writer<W>,
    outcome: &TestOutcome,
    principal: &str,
) -> Result<()> {
    let mut case_start = BytesStart::new("testcase");
    case_start.push_attribute(("name", outcome.label.as_str()));
    case_start.push_attribute(("classname", principal));
    case_start.push_attribute((
        "time",
        (outcome.duration_ms.unwrap_or(0) as f64 / 1000.0)
            .to_string()
            .as_str(),
    ));
    writer.write_event(Event::Start(case_start))?;

    let element = match outcome.status {
        OutcomeStatus::Success => None,
        OutcomeStatus::Skipped => Some(("skipped", "MissingPrerequisite")),
        OutcomeStatus::Unauthorized => Some(("failure", "Unauthorized")),
        OutcomeStatus::Error => Some(("error", "TransportFailure")),
    };

    if let Some((tag, kind)) = element {
        let mut start = BytesStart::new(tag);
        start.push_attribute(("message", outcome.detail.as_str()));
        if tag != "skipped" {
            start.push_attribute(("type", kind));
        }
        writer.write_event(Event::Start(start))?;
        writer.write_event(Event::Text(BytesText::new(&outcome.detail)))?;
        writer.write_event(Event::End(BytesEnd::new(tag)))?;
    }

    writer.write_event(Event::End(BytesEnd::new("testcase")))?;
    Ok(())
}

/// Write report to file
pub fn write_report(results: &TestResults, output_dir: &Path) -> Result<()> {
    let xml = generate_junit_xml(results)?;
    let path = output_dir.join("junit.xml");
    std::fs::write(&path, xml)?;
    println!("    Generated JUnit report: {}", path.display());
    Ok(())
}
