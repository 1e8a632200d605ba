pub mod html;
pub mod json;
pub mod junit;
pub mod types;

use anyhow::{Context, Result};
use std::path::Path;

/// Generate report from saved test results
pub fn generate_report(results_path: &Path, format: &str, output: Option<&Path>) -> Result<()> {
    let test_results = json::load(results_path)
        .with_context(|| format!("Failed to read results: {}", results_path.display()))?;

    match format {
        "json" => json::generate(&test_results, output),
        "html" => html::generate(&test_results, output),
        "junit" => {
            let xml = junit::generate_junit_xml(&test_results)?;
            match output {
                Some(path) => {
                    std::fs::write(path, xml)?;
                    println!("JUnit report saved to: {}", path.display());
                }
                None => println!("{}", xml),
            }
            Ok(())
        }
        _ => anyhow::bail!("Unknown format: {}", format),
    }
}

/// Write `results.json`, `report.html` and `junit.xml` into `output_dir`
pub fn write_all(results: &types::TestResults, output_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output dir: {}", output_dir.display()))?;
    json::generate(results, Some(&output_dir.join("results.json")))?;
    html::generate(results, Some(&output_dir.join("report.html")))?;
    junit::write_report(results, output_dir)?;
    Ok(())
}
