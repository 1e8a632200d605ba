use super::types::TestResults;
use anyhow::Result;
use std::path::Path;

/// Generate JSON report
pub fn generate(results: &TestResults, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(results)?;

    if let Some(path) = output {
        std::fs::write(path, json)?;
        println!("JSON report saved to: {}", path.display());
    } else {
        println!("{}", json);
    }

    Ok(())
}

/// Read results previously written by [`generate`]
pub fn load(path: &Path) -> Result<TestResults> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
