//! Machine-readable report output

use std::io::Write;

use anyhow::Result;

use crate::report::BuildReport;

/// Write the whole report as prettified JSON.
pub fn write_json_pretty(report: &BuildReport, mut w: impl Write) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    w.write_all(json.as_bytes())?;
    w.write_all(b"\n")?;
    Ok(())
}

/// Write one JSON object per figure (NDJSON).
pub fn write_ndjson(report: &BuildReport, mut w: impl Write) -> Result<()> {
    for figure in &report.figures {
        let line = serde_json::to_string(figure)?;
        w.write_all(line.as_bytes())?;
        w.write_all(b"\n")?;
    }
    Ok(())
}
