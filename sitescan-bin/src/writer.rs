use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use serde::Serialize;
use sitescan_lib::Verdict;

/// One CSV row per broken link
#[derive(Serialize)]
struct CsvRecord<'a> {
    url: &'a str,
    status: String,
    anchor_text: &'a str,
    source_page: &'a str,
}

/// Resolve the CSV output path; an empty path means the default
/// `broken-links-{ISO-date}.csv` in the working directory
pub(crate) fn resolve_csv_path(path: &Path) -> PathBuf {
    if path.as_os_str().is_empty() {
        PathBuf::from(format!("broken-links-{}.csv", current_date()))
    } else {
        path.to_path_buf()
    }
}

/// Current date in `YYYY-MM-DD`, taken from the RFC 3339 rendering of
/// the system clock
fn current_date() -> String {
    let now = humantime::format_rfc3339_seconds(SystemTime::now()).to_string();
    now[..10].to_string()
}

/// Write the broken-link table as CSV
pub(crate) fn write_broken_links_csv(path: &Path, broken: &[Verdict]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Cannot create CSV file `{}`", path.display()))?;
    for verdict in broken {
        wtr.serialize(CsvRecord {
            url: verdict.uri.as_str(),
            status: verdict.status.code_as_string(),
            anchor_text: &verdict.anchor_text,
            source_page: verdict.source_page.as_str(),
        })?;
    }
    wtr.flush()?;
    Ok(())
}
