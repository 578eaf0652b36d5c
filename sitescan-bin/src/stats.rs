use std::fmt::{self, Display};

use console::style;
use pad::{Alignment, PadStr};
use sitescan_lib::{PageStatus, ScanPhase, ScanState, Verdict};

// Maximum padding for each entry in the final statistics output
const MAX_PADDING: usize = 20;

pub(crate) fn color_verdict(verdict: &Verdict) -> String {
    style(verdict).red().bright().to_string()
}

/// Human-readable rendering of a finished scan
pub(crate) struct ScanSummary {
    state: ScanState,
}

impl ScanSummary {
    pub(crate) const fn new(state: ScanState) -> Self {
        Self { state }
    }

    pub(crate) const fn state(&self) -> &ScanState {
        &self.state
    }

    pub(crate) fn healthy(&self) -> usize {
        self.state
            .checked_links
            .saturating_sub(self.broken_targets())
    }

    /// Unique broken targets; the verdict list holds one entry per
    /// referencing page
    fn broken_targets(&self) -> usize {
        let mut targets: Vec<_> = self.state.broken.iter().map(|v| &v.uri).collect();
        targets.sort();
        targets.dedup();
        targets.len()
    }

    fn failed_pages(&self) -> usize {
        self.state
            .pages
            .iter()
            .filter(|page| page.status == PageStatus::Error)
            .count()
    }
}

fn write_stat(f: &mut fmt::Formatter, title: &str, stat: usize) -> fmt::Result {
    let fill = title.chars().count();
    f.write_str(title)?;
    f.write_str(
        &stat
            .to_string()
            .pad(MAX_PADDING - fill, '.', Alignment::Right, false),
    )?;
    f.write_str("\n")
}

impl Display for ScanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = &self.state;
        let separator = "-".repeat(MAX_PADDING + 1);

        writeln!(f, "📝 Summary")?;
        writeln!(f, "{separator}")?;
        write_stat(f, "📄 Pages", state.pages_scanned)?;
        write_stat(f, "🔍 Links", state.checked_links)?;
        write_stat(f, "✅ Healthy", self.healthy())?;
        write_stat(f, "🚫 Broken", state.broken.len())?;
        if self.failed_pages() > 0 {
            write_stat(f, "⚠️ Failed pages", self.failed_pages())?;
        }

        if state.phase == ScanPhase::Cancelled {
            writeln!(f, "\nScan cancelled; partial results shown")?;
        }

        if state.broken.is_empty() {
            if state.phase == ScanPhase::Completed {
                writeln!(f, "\n✨ All links are healthy")?;
            }
            return Ok(());
        }

        for page in &state.pages {
            if page.broken_count == 0 {
                continue;
            }
            writeln!(f, "\nBroken links on {}", page.url)?;
            for verdict in state.broken.iter().filter(|v| v.source_page == page.url) {
                writeln!(f, "{}", color_verdict(verdict))?;
            }
        }
        Ok(())
    }
}
