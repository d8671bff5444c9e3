//! Markdown summary generation
//!
//! Writes the run report as a markdown file next to the crawl, so a run can
//! be reviewed after the console output is gone.

use crate::output::report::CrawlReport;
use crate::output::OutputResult;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the markdown summary of a run to `output_path`
pub fn generate_markdown_summary(report: &CrawlReport, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(report);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run report as markdown
pub fn format_markdown_summary(report: &CrawlReport) -> String {
    let mut md = String::new();

    md.push_str("# Postgraph Crawl Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Seed**: {}\n", report.seed));
    md.push_str(&format!("- **Started**: {}\n", report.started_at));
    if let Some(finished) = &report.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished));
    }
    if let Some(duration) = report.duration_seconds() {
        md.push_str(&format!(
            "- **Duration**: {} seconds ({:.2} minutes)\n",
            duration,
            duration as f64 / 60.0
        ));
    }
    if let Some(reason) = report.stop_reason {
        md.push_str(&format!("- **Stopped**: {}\n", reason));
    }
    if let Some(hash) = &report.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    md.push_str("## Visits\n\n");
    md.push_str("| Kind | Count |\n");
    md.push_str("|------|-------|\n");
    md.push_str(&format!("| Posts | {} |\n", report.visited_documents));
    md.push_str(&format!("| Sequences | {} |\n", report.visited_collections));
    md.push_str(&format!("| Failed visits | {} |\n", report.failed_visits.len()));
    md.push_str(&format!(
        "| Failed writes | {} |\n",
        report.failed_persists.len()
    ));
    md.push_str(&format!("| Skipped links | {} |\n", report.skipped_links.len()));
    md.push_str(&format!(
        "| Left in frontier | {} |\n\n",
        report.frontier_remaining
    ));

    if !report.stitches_applied.is_empty() {
        md.push_str("## Sequence Stitches\n\n");
        for (first, second) in &report.stitches_applied {
            md.push_str(&format!("- `{}` → `{}`\n", first, second));
        }
        md.push('\n');
    }

    if !report.failed_visits.is_empty() || !report.failed_persists.is_empty() {
        md.push_str("## Failures\n\n");
        md.push_str("| Entity | Stage | Reason |\n");
        md.push_str("|--------|-------|--------|\n");
        for failure in &report.failed_visits {
            md.push_str(&format!(
                "| {} | visit | {} |\n",
                failure.key,
                escape_cell(&failure.reason)
            ));
        }
        for failure in &report.failed_persists {
            md.push_str(&format!(
                "| {} | write | {} |\n",
                failure.key,
                escape_cell(&failure.reason)
            ));
        }
        md.push('\n');
    }

    if !report.skipped_links.is_empty() {
        md.push_str("## Skipped Links\n\n");
        md.push_str("| Link | Found On | Reason |\n");
        md.push_str("|------|----------|--------|\n");
        for skipped in &report.skipped_links {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                escape_cell(&skipped.link),
                skipped.found_on,
                escape_cell(&skipped.reason)
            ));
        }
        md.push('\n');
    }

    md.push_str("---\n\n");
    md.push_str("*Generated by postgraph*\n");

    md
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKey;
    use crate::output::report::{EntityFailure, SkippedLink, StopReason};
    use tempfile::TempDir;

    fn create_test_report() -> CrawlReport {
        let mut report = CrawlReport::new(EntityKey::document("p1"));
        report.visited_documents = 12;
        report.visited_collections = 2;
        report.stop_reason = Some(StopReason::FrontierExhausted);
        report.config_hash = Some("abc123".to_string());
        report.stitches_applied.push(("s1".to_string(), "s2".to_string()));
        report.failed_visits.push(EntityFailure {
            key: EntityKey::document("p7"),
            reason: "HTTP 500 from x".to_string(),
        });
        report.skipped_links.push(SkippedLink {
            found_on: EntityKey::document("p1"),
            link: "/lw/a|b".to_string(),
            reason: "No title element".to_string(),
        });
        report
    }

    #[test]
    fn test_format_markdown_summary() {
        let md = format_markdown_summary(&create_test_report());

        assert!(md.contains("# Postgraph Crawl Summary"));
        assert!(md.contains("- **Seed**: post p1"));
        assert!(md.contains("| Posts | 12 |"));
        assert!(md.contains("| Sequences | 2 |"));
        assert!(md.contains("- **Stopped**: frontier exhausted"));
        assert!(md.contains("`s1` → `s2`"));
        assert!(md.contains("| post p7 | visit | HTTP 500 from x |"));
        assert!(md.contains("/lw/a\\|b"));
    }

    #[test]
    fn test_clean_report_has_no_failure_sections() {
        let report = CrawlReport::new(EntityKey::document("p1"));
        let md = format_markdown_summary(&report);
        assert!(!md.contains("## Failures"));
        assert!(!md.contains("## Skipped Links"));
    }

    #[test]
    fn test_generate_markdown_summary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("summary.md");

        generate_markdown_summary(&create_test_report(), &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# Postgraph Crawl Summary"));
    }
}
