//! Human and JSON rendering of check reports

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use flowcheck_analysis::{CheckReport, Diagnostic, Severity};
use flowcheck_core::CacheStatsSnapshot;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    units: &'a [CheckReport],
    stats: CacheStatsSnapshot,
}

pub fn render(format: OutputFormat, reports: &[CheckReport], stats: CacheStatsSnapshot) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(render_human(reports)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&JsonOutput { units: reports, stats })?),
    }
}

fn severity_label(severity: Severity) -> String {
    let label = severity.to_string();
    match severity {
        Severity::Error => label.red().bold().to_string(),
        Severity::Warning => label.yellow().bold().to_string(),
        Severity::Info => label.cyan().to_string(),
    }
}

fn render_diagnostic(diag: &Diagnostic) -> String {
    format!(
        "{}: {}[{}] in {}: {} (`{}`)",
        diag.unit,
        severity_label(diag.severity),
        diag.rule,
        diag.fragment,
        diag.message,
        diag.snippet
    )
}

pub fn render_human(reports: &[CheckReport]) -> String {
    let mut lines = Vec::new();
    for report in reports {
        lines.extend(report.diagnostics.iter().map(render_diagnostic));
        for skipped in &report.skipped {
            lines.push(format!(
                "{}: {} {}: {}",
                report.unit,
                "skipped".dimmed(),
                skipped.fragment,
                skipped.reason
            ));
        }
    }

    let total: usize = reports.iter().map(|r| r.diagnostics.len()).sum();
    if total == 0 {
        lines.push("No issues found".green().to_string());
    } else {
        let count = |severity: Severity| {
            reports
                .iter()
                .flat_map(|r| &r.diagnostics)
                .filter(|d| d.severity == severity)
                .count()
        };
        lines.push(String::new());
        lines.push(format!(
            "Found {} issue(s): {} error, {} warning, {} info",
            total,
            count(Severity::Error),
            count(Severity::Warning),
            count(Severity::Info)
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowcheck_analysis::SkippedFragment;
    use flowcheck_core::NodeId;

    fn report() -> CheckReport {
        CheckReport {
            unit: "Calc.java".to_string(),
            fragments_checked: 2,
            diagnostics: vec![Diagnostic {
                rule: "division-by-zero".to_string(),
                severity: Severity::Error,
                unit: "Calc.java".to_string(),
                fragment: "Calc.broken".to_string(),
                node: NodeId(3),
                snippet: "a / 0".to_string(),
                message: "division by zero".to_string(),
            }],
            skipped: vec![SkippedFragment {
                fragment: "Calc.other".to_string(),
                reason: "cannot resolve symbol `Widget`".to_string(),
            }],
        }
    }

    #[test]
    fn test_human_output() {
        colored::control::set_override(false);
        let out = render_human(&[report()]);
        assert!(out.contains("Calc.java: error[division-by-zero] in Calc.broken: division by zero (`a / 0`)"));
        assert!(out.contains("Calc.java: skipped Calc.other: cannot resolve symbol `Widget`"));
        assert!(out.ends_with("Found 1 issue(s): 1 error, 0 warning, 0 info"));
    }

    #[test]
    fn test_empty_human_output() {
        colored::control::set_override(false);
        assert_eq!(render_human(&[]), "No issues found");
    }

    #[test]
    fn test_json_output() {
        let out = render(OutputFormat::Json, &[report()], CacheStatsSnapshot::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["units"][0]["diagnostics"][0]["severity"], "error");
        assert_eq!(value["units"][0]["diagnostics"][0]["node"], 3);
        assert_eq!(value["stats"]["cfg_builds"], 0);
    }
}
