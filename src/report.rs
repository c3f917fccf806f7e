// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Rendering an [`Analysis`] for people and for tools.

use core::fmt::Write;
use std::collections::BTreeMap;

use anyhow::Result;

use crate::model::{RuleField, SecurityRule};
use crate::scenario::{Analysis, Finding, Inventory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
    Html,
}

/// Render `analysis`. `inventory` is the one the analysis ran over; the
/// attribute tables and summary counts are read from it.
pub fn render(analysis: &Analysis, inventory: &Inventory, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(render_text(analysis, &inventory.rules)),
        ReportFormat::Json => render_json(analysis),
        ReportFormat::Html => Ok(render_html(analysis, inventory)),
    }
}

pub fn render_json(analysis: &Analysis) -> Result<String> {
    Ok(serde_json::to_string_pretty(analysis)?)
}

/// Plain-text report: summary, one attribute table per finding, warnings,
/// and the checks that ran.
pub fn render_text(analysis: &Analysis, rules: &[SecurityRule]) -> String {
    let by_name = index_rules(rules);
    let summary = &analysis.summary;

    // Writing into a String cannot fail.
    let mut out = String::new();
    let _ = writeln!(out, "Scenario: {}", analysis.scenario);
    let _ = writeln!(
        out,
        "Rules analyzed: {}  Shadowed: {} (high {}, medium {}, low {})  Warnings: {}",
        summary.rules, summary.shadowed, summary.high, summary.medium, summary.low, summary.warnings
    );

    for finding in &analysis.findings {
        out.push('\n');
        write_finding(&mut out, finding, &by_name);
    }

    if !analysis.warnings.is_empty() {
        let _ = writeln!(out, "\nWarnings:");
        for warning in &analysis.warnings {
            let _ = writeln!(out, "  - {}", warning);
        }
    }

    let _ = writeln!(out, "\nChecks:");
    for check in &analysis.checks {
        let _ = writeln!(out, "  - {}: {}", check, check.description());
    }
    out
}

fn index_rules(rules: &[SecurityRule]) -> BTreeMap<&str, &SecurityRule> {
    rules.iter().map(|r| (r.name.as_str(), r)).collect()
}

/// One table column: the shadowed rule first, then every predecessor.
struct Column<'a> {
    name: &'a str,
    position: usize,
    rule: Option<&'a SecurityRule>,
}

fn columns<'a>(
    finding: &'a Finding,
    rules: &BTreeMap<&str, &'a SecurityRule>,
) -> Vec<Column<'a>> {
    core::iter::once((finding.rule.as_str(), finding.position))
        .chain(
            finding
                .predecessors
                .iter()
                .map(|p| (p.rule.as_str(), p.position)),
        )
        .map(|(name, position)| Column {
            name,
            position,
            rule: rules.get(name).copied(),
        })
        .collect()
}

fn write_finding(out: &mut String, finding: &Finding, rules: &BTreeMap<&str, &SecurityRule>) {
    let _ = writeln!(
        out,
        "[{}] rule `{}` (#{}) is shadowed by {}",
        finding.severity,
        finding.rule,
        finding.position,
        finding
            .predecessors
            .iter()
            .map(|p| format!("`{}` (#{})", p.rule, p.position))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let columns = columns(finding, rules);
    let mut table: Vec<Vec<String>> = Vec::new();
    let mut header = vec!["attribute".to_string()];
    header.extend(columns.iter().map(|c| c.name.to_string()));
    table.push(header);

    let mut position = vec!["position".to_string()];
    position.extend(columns.iter().map(|c| c.position.to_string()));
    table.push(position);

    for field in RuleField::ALL {
        let mut row = vec![field.to_string()];
        row.extend(
            columns
                .iter()
                .map(|c| c.rule.map(|r| r.field(field).to_string()).unwrap_or_default()),
        );
        table.push(row);
    }

    let mut action = vec!["action".to_string()];
    action.extend(
        columns
            .iter()
            .map(|c| c.rule.map(|r| r.action.to_string()).unwrap_or_default()),
    );
    table.push(action);

    write_table(out, &table);
}

fn write_table(out: &mut String, table: &[Vec<String>]) {
    let ncols = table.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..ncols)
        .map(|c| {
            table
                .iter()
                .filter_map(|row| row.get(c))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let separator: String = widths
        .iter()
        .map(|w| "-".repeat(w + 2))
        .collect::<Vec<_>>()
        .join("+");

    for (i, row) in table.iter().enumerate() {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!(" {:<width$} ", cell, width = *w))
            .collect();
        let _ = writeln!(out, "  {}", line.join("|").trim_end());
        if i == 0 {
            let _ = writeln!(out, "  {}", separator);
        }
    }
}

// ============================================================================
// HTML
// ============================================================================

const HTML_STYLE: &str = r#"
  body {
    font-family: 'Segoe UI', system-ui, sans-serif;
    line-height: 1.5;
    margin: 0 auto;
    max-width: 1000px;
    padding: 1rem;
    color: #333333;
  }
  .report-header {
    text-align: center;
    padding: 1.2rem;
    background: linear-gradient(to right, #FF6B35, #FF9F1C);
    color: white;
  }
  .summary-grid {
    display: grid;
    grid-template-columns: repeat(3, 1fr);
    gap: 0.8rem;
  }
  .summary-card {
    padding: 0.7rem;
    border: 1px solid #eee;
    border-left: 3px solid #FF9F1C;
  }
  .summary-card h3 { margin: 0 0 0.3rem 0; font-size: 0.9rem; color: #FF6B35; }
  .summary-card p { margin: 0; font-weight: 500; }
  .finding-table { width: 100%; border-collapse: collapse; margin: 1rem 0; }
  .finding-table th { background-color: #FF6B35; color: white; padding: 0.5rem; text-align: left; }
  .finding-table td { padding: 0.5rem; border-bottom: 1px solid #eee; vertical-align: top; }
  .finding-table td:first-child { font-weight: 500; }
  .severity-high { color: #EE4B2B; }
  .severity-medium { color: #FF9F1C; }
  .check-item { margin-bottom: 1rem; padding: 0.8rem; border-left: 3px solid #FF9F1C; }
  .check-name { font-weight: 600; color: #FF6B35; }
"#;

/// Escape text for HTML element content and attribute values.
fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Self-contained HTML page: table of contents, summary cards, one
/// attribute table per finding, warnings, and the checks that ran.
pub fn render_html(analysis: &Analysis, inventory: &Inventory) -> String {
    let by_name = index_rules(&inventory.rules);
    let summary = &analysis.summary;
    let count = |len: Option<usize>| len.map_or("-".to_string(), |n| n.to_string());

    let mut out = String::new();
    let _ = write!(
        out,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Firewall Policy Analysis Report</title>
<style>{style}</style>
</head>
<body>
<div class="report-header">
<h1>Firewall Policy Analysis Report</h1>
<p>Scenario {scenario}</p>
</div>
"#,
        style = HTML_STYLE,
        scenario = html_escape(analysis.scenario.name()),
    );

    let _ = writeln!(out, "<h2>Table of Contents</h2>\n<ul class=\"toc-list\">");
    let _ = writeln!(out, "<li><a href=\"#summary\">Summary</a></li>");
    for (i, finding) in analysis.findings.iter().enumerate() {
        let _ = writeln!(
            out,
            "<li><a href=\"#finding-{n}\">Finding {n} - {rule}</a></li>",
            n = i + 1,
            rule = html_escape(&finding.rule)
        );
    }
    if !analysis.warnings.is_empty() {
        let _ = writeln!(out, "<li><a href=\"#warnings\">Warnings</a></li>");
    }
    let _ = writeln!(out, "<li><a href=\"#checks\">Checks</a></li>\n</ul>");

    let _ = writeln!(out, "<h2 id=\"summary\">Summary</h2>");
    let _ = writeln!(
        out,
        "<p class=\"scenario-doc\">{}</p>",
        html_escape(analysis.scenario.description())
    );
    let _ = writeln!(out, "<div class=\"summary-grid\">");
    let cards = [
        ("Total Policies", summary.rules.to_string()),
        (
            "Address Objects",
            count(inventory.address_objects.as_ref().map(Vec::len)),
        ),
        (
            "Address Groups",
            count(inventory.address_groups.as_ref().map(Vec::len)),
        ),
        (
            "Shadowed Rules",
            format!(
                "{} (high {}, medium {}, low {})",
                summary.shadowed, summary.high, summary.medium, summary.low
            ),
        ),
        ("Warnings", summary.warnings.to_string()),
        ("Unresolved Rules", summary.unresolved_rules.to_string()),
    ];
    for (title, value) in cards {
        let _ = writeln!(
            out,
            "<div class=\"summary-card\"><h3>{}</h3><p>{}</p></div>",
            title,
            html_escape(&value)
        );
    }
    let _ = writeln!(out, "</div>");

    for (i, finding) in analysis.findings.iter().enumerate() {
        write_html_finding(&mut out, i + 1, finding, &by_name);
    }

    if !analysis.warnings.is_empty() {
        let _ = writeln!(out, "<h2 id=\"warnings\">Warnings</h2>\n<ul>");
        for warning in &analysis.warnings {
            let _ = writeln!(out, "<li>{}</li>", html_escape(&warning.to_string()));
        }
        let _ = writeln!(out, "</ul>");
    }

    let _ = writeln!(out, "<h2 id=\"checks\">Checks</h2>\n<div class=\"checks-list\">");
    for check in &analysis.checks {
        let _ = writeln!(
            out,
            "<div class=\"check-item\"><div class=\"check-name\">{}</div><p class=\"check-doc\">{}</p></div>",
            html_escape(check.name()),
            html_escape(check.description())
        );
    }
    let _ = writeln!(out, "</div>\n</body>\n</html>");
    out
}

fn write_html_finding(
    out: &mut String,
    number: usize,
    finding: &Finding,
    rules: &BTreeMap<&str, &SecurityRule>,
) {
    let _ = writeln!(
        out,
        "<h2 class=\"finding-header\" id=\"finding-{}\">Finding {} - {} <span class=\"severity-{}\">[{}]</span></h2>",
        number,
        number,
        html_escape(&finding.rule),
        finding.severity,
        finding.severity
    );

    let columns = columns(finding, rules);
    let _ = write!(out, "<table class=\"finding-table\">\n<tr><th>Attribute</th>");
    for (i, column) in columns.iter().enumerate() {
        let role = if i == 0 {
            "Shadowed Rule".to_string()
        } else {
            format!("Preceding Rule {}", i)
        };
        let _ = write!(
            out,
            "<th>{}<br>{} (#{})</th>",
            role,
            html_escape(column.name),
            column.position
        );
    }
    let _ = writeln!(out, "</tr>");

    for field in RuleField::ALL {
        let _ = write!(out, "<tr><td>{}</td>", field);
        for column in &columns {
            let cell = column
                .rule
                .map(|r| {
                    r.field(field)
                        .iter()
                        .map(html_escape)
                        .collect::<Vec<_>>()
                        .join("<br>")
                })
                .unwrap_or_default();
            let _ = write!(out, "<td>{}</td>", cell);
        }
        let _ = writeln!(out, "</tr>");
    }

    let _ = write!(out, "<tr><td>action</td>");
    for column in &columns {
        let action = column.rule.map(|r| r.action.as_str()).unwrap_or_default();
        let _ = write!(out, "<td>{}</td>", action);
    }
    let _ = writeln!(out, "</tr>\n</table>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::NullSink;
    use crate::model::{Action, AddressGroup};
    use crate::scenario::{Scenario, ScenarioKind};

    fn analysis() -> (Analysis, Vec<SecurityRule>) {
        let rules = vec![
            SecurityRule::new("allow-all", Action::Allow),
            SecurityRule::new("block-host", Action::Deny).with_source_addresses(["10.0.0.5"]),
        ];
        let mut scenario = Scenario::new(ScenarioKind::Shadowing, Inventory::new(rules.clone()));
        let analysis = scenario.run(&mut NullSink).expect("runs");
        (analysis, rules)
    }

    #[test]
    fn html_escapes_names_and_tables_each_finding() {
        let inventory = Inventory::new(vec![
            SecurityRule::new("<allow & all>", Action::Allow),
            SecurityRule::new("block \"host\"", Action::Deny)
                .with_source_addresses(["<script>", "10.0.0.5"]),
            SecurityRule::new("deny-o'brien", Action::Deny).with_applications(["ssh"]),
        ])
        .with_address_objects(vec![])
        .with_address_groups(vec![AddressGroup::new("g", ["10.0.0.1"])]);
        let mut scenario = Scenario::new(ScenarioKind::Shadowing, inventory.clone());
        let analysis = scenario.run(&mut NullSink).expect("runs");
        assert_eq!(analysis.findings.len(), 2);

        let html = render(&analysis, &inventory, ReportFormat::Html).expect("renders");
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<allow"));
        assert!(html.contains("&lt;allow &amp; all&gt;"));
        assert!(html.contains("block &quot;host&quot;"));
        assert!(html.contains("deny-o&#39;brien"));
        assert!(html.contains("&lt;script&gt;<br>10.0.0.5"));

        assert_eq!(html.matches("<table class=\"finding-table\">").count(), 2);
        assert!(html.contains("href=\"#finding-2\""));
        assert!(html.contains("<h3>Address Groups</h3><p>1</p>"));
        assert!(html.contains("<h3>Address Objects</h3><p>0</p>"));
        assert!(html.contains("<div class=\"check-name\">services</div>"));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn text_report_lists_findings_side_by_side() {
        let (analysis, rules) = analysis();
        let text = render_text(&analysis, &rules);
        assert!(text.contains("Shadowed: 1 (high 1, medium 0, low 0)"));
        assert!(text.contains("[high] rule `block-host` (#2) is shadowed by `allow-all` (#1)"));
        let source_row = text
            .lines()
            .find(|l| l.trim_start().starts_with("source_addresses"))
            .expect("source row");
        assert!(source_row.contains("10.0.0.5"));
        assert!(source_row.contains("any"));
        assert!(text.contains("- services:"));
    }

    #[test]
    fn json_report_is_the_serialized_analysis() {
        let (analysis, _) = analysis();
        let json = render_json(&analysis).expect("serializes");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(value["scenario"], "shadowing");
        assert_eq!(value["summary"]["shadowed"], 1);
        assert_eq!(value["findings"][0]["severity"], "high");
        assert_eq!(value["findings"][0]["predecessors"][0]["rule"], "allow-all");
    }
}
