// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The bundled demo inventories, loaded from disk the way `pins` reads
//! user files.

use anyhow::Result;
use policy_inspector::loader::load_inventory;
use policy_inspector::report::{render_text, ReportFormat};
use policy_inspector::*;

fn run(dir: &str, kind: ScenarioKind) -> Result<(Analysis, Inventory)> {
    let inventory = load_inventory(
        format!("demos/{dir}/policies.json"),
        Some(format!("demos/{dir}/address_objects.json")),
        Some(format!("demos/{dir}/address_groups.json")),
    )?;
    let mut scenario = Scenario::new(kind, inventory.clone());
    Ok((scenario.run(&mut NullSink)?, inventory))
}

fn shadowed(analysis: &Analysis) -> Vec<(&str, Severity)> {
    analysis
        .findings
        .iter()
        .map(|f| (f.rule.as_str(), f.severity))
        .collect()
}

#[test]
fn basic_by_name() -> Result<()> {
    let (analysis, _) = run("basic", ScenarioKind::Shadowing)?;
    assert_eq!(
        shadowed(&analysis),
        [
            ("allow-dns-legacy", Severity::Low),
            ("allow-updates", Severity::Medium)
        ]
    );
    assert!(analysis.warnings.is_empty());
    Ok(())
}

#[test]
fn basic_by_value() -> Result<()> {
    let (analysis, inventory) = run("basic", ScenarioKind::ShadowingByValue)?;
    assert_eq!(
        shadowed(&analysis),
        [
            ("block-partner-web", Severity::High),
            ("allow-dns-legacy", Severity::Low),
            ("allow-updates", Severity::Medium)
        ]
    );
    assert_eq!(analysis.summary.rules, 6);
    assert_eq!(analysis.summary.shadowed, 3);

    let text = render_text(&analysis, &inventory.rules);
    assert!(text.contains("rule `block-partner-web` (#2) is shadowed by `allow-dmz-web` (#1)"));

    let json = report::render(&analysis, &inventory, ReportFormat::Json)?;
    assert!(json.contains("\"block-partner-web\""));

    let html = report::render(&analysis, &inventory, ReportFormat::Html)?;
    assert_eq!(html.matches("<table class=\"finding-table\">").count(), 3);
    assert!(html.contains("Finding 1 - block-partner-web"));
    Ok(())
}

#[test]
fn groups_by_value() -> Result<()> {
    let (analysis, _) = run("groups", ScenarioKind::ShadowingByValue)?;
    assert_eq!(
        shadowed(&analysis),
        [("deny-g2", Severity::High), ("allow-nested", Severity::Low)]
    );

    let warned: Vec<&str> = analysis.warnings.iter().map(|w| w.rule.as_str()).collect();
    assert_eq!(warned, ["deny-loop", "deny-tagged", "deny-legacy"]);
    assert_eq!(analysis.summary.unresolved_rules, 3);
    Ok(())
}

#[test]
fn groups_by_name_sees_nothing() -> Result<()> {
    let (analysis, _) = run("groups", ScenarioKind::Shadowing)?;
    assert!(analysis.findings.is_empty());
    assert!(analysis.warnings.is_empty());
    Ok(())
}
