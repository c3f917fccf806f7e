// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! YAML-driven scenario tests
//!
//! Each file under `tests/scenarios` lists cases: an inventory, a scenario
//! to run over it, and either the expected findings and warnings or the
//! expected configuration error.

use anyhow::{bail, Result};
use policy_inspector::*;
use serde::{Deserialize, Serialize};
use test_generator::test_resources;

#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct WantFinding {
    rule: String,
    severity: Severity,
    predecessors: Vec<String>,
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct WantWarning {
    rule: String,
    field: AddressField,
    kind: String,
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Default)]
struct Outcome {
    #[serde(default)]
    findings: Vec<WantFinding>,
    #[serde(default)]
    warnings: Vec<WantWarning>,
}

#[derive(Deserialize, Debug)]
struct TestCase {
    note: String,
    scenario: ScenarioKind,
    #[serde(default)]
    config: Option<AnalysisConfig>,
    #[serde(flatten)]
    inventory: Inventory,
    #[serde(default)]
    want: Option<Outcome>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize, Debug)]
struct YamlTest {
    cases: Vec<TestCase>,
}

fn outcome(analysis: &Analysis) -> Result<Outcome> {
    let findings = analysis
        .findings
        .iter()
        .map(|f| WantFinding {
            rule: f.rule.clone(),
            severity: f.severity,
            predecessors: f.predecessors.iter().map(|p| p.rule.clone()).collect(),
        })
        .collect();

    let mut warnings = Vec::new();
    for w in &analysis.warnings {
        let value = serde_json::to_value(&w.kind)?;
        let kind = match value.get("kind").and_then(|k| k.as_str()) {
            Some(kind) => kind.to_string(),
            None => bail!("warning `{}` serialized without a kind", w),
        };
        warnings.push(WantWarning {
            rule: w.rule.clone(),
            field: w.field,
            kind,
        });
    }

    Ok(Outcome { findings, warnings })
}

fn run_case(case: &TestCase) -> Result<Analysis, ConfigError> {
    let mut scenario = Scenario::new(case.scenario, case.inventory.clone());
    if let Some(config) = &case.config {
        scenario = scenario.with_config(config.clone())?;
    }
    let first = scenario.execute(&mut NullSink)?;

    // Executing again must not change anything.
    let mut events: Vec<DiagnosticEvent> = Vec::new();
    let second = scenario.execute(&mut events)?;
    assert_eq!(first, second, "second execution differs");

    Ok(scenario.analyze(second))
}

fn scenario_test_impl(file: &str) -> Result<()> {
    println!("\nrunning {file}");

    let yaml_str = std::fs::read_to_string(file)?;
    let test: YamlTest = serde_yaml::from_str(&yaml_str)?;

    for case in &test.cases {
        print!("\ncase {} ", case.note);

        match (run_case(case), &case.error, &case.want) {
            (Ok(analysis), None, Some(want)) => {
                let actual = outcome(&analysis)?;
                if &actual != want {
                    println!(
                        "DIFF {}",
                        prettydiff::diff_chars(
                            &serde_yaml::to_string(want)?,
                            &serde_yaml::to_string(&actual)?
                        )
                    );
                    bail!("case `{}` produced unexpected findings", case.note);
                }
            }
            (Ok(_), Some(error), _) => {
                bail!("expected error `{}` but the scenario ran", error);
            }
            (Err(e), Some(error), _) => {
                if !e.to_string().contains(error.as_str()) {
                    bail!("error `{}` does not contain expected `{}`", e, error);
                }
            }
            (Err(e), None, _) => bail!("unexpected error: {}", e),
            (Ok(_), None, None) => bail!("case `{}` has neither `want` nor `error`", case.note),
        }
        println!("passed");
    }

    println!("{} cases passed.", test.cases.len());
    Ok(())
}

fn scenario_test(file: &str) -> Result<()> {
    match scenario_test_impl(file) {
        Ok(_) => Ok(()),
        Err(e) => {
            // If Err is returned, it doesn't always get printed by cargo test.
            // Therefore, panic with the error.
            panic!("{}", e);
        }
    }
}

#[test_resources("tests/scenarios/**/*.yaml")]
fn run_scenario_tests(path: &str) {
    scenario_test(path).unwrap()
}
