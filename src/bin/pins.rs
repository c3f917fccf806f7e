// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use policy_inspector::loader::{self, Format};
use policy_inspector::report::{self, ReportFormat};
use policy_inspector::tracing_utils::{info, init_tracing};
use policy_inspector::{AnalysisConfig, Inventory, Scenario, ScenarioKind, TracingSink};

struct Example {
    name: &'static str,
    description: &'static str,
    rules: &'static str,
    objects: &'static str,
    groups: &'static str,
}

const EXAMPLES: &[Example] = &[
    Example {
        name: "basic",
        description: "Small perimeter policy with an allow-any rule hiding later blocks.",
        rules: include_str!("../../demos/basic/policies.json"),
        objects: include_str!("../../demos/basic/address_objects.json"),
        groups: include_str!("../../demos/basic/address_groups.json"),
    },
    Example {
        name: "groups",
        description: "Nested and cyclic address groups that only value comparison sees through.",
        rules: include_str!("../../demos/groups/policies.json"),
        objects: include_str!("../../demos/groups/address_objects.json"),
        groups: include_str!("../../demos/groups/address_groups.json"),
    },
];

#[derive(clap::Args)]
struct RunOptions {
    /// Skip a check. May be repeated.
    #[arg(long = "exclude-check", short = 'x', value_name = "check")]
    exclude_checks: Vec<String>,

    /// Analysis settings. json or yaml.
    #[arg(long, short, value_name = "config.json|config.yaml")]
    config: Option<PathBuf>,

    /// Report format. `html` writes a self-contained page.
    #[arg(long, short, value_enum, default_value = "text")]
    format: ReportFormat,
}

#[derive(clap::Subcommand)]
enum RunTarget {
    /// Compare rules by object and group names.
    Shadowing {
        /// Security rules. json or yaml.
        rules: PathBuf,

        #[command(flatten)]
        options: RunOptions,
    },

    /// Compare rules by resolved address values.
    ShadowingByValue {
        /// Security rules. json or yaml.
        rules: PathBuf,
        /// Address objects. json or yaml.
        objects: PathBuf,
        /// Address groups. json or yaml.
        groups: PathBuf,

        #[command(flatten)]
        options: RunOptions,
    },

    /// Run a bundled example rule-base.
    Example {
        /// Example name. See `pins list`.
        name: String,

        /// Scenario to run against the example.
        #[arg(long, short, default_value = "shadowing-by-value")]
        scenario: String,

        #[command(flatten)]
        options: RunOptions,
    },
}

#[derive(clap::Subcommand)]
enum PinsCommand {
    /// List scenarios, their checks, and the bundled examples.
    List,

    /// Run a scenario.
    Run {
        #[command(subcommand)]
        target: RunTarget,
    },
}

#[derive(clap::Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log debug output. `RUST_LOG` takes precedence.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: PinsCommand,
}

fn list() -> Result<()> {
    println!("Scenarios:");
    for kind in Scenario::available() {
        println!("  {} - {}", kind, kind.description());
        for check in kind.checks() {
            println!("      {:<28} {}", check.name(), check.description());
        }
    }
    println!("\nExamples:");
    for example in EXAMPLES {
        println!("  {:<10} {}", example.name, example.description);
    }
    Ok(())
}

fn run(kind: ScenarioKind, inventory: Inventory, options: RunOptions) -> Result<()> {
    let config = match &options.config {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    }
    .with_excluded_checks(options.exclude_checks);

    let mut scenario = Scenario::new(kind, inventory).with_config(config)?;
    info!("running {} over {} rules", kind, scenario.inventory().rules.len());
    let analysis = scenario.run(&mut TracingSink)?;

    print!("{}", report::render(&analysis, scenario.inventory(), options.format)?);
    Ok(())
}

fn run_example(name: &str, scenario: &str, options: RunOptions) -> Result<()> {
    let example = EXAMPLES
        .iter()
        .find(|e| e.name == name)
        .ok_or_else(|| anyhow!("no bundled example named `{}`", name))?;
    let kind = ScenarioKind::from_name(scenario)
        .ok_or_else(|| anyhow!("unknown scenario `{}`", scenario))?;

    let inventory = Inventory::new(
        loader::parse_entries(example.rules, Format::Json).context("example rules")?,
    )
    .with_address_objects(
        loader::parse_entries(example.objects, Format::Json).context("example objects")?,
    )
    .with_address_groups(
        loader::parse_entries(example.groups, Format::Json).context("example groups")?,
    );
    run(kind, inventory, options)
}

fn main() -> Result<()> {
    use clap::Parser;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        PinsCommand::List => list(),
        PinsCommand::Run { target } => match target {
            RunTarget::Shadowing { rules, options } => {
                let inventory = loader::load_inventory(rules, None, None)?;
                run(ScenarioKind::Shadowing, inventory, options)
            }
            RunTarget::ShadowingByValue {
                rules,
                objects,
                groups,
                options,
            } => {
                let inventory = loader::load_inventory(rules, Some(objects), Some(groups))?;
                run(ScenarioKind::ShadowingByValue, inventory, options)
            }
            RunTarget::Example {
                name,
                scenario,
                options,
            } => run_example(&name, &scenario, options),
        },
    }
}
