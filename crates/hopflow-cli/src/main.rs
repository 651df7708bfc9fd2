//! hopflow CLI: run, validate and explain step graphs from YAML files.

mod logging;

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use hopflow_core::config::EngineConfig;
use hopflow_exec::{Executor, RunResult, RunStatus};
use hopflow_planner::{explain, layout, parse_yaml_graph, validate_graph, ParsedGraph};
use hopflow_steps::StepRegistry;

#[derive(Parser)]
#[command(name = "hopflow")]
#[command(about = "Step-graph ETL engine: one thread per step copy, bounded row queues between them", long_about = None)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a graph from a YAML file
    Run {
        /// Path to the graph YAML file
        #[arg(short, long)]
        graph: PathBuf,

        /// Rows per queue (overrides file and environment)
        #[arg(long)]
        queue_capacity: Option<usize>,

        /// Multi-input poll interval in milliseconds
        #[arg(long)]
        input_poll_ms: Option<u64>,

        /// Disable schema checks between rows on the same hop
        #[arg(long)]
        no_safe_mode: bool,

        /// Stop the run after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Variable for ${NAME} substitution, as NAME=VALUE (repeatable)
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<(String, String)>,

        /// Print the run result as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Check a graph file: syntax, graph rules and step types
    Validate {
        /// Path to the graph YAML file
        #[arg(short, long)]
        graph: PathBuf,
    },

    /// Show the units and queues a run of the graph would build
    Explain {
        /// Path to the graph YAML file
        #[arg(short, long)]
        graph: PathBuf,

        /// Print the layout as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_var(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{s}'")),
    }
}

/// Command-line overrides, applied last.
#[derive(Debug, Default)]
struct Overrides {
    queue_capacity: Option<usize>,
    input_poll_ms: Option<u64>,
    no_safe_mode: bool,
    timeout_ms: Option<u64>,
    vars: Vec<(String, String)>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let outcome = match cli.command {
        Commands::Run {
            graph,
            queue_capacity,
            input_poll_ms,
            no_safe_mode,
            timeout_ms,
            vars,
            json,
        } => {
            let overrides = Overrides {
                queue_capacity,
                input_poll_ms,
                no_safe_mode,
                timeout_ms,
                vars,
            };
            run_graph(&graph, overrides, json)
        }
        Commands::Validate { graph } => validate(&graph).map(|()| {
            println!("✓ Graph is valid");
            ExitCode::SUCCESS
        }),
        Commands::Explain { graph, json } => explain_graph(&graph, json).map(|()| ExitCode::SUCCESS),
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load(path: &Path) -> Result<ParsedGraph, Box<dyn Error>> {
    let yaml_content = fs::read_to_string(path)?;
    Ok(parse_yaml_graph(&yaml_content)?)
}

/// Defaults, then environment, then the graph file, then the command line.
fn resolve_config(parsed: &ParsedGraph, overrides: Overrides) -> EngineConfig {
    let mut config = EngineConfig::from_env();
    parsed.config.apply(&mut config);
    if let Some(v) = overrides.queue_capacity {
        config.queue_capacity = v;
    }
    if let Some(v) = overrides.input_poll_ms {
        config.input_poll_ms = v;
    }
    if overrides.no_safe_mode {
        config.safe_mode = false;
    }
    if let Some(v) = overrides.timeout_ms {
        config.run_timeout_ms = Some(v);
    }
    config.variables.extend(overrides.vars);
    config
}

fn run_graph(path: &Path, overrides: Overrides, json: bool) -> Result<ExitCode, Box<dyn Error>> {
    let parsed = load(path)?;
    let config = resolve_config(&parsed, overrides);
    let registry = StepRegistry::new();

    let result = Executor::execute(&parsed.graph, &config, &registry)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(match result.status() {
        RunStatus::Completed => ExitCode::SUCCESS,
        RunStatus::Stopped => ExitCode::from(2),
        RunStatus::Failed => ExitCode::FAILURE,
    })
}

fn print_result(result: &RunResult) {
    let m = result.manifest();
    let status = match result.status() {
        RunStatus::Completed => "✓ completed",
        RunStatus::Stopped => "■ stopped",
        RunStatus::Failed => "✗ failed",
    };
    println!("{status}: graph '{}' run {}", m.graph_name, m.id);
    println!("  Duration: {}ms", m.finished_ms.saturating_sub(m.started_ms));
    println!("  Graph hash: {}", m.graph_hash.short());
    println!();
    println!(
        "  {:<24} {:>4} {:>10} {:>10} {:>8} {:>8} {:>8} {:>7}  outcome",
        "step", "copy", "read", "written", "input", "output", "rejected", "errors"
    );
    for s in result.steps() {
        let c = s.counters();
        println!(
            "  {:<24} {:>4} {:>10} {:>10} {:>8} {:>8} {:>8} {:>7}  {:?}",
            s.step(),
            s.copy(),
            c.rows_read,
            c.rows_written,
            c.rows_input,
            c.rows_output,
            c.rows_rejected,
            c.errors,
            s.outcome()
        );
        for msg in s.messages() {
            println!("      {msg}");
        }
    }
}

fn validate(path: &Path) -> Result<(), Box<dyn Error>> {
    let parsed = load(path)?;
    let report = validate_graph(&parsed.graph)?;
    let registry = StepRegistry::new();
    for step in &parsed.graph.steps {
        if !registry.contains(&step.step_type) {
            return Err(format!(
                "step '{}' has unknown type '{}' (known: {})",
                step.name,
                step.step_type,
                registry.keys().join(", ")
            )
            .into());
        }
    }
    for w in report.warnings() {
        println!("warning: {w}");
    }
    Ok(())
}

fn explain_graph(path: &Path, json: bool) -> Result<(), Box<dyn Error>> {
    let parsed = load(path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&layout(&parsed.graph)?)?);
    } else {
        print!("{}", explain(&parsed.graph)?);
    }
    Ok(())
}
