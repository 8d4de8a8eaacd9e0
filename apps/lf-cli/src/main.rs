mod config;
mod error;
mod models;

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use lf_core::{Table, linspace};
use lf_label::{LabelMapper, LinearLabelMapper};
use lf_model::Model;
use lf_scan::{ParameterTable, Scan};
use lf_sim::Simulator;
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::error::{CliError, CliResult};
use crate::models::Builtin;

#[derive(Parser)]
#[command(name = "labelflow")]
#[command(about = "labelflow - kinetic model simulation and label tracing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a time course, or the configured protocol
    Simulate {
        #[command(flatten)]
        common: Common,
        /// End time
        #[arg(long, default_value_t = 10.0)]
        t_end: f64,
        /// Number of intervals between 0 and the end time
        #[arg(long, default_value_t = 100)]
        steps: usize,
    },
    /// Integrate until the state stops changing
    SteadyState {
        #[command(flatten)]
        common: Common,
    },
    /// Scan the cartesian product of parameter values
    Scan {
        #[command(flatten)]
        common: Common,
        /// Values of one parameter, e.g. `k1=1,2,4`
        #[arg(long = "values", value_parser = parse_values, required = true)]
        values: Vec<(String, Vec<f64>)>,
        /// Scan time courses up to this time instead of steady states
        #[arg(long)]
        t_end: Option<f64>,
        /// Number of intervals of each time course
        #[arg(long, default_value_t = 100)]
        steps: usize,
    },
    /// Simulate the isotopomer expansion of a model
    Label {
        #[command(flatten)]
        common: Common,
        /// Initially labeled positions of a variable, e.g. `A=0,2`
        #[arg(long = "labeled", value_parser = parse_positions)]
        labeled: Vec<(String, Vec<usize>)>,
        /// Use the linear model of positional labels around the steady state
        #[arg(long)]
        linear: bool,
        #[arg(long, default_value_t = 10.0)]
        t_end: f64,
        #[arg(long, default_value_t = 100)]
        steps: usize,
    },
}

#[derive(Args)]
struct Common {
    /// Built-in model
    #[arg(long, value_enum)]
    model: Builtin,
    /// Parameter override, e.g. `k1=2.5`
    #[arg(long = "set", value_parser = parse_assignment)]
    set: Vec<(String, f64)>,
    /// YAML run configuration
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = Format::Csv)]
    format: Format,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Csv,
    Json,
}

fn parse_assignment(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let value = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid value for {name}: {e}"))?;
    Ok((name.trim().to_string(), value))
}

fn parse_values(s: &str) -> Result<(String, Vec<f64>), String> {
    let (name, values) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=V1,V2,..., got '{s}'"))?;
    let values = values
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid values for {name}: {e}"))?;
    Ok((name.trim().to_string(), values))
}

fn parse_positions(s: &str) -> Result<(String, Vec<usize>), String> {
    let (name, positions) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=P1,P2,..., got '{s}'"))?;
    let positions = positions
        .split(',')
        .filter(|p| !p.trim().is_empty())
        .map(|p| p.trim().parse::<usize>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid positions for {name}: {e}"))?;
    Ok((name.trim().to_string(), positions))
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            common,
            t_end,
            steps,
        } => cmd_simulate(&common, t_end, steps),
        Commands::SteadyState { common } => cmd_steady_state(&common),
        Commands::Scan {
            common,
            values,
            t_end,
            steps,
        } => cmd_scan(&common, values, t_end, steps),
        Commands::Label {
            common,
            labeled,
            linear,
            t_end,
            steps,
        } => cmd_label(&common, labeled, linear, t_end, steps),
    }
}

/// Model and configuration of a subcommand, overrides applied.
fn prepare(common: &Common) -> CliResult<(Model, RunConfig)> {
    let config = RunConfig::load_or_default(common.config.as_deref())?;
    let mut model = common.model.build()?;
    model.update_parameters(common.set.iter().map(|(k, v)| (k.as_str(), *v)))?;
    Ok((model, config))
}

fn simulator(model: Model, config: &RunConfig) -> CliResult<Simulator> {
    let sim = Simulator::with_integrator(model, config.integrator.build())?
        .with_initial_conditions(
            config
                .initial_conditions
                .iter()
                .map(|(k, v)| (k.as_str(), *v)),
        )?;
    Ok(sim)
}

fn time_grid(t_end: f64, steps: usize) -> Vec<f64> {
    linspace(0.0, t_end, steps.max(1) + 1)
}

/// Print a table to stdout in the requested format.
fn emit(table: &Table, format: Format) -> CliResult<()> {
    match format {
        Format::Csv => print!("{}", table.to_csv()),
        Format::Json => println!("{}", serde_json::to_string_pretty(table)?),
    }
    Ok(())
}

/// Print the recorded results, or fail if the run did not complete.
fn emit_run(sim: &Simulator, format: Format) -> CliResult<()> {
    let result = sim
        .get_result()
        .ok_or_else(|| CliError::Failed("nothing was simulated".to_string()))?;
    if let Some(reason) = result.failure() {
        return Err(CliError::Failed(reason.to_string()));
    }
    emit(result.results(), format)
}

fn cmd_simulate(common: &Common, t_end: f64, steps: usize) -> CliResult<()> {
    let (model, config) = prepare(common)?;
    let mut sim = simulator(model, &config)?;
    match &config.protocol {
        Some(protocol) => {
            info!(segments = protocol.segments().len(), "simulating protocol");
            sim.simulate_protocol(protocol, config.points_per_segment)?;
        }
        None => {
            sim.simulate(&time_grid(t_end, steps))?;
        }
    }
    emit_run(&sim, common.format)
}

fn cmd_steady_state(common: &Common) -> CliResult<()> {
    let (model, config) = prepare(common)?;
    let mut sim = simulator(model, &config)?;
    sim.simulate_to_steady_state(&config.steady_state)?;
    emit_run(&sim, common.format)
}

fn cmd_scan(
    common: &Common,
    values: Vec<(String, Vec<f64>)>,
    t_end: Option<f64>,
    steps: usize,
) -> CliResult<()> {
    let (model, config) = prepare(common)?;
    let parameters = ParameterTable::cartesian_product(values);
    let mut scan = Scan::new(move || model.clone()).with_options(config.scan_options());

    let (table, failed) = match (&config.protocol, t_end) {
        (Some(protocol), _) => {
            let result = scan.time_course_over_protocol(&parameters, protocol)?;
            let failed = result.courses().failed_runs().len();
            (result.results().clone(), failed)
        }
        (None, Some(t_end)) => {
            let result = scan.time_course(&parameters, &time_grid(t_end, steps))?;
            let failed = result.failed_runs().len();
            (result.results().clone(), failed)
        }
        (None, None) => {
            let result = scan.steady_state(&parameters)?;
            let failed = result.failed_rows().len();
            (result.results().clone(), failed)
        }
    };
    if failed > 0 {
        warn!(failed, total = parameters.n_rows(), "some scan runs failed");
    }
    emit(&table, common.format)
}

fn cmd_label(
    common: &Common,
    labeled: Vec<(String, Vec<usize>)>,
    linear: bool,
    t_end: f64,
    steps: usize,
) -> CliResult<()> {
    let (model, config) = prepare(common)?;
    let spec = common.model.label_spec().ok_or_else(|| CliError::NoLabels {
        model: common.model.name().to_string(),
    })?;

    let labeled_model = if linear {
        let (concs, fluxes) = base_steady_state(model.clone(), &config)?;
        LinearLabelMapper::new(model, spec.variables, spec.maps)?
            .build_model(&concs, &fluxes, labeled)?
    } else {
        LabelMapper::new(model, spec.variables, spec.maps)?.build_model(labeled)?
    };
    info!(
        variables = labeled_model.variables().len(),
        reactions = labeled_model.reactions().len(),
        "label model built"
    );

    let mut sim = Simulator::with_integrator(labeled_model, config.integrator.build())?;
    sim.simulate(&time_grid(t_end, steps))?;
    emit_run(&sim, common.format)
}

/// Steady-state concentrations and fluxes of the unlabeled model.
fn base_steady_state(
    model: Model,
    config: &RunConfig,
) -> CliResult<(BTreeMap<String, f64>, BTreeMap<String, f64>)> {
    let mut sim = simulator(model, config)?;
    sim.simulate_to_steady_state(&config.steady_state)?;
    let result = sim
        .into_result()
        .ok_or_else(|| CliError::Failed("no steady state recorded".to_string()))?;
    if let Some(reason) = result.failure() {
        return Err(CliError::Failed(format!("no steady state: {reason}")));
    }
    Ok((result.final_concs(), result.final_fluxes()))
}
