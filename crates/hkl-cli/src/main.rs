//! hkl CLI - diffractometer pseudo-axis calculator
//!
//! Lists the built-in diffractometers and computes pseudo-axes (`get`) or
//! axis solutions (`set`) for a session described in a TOML file.

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use hkl_kernel::{Engine, EngineList, GeometrySnapshot, Registry, SessionConfig, SolveStats};

#[derive(Parser)]
#[command(name = "hkl")]
#[command(about = "Diffractometer inverse kinematics calculator", long_about = None)]
struct Cli {
    /// Increase logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in diffractometers
    List,
    /// Show the axes, engines and modes of a diffractometer
    Info {
        /// Diffractometer name (e.g. E4CV)
        diffractometer: String,
    },
    /// Compute pseudo-axis values at the session geometry
    Get {
        /// Session file
        #[arg(short, long)]
        config: PathBuf,
        /// Only this engine (default: all)
        #[arg(short, long)]
        engine: Option<String>,
    },
    /// Solve for the axis values realizing pseudo-axis values
    Set {
        /// Session file
        #[arg(short, long)]
        config: PathBuf,
        /// Engine to drive
        #[arg(short, long)]
        engine: String,
        /// Mode of the engine (default: the session one)
        #[arg(short, long)]
        mode: Option<String>,
        /// Pseudo-axis values in user units (degrees for angles)
        #[arg(required = true, allow_negative_numbers = true)]
        values: Vec<f64>,
    },
}

#[derive(Serialize)]
struct SetOutput {
    engine: String,
    mode: String,
    stats: SolveStats,
    solutions: Vec<GeometrySnapshot>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let registry = Registry::builtin();
    match cli.command {
        Commands::List => list(&registry),
        Commands::Info { diffractometer } => show_info(&registry, &diffractometer)?,
        Commands::Get { config, engine } => {
            let mut session = load_session(&registry, &config)?;
            get(&mut session, engine.as_deref())?;
        }
        Commands::Set {
            config,
            engine,
            mode,
            values,
        } => {
            let mut session = load_session(&registry, &config)?;
            set(&mut session, &engine, mode.as_deref(), &values)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_session(registry: &Registry, path: &Path) -> Result<EngineList> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config = SessionConfig::from_toml_str(&text)
        .with_context(|| format!("invalid session {}", path.display()))?;
    let session = config.build(registry)?;
    info!(
        diffractometer = %config.diffractometer,
        sample = %config.sample.name,
        "session loaded"
    );
    Ok(session)
}

fn list(registry: &Registry) {
    for factory in registry.iter() {
        println!("{:<8} {}", factory.name(), factory.description());
    }
}

fn show_info(registry: &Registry, name: &str) -> Result<()> {
    let factory = registry.get(name)?;
    let geometry = factory.geometry()?;

    println!("{} - {}", factory.name(), factory.description());
    println!();
    println!("Axes:");
    for axis in geometry.axes() {
        let d = axis.direction();
        println!("  {:<8} [{:>6.3}, {:>6.3}, {:>6.3}]", axis.name(), d.x, d.y, d.z);
    }

    println!();
    println!("Engines:");
    for engine in factory.engines() {
        print_engine(&engine);
    }
    Ok(())
}

fn print_engine(engine: &Engine) {
    let access = if engine.is_writable() { "" } else { " (read-only)" };
    println!(
        "  {}{}: {}",
        engine.name(),
        access,
        engine.pseudo_axis_names().join(", ")
    );
    for (i, mode) in engine.modes().iter().enumerate() {
        let default = if i == 0 { " *" } else { "" };
        println!("    {}{}: [{}]", mode.name(), default, mode.axes_write().join(", "));
        for p in mode.parameters() {
            println!(
                "      {} = {} {}",
                p.name(),
                p.value_in_user_unit(),
                p.user_unit().symbol()
            );
        }
    }
}

fn get(session: &mut EngineList, engine: Option<&str>) -> Result<()> {
    let names: Vec<String> = match engine {
        Some(name) => vec![name.to_string()],
        None => session.get_all().into_iter().map(|(name, _)| name).collect(),
    };

    let mut output: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    for name in names {
        session.get(&name)?;
        let values = session
            .engine(&name)?
            .pseudo_axes()
            .iter()
            .map(|p| (p.name().to_string(), p.value_in_user_unit()))
            .collect();
        output.insert(name, values);
    }
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn set(session: &mut EngineList, engine: &str, mode: Option<&str>, values: &[f64]) -> Result<()> {
    if let Some(mode) = mode {
        session.select_mode(engine, mode)?;
    }
    if session.engine(engine)?.is_initialized() {
        info!(engine, "using the stored reference");
    } else {
        session
            .initialize(engine)
            .with_context(|| format!("engine {engine} needs an initialization"))?;
    }

    let pseudo_axes = session.engine(engine)?.pseudo_axes();
    if values.len() != pseudo_axes.len() {
        bail!(
            "engine {} expects {} values ({}), got {}",
            engine,
            pseudo_axes.len(),
            session.engine(engine)?.pseudo_axis_names().join(", "),
            values.len()
        );
    }
    let internal = pseudo_axes
        .iter()
        .zip(values)
        .map(|(p, &v)| {
            let mut p = p.clone();
            p.set_value_in_user_unit(v)?;
            Ok(p.value())
        })
        .collect::<Result<Vec<f64>>>()?;

    let solutions = session.set(engine, &internal)?;
    let solutions = solutions.iter().map(|g| g.snapshot()).collect();
    let engine = session.engine(engine)?;
    let output = SetOutput {
        engine: engine.name().to_string(),
        mode: engine.mode().name().to_string(),
        stats: engine.last_stats(),
        solutions,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
