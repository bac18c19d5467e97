//! Headless column run
//!
//! Wires the kinematic driver to one of the microphysics schemes, runs to
//! the configured end time and prints summary diagnostics of the recorded
//! trajectory.

use clap::{Parser, ValueEnum};
use column_sim_core::{
    ColumnConfig, ColumnSimulation, KinematicConfig, KinematicDriver, MicrophysicsAdapter,
    NoObserver, OutputRecord, ParticleConfig, ParticleEnsemble, ReferenceScales,
    SaturationAdjustment, SaturationConfig, Seconds, SimulationError,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Scheme {
    /// Bulk saturation adjustment with threshold autoconversion
    Saturation,
    /// Lagrangian super-particle ensemble
    Particle,
}

#[derive(Parser, Debug)]
#[command(about = "Headless coupled atmospheric column run")]
struct Args {
    /// Number of grid cells in the column
    #[arg(long, default_value_t = 120)]
    n_cells: usize,

    /// Cell height in metres
    #[arg(long, default_value_t = 25.0)]
    dz: f64,

    /// Simulated end time in seconds
    #[arg(long, default_value_t = 1800.0)]
    t_end: f64,

    /// Coupling interval in model steps
    #[arg(long, default_value_t = 1)]
    coupling_interval: u64,

    /// Peak updraft speed in m/s
    #[arg(long, default_value_t = 2.0)]
    w_max: f64,

    /// Surface vapour mass fraction in kg/kg
    #[arg(long, default_value_t = 0.015)]
    surface_vapour: f64,

    /// Microphysics scheme
    #[arg(long, value_enum, default_value_t = Scheme::Saturation)]
    scheme: Scheme,

    /// Random seed for the particle scheme
    #[arg(long, default_value_t = 44)]
    seed: u64,
}

fn build_microphysics(
    args: &Args,
    scales: ReferenceScales,
) -> Result<Box<dyn MicrophysicsAdapter>, SimulationError> {
    let step = Seconds::new(1.0);
    Ok(match args.scheme {
        Scheme::Saturation => Box::new(SaturationAdjustment::new(
            SaturationConfig {
                dz: args.dz,
                ..SaturationConfig::default()
            },
            scales,
            step,
        )?),
        Scheme::Particle => Box::new(ParticleEnsemble::new(
            ParticleConfig {
                seed: args.seed,
                ..ParticleConfig::default()
            },
            scales,
            step,
        )?),
    })
}

fn run(args: &Args) -> Result<OutputRecord, SimulationError> {
    let dynamics = KinematicDriver::new(
        KinematicConfig {
            n_cells: args.n_cells,
            dz: args.dz,
            w_max: args.w_max,
            surface_vapour: args.surface_vapour,
            ..KinematicConfig::default()
        },
        Seconds::new(1.0),
    )?;
    let state = dynamics.initial_state()?;
    let microphysics = build_microphysics(args, ReferenceScales::standard()?)?;

    ColumnSimulation::new(
        &ColumnConfig {
            steps_per_second: 1.0,
            t_end: Seconds::new(args.t_end),
            coupling_interval: args.coupling_interval,
        },
        state,
        Box::new(dynamics),
        microphysics,
        Box::new(NoObserver),
    )?
    .run()
}

fn column_max(record: &OutputRecord, name: &str) -> f64 {
    record.field(name).map_or(0.0, |field| {
        field
            .rows()
            .flat_map(|row| row.iter().copied())
            .fold(0.0_f64, f64::max)
    })
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let record = match run(&args) {
        Ok(record) => record,
        Err(err) => {
            eprintln!("run failed: {err}");
            std::process::exit(1);
        }
    };

    let last = record.len() - 1;
    println!("records:              {}", record.len());
    println!("final step:           {}", record.steps()[last]);
    println!("max cloud water:      {:.6e} kg/kg", column_max(&record, "cloud_water"));
    println!("max rain water:       {:.6e} kg/kg", column_max(&record, "rain_water"));
    println!("max precip flux:      {:.6e}", column_max(&record, "precip_flux"));
    if let Some(vapour) = record.field("vapour") {
        let surface: Vec<f64> = vapour.rows().map(|row| row[0]).collect();
        println!(
            "surface vapour:       {:.6e} -> {:.6e} kg/kg",
            surface[0], surface[last]
        );
    }
}
