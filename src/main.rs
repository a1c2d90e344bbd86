use anyhow::{Context, Result};
use clap::Parser;
use fibrillation_common::{OutputFormat, SimulationConfig, Snapshot, SnapshotFile, UpdateMode};
use fibrillation_engine::{Lattice, Simulation};
use log::{debug, error, info, trace};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

/// Runs the atrial fibrillation cellular automaton described by a TOML config.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the simulation config
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Number of steps to run, overriding `run.num_steps`
    #[arg(short, long)]
    num_iters: Option<u64>,

    /// Record full grids every step for the visualizer, overriding `[output]`
    #[arg(short, long)]
    record: bool,

    /// Seed for the random stream, overriding `run.seed`
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();
    let args = Args::parse();

    info!("Starting fibrillation engine...");

    // --- Load Configuration ---
    let mut config = SimulationConfig::load(&args.config)?;
    if let Some(num_iters) = args.num_iters {
        if num_iters == 0 {
            anyhow::bail!("--num-iters must be positive.");
        }
        config.run.num_steps = num_iters;
    }
    if args.seed.is_some() {
        config.run.seed = args.seed;
    }
    if args.record {
        config.output.save_snapshots = true;
        config.output.include_state = true;
        config.output.record_interval_steps = 1;
    }

    // --- Initialize Simulation ---
    let mut sim = Simulation::from_config(&config).context("Failed to build the lattice")?;
    info!("Initialized {}", sim.lattice());
    debug!("Lattice parameters: {:#?}", sim.lattice().params());
    if sim.mode() == UpdateMode::Parallel {
        info!("Parallel update using {} Rayon threads.", rayon::current_num_threads());
    }

    // --- Simulation Loop ---
    let output = config.output.clone();
    let total_steps = config.run.num_steps;
    let mut snapshots = Vec::new();
    if output.save_snapshots {
        snapshots.push(take_snapshot(sim.lattice(), sim.lattice().active_cells(), output.include_state));
        info!("Recording a snapshot every {} steps.", output.record_interval_steps);
    }

    info!("Starting simulation loop for {} steps...", total_steps);
    let start_time = Instant::now();
    let mut previous_print_time = start_time;
    let print_interval_secs = 5.0;

    let run_result = sim.run_observed(total_steps, |lattice, active| {
        let step = lattice.step_count();
        let is_last_step = step == total_steps;

        if output.save_snapshots && (step % output.record_interval_steps == 0 || is_last_step) {
            snapshots.push(take_snapshot(lattice, active, output.include_state));
        }

        if previous_print_time.elapsed().as_secs_f64() >= print_interval_secs || is_last_step {
            info!(
                "Step [{}/{}] | Active cells: {} | Elapsed: {:.2} s",
                step,
                total_steps,
                active,
                start_time.elapsed().as_secs_f64()
            );
            previous_print_time = Instant::now();
        } else {
            trace!("Step [{}/{}] | Active cells: {}", step, total_steps, active);
        }
    });
    if let Err(e) = run_result {
        error!("Simulation run failed: {}", e);
        anyhow::bail!("Simulation run failed.");
    }

    let total_duration = start_time.elapsed();
    info!(
        "Simulation finished in {:.3} seconds ({:.1} steps per second).",
        total_duration.as_secs_f64(),
        total_steps as f64 / total_duration.as_secs_f64().max(1e-9)
    );

    // --- Save Recorded Data ---
    if output.save_activity {
        let filename = format!("{}_activity.csv", output.base_filename);
        save_activity(&filename, sim.activity_history())
            .with_context(|| format!("Failed to save activity to '{}'", filename))?;
        info!("Activity history saved to {}", filename);
    } else {
        info!("Skipping saving activity history as per config.");
    }

    if output.save_snapshots {
        let lattice = sim.lattice();
        let file = SnapshotFile {
            row_size: lattice.rows(),
            col_size: lattice.cols(),
            refractory_period: lattice.refractory_period(),
            driving_period: lattice.driving_period(),
            activity: sim.activity_history().to_vec(),
            snapshots,
        };
        let filename = format!("{}_snapshots.{}", output.base_filename, output.format.extension());
        save_snapshots(&filename, output.format, &file)
            .with_context(|| format!("Failed to save snapshots to '{}'", filename))?;
        info!(
            "{} snapshots saved to {} ({:?} format)",
            file.snapshots.len(),
            filename,
            output.format
        );
    } else {
        info!("Skipping saving snapshots as per config (save_snapshots is false).");
    }

    info!("Simulation Complete.");
    Ok(())
}

fn take_snapshot(lattice: &Lattice, active_cells: u64, include_state: bool) -> Snapshot {
    Snapshot {
        step: lattice.step_count(),
        active_cells,
        state: include_state.then(|| lattice.current_state().to_vec()),
    }
}

fn save_activity(filename: &str, activity: &[u64]) -> Result<()> {
    let mut writer = csv::Writer::from_path(filename)?;
    writer.write_record(["step", "active_cells"])?;
    for (i, active) in activity.iter().enumerate() {
        writer.write_record(&[(i + 1).to_string(), active.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

fn save_snapshots(filename: &str, format: OutputFormat, file: &SnapshotFile) -> Result<()> {
    let mut writer = BufWriter::new(File::create(filename)?);
    match format {
        OutputFormat::Bincode => bincode::serialize_into(&mut writer, file)?,
        OutputFormat::Json => serde_json::to_writer(&mut writer, file)?,
        OutputFormat::MessagePack => rmp_serde::encode::write(&mut writer, file)?,
    }
    writer.flush()?;
    Ok(())
}
