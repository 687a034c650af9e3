use anyhow::{Context, Result};
use epidemic_common::{SimulationConfig, Snapshot};
use epidemic_engine::Simulation;
use log::{debug, error, info};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::Instant;

fn main() -> Result<()> {
    env_logger::init();

    info!("Starting SIR epidemic simulation...");

    // --- Load Configuration ---
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = SimulationConfig::load(&config_path)?;
    debug!("Configuration: {:#?}", config);

    info!("Using {} Rayon threads.", rayon::current_num_threads());

    // --- Initialize Simulation ---
    let mut sim = Simulation::new(&config).context("Failed to build the simulation")?;
    info!(
        "Initialized {} agents in {} cities (seed {}).",
        sim.agent_count(),
        sim.cities().len(),
        sim.seed()
    );

    // --- Simulation Loop ---
    info!(
        "Running with dt = {:.4} s for at most {:.1} s, lingering {:.1} s after the last recovery.",
        config.timing.dt, config.timing.max_time, config.timing.linger_time
    );
    let start_time = Instant::now();
    let summary = sim.run(&config.timing).context("Simulation step failed")?;
    let total_duration = start_time.elapsed();

    info!(
        "Simulation finished after {} steps (t = {:.2} s) in {:.3} seconds.",
        summary.steps,
        summary.time,
        total_duration.as_secs_f64()
    );
    match summary.extinct_at {
        Some(t) => info!("Infection died out at t = {:.2} s.", t),
        None => info!("Infection still active when the run stopped."),
    }
    info!(
        "Peak infected: {} | Final S {} I {} R {}",
        summary.peak_infected,
        summary.final_counts.susceptible,
        summary.final_counts.infected,
        summary.final_counts.recovered
    );

    // --- Save Recorded Data ---
    let base = &config.output.base_filename;
    if config.output.save_stats {
        let snapshots = sim.recorded_snapshots();
        let output_format = config.output.format.as_deref().unwrap_or("json");
        if let Err(e) = save_snapshots(base, output_format, snapshots) {
            error!("Error saving snapshots: {:#}", e);
        }
        if let Err(e) = save_sir_curve(base, snapshots) {
            error!("Error saving SIR curve: {:#}", e);
        }
    } else {
        info!("Skipping saving snapshots as per config (save_stats is false).");
    }

    if config.output.save_final_state {
        if let Err(e) = save_final_state(base, &sim) {
            error!("Error saving final agent states: {:#}", e);
        }
    } else {
        info!("Skipping saving final agent states as per config.");
    }

    info!("Simulation Complete.");
    Ok(())
}

fn save_snapshots(base: &str, format: &str, snapshots: &[Snapshot]) -> Result<()> {
    match format {
        "bincode" => {
            let filename = format!("{}_snapshots.bin", base);
            let file = File::create(&filename).with_context(|| format!("creating '{}'", filename))?;
            bincode::serialize_into(BufWriter::new(file), snapshots)?;
            info!("All snapshots saved to {} (binary format)", filename);
        }
        "messagepack" => {
            let filename = format!("{}_snapshots.msgpack", base);
            let file = File::create(&filename).with_context(|| format!("creating '{}'", filename))?;
            rmp_serde::encode::write_named(&mut BufWriter::new(file), snapshots)?;
            info!("All snapshots saved to {} (MessagePack format)", filename);
        }
        other => {
            if other != "json" {
                error!("Unknown output format: {}. Using JSON instead.", other);
            }
            let filename = format!("{}_snapshots.json", base);
            let json_string = serde_json::to_string(snapshots)?;
            let mut file = File::create(&filename).with_context(|| format!("creating '{}'", filename))?;
            file.write_all(json_string.as_bytes())?;
            info!("All snapshots saved to {} ({} KB)", filename, json_string.len() / 1024);
        }
    }
    Ok(())
}

fn save_sir_curve(base: &str, snapshots: &[Snapshot]) -> Result<()> {
    let filename = format!("{}_sir.csv", base);
    let mut writer = csv::Writer::from_path(&filename)?;
    writer.write_record(["time", "step", "susceptible", "infected", "recovered"])?;
    for snapshot in snapshots {
        writer.write_record(&[
            format!("{:.4}", snapshot.time),
            snapshot.step.to_string(),
            snapshot.susceptible.to_string(),
            snapshot.infected.to_string(),
            snapshot.recovered.to_string(),
        ])?;
    }
    writer.flush()?;
    info!("SIR curve saved to {}", filename);
    Ok(())
}

fn save_final_state(base: &str, sim: &Simulation) -> Result<()> {
    let filename = format!("{}_final_state.csv", base);
    let mut writer = csv::Writer::from_path(&filename)?;
    writer.write_record(["id", "city", "x", "y", "status", "infected_at", "recovered_at"])?;
    for agent in sim.agents() {
        let position = agent.position();
        writer.write_record(&[
            agent.id().to_string(),
            agent.city().to_string(),
            format!("{:.4}", position.x),
            format!("{:.4}", position.y),
            agent.status().short_code().to_string(),
            format!("{:.4}", agent.infected_at()),
            format!("{:.4}", agent.recovered_at()),
        ])?;
    }
    writer.flush()?;
    info!("Final agent states saved to {}", filename);
    Ok(())
}
