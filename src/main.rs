use std::path::PathBuf;

use anyhow::Context;
use ascent_guidance::io::{write_summary_file, write_trace_file};
use ascent_guidance::sim::{SimConfig, SimVehicle};
use ascent_guidance::{MissionConfig, MissionRunner, MissionSummary};
use clap::Parser;
use tokio_util::sync::CancellationToken;

/// Fly the guidance loop against the simulated Kerbin orbiter.
#[derive(Parser, Debug)]
#[command(author, version, about = "Ascent and circularization guidance (simulated vehicle)")]
struct Cli {
    /// Mission configuration (TOML); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the per-tick ascent trace as CSV
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Write the mission summary and event log as JSON
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Fly on the wall clock instead of virtual time
    #[arg(long, default_value_t = false)]
    realtime: bool,

    /// Drop every n-th telemetry read
    #[arg(long)]
    dropout_every: Option<u32>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => MissionConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => MissionConfig::default(),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(!cli.realtime)
        .build()
        .context("building tokio runtime")?;

    runtime.block_on(fly(cli, config))
}

async fn fly(cli: Cli, config: MissionConfig) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let abort = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupt received, aborting mission");
            abort.cancel();
        }
    });

    let mut vehicle = SimVehicle::kerbin(SimConfig {
        dropout_every: cli.dropout_every,
        ..Default::default()
    });
    if vehicle.design_delta_v() < config.throttle.ascent_delta_v_budget {
        log::warn!(
            "vehicle carries {:.0} m/s, less than the {:.0} m/s ascent budget",
            vehicle.design_delta_v(),
            config.throttle.ascent_delta_v_budget
        );
    }
    let mut runner = MissionRunner::new(config).context("invalid mission config")?;
    let result = runner.run(&mut vehicle, &cancel).await;

    if let Some(path) = &cli.trace {
        write_trace_file(path, runner.trace())
            .with_context(|| format!("writing trace to {}", path.display()))?;
    }

    let summary = result.context("mission failed")?;
    if let Some(path) = &cli.summary {
        write_summary_file(path, &summary, runner.events().events())
            .with_context(|| format!("writing summary to {}", path.display()))?;
    }
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &MissionSummary) {
    let stages: Vec<String> = summary.separations.iter().map(|s| s.to_string()).collect();
    println!();
    println!("====================================================================");
    println!("  MISSION SUMMARY");
    println!("====================================================================");
    println!("  Ascent ended:    {:?}", summary.ascent_end);
    println!("  Separations:     {}", stages.join(" -> "));
    println!(
        "  Delta-v:         {:>8.0} m/s ascent + {:>6.0} m/s circularization = {:>8.0} m/s",
        summary.ascent_dv, summary.circularization_dv, summary.total_dv
    );
    println!(
        "  Final orbit:     {:>8.1} km x {:>8.1} km",
        summary.final_apoapsis / 1000.0,
        summary.final_periapsis / 1000.0
    );
    println!(
        "  Mission time:    {:>8.1} s   ({} convergence warning(s), {} retry(ies))",
        summary.mission_time, summary.convergence_warnings, summary.convergence_retries
    );
    println!();
}
