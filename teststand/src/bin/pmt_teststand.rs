//! PMT test stand simulation
//!
//! Builds the encapsulated photomultiplier geometry, loads the photocathode
//! quantum efficiency and runs the recording chain with the built-in photon
//! gun standing in for a transport engine. Each run writes one artifact per
//! worker with the run index inserted before the extension.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{error, info};

use teststand::driver::{run_parallel, EventProgress, PhotonGun, ProgressCallback, RunPlan};
use teststand::geometry::DetectorGeometry;
use teststand::optics::{load_calibration, MaterialCatalog};
use teststand::shared_args::SharedTeststandArgs;

/// Command line arguments for the test stand simulation
#[derive(Parser, Debug)]
#[command(
    name = "PMT Teststand",
    about = "Simulates photon hits on an encapsulated photomultiplier and records them per run",
    long_about = None
)]
struct Args {
    #[command(flatten)]
    shared: SharedTeststandArgs,

    /// Print the derived shell table and exit
    #[arg(long, default_value_t = false)]
    geometry_only: bool,

    /// Hide progress bars
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn print_geometry(geometry: &DetectorGeometry) {
    println!(
        "{:<12} {:<15} {:>10} {:>12} {:>12}",
        "Shell", "Material", "Width mm", "Height mm", "Apex r mm"
    );
    for shell in geometry.shells() {
        println!(
            "{:<12} {:<15} {:>10.3} {:>12.3} {:>12.3}",
            shell.name(),
            shell.material().name(),
            shell.cumulative_width_mm(),
            shell.height_mm(),
            shell.r_outer()[0]
        );
    }
    println!("Hits expected on {}", geometry.sensitive_volume());
}

fn progress_bars(multi: &MultiProgress, workers: usize, run_id: u32) -> Result<Vec<ProgressBar>> {
    let style = ProgressStyle::default_bar()
        .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .context("Invalid progress bar template")?
        .progress_chars("█▉▊▋▌▍▎▏ ");

    Ok((0..workers)
        .map(|worker| {
            let bar = multi.add(ProgressBar::new(0));
            bar.set_style(style.clone());
            bar.set_message(format!("Run {run_id} worker {worker}"));
            bar
        })
        .collect())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = args
        .shared
        .resolve_config()
        .context("Invalid test stand configuration")?;

    let calibration = load_calibration(&config.calibration_path).with_context(|| {
        format!(
            "Failed to load quantum efficiency from {}",
            config.calibration_path.display()
        )
    })?;
    let catalog = MaterialCatalog::standard().context("Failed to build material catalog")?;
    let geometry = config
        .geometry_builder()?
        .build(catalog, calibration)
        .context("Failed to build detector geometry")?;

    if args.geometry_only {
        print_geometry(&geometry);
        return Ok(());
    }

    let naming = config.output_naming()?;
    let multi = MultiProgress::new();
    let mut failures = 0usize;

    for run_id in 0..args.shared.run.runs {
        let plan = RunPlan {
            run_id,
            total_events: args.shared.run.events,
            workers: config.workers,
            capture: config.capture_settings(),
            naming: naming.clone(),
        };

        let bars = Arc::new(if args.quiet {
            Vec::new()
        } else {
            progress_bars(&multi, plan.workers, run_id)?
        });
        let callback_bars = bars.clone();
        let progress: ProgressCallback = Arc::new(move |p: EventProgress| {
            if let Some(bar) = callback_bars.get(p.worker) {
                bar.set_length(p.total_events);
                bar.set_position(p.event_index + 1);
            }
        });

        let outcomes = run_parallel(&geometry, &plan, Some(progress), |_| {
            PhotonGun::new(&geometry, config.photon_gun.clone())
        })?;

        for bar in bars.iter() {
            bar.finish();
        }

        for outcome in outcomes {
            match outcome.result {
                Ok(summary) => match summary.artifact {
                    Some(path) => info!(
                        "Run {} worker {}: {} events, {} photon rows, {} total rows in {}",
                        summary.run_id,
                        outcome.worker,
                        summary.events,
                        summary.photon_rows,
                        summary.total_rows,
                        path.display()
                    ),
                    None => info!(
                        "Run {} worker {}: no events, no artifact",
                        summary.run_id, outcome.worker
                    ),
                },
                Err(e) => {
                    error!("Run {} worker {} failed: {}", run_id, outcome.worker, e);
                    failures += 1;
                }
            }
        }
    }

    if failures > 0 {
        bail!("{failures} worker runs failed");
    }
    Ok(())
}
