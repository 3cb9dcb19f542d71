//! Sangha - multi-robot exploration simulator
//!
//! Loads a scenario, runs it to completion and optionally writes the base
//! station's map as a PNG.
//!
//! ```text
//! sangha configs/office.toml --ticks 2000 --png base.png
//! ```

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sangha::{Result, SanghaConfig, Simulation};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scenario file path
    #[arg(default_value = "configs/office.toml")]
    config: String,

    /// Override the tick budget
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Override the seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Write the base station's map here when done
    #[arg(short, long)]
    png: Option<String>,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sangha=info")),
        )
        .init();

    let args = Args::parse();

    info!("Sangha v{}", env!("CARGO_PKG_VERSION"));
    info!("Loading scenario from {}", args.config);
    let mut config = SanghaConfig::load(&args.config)?;
    if let Some(ticks) = args.ticks {
        config.simulation.max_ticks = ticks;
    }
    if let Some(seed) = args.seed {
        config.simulation.seed = seed;
    }
    let png = args.png.or_else(|| config.output.png.clone());

    let mut sim = Simulation::new(config)?;
    let report = sim.run();

    info!(
        "{} ticks, {} free cells at base ({:.1}%), relays deployed {} / collected {}",
        report.ticks,
        report.base_free_cells,
        report.base_coverage,
        report.relays_deployed,
        report.relays_collected
    );

    if let Some(path) = png {
        sim.save_base_map(&path)?;
        info!("Saved base map to {}", path);
    }

    info!("Sangha finished");
    Ok(())
}
