//! Simulation binary for Mercator.
//!
//! Wires the engine, a seeded founding population and the synthetic market
//! session together and runs generations until the configured bound, an
//! extinction, or Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `mercator-config.yaml` (or the path given as
//!    the first argument)
//! 2. Initialize structured logging (tracing)
//! 3. Create the engine and spawn the founding traders
//! 4. Start the event logger
//! 5. Run the generation loop with the market session hook
//! 6. Log the result

mod error;
mod events;
mod market;
mod spawner;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mercator_core::config::{LogFormat, LoggingConfig};
use mercator_core::{MercatorEngine, RunnerControl, SimulationConfig, run_generations};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tokio::sync::{Mutex, mpsc};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::AppError;
use crate::market::{MarketConfig, MarketSession};
use crate::spawner::FounderBands;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG: &str = "mercator-config.yaml";

/// Capacity of the environmental change channel.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, seeding or the run fails.
#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Load configuration.
    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG), PathBuf::from);
    let config = load_config(&config_path)?;
    let market_config = load_market_config(&config_path)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!(
        path = %config_path.display(),
        seed = config.engine.seed,
        population_size = config.population.size,
        initial_agents = config.population.initial_agents,
        max_generations = config.population.max_generations,
        "mercator-engine starting"
    );

    // 3. Create the engine and its founders.
    let mut engine = MercatorEngine::new(config.clone())?;
    let mut founder_rng = SmallRng::seed_from_u64(config.engine.seed);
    spawner::spawn_traders(
        &mut engine,
        config.population.initial_agents,
        &FounderBands::default(),
        &mut founder_rng,
    )?;

    // 4. Event logger.
    let logger = tokio::spawn(events::log_events(engine.subscribe()));

    // 5. Run.
    let engine = Arc::new(Mutex::new(engine));
    let control = Arc::new(RunnerControl::new(
        config.population.tick_interval_ms,
        config.population.max_generations,
    ));
    {
        let control = Arc::clone(&control);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, stopping after the current generation");
                control.request_stop();
            }
        });
    }

    let (changes_tx, changes_rx) = mpsc::channel(CHANGE_CHANNEL_CAPACITY);
    let mut session = MarketSession::new(
        market_config,
        config.engine.seed.wrapping_add(1),
        changes_tx,
    );
    let result = run_generations(Arc::clone(&engine), control, changes_rx, &mut session).await?;

    // 6. Log the result.
    let status = engine.lock().await.population_status();
    info!(
        end_reason = ?result.end_reason,
        generations_run = result.generations_run,
        decisions = session.decisions(),
        population = status.size,
        mean_fitness = status.mean_fitness,
        emergent_behaviors = status.emergent_behaviors,
        "mercator-engine shutdown complete"
    );

    drop(engine);
    logger.await.map_err(|e| AppError::Join {
        message: e.to_string(),
    })?;
    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match config.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Human => builder.init(),
    }
}

/// Load the simulation configuration, falling back to defaults when the
/// file does not exist.
fn load_config(path: &Path) -> Result<SimulationConfig, AppError> {
    if path.exists() {
        Ok(SimulationConfig::from_file(path)?)
    } else {
        Ok(SimulationConfig::parse("")?)
    }
}

/// Load the `market` section of the config file.
///
/// Defaults are used when the file or the section is missing.
fn load_market_config(path: &Path) -> Result<MarketConfig, AppError> {
    if !path.exists() {
        return Ok(MarketConfig::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| AppError::Market {
        message: format!("failed to read config file: {e}"),
    })?;
    let raw: serde_yml::Value = serde_yml::from_str(&contents).map_err(|e| AppError::Market {
        message: format!("failed to parse config YAML: {e}"),
    })?;
    let config = match raw.get("market") {
        Some(section) => {
            serde_yml::from_value(section.clone()).map_err(|e| AppError::Market {
                message: format!("failed to parse market config: {e}"),
            })?
        }
        None => MarketConfig::default(),
    };
    config.validate().map_err(|field| AppError::Market {
        message: format!("market.{field} is out of range"),
    })?;
    Ok(config)
}
