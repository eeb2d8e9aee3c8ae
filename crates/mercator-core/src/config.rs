//! Configuration loading and typed config structures for the Mercator
//! simulation.
//!
//! The canonical configuration lives in `mercator-config.yaml` at the
//! project root. Every section is optional and every field has a default,
//! so an empty file is a valid configuration. The `agents` and `fitness`
//! sections deserialize straight into the crate configs they feed
//! ([`AgentConfig`], [`FitnessConfig`]); the remaining sections are merged
//! into an [`EvolutionConfig`] by [`SimulationConfig::evolution_config`].

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mercator_agents::AgentConfig;
use mercator_population::{EvolutionConfig, FitnessConfig};

/// Environment variable overriding `engine.seed`.
pub const SEED_ENV: &str = "MERCATOR_SEED";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value is out of range.
    #[error("invalid config value {field}: {reason}")]
    Invalid {
        /// Offending field.
        field: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Seed, clock and event settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Population size and generation timing.
    #[serde(default)]
    pub population: PopulationConfig,

    /// Variation and selection parameters.
    #[serde(default)]
    pub evolution: EvolutionConfig,

    /// Fitness component weights and normalisation.
    #[serde(default)]
    pub fitness: FitnessConfig,

    /// Per-agent decision and learning parameters.
    #[serde(default)]
    pub agents: AgentConfig,

    /// Emergent-behaviour detection.
    #[serde(default)]
    pub emergence: EmergenceConfig,

    /// Cultural transmission.
    #[serde(default)]
    pub culture: CultureConfig,

    /// Logging output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file.
    ///
    /// `MERCATOR_SEED` overrides `engine.seed` when set.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, applying the seed override.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config = Self::parse_without_env(yaml)?;
        if let Ok(raw) = std::env::var(SEED_ENV) {
            config.engine.seed = parse_seed(&raw)?;
        }
        Ok(config)
    }

    /// Parse configuration from a YAML string, ignoring the environment.
    pub fn parse_without_env(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// The population engine's configuration with the `population`,
    /// `fitness`, `emergence` and `culture` sections merged in.
    pub fn evolution_config(&self) -> EvolutionConfig {
        EvolutionConfig {
            population_size: self.population.size,
            fitness: self.fitness.clone(),
            emergence_detection_threshold: self.emergence.detection_threshold,
            cultural_transmission_rate: self.culture.transmission_rate,
            ..self.evolution.clone()
        }
    }

    /// Reject out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.agents.validate().map_err(|field| ConfigError::Invalid {
            field: format!("agents.{field}"),
            reason: "out of range".to_owned(),
        })?;
        self.evolution_config()
            .validate()
            .map_err(|e| ConfigError::Invalid {
                field: "evolution".to_owned(),
                reason: e.to_string(),
            })?;
        let positive = [
            ("population.generation_duration_secs", self.population.generation_duration_secs),
            ("emergence.interval_secs", self.emergence.interval_secs),
            ("culture.interval_secs", self.culture.interval_secs),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(invalid(field, "must be at least 1"));
            }
        }
        if self.engine.broadcast_capacity == 0 {
            return Err(invalid("engine.broadcast_capacity", "must be at least 1"));
        }
        if !(0.0..=100.0).contains(&self.culture.trust_link_threshold) {
            return Err(invalid("culture.trust_link_threshold", "must lie in [0, 100]"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}

fn parse_seed(raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
        field: SEED_ENV.to_owned(),
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Engine-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seed for every identifier and random draw (default: 42).
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Simulated time at which the clock starts
    /// (default: 2025-01-01T00:00:00Z).
    #[serde(default = "default_start_time")]
    pub start_time: DateTime<Utc>,

    /// Events kept in the in-memory log (default: 10000).
    #[serde(default = "default_event_retention")]
    pub event_retention: usize,

    /// Capacity of the subscriber broadcast channel (default: 1024).
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,

    /// Trust every known counterparty gains in an agent that reaches a
    /// reputation milestone (default: 2).
    #[serde(default = "default_reputation_gain")]
    pub reputation_gain: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            start_time: default_start_time(),
            event_retention: default_event_retention(),
            broadcast_capacity: default_broadcast_capacity(),
            reputation_gain: default_reputation_gain(),
        }
    }
}

/// Population size and generation timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Target number of agents after each tick (default: 100).
    #[serde(default = "default_population_size")]
    pub size: usize,

    /// Agents seeded by the headless binary at start (default: 100).
    #[serde(default = "default_population_size")]
    pub initial_agents: usize,

    /// Simulated seconds per generation (default: 86400).
    #[serde(default = "default_generation_duration_secs")]
    pub generation_duration_secs: u64,

    /// Real-time budget for gathering fitness inputs, in milliseconds;
    /// 0 disables the deadline (default: 0).
    #[serde(default)]
    pub scoring_deadline_ms: u64,

    /// Generations the runner executes before stopping; 0 runs until
    /// stopped (default: 0).
    #[serde(default)]
    pub max_generations: u64,

    /// Real-time milliseconds between generation ticks in the runner
    /// (default: 1000).
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: default_population_size(),
            initial_agents: default_population_size(),
            generation_duration_secs: default_generation_duration_secs(),
            scoring_deadline_ms: 0,
            max_generations: 0,
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

/// Emergent-behaviour detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergenceConfig {
    /// Population share a signature cluster must exceed (default: 0.3).
    #[serde(default = "default_detection_threshold")]
    pub detection_threshold: f64,

    /// Simulated seconds between detection passes (default: 1800).
    #[serde(default = "default_emergence_interval_secs")]
    pub interval_secs: u64,
}

impl Default for EmergenceConfig {
    fn default() -> Self {
        Self {
            detection_threshold: default_detection_threshold(),
            interval_secs: default_emergence_interval_secs(),
        }
    }
}

/// Cultural transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CultureConfig {
    /// Rate at which norms move toward linked agents (default: 0.1).
    #[serde(default = "default_transmission_rate")]
    pub transmission_rate: f64,

    /// Simulated seconds between diffusion passes (default: 7200).
    #[serde(default = "default_culture_interval_secs")]
    pub interval_secs: u64,

    /// Trust above which a relationship carries culture (default: 60).
    #[serde(default = "default_trust_link_threshold")]
    pub trust_link_threshold: f64,
}

impl Default for CultureConfig {
    fn default() -> Self {
        Self {
            transmission_rate: default_transmission_rate(),
            interval_secs: default_culture_interval_secs(),
            trust_link_threshold: default_trust_link_threshold(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Human,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is unset (default: info).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format (default: human).
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Human,
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_seed() -> u64 {
    42
}

fn default_start_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_735_689_600, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

const fn default_event_retention() -> usize {
    10_000
}

const fn default_broadcast_capacity() -> usize {
    1024
}

const fn default_reputation_gain() -> f64 {
    2.0
}

const fn default_population_size() -> usize {
    100
}

const fn default_generation_duration_secs() -> u64 {
    86_400
}

const fn default_tick_interval_ms() -> u64 {
    1000
}

const fn default_detection_threshold() -> f64 {
    0.3
}

const fn default_emergence_interval_secs() -> u64 {
    1800
}

const fn default_transmission_rate() -> f64 {
    0.1
}

const fn default_culture_interval_secs() -> u64 {
    7200
}

const fn default_trust_link_threshold() -> f64 {
    60.0
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.seed, 42);
        assert_eq!(config.population.size, 100);
        assert_eq!(config.agents.memory_cap, 500);
    }

    #[test]
    fn parse_partial_yaml() {
        let yaml = r"
engine:
  seed: 7
population:
  size: 250
  generation_duration_secs: 3600
evolution:
  mutation_rate: 0.1
  crossover_rate: 0.6
agents:
  memory_cap: 200
  trauma_threshold: 90
emergence:
  detection_threshold: 0.4
culture:
  transmission_rate: 0.2
logging:
  level: debug
  format: json
";
        let config = SimulationConfig::parse_without_env(yaml).unwrap();
        assert_eq!(config.engine.seed, 7);
        assert_eq!(config.population.size, 250);
        assert_eq!(config.agents.memory_cap, 200);
        assert_eq!(config.logging.format, LogFormat::Json);

        let evolution = config.evolution_config();
        assert_eq!(evolution.population_size, 250);
        assert!((evolution.mutation_rate - 0.1).abs() < f64::EPSILON);
        assert!((evolution.emergence_detection_threshold - 0.4).abs() < f64::EPSILON);
        assert!((evolution.cultural_transmission_rate - 0.2).abs() < f64::EPSILON);
        // Unset fields keep their defaults.
        assert!((evolution.elite_preservation_rate - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_empty_yaml() {
        let config = SimulationConfig::parse_without_env("").unwrap();
        assert_eq!(config, SimulationConfig::default());
    }

    #[test]
    fn out_of_range_rates_are_rejected() {
        let yaml = "evolution:\n  crossover_rate: 1.5\n";
        let config = SimulationConfig::parse_without_env(yaml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));

        let yaml = "agents:\n  strategy_learning_rate: 0.9\n";
        let config = SimulationConfig::parse_without_env(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn seed_override_must_be_numeric() {
        assert_eq!(parse_seed(" 99 ").unwrap(), 99);
        assert!(parse_seed("abc").is_err());
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("mercator-config.yaml");
        if path.exists() {
            let config = SimulationConfig::from_file(&path);
            assert!(config.is_ok(), "failed to load project config: {config:?}");
        }
    }
}
