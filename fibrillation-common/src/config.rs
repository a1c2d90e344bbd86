use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::sim_params::LatticeParams;
use std::path::Path;

// Lattice structure and dynamics, loaded from the [lattice] section
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LatticeConfig {
    #[serde(default = "default_grid_size")]
    pub row_size: u32,
    #[serde(default = "default_grid_size")]
    pub col_size: u32,
    #[serde(default = "default_refractory_period")]
    pub refractory_period: u32,
    #[serde(default)]
    pub driving_period: Option<u32>, // Defaults to 2 * refractory_period
    #[serde(default = "default_prob_con")]
    pub prob_con: f64,
    #[serde(default)]
    pub prob_def: f64,
    #[serde(default = "default_prob_not_fire")]
    pub prob_not_fire: f64,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Single shared random stream, cells visited in row-major order.
    #[default]
    Sequential,
    /// Rows updated on the rayon pool, one seeded stream per row.
    Parallel,
}

// Run length and randomness, loaded from the [run] section
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RunConfig {
    pub num_steps: u64,
    #[serde(default)]
    pub seed: Option<u64>, // None -> seeded from OS entropy
    #[serde(default)]
    pub mode: UpdateMode,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Bincode,
    Json,
    MessagePack,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Bincode => "bin",
            OutputFormat::Json => "json",
            OutputFormat::MessagePack => "msgpack",
        }
    }
}

// Configuration for output settings, loaded from the [output] section
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_base_filename")]
    pub base_filename: String,
    #[serde(default = "default_true")]
    pub save_activity: bool,
    #[serde(default)]
    pub save_snapshots: bool,
    #[serde(default = "default_record_interval")]
    pub record_interval_steps: u64,
    #[serde(default = "default_true")]
    pub include_state: bool, // Store full grids, needed for animation
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            base_filename: default_base_filename(),
            save_activity: true,
            save_snapshots: false,
            record_interval_steps: default_record_interval(),
            include_state: true,
            format: OutputFormat::default(),
        }
    }
}

fn default_grid_size() -> u32 {
    100
}

fn default_refractory_period() -> u32 {
    100
}

fn default_prob_con() -> f64 {
    1.0
}

fn default_prob_not_fire() -> f64 {
    0.05
}

fn default_base_filename() -> String {
    "caaf_run".to_string()
}

fn default_record_interval() -> u64 {
    1
}

fn default_true() -> bool {
    true
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SimulationConfig {
    pub lattice: LatticeConfig,
    pub run: RunConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))
    }

    /// Parses and validates a configuration held in memory.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;

        // Lattice values are checked by the engine when the lattice is built.
        if config.run.num_steps == 0 {
            anyhow::bail!("num_steps must be greater than 0.");
        }
        if config.output.record_interval_steps == 0 {
            anyhow::bail!("record_interval_steps must be greater than 0.");
        }

        Ok(config)
    }

    /// Converts the [lattice] section into the parameters the engine is built from.
    pub fn get_lattice_params(&self) -> LatticeParams {
        let lattice = &self.lattice;
        LatticeParams {
            row_size: lattice.row_size as usize,
            col_size: lattice.col_size as usize,
            refractory_period: lattice.refractory_period,
            driving_period: lattice.driving_period,
            prob_con: lattice.prob_con,
            prob_def: lattice.prob_def,
            prob_not_fire: lattice.prob_not_fire,
        }
    }
}
