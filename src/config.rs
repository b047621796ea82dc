use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::DEFAULT_ESTIMATED_HOURS;
use crate::orchestration::{
    AgentType, CategoryRouter, SimulationConfig, DEFAULT_AGENT_CAPACITY, DEFAULT_MAX_ROUNDS,
    DEFAULT_ORACLE_TIMEOUT_SECS, DEFAULT_ROUND_MINUTES,
};
use crate::{tplog_debug, Error, Result};

/// `[simulation]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub round_minutes: u32,
    pub max_rounds: u32,
    pub default_agent_capacity: usize,
    pub oracle_timeout_secs: u64,
    pub default_estimated_hours: f64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            round_minutes: DEFAULT_ROUND_MINUTES,
            max_rounds: DEFAULT_MAX_ROUNDS,
            default_agent_capacity: DEFAULT_AGENT_CAPACITY,
            oracle_timeout_secs: DEFAULT_ORACLE_TIMEOUT_SECS,
            default_estimated_hours: DEFAULT_ESTIMATED_HOURS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    pub store_dir: Option<String>,
    #[serde(default)]
    pub simulation: SimulationSettings,
    /// Task category to agent type name.
    #[serde(default)]
    pub routing: BTreeMap<String, String>,
}

impl Config {
    pub fn taskplan_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".taskplan"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::taskplan_dir()?.join("taskplan.toml"))
    }

    /// Directory of the JSON project store.
    pub fn projects_dir(&self) -> Result<PathBuf> {
        match &self.store_dir {
            Some(dir) => Ok(expand_tilde(dir)),
            None => Ok(Self::taskplan_dir()?.join("projects")),
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        tplog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            tplog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        tplog_debug!(
            "Config loaded: simulation={:?}, routes={}, store_dir={:?}",
            config.simulation,
            config.routing.len(),
            config.store_dir
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let dir = Self::taskplan_dir()?;
        if !dir.exists() {
            tplog_debug!("Creating taskplan directory");
            fs::create_dir_all(&dir)?;
        }
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_toml()?)?;
        tplog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.to_simulation_config().validate()?;
        if self.simulation.default_agent_capacity == 0 {
            return Err(Error::Validation(
                "default_agent_capacity must be at least 1".into(),
            ));
        }
        self.routes()?;
        Ok(())
    }

    /// Runtime settings for the engine.
    pub fn to_simulation_config(&self) -> SimulationConfig {
        let s = &self.simulation;
        SimulationConfig {
            round_increment_hours: f64::from(s.round_minutes) / 60.0,
            max_rounds: s.max_rounds,
            oracle_timeout: Duration::from_secs(s.oracle_timeout_secs),
            default_estimated_hours: s.default_estimated_hours,
            start_time: None,
        }
    }

    /// Parsed routing table. Built-in routes apply unless overridden.
    pub fn routes(&self) -> Result<BTreeMap<String, AgentType>> {
        let mut routes = CategoryRouter::default_routes();
        for (category, agent) in &self.routing {
            let agent: AgentType = agent.parse()?;
            routes.insert(category.to_ascii_lowercase(), agent);
        }
        Ok(routes)
    }

    pub fn router(&self) -> Result<CategoryRouter> {
        Ok(CategoryRouter::new(self.routes()?))
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
