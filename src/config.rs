//! Engine configuration, stored as TOML.
//!
//! Every switch and limit the orchestrator reads lives here. Missing keys take
//! their defaults, so an empty file is a valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::orchestrator::ExecutorOptions;

/// Orchestrator switches and limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Master switch for the orchestrator.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Hard cap on tasks per plan, including replan additions (default: 20).
    #[serde(default = "default_max_tasks_per_plan")]
    pub max_tasks_per_plan: usize,
    /// Start executing as soon as a plan is created.
    #[serde(default)]
    pub auto_execute: bool,
    /// Save plans and record executions through the persistence collaborator.
    #[serde(default = "default_true")]
    pub enable_persistence: bool,
    /// Run plans through the multi-agent coordinator instead of one by one.
    #[serde(default = "default_true")]
    pub enable_multi_agent: bool,
    /// Re-evaluate the plan after failed tasks.
    #[serde(default = "default_true")]
    pub enable_dynamic_replanning: bool,
    /// Concurrency bound for the default coordinator (default: 5).
    #[serde(default = "default_max_parallel_tasks")]
    pub max_parallel_tasks: usize,
    /// Replans allowed per `execute_plan` call (default: 3).
    #[serde(default = "default_max_replans_per_execution")]
    pub max_replans_per_execution: usize,
    /// Index plans into the knowledge graph and allow knowledge queries.
    #[serde(default = "default_true")]
    pub enable_atomspace: bool,
    /// Allow inference requests and learning from execution.
    #[serde(default = "default_true")]
    pub enable_pln: bool,
    /// Allow tool execution.
    #[serde(default = "default_true")]
    pub enable_tool_integration: bool,
    /// Forward-chaining rounds used by the CLI and hosts (default: 10).
    #[serde(default = "default_pln_max_iterations")]
    pub pln_max_iterations: usize,
    /// Minimum inference confidence (default: 0.3).
    #[serde(default = "default_pln_min_confidence")]
    pub pln_min_confidence: f64,
    /// Handed to the task executor on every call.
    #[serde(default)]
    pub executor: ExecutorOptions,
}

fn default_true() -> bool {
    true
}
fn default_max_tasks_per_plan() -> usize {
    20
}
fn default_max_parallel_tasks() -> usize {
    5
}
fn default_max_replans_per_execution() -> usize {
    3
}
fn default_pln_max_iterations() -> usize {
    10
}
fn default_pln_min_confidence() -> f64 {
    0.3
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_tasks_per_plan: default_max_tasks_per_plan(),
            auto_execute: false,
            enable_persistence: true,
            enable_multi_agent: true,
            enable_dynamic_replanning: true,
            max_parallel_tasks: default_max_parallel_tasks(),
            max_replans_per_execution: default_max_replans_per_execution(),
            enable_atomspace: true,
            enable_pln: true,
            enable_tool_integration: true,
            pln_max_iterations: default_pln_max_iterations(),
            pln_min_confidence: default_pln_min_confidence(),
            executor: ExecutorOptions::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    /// Save to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize {
            message: e.to_string(),
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_tasks_per_plan == 0 {
            return Err(ConfigError::Invalid {
                message: "max_tasks_per_plan must be at least 1".into(),
            });
        }
        if self.max_parallel_tasks == 0 {
            return Err(ConfigError::Invalid {
                message: "max_parallel_tasks must be at least 1".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.pln_min_confidence) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "pln_min_confidence must lie in [0, 1], got {}",
                    self.pln_min_confidence
                ),
            });
        }
        Ok(())
    }
}
