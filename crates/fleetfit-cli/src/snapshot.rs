//! Snapshot files — the TOML input of `fleetfit solve`.
//!
//! ```toml
//! [solver]
//! strategy = "optimal"
//! [solver.settings]
//! target = "max_idle_cpu"
//!
//! [[resources]]
//! name = "node-1"
//! cpu = 3.0
//! memory = 1024
//!
//! [[deployments]]
//! name = "api"
//! cpu = 0.5
//! memory = 256
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use fleetfit_core::{DeploymentEntity, ResourceEntity};
use fleetfit_solver::{DynSolver, StrategyRegistry};

const DEFAULT_STRATEGY: &str = "greedy";

#[derive(Debug, Clone, Deserialize)]
pub struct SolverSection {
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

impl Default for SolverSection {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            settings: BTreeMap::new(),
        }
    }
}

fn default_strategy() -> String {
    DEFAULT_STRATEGY.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub solver: SolverSection,
    #[serde(default)]
    pub resources: Vec<ResourceEntity>,
    #[serde(default)]
    pub deployments: Vec<DeploymentEntity>,
}

impl Snapshot {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid snapshot {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply command-line overrides on top of the `[solver]` section.
    pub fn override_with(&mut self, strategy: Option<&str>, settings: &[(String, String)]) {
        if let Some(strategy) = strategy {
            self.solver.strategy = strategy.to_string();
        }
        for (key, value) in settings {
            self.solver.settings.insert(key.clone(), value.clone());
        }
    }

    /// Build a solver over the snapshot's entities with its settings applied.
    pub fn into_solver(self, registry: &StrategyRegistry) -> anyhow::Result<DynSolver> {
        let Snapshot {
            solver: section,
            resources,
            deployments,
        } = self;

        let mut solver = registry
            .solver(&section.strategy, deployments, resources)
            .with_context(|| {
                let known: Vec<&str> = registry.names().collect();
                format!("available strategies: {}", known.join(", "))
            })?;

        for (key, value) in &section.settings {
            solver
                .set_config_value(key, value)
                .with_context(|| format!("cannot apply setting {key}={value}"))?;
        }

        Ok(solver)
    }
}
