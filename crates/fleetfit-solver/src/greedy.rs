//! Greedy strategy — sorted first-fit placement.
//!
//! Deployments and resources are both ordered by the configured attribute,
//! largest first. Each deployment goes to the first resource in that order
//! that still has room for it. Fast and deterministic, not optimal.

use std::str::FromStr;

use tracing::{debug, warn};

use fleetfit_core::{
    Config, ConfigError, DeploymentEntity, ResourceEntity, Setting, SettingValue,
};

use crate::error::SolverResult;
use crate::strategy::PlacementStrategy;

/// Attribute the greedy strategy sorts by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GreedyTarget {
    Cpu,
    Memory,
}

impl GreedyTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            GreedyTarget::Cpu => "cpu",
            GreedyTarget::Memory => "memory",
        }
    }

    fn deployment_key(self, deployment: &DeploymentEntity) -> u64 {
        match self {
            GreedyTarget::Cpu => deployment.cpu.millis(),
            GreedyTarget::Memory => deployment.memory,
        }
    }

    /// Resources sort on total capacity, not on what is left of it.
    fn resource_key(self, resource: &ResourceEntity) -> u64 {
        match self {
            GreedyTarget::Cpu => resource.cpu().millis(),
            GreedyTarget::Memory => resource.memory(),
        }
    }
}

impl FromStr for GreedyTarget {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(GreedyTarget::Cpu),
            "memory" => Ok(GreedyTarget::Memory),
            other => Err(ConfigError::InvalidValue {
                setting: Greedy::TARGET.to_string(),
                value: other.to_string(),
                allowed: "cpu, memory".to_string(),
            }),
        }
    }
}

/// Sorted first-fit placement strategy.
#[derive(Debug, Clone)]
pub struct Greedy {
    config: Config,
}

impl Default for Greedy {
    fn default() -> Self {
        Self::new()
    }
}

impl Greedy {
    pub const NAME: &'static str = "greedy";
    pub const TARGET: &'static str = "target";

    pub fn new() -> Self {
        Self {
            config: Config::new(vec![
                Setting::new(
                    Self::TARGET,
                    vec![
                        SettingValue::default_option(
                            "cpu",
                            "Sorts resources and workloads by cpu for greedy matching",
                        ),
                        SettingValue::new(
                            "memory",
                            "Sorts resources and workloads by memory for greedy matching",
                        ),
                    ],
                )
                .with_description("Attribute used to order workloads and resources"),
            ]),
        }
    }

    /// The configured sort attribute.
    pub fn target(&self) -> SolverResult<GreedyTarget> {
        Ok(self.config.value(Self::TARGET)?.value.parse()?)
    }
}

impl PlacementStrategy for Greedy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    fn do_matching(
        &self,
        deployments: &[&DeploymentEntity],
        resources: &mut [&mut ResourceEntity],
        placement_errors: &mut Vec<DeploymentEntity>,
    ) -> SolverResult<()> {
        let target = self.target()?;

        // Stable sorts: equal keys keep their input order.
        let mut ordered: Vec<&DeploymentEntity> = deployments.to_vec();
        ordered.sort_by(|a, b| target.deployment_key(b).cmp(&target.deployment_key(a)));
        resources.sort_by(|a, b| target.resource_key(b).cmp(&target.resource_key(a)));

        for deployment in ordered {
            let slot = resources
                .iter_mut()
                .position(|resource| resource.add_deployment(deployment));

            match slot {
                Some(index) => debug!(
                    deployment = %deployment.name,
                    resource = %resources[index].name,
                    "placed deployment"
                ),
                None => {
                    warn!(
                        deployment = %deployment.name,
                        cpu = %deployment.cpu,
                        memory = deployment.memory,
                        "no resource can host deployment"
                    );
                    placement_errors.push(deployment.clone());
                }
            }
        }

        Ok(())
    }
}
