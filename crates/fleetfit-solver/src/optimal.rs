//! Optimal strategy — exact bin packing with an idle-capacity objective.
//!
//! Each label group becomes one [`PackingModel`]: resources contribute their
//! idle cpu and idle memory (capacity minus what earlier groups already
//! placed), deployments their requests. The model is solved to proven
//! optimality. On success every chosen pair is applied through
//! `add_deployment`; when no assignment exists the whole group is reported
//! as unplaceable. There is no partial placement.

use std::str::FromStr;

use tracing::{debug, error, warn};

use fleetfit_core::{
    Config, ConfigError, DeploymentEntity, ResourceEntity, Setting, SettingValue,
};

use crate::error::{SolverError, SolverResult};
use crate::packing::{
    Bin, BranchAndBound, Item, Objective, PackingModel, SearchResult, Sense,
};
use crate::strategy::PlacementStrategy;

/// Optimization target of the optimal strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimalTarget {
    MaxIdleCpu,
    MaxIdleMemory,
    MinIdleCpu,
    MinIdleMemory,
    /// Minimize idle cpu and idle memory jointly.
    MinIdleResources,
    /// Maximize idle cpu and idle memory jointly.
    MaxIdleResources,
}

impl OptimalTarget {
    pub const ALL: [OptimalTarget; 6] = [
        OptimalTarget::MaxIdleCpu,
        OptimalTarget::MaxIdleMemory,
        OptimalTarget::MinIdleCpu,
        OptimalTarget::MinIdleMemory,
        OptimalTarget::MinIdleResources,
        OptimalTarget::MaxIdleResources,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OptimalTarget::MaxIdleCpu => "max_idle_cpu",
            OptimalTarget::MaxIdleMemory => "max_idle_memory",
            OptimalTarget::MinIdleCpu => "min_idle_cpu",
            OptimalTarget::MinIdleMemory => "min_idle_memory",
            OptimalTarget::MinIdleResources => "min_idle_resources",
            OptimalTarget::MaxIdleResources => "max_idle_resources",
        }
    }

    fn description(self) -> &'static str {
        match self {
            OptimalTarget::MaxIdleCpu => "Maximize idle cpu resources",
            OptimalTarget::MaxIdleMemory => "Maximize idle memory resources",
            OptimalTarget::MinIdleCpu => "Minimize idle cpu resources",
            OptimalTarget::MinIdleMemory => "Minimize idle memory resources",
            OptimalTarget::MinIdleResources => "Minimize idle resources (cpu + memory)",
            OptimalTarget::MaxIdleResources => "Maximize idle resources (cpu + memory)",
        }
    }

    pub fn objective(self) -> Objective {
        match self {
            OptimalTarget::MaxIdleCpu => Objective::new(Sense::Maximize, true, false),
            OptimalTarget::MaxIdleMemory => Objective::new(Sense::Maximize, false, true),
            OptimalTarget::MinIdleCpu => Objective::new(Sense::Minimize, true, false),
            OptimalTarget::MinIdleMemory => Objective::new(Sense::Minimize, false, true),
            OptimalTarget::MinIdleResources => Objective::new(Sense::Minimize, true, true),
            OptimalTarget::MaxIdleResources => Objective::new(Sense::Maximize, true, true),
        }
    }
}

impl FromStr for OptimalTarget {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ConfigError::InvalidValue {
                setting: Optimal::TARGET.to_string(),
                value: s.to_string(),
                allowed: Self::ALL.map(OptimalTarget::as_str).join(", "),
            })
    }
}

/// Exact bin-packing placement strategy.
#[derive(Debug, Clone)]
pub struct Optimal {
    config: Config,
    search: BranchAndBound,
}

impl Default for Optimal {
    fn default() -> Self {
        Self::new()
    }
}

impl Optimal {
    pub const NAME: &'static str = "optimal";
    pub const TARGET: &'static str = "target";

    pub fn new() -> Self {
        let options = OptimalTarget::ALL
            .into_iter()
            .map(|t| {
                if t == OptimalTarget::MaxIdleCpu {
                    SettingValue::default_option(t.as_str(), t.description())
                } else {
                    SettingValue::new(t.as_str(), t.description())
                }
            })
            .collect();

        Self {
            config: Config::new(vec![
                Setting::new(Self::TARGET, options)
                    .with_description("Idle capacity objective of the packing model"),
            ]),
            search: BranchAndBound::new(),
        }
    }

    /// The configured objective.
    pub fn target(&self) -> SolverResult<OptimalTarget> {
        Ok(self.config.value(Self::TARGET)?.value.parse()?)
    }

    /// Build the packing model for one group. Bins follow `resources`,
    /// items follow `deployments`.
    pub fn build_model(
        deployments: &[&DeploymentEntity],
        resources: &[&mut ResourceEntity],
        objective: Objective,
    ) -> PackingModel {
        let bins = resources
            .iter()
            .map(|r| Bin {
                cpu: r.idle_cpu().millis(),
                memory: r.idle_memory(),
            })
            .collect();
        let items = deployments
            .iter()
            .map(|d| Item {
                cpu: d.cpu.millis(),
                memory: d.memory,
            })
            .collect();
        PackingModel::new(bins, items, objective)
    }
}

impl PlacementStrategy for Optimal {
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
        if deployments.is_empty() {
            return Ok(());
        }

        let target = self.target()?;
        let model = Self::build_model(deployments, resources, target.objective());
        let outcome = self.search.solve(&model);
        debug!(
            target = target.as_str(),
            deployments = model.num_items(),
            resources = model.num_bins(),
            stats = %outcome.statistics(),
            "packing search finished"
        );

        match outcome.into_result() {
            SearchResult::Optimal(solution) => {
                for (i, resource) in resources.iter_mut().enumerate() {
                    for (j, deployment) in deployments.iter().enumerate() {
                        if !solution.is_assigned(i, j) {
                            continue;
                        }
                        if !resource.add_deployment(deployment) {
                            error!(
                                deployment = %deployment.name,
                                resource = %resource.name,
                                "resource rejected a placement the packing model allowed"
                            );
                            return Err(SolverError::ModelViolation {
                                deployment: deployment.name.clone(),
                                resource: resource.name.clone(),
                            });
                        }
                        debug!(
                            deployment = %deployment.name,
                            resource = %resource.name,
                            "placed deployment"
                        );
                    }
                }
                debug!(
                    idle_cpu = solution.idle_cpu,
                    idle_memory = solution.idle_memory,
                    objective = solution.objective,
                    "group packed"
                );
            }
            SearchResult::Infeasible => {
                warn!(
                    deployments = deployments.len(),
                    resources = resources.len(),
                    "no feasible packing for group, recording every deployment as unplaced"
                );
                placement_errors.extend(deployments.iter().map(|&d| d.clone()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetfit_core::MilliCpu;

    fn cores(c: f64) -> MilliCpu {
        MilliCpu::from_cores(c).unwrap()
    }

    fn run(
        optimal: &Optimal,
        deployments: &[DeploymentEntity],
        resources: &mut [ResourceEntity],
    ) -> Vec<DeploymentEntity> {
        let refs: Vec<&DeploymentEntity> = deployments.iter().collect();
        let mut pool: Vec<&mut ResourceEntity> = resources.iter_mut().collect();
        let mut errors = Vec::new();
        optimal.do_matching(&refs, &mut pool, &mut errors).unwrap();
        errors
    }

    #[test]
    fn default_target_is_max_idle_cpu() {
        assert_eq!(Optimal::new().target().unwrap(), OptimalTarget::MaxIdleCpu);
    }

    #[test]
    fn exposes_six_targets() {
        let optimal = Optimal::new();
        let setting = optimal.config().setting("target").unwrap();
        let values: Vec<&str> = setting.options().iter().map(|o| o.value.as_str()).collect();
        assert_eq!(
            values,
            vec![
                "max_idle_cpu",
                "max_idle_memory",
                "min_idle_cpu",
                "min_idle_memory",
                "min_idle_resources",
                "max_idle_resources",
            ]
        );
        assert_eq!(setting.options().iter().filter(|o| o.default).count(), 1);
    }

    #[test]
    fn every_target_parses_and_maps_to_an_objective() {
        for target in OptimalTarget::ALL {
            assert_eq!(target.as_str().parse::<OptimalTarget>().unwrap(), target);
        }
        let joint = OptimalTarget::MinIdleResources.objective();
        assert!(joint.idle_cpu && joint.idle_memory);
        assert_eq!(joint.sense, Sense::Minimize);
        assert!("max_idle_disk".parse::<OptimalTarget>().is_err());
    }

    #[test]
    fn places_whole_group() {
        let deployments = vec![
            DeploymentEntity::new("a", cores(1.0), 1024),
            DeploymentEntity::new("b", cores(2.0), 512),
            DeploymentEntity::new("c", cores(0.5), 256),
        ];
        let mut resources = vec![
            ResourceEntity::new("r1", cores(1.0), 1024),
            ResourceEntity::new("r2", cores(3.0), 1024),
            ResourceEntity::new("r3", cores(1.0), 1024),
        ];

        let errors = run(&Optimal::new(), &deployments, &mut resources);

        assert!(errors.is_empty());
        let idle: MilliCpu = resources.iter().map(ResourceEntity::idle_cpu).sum();
        assert_eq!(idle, cores(1.5));
    }

    #[test]
    fn model_uses_idle_capacity() {
        let mut resources = vec![ResourceEntity::new("r1", cores(2.0), 2048)];
        resources[0].add_deployment(&DeploymentEntity::new("earlier", cores(1.5), 1024));

        let next = DeploymentEntity::new("next", cores(1.0), 512);
        let pool: Vec<&mut ResourceEntity> = resources.iter_mut().collect();
        let model = Optimal::build_model(&[&next], &pool, OptimalTarget::MaxIdleCpu.objective());

        assert_eq!(model.bins()[0], Bin { cpu: 500, memory: 1024 });
        assert_eq!(model.items()[0], Item { cpu: 1000, memory: 512 });
    }

    #[test]
    fn infeasible_group_is_recorded_whole() {
        // Totals fit, packing does not: nothing from the group is placed.
        let deployments = vec![
            DeploymentEntity::new("a", cores(0.6), 10),
            DeploymentEntity::new("b", cores(0.6), 10),
            DeploymentEntity::new("c", cores(0.6), 10),
        ];
        let mut resources = vec![
            ResourceEntity::new("r1", cores(1.0), 1024),
            ResourceEntity::new("r2", cores(1.0), 1024),
        ];

        let errors = run(&Optimal::new(), &deployments, &mut resources);

        let names: Vec<&str> = errors.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(resources.iter().all(|r| r.deployments().is_empty()));
    }

    #[test]
    fn packs_what_greedy_cannot() {
        let deployments: Vec<DeploymentEntity> = [0.5, 0.4, 0.4, 0.3, 0.2, 0.2]
            .iter()
            .enumerate()
            .map(|(i, &c)| DeploymentEntity::new(format!("d{i}"), cores(c), 1))
            .collect();
        let mut resources = vec![
            ResourceEntity::new("r1", cores(1.0), 100),
            ResourceEntity::new("r2", cores(1.0), 100),
        ];

        let errors = run(&Optimal::new(), &deployments, &mut resources);

        assert!(errors.is_empty());
        assert!(resources.iter().all(|r| r.idle_cpu() == MilliCpu::ZERO));
    }

    #[test]
    fn empty_group_is_a_no_op() {
        let mut resources = vec![ResourceEntity::new("r1", cores(1.0), 1)];
        let errors = run(&Optimal::new(), &[], &mut resources);
        assert!(errors.is_empty());
        assert!(resources[0].deployments().is_empty());
    }
}
