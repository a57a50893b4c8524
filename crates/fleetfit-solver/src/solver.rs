//! Solver — the matching protocol shared by every placement strategy.
//!
//! The `Solver` owns the deployment and resource lists and drives a run:
//! 1. Feasibility pre-check (largest request vs largest capacity)
//! 2. Grouping of deployments by label set
//! 3. One strategy call per label group against the resources whose labels
//!    are a superset of the group's, in ascending group-key order
//! 4. One final strategy call for unlabeled deployments against all resources
//!
//! Groups run sequentially on the same resource list, so every group sees
//! the capacity consumed by the groups before it.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use fleetfit_core::{
    Config, DeploymentEntity, Labeled, MilliCpu, ResourceEntity, Setting, SettingValue,
};

use crate::error::{Dimension, SolverError, SolverResult};
use crate::strategy::PlacementStrategy;

/// Key of a label group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupKey {
    /// Canonical serialization of the group's label set.
    Labeled(String),
    Unlabeled,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Labeled(key) => f.write_str(key),
            GroupKey::Unlabeled => f.write_str("unlabeled"),
        }
    }
}

/// Group key → indices into the grouped entity list, in input order.
pub type Grouping = BTreeMap<GroupKey, Vec<usize>>;

/// Name-level view of one resource's assignments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub resource: String,
    pub deployments: Vec<String>,
}

/// Totals over the current matching state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    pub placed: usize,
    pub unplaced: usize,
    pub idle_cpu: MilliCpu,
    pub idle_memory: u64,
}

/// Matches deployments onto resources using the strategy `S`.
pub struct Solver<S> {
    deployment_entities: Vec<DeploymentEntity>,
    resources: Vec<ResourceEntity>,
    strategy: S,
    placement_errors: Vec<DeploymentEntity>,
    grouped_deployments: Option<Grouping>,
    grouped_resources: Option<Grouping>,
}

impl<S: PlacementStrategy> Solver<S> {
    /// Create a solver over the given entities. The lists are taken as-is.
    pub fn new(
        deployment_entities: Vec<DeploymentEntity>,
        resources: Vec<ResourceEntity>,
        strategy: S,
    ) -> Self {
        Self {
            deployment_entities,
            resources,
            strategy,
            placement_errors: Vec::new(),
            grouped_deployments: None,
            grouped_resources: None,
        }
    }

    /// Run the feasibility pre-check, then the label-grouped matching.
    ///
    /// On a feasibility failure nothing is placed. Deployments that could
    /// not be placed are available from [`placement_errors`](Self::placement_errors)
    /// afterwards.
    pub fn r#match(&mut self) -> SolverResult<()> {
        Self::check_upper_bound(&self.deployment_entities, &self.resources)?;
        self.match_labeled()?;

        let summary = self.summary();
        info!(
            strategy = self.strategy.name(),
            placed = summary.placed,
            unplaced = summary.unplaced,
            idle_cpu = %summary.idle_cpu,
            idle_memory = summary.idle_memory,
            "matching complete"
        );
        Ok(())
    }

    /// Reject inputs where no resource could ever host the single largest
    /// request on either dimension.
    ///
    /// Request and capacity maxima are taken independently per dimension.
    /// Passing this check does not mean every deployment can be placed.
    pub fn check_upper_bound(
        entities: &[DeploymentEntity],
        resources: &[ResourceEntity],
    ) -> SolverResult<()> {
        let max_memory_request = entities.iter().map(|e| e.memory).max().unwrap_or(0);
        let max_cpu_request = entities
            .iter()
            .map(|e| e.cpu)
            .max()
            .unwrap_or(MilliCpu::ZERO);

        let max_memory_offer = resources.iter().map(ResourceEntity::memory).max().unwrap_or(0);
        let max_cpu_offer = resources
            .iter()
            .map(ResourceEntity::cpu)
            .max()
            .unwrap_or(MilliCpu::ZERO);

        if max_memory_offer < max_memory_request {
            warn!(
                request = max_memory_request,
                capacity = max_memory_offer,
                "largest memory request exceeds every resource"
            );
            return Err(SolverError::Infeasible {
                dimension: Dimension::Memory,
                request: max_memory_request,
                capacity: max_memory_offer,
            });
        }

        if max_cpu_offer < max_cpu_request {
            warn!(
                request = %max_cpu_request,
                capacity = %max_cpu_offer,
                "largest cpu request exceeds every resource"
            );
            return Err(SolverError::Infeasible {
                dimension: Dimension::Cpu,
                request: max_cpu_request.millis(),
                capacity: max_cpu_offer.millis(),
            });
        }

        Ok(())
    }

    /// Partition entities by label set.
    ///
    /// Unlabeled entities land under [`GroupKey::Unlabeled`]; labeled ones
    /// under the canonical key of their labels, so identical label sets
    /// share a group whatever their insertion order.
    pub fn group<T: Labeled>(entities: &[T]) -> Grouping {
        let mut grouping = Grouping::new();
        for (index, entity) in entities.iter().enumerate() {
            let key = match entity.label_set() {
                Some(labels) => GroupKey::Labeled(labels.group_key()),
                None => GroupKey::Unlabeled,
            };
            grouping.entry(key).or_default().push(index);
        }
        grouping
    }

    /// Run the strategy once per label group, then once for the unlabeled
    /// pool against every resource.
    pub fn match_labeled(&mut self) -> SolverResult<()> {
        let Self {
            deployment_entities,
            resources,
            strategy,
            placement_errors,
            grouped_deployments,
            grouped_resources,
        } = self;

        let mut deployment_groups = Self::group(deployment_entities.as_slice());
        let mut resource_groups = Self::group(resources.as_slice());

        let unlabeled = deployment_groups
            .remove(&GroupKey::Unlabeled)
            .unwrap_or_default();
        resource_groups.remove(&GroupKey::Unlabeled);

        for (key, members) in &deployment_groups {
            let group: Vec<&DeploymentEntity> =
                members.iter().map(|&i| &deployment_entities[i]).collect();
            // Every member shares the same labels.
            let Some(labels) = group.first().and_then(|d| d.label_set()) else {
                continue;
            };

            let mut eligible: Vec<&mut ResourceEntity> = resources
                .iter_mut()
                .filter(|r| r.satisfies(labels))
                .collect();

            debug!(
                group = %key,
                deployments = group.len(),
                eligible = eligible.len(),
                "matching label group"
            );
            strategy.do_matching(&group, &mut eligible, placement_errors)?;
        }

        let group: Vec<&DeploymentEntity> =
            unlabeled.iter().map(|&i| &deployment_entities[i]).collect();
        let mut all: Vec<&mut ResourceEntity> = resources.iter_mut().collect();
        debug!(
            deployments = group.len(),
            eligible = all.len(),
            "matching unlabeled pool"
        );
        strategy.do_matching(&group, &mut all, placement_errors)?;

        *grouped_deployments = Some(deployment_groups);
        *grouped_resources = Some(resource_groups);
        Ok(())
    }

    /// Clear every assignment and all bookkeeping so the solver can run
    /// again, e.g. after the entity lists were swapped.
    pub fn reset_matching(&mut self) {
        for resource in &mut self.resources {
            resource.clear_deployments();
        }
        self.placement_errors.clear();
        self.grouped_deployments = None;
        self.grouped_resources = None;
    }

    pub fn resources(&self) -> &[ResourceEntity] {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut [ResourceEntity] {
        &mut self.resources
    }

    pub fn set_resources(&mut self, resources: Vec<ResourceEntity>) {
        self.resources = resources;
    }

    pub fn deployment_entities(&self) -> &[DeploymentEntity] {
        &self.deployment_entities
    }

    pub fn set_deployment_entities(&mut self, deployments: Vec<DeploymentEntity>) {
        self.deployment_entities = deployments;
    }

    /// Deployments that could not be placed in the last run.
    pub fn placement_errors(&self) -> &[DeploymentEntity] {
        &self.placement_errors
    }

    /// Labeled deployment groups of the last run (unlabeled bucket removed).
    pub fn grouped_deployments(&self) -> Option<&Grouping> {
        self.grouped_deployments.as_ref()
    }

    /// Labeled resource groups of the last run (unlabeled bucket removed).
    pub fn grouped_resources(&self) -> Option<&Grouping> {
        self.grouped_resources.as_ref()
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn config(&self) -> &Config {
        self.strategy.config()
    }

    pub fn config_value(&self, name: &str) -> SolverResult<&SettingValue> {
        Ok(self.strategy.config().value(name)?)
    }

    /// Select an option of one of the strategy's settings.
    pub fn set_config_value(&mut self, name: &str, value: &str) -> SolverResult<()> {
        self.strategy.config_mut().set_value(name, value)?;
        debug!(setting = name, value, "solver setting changed");
        Ok(())
    }

    /// Add or replace a whole setting.
    pub fn set_setting(&mut self, setting: Setting) {
        self.strategy.config_mut().add_setting(setting);
    }

    /// Resource name → assigned deployment names, in resource order.
    pub fn assignment(&self) -> Vec<Assignment> {
        self.resources
            .iter()
            .map(|r| Assignment {
                resource: r.name.clone(),
                deployments: r.deployments().iter().map(|d| d.name.clone()).collect(),
            })
            .collect()
    }

    pub fn summary(&self) -> MatchSummary {
        MatchSummary {
            placed: self.resources.iter().map(|r| r.deployments().len()).sum(),
            unplaced: self.placement_errors.len(),
            idle_cpu: self.resources.iter().map(ResourceEntity::idle_cpu).sum(),
            idle_memory: self.resources.iter().map(ResourceEntity::idle_memory).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetfit_core::Labels;

    /// Records every hook call and places nothing.
    struct Recorder {
        config: Config,
        calls: std::cell::RefCell<Vec<(Vec<String>, Vec<String>)>>,
    }

    impl Recorder {
        fn new() -> Self {
            Self {
                config: Config::default(),
                calls: Default::default(),
            }
        }
    }

    impl PlacementStrategy for Recorder {
        fn name(&self) -> &str {
            "recorder"
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
            _placement_errors: &mut Vec<DeploymentEntity>,
        ) -> SolverResult<()> {
            self.calls.borrow_mut().push((
                deployments.iter().map(|d| d.name.clone()).collect(),
                resources.iter().map(|r| r.name.clone()).collect(),
            ));
            Ok(())
        }
    }

    fn cpu(millis: u64) -> MilliCpu {
        MilliCpu::from_millis(millis)
    }

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs.iter().copied().collect()
    }

    #[test]
    fn upper_bound_rejects_cpu() {
        let deployments = vec![DeploymentEntity::new("d", cpu(2000), 1024)];
        let resources = vec![ResourceEntity::new("n", cpu(1000), 2048)];

        let err = Solver::<Recorder>::check_upper_bound(&deployments, &resources).unwrap_err();
        assert!(matches!(
            err,
            SolverError::Infeasible {
                dimension: Dimension::Cpu,
                request: 2000,
                capacity: 1000,
            }
        ));
        assert_eq!(
            err.to_string(),
            "largest deployment cpu request (2000 millicores) exceeds largest resource capacity (1000 millicores)"
        );
    }

    #[test]
    fn upper_bound_rejects_memory_first() {
        let deployments = vec![DeploymentEntity::new("d", cpu(2000), 2048)];
        let resources = vec![ResourceEntity::new("n", cpu(1000), 1024)];

        let err = Solver::<Recorder>::check_upper_bound(&deployments, &resources).unwrap_err();
        assert!(matches!(
            err,
            SolverError::Infeasible {
                dimension: Dimension::Memory,
                request: 2048,
                capacity: 1024,
            }
        ));
        assert_eq!(
            err.to_string(),
            "largest deployment memory request (2048 MB) exceeds largest resource capacity (1024 MB)"
        );
    }

    #[test]
    fn upper_bound_takes_dimensions_independently() {
        // No single node has both 3 cores and 3000 MB, but each maximum exists.
        let deployments = vec![DeploymentEntity::new("d", cpu(3000), 3000)];
        let resources = vec![
            ResourceEntity::new("fast", cpu(4000), 1024),
            ResourceEntity::new("big", cpu(1000), 4096),
        ];
        assert!(Solver::<Recorder>::check_upper_bound(&deployments, &resources).is_ok());
    }

    #[test]
    fn upper_bound_accepts_empty_deployments() {
        assert!(Solver::<Recorder>::check_upper_bound(&[], &[]).is_ok());
    }

    #[test]
    fn group_buckets_by_label_set() {
        let mut reversed = Labels::new();
        reversed.insert("zone", "a");
        reversed.insert("node", "3");

        let deployments = vec![
            DeploymentEntity::new("plain", cpu(1), 1),
            DeploymentEntity::new("a", cpu(1), 1).with_labels(labels(&[("node", "3"), ("zone", "a")])),
            DeploymentEntity::new("b", cpu(1), 1).with_labels(reversed),
            DeploymentEntity::new("c", cpu(1), 1).with_labels(labels(&[("node", "1")])),
            DeploymentEntity::new("empty", cpu(1), 1).with_labels(Labels::new()),
        ];

        let grouping = Solver::<Recorder>::group(&deployments);

        assert_eq!(grouping.len(), 3);
        assert_eq!(grouping[&GroupKey::Unlabeled], vec![0, 4]);
        let key = GroupKey::Labeled(labels(&[("node", "3"), ("zone", "a")]).group_key());
        assert_eq!(grouping[&key], vec![1, 2]);
    }

    #[test]
    fn match_labeled_dispatches_groups_in_key_order_then_unlabeled() {
        let deployments = vec![
            DeploymentEntity::new("free", cpu(1), 1),
            DeploymentEntity::new("zone-b", cpu(1), 1).with_labels(labels(&[("zone", "b")])),
            DeploymentEntity::new("zone-a", cpu(1), 1).with_labels(labels(&[("zone", "a")])),
        ];
        let resources = vec![
            ResourceEntity::new("bare", cpu(1000), 100),
            ResourceEntity::new("a-gpu", cpu(1000), 100)
                .with_labels(labels(&[("zone", "a"), ("gpu", "true")])),
            ResourceEntity::new("b", cpu(1000), 100).with_labels(labels(&[("zone", "b")])),
        ];

        let mut solver = Solver::new(deployments, resources, Recorder::new());
        solver.r#match().unwrap();

        let calls = solver.strategy().calls.borrow();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], (vec!["zone-a".to_string()], vec!["a-gpu".to_string()]));
        assert_eq!(calls[1], (vec!["zone-b".to_string()], vec!["b".to_string()]));
        assert_eq!(
            calls[2],
            (
                vec!["free".to_string()],
                vec!["bare".to_string(), "a-gpu".to_string(), "b".to_string()]
            )
        );
    }

    #[test]
    fn unlabeled_pool_is_matched_even_when_empty() {
        let deployments = vec![
            DeploymentEntity::new("x", cpu(1), 1).with_labels(labels(&[("k", "v")])),
        ];
        let resources = vec![ResourceEntity::new("n", cpu(1000), 100)];

        let mut solver = Solver::new(deployments, resources, Recorder::new());
        solver.r#match().unwrap();

        let calls = solver.strategy().calls.borrow();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].1.is_empty(), "no resource carries k=v");
        assert!(calls[1].0.is_empty());
    }

    #[test]
    fn bookkeeping_drops_unlabeled_bucket_and_resets() {
        let deployments = vec![
            DeploymentEntity::new("free", cpu(1), 1),
            DeploymentEntity::new("tagged", cpu(1), 1).with_labels(labels(&[("k", "v")])),
        ];
        let resources = vec![
            ResourceEntity::new("bare", cpu(1000), 100),
            ResourceEntity::new("tagged", cpu(1000), 100).with_labels(labels(&[("k", "v")])),
        ];

        let mut solver = Solver::new(deployments, resources, Recorder::new());
        solver.r#match().unwrap();

        let grouped = solver.grouped_deployments().unwrap();
        assert_eq!(grouped.len(), 1);
        assert!(!grouped.contains_key(&GroupKey::Unlabeled));
        assert_eq!(solver.grouped_resources().unwrap().len(), 1);

        solver.reset_matching();
        assert!(solver.grouped_deployments().is_none());
        assert!(solver.grouped_resources().is_none());
        assert!(solver.placement_errors().is_empty());
    }

    #[test]
    fn infeasible_input_never_reaches_strategy() {
        let deployments = vec![DeploymentEntity::new("d", cpu(2000), 1)];
        let resources = vec![ResourceEntity::new("n", cpu(1000), 1)];

        let mut solver = Solver::new(deployments, resources, Recorder::new());
        assert!(solver.r#match().is_err());
        assert!(solver.strategy().calls.borrow().is_empty());
        assert!(solver.grouped_deployments().is_none());
    }
}
