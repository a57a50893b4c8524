//! The placement hook every strategy implements.

use fleetfit_core::{Config, DeploymentEntity, ResourceEntity};

use crate::error::SolverResult;

/// Places one batch of deployments onto a pool of eligible resources.
///
/// The [`Solver`](crate::Solver) calls this once per label group and once
/// for the unlabeled pool. Implementations mutate the resources through
/// [`ResourceEntity::add_deployment`] and push every deployment they could
/// not place onto `placement_errors`. An unschedulable batch is never an
/// error; `Err` is reserved for internal defects.
pub trait PlacementStrategy {
    /// Registry name of the strategy.
    fn name(&self) -> &str;

    fn config(&self) -> &Config;

    fn config_mut(&mut self) -> &mut Config;

    fn do_matching(
        &self,
        deployments: &[&DeploymentEntity],
        resources: &mut [&mut ResourceEntity],
        placement_errors: &mut Vec<DeploymentEntity>,
    ) -> SolverResult<()>;
}

impl<S: PlacementStrategy + ?Sized> PlacementStrategy for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn config(&self) -> &Config {
        (**self).config()
    }

    fn config_mut(&mut self) -> &mut Config {
        (**self).config_mut()
    }

    fn do_matching(
        &self,
        deployments: &[&DeploymentEntity],
        resources: &mut [&mut ResourceEntity],
        placement_errors: &mut Vec<DeploymentEntity>,
    ) -> SolverResult<()> {
        (**self).do_matching(deployments, resources, placement_errors)
    }
}
