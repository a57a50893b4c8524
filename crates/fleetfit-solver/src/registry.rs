//! Strategy registry — name → factory table for placement strategies.
//!
//! Callers that pick a strategy by name (a CLI flag, a config file) go
//! through the registry instead of naming concrete types. Additional
//! strategies can be registered at startup.

use std::collections::BTreeMap;

use serde::Serialize;

use fleetfit_core::{DeploymentEntity, ResourceEntity, Setting};

use crate::error::{SolverError, SolverResult};
use crate::greedy::Greedy;
use crate::optimal::Optimal;
use crate::solver::Solver;
use crate::strategy::PlacementStrategy;

/// Builds a fresh strategy with default settings.
pub type StrategyFactory = fn() -> Box<dyn PlacementStrategy>;

/// A solver over a strategy chosen at runtime.
pub type DynSolver = Solver<Box<dyn PlacementStrategy>>;

/// Name and settings of a registered strategy.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyDescription {
    pub name: String,
    pub settings: Vec<Setting>,
}

#[derive(Clone)]
pub struct StrategyRegistry {
    factories: BTreeMap<String, StrategyFactory>,
}

impl Default for StrategyRegistry {
    /// Registry holding the built-in `greedy` and `optimal` strategies.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Greedy::NAME, || Box::new(Greedy::new()));
        registry.register(Optimal::NAME, || Box::new(Optimal::new()));
        registry
    }
}

impl StrategyRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Register a factory, replacing any previous one with the same name.
    pub fn register(&mut self, name: impl Into<String>, factory: StrategyFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn create(&self, name: &str) -> SolverResult<Box<dyn PlacementStrategy>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| SolverError::UnknownStrategy(name.to_string()))
    }

    /// Build a solver over the named strategy.
    pub fn solver(
        &self,
        name: &str,
        deployments: Vec<DeploymentEntity>,
        resources: Vec<ResourceEntity>,
    ) -> SolverResult<DynSolver> {
        Ok(Solver::new(deployments, resources, self.create(name)?))
    }

    /// Every registered strategy with its default settings.
    pub fn describe(&self) -> Vec<StrategyDescription> {
        self.factories
            .iter()
            .map(|(name, factory)| StrategyDescription {
                name: name.clone(),
                settings: factory().config().settings().cloned().collect(),
            })
            .collect()
    }
}
