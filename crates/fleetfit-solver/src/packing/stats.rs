//! Statistics collected while searching a packing model.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchStatistics {
    /// Search nodes visited: a bin opened, extended by one item, or closed.
    pub nodes_explored: u64,
    /// Choice points abandoned after every option was tried.
    pub backtracks: u64,
    /// Items skipped because they did not fit the bin being filled.
    pub prunings_infeasible: u64,
    /// Options skipped because an identical bin or item already covers them.
    pub prunings_symmetry: u64,
    /// Subtrees cut by the slack or Hall-type capacity bounds.
    pub prunings_capacity: u64,
    pub solutions_found: u64,
    pub max_depth: u64,
    #[serde(skip)]
    pub time_total: Duration,
}

impl SearchStatistics {
    #[inline]
    pub fn on_node_explored(&mut self) {
        self.nodes_explored = self.nodes_explored.saturating_add(1);
    }

    #[inline]
    pub fn on_backtrack(&mut self) {
        self.backtracks = self.backtracks.saturating_add(1);
    }

    #[inline]
    pub fn on_pruning_infeasible(&mut self) {
        self.prunings_infeasible = self.prunings_infeasible.saturating_add(1);
    }

    #[inline]
    pub fn on_pruning_symmetry(&mut self) {
        self.prunings_symmetry = self.prunings_symmetry.saturating_add(1);
    }

    #[inline]
    pub fn on_pruning_capacity(&mut self) {
        self.prunings_capacity = self.prunings_capacity.saturating_add(1);
    }

    #[inline]
    pub fn on_solution_found(&mut self) {
        self.solutions_found = self.solutions_found.saturating_add(1);
    }

    #[inline]
    pub fn on_depth_update(&mut self, depth: u64) {
        self.max_depth = self.max_depth.max(depth);
    }

    #[inline]
    pub fn set_total_time(&mut self, duration: Duration) {
        self.time_total = duration;
    }
}

impl fmt::Display for SearchStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "nodes={} backtracks={} pruned(infeasible={} symmetry={} capacity={}) solutions={} depth={} time={:?}",
            self.nodes_explored,
            self.backtracks,
            self.prunings_infeasible,
            self.prunings_symmetry,
            self.prunings_capacity,
            self.solutions_found,
            self.max_depth,
            self.time_total,
        )
    }
}
