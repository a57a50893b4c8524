//! Exact two-dimensional bin packing.
//!
//! The optimal strategy translates one label group into a [`PackingModel`]:
//! bins are resources with their idle cpu (millicores) and idle memory,
//! items are deployments with their requests. The model asks for an
//! assignment of every item to exactly one bin within both capacities, and
//! optimizes the idle capacity left over according to an [`Objective`].
//!
//! [`BranchAndBound`] solves the model to proven optimality or proves it
//! infeasible. It is deterministic: the same model always yields the same
//! assignment.

pub mod model;
pub mod search;
pub mod stats;

pub use model::{Bin, Item, Objective, PackingModel, Sense, Solution};
pub use search::{BranchAndBound, SearchOutcome, SearchResult};
pub use stats::SearchStatistics;
