//! fleetfit-solver — places deployments onto resources.
//!
//! A [`Solver`] runs the matching protocol: a feasibility pre-check, label
//! grouping with subset affinity, then one call into a
//! [`PlacementStrategy`] per group. Strategies only decide placement; the
//! solver owns grouping, ordering and bookkeeping.
//!
//! # Components
//!
//! - **`solver`**: the matching protocol and its accessors
//! - **`strategy`**: the per-group placement hook
//! - **`greedy`**: sorted first-fit
//! - **`optimal`**: exact packing with an idle-capacity objective
//! - **`packing`**: the packing model and its branch-and-bound search
//! - **`registry`**: strategy lookup by name
//!
//! ```text
//! Solver<S>
//!   ├── check_upper_bound  (largest request vs largest capacity)
//!   ├── group              (canonical label keys)
//!   └── match_labeled
//!       ├── S::do_matching(group, eligible resources)   per label group
//!       └── S::do_matching(unlabeled, all resources)
//! ```

pub mod error;
pub mod greedy;
pub mod optimal;
pub mod packing;
pub mod registry;
pub mod solver;
pub mod strategy;

pub use error::{Dimension, SolverError, SolverResult};
pub use greedy::{Greedy, GreedyTarget};
pub use optimal::{Optimal, OptimalTarget};
pub use registry::{DynSolver, StrategyDescription, StrategyFactory, StrategyRegistry};
pub use solver::{Assignment, GroupKey, Grouping, MatchSummary, Solver};
pub use strategy::PlacementStrategy;

/// Solver running the greedy strategy.
pub type GreedySolver = Solver<Greedy>;

/// Solver running the optimal strategy.
pub type OptimalSolver = Solver<Optimal>;
