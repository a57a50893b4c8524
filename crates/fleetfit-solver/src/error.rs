//! Solver error types.

use std::fmt;

use thiserror::Error;

use fleetfit_core::ConfigError;

/// Capacity dimension named in a feasibility error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Cpu,
    Memory,
}

impl Dimension {
    /// Unit the dimension's raw quantities are counted in.
    pub fn unit(self) -> &'static str {
        match self {
            Dimension::Cpu => "millicores",
            Dimension::Memory => "MB",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Cpu => f.write_str("cpu"),
            Dimension::Memory => f.write_str("memory"),
        }
    }
}

/// Errors that abort a solver operation.
///
/// Deployments that merely cannot be placed are not errors; they are
/// collected as placement errors on the solver.
#[derive(Debug, Error)]
pub enum SolverError {
    /// The largest single request exceeds the largest single capacity.
    /// Quantities are in millicores for cpu and MB for memory.
    #[error(
        "largest deployment {dimension} request ({request} {unit}) exceeds largest resource capacity ({capacity} {unit})",
        unit = dimension.unit()
    )]
    Infeasible {
        dimension: Dimension,
        request: u64,
        capacity: u64,
    },

    /// A placement chosen by the packing model was rejected by the
    /// resource's own fit check.
    #[error("model violation: resource {resource} rejected deployment {deployment}")]
    ModelViolation { deployment: String, resource: String },

    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type SolverResult<T> = Result<T, SolverError>;
