//! fleetfit-core — shared types for the fleetfit placement solver.
//!
//! Holds the plain data the solver works on and the configuration model
//! every placement strategy exposes:
//!
//! - **`types`**: `DeploymentEntity` (workload), `ResourceEntity` (node),
//!   `Labels` and the `MilliCpu` quantity
//! - **`settings`**: `Setting` / `SettingValue` / `Config`, the enumerated
//!   option registry used to tune strategies
//! - **`error`**: configuration and quantity errors

pub mod error;
pub mod settings;
pub mod types;

pub use error::{ConfigError, ConfigResult};
pub use settings::{Config, Setting, SettingValue};
pub use types::*;
