//! Placement plan rendering for `fleetfit solve`.

use std::collections::BTreeMap;

use serde::Serialize;

use fleetfit_core::{MilliCpu, ResourceEntity};
use fleetfit_solver::{MatchSummary, PlacementStrategy, Solver};

#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub strategy: String,
    pub settings: BTreeMap<String, String>,
    pub resources: Vec<ResourcePlan>,
    pub unplaced: Vec<String>,
    pub summary: MatchSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourcePlan {
    pub name: String,
    pub cpu: MilliCpu,
    pub memory: u64,
    pub idle_cpu: MilliCpu,
    pub idle_memory: u64,
    pub deployments: Vec<String>,
}

impl ResourcePlan {
    fn from_resource(resource: &ResourceEntity) -> Self {
        Self {
            name: resource.name.clone(),
            cpu: resource.cpu(),
            memory: resource.memory(),
            idle_cpu: resource.idle_cpu(),
            idle_memory: resource.idle_memory(),
            deployments: resource
                .deployments()
                .iter()
                .map(|d| d.name.clone())
                .collect(),
        }
    }
}

impl PlanReport {
    /// Capture the outcome of a finished match.
    pub fn from_solver<S: PlacementStrategy>(solver: &Solver<S>) -> Self {
        let settings = solver
            .config()
            .settings()
            .filter_map(|s| s.value().map(|v| (s.name.clone(), v.value.clone())))
            .collect();

        Self {
            strategy: solver.strategy().name().to_string(),
            settings,
            resources: solver
                .resources()
                .iter()
                .map(ResourcePlan::from_resource)
                .collect(),
            unplaced: solver
                .placement_errors()
                .iter()
                .map(|d| d.name.clone())
                .collect(),
            summary: solver.summary(),
        }
    }
}

/// Human-readable plan, one block per resource.
pub fn format_report(report: &PlanReport) -> String {
    let mut out = String::new();

    let settings: Vec<String> = report
        .settings
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect();
    out.push_str(&format!("Strategy: {} ({})\n\n", report.strategy, settings.join(", ")));

    for resource in &report.resources {
        out.push_str(&format!(
            "{}  [{} cpu, {} MB]  idle {} cpu, {} MB\n",
            resource.name, resource.cpu, resource.memory, resource.idle_cpu, resource.idle_memory
        ));
        if resource.deployments.is_empty() {
            out.push_str("  (empty)\n");
        }
        for deployment in &resource.deployments {
            out.push_str(&format!("  - {deployment}\n"));
        }
    }

    if !report.unplaced.is_empty() {
        out.push_str("\nUnplaced:\n");
        for name in &report.unplaced {
            out.push_str(&format!("  ✗ {name}\n"));
        }
    }

    let summary = &report.summary;
    out.push_str(&format!(
        "\nPlaced {}, unplaced {}, idle {} cpu, {} MB",
        summary.placed, summary.unplaced, summary.idle_cpu, summary.idle_memory
    ));
    out
}
