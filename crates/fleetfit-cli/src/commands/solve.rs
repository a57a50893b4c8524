use std::path::Path;

use anyhow::Context;
use tracing::info;

use fleetfit_solver::StrategyRegistry;

use crate::report::{PlanReport, format_report};
use crate::snapshot::Snapshot;

pub fn solve(
    file: &str,
    strategy: Option<&str>,
    settings: &[(String, String)],
    format: &str,
) -> anyhow::Result<()> {
    let mut snapshot = Snapshot::from_file(Path::new(file))?;
    snapshot.override_with(strategy, settings);
    info!(
        file,
        strategy = %snapshot.solver.strategy,
        resources = snapshot.resources.len(),
        deployments = snapshot.deployments.len(),
        "snapshot loaded"
    );

    let registry = StrategyRegistry::default();
    let mut solver = snapshot.into_solver(&registry)?;
    solver.r#match().context("no placement possible")?;

    let report = PlanReport::from_solver(&solver);
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            println!("{}", format_report(&report));
        }
    }

    Ok(())
}
