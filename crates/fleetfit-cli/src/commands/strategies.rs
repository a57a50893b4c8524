use fleetfit_solver::{StrategyDescription, StrategyRegistry};

pub fn list(format: &str) -> anyhow::Result<()> {
    let descriptions = StrategyRegistry::default().describe();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&descriptions)?);
        }
        _ => {
            println!("{}", format_descriptions(&descriptions));
        }
    }

    Ok(())
}

fn format_descriptions(descriptions: &[StrategyDescription]) -> String {
    let mut lines = Vec::new();
    for description in descriptions {
        lines.push(description.name.clone());
        for setting in &description.settings {
            lines.push(format!("  {}", setting.name));
            for option in setting.options() {
                let marker = if option.default { " (default)" } else { "" };
                lines.push(format!(
                    "    {:<20}{}{}",
                    option.value, option.description, marker
                ));
            }
        }
    }
    lines.join("\n")
}
