use clap::{Parser, Subcommand};

mod commands;
mod report;
mod snapshot;

#[derive(Parser)]
#[command(
    name = "fleetfit",
    about = "fleetfit — place deployments onto capacity-bounded resources",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a placement plan for a snapshot file.
    ///
    /// The snapshot lists resources and deployments in TOML and may name
    /// the strategy and its settings under [solver]. Flags override the
    /// file.
    Solve {
        /// Path to the snapshot file
        #[arg(short, long)]
        file: String,
        /// Strategy to run (greedy, optimal). Overrides [solver].strategy.
        #[arg(short, long)]
        strategy: Option<String>,
        /// Strategy setting as key=value. Repeatable.
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        settings: Vec<(String, String)>,
        /// Output format: text or json
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },
    /// List the available strategies and their settings
    Strategies {
        /// Output format: text or json
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fleetfit=info".parse()?)
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Solve {
            file,
            strategy,
            settings,
            format,
        } => commands::solve::solve(&file, strategy.as_deref(), &settings, &format),
        Commands::Strategies { format } => commands::strategies::list(&format),
    }
}
