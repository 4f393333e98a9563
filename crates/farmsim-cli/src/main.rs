use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "farmsim",
    about = "farmsim — discrete-event simulation of an elastic server farm",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the experiment described by a farmsim.toml config.
    ///
    /// The run policy ("batch-means", "replication", or
    /// "autocorrelation") decides what each output row means: one batch,
    /// one replication, or one autocorrelation lag.
    Run {
        /// Path to the config file
        #[arg(short, long, default_value = "farmsim.toml")]
        config: String,
        /// CSV output path (overrides [output].path)
        #[arg(short, long)]
        output: Option<String>,
        /// Seed override for a one-off reproduction
        #[arg(short, long)]
        seed: Option<u64>,
        /// Summary format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Parse and validate a config file without running anything
    Check {
        #[arg(short, long, default_value = "farmsim.toml")]
        config: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("farmsim=info".parse()?)
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output, seed, format } => {
            commands::run::run(&config, output.as_deref(), seed, &format)
        }
        Commands::Check { config } => {
            commands::run::check(&config)
        }
    }
}
