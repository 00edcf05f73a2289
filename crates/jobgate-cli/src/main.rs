use std::path::PathBuf;

use clap::{Parser, Subcommand, builder::styling};
use clap_cargo::style;
use jobgate_server::{LogConfig, ServerConfig};
use tracing_subscriber::EnvFilter;

mod server;
mod validate;

#[derive(Parser)]
#[command(author, version, long_about = None)]
#[command(about = "Validate and dispatch manufacturing job submissions")]
#[command(styles = CLAP_STYLING)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

pub const CLAP_STYLING: styling::Styles = styling::Styles::styled()
    .header(style::HEADER)
    .usage(style::USAGE)
    .literal(style::LITERAL)
    .placeholder(style::PLACEHOLDER)
    .error(style::ERROR)
    .valid(style::VALID)
    .invalid(style::INVALID);

#[derive(Subcommand)]
enum Commands {
    /// Server commands
    Server {
        #[command(subcommand)]
        command: ServerCommands,
    },
    /// Run a submission through the validator against seed data
    Validate {
        /// Submission document, or an event envelope with a `body`
        submission: PathBuf,

        /// Seed data for workflows, inventory, jobs and instances
        #[arg(short, long)]
        seed: PathBuf,

        /// Server config supplying the scheduling policy
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the response envelope as JSON
        #[arg(long)]
        json: bool,
    },
    /// Parse a config file and its seed data, then print the result
    CheckConfig {
        path: PathBuf,
    },
}

#[derive(Subcommand)]
enum ServerCommands {
    /// Start the HTTP API
    Start {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<ServerConfig> {
    let config = match path {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&log.filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(log.ansi)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Server { command } => match command {
            ServerCommands::Start { config } => {
                let config = load_config(config.as_ref())?;
                init_tracing(&config.log);
                server::start_server(config).await?;
            }
        },
        Commands::Validate {
            submission,
            seed,
            config,
            json,
        } => {
            let config = load_config(config.as_ref())?;
            init_tracing(&LogConfig {
                filter: "warn".to_string(),
                ..config.log.clone()
            });

            let accepted = validate::validate_file(submission, seed, &config, *json).await?;
            if !accepted {
                std::process::exit(1);
            }
        }
        Commands::CheckConfig { path } => {
            validate::check_config(path)?;
        }
    }

    Ok(())
}
