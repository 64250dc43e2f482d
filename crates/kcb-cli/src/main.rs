use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "kcb")]
#[command(about = "Identity realm bootstrap CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Converge the realm described by the layered config (evaluate, then apply)
    Apply {
        /// Layered config paths in merge order (base -> environment -> realm)
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Overrides bootstrap.timeout_secs for the whole run
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Also print the apply report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Fail on config keys nothing reads (default: warn)
        #[arg(long, default_value_t = false)]
        strict: bool,
    },

    /// Print whether the realm would be provisioned, without changing it
    Status {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
    },

    /// Load and validate the blueprint offline
    Validate {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Fail on config keys nothing reads (default: warn)
        #[arg(long, default_value_t = false)]
        strict: bool,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Local admin credentials; absent file is fine.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Apply {
            config_paths,
            timeout_secs,
            json,
            strict,
        } => {
            commands::bootstrap::apply(&config_paths, timeout_secs, json, strict).await?;
        }

        Commands::Status { config_paths } => {
            commands::bootstrap::status(&config_paths).await?;
        }

        Commands::Validate {
            config_paths,
            strict,
        } => {
            commands::bootstrap::validate(&config_paths, strict)?;
        }

        Commands::ConfigHash { paths } => {
            let loaded = commands::load_config(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }
    }

    Ok(())
}

fn init_tracing() {
    // Logs go to stderr; stdout carries command output only.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
