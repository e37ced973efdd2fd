//! float - organize prompt pods from the terminal
//!
//! A local-first store of pods, identities, files and rituals

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use float::commands::{
    self, FileOperation, IdentityOperation, PodOperation, RitualOperation,
};
use float::config::{load_config, FloatPaths};
use float::store::StoreError;

#[derive(Parser)]
#[command(name = "float")]
#[command(author, version, about = "Organize prompt pods, identities, files and rituals")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize float (first-time setup)
    Init,

    /// Pod operations
    Pod {
        #[command(subcommand)]
        operation: PodOperation,
    },

    /// Set the active pod
    Use {
        /// Pod ID
        #[arg(required_unless_present = "clear")]
        id: Option<String>,

        /// Clear the active pod instead
        #[arg(long, conflicts_with = "id")]
        clear: bool,
    },

    /// Identity operations
    Identity {
        #[command(subcommand)]
        operation: IdentityOperation,
    },

    /// File operations on the active pod
    File {
        #[command(subcommand)]
        operation: FileOperation,
    },

    /// Ritual operations on the active pod
    Ritual {
        #[command(subcommand)]
        operation: RitualOperation,
    },
}

fn init_tracing(paths: &FloatPaths) {
    // Config errors surface later through the command itself
    let fallback = load_config(paths)
        .map(|c| c.log_level)
        .unwrap_or_else(|_| "warn".to_string());

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let paths = FloatPaths::new()?;
    init_tracing(&paths);

    if let Commands::Init = cli.command {
        return commands::init(&paths);
    }

    let (mut store, config) = commands::open_store(&paths)?;

    let outcome = match cli.command {
        Commands::Init => Ok(()),
        Commands::Pod { operation } => commands::pod_command(&mut store, &config, operation),
        Commands::Use { id, clear } => {
            let id = if clear { None } else { id };
            commands::use_pod(&mut store, id.as_deref())
        }
        Commands::Identity { operation } => commands::identity_command(&mut store, operation),
        Commands::File { operation } => commands::file_command(&mut store, &config, operation),
        Commands::Ritual { operation } => commands::ritual_command(&mut store, operation),
    };

    let mut reported = false;
    for notice in store.drain_notices() {
        if notice.is_error() {
            reported = true;
            eprintln!("{}", notice);
        } else {
            println!("{}", notice);
        }
    }

    if let Err(e) = outcome {
        // Already printed as a notice
        if reported && e.downcast_ref::<StoreError>().is_some() {
            std::process::exit(1);
        }
        return Err(e);
    }

    Ok(())
}
