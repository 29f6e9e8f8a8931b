mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "lex")]
#[command(about = "LEXArchive mirror operator CLI", long_about = None)]
struct Cli {
    /// Layered config paths in merge order. Defaults to the LEX_CONFIG list.
    #[arg(long = "config", global = true)]
    config_paths: Vec<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> local...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Local mirror commands
    Mirror {
        #[command(subcommand)]
        cmd: MirrorCmd,
    },

    /// Run one reconciliation cycle against the configured archive
    Sync,

    /// Subscriber registry commands
    Subs {
        #[command(subcommand)]
        cmd: SubsCmd,
    },
}

#[derive(Subcommand)]
enum MirrorCmd {
    /// Row counts of both tables and the stored watermark
    Status,
}

#[derive(Subcommand)]
enum SubsCmd {
    /// Print every well-formed registry entry
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = lex_config::load_layered_yaml(&path_refs)?;
            commands::warn_unused_keys(&loaded)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Mirror { cmd } => {
            let (_, cfg) = commands::load_settings(&cli.config_paths)?;
            match cmd {
                MirrorCmd::Status => commands::mirror::status(&cfg).await?,
            }
        }

        Commands::Sync => {
            let (loaded, cfg) = commands::load_settings(&cli.config_paths)?;
            eprintln!("config_hash={}", loaded.config_hash);
            commands::mirror::sync_once(&cfg).await?;
        }

        Commands::Subs { cmd } => {
            let (_, cfg) = commands::load_settings(&cli.config_paths)?;
            match cmd {
                SubsCmd::List => commands::subs::list(&cfg).await?,
            }
        }
    }

    Ok(())
}
