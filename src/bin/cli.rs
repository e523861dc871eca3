//! Forum snapshot CLI
//!
//! Local execution entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use forum_snapshot::{
    error::{AppError, Result},
    models::Config,
    pipeline,
    storage::{LocalStorage, Snapshot},
};

/// forum-snapshot - Discourse community activity acquisition
#[derive(Parser, Debug)]
#[command(
    name = "forum-snapshot",
    version,
    about = "Acquire raw activity snapshots of Discourse communities"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Acquire a full snapshot of one community
    Acquire {
        /// Community name as listed in the configuration
        community: String,

        /// Output directory (default: paths.output_dir from config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Format a stored snapshot into per-user activity records
    Format {
        community: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate the configuration file
    Validate,

    /// Show the stored snapshot of one community
    Info {
        community: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);
    log::info!("Loaded configuration from {}", cli.config.display());

    let storage_for = |output: Option<PathBuf>| {
        LocalStorage::new(output.unwrap_or_else(|| PathBuf::from(&config.paths.output_dir)))
    };

    match cli.command {
        Command::Acquire { community, output } => {
            config.validate()?;
            let community = config.community(&community)?;
            let storage = storage_for(output);

            let (dataset, stats) = match pipeline::run_acquire(&config, community).await {
                Ok(result) => result,
                Err(e) if e.is_fetch_failure() => {
                    log::error!("Acquisition of {} aborted by the forum API: {}", community.name, e);
                    return Err(e);
                }
                Err(e) => {
                    log::error!("Acquisition of {} failed: {}", community.name, e);
                    return Err(e);
                }
            };
            storage.write_snapshot(&Snapshot { stats, dataset }).await?;

            log::info!("Acquisition complete!");
        }

        Command::Format { community, output } => {
            let base_url = &config.community(&community)?.base_url;
            let storage = storage_for(output);

            let Some(snapshot) = storage.load_snapshot(&community).await? else {
                log::error!("No snapshot found for {community}. Run 'acquire' first.");
                return Err(AppError::config(format!("No snapshot for {community}")));
            };
            snapshot.verify()?;

            let activity = pipeline::format_activity(&snapshot.dataset, base_url)?;
            storage.write_activity(&community, &activity).await?;

            log::info!("Formatting complete!");
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} communities: {})",
                config.communities.len(),
                config
                    .communities
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        Command::Info { community, output } => {
            let storage = storage_for(output);
            log::info!("Storage directory: {}", storage.root_dir().display());

            let Some(snapshot) = storage.load_snapshot(&community).await? else {
                log::info!("No snapshot found for {community} yet.");
                return Ok(());
            };

            let stats = &snapshot.stats;
            log::info!("Community: {}", stats.community);
            log::info!("Acquired: {} ({}s)", stats.end_time, stats.elapsed_secs());
            log::info!(
                "Users: {}, topics: {}, posts: {}, liking users: {}, profiles: {}",
                stats.user_count,
                stats.topic_count,
                stats.post_count,
                stats.liking_user_count,
                stats.profile_count
            );
            log::info!("Fingerprint: {}", stats.fingerprint);

            if let Err(e) = snapshot.verify() {
                log::error!("Snapshot check failed: {}", e);
                return Err(AppError::validation(format!("{community} snapshot is inconsistent")));
            }
            log::info!("✓ Snapshot consistent");
        }
    }

    log::info!("Done!");

    Ok(())
}
