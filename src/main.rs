mod auth;
mod config;
mod logging;
mod ports;
mod services;
mod sources;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::{Result, eyre::Context};

use crate::{
    auth::Credentials,
    config::Config,
    logging::setup_logging,
    ports::music_service::Visibility,
    services::export::{export_all, export_by_name},
    services::import::PlaylistImporter,
    services::ytmusic::YtMusicClient,
    sources::SourceOptions,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "PLAYLIST_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Console log level (default: info)
    #[arg(long, default_value = "info", global = true, env = "LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// File log level (default: debug)
    #[arg(long, default_value = "debug", global = true)]
    log_file_level: log::LevelFilter,

    /// Path to log file
    #[arg(long, env = "PLAYLIST_SYNC_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture browser request headers and save them for later runs
    Setup,
    /// Import playlists from CSV files or a Spotify playlist URL
    Import {
        /// CSV files or directories containing them
        files: Vec<PathBuf>,

        /// Public Spotify playlist URL to import instead of CSVs
        #[arg(long)]
        spotify: Option<String>,

        /// Spotify application client id
        #[arg(long, env = "SPOTIFY_CLIENT_ID")]
        spotify_client_id: Option<String>,

        /// Spotify application client secret
        #[arg(long, env = "SPOTIFY_CLIENT_SECRET")]
        spotify_client_secret: Option<String>,

        /// Append to an existing playlist of the same name instead of
        /// always creating a new one
        #[arg(short, long)]
        append: bool,

        /// Create playlists as public instead of private
        #[arg(long)]
        public: bool,

        /// Override the configured add-batch size
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Export library playlists to CSV files
    Export {
        /// Title of the playlist to export
        #[arg(short, long, conflicts_with = "all")]
        name: Option<String>,

        /// Export every playlist in the library
        #[arg(long)]
        all: bool,

        /// Directory to write CSV files into
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

fn load_credentials(config: &Config) -> Result<Credentials> {
    let path = config.auth_file_path();
    Credentials::load(&path).with_context(|| {
        format!(
            "No usable credentials at {}; run `playlist-sync setup` first",
            path.display()
        )
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    setup_logging(args.log_level, args.log_file.clone(), args.log_file_level)?;

    let config = {
        if let Some(config) = args.config {
            Config::from_file(&config)
        } else {
            Config::load()
        }
    }
    .with_context(|| "Failed to load playlist-sync config")?;

    match args.command {
        Commands::Setup => {
            auth::run_setup(&config.auth_file_path())?;
        }
        Commands::Import {
            files,
            spotify,
            spotify_client_id,
            spotify_client_secret,
            append,
            public,
            batch_size,
        } => {
            let options = SourceOptions {
                append_if_exists: append,
                visibility: if public {
                    Visibility::Public
                } else {
                    Visibility::Private
                },
            };

            let jobs = if let Some(url) = spotify {
                let client_id = spotify_client_id
                    .ok_or_else(|| color_eyre::eyre::eyre!("--spotify requires a client id"))?;
                let client_secret = spotify_client_secret
                    .ok_or_else(|| color_eyre::eyre::eyre!("--spotify requires a client secret"))?;
                vec![
                    sources::spotify::fetch_playlist_job(&client_id, &client_secret, &url, &options)
                        .await?,
                ]
            } else {
                let paths = sources::csv::collect_csv_files(&files)?;
                let mut jobs = Vec::new();
                for path in &paths {
                    jobs.extend(sources::csv::read_jobs(path, &options)?);
                }
                jobs
            };

            if jobs.is_empty() {
                log::warn!("Nothing to import");
                return Ok(());
            }

            let credentials = load_credentials(&config)?;
            let client = YtMusicClient::new(&credentials)?;

            let mut import_config = config.import_config();
            if let Some(size) = batch_size {
                import_config.batch_size = size.max(1);
            }

            let mut importer = PlaylistImporter::new(client, import_config);
            let reports = importer.import_all(jobs).await;
            let failed: usize = reports.iter().map(|report| report.failed).sum();
            if failed > 0 {
                log::warn!("Finished with {failed} failed tracks");
            }
        }
        Commands::Export { name, all, out } => {
            let credentials = load_credentials(&config)?;
            let client = YtMusicClient::new(&credentials)?;
            let retry = config.retry_policy();

            if all {
                export_all(&client, &retry, &out).await?;
            } else if let Some(name) = name {
                export_by_name(&client, &retry, &name, &out).await?;
            } else {
                return Err(color_eyre::eyre::eyre!(
                    "Pass --name <title> or --all to export"
                ));
            }
        }
        Commands::Config(config_commands) => match config_commands {
            ConfigCommands::CreateDefault => {
                let path = Config::create_default()?;
                log::info!("Default config created at {}", path.display());
            }
            ConfigCommands::Path => match Config::config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("No default config path found"),
            },
        },
    }

    Ok(())
}
