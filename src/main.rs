//! Cadenza - Main entry point
//!
//! Inspect and edit the collection from the command line.

use std::path::PathBuf;

use cadenza::config::Config;
use cadenza::context::AppContext;
use cadenza::db::AlbumRecord;
use cadenza::display::{self, AlbumSummary, TrackSummary};
use cadenza::error::{Error, Result};
use cadenza::objects::{Scored, MAX_STARS};
use cadenza::types::ItemId;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cadenza")]
#[command(author, version, about = "Music collection and player core for Linux")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "CADENZA_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show an album and its tracks
    Album {
        id: i64,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show a track
    Track {
        id: i64,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Rate a track, -1 to clear
    Rate {
        track_id: i64,

        #[arg(allow_negative_numbers = true, value_parser = clap::value_parser!(i64).range(-1..=5))]
        rate: i64,
    },

    /// Set the popularity of a track in stars
    Popularity {
        track_id: i64,

        #[arg(value_parser = clap::value_parser!(u8).range(0..=5))]
        stars: u8,
    },

    /// Mark an album as loved
    Love {
        album_id: i64,

        /// Remove the loved mark instead
        #[arg(long)]
        off: bool,
    },

    /// Keep a web album in the collection
    Save {
        album_id: i64,

        /// Turn the album back into an ephemeral one
        #[arg(long)]
        remove: bool,
    },

    /// Manage radios
    Radio {
        #[command(subcommand)]
        command: RadioCommands,
    },

    /// Import an album described as JSON
    Import { path: PathBuf },

    /// Show or edit configuration
    Config {
        /// Print current configuration
        #[arg(long)]
        show: bool,

        /// Create default configuration file
        #[arg(long)]
        init: bool,
    },

    /// Database operations
    Db {
        /// Show database path and stats
        #[arg(long)]
        info: bool,
    },
}

#[derive(Subcommand)]
enum RadioCommands {
    /// Add a radio or update its stream uri
    Add { name: String, uri: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load and validate configuration
    let config = if let Some(ref path) = cli.config {
        Config::load_from(path)?
    } else {
        Config::load()?
    };
    config.validate()?;

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Commands::Config { show, init } = cli.command {
        if init {
            let default_config = Config::default();
            default_config.save()?;
            println!(
                "Created default configuration at {}",
                Config::config_path()?.display()
            );
        } else if show {
            let contents = toml::to_string_pretty(&config)?;
            println!("{contents}");
        } else {
            println!("Configuration path: {}", Config::config_path()?.display());
        }
        return Ok(());
    }

    let ctx = AppContext::open(config).await?;
    run(&ctx, cli.command)
}

fn run(ctx: &AppContext, command: Commands) -> Result<()> {
    match command {
        Commands::Album { id, json } => {
            let mut album = ctx.album(ItemId::new(id))?;
            let summary = AlbumSummary::from_album(&mut album)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                display::display_album(&summary);
            }
        }

        Commands::Track { id, json } => {
            let track = ctx.track(ItemId::new(id))?;
            let summary = TrackSummary::from_track(&track)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                display::display_track(&summary);
            }
        }

        Commands::Rate { track_id, rate } => {
            let track = ctx.track(ItemId::new(track_id))?;
            track.set_rate(rate)?;
            println!("{}: {}", track.title()?, rate_text(rate));
        }

        Commands::Popularity { track_id, stars } => {
            let track = ctx.track(ItemId::new(track_id))?;
            track.set_popularity_stars(stars.min(MAX_STARS));
            println!(
                "{}: {}",
                track.title()?,
                display::stars(track.popularity_stars()?)
            );
        }

        Commands::Love { album_id, off } => {
            let mut album = ctx.album(ItemId::new(album_id))?;
            album.set_loved(!off)?;
            let state = if off { "no longer loved" } else { "loved" };
            println!("{} is {state}", album.title()?);
        }

        Commands::Save { album_id, remove } => {
            let mut album = ctx.album(ItemId::new(album_id))?;
            album.save(!remove)?;
            let state = if remove { "removed from" } else { "saved in" };
            println!("{} {state} the collection", album.title()?);
        }

        Commands::Radio {
            command: RadioCommands::Add { name, uri },
        } => {
            ctx.collection.add_radio(&name, &uri)?;
            println!("Radio {name} -> {uri}");
        }

        Commands::Import { path } => {
            let contents = std::fs::read_to_string(&path)?;
            let record: AlbumRecord = serde_json::from_str(&contents)?;
            if record.tracks.is_empty() {
                return Err(Error::other(format!(
                    "{} describes no tracks",
                    path.display()
                )));
            }
            let album_id = ctx.collection.import_album(&record)?;
            println!(
                "Imported {} ({} tracks) as album {album_id}",
                record.name,
                record.tracks.len()
            );
        }

        Commands::Db { info } => {
            if info {
                let counts = ctx.collection.counts()?;
                println!("Database path: {}", ctx.config.database_path()?.display());
                println!("Albums:  {:>8}", counts.albums);
                println!("Tracks:  {:>8}", counts.tracks);
                println!("Artists: {:>8}", counts.artists);
                println!("Genres:  {:>8}", counts.genres);
                println!("Radios:  {:>8}", counts.radios);
            }
        }

        Commands::Config { .. } => {}
    }
    Ok(())
}

fn rate_text(rate: i64) -> String {
    match u8::try_from(rate) {
        Ok(rate) => display::stars(rate),
        Err(_) => "rating cleared".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_rate_bounds() {
        let cli = Cli::try_parse_from(["cadenza", "rate", "3", "-1"]).unwrap();
        assert!(matches!(cli.command, Commands::Rate { track_id: 3, rate: -1 }));
        assert!(Cli::try_parse_from(["cadenza", "rate", "3", "6"]).is_err());
        assert!(Cli::try_parse_from(["cadenza", "popularity", "3", "7"]).is_err());
    }

    #[test]
    fn test_parse_radio_add() {
        let cli =
            Cli::try_parse_from(["cadenza", "radio", "add", "Jazz FM", "http://jazz.example"])
                .unwrap();
        let Commands::Radio {
            command: RadioCommands::Add { name, uri },
        } = cli.command
        else {
            panic!("expected radio add");
        };
        assert_eq!(name, "Jazz FM");
        assert_eq!(uri, "http://jazz.example");
    }

    #[test]
    fn test_rate_text() {
        assert_eq!(rate_text(-1), "rating cleared");
        assert_eq!(rate_text(5), "★★★★★");
    }
}
