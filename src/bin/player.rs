//! Cadenza player daemon
//!
//! Plays an album or a uri through GStreamer and serves MPRIS until asked to
//! quit.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use cadenza::config::Config;
use cadenza::context::AppContext;
use cadenza::mpris::MprisServer;
use cadenza::playback::GstBackend;
use cadenza::player::LoopStatus;
use cadenza::types::ItemId;
use clap::Parser;
use tokio::signal;
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cadenza-player")]
#[command(author, version, about = "Music player daemon with MPRIS control")]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "CADENZA_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Album to play
    #[arg(short, long, conflicts_with = "uri")]
    album: Option<i64>,

    /// File or stream to play
    #[arg(short, long)]
    uri: Option<String>,

    /// Play in random order
    #[arg(long)]
    shuffle: bool,

    /// Loop status (None, Track, Playlist)
    #[arg(long = "loop", default_value = "None", value_parser = parse_loop_status)]
    loop_status: LoopStatus,

    /// How often to check for the end of the current stream
    #[arg(long, default_value = "250ms", value_parser = humantime::parse_duration)]
    poll: Duration,
}

fn parse_loop_status(value: &str) -> Result<LoopStatus, String> {
    value.parse().map_err(|e: cadenza::Error| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = if let Some(ref path) = args.config {
        Config::load_from(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?
    } else {
        Config::load().context("Failed to load configuration")?
    };
    config.validate()?;

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(&config.general.log_level)
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    tracing::info!("Cadenza player starting...");

    let mut ctx = AppContext::open(config).await?;
    let backend = GstBackend::new(&ctx.config.playback).context("Failed to set up GStreamer")?;
    let player = ctx.attach_player(Box::new(backend));

    {
        let mut player = player.lock().await;
        player.set_loop_status(args.loop_status);
        match (args.album, args.uri.as_deref()) {
            (Some(id), _) => {
                let mut album = ctx.album(ItemId::new(id))?;
                player.load_album(&mut album)?;
            }
            (None, Some(uri)) => player.load_uri(uri)?,
            (None, None) if !ctx.config.mpris.enabled => {
                bail!("Nothing to play and MPRIS is disabled");
            }
            (None, None) => tracing::info!("Waiting for a uri over MPRIS"),
        }
        player.set_shuffle(args.shuffle);
    }

    let quit = Arc::new(Notify::new());

    // Handle shutdown signals
    {
        let quit = quit.clone();
        tokio::spawn(async move {
            let _ = signal::ctrl_c().await;
            tracing::info!("Received shutdown signal, stopping...");
            quit.notify_one();
        });
    }

    // Also handle SIGTERM
    #[cfg(unix)]
    {
        let quit = quit.clone();
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::spawn(async move {
                    sigterm.recv().await;
                    tracing::info!("Received SIGTERM, stopping...");
                    quit.notify_one();
                });
            }
            Err(e) => {
                tracing::warn!("Failed to register SIGTERM handler: {}. Use Ctrl+C to stop.", e);
            }
        }
    }

    let server = if ctx.config.mpris.enabled {
        let server = MprisServer::start(
            &ctx.config.mpris,
            player.clone(),
            ctx.collection.clone(),
            quit.clone(),
        )
        .await
        .context("Failed to register on the session bus")?;
        let server = Arc::new(server);
        let runner = server.clone();
        tokio::spawn(async move {
            if let Err(e) = runner.run().await {
                tracing::error!("MPRIS server failed: {}", e);
            }
        });
        Some(server)
    } else {
        None
    };

    let mut poll = tokio::time::interval(args.poll);
    loop {
        tokio::select! {
            () = quit.notified() => break,
            _ = poll.tick() => {
                if let Err(e) = player.lock().await.tick() {
                    tracing::error!("Failed to advance playback: {}", e);
                }
            }
        }
    }

    if let Some(server) = server {
        server.stop();
    }
    player.lock().await.stop()?;

    tracing::info!("Cadenza player stopped");
    Ok(())
}
