//! # Cadenza
//!
//! Music player core for Linux.
//!
//! This crate provides:
//! - A lazy object model (albums, discs, tracks) over a DuckDB collection
//! - Popularity and rating scores shared by albums, tracks and radios
//! - A GStreamer playback chain with replay gain and equalizer
//! - An MPRIS D-Bus server driving the player
//!
//! ## Features
//!
//! - `gstreamer` - GStreamer backend and the `cadenza-player` daemon

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod context;
pub mod db;
pub mod display;
pub mod error;
pub mod mpris;
pub mod objects;
pub mod playback;
pub mod player;
pub mod types;

pub use config::Config;
pub use context::AppContext;
pub use db::Collection;
pub use error::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "cadenza";
