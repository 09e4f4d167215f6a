//! Display utilities for the CLI.
//!
//! This module provides shared formatting functions used by the `cadenza`
//! binary to print albums and tracks in the terminal, or as JSON.
//!
//! # Functions
//!
//! - [`truncate`] - Truncate strings to a maximum length with ellipsis
//! - [`stars`] - Render a 0-5 score as a row of stars
//! - [`format_length`] - Human readable duration
//! - [`print_section_simple`] - Print section headers
//! - [`display_album`] / [`display_track`] - Display formatted objects

use std::time::Duration;

use chrono::DateTime;
use serde::Serialize;

use crate::error::Result;
use crate::objects::{Album, Scored, Track, MAX_STARS};
use crate::types::{ItemId, Loved, Milliseconds};

/// Truncate a string to a maximum length, adding "..." if truncated.
///
/// Handles Unicode characters correctly by counting chars rather than bytes.
/// For `max_len < 3`, truncates without ellipsis since there's no room for "...".
///
/// # Examples
///
/// ```
/// use cadenza::display::truncate;
///
/// assert_eq!(truncate("hello", 10), "hello");
/// assert_eq!(truncate("hello world", 8), "hello...");
/// assert_eq!(truncate("hello", 2), "he");
/// ```
pub fn truncate(s: &str, max_len: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_len {
        s.to_string()
    } else if max_len < 3 {
        // No room for ellipsis, just truncate
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{truncated}...")
    }
}

/// Render a score as filled and empty stars.
pub fn stars(value: u8) -> String {
    let filled = usize::from(value.min(MAX_STARS));
    format!(
        "{}{}",
        "★".repeat(filled),
        "☆".repeat(usize::from(MAX_STARS) - filled)
    )
}

/// Format a duration the way humans read it, to the second.
pub fn format_length(length: Milliseconds) -> String {
    let secs = u64::try_from(length.0 / 1000).unwrap_or(0);
    humantime::format_duration(Duration::from_secs(secs)).to_string()
}

/// Print a simple section header with dashes.
pub fn print_section_simple(title: &str) {
    println!("\n{}", title);
    println!("{}", "-".repeat(30));
}

fn rate_label(rate: i64) -> String {
    match u8::try_from(rate) {
        Ok(rate) => stars(rate),
        Err(_) => "unrated".to_string(),
    }
}

const fn loved_label(loved: Loved) -> &'static str {
    match loved {
        Loved::Yes => "loved",
        Loved::No => "",
        Loved::Skipped => "skipped",
    }
}

/// JSON view of a track.
#[derive(Debug, Clone, Serialize)]
pub struct TrackSummary {
    pub id: Option<ItemId>,
    pub name: String,
    pub album: String,
    pub artists: Vec<String>,
    pub genres: Vec<String>,
    pub discnumber: i64,
    pub number: i64,
    pub duration_ms: Milliseconds,
    pub year: Option<i64>,
    pub uri: String,
    pub loved: Loved,
    pub rate: i64,
    pub popularity: u8,
}

impl TrackSummary {
    pub fn from_track(track: &Track) -> Result<Self> {
        Ok(Self {
            id: track.id(),
            name: track.title()?,
            album: track.album_name()?,
            artists: track.artists()?,
            genres: track.genres()?,
            discnumber: track.discnumber()?,
            number: track.number()?,
            duration_ms: track.duration()?,
            year: track.year()?,
            uri: track.uri()?,
            loved: track.loved()?,
            rate: track.rate()?,
            popularity: track.popularity_stars()?,
        })
    }
}

/// JSON view of an album and its tracks.
#[derive(Debug, Clone, Serialize)]
pub struct AlbumSummary {
    pub id: Option<ItemId>,
    pub name: String,
    pub artists: Vec<String>,
    pub year: Option<i64>,
    pub duration_ms: Milliseconds,
    pub loved: bool,
    pub saved: bool,
    pub rate: i64,
    pub popularity: u8,
    pub added: Option<String>,
    pub tracks: Vec<TrackSummary>,
}

impl AlbumSummary {
    pub fn from_album(album: &mut Album) -> Result<Self> {
        let tracks = album
            .tracks()?
            .iter()
            .map(TrackSummary::from_track)
            .collect::<Result<Vec<_>>>()?;
        let timestamp = album.timestamp()?;
        Ok(Self {
            id: album.id(),
            name: album.title()?,
            artists: album.artists()?,
            year: album.year()?,
            duration_ms: album.duration()?,
            loved: album.loved()?,
            saved: !album.storage_type()?.is_web(),
            rate: album.rate()?,
            popularity: album.popularity_stars()?,
            added: (timestamp > 0)
                .then(|| DateTime::from_timestamp(timestamp, 0))
                .flatten()
                .map(|date| date.format("%Y-%m-%d").to_string()),
            tracks,
        })
    }
}

/// Display one album with its tracks grouped by disc.
pub fn display_album(album: &AlbumSummary) {
    let year = album.year.map(|y| format!(" ({y})")).unwrap_or_default();
    println!("{}{}", album.name, year);
    println!("  by {}", album.artists.join(", "));
    println!(
        "  {} tracks, {}",
        album.tracks.len(),
        format_length(album.duration_ms)
    );
    println!("  Popularity: {}", stars(album.popularity));
    println!("  Rating:     {}", rate_label(album.rate));
    if album.loved {
        println!("  Loved");
    }
    if !album.saved {
        println!("  Not saved in the collection");
    }
    if let Some(added) = &album.added {
        println!("  Added:      {added}");
    }

    let mut disc = None;
    for track in &album.tracks {
        if disc != Some(track.discnumber) {
            disc = Some(track.discnumber);
            print_section_simple(&format!("DISC {}", track.discnumber));
        }
        println!(
            "  {:2}. {:<30} {:>8} {} {}",
            track.number,
            truncate(&track.name, 30),
            track.duration_ms.to_string(),
            stars(track.popularity),
            loved_label(track.loved)
        );
    }
}

/// Display one track.
pub fn display_track(track: &TrackSummary) {
    println!("{}", track.name);
    println!("  by {}", track.artists.join(", "));
    if !track.album.is_empty() {
        println!(
            "  from {} (disc {}, track {})",
            track.album, track.discnumber, track.number
        );
    }
    if let Some(year) = track.year {
        println!("  Year:       {year}");
    }
    if !track.genres.is_empty() {
        println!("  Genres:     {}", track.genres.join(", "));
    }
    println!("  Length:     {}", track.duration_ms);
    println!("  Popularity: {}", stars(track.popularity));
    println!("  Rating:     {}", rate_label(track.rate));
    let loved = loved_label(track.loved);
    if !loved.is_empty() {
        println!("  {loved}");
    }
    println!("  {}", track.uri);
}
