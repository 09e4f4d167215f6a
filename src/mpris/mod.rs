//! MPRIS D-Bus server
//!
//! Exposes the player on the session bus through the `org.mpris.MediaPlayer2`
//! and `org.mpris.MediaPlayer2.Player` interfaces. Player and collection
//! events are forwarded as property change signals.

mod metadata;
mod server;

pub use metadata::{parse_track_id, track_id_path, track_metadata};
pub use server::{MprisPlayer, MprisRoot, MprisServer};

/// MPRIS D-Bus constants
pub const MPRIS_PREFIX: &str = "org.mpris.MediaPlayer2.";
pub const MPRIS_PATH: &str = "/org/mpris/MediaPlayer2";

/// Object path prefix of track ids
pub const TRACK_ID_PREFIX: &str = "/org/cadenza/TrackId/";

/// Track id reported when nothing is loaded
pub const NO_TRACK: &str = "/org/mpris/MediaPlayer2/TrackList/NoTrack";

pub const SUPPORTED_URI_SCHEMES: &[&str] = &["file", "http", "https"];

pub const SUPPORTED_MIME_TYPES: &[&str] = &[
    "audio/flac",
    "audio/mp4",
    "audio/mpeg",
    "audio/ogg",
    "audio/x-opus+ogg",
    "audio/x-vorbis+ogg",
    "audio/x-wav",
];
