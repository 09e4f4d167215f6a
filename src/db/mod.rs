//! Collection database
//!
//! Albums, tracks, artists, genres and radios stored in an embedded DuckDB
//! file. Domain objects read one column at a time through the accessors
//! generated below and cache the result themselves.

mod filter;
mod queries;
mod schema;

pub use filter::IdFilter;
pub use queries::RadioScore;

use chrono::Utc;
use duckdb::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};
use duckdb::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::types::{ItemId, Loved, Milliseconds, ScanUpdate, StorageType};

/// Capacity of the collection event channel.
const EVENT_CAPACITY: usize = 64;

/// Changes announced to observers (MPRIS service, views).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionEvent {
    /// A track or album got a new user rate
    RateChanged { id: ItemId, rate: i64 },
    /// An album's loved flag changed
    LovedChanged { album_id: ItemId, loved: bool },
    /// An album was added to or removed from the collection
    AlbumUpdated { album_id: ItemId, update: ScanUpdate },
    /// An artist gained or lost albums
    ArtistUpdated { artist_id: ItemId, update: ScanUpdate },
}

/// Id-keyed collection tables: albums and tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Albums,
    Tracks,
}

impl Table {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Albums => "albums",
            Self::Tracks => "tracks",
        }
    }
}

/// An album to import, with its tracks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlbumRecord {
    pub name: String,
    pub artists: Vec<String>,
    pub genres: Vec<String>,
    pub year: Option<i64>,
    pub timestamp: Option<i64>,
    pub uri: Option<String>,
    pub mb_album_id: Option<String>,
    pub synced: i64,
    pub storage_type: StorageType,
    pub tracks: Vec<TrackRecord>,
}

impl Default for AlbumRecord {
    fn default() -> Self {
        Self {
            name: String::new(),
            artists: Vec::new(),
            genres: Vec::new(),
            year: None,
            timestamp: None,
            uri: None,
            mb_album_id: None,
            synced: 0,
            storage_type: StorageType::COLLECTION,
            tracks: Vec::new(),
        }
    }
}

/// A track to import.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackRecord {
    pub name: String,
    pub uri: String,
    pub artists: Vec<String>,
    pub genres: Vec<String>,
    pub number: Option<i64>,
    pub discnumber: i64,
    pub discname: Option<String>,
    pub duration_ms: Option<i64>,
    pub year: Option<i64>,
    pub loved: Loved,
    pub mb_track_id: Option<String>,
}

/// Row counts for `db --info`.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CollectionCounts {
    pub albums: i64,
    pub tracks: i64,
    pub artists: i64,
    pub genres: i64,
    pub radios: i64,
}

/// Shared handle on the collection database
#[derive(Clone)]
pub struct Collection {
    conn: Arc<Mutex<Connection>>,
    events: broadcast::Sender<CollectionEvent>,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection").finish_non_exhaustive()
    }
}

impl Collection {
    /// Open the collection database
    ///
    /// # Arguments
    /// * `config` - Database configuration
    /// * `data_dir` - Default data directory for the collection file
    pub async fn open(config: &DatabaseConfig, data_dir: &Path) -> Result<Self> {
        let db_path = if let Some(ref path) = config.path {
            let path = Path::new(path);
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            path.to_path_buf()
        } else {
            std::fs::create_dir_all(data_dir)?;
            data_dir.join("collection.duckdb")
        };

        // DuckDB is synchronous, so open it off the runtime threads
        let conn = tokio::task::spawn_blocking(move || Connection::open(&db_path))
            .await
            .map_err(|e| Error::other(e.to_string()))??;

        Self::from_connection(conn)
    }

    /// Open a throwaway in-memory collection
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        schema::init_schema(&conn)?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            events,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::other("collection connection lock poisoned"))
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Subscribe to collection events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CollectionEvent> {
        self.events.subscribe()
    }

    /// Announce a collection change. Having no subscriber is not an error.
    pub fn notify(&self, event: CollectionEvent) {
        debug!("Collection event: {:?}", event);
        let _ = self.events.send(event);
    }

    // ------------------------------------------------------------------
    // Album relations
    // ------------------------------------------------------------------

    /// Disc numbers of an album
    pub fn album_discs(&self, album_id: ItemId) -> Result<Vec<i64>> {
        self.with_conn(|conn| queries::album_discs(conn, album_id))
    }

    /// Names given to an album disc
    pub fn disc_names(&self, album_id: ItemId, disc: i64) -> Result<Vec<String>> {
        self.with_conn(|conn| queries::disc_names(conn, album_id, disc))
    }

    /// Track ids of one disc.
    ///
    /// When no track matches the artist filter, the query is retried without
    /// it: tracks may be tagged with artists missing from the album artists.
    pub fn disc_track_ids(
        &self,
        album_id: ItemId,
        genre_ids: &[ItemId],
        artist_ids: &[ItemId],
        disc: i64,
        storage_type: StorageType,
        skip_disliked: bool,
    ) -> Result<Vec<ItemId>> {
        self.with_conn(|conn| {
            let ids = queries::disc_track_ids(
                conn,
                album_id,
                genre_ids,
                artist_ids,
                disc,
                storage_type,
                skip_disliked,
            )?;
            if !ids.is_empty() || artist_ids.is_empty() {
                return Ok(ids);
            }
            debug!("Album {} missing an album artist in track artists", album_id);
            queries::disc_track_ids(
                conn,
                album_id,
                genre_ids,
                &[],
                disc,
                storage_type,
                skip_disliked,
            )
        })
    }

    /// Track ids of an album, with the same artist fallback as discs
    pub fn album_track_ids(
        &self,
        album_id: ItemId,
        genre_ids: &[ItemId],
        artist_ids: &[ItemId],
    ) -> Result<Vec<ItemId>> {
        self.with_conn(|conn| {
            let ids = queries::album_track_ids(conn, album_id, genre_ids, artist_ids)?;
            if !ids.is_empty() || artist_ids.is_empty() {
                return Ok(ids);
            }
            queries::album_track_ids(conn, album_id, genre_ids, &[])
        })
    }

    /// Number of tracks of an album matching the filters
    pub fn album_tracks_count(
        &self,
        album_id: ItemId,
        genre_ids: &[ItemId],
        artist_ids: &[ItemId],
    ) -> Result<i64> {
        self.with_conn(|conn| queries::album_tracks_count(conn, album_id, genre_ids, artist_ids))
    }

    // ------------------------------------------------------------------
    // Scores
    // ------------------------------------------------------------------

    pub fn avg_popularity(&self, table: Table) -> Result<f64> {
        self.with_conn(|conn| queries::avg_popularity(conn, table))
    }

    pub fn higher_popularity(&self, table: Table) -> Result<i64> {
        self.with_conn(|conn| queries::higher_popularity(conn, table))
    }

    pub fn popularity(&self, table: Table, id: ItemId) -> Result<i64> {
        self.with_conn(|conn| queries::popularity(conn, table, id))
    }

    pub fn set_popularity(&self, table: Table, id: ItemId, value: i64) -> Result<()> {
        self.with_conn(|conn| queries::set_popularity(conn, table, id, value))
    }

    pub fn rate(&self, table: Table, id: ItemId) -> Result<i64> {
        self.with_conn(|conn| queries::rate(conn, table, id))
    }

    pub fn set_rate(&self, table: Table, id: ItemId, value: i64) -> Result<()> {
        self.with_conn(|conn| queries::set_rate(conn, table, id, value))
    }

    // ------------------------------------------------------------------
    // Radios
    // ------------------------------------------------------------------

    /// Add or replace a radio station
    pub fn add_radio(&self, name: &str, uri: &str) -> Result<()> {
        self.with_conn(|conn| queries::add_radio(conn, name, uri))
    }

    pub fn radio_uri(&self, name: &str) -> Result<Option<String>> {
        self.with_conn(|conn| queries::radio_uri(conn, name))
    }

    pub fn radio_popularity(&self, name: &str) -> Result<i64> {
        self.with_conn(|conn| queries::radio_score(conn, name, RadioScore::Popularity))
    }

    pub fn radio_avg_popularity(&self) -> Result<f64> {
        self.with_conn(queries::radio_avg_popularity)
    }

    pub fn radio_higher_popularity(&self) -> Result<i64> {
        self.with_conn(queries::radio_higher_popularity)
    }

    pub fn set_radio_popularity(&self, name: &str, value: i64) -> Result<()> {
        self.with_conn(|conn| queries::set_radio_score(conn, name, RadioScore::Popularity, value))
    }

    pub fn radio_rate(&self, name: &str) -> Result<i64> {
        self.with_conn(|conn| queries::radio_score(conn, name, RadioScore::Rate))
    }

    pub fn set_radio_rate(&self, name: &str, value: i64) -> Result<()> {
        self.with_conn(|conn| queries::set_radio_score(conn, name, RadioScore::Rate, value))
    }

    // ------------------------------------------------------------------
    // Writers
    // ------------------------------------------------------------------

    pub fn set_album_loved(&self, album_id: ItemId, loved: bool) -> Result<()> {
        self.with_conn(|conn| {
            queries::update_column(conn, Table::Albums, "loved", album_id, loved)
        })
    }

    pub fn set_album_uri(&self, album_id: ItemId, uri: &str) -> Result<()> {
        self.with_conn(|conn| queries::update_column(conn, Table::Albums, "uri", album_id, uri))
    }

    pub fn set_album_synced(&self, album_id: ItemId, mask: i64) -> Result<()> {
        self.with_conn(|conn| {
            queries::update_column(conn, Table::Albums, "synced", album_id, mask)
        })
    }

    pub fn set_album_storage_type(&self, album_id: ItemId, storage: StorageType) -> Result<()> {
        self.with_conn(|conn| {
            queries::update_column(conn, Table::Albums, "storage_type", album_id, storage)
        })
    }

    pub fn set_track_storage_type(&self, track_id: ItemId, storage: StorageType) -> Result<()> {
        self.with_conn(|conn| {
            queries::update_column(conn, Table::Tracks, "storage_type", track_id, storage)
        })
    }

    pub fn set_track_loved(&self, track_id: ItemId, loved: Loved) -> Result<()> {
        self.with_conn(|conn| {
            queries::update_column(conn, Table::Tracks, "loved", track_id, loved.as_db())
        })
    }

    /// Bump an album's modification time to now
    pub fn touch_album_mtime(&self, album_id: ItemId) -> Result<()> {
        let now = Utc::now().timestamp();
        self.with_conn(|conn| queries::update_column(conn, Table::Albums, "mtime", album_id, now))
    }

    // ------------------------------------------------------------------
    // Import
    // ------------------------------------------------------------------

    /// Insert an album and its tracks in one transaction
    pub fn import_album(&self, album: &AlbumRecord) -> Result<ItemId> {
        let mtime = Utc::now().timestamp();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let album_id = queries::insert_album(&tx, album, mtime)?;
        for track in &album.tracks {
            queries::insert_track(&tx, album_id, album, track, mtime)?;
        }

        tx.commit()?;
        debug!("Imported album {} as {}", album.name, album_id);
        Ok(album_id)
    }

    /// Insert an album row alone; `album.tracks` is ignored
    pub fn insert_album(&self, album: &AlbumRecord) -> Result<ItemId> {
        let mtime = Utc::now().timestamp();
        self.with_conn(|conn| queries::insert_album(conn, album, mtime))
    }

    /// Insert one track into an existing album. Missing artists and genres
    /// are taken from `album`.
    pub fn insert_track(
        &self,
        album_id: ItemId,
        album: &AlbumRecord,
        track: &TrackRecord,
    ) -> Result<ItemId> {
        let mtime = Utc::now().timestamp();
        self.with_conn(|conn| queries::insert_track(conn, album_id, album, track, mtime))
    }

    /// Find or create an artist
    pub fn insert_artist(&self, name: &str) -> Result<ItemId> {
        self.with_conn(|conn| queries::artist_id_or_insert(conn, name))
    }

    /// Find or create a genre
    pub fn insert_genre(&self, name: &str) -> Result<ItemId> {
        self.with_conn(|conn| queries::genre_id_or_insert(conn, name))
    }

    /// Row counts of the main tables
    pub fn counts(&self) -> Result<CollectionCounts> {
        self.with_conn(queries::counts)
    }
}

/// Generates `Collection` accessors reading one column of one row.
///
/// Each accessor returns `Ok(None)` when the row is missing, the column is
/// NULL, or a list column is empty, so callers can substitute their default.
macro_rules! column_accessors {
    ($( $(#[$meta:meta])* $name:ident -> $ty:ty = $sql:literal; )+) => {
        impl Collection {
            $(
                $(#[$meta])*
                pub fn $name(&self, id: ItemId) -> Result<Option<$ty>> {
                    self.with_conn(|conn| queries::scalar(conn, $sql, id))
                }
            )+
        }
    };
}

/// Same as `column_accessors!` for columns spread over several rows.
macro_rules! list_accessors {
    ($( $(#[$meta:meta])* $name:ident -> $ty:ty = $sql:literal; )+) => {
        impl Collection {
            $(
                $(#[$meta])*
                pub fn $name(&self, id: ItemId) -> Result<Option<Vec<$ty>>> {
                    let values: Vec<$ty> = self.with_conn(|conn| queries::column(conn, $sql, id))?;
                    Ok((!values.is_empty()).then_some(values))
                }
            )+
        }
    };
}

column_accessors! {
    album_name -> String = "SELECT name FROM albums WHERE id = ?";
    album_year -> i64 = "SELECT year FROM albums WHERE id = ?";
    album_timestamp -> i64 = "SELECT timestamp FROM albums WHERE id = ?";
    album_uri -> String = "SELECT uri FROM albums WHERE id = ?";
    /// Sum of the album's track durations
    album_duration -> Milliseconds =
        "SELECT CAST(SUM(duration) AS BIGINT) FROM tracks WHERE album_id = ?";
    album_popularity -> i64 = "SELECT popularity FROM albums WHERE id = ?";
    album_mtime -> i64 = "SELECT mtime FROM albums WHERE id = ?";
    album_synced -> i64 = "SELECT synced FROM albums WHERE id = ?";
    album_loved -> bool = "SELECT loved FROM albums WHERE id = ?";
    album_storage_type -> StorageType = "SELECT storage_type FROM albums WHERE id = ?";
    album_mb_album_id -> String = "SELECT mb_album_id FROM albums WHERE id = ?";

    track_name -> String = "SELECT name FROM tracks WHERE id = ?";
    track_album_id -> ItemId = "SELECT album_id FROM tracks WHERE id = ?";
    track_popularity -> i64 = "SELECT popularity FROM tracks WHERE id = ?";
    track_album_name -> String =
        "SELECT albums.name FROM tracks JOIN albums ON albums.id = tracks.album_id WHERE tracks.id = ?";
    track_duration -> Milliseconds = "SELECT duration FROM tracks WHERE id = ?";
    track_number -> i64 = "SELECT tracknumber FROM tracks WHERE id = ?";
    track_discnumber -> i64 = "SELECT discnumber FROM tracks WHERE id = ?";
    track_year -> i64 = "SELECT year FROM tracks WHERE id = ?";
    track_timestamp -> i64 = "SELECT timestamp FROM tracks WHERE id = ?";
    track_mtime -> i64 = "SELECT mtime FROM tracks WHERE id = ?";
    track_mb_track_id -> String = "SELECT mb_track_id FROM tracks WHERE id = ?";
    track_uri -> String = "SELECT uri FROM tracks WHERE id = ?";
    track_loved -> Loved = "SELECT loved FROM tracks WHERE id = ?";
    track_storage_type -> StorageType = "SELECT storage_type FROM tracks WHERE id = ?";
}

list_accessors! {
    album_artists -> String = r"
        SELECT artists.name FROM album_artists
        JOIN artists ON artists.id = album_artists.artist_id
        WHERE album_artists.album_id = ? ORDER BY album_artists.position";
    album_artist_ids -> ItemId =
        "SELECT artist_id FROM album_artists WHERE album_id = ? ORDER BY position";
    album_genre_ids -> ItemId =
        "SELECT genre_id FROM album_genres WHERE album_id = ? ORDER BY position";

    track_artists -> String = r"
        SELECT artists.name FROM track_artists
        JOIN artists ON artists.id = track_artists.artist_id
        WHERE track_artists.track_id = ? ORDER BY track_artists.position";
    track_artist_ids -> ItemId =
        "SELECT artist_id FROM track_artists WHERE track_id = ? ORDER BY position";
    track_genres -> String = r"
        SELECT genres.name FROM track_genres
        JOIN genres ON genres.id = track_genres.genre_id
        WHERE track_genres.track_id = ? ORDER BY track_genres.position";
    track_genre_ids -> ItemId =
        "SELECT genre_id FROM track_genres WHERE track_id = ? ORDER BY position";
    /// Album artists of the album a track belongs to
    track_album_artist_ids -> ItemId = r"
        SELECT album_artists.artist_id FROM tracks
        JOIN album_artists ON album_artists.album_id = tracks.album_id
        WHERE tracks.id = ? ORDER BY album_artists.position";
}

// ============================================================================
// SQL conversions for domain newtypes
// ============================================================================

macro_rules! impl_sql_i64 {
    ($type:ty, $from:expr, $to:expr) => {
        impl FromSql for $type {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map($from)
            }
        }

        impl ToSql for $type {
            fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::Owned(Value::BigInt($to(*self))))
            }
        }
    };
}

impl_sql_i64!(ItemId, ItemId::new, ItemId::get);
impl_sql_i64!(StorageType, StorageType, StorageType::bits);
impl_sql_i64!(Loved, Loved::from_db, Loved::as_db);
impl_sql_i64!(Milliseconds, Milliseconds::new, Milliseconds::get);
