//! Track domain object

use std::path::PathBuf;

use tracing::warn;

use crate::db::{Collection, Table};
use crate::error::Result;
use crate::types::{row_id, ItemId, Loved, Milliseconds, StorageType};

use super::{Album, Scored};

/// A collection track, or a radio/external stream when its id is a sentinel.
#[derive(Debug, Clone)]
pub struct Track {
    id: Option<ItemId>,
    collection: Collection,
    fields: TrackFields,
    /// Album this track was loaded through, overriding the stored album id
    album: Option<ItemId>,
    album_artists: Option<Vec<String>>,
    featuring_ids: Vec<ItemId>,
}

lazy_fields! {
    Track, TrackFields, TrackField {
        name(Name): String = String::new() => Collection::track_name;
        album_id(AlbumId): Option<ItemId> = None =>
            |c: &Collection, id| c.track_album_id(id).map(Some);
        album_artist_ids(AlbumArtistIds): Vec<ItemId> = Vec::new() =>
            Collection::track_album_artist_ids;
        artist_ids(ArtistIds): Vec<ItemId> = Vec::new() => Collection::track_artist_ids;
        genre_ids(GenreIds): Vec<ItemId> = Vec::new() => Collection::track_genre_ids;
        /// Raw popularity counter, see [`Scored::popularity_stars`] for stars
        popularity(Popularity): i64 = 0 => Collection::track_popularity;
        album_name(AlbumName): String = String::new() => Collection::track_album_name;
        artists(Artists): Vec<String> = Vec::new() => Collection::track_artists;
        genres(Genres): Vec<String> = Vec::new() => Collection::track_genres;
        duration(Duration): Milliseconds = Milliseconds::default() =>
            Collection::track_duration;
        number(Number): i64 = 0 => Collection::track_number;
        discnumber(DiscNumber): i64 = 0 => Collection::track_discnumber;
        year(Year): Option<i64> = None => |c: &Collection, id| c.track_year(id).map(Some);
        timestamp(Timestamp): i64 = 0 => Collection::track_timestamp;
        mtime(Mtime): i64 = 0 => Collection::track_mtime;
        mb_track_id(MbTrackId): Option<String> = None =>
            |c: &Collection, id| c.track_mb_track_id(id).map(Some);
        uri(Uri): String = String::new() => Collection::track_uri;
        loved(Loved): Loved = Loved::No => Collection::track_loved;
        storage_type(StorageType): StorageType = StorageType::NONE =>
            Collection::track_storage_type;
    }
}

impl Track {
    pub fn new(collection: Collection, id: Option<ItemId>) -> Self {
        Self {
            id,
            collection,
            fields: TrackFields::default(),
            album: None,
            album_artists: None,
            featuring_ids: Vec::new(),
        }
    }

    /// Track loaded through an album.
    pub fn for_album(collection: Collection, id: Option<ItemId>, album_id: Option<ItemId>) -> Self {
        let mut track = Self::new(collection, id);
        track.album = album_id;
        track
    }

    pub fn id(&self) -> Option<ItemId> {
        self.id
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn title(&self) -> Result<String> {
        self.name()
    }

    /// Compute the artists featured on this track, the track artists that
    /// are not album artists.
    ///
    /// Without explicit album artists, a single stored album artist is
    /// still left out.
    pub fn set_featuring_ids(&mut self, album_artist_ids: &[ItemId]) -> Result<()> {
        let mut artist_ids = self.artist_ids()?;
        if album_artist_ids.is_empty() {
            let stored = self.album_artist_ids()?;
            if stored.len() == 1 {
                artist_ids.retain(|id| !stored.contains(id));
            }
        }
        artist_ids.retain(|id| !album_artist_ids.contains(id));
        self.featuring_ids = artist_ids;
        Ok(())
    }

    pub fn featuring_artist_ids(&self) -> &[ItemId] {
        &self.featuring_ids
    }

    pub fn set_album_artists(&mut self, artists: Vec<String>) {
        self.album_artists = Some(artists);
    }

    /// Album artist names, as preset or from the album.
    pub fn album_artists(&self) -> Result<Vec<String>> {
        match &self.album_artists {
            Some(artists) => Ok(artists.clone()),
            None => self.album().artists(),
        }
    }

    pub fn set_uri(&mut self, uri: impl Into<String>) {
        self.fields.uri.set(uri.into());
    }

    /// Turn this track into a radio stream.
    pub fn set_radio(&mut self, name: impl Into<String>, uri: impl Into<String>) {
        self.id = Some(ItemId::RADIOS);
        self.album_artists = Some(vec![name.into()]);
        self.set_uri(uri);
    }

    pub fn set_number(&mut self, number: i64) {
        self.fields.number.set(number);
    }

    pub fn set_album(&mut self, album_id: Option<ItemId>) {
        self.album = album_id;
    }

    /// Id of the album the track belongs to.
    pub fn album_ref(&self) -> Result<Option<ItemId>> {
        match self.album {
            Some(id) => Ok(Some(id)),
            None => self.album_id(),
        }
    }

    /// A fresh view over the track's album. Without a readable album id the
    /// view is empty.
    pub fn album(&self) -> Album {
        let album_id = self.album_ref().unwrap_or_else(|e| {
            warn!("Failed to read album of track {:?}: {}", self.id, e);
            None
        });
        Album::new(self.collection.clone(), album_id, Vec::new(), Vec::new())
    }

    /// Local file path, for `file://` uris.
    pub fn path(&self) -> Result<Option<PathBuf>> {
        Ok(file_path_from_uri(&self.uri()?))
    }

    pub fn is_web(&self) -> Result<bool> {
        Ok(self.storage_type()?.is_web())
    }

    /// Update the loved state in the collection and in the cache.
    pub fn set_loved(&mut self, loved: Loved) -> Result<()> {
        if let Some(id) = row_id(self.id) {
            self.collection.set_track_loved(id, loved)?;
        }
        self.fields.loved.set(loved);
        Ok(())
    }
}

impl Scored for Track {
    fn score_id(&self) -> Option<ItemId> {
        self.id.filter(|id| *id != ItemId::EXTERNALS)
    }

    fn score_collection(&self) -> &Collection {
        &self.collection
    }

    fn score_table(&self) -> Table {
        Table::Tracks
    }

    fn radio_name(&self) -> Option<String> {
        self.album_artists.as_ref()?.first().cloned()
    }
}

/// Decode the local path of a `file://` uri.
pub fn file_path_from_uri(uri: &str) -> Option<PathBuf> {
    let encoded = uri.strip_prefix("file://")?;
    let encoded = encoded.strip_prefix("localhost").unwrap_or(encoded);
    urlencoding::decode(encoded)
        .ok()
        .map(|path| PathBuf::from(path.into_owned()))
}
