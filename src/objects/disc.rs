//! Album disc

use crate::db::Collection;
use crate::error::Result;
use crate::types::{row_id, ItemId, StorageType};

use super::Track;

/// One disc of an album, with the album filters captured at creation.
#[derive(Debug, Clone)]
pub struct Disc {
    collection: Collection,
    album_id: Option<ItemId>,
    number: i64,
    genre_ids: Vec<ItemId>,
    artist_ids: Vec<ItemId>,
    storage_type: StorageType,
    allow_track_skipping: bool,
    tracks: Vec<Track>,
}

impl Disc {
    pub(crate) fn new(
        collection: Collection,
        album_id: Option<ItemId>,
        number: i64,
        genre_ids: Vec<ItemId>,
        artist_ids: Vec<ItemId>,
        storage_type: StorageType,
        allow_track_skipping: bool,
    ) -> Self {
        Self {
            collection,
            album_id,
            number,
            genre_ids,
            artist_ids,
            storage_type,
            allow_track_skipping,
            tracks: Vec::new(),
        }
    }

    pub fn number(&self) -> i64 {
        self.number
    }

    pub fn album_id(&self) -> Option<ItemId> {
        self.album_id
    }

    pub fn set_tracks(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
    }

    /// Disc tracks, read from the collection on first call.
    ///
    /// Disliked tracks are left out when the album allows skipping.
    pub fn tracks(&mut self) -> Result<&[Track]> {
        if self.tracks.is_empty() {
            if let Some(album_id) = row_id(self.album_id) {
                let ids = self.collection.disc_track_ids(
                    album_id,
                    &self.genre_ids,
                    &self.artist_ids,
                    self.number,
                    self.storage_type,
                    self.allow_track_skipping,
                )?;
                self.tracks = ids
                    .into_iter()
                    .map(|id| Track::for_album(self.collection.clone(), Some(id), self.album_id))
                    .collect();
            }
        }
        Ok(&self.tracks)
    }

    /// Tracks already loaded, without touching the collection.
    pub(crate) fn loaded_tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track_ids(&mut self) -> Result<Vec<ItemId>> {
        Ok(self.tracks()?.iter().filter_map(Track::id).collect())
    }

    pub fn track_uris(&mut self) -> Result<Vec<String>> {
        self.tracks()?.iter().map(Track::uri).collect()
    }

    /// Names given to this disc by its tracks.
    pub fn names(&self) -> Result<Vec<String>> {
        match row_id(self.album_id) {
            Some(album_id) => self.collection.disc_names(album_id, self.number),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::sample_collection;

    fn disc(collection: &Collection, album_id: ItemId, number: i64, skipping: bool) -> Disc {
        Disc::new(
            collection.clone(),
            Some(album_id),
            number,
            Vec::new(),
            Vec::new(),
            StorageType::COLLECTION,
            skipping,
        )
    }

    #[test]
    fn test_tracks_by_disc() {
        let (collection, album_id) = sample_collection();

        let mut first = disc(&collection, album_id, 1, false);
        let names: Vec<String> = first
            .tracks()
            .unwrap()
            .iter()
            .map(|t| t.name().unwrap())
            .collect();
        assert_eq!(names, vec!["Morning", "Noon"]);
        assert_eq!(first.names().unwrap(), vec!["Day"]);
        assert_eq!(first.track_uris().unwrap().len(), 2);

        let mut second = disc(&collection, album_id, 2, false);
        assert_eq!(second.track_ids().unwrap().len(), 1);
        assert!(second.names().unwrap().is_empty());
    }

    #[test]
    fn test_skipping_leaves_out_disliked() {
        let (collection, album_id) = sample_collection();

        let mut second = disc(&collection, album_id, 2, true);
        assert!(second.tracks().unwrap().is_empty());
    }

    #[test]
    fn test_without_album() {
        let (collection, _) = sample_collection();
        let mut orphan = Disc::new(
            collection,
            None,
            1,
            Vec::new(),
            Vec::new(),
            StorageType::ALL,
            false,
        );
        assert!(orphan.tracks().unwrap().is_empty());
        assert!(orphan.names().unwrap().is_empty());
    }
}
