//! Album domain object

use tracing::debug;

use crate::db::{Collection, CollectionEvent, Table};
use crate::error::Result;
use crate::types::{row_id, Cancellable, ItemId, Loved, Milliseconds, ScanUpdate, StorageType};

use super::{Disc, Scored, Track, WebTrackLoader};

/// A collection album with its discs and tracks.
///
/// Tracks are loaded disc by disc on first access, filtered by the genre and
/// artist ids the album was created with.
#[derive(Debug, Clone)]
pub struct Album {
    id: Option<ItemId>,
    genre_ids: Vec<ItemId>,
    collection: Collection,
    fields: AlbumFields,
    tracks: Vec<Track>,
    discs: Vec<Disc>,
    one_disc: Option<Disc>,
    allow_track_skipping: bool,
}

lazy_fields! {
    Album, AlbumFields, AlbumField {
        name(Name): String = String::new() => Collection::album_name;
        artists(Artists): Vec<String> = Vec::new() => Collection::album_artists;
        artist_ids(ArtistIds): Vec<ItemId> = Vec::new() => Collection::album_artist_ids;
        year(Year): Option<i64> = None => |c: &Collection, id| c.album_year(id).map(Some);
        timestamp(Timestamp): i64 = 0 => Collection::album_timestamp;
        uri(Uri): String = String::new() => Collection::album_uri;
        /// Sum of the track durations
        duration(Duration): Milliseconds = Milliseconds::default() =>
            Collection::album_duration;
        /// Raw popularity counter, see [`Scored::popularity_stars`] for stars
        popularity(Popularity): i64 = 0 => Collection::album_popularity;
        mtime(Mtime): i64 = 1 => Collection::album_mtime;
        /// Bit mask of synced tracks for web albums
        synced(Synced): i64 = 0 => Collection::album_synced;
        loved(Loved): bool = false => Collection::album_loved;
        storage_type(StorageType): StorageType = StorageType::NONE =>
            Collection::album_storage_type;
        mb_album_id(MbAlbumId): Option<String> = None =>
            |c: &Collection, id| c.album_mb_album_id(id).map(Some);
    }
}

impl Album {
    /// Album view filtered by genres and artists. Non-empty `artist_ids`
    /// override the stored album artists.
    pub fn new(
        collection: Collection,
        id: Option<ItemId>,
        genre_ids: Vec<ItemId>,
        artist_ids: Vec<ItemId>,
    ) -> Self {
        let mut fields = AlbumFields::default();
        if !artist_ids.is_empty() {
            fields.artist_ids.set(artist_ids);
        }
        Self {
            id,
            genre_ids,
            collection,
            fields,
            tracks: Vec::new(),
            discs: Vec::new(),
            one_disc: None,
            allow_track_skipping: false,
        }
    }

    pub fn id(&self) -> Option<ItemId> {
        self.id
    }

    pub fn genre_ids(&self) -> &[ItemId] {
        &self.genre_ids
    }

    pub fn title(&self) -> Result<String> {
        self.name()
    }

    pub fn set_discs(&mut self, discs: Vec<Disc>) {
        self.discs = discs;
    }

    /// Replace the album tracks, moving them into this album.
    ///
    /// Tracks no longer part of the album are returned as a separate album
    /// view over the same id.
    pub fn set_tracks(&mut self, tracks: Vec<Track>) -> Option<Album> {
        let kept: Vec<Option<ItemId>> = tracks.iter().map(Track::id).collect();
        let displaced: Vec<Track> = std::mem::take(&mut self.tracks)
            .into_iter()
            .filter(|track| !kept.contains(&track.id()))
            .collect();

        self.tracks = tracks
            .into_iter()
            .map(|mut track| {
                track.set_album(self.id);
                track
            })
            .collect();
        self.one_disc = None;

        if displaced.is_empty() {
            return None;
        }
        let mut album = self.sibling();
        album.tracks = displaced;
        Some(album)
    }

    /// Replace the album tracks with fresh copies bound to this album.
    pub fn set_tracks_cloned(&mut self, tracks: &[Track]) {
        self.tracks = tracks.iter().map(|track| self.fresh_track(track)).collect();
        self.one_disc = None;
    }

    /// Append a fresh copy of `track`.
    pub fn append_track(&mut self, track: &Track) {
        let track = self.fresh_track(track);
        self.tracks.push(track);
        self.one_disc = None;
    }

    /// Append `track` itself, rebinding it to this album.
    pub fn adopt_track(&mut self, mut track: Track) {
        track.set_album(self.id);
        self.tracks.push(track);
        self.one_disc = None;
    }

    pub fn append_tracks(&mut self, tracks: &[Track]) {
        for track in tracks {
            self.append_track(track);
        }
    }

    /// Remove every track with this id. Returns true when the album is left
    /// without tracks.
    pub fn remove_track(&mut self, track_id: ItemId) -> Result<bool> {
        self.tracks()?;
        self.tracks.retain(|track| track.id() != Some(track_id));
        self.one_disc = None;
        Ok(self.tracks.is_empty())
    }

    /// Drop loaded tracks and discs; they are read again on next access.
    pub fn reset_tracks(&mut self) {
        self.tracks.clear();
        self.discs.clear();
        self.one_disc = None;
    }

    pub fn disc_names(&self, disc: i64) -> Result<Vec<String>> {
        match row_id(self.id) {
            Some(id) => self.collection.disc_names(id, disc),
            None => Ok(Vec::new()),
        }
    }

    pub fn set_loved(&mut self, loved: bool) -> Result<()> {
        if let Some(id) = row_id(self.id) {
            self.collection.set_album_loved(id, loved)?;
            self.fields.loved.set(loved);
            self.collection.notify(CollectionEvent::LovedChanged { album_id: id, loved });
        }
        Ok(())
    }

    pub fn set_uri(&mut self, uri: impl Into<String>) -> Result<()> {
        let uri = uri.into();
        if let Some(id) = row_id(self.id) {
            self.collection.set_album_uri(id, &uri)?;
            self.collection.notify(CollectionEvent::AlbumUpdated {
                album_id: id,
                update: ScanUpdate::Modified,
            });
        }
        self.fields.uri.set(uri);
        Ok(())
    }

    /// Album track with this id, or an empty track.
    pub fn get_track(&mut self, track_id: ItemId) -> Result<Track> {
        let collection = self.collection.clone();
        Ok(self
            .tracks()?
            .iter()
            .find(|track| track.id() == Some(track_id))
            .cloned()
            .unwrap_or_else(|| Track::new(collection, None)))
    }

    /// Keep the album in the collection, or turn it back into an ephemeral one.
    pub fn save(&mut self, save: bool) -> Result<()> {
        let storage = saved_storage(save);
        for track_id in self.track_ids()? {
            self.collection.set_track_storage_type(track_id, storage)?;
        }
        self.store(save)
    }

    /// Same as `save` for a single track of the album.
    pub fn save_track(&mut self, save: bool, track: &Track) -> Result<()> {
        if let Some(track_id) = row_id(track.id()) {
            self.collection.set_track_storage_type(track_id, saved_storage(save))?;
        }
        self.store(save)
    }

    /// Refresh the tracks of a web album.
    ///
    /// Returns false for local albums. The loader is only called when the
    /// synced mask disagrees with the loaded tracks.
    pub async fn load_tracks(
        &mut self,
        loader: &dyn WebTrackLoader,
        cancellable: &Cancellable,
    ) -> Result<bool> {
        let storage_type = self.storage_type()?;
        if storage_type.intersects(StorageType::LOCAL) {
            return Ok(false);
        }
        let synced = self.synced()?;
        if synced != 0 && synced != self.tracks()?.len() as i64 {
            match self.mb_album_id()? {
                Some(mb_album_id) => {
                    loader.load_tracks(&mb_album_id, storage_type, cancellable).await?;
                }
                None => debug!("Album {:?} has no MusicBrainz id to load", self.id),
            }
            self.reset_tracks();
        }
        Ok(true)
    }

    pub fn set_synced(&mut self, mask: i64) -> Result<()> {
        if let Some(id) = row_id(self.id) {
            self.collection.set_album_synced(id, mask)?;
        }
        self.fields.synced.set(mask);
        Ok(())
    }

    /// Leave disliked tracks out. Call `reset_tracks` if tracks are loaded.
    pub fn set_skipping_allowed(&mut self) {
        self.allow_track_skipping = true;
    }

    /// Copy of this album without its disliked tracks.
    pub fn with_skipping_allowed(&mut self) -> Result<Album> {
        let mut tracks = Vec::new();
        for track in self.tracks()? {
            if track.loved()? != Loved::Skipped {
                tracks.push(track.clone());
            }
        }
        let mut album = Album::new(self.collection.clone(), self.id, Vec::new(), Vec::new());
        album.set_tracks_cloned(&tracks);
        Ok(album)
    }

    /// Override the storage type without writing it.
    pub fn set_storage_type(&mut self, storage_type: StorageType) {
        self.fields.storage_type.set(storage_type);
    }

    pub fn is_web(&self) -> Result<bool> {
        Ok(self.storage_type()?.is_web())
    }

    pub fn tracks_count(&self) -> Result<i64> {
        if !self.tracks.is_empty() {
            return Ok(self.tracks.len() as i64);
        }
        match row_id(self.id) {
            Some(id) => {
                self.collection
                    .album_tracks_count(id, &self.genre_ids, &self.artist_ids()?)
            }
            None => Ok(0),
        }
    }

    pub fn track_ids(&mut self) -> Result<Vec<ItemId>> {
        Ok(self.tracks()?.iter().filter_map(Track::id).collect())
    }

    pub fn track_uris(&mut self) -> Result<Vec<String>> {
        self.tracks()?.iter().map(Track::uri).collect()
    }

    /// Album tracks, disc after disc.
    pub fn tracks(&mut self) -> Result<&[Track]> {
        if self.tracks.is_empty() && row_id(self.id).is_some() {
            self.discs()?;
            self.tracks = self
                .discs
                .iter()
                .flat_map(|disc| disc.loaded_tracks().iter().cloned())
                .collect();
        }
        Ok(&self.tracks)
    }

    /// Tracks loaded so far, without touching the collection.
    pub fn loaded_tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// The whole album as a single disc numbered 0.
    pub fn one_disc(&mut self) -> Result<&Disc> {
        let disc = match self.one_disc.take() {
            Some(disc) => disc,
            None => {
                let tracks = self.tracks()?.to_vec();
                let mut disc = self.disc(0)?;
                disc.set_tracks(tracks);
                disc
            }
        };
        Ok(self.one_disc.insert(disc))
    }

    /// Discs holding at least one track.
    pub fn discs(&mut self) -> Result<&[Disc]> {
        if self.discs.is_empty() {
            if let Some(id) = row_id(self.id) {
                for number in self.collection.album_discs(id)? {
                    let mut disc = self.disc(number)?;
                    if !disc.tracks()?.is_empty() {
                        self.discs.push(disc);
                    }
                }
            }
        }
        Ok(&self.discs)
    }

    /// Index of a track in the album, or the track count when absent.
    pub fn position_of(&mut self, track_id: ItemId) -> Result<usize> {
        let tracks = self.tracks()?;
        Ok(tracks
            .iter()
            .position(|track| track.id() == Some(track_id))
            .unwrap_or(tracks.len()))
    }

    pub fn is_first(&mut self, track_id: ItemId) -> Result<bool> {
        Ok(self.tracks()?.first().and_then(Track::id) == Some(track_id))
    }

    pub fn is_last(&mut self, track_id: ItemId) -> Result<bool> {
        Ok(self.tracks()?.last().and_then(Track::id) == Some(track_id))
    }

    fn disc(&self, number: i64) -> Result<Disc> {
        Ok(Disc::new(
            self.collection.clone(),
            self.id,
            number,
            self.genre_ids.clone(),
            self.artist_ids()?,
            self.storage_type()?,
            self.allow_track_skipping,
        ))
    }

    fn fresh_track(&self, track: &Track) -> Track {
        Track::for_album(self.collection.clone(), track.id(), self.id)
    }

    fn sibling(&self) -> Album {
        let mut album = Album::new(
            self.collection.clone(),
            self.id,
            self.genre_ids.clone(),
            Vec::new(),
        );
        album.fields = self.fields.clone();
        album.allow_track_skipping = self.allow_track_skipping;
        album
    }

    fn store(&mut self, save: bool) -> Result<()> {
        let Some(id) = row_id(self.id) else {
            return Ok(());
        };
        self.collection.set_album_storage_type(id, saved_storage(save))?;
        self.collection.touch_album_mtime(id)?;
        self.reset(AlbumField::Mtime);
        self.reset(AlbumField::StorageType);

        let update = if save { ScanUpdate::Added } else { ScanUpdate::Removed };
        for artist_id in self.artist_ids()? {
            self.collection.notify(CollectionEvent::ArtistUpdated { artist_id, update });
        }
        self.collection.notify(CollectionEvent::AlbumUpdated { album_id: id, update });
        Ok(())
    }
}

fn saved_storage(save: bool) -> StorageType {
    if save {
        StorageType::SAVED
    } else {
        StorageType::EPHEMERAL
    }
}

impl Scored for Album {
    fn score_id(&self) -> Option<ItemId> {
        self.id.filter(|id| *id != ItemId::EXTERNALS)
    }

    fn score_collection(&self) -> &Collection {
        &self.collection
    }

    fn score_table(&self) -> Table {
        Table::Albums
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{sample_album, sample_collection};
    use crate::db::AlbumRecord;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn album(collection: &Collection, id: ItemId) -> Album {
        Album::new(collection.clone(), Some(id), Vec::new(), Vec::new())
    }

    fn names(tracks: &[Track]) -> Vec<String> {
        tracks.iter().map(|t| t.name().unwrap()).collect()
    }

    #[test]
    fn test_lazy_fields() {
        let (collection, album_id) = sample_collection();
        let album = album(&collection, album_id);

        assert_eq!(album.title().unwrap(), "Field Recordings");
        assert_eq!(album.artists().unwrap(), vec!["Ada Lane", "The Ferns"]);
        assert_eq!(album.year().unwrap(), Some(2019));
        assert_eq!(album.duration().unwrap(), Milliseconds(620_000));
        assert_eq!(album.mb_album_id().unwrap().as_deref(), Some("mb-album-1"));
        assert!(!album.loved().unwrap());
        assert!(!album.is_web().unwrap());
    }

    #[test]
    fn test_defaults_without_row() {
        let (collection, _) = sample_collection();

        let none = Album::new(collection.clone(), None, Vec::new(), Vec::new());
        assert_eq!(none.name().unwrap(), "");
        assert_eq!(none.mtime().unwrap(), 1);
        assert_eq!(none.year().unwrap(), None);
        assert_eq!(none.tracks_count().unwrap(), 0);

        let mut radios = Album::new(collection, Some(ItemId::RADIOS), Vec::new(), Vec::new());
        assert!(radios.tracks().unwrap().is_empty());
        assert!(radios.discs().unwrap().is_empty());
        assert_eq!(radios.storage_type().unwrap(), StorageType::NONE);
    }

    #[test]
    fn test_discs_and_tracks() {
        let (collection, album_id) = sample_collection();
        let mut album = album(&collection, album_id);

        let numbers: Vec<i64> = album.discs().unwrap().iter().map(Disc::number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(names(album.tracks().unwrap()), vec!["Morning", "Noon", "Dusk"]);
        assert_eq!(album.tracks_count().unwrap(), 3);
        assert_eq!(album.disc_names(1).unwrap(), vec!["Day"]);

        let one = album.one_disc().unwrap();
        assert_eq!(one.number(), 0);
        assert_eq!(one.loaded_tracks().len(), 3);
    }

    #[test]
    fn test_positions() {
        let (collection, album_id) = sample_collection();
        let mut album = album(&collection, album_id);
        let ids = album.track_ids().unwrap();

        assert!(album.is_first(ids[0]).unwrap());
        assert!(!album.is_first(ids[1]).unwrap());
        assert!(album.is_last(ids[2]).unwrap());
        assert_eq!(album.position_of(ids[1]).unwrap(), 1);
        assert_eq!(album.position_of(ItemId::new(9999)).unwrap(), 3);
    }

    #[test]
    fn test_genre_filter() {
        let (collection, album_id) = sample_collection();
        let ambient = collection.insert_genre("Ambient").unwrap();

        let mut album = Album::new(collection, Some(album_id), vec![ambient], Vec::new());
        assert_eq!(names(album.tracks().unwrap()), vec!["Dusk"]);
    }

    #[test]
    fn test_skipping() {
        let (collection, album_id) = sample_collection();

        let mut album = album(&collection, album_id);
        let skipped = album.with_skipping_allowed().unwrap();
        assert_eq!(names(skipped.loaded_tracks()), vec!["Morning", "Noon"]);

        album.set_skipping_allowed();
        album.reset_tracks();
        assert_eq!(names(album.tracks().unwrap()), vec!["Morning", "Noon"]);
        // Disc 2 only held the disliked track
        assert_eq!(album.discs().unwrap().len(), 1);
    }

    #[test]
    fn test_set_tracks_returns_displaced() {
        let (collection, album_id) = sample_collection();
        let mut album = album(&collection, album_id);
        let tracks = album.tracks().unwrap().to_vec();

        let displaced = album.set_tracks(vec![tracks[0].clone()]).unwrap();
        assert_eq!(names(album.loaded_tracks()), vec!["Morning"]);
        assert_eq!(names(displaced.loaded_tracks()), vec!["Noon", "Dusk"]);
        assert_eq!(displaced.id(), Some(album_id));

        assert!(album.set_tracks(vec![tracks[0].clone()]).is_none());
    }

    #[test]
    fn test_append_and_remove() {
        let (collection, album_id) = sample_collection();
        let mut source = album(&collection, album_id);
        let tracks = source.tracks().unwrap().to_vec();

        let mut target = Album::new(collection, Some(album_id), Vec::new(), Vec::new());
        target.append_tracks(&tracks[..2]);
        target.adopt_track(tracks[2].clone());
        assert_eq!(target.tracks_count().unwrap(), 3);

        let ids = target.track_ids().unwrap();
        assert!(!target.remove_track(ids[0]).unwrap());
        assert!(!target.remove_track(ids[1]).unwrap());
        assert!(target.remove_track(ids[2]).unwrap());
    }

    #[test]
    fn test_get_track() {
        let (collection, album_id) = sample_collection();
        let mut album = album(&collection, album_id);
        let ids = album.track_ids().unwrap();

        assert_eq!(album.get_track(ids[1]).unwrap().name().unwrap(), "Noon");
        assert_eq!(album.get_track(ItemId::new(4242)).unwrap().id(), None);
    }

    #[test]
    fn test_set_loved_and_uri() {
        let (collection, album_id) = sample_collection();
        let mut events = collection.subscribe();
        let mut album = album(&collection, album_id);

        album.set_loved(true).unwrap();
        assert!(album.loved().unwrap());
        assert_eq!(collection.album_loved(album_id).unwrap(), Some(true));
        assert!(matches!(
            events.try_recv().unwrap(),
            CollectionEvent::LovedChanged { loved: true, .. }
        ));

        album.set_uri("file:///elsewhere").unwrap();
        assert_eq!(album.uri().unwrap(), "file:///elsewhere");
        assert_eq!(
            collection.album_uri(album_id).unwrap().as_deref(),
            Some("file:///elsewhere")
        );
        assert_eq!(
            events.try_recv().unwrap(),
            CollectionEvent::AlbumUpdated { album_id, update: ScanUpdate::Modified }
        );
    }

    #[test]
    fn test_save() {
        let (collection, album_id) = sample_collection();
        let mut events = collection.subscribe();
        let mut album = album(&collection, album_id);
        let track_ids = album.track_ids().unwrap();
        assert_eq!(album.storage_type().unwrap(), StorageType::COLLECTION);

        album.save(true).unwrap();
        assert_eq!(album.storage_type().unwrap(), StorageType::SAVED);
        for id in &track_ids {
            assert_eq!(
                collection.track_storage_type(*id).unwrap(),
                Some(StorageType::SAVED)
            );
        }

        // Two album artists, then the album itself
        let mut artist_updates = 0;
        loop {
            match events.try_recv().unwrap() {
                CollectionEvent::ArtistUpdated { update, .. } => {
                    assert_eq!(update, ScanUpdate::Added);
                    artist_updates += 1;
                }
                CollectionEvent::AlbumUpdated { album_id: id, update } => {
                    assert_eq!(id, album_id);
                    assert_eq!(update, ScanUpdate::Added);
                    break;
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(artist_updates, 2);

        album.save(false).unwrap();
        assert_eq!(album.storage_type().unwrap(), StorageType::EPHEMERAL);
        assert!(album.is_web().unwrap());
    }

    #[test]
    fn test_save_track() {
        let (collection, album_id) = sample_collection();
        let mut album = album(&collection, album_id);
        let track = album.tracks().unwrap()[0].clone();

        album.save_track(false, &track).unwrap();
        assert_eq!(
            collection.track_storage_type(track.id().unwrap()).unwrap(),
            Some(StorageType::EPHEMERAL)
        );
        assert_eq!(album.storage_type().unwrap(), StorageType::EPHEMERAL);
    }

    #[test]
    fn test_set_synced() {
        let (collection, album_id) = sample_collection();
        let mut album = album(&collection, album_id);

        album.set_synced(0b101).unwrap();
        assert_eq!(album.synced().unwrap(), 0b101);
        assert_eq!(collection.album_synced(album_id).unwrap(), Some(0b101));
    }

    #[test]
    fn test_scores() {
        let (collection, album_id) = sample_collection();
        let album = album(&collection, album_id);

        album.set_rate(4).unwrap();
        assert_eq!(album.rate().unwrap(), 4);

        collection.set_popularity(Table::Albums, album_id, 8).unwrap();
        assert_eq!(album.popularity_stars().unwrap(), 5);
        album.set_popularity_stars(2);
        // avg 8, best 8: 2 * 8 / 5 rounded
        assert_eq!(collection.popularity(Table::Albums, album_id).unwrap(), 3);
    }

    struct CountingLoader(Arc<AtomicUsize>);

    #[async_trait::async_trait]
    impl WebTrackLoader for CountingLoader {
        async fn load_tracks(
            &self,
            mb_album_id: &str,
            storage_type: StorageType,
            _cancellable: &Cancellable,
        ) -> Result<()> {
            assert_eq!(mb_album_id, "mb-web-1");
            assert_eq!(storage_type, StorageType::SPOTIFY_NEW_RELEASES);
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_load_tracks() {
        let collection = Collection::open_in_memory().unwrap();
        let local_id = collection.import_album(&sample_album()).unwrap();
        let web_id = collection
            .import_album(&AlbumRecord {
                name: "Web Release".to_string(),
                mb_album_id: Some("mb-web-1".to_string()),
                storage_type: StorageType::SPOTIFY_NEW_RELEASES,
                synced: 0b11,
                ..sample_album()
            })
            .unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let loader = CountingLoader(calls.clone());
        let cancellable = Cancellable::new();

        let mut local = album(&collection, local_id);
        assert!(!local.load_tracks(&loader, &cancellable).await.unwrap());

        // Three tracks against a synced mask of 3
        let mut web = album(&collection, web_id);
        assert!(web.load_tracks(&loader, &cancellable).await.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        web.set_synced(5).unwrap();
        assert!(web.load_tracks(&loader, &cancellable).await.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(web.loaded_tracks().is_empty());
    }
}
