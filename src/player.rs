//! Playlist and transport state
//!
//! The [`Player`] owns the playlist and drives an [`AudioBackend`]. Every
//! state change is broadcast as a [`PlayerEvent`] so that the MPRIS server
//! can emit property changes.

use std::str::FromStr;
use std::sync::Arc;

use derive_more::Display;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::config::{PlaybackConfig, EQUALIZER_BANDS};
use crate::db::Collection;
use crate::error::{Error, Result};
use crate::objects::{Album, Track};
use crate::playback::filter::clamp_gain;
use crate::types::{ItemId, Microseconds, Milliseconds};

/// Going back past this position restarts the current track instead.
const RESTART_THRESHOLD: Milliseconds = Milliseconds(3_000);

const EVENT_CAPACITY: usize = 64;

/// Shared player handle
pub type PlayerHandle = Arc<Mutex<Player>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum PlaybackStatus {
    Playing,
    Paused,
    #[default]
    Stopped,
}

/// Repeat mode, named as MPRIS names it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum LoopStatus {
    #[default]
    None,
    Track,
    Playlist,
}

impl FromStr for LoopStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "None" => Ok(Self::None),
            "Track" => Ok(Self::Track),
            "Playlist" => Ok(Self::Playlist),
            other => Err(Error::playback(format!("Unknown loop status: {other}"))),
        }
    }
}

/// Events emitted by the player
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    StatusChanged(PlaybackStatus),
    /// A new track is current, `None` when the playlist ran out
    TrackChanged(Option<ItemId>),
    /// Position jumped, in microseconds as MPRIS reports it
    Seeked(Microseconds),
    VolumeChanged(f64),
    /// Shuffle or loop status changed
    OptionsChanged,
}

/// Output side of the player.
///
/// The GStreamer implementation lives in `playback::gst`; tests use a
/// recording double.
pub trait AudioBackend: Send {
    fn load(&mut self, uri: &str) -> Result<()>;

    fn set_status(&mut self, status: PlaybackStatus) -> Result<()>;

    fn seek(&mut self, position: Milliseconds) -> Result<()>;

    fn position(&self) -> Milliseconds;

    fn set_volume(&mut self, volume: f64);

    /// Set one equalizer band gain in dB. No-op without an equalizer.
    fn set_equalizer(&mut self, band: usize, gain: f64);

    /// True once after the current stream reached its end.
    fn poll_finished(&mut self) -> bool {
        false
    }
}

pub struct Player {
    collection: Collection,
    backend: Box<dyn AudioBackend>,
    playlist: Vec<Track>,
    index: Option<usize>,
    /// Playlist indices in shuffled play order
    shuffle_order: Vec<usize>,
    status: PlaybackStatus,
    volume: f64,
    shuffle: bool,
    loop_status: LoopStatus,
    events: broadcast::Sender<PlayerEvent>,
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("playlist", &self.playlist.len())
            .field("index", &self.index)
            .field("status", &self.status)
            .field("volume", &self.volume)
            .field("shuffle", &self.shuffle)
            .field("loop_status", &self.loop_status)
            .finish_non_exhaustive()
    }
}

impl Player {
    pub fn new(collection: Collection, backend: Box<dyn AudioBackend>, config: &PlaybackConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let mut player = Self {
            collection,
            backend,
            playlist: Vec::new(),
            index: None,
            shuffle_order: Vec::new(),
            status: PlaybackStatus::Stopped,
            volume: config.volume.clamp(0.0, 1.0),
            shuffle: false,
            loop_status: LoopStatus::None,
            events,
        };
        player.backend.set_volume(player.volume);
        player
    }

    /// Wrap the player for sharing with the MPRIS server.
    pub fn into_handle(self) -> PlayerHandle {
        Arc::new(Mutex::new(self))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: PlayerEvent) {
        let _ = self.events.send(event);
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Replace the playlist with the album tracks and start playing.
    pub fn load_album(&mut self, album: &mut Album) -> Result<()> {
        let tracks = album.tracks()?.to_vec();
        if tracks.is_empty() {
            return Err(Error::playback(format!(
                "Album {} has no playable tracks",
                album.title()?
            )));
        }
        self.load_tracks(tracks, 0)
    }

    /// Replace the playlist and start playing at `start`.
    pub fn load_tracks(&mut self, tracks: Vec<Track>, start: usize) -> Result<()> {
        if start >= tracks.len() {
            return Err(Error::playback(format!(
                "Start index {start} out of {} tracks",
                tracks.len()
            )));
        }
        self.playlist = tracks;
        self.rebuild_shuffle_order(start);
        self.go_to(start)?;
        self.play()
    }

    /// Play a file or stream that is not part of the collection.
    pub fn load_uri(&mut self, uri: &str) -> Result<()> {
        let mut track = Track::new(self.collection.clone(), Some(ItemId::EXTERNALS));
        track.set_uri(uri);
        self.load_tracks(vec![track], 0)
    }

    fn go_to(&mut self, index: usize) -> Result<()> {
        let Some(track) = self.playlist.get(index) else {
            return Err(Error::playback(format!("No track at index {index}")));
        };
        let uri = track.uri()?;
        info!("Loading {} ({})", track.title()?, uri);
        self.backend.load(&uri)?;
        self.index = Some(index);
        self.emit(PlayerEvent::TrackChanged(track.id()));
        Ok(())
    }

    fn rebuild_shuffle_order(&mut self, first: usize) {
        let mut order: Vec<usize> = (0..self.playlist.len()).filter(|i| *i != first).collect();
        order.shuffle(&mut rand::rng());
        order.insert(0, first);
        self.shuffle_order = order;
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    fn set_status(&mut self, status: PlaybackStatus) -> Result<()> {
        self.backend.set_status(status)?;
        if self.status != status {
            debug!("Playback status: {}", status);
            self.status = status;
            self.emit(PlayerEvent::StatusChanged(status));
        }
        Ok(())
    }

    pub fn play(&mut self) -> Result<()> {
        if self.index.is_none() {
            debug!("Nothing to play");
            return Ok(());
        }
        self.set_status(PlaybackStatus::Playing)
    }

    pub fn pause(&mut self) -> Result<()> {
        if self.status != PlaybackStatus::Playing {
            return Ok(());
        }
        self.set_status(PlaybackStatus::Paused)
    }

    pub fn play_pause(&mut self) -> Result<()> {
        match self.status {
            PlaybackStatus::Playing => self.pause(),
            _ => self.play(),
        }
    }

    pub fn stop(&mut self) -> Result<()> {
        self.set_status(PlaybackStatus::Stopped)
    }

    /// Index that follows the current one, honoring shuffle and loop status.
    fn next_index(&self) -> Option<usize> {
        let current = self.index?;
        if self.shuffle {
            let position = self.shuffle_order.iter().position(|i| *i == current)?;
            return match self.shuffle_order.get(position + 1) {
                Some(next) => Some(*next),
                None if self.loop_status == LoopStatus::Playlist => {
                    self.shuffle_order.first().copied()
                }
                None => None,
            };
        }
        if current + 1 < self.playlist.len() {
            Some(current + 1)
        } else if self.loop_status == LoopStatus::Playlist {
            Some(0)
        } else {
            None
        }
    }

    fn previous_index(&self) -> Option<usize> {
        let current = self.index?;
        if self.shuffle {
            let position = self.shuffle_order.iter().position(|i| *i == current)?;
            return match position.checked_sub(1) {
                Some(previous) => self.shuffle_order.get(previous).copied(),
                None if self.loop_status == LoopStatus::Playlist => {
                    self.shuffle_order.last().copied()
                }
                None => None,
            };
        }
        match current.checked_sub(1) {
            Some(previous) => Some(previous),
            None if self.loop_status == LoopStatus::Playlist => self.playlist.len().checked_sub(1),
            None => None,
        }
    }

    /// Skip to the next track. Stops at the end of the playlist.
    pub fn next(&mut self) -> Result<()> {
        match self.next_index() {
            Some(index) => {
                self.go_to(index)?;
                self.play()
            }
            None => {
                debug!("End of playlist");
                self.stop()
            }
        }
    }

    /// Go back one track, or restart the current one once it played for a
    /// few seconds.
    pub fn prev(&mut self) -> Result<()> {
        if self.index.is_none() {
            return Ok(());
        }
        let previous = self.previous_index();
        if self.backend.position() > RESTART_THRESHOLD || previous.is_none() {
            return self.seek_to(Milliseconds(0));
        }
        if let Some(index) = previous {
            self.go_to(index)?;
            self.play()?;
        }
        Ok(())
    }

    /// Advance when the backend reports the end of the current stream.
    pub fn tick(&mut self) -> Result<()> {
        if !self.backend.poll_finished() {
            return Ok(());
        }
        match (self.loop_status, self.index) {
            (LoopStatus::Track, Some(index)) => {
                self.go_to(index)?;
                self.play()
            }
            _ => self.next(),
        }
    }

    // ------------------------------------------------------------------
    // Position
    // ------------------------------------------------------------------

    pub fn position(&self) -> Milliseconds {
        self.backend.position()
    }

    fn seek_to(&mut self, position: Milliseconds) -> Result<()> {
        // A stopped backend has no pipeline to seek in.
        if self.status == PlaybackStatus::Stopped {
            debug!("Not seeking to {} while stopped", position);
            return Ok(());
        }
        self.backend.seek(position)?;
        self.emit(PlayerEvent::Seeked(position.to_microseconds()));
        Ok(())
    }

    /// Seek relative to the current position.
    ///
    /// A negative result seeks to the start; going past the end of a track
    /// with a known duration skips to the next track.
    pub fn seek(&mut self, offset: Microseconds) -> Result<()> {
        let Some(track) = self.current() else {
            return Ok(());
        };
        let duration = track.duration()?;
        let target = Milliseconds((self.position().0 + offset.to_milliseconds().0).max(0));

        if duration.0 > 0 && target > duration {
            return self.next();
        }
        self.seek_to(target)
    }

    /// Seek to an absolute position when `track_id` still names the current
    /// track and the position lies within it.
    pub fn set_position(&mut self, track_id: Option<ItemId>, position: Microseconds) -> Result<()> {
        let Some(track) = self.current() else {
            return Ok(());
        };
        if track.id() != track_id {
            debug!("Ignoring position for stale track {:?}", track_id);
            return Ok(());
        }
        let position = position.to_milliseconds();
        let duration = track.duration()?;
        if position.0 < 0 || (duration.0 > 0 && position > duration) {
            debug!("Ignoring out of range position {}", position);
            return Ok(());
        }
        self.seek_to(position)
    }

    // ------------------------------------------------------------------
    // Options
    // ------------------------------------------------------------------

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f64) {
        let volume = volume.clamp(0.0, 1.0);
        self.backend.set_volume(volume);
        if (self.volume - volume).abs() > f64::EPSILON {
            self.volume = volume;
            self.emit(PlayerEvent::VolumeChanged(volume));
        }
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn set_shuffle(&mut self, shuffle: bool) {
        if self.shuffle == shuffle {
            return;
        }
        self.shuffle = shuffle;
        if shuffle {
            self.rebuild_shuffle_order(self.index.unwrap_or(0));
        }
        self.emit(PlayerEvent::OptionsChanged);
    }

    pub fn loop_status(&self) -> LoopStatus {
        self.loop_status
    }

    pub fn set_loop_status(&mut self, loop_status: LoopStatus) {
        if self.loop_status != loop_status {
            self.loop_status = loop_status;
            self.emit(PlayerEvent::OptionsChanged);
        }
    }

    /// Set one equalizer band, in dB. Out of range bands are ignored.
    pub fn set_equalizer(&mut self, band: usize, gain: f64) {
        if band >= EQUALIZER_BANDS {
            warn!("Ignoring equalizer band {}", band);
            return;
        }
        self.backend.set_equalizer(band, clamp_gain(gain));
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn current(&self) -> Option<&Track> {
        self.playlist.get(self.index?)
    }

    pub fn playlist(&self) -> &[Track] {
        &self.playlist
    }

    pub fn can_go_next(&self) -> bool {
        self.next_index().is_some()
    }

    pub fn can_go_previous(&self) -> bool {
        self.previous_index().is_some()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::tests::sample_collection;
    use std::sync::Mutex as StdMutex;

    /// Backend double recording every call.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct Recorder {
        pub calls: Arc<StdMutex<Vec<String>>>,
        pub position: Arc<StdMutex<Milliseconds>>,
        pub finished: Arc<StdMutex<bool>>,
        pub stopped: Arc<StdMutex<bool>>,
    }

    impl Recorder {
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn set_position(&self, position: Milliseconds) {
            *self.position.lock().unwrap() = position;
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl AudioBackend for Recorder {
        fn load(&mut self, uri: &str) -> Result<()> {
            self.record(format!("load {uri}"));
            self.set_position(Milliseconds(0));
            Ok(())
        }

        fn set_status(&mut self, status: PlaybackStatus) -> Result<()> {
            self.record(format!("status {status}"));
            *self.stopped.lock().unwrap() = status == PlaybackStatus::Stopped;
            Ok(())
        }

        fn seek(&mut self, position: Milliseconds) -> Result<()> {
            if *self.stopped.lock().unwrap() {
                return Err(Error::playback("Cannot seek a stopped pipeline"));
            }
            self.record(format!("seek {}", position.0));
            self.set_position(position);
            Ok(())
        }

        fn position(&self) -> Milliseconds {
            *self.position.lock().unwrap()
        }

        fn set_volume(&mut self, volume: f64) {
            self.record(format!("volume {volume}"));
        }

        fn set_equalizer(&mut self, band: usize, gain: f64) {
            self.record(format!("band{band} {gain}"));
        }

        fn poll_finished(&mut self) -> bool {
            std::mem::take(&mut *self.finished.lock().unwrap())
        }
    }

    pub(crate) fn sample_player() -> (Player, Recorder, Album) {
        let (collection, album_id) = sample_collection();
        let recorder = Recorder::default();
        let player = Player::new(
            collection.clone(),
            Box::new(recorder.clone()),
            &PlaybackConfig::default(),
        );
        let album = Album::new(collection, Some(album_id), Vec::new(), Vec::new());
        (player, recorder, album)
    }

    fn current_name(player: &Player) -> String {
        player.current().unwrap().name().unwrap()
    }

    #[test]
    fn test_load_album_plays_first_track() {
        let (mut player, recorder, mut album) = sample_player();
        let mut events = player.subscribe();

        player.load_album(&mut album).unwrap();
        assert_eq!(current_name(&player), "Morning");
        assert_eq!(player.status(), PlaybackStatus::Playing);
        assert!(recorder
            .calls()
            .contains(&"load file:///music/field/01%20Morning.flac".to_string()));

        let first = album.track_ids().unwrap()[0];
        assert_eq!(events.try_recv().unwrap(), PlayerEvent::TrackChanged(Some(first)));
        assert_eq!(
            events.try_recv().unwrap(),
            PlayerEvent::StatusChanged(PlaybackStatus::Playing)
        );
    }

    #[test]
    fn test_transport() {
        let (mut player, _recorder, mut album) = sample_player();

        // Nothing loaded yet
        player.play().unwrap();
        assert_eq!(player.status(), PlaybackStatus::Stopped);

        player.load_album(&mut album).unwrap();
        player.play_pause().unwrap();
        assert_eq!(player.status(), PlaybackStatus::Paused);
        player.play_pause().unwrap();
        assert_eq!(player.status(), PlaybackStatus::Playing);
        player.stop().unwrap();
        assert_eq!(player.status(), PlaybackStatus::Stopped);
        // Pausing a stopped player does nothing
        player.pause().unwrap();
        assert_eq!(player.status(), PlaybackStatus::Stopped);
    }

    #[test]
    fn test_next_and_prev() {
        let (mut player, recorder, mut album) = sample_player();
        player.load_album(&mut album).unwrap();

        assert!(!player.can_go_previous());
        player.next().unwrap();
        assert_eq!(current_name(&player), "Noon");
        assert!(player.can_go_previous());

        player.next().unwrap();
        assert_eq!(current_name(&player), "Dusk");
        assert!(!player.can_go_next());

        // Past the end the player stops on the last track
        player.next().unwrap();
        assert_eq!(player.status(), PlaybackStatus::Stopped);
        assert_eq!(current_name(&player), "Dusk");

        player.prev().unwrap();
        assert_eq!(current_name(&player), "Noon");

        // Far into the track, previous restarts it
        recorder.set_position(Milliseconds(10_000));
        player.prev().unwrap();
        assert_eq!(current_name(&player), "Noon");
        assert_eq!(player.position(), Milliseconds(0));
    }

    #[test]
    fn test_prev_and_seek_while_stopped() {
        let (mut player, recorder, mut album) = sample_player();
        player.load_album(&mut album).unwrap();
        player.stop().unwrap();
        let mut events = player.subscribe();

        // First track, nothing before it: restart would seek
        player.prev().unwrap();
        assert_eq!(current_name(&player), "Morning");
        assert_eq!(player.status(), PlaybackStatus::Stopped);

        player.seek(Microseconds::from_secs(30)).unwrap();
        let ids = album.track_ids().unwrap();
        player.set_position(Some(ids[0]), Microseconds::from_secs(12)).unwrap();

        assert!(!recorder.calls().iter().any(|c| c.starts_with("seek")));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_loop_playlist() {
        let (mut player, _recorder, mut album) = sample_player();
        player.load_album(&mut album).unwrap();
        player.set_loop_status(LoopStatus::Playlist);

        assert!(player.can_go_previous());
        player.prev().unwrap();
        assert_eq!(current_name(&player), "Dusk");
        player.next().unwrap();
        assert_eq!(current_name(&player), "Morning");
    }

    #[test]
    fn test_tick_advances_on_end_of_stream() {
        let (mut player, recorder, mut album) = sample_player();
        player.load_album(&mut album).unwrap();

        player.tick().unwrap();
        assert_eq!(current_name(&player), "Morning");

        *recorder.finished.lock().unwrap() = true;
        player.tick().unwrap();
        assert_eq!(current_name(&player), "Noon");

        player.set_loop_status(LoopStatus::Track);
        *recorder.finished.lock().unwrap() = true;
        player.tick().unwrap();
        assert_eq!(current_name(&player), "Noon");
    }

    #[test]
    fn test_shuffle_visits_every_track() {
        let (mut player, _recorder, mut album) = sample_player();
        player.load_album(&mut album).unwrap();
        player.set_shuffle(true);
        assert!(player.shuffle());

        let mut seen = vec![current_name(&player)];
        while player.can_go_next() {
            player.next().unwrap();
            seen.push(current_name(&player));
        }
        seen.sort();
        assert_eq!(seen, vec!["Dusk", "Morning", "Noon"]);
    }

    #[test]
    fn test_seek() {
        let (mut player, recorder, mut album) = sample_player();
        player.load_album(&mut album).unwrap();
        let mut events = player.subscribe();

        player.seek(Microseconds::from_secs(30)).unwrap();
        assert_eq!(player.position(), Milliseconds(30_000));
        assert_eq!(
            events.try_recv().unwrap(),
            PlayerEvent::Seeked(Microseconds(30_000_000))
        );

        player.seek(Microseconds::from_secs(-60)).unwrap();
        assert_eq!(player.position(), Milliseconds(0));

        // Morning lasts 200 seconds
        player.seek(Microseconds::from_secs(500)).unwrap();
        assert_eq!(current_name(&player), "Noon");
        assert!(recorder.calls().iter().any(|c| c.contains("02%20Noon")));
    }

    #[test]
    fn test_set_position() {
        let (mut player, _recorder, mut album) = sample_player();
        player.load_album(&mut album).unwrap();
        let ids = album.track_ids().unwrap();

        player.set_position(Some(ids[0]), Microseconds::from_secs(12)).unwrap();
        assert_eq!(player.position(), Milliseconds(12_000));

        // Stale track id
        player.set_position(Some(ids[1]), Microseconds::from_secs(20)).unwrap();
        assert_eq!(player.position(), Milliseconds(12_000));

        // Beyond the track length
        player.set_position(Some(ids[0]), Microseconds::from_secs(999)).unwrap();
        assert_eq!(player.position(), Milliseconds(12_000));
    }

    #[test]
    fn test_volume_and_equalizer() {
        let (mut player, recorder, _album) = sample_player();
        let mut events = player.subscribe();

        player.set_volume(1.7);
        assert_eq!(player.volume(), 1.0);
        player.set_volume(0.25);
        assert_eq!(events.try_recv().unwrap(), PlayerEvent::VolumeChanged(0.25));

        player.set_equalizer(2, 30.0);
        player.set_equalizer(12, 1.0);
        let calls = recorder.calls();
        assert!(calls.contains(&"band2 12".to_string()));
        assert!(!calls.iter().any(|c| c.starts_with("band12")));
    }

    #[test]
    fn test_load_uri() {
        let (mut player, recorder, _album) = sample_player();

        player.load_uri("file:///tmp/clip.ogg").unwrap();
        let current = player.current().unwrap();
        assert_eq!(current.id(), Some(ItemId::EXTERNALS));
        assert_eq!(current.uri().unwrap(), "file:///tmp/clip.ogg");
        assert!(recorder.calls().contains(&"load file:///tmp/clip.ogg".to_string()));

        // Unknown duration does not block seeking
        player.seek(Microseconds::from_secs(90)).unwrap();
        assert_eq!(player.position(), Milliseconds(90_000));
    }

    #[test]
    fn test_loop_status_parsing() {
        assert_eq!("Playlist".parse::<LoopStatus>().unwrap(), LoopStatus::Playlist);
        assert_eq!(LoopStatus::Track.to_string(), "Track");
        assert!("Forever".parse::<LoopStatus>().is_err());
        assert_eq!(PlaybackStatus::Paused.to_string(), "Paused");
    }
}
