//! MPRIS interfaces and event forwarding

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};
use zbus::object_server::{InterfaceRef, SignalEmitter};
use zbus::zvariant::{ObjectPath, OwnedValue};
use zbus::{connection, fdo, interface, Connection};

use crate::config::MprisConfig;
use crate::db::{Collection, CollectionEvent};
use crate::error::Result;
use crate::player::{LoopStatus, PlayerEvent, PlayerHandle};
use crate::types::Microseconds;

use super::{
    parse_track_id, track_metadata, MPRIS_PATH, MPRIS_PREFIX, SUPPORTED_MIME_TYPES,
    SUPPORTED_URI_SCHEMES,
};

/// `org.mpris.MediaPlayer2`
pub struct MprisRoot {
    identity: String,
    desktop_entry: String,
    quit: Arc<Notify>,
}

impl MprisRoot {
    pub fn new(config: &MprisConfig, quit: Arc<Notify>) -> Self {
        Self {
            identity: config.identity.clone(),
            desktop_entry: config.desktop_entry.clone(),
            quit,
        }
    }
}

#[interface(name = "org.mpris.MediaPlayer2")]
impl MprisRoot {
    fn raise(&self) {
        debug!("Raise requested, no window to show");
    }

    fn quit(&self) {
        info!("Quit requested over D-Bus");
        self.quit.notify_one();
    }

    #[zbus(property(emits_changed_signal = "const"))]
    fn can_quit(&self) -> bool {
        true
    }

    #[zbus(property(emits_changed_signal = "const"))]
    fn can_raise(&self) -> bool {
        false
    }

    #[zbus(property(emits_changed_signal = "const"))]
    fn has_track_list(&self) -> bool {
        false
    }

    #[zbus(property(emits_changed_signal = "const"))]
    fn identity(&self) -> String {
        self.identity.clone()
    }

    #[zbus(property(emits_changed_signal = "const"))]
    fn desktop_entry(&self) -> String {
        self.desktop_entry.clone()
    }

    #[zbus(property(emits_changed_signal = "const"))]
    fn supported_uri_schemes(&self) -> Vec<String> {
        SUPPORTED_URI_SCHEMES.iter().map(ToString::to_string).collect()
    }

    #[zbus(property(emits_changed_signal = "const"))]
    fn supported_mime_types(&self) -> Vec<String> {
        SUPPORTED_MIME_TYPES.iter().map(ToString::to_string).collect()
    }
}

/// `org.mpris.MediaPlayer2.Player`
pub struct MprisPlayer {
    player: PlayerHandle,
}

impl MprisPlayer {
    pub fn new(player: PlayerHandle) -> Self {
        Self { player }
    }
}

#[interface(name = "org.mpris.MediaPlayer2.Player")]
impl MprisPlayer {
    async fn next(&self) -> fdo::Result<()> {
        Ok(self.player.lock().await.next()?)
    }

    async fn previous(&self) -> fdo::Result<()> {
        Ok(self.player.lock().await.prev()?)
    }

    async fn pause(&self) -> fdo::Result<()> {
        Ok(self.player.lock().await.pause()?)
    }

    async fn play_pause(&self) -> fdo::Result<()> {
        Ok(self.player.lock().await.play_pause()?)
    }

    async fn stop(&self) -> fdo::Result<()> {
        Ok(self.player.lock().await.stop()?)
    }

    async fn play(&self) -> fdo::Result<()> {
        Ok(self.player.lock().await.play()?)
    }

    async fn seek(&self, offset: i64) -> fdo::Result<()> {
        Ok(self.player.lock().await.seek(Microseconds(offset))?)
    }

    async fn set_position(&self, track_id: ObjectPath<'_>, position: i64) -> fdo::Result<()> {
        let track_id = parse_track_id(track_id.as_str());
        Ok(self
            .player
            .lock()
            .await
            .set_position(track_id, Microseconds(position))?)
    }

    async fn open_uri(&self, uri: &str) -> fdo::Result<()> {
        let scheme = uri.split_once(':').map_or("", |(scheme, _)| scheme);
        if !SUPPORTED_URI_SCHEMES.contains(&scheme) {
            return Err(fdo::Error::NotSupported(format!("Unsupported uri: {uri}")));
        }
        Ok(self.player.lock().await.load_uri(uri)?)
    }

    #[zbus(property)]
    async fn playback_status(&self) -> String {
        self.player.lock().await.status().to_string()
    }

    #[zbus(property)]
    async fn loop_status(&self) -> String {
        self.player.lock().await.loop_status().to_string()
    }

    #[zbus(property)]
    async fn set_loop_status(&mut self, value: String) -> fdo::Result<()> {
        let loop_status: LoopStatus = value
            .parse()
            .map_err(|_| fdo::Error::InvalidArgs(format!("Invalid loop status: {value}")))?;
        self.player.lock().await.set_loop_status(loop_status);
        Ok(())
    }

    #[zbus(property)]
    fn rate(&self) -> f64 {
        1.0
    }

    #[zbus(property)]
    fn set_rate(&mut self, rate: f64) {
        debug!("Ignoring playback rate {}", rate);
    }

    #[zbus(property)]
    async fn shuffle(&self) -> bool {
        self.player.lock().await.shuffle()
    }

    #[zbus(property)]
    async fn set_shuffle(&mut self, value: bool) {
        self.player.lock().await.set_shuffle(value);
    }

    #[zbus(property)]
    async fn metadata(&self) -> fdo::Result<HashMap<String, OwnedValue>> {
        let player = self.player.lock().await;
        Ok(track_metadata(player.current())?)
    }

    #[zbus(property)]
    async fn volume(&self) -> f64 {
        self.player.lock().await.volume()
    }

    #[zbus(property)]
    async fn set_volume(&mut self, value: f64) {
        self.player.lock().await.set_volume(value);
    }

    #[zbus(property(emits_changed_signal = "false"))]
    async fn position(&self) -> i64 {
        self.player.lock().await.position().to_microseconds().0
    }

    #[zbus(property(emits_changed_signal = "const"))]
    fn minimum_rate(&self) -> f64 {
        1.0
    }

    #[zbus(property(emits_changed_signal = "const"))]
    fn maximum_rate(&self) -> f64 {
        1.0
    }

    #[zbus(property)]
    async fn can_go_next(&self) -> bool {
        self.player.lock().await.can_go_next()
    }

    #[zbus(property)]
    async fn can_go_previous(&self) -> bool {
        self.player.lock().await.can_go_previous()
    }

    #[zbus(property)]
    async fn can_play(&self) -> bool {
        self.player.lock().await.current().is_some()
    }

    #[zbus(property)]
    async fn can_pause(&self) -> bool {
        self.player.lock().await.current().is_some()
    }

    #[zbus(property)]
    async fn can_seek(&self) -> bool {
        self.player.lock().await.current().is_some()
    }

    #[zbus(property(emits_changed_signal = "const"))]
    fn can_control(&self) -> bool {
        true
    }

    #[zbus(signal)]
    async fn seeked(emitter: &SignalEmitter<'_>, position: i64) -> zbus::Result<()>;
}

/// MPRIS server bound to the session bus
pub struct MprisServer {
    connection: Connection,
    player: PlayerHandle,
    collection: Collection,
    /// Atomic flag for stop signaling
    running: Arc<AtomicBool>,
}

impl MprisServer {
    /// Claim `org.mpris.MediaPlayer2.<player_name>` and serve both interfaces.
    pub async fn start(
        config: &MprisConfig,
        player: PlayerHandle,
        collection: Collection,
        quit: Arc<Notify>,
    ) -> Result<Self> {
        let bus_name = format!("{MPRIS_PREFIX}{}", config.player_name);
        info!("Serving MPRIS as {}", bus_name);

        let connection = connection::Builder::session()?
            .name(bus_name)?
            .serve_at(MPRIS_PATH, MprisRoot::new(config, quit))?
            .serve_at(MPRIS_PATH, MprisPlayer::new(player.clone()))?
            .build()
            .await?;

        Ok(Self {
            connection,
            player,
            collection,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Forward player and collection events until stopped.
    pub async fn run(&self) -> Result<()> {
        let iface_ref = self
            .connection
            .object_server()
            .interface::<_, MprisPlayer>(MPRIS_PATH)
            .await?;
        let mut player_events = self.player.lock().await.subscribe();
        let mut collection_events = self.collection.subscribe();

        loop {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            tokio::select! {
                event = player_events.recv() => match event {
                    Ok(event) => {
                        if let Err(e) = Self::forward(&iface_ref, &event).await {
                            error!("Failed to forward {:?}: {}", event, e);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Missed {} player events, refreshing everything", skipped);
                        if let Err(e) = Self::refresh_all(&iface_ref).await {
                            error!("Failed to refresh MPRIS properties: {}", e);
                        }
                    }
                    Err(RecvError::Closed) => break,
                },
                event = collection_events.recv() => match event {
                    Ok(CollectionEvent::RateChanged { id, .. }) => {
                        let current = self.player.lock().await.current().and_then(|t| t.id());
                        if current == Some(id) {
                            let iface = iface_ref.get().await;
                            if let Err(e) = iface.metadata_changed(iface_ref.signal_emitter()).await {
                                error!("Failed to announce rate change: {}", e);
                            }
                        }
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                },
                _ = tokio::time::sleep(Duration::from_secs(1)) => {
                    // Periodic check
                }
            }
        }

        info!("MPRIS server stopped");
        Ok(())
    }

    /// Stop the event loop.
    ///
    /// This method is synchronous as it only sets an atomic flag.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    async fn forward(iface_ref: &InterfaceRef<MprisPlayer>, event: &PlayerEvent) -> zbus::Result<()> {
        let emitter = iface_ref.signal_emitter();
        let iface = iface_ref.get().await;
        match event {
            PlayerEvent::StatusChanged(_) => {
                iface.playback_status_changed(emitter).await?;
                iface.can_play_changed(emitter).await?;
                iface.can_pause_changed(emitter).await?;
            }
            PlayerEvent::TrackChanged(_) => {
                iface.metadata_changed(emitter).await?;
                iface.can_go_next_changed(emitter).await?;
                iface.can_go_previous_changed(emitter).await?;
                iface.can_seek_changed(emitter).await?;
            }
            PlayerEvent::Seeked(position) => {
                MprisPlayer::seeked(emitter, position.0).await?;
            }
            PlayerEvent::VolumeChanged(_) => {
                iface.volume_changed(emitter).await?;
            }
            PlayerEvent::OptionsChanged => {
                iface.shuffle_changed(emitter).await?;
                iface.loop_status_changed(emitter).await?;
                iface.can_go_next_changed(emitter).await?;
                iface.can_go_previous_changed(emitter).await?;
            }
        }
        Ok(())
    }

    async fn refresh_all(iface_ref: &InterfaceRef<MprisPlayer>) -> zbus::Result<()> {
        for event in [
            PlayerEvent::StatusChanged(Default::default()),
            PlayerEvent::TrackChanged(None),
            PlayerEvent::VolumeChanged(0.0),
            PlayerEvent::OptionsChanged,
        ] {
            Self::forward(iface_ref, &event).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::tests::sample_player;
    use crate::player::PlaybackStatus;

    #[tokio::test]
    async fn test_player_methods() {
        let (player, _recorder, mut album) = sample_player();
        let handle = player.into_handle();
        let iface = MprisPlayer::new(handle.clone());

        handle.lock().await.load_album(&mut album).unwrap();
        assert_eq!(iface.playback_status().await, "Playing");

        iface.pause().await.unwrap();
        assert_eq!(handle.lock().await.status(), PlaybackStatus::Paused);
        iface.play_pause().await.unwrap();
        assert_eq!(iface.playback_status().await, "Playing");

        iface.next().await.unwrap();
        assert!(iface.can_go_previous().await);
        iface.previous().await.unwrap();
        assert!(!iface.can_go_previous().await);

        iface.stop().await.unwrap();
        assert_eq!(iface.playback_status().await, "Stopped");
    }

    #[tokio::test]
    async fn test_player_properties() {
        let (player, _recorder, mut album) = sample_player();
        let handle = player.into_handle();
        let mut iface = MprisPlayer::new(handle.clone());

        assert!(!iface.can_play().await);
        let metadata = iface.metadata().await.unwrap();
        assert_eq!(metadata.len(), 1);

        handle.lock().await.load_album(&mut album).unwrap();
        assert!(iface.can_seek().await);
        let metadata = iface.metadata().await.unwrap();
        assert!(metadata.contains_key("xesam:title"));

        iface.set_loop_status("Playlist".to_string()).await.unwrap();
        assert_eq!(iface.loop_status().await, "Playlist");
        assert!(iface.set_loop_status("Sometimes".to_string()).await.is_err());

        iface.set_shuffle(true).await;
        assert!(iface.shuffle().await);

        iface.set_volume(0.5).await;
        assert_eq!(iface.volume().await, 0.5);
        assert_eq!(iface.rate(), 1.0);
    }

    #[tokio::test]
    async fn test_seek_and_position() {
        let (player, _recorder, mut album) = sample_player();
        let handle = player.into_handle();
        let iface = MprisPlayer::new(handle.clone());
        handle.lock().await.load_album(&mut album).unwrap();

        iface.seek(5_000_000).await.unwrap();
        assert_eq!(iface.position().await, 5_000_000);

        let track_id = crate::mpris::track_id_path(handle.lock().await.current());
        let path = ObjectPath::try_from(track_id.as_str()).unwrap();
        iface.set_position(path, 20_000_000).await.unwrap();
        assert_eq!(iface.position().await, 20_000_000);

        let stale = ObjectPath::try_from("/org/cadenza/TrackId/9999").unwrap();
        iface.set_position(stale, 1_000_000).await.unwrap();
        assert_eq!(iface.position().await, 20_000_000);
    }

    #[tokio::test]
    async fn test_open_uri() {
        let (player, recorder, _album) = sample_player();
        let handle = player.into_handle();
        let iface = MprisPlayer::new(handle.clone());

        iface.open_uri("file:///tmp/song.flac").await.unwrap();
        assert!(recorder.calls().contains(&"load file:///tmp/song.flac".to_string()));
        assert!(iface.open_uri("smb://server/share.mp3").await.is_err());
    }

    #[test]
    fn test_root_properties() {
        let quit = Arc::new(Notify::new());
        let root = MprisRoot::new(&MprisConfig::default(), quit);
        assert!(root.can_quit());
        assert!(!root.has_track_list());
        assert_eq!(root.identity(), "Cadenza");
        assert!(root.supported_uri_schemes().contains(&"file".to_string()));
    }

    #[tokio::test]
    async fn test_quit_notifies() {
        let quit = Arc::new(Notify::new());
        let root = MprisRoot::new(&MprisConfig::default(), quit.clone());
        root.quit();
        tokio::time::timeout(Duration::from_secs(1), quit.notified())
            .await
            .unwrap();
    }
}
