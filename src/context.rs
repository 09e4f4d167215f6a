//! Application context
//!
//! Holds what the desktop application used to reach through its global
//! singleton: configuration, the collection and, in the daemon, the player.

use tracing::info;

use crate::config::Config;
use crate::db::Collection;
use crate::error::{Error, Result};
use crate::objects::{Album, Track};
use crate::player::{AudioBackend, Player, PlayerHandle};
use crate::types::{row_id, ItemId};

#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: Config,
    pub collection: Collection,
    player: Option<PlayerHandle>,
}

impl AppContext {
    /// Open the collection named by the configuration.
    pub async fn open(config: Config) -> Result<Self> {
        let data_dir = config.data_dir()?;
        let collection = Collection::open(&config.database, &data_dir).await?;
        info!("Collection opened at {}", config.database_path()?.display());
        Ok(Self::with_collection(config, collection))
    }

    #[must_use]
    pub fn with_collection(config: Config, collection: Collection) -> Self {
        Self {
            config,
            collection,
            player: None,
        }
    }

    /// Create the player on top of `backend` and keep a handle to it.
    pub fn attach_player(&mut self, backend: Box<dyn AudioBackend>) -> PlayerHandle {
        let player = Player::new(self.collection.clone(), backend, &self.config.playback);
        let handle = player.into_handle();
        self.player = Some(handle.clone());
        handle
    }

    #[must_use]
    pub const fn player(&self) -> Option<&PlayerHandle> {
        self.player.as_ref()
    }

    /// Album view for a collection row, failing when the row does not exist.
    pub fn album(&self, id: ItemId) -> Result<Album> {
        let id = row_id(Some(id)).ok_or(Error::InvalidId(id.get()))?;
        if self.collection.album_name(id)?.is_none() {
            return Err(Error::InvalidId(id.get()));
        }
        Ok(Album::new(self.collection.clone(), Some(id), Vec::new(), Vec::new()))
    }

    /// Track view for a collection row, failing when the row does not exist.
    pub fn track(&self, id: ItemId) -> Result<Track> {
        let id = row_id(Some(id)).ok_or(Error::InvalidId(id.get()))?;
        if self.collection.track_uri(id)?.is_none() {
            return Err(Error::InvalidId(id.get()));
        }
        Ok(Track::new(self.collection.clone(), Some(id)))
    }
}
