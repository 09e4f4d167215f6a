//! Domain objects over the collection
//!
//! [`Album`], [`Disc`] and [`Track`] are thin views over collection rows.
//! Column values are read on first access and cached until reset.

#[macro_use]
mod macros;

pub mod album;
pub mod disc;
pub mod lazy;
pub mod track;

pub use album::{Album, AlbumField};
pub use disc::Disc;
pub use track::{file_path_from_uri, Track, TrackField};

use async_trait::async_trait;
use tracing::error;

use crate::db::{Collection, CollectionEvent, Table};
use crate::error::{Error, Result};
use crate::types::{Cancellable, ItemId, StorageType};

/// Highest star count of the popularity scale.
pub const MAX_STARS: u8 = 5;

/// Fetches the tracks of a web album into the collection.
#[async_trait]
pub trait WebTrackLoader: Send + Sync {
    async fn load_tracks(
        &self,
        mb_album_id: &str,
        storage_type: StorageType,
        cancellable: &Cancellable,
    ) -> Result<()>;
}

/// Popularity and rating shared by albums and tracks.
///
/// Popularity is stored as a raw play counter and exposed as stars relative
/// to the collection average.
pub trait Scored {
    fn score_id(&self) -> Option<ItemId>;

    fn score_collection(&self) -> &Collection;

    fn score_table(&self) -> Table;

    /// Radio name used as key when the object stands for a radio.
    fn radio_name(&self) -> Option<String> {
        None
    }

    /// Popularity in stars, `0..=5`.
    fn popularity_stars(&self) -> Result<u8> {
        let Some(id) = self.score_id() else {
            return Ok(0);
        };
        let collection = self.score_collection();

        if !id.is_virtual() {
            let avg = collection.avg_popularity(self.score_table())?;
            if avg <= 0.0 {
                return Ok(0);
            }
            let popularity = collection.popularity(self.score_table(), id)?;
            Ok(stars_from_popularity(popularity, avg))
        } else if id == ItemId::RADIOS {
            let Some(name) = self.radio_name() else {
                return Ok(0);
            };
            let avg = collection.radio_avg_popularity()?;
            if avg <= 0.0 {
                return Ok(0);
            }
            Ok(stars_from_popularity(collection.radio_popularity(&name)?, avg))
        } else {
            Ok(0)
        }
    }

    /// Store a popularity given in stars. Failures are logged.
    fn set_popularity_stars(&self, stars: u8) {
        let Some(id) = self.score_id() else {
            return;
        };
        let stars = stars.min(MAX_STARS);
        let collection = self.score_collection();

        let result = if !id.is_virtual() {
            let table = self.score_table();
            collection.avg_popularity(table).and_then(|avg| {
                let best = collection.higher_popularity(table)?;
                collection.set_popularity(table, id, popularity_from_stars(stars, avg, best))
            })
        } else if id == ItemId::RADIOS {
            match self.radio_name() {
                Some(name) => collection.radio_avg_popularity().and_then(|avg| {
                    let best = collection.radio_higher_popularity()?;
                    collection.set_radio_popularity(&name, popularity_from_stars(stars, avg, best))
                }),
                None => Ok(()),
            }
        } else {
            Ok(())
        };

        if let Err(e) = result {
            error!("Failed to set popularity of {}: {}", id, e);
        }
    }

    /// User rating, `-1..=5`.
    fn rate(&self) -> Result<i64> {
        match self.score_id() {
            Some(id) if !id.is_virtual() => {
                self.score_collection().rate(self.score_table(), id)
            }
            Some(ItemId::RADIOS) => match self.radio_name() {
                Some(name) => self.score_collection().radio_rate(&name),
                None => Ok(0),
            },
            _ => Ok(0),
        }
    }

    fn set_rate(&self, rate: i64) -> Result<()> {
        if !(-1..=i64::from(MAX_STARS)).contains(&rate) {
            return Err(Error::other(format!("Rate {} out of range -1..=5", rate)));
        }
        let collection = self.score_collection();
        match self.score_id() {
            Some(ItemId::RADIOS) => match self.radio_name() {
                Some(name) => collection.set_radio_rate(&name, rate),
                None => Ok(()),
            },
            Some(id) if !id.is_virtual() => {
                collection.set_rate(self.score_table(), id, rate)?;
                collection.notify(CollectionEvent::RateChanged { id, rate });
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Stars for a raw popularity, relative to the average popularity.
pub fn stars_from_popularity(popularity: i64, avg: f64) -> u8 {
    if avg <= 0.0 {
        return 0;
    }
    let stars = (popularity as f64 * f64::from(MAX_STARS) / avg + 0.5).floor();
    stars.clamp(0.0, f64::from(MAX_STARS)) as u8
}

/// Raw popularity for a star count.
///
/// Five stars pull the value halfway towards the most popular row.
pub fn popularity_from_stars(stars: u8, avg: f64, best: i64) -> i64 {
    let popularity = (f64::from(stars) * avg / f64::from(MAX_STARS) + 0.5) as i64;
    if stars == MAX_STARS {
        (popularity + best) / 2
    } else {
        popularity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stars_from_popularity() {
        assert_eq!(stars_from_popularity(10, 10.0), 5);
        assert_eq!(stars_from_popularity(5, 10.0), 3);
        assert_eq!(stars_from_popularity(0, 10.0), 0);
        // Far above the average still caps at five stars
        assert_eq!(stars_from_popularity(100, 10.0), 5);
        assert_eq!(stars_from_popularity(10, 0.0), 0);
    }

    #[test]
    fn test_popularity_from_stars() {
        assert_eq!(popularity_from_stars(0, 10.0, 40), 0);
        assert_eq!(popularity_from_stars(3, 10.0, 40), 6);
        // (10 + 40) / 2
        assert_eq!(popularity_from_stars(5, 10.0, 40), 25);
    }
}
