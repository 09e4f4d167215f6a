//! Domain-specific newtypes for type safety.
//!
//! This module provides strongly-typed wrappers for common domain concepts
//! to prevent mixing up values at compile time. Uses `derive_more` to
//! eliminate arithmetic boilerplate while maintaining zero-cost abstractions.

use std::fmt;
use std::ops::{AddAssign, Sub, SubAssign};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use derive_more::{Add as DeriveAdd, BitAnd, BitOr, From, Into};
use serde::{Deserialize, Serialize};

// ============================================================================
// Macros for reducing boilerplate
// ============================================================================

/// Generates common methods for numeric newtypes.
macro_rules! impl_newtype_common {
    ($type:ty) => {
        impl $type {
            /// Create a new instance.
            #[must_use]
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Get the inner value.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }
    };
}

/// Generates Sub and assignment trait implementations.
macro_rules! impl_sub_traits {
    ($type:ty) => {
        impl Sub for $type {
            type Output = Self;

            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl SubAssign for $type {
            fn sub_assign(&mut self, rhs: Self) {
                self.0 -= rhs.0;
            }
        }

        impl AddAssign for $type {
            fn add_assign(&mut self, rhs: Self) {
                self.0 += rhs.0;
            }
        }
    };
}

// ============================================================================
// ItemId
// ============================================================================

/// A collection row id.
///
/// Non-negative values address real rows. Negative values are sentinels for
/// virtual entities (radios, external files, smart lists) that have no row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl_newtype_common!(ItemId);

impl ItemId {
    pub const NONE: Self = Self(-1);
    pub const POPULARS: Self = Self(-2);
    pub const RANDOMS: Self = Self(-3);
    pub const RECENTS: Self = Self(-4);
    pub const LOVED: Self = Self(-5);
    pub const NEVER: Self = Self(-6);
    pub const PLAYLISTS: Self = Self(-7);
    pub const RADIOS: Self = Self(-8);
    pub const EXTERNALS: Self = Self(-9);

    /// True for sentinel ids that have no backing row.
    #[must_use]
    pub const fn is_virtual(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returns the id when it addresses a real row.
#[must_use]
pub fn row_id(id: Option<ItemId>) -> Option<ItemId> {
    id.filter(|id| !id.is_virtual())
}

// ============================================================================
// StorageType
// ============================================================================

/// Where a track or album comes from, stored as a bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BitAnd, BitOr, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageType(pub i64);

impl StorageType {
    pub const NONE: Self = Self(1 << 0);
    pub const COLLECTION: Self = Self(1 << 1);
    pub const EPHEMERAL: Self = Self(1 << 2);
    pub const SAVED: Self = Self(1 << 3);
    pub const SEARCH: Self = Self(1 << 4);
    pub const EXTERNAL: Self = Self(1 << 5);
    pub const SPOTIFY_NEW_RELEASES: Self = Self(1 << 6);
    pub const SPOTIFY_SIMILARS: Self = Self(1 << 7);
    pub const DEEZER_CHARTS: Self = Self(1 << 8);

    /// Every storage type known to the collection.
    pub const ALL: Self = Self((1 << 9) - 1);

    /// Storage types backed by files on disk.
    pub const LOCAL: Self = Self(Self::COLLECTION.0 | Self::EXTERNAL.0);

    /// Raw bit value as stored in the database.
    #[must_use]
    pub const fn bits(self) -> i64 {
        self.0
    }

    /// True if every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any bit of `other` is set.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// True for content that only exists on a web service.
    #[must_use]
    pub const fn is_web(self) -> bool {
        !self.intersects(Self::LOCAL)
    }
}

// ============================================================================
// Loved / ScanUpdate
// ============================================================================

/// Loved state of a track. Skipped tracks are left out of skip-enabled albums.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Loved {
    Skipped,
    #[default]
    No,
    Yes,
}

impl Loved {
    /// Decode the database representation (-1, 0, 1).
    #[must_use]
    pub const fn from_db(value: i64) -> Self {
        match value {
            v if v < 0 => Self::Skipped,
            0 => Self::No,
            _ => Self::Yes,
        }
    }

    /// Encode to the database representation.
    #[must_use]
    pub const fn as_db(self) -> i64 {
        match self {
            Self::Skipped => -1,
            Self::No => 0,
            Self::Yes => 1,
        }
    }
}

/// Kind of change announced for an album or artist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanUpdate {
    Added,
    Removed,
    Modified,
}

// ============================================================================
// Cancellable
// ============================================================================

/// Cooperative cancellation flag shared with long running loaders.
#[derive(Debug, Clone, Default)]
pub struct Cancellable(Arc<AtomicBool>);

impl Cancellable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Milliseconds
// ============================================================================

/// A duration in milliseconds.
///
/// Used for track and album durations as stored in the collection.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    DeriveAdd,
    From,
    Into,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct Milliseconds(pub i64);

impl_newtype_common!(Milliseconds);
impl_sub_traits!(Milliseconds);

impl Milliseconds {
    /// Convert to microseconds.
    #[must_use]
    pub const fn to_microseconds(self) -> Microseconds {
        Microseconds(self.0 * 1000)
    }

    /// Create from seconds.
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs * 1000)
    }
}

impl fmt::Display for Milliseconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_seconds = self.0 / 1000;
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        match hours {
            0 => write!(f, "{minutes}:{seconds:02}"),
            _ => write!(f, "{hours}:{minutes:02}:{seconds:02}"),
        }
    }
}

impl From<Microseconds> for Milliseconds {
    fn from(value: Microseconds) -> Self {
        value.to_milliseconds()
    }
}

// ============================================================================
// Microseconds
// ============================================================================

/// A duration in microseconds.
///
/// Used for MPRIS positions, offsets and track lengths.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, DeriveAdd, From, Into,
)]
pub struct Microseconds(pub i64);

impl_newtype_common!(Microseconds);
impl_sub_traits!(Microseconds);

impl Microseconds {
    /// Convert to milliseconds.
    #[must_use]
    pub const fn to_milliseconds(self) -> Milliseconds {
        Milliseconds(self.0 / 1000)
    }

    /// Create from seconds.
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs * 1_000_000)
    }
}

impl fmt::Display for Microseconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_milliseconds().fmt(f)
    }
}

impl From<Milliseconds> for Microseconds {
    fn from(value: Milliseconds) -> Self {
        value.to_microseconds()
    }
}

// ============================================================================
// Tests
// ============================================================================
