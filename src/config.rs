//! Configuration management for cadenza

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Number of bands of the `equalizer-10bands` element.
pub const EQUALIZER_BANDS: usize = 10;

/// Lowest gain accepted by an equalizer band, in dB.
pub const EQUALIZER_MIN_DB: f64 = -24.0;

/// Highest gain accepted by an equalizer band, in dB.
pub const EQUALIZER_MAX_DB: f64 = 12.0;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Database settings
    pub database: DatabaseConfig,

    /// Playback chain settings
    pub playback: PlaybackConfig,

    /// MPRIS service settings
    pub mpris: MprisConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Data directory (default: ~/.local/share/cadenza)
    pub data_dir: Option<PathBuf>,
}

/// Database configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Collection database path
    pub path: Option<String>,
}

/// Replay gain mode applied by the playback chain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayGain {
    /// No replay gain processing
    #[default]
    None,
    /// Per-track gain
    Track,
    /// Per-album gain
    Album,
}

/// Audio filter chain settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Initial volume of the internal volume element (0.0-1.0)
    pub volume: f64,

    /// Insert a 10-band equalizer after the volume element
    pub equalizer_enabled: bool,

    /// Equalizer band gains in dB, lowest band first
    pub equalizer: Vec<f64>,

    /// Replay gain mode
    pub replay_gain: ReplayGain,

    /// Replay gain pre-amplification in dB
    pub replay_gain_db: f64,

    /// Enable the replay gain limiter
    pub replay_gain_limiter: bool,

    /// Sink element factory name
    pub audio_sink: String,
}

/// MPRIS service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MprisConfig {
    /// Expose the player over D-Bus
    pub enabled: bool,

    /// Bus name suffix (`org.mpris.MediaPlayer2.<player_name>`)
    pub player_name: String,

    /// Human readable identity
    pub identity: String,

    /// Desktop entry basename
    pub desktop_entry: String,
}

// Default implementations

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            data_dir: None,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            volume: 1.0,
            equalizer_enabled: false,
            equalizer: vec![0.0; EQUALIZER_BANDS],
            replay_gain: ReplayGain::None,
            replay_gain_db: 0.0,
            replay_gain_limiter: true,
            audio_sink: "autoaudiosink".to_string(),
        }
    }
}

impl Default for MprisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            player_name: "Cadenza".to_string(),
            identity: "Cadenza".to_string(),
            desktop_entry: "org.cadenza.Cadenza".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            let config: Self = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::config("Could not determine config directory"))?;
        Ok(config_dir.join(crate::APP_NAME).join("config.toml"))
    }

    /// Get the data directory
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.general.data_dir {
            Ok(dir.clone())
        } else {
            let data_dir = dirs::data_local_dir()
                .ok_or_else(|| Error::config("Could not determine data directory"))?;
            Ok(data_dir.join(crate::APP_NAME))
        }
    }

    /// Get the database path
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.database.path {
            return Ok(PathBuf::from(path));
        }
        Ok(self.data_dir()?.join("collection.duckdb"))
    }

    /// Validate configuration values.
    ///
    /// Call this after loading to ensure all values are within acceptable ranges.
    pub fn validate(&self) -> Result<()> {
        let playback = &self.playback;

        if !(0.0..=1.0).contains(&playback.volume) {
            return Err(Error::config(format!(
                "volume must be between 0.0 and 1.0, got {}",
                playback.volume
            )));
        }

        if playback.equalizer.len() != EQUALIZER_BANDS {
            return Err(Error::config(format!(
                "equalizer must have {EQUALIZER_BANDS} bands, got {}",
                playback.equalizer.len()
            )));
        }

        if let Some(gain) = playback
            .equalizer
            .iter()
            .find(|g| !(EQUALIZER_MIN_DB..=EQUALIZER_MAX_DB).contains(*g))
        {
            return Err(Error::config(format!(
                "equalizer gains must be between {EQUALIZER_MIN_DB} and {EQUALIZER_MAX_DB} dB, got {gain}"
            )));
        }

        if !(-15.0..=15.0).contains(&playback.replay_gain_db) {
            return Err(Error::config(format!(
                "replay_gain_db must be between -15 and 15, got {}",
                playback.replay_gain_db
            )));
        }

        if self.mpris.player_name.is_empty()
            || !self
                .mpris
                .player_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            return Err(Error::config(format!(
                "mpris player_name must be a valid bus name element, got '{}'",
                self.mpris.player_name
            )));
        }

        // Validate log_level is a known level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "log_level must be one of {:?}, got '{}'",
                valid_levels, self.general.log_level
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [playback]
            replay_gain = "album"
            replay_gain_db = 3.5
            equalizer_enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.playback.replay_gain, ReplayGain::Album);
        assert!((config.playback.replay_gain_db - 3.5).abs() < f64::EPSILON);
        assert!(config.playback.equalizer_enabled);
        assert_eq!(config.playback.equalizer.len(), EQUALIZER_BANDS);
        assert_eq!(config.mpris.player_name, "Cadenza");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_equalizer() {
        let mut config = Config::default();
        config.playback.equalizer = vec![0.0; 5];
        assert!(config.validate().is_err());

        config.playback.equalizer = vec![0.0; EQUALIZER_BANDS];
        config.playback.equalizer[3] = 20.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        let mut config = Config::default();
        config.playback.volume = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.playback.replay_gain_db = -40.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.general.log_level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.mpris.player_name = "bad name".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_path_override() {
        let mut config = Config::default();
        config.database.path = Some("/tmp/cadenza-test.duckdb".to_string());
        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from("/tmp/cadenza-test.duckdb")
        );
    }
}
