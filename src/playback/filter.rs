//! Audio filter chain description
//!
//! The chain is decided once per playback session from the playback
//! settings:
//!
//! ```text
//! volume -> [equalizer-10bands] -> [rgvolume -> rglimiter] -> audioconvert -> sink
//! ```

use serde::Serialize;

use crate::config::{PlaybackConfig, ReplayGain, EQUALIZER_BANDS, EQUALIZER_MAX_DB, EQUALIZER_MIN_DB};

/// One element of the chain with its initial properties.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "element", rename_all = "kebab-case")]
pub enum FilterElement {
    Volume { volume: f64 },
    Equalizer { bands: [f64; EQUALIZER_BANDS] },
    RgVolume { album_mode: bool, pre_amp: f64 },
    RgLimiter { enabled: bool },
    AudioConvert,
    Sink { factory: String },
}

impl FilterElement {
    /// GStreamer factory name.
    pub fn factory_name(&self) -> &str {
        match self {
            Self::Volume { .. } => "volume",
            Self::Equalizer { .. } => "equalizer-10bands",
            Self::RgVolume { .. } => "rgvolume",
            Self::RgLimiter { .. } => "rglimiter",
            Self::AudioConvert => "audioconvert",
            Self::Sink { factory } => factory.as_str(),
        }
    }
}

/// Ordered audio filter chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioFilterPlan {
    elements: Vec<FilterElement>,
}

impl AudioFilterPlan {
    pub fn from_config(config: &PlaybackConfig) -> Self {
        let mut elements = vec![FilterElement::Volume {
            volume: config.volume.clamp(0.0, 1.0),
        }];

        if config.equalizer_enabled {
            let mut bands = [0.0; EQUALIZER_BANDS];
            for (band, gain) in bands.iter_mut().zip(&config.equalizer) {
                *band = clamp_gain(*gain);
            }
            elements.push(FilterElement::Equalizer { bands });
        }

        if config.replay_gain != ReplayGain::None {
            elements.push(FilterElement::RgVolume {
                album_mode: config.replay_gain == ReplayGain::Album,
                pre_amp: config.replay_gain_db,
            });
            elements.push(FilterElement::RgLimiter {
                enabled: config.replay_gain_limiter,
            });
        }

        elements.push(FilterElement::AudioConvert);
        elements.push(FilterElement::Sink {
            factory: config.audio_sink.clone(),
        });

        Self { elements }
    }

    pub fn elements(&self) -> &[FilterElement] {
        &self.elements
    }

    pub fn factory_names(&self) -> Vec<&str> {
        self.elements.iter().map(FilterElement::factory_name).collect()
    }

    /// Initial equalizer gains, when the chain has an equalizer.
    pub fn equalizer_bands(&self) -> Option<&[f64; EQUALIZER_BANDS]> {
        self.elements.iter().find_map(|element| match element {
            FilterElement::Equalizer { bands } => Some(bands),
            _ => None,
        })
    }

    pub fn has_replay_gain(&self) -> bool {
        self.elements
            .iter()
            .any(|element| matches!(element, FilterElement::RgVolume { .. }))
    }
}

/// Clamp an equalizer gain to the range the element accepts.
pub fn clamp_gain(gain: f64) -> f64 {
    gain.clamp(EQUALIZER_MIN_DB, EQUALIZER_MAX_DB)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_chain() {
        let plan = AudioFilterPlan::from_config(&PlaybackConfig::default());
        assert_eq!(
            plan.factory_names(),
            vec!["volume", "audioconvert", "autoaudiosink"]
        );
        assert!(plan.equalizer_bands().is_none());
        assert!(!plan.has_replay_gain());
    }

    #[test]
    fn test_full_chain() {
        let config = PlaybackConfig {
            equalizer_enabled: true,
            equalizer: vec![3.0, 40.0, -30.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.5],
            replay_gain: ReplayGain::Album,
            replay_gain_db: 4.5,
            replay_gain_limiter: false,
            audio_sink: "pulsesink".to_string(),
            ..PlaybackConfig::default()
        };
        let plan = AudioFilterPlan::from_config(&config);

        assert_eq!(
            plan.factory_names(),
            vec![
                "volume",
                "equalizer-10bands",
                "rgvolume",
                "rglimiter",
                "audioconvert",
                "pulsesink"
            ]
        );
        let bands = plan.equalizer_bands().unwrap();
        assert_eq!(bands[0], 3.0);
        assert_eq!(bands[1], 12.0);
        assert_eq!(bands[2], -24.0);
        assert_eq!(bands[9], 1.5);

        assert_eq!(
            plan.elements()[2],
            FilterElement::RgVolume {
                album_mode: true,
                pre_amp: 4.5
            }
        );
        assert_eq!(plan.elements()[3], FilterElement::RgLimiter { enabled: false });
    }

    #[test]
    fn test_track_replay_gain_without_equalizer() {
        let config = PlaybackConfig {
            replay_gain: ReplayGain::Track,
            ..PlaybackConfig::default()
        };
        let plan = AudioFilterPlan::from_config(&config);

        assert_eq!(
            plan.factory_names(),
            vec!["volume", "rgvolume", "rglimiter", "audioconvert", "autoaudiosink"]
        );
        assert!(matches!(
            plan.elements()[1],
            FilterElement::RgVolume { album_mode: false, .. }
        ));
    }

    #[test]
    fn test_short_equalizer_setting() {
        let config = PlaybackConfig {
            equalizer_enabled: true,
            equalizer: vec![2.0],
            ..PlaybackConfig::default()
        };
        let plan = AudioFilterPlan::from_config(&config);
        let bands = plan.equalizer_bands().unwrap();
        assert_eq!(bands[0], 2.0);
        assert!(bands[1..].iter().all(|gain| *gain == 0.0));
    }
}
