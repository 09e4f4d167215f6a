//! GStreamer playbin backend

use gstreamer as gst;
use gstreamer::prelude::*;
use tracing::{debug, error, info, warn};

use crate::config::{PlaybackConfig, EQUALIZER_BANDS};
use crate::error::{Error, Result};
use crate::player::{AudioBackend, PlaybackStatus};
use crate::types::Milliseconds;

use super::filter::{clamp_gain, AudioFilterPlan, FilterElement};

/// Audio filter bin installed as the playbin audio sink.
#[derive(Debug)]
struct AudioFilter {
    bin: gst::Bin,
    volume: gst::Element,
    equalizer: Option<gst::Element>,
}

impl AudioFilter {
    /// Create the plan's elements inside a bin, linked in order, with a
    /// ghost `sink` pad on the volume element.
    fn build(plan: &AudioFilterPlan) -> Result<Self> {
        let bin = gst::Bin::builder().name("audiofilter").build();

        let mut elements = Vec::with_capacity(plan.elements().len());
        let mut volume = None;
        let mut equalizer = None;
        for element in plan.elements() {
            let made = make_element(element)?;
            match element {
                FilterElement::Volume { .. } => volume = Some(made.clone()),
                FilterElement::Equalizer { .. } => equalizer = Some(made.clone()),
                _ => {}
            }
            elements.push(made);
        }
        let volume = volume.ok_or_else(|| Error::playback("Filter chain has no volume element"))?;

        bin.add_many(elements.iter())?;
        gst::Element::link_many(elements.iter())?;

        let sink_pad = volume
            .static_pad("sink")
            .ok_or_else(|| Error::playback("Volume element has no sink pad"))?;
        let ghost = gst::GhostPad::with_target(&sink_pad)?;
        bin.add_pad(&ghost)?;

        Ok(Self {
            bin,
            volume,
            equalizer,
        })
    }

    fn set_equalizer(&self, band: usize, gain: f64) {
        let Some(equalizer) = &self.equalizer else {
            debug!("Equalizer disabled, ignoring band {}", band);
            return;
        };
        let property = format!("band{band}");
        if band >= EQUALIZER_BANDS || equalizer.find_property(&property).is_none() {
            error!("Equalizer has no {} property", property);
            return;
        }
        equalizer.set_property(&property, clamp_gain(gain));
    }
}

fn make_element(element: &FilterElement) -> Result<gst::Element> {
    let builder = gst::ElementFactory::make(element.factory_name());
    let made = match element {
        FilterElement::Volume { volume } => builder.name("volume").property("volume", *volume).build()?,
        FilterElement::Equalizer { bands } => {
            let equalizer = builder.name("equalizer").build()?;
            for (band, gain) in bands.iter().enumerate() {
                equalizer.set_property(&format!("band{band}"), *gain);
            }
            equalizer
        }
        FilterElement::RgVolume { album_mode, pre_amp } => builder
            .property("album-mode", *album_mode)
            .property("pre-amp", *pre_amp)
            .build()?,
        FilterElement::RgLimiter { enabled } => builder.property("enabled", *enabled).build()?,
        FilterElement::AudioConvert | FilterElement::Sink { .. } => builder.build()?,
    };
    Ok(made)
}

/// Playback through a GStreamer `playbin`.
///
/// When the filter chain cannot be built, playback still works through the
/// playbin's default sink, without volume control or equalizer.
#[derive(Debug)]
pub struct GstBackend {
    playbin: gst::Element,
    filter: Option<AudioFilter>,
}

impl GstBackend {
    pub fn new(config: &PlaybackConfig) -> Result<Self> {
        gst::init().map_err(|e| Error::playback(format!("GStreamer init failed: {e}")))?;

        let playbin = gst::ElementFactory::make("playbin").name("player").build()?;

        let plan = AudioFilterPlan::from_config(config);
        debug!("Audio filter chain: {}", plan.factory_names().join(" -> "));
        if let Some(bands) = plan.equalizer_bands() {
            debug!("Equalizer gains: {:?}", bands);
        }
        if plan.has_replay_gain() {
            info!("Replay gain enabled ({:?})", config.replay_gain);
        }
        let filter = match AudioFilter::build(&plan) {
            Ok(filter) => {
                playbin.set_property("audio-sink", filter.bin.to_value());
                Some(filter)
            }
            Err(e) => {
                error!("Failed to build audio filter, using default sink: {}", e);
                None
            }
        };

        Ok(Self { playbin, filter })
    }
}

impl AudioBackend for GstBackend {
    fn load(&mut self, uri: &str) -> Result<()> {
        self.playbin.set_state(gst::State::Null)?;
        self.playbin.set_property("uri", uri);
        Ok(())
    }

    fn set_status(&mut self, status: PlaybackStatus) -> Result<()> {
        let state = match status {
            PlaybackStatus::Playing => gst::State::Playing,
            PlaybackStatus::Paused => gst::State::Paused,
            PlaybackStatus::Stopped => gst::State::Null,
        };
        self.playbin.set_state(state)?;
        Ok(())
    }

    fn seek(&mut self, position: Milliseconds) -> Result<()> {
        let position = gst::ClockTime::from_mseconds(position.0.max(0).unsigned_abs());
        self.playbin
            .seek_simple(gst::SeekFlags::FLUSH | gst::SeekFlags::KEY_UNIT, position)?;
        Ok(())
    }

    fn position(&self) -> Milliseconds {
        self.playbin
            .query_position::<gst::ClockTime>()
            .map_or(Milliseconds(0), |pos| {
                Milliseconds(i64::try_from(pos.mseconds()).unwrap_or(i64::MAX))
            })
    }

    fn set_volume(&mut self, volume: f64) {
        match &self.filter {
            Some(filter) => filter.volume.set_property("volume", volume),
            None => warn!("No volume element, ignoring volume {}", volume),
        }
    }

    fn set_equalizer(&mut self, band: usize, gain: f64) {
        match &self.filter {
            Some(filter) => filter.set_equalizer(band, gain),
            None => warn!("No audio filter, ignoring equalizer band {}", band),
        }
    }

    fn poll_finished(&mut self) -> bool {
        let Some(bus) = self.playbin.bus() else {
            return false;
        };
        while let Some(message) = bus.pop() {
            match message.view() {
                gst::MessageView::Eos(..) => {
                    info!("End of stream");
                    return true;
                }
                gst::MessageView::Error(err) => {
                    error!("Playback error: {}", err.error());
                    return true;
                }
                _ => {}
            }
        }
        false
    }
}

impl Drop for GstBackend {
    fn drop(&mut self) {
        let _ = self.playbin.set_state(gst::State::Null);
    }
}
