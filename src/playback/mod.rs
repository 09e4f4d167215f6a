//! Audio output
//!
//! [`filter`] decides the processing chain from the playback settings.
//! With the `gstreamer` feature, [`gst`] realizes it inside a playbin.

pub mod filter;
#[cfg(feature = "gstreamer")]
pub mod gst;

pub use filter::{AudioFilterPlan, FilterElement};
#[cfg(feature = "gstreamer")]
pub use gst::GstBackend;
