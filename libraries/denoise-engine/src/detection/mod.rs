//! Noise detection stages of the per-band chain
//!
//! In chain order:
//!
//! 1. [`MaxRmsDetector`]: peak RMS of the band
//! 2. [`DiscardFilter`]: marks edges and dropouts so they are not measured
//! 3. [`MinimumWindowDetector`] or [`WindowFrequencyDetector`]: noise floor
//! 4. [`IrregularNoiseMarker`] and [`IrregularNoiseCorrector`]: re-measure
//!    quiet regions and raise the noise floor when bursts are found there
//!
//! All stages pass samples through unchanged; they only write markers and
//! produce metadata.

mod discard;
mod irregular;
mod max_rms;
mod noise_level;

pub use discard::{DiscardFactory, DiscardFilter};
pub use irregular::{
    IrregularCorrectorFactory, IrregularMarkerFactory, IrregularNoiseCorrector,
    IrregularNoiseMarker, IRREGULAR_THRESHOLD_FACTOR,
};
pub use max_rms::{MaxRmsDetector, MaxRmsFactory};
pub use noise_level::{
    MinimumWindowDetector, NoiseLevelDetectorFactory, WindowFrequencyDetector, STEPS_PER_DB,
};

/// Clear `bit` in every marker
pub(crate) fn clear_marker_bit(markers: &mut [u8], bit: u8) {
    for marker in markers.iter_mut() {
        *marker &= !bit;
    }
}
