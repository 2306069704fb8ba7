//! Speaker layouts keyed by WAVE_FORMAT_EXTENSIBLE channel masks

use crate::error::{EngineError, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

/// Position of one speaker; the value is its channel-mask bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpeakerLocation {
    FrontLeft,
    FrontRight,
    FrontCenter,
    LowFrequency,
    BackLeft,
    BackRight,
    FrontLeftOfCenter,
    FrontRightOfCenter,
    BackCenter,
}

impl SpeakerLocation {
    /// Channel order of the mask bits
    pub const ALL: [SpeakerLocation; 9] = [
        SpeakerLocation::FrontLeft,
        SpeakerLocation::FrontRight,
        SpeakerLocation::FrontCenter,
        SpeakerLocation::LowFrequency,
        SpeakerLocation::BackLeft,
        SpeakerLocation::BackRight,
        SpeakerLocation::FrontLeftOfCenter,
        SpeakerLocation::FrontRightOfCenter,
        SpeakerLocation::BackCenter,
    ];

    pub fn mask(self) -> u32 {
        match self {
            SpeakerLocation::FrontLeft => 0x1,
            SpeakerLocation::FrontRight => 0x2,
            SpeakerLocation::FrontCenter => 0x4,
            SpeakerLocation::LowFrequency => 0x8,
            SpeakerLocation::BackLeft => 0x10,
            SpeakerLocation::BackRight => 0x20,
            SpeakerLocation::FrontLeftOfCenter => 0x40,
            SpeakerLocation::FrontRightOfCenter => 0x80,
            SpeakerLocation::BackCenter => 0x100,
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            SpeakerLocation::FrontLeft => "FL",
            SpeakerLocation::FrontRight => "FR",
            SpeakerLocation::FrontCenter => "FC",
            SpeakerLocation::LowFrequency => "LF",
            SpeakerLocation::BackLeft => "BL",
            SpeakerLocation::BackRight => "BR",
            SpeakerLocation::FrontLeftOfCenter => "FLC",
            SpeakerLocation::FrontRightOfCenter => "FRC",
            SpeakerLocation::BackCenter => "BC",
        }
    }
}

impl fmt::Display for SpeakerLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Named set of speakers in channel order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakerLayout {
    name: &'static str,
    mask: u32,
    locations: Vec<SpeakerLocation>,
}

pub const MONO: u32 = 0x4;
pub const STEREO: u32 = 0x3;
pub const QUAD: u32 = 0x33;
pub const SURROUND: u32 = 0x107;
pub const SURROUND_5_1: u32 = 0x3F;
pub const SURROUND_7_1: u32 = 0xFF;

static LAYOUTS: Lazy<HashMap<u32, SpeakerLayout>> = Lazy::new(|| {
    [
        ("mono", MONO),
        ("stereo", STEREO),
        ("quad", QUAD),
        ("surround", SURROUND),
        ("5.1", SURROUND_5_1),
        ("7.1", SURROUND_7_1),
    ]
    .into_iter()
    .map(|(name, mask)| (mask, SpeakerLayout::from_mask(name, mask)))
    .collect()
});

impl SpeakerLayout {
    fn from_mask(name: &'static str, mask: u32) -> Self {
        let locations = SpeakerLocation::ALL
            .into_iter()
            .filter(|location| mask & location.mask() != 0)
            .collect();
        Self {
            name,
            mask,
            locations,
        }
    }

    /// Registered layout with exactly this channel mask
    pub fn for_mask(mask: u32) -> Option<&'static SpeakerLayout> {
        LAYOUTS.get(&mask)
    }

    /// Default layout for a file that only declares its channel count
    pub fn for_channels(channels: usize) -> Result<&'static SpeakerLayout> {
        let mask = match channels {
            1 => MONO,
            2 => STEREO,
            4 => QUAD,
            6 => SURROUND_5_1,
            8 => SURROUND_7_1,
            other => {
                return Err(EngineError::UnsupportedChannelLayout(format!(
                    "no default layout for {} channels",
                    other
                )))
            }
        };
        Self::for_mask(mask).ok_or_else(|| {
            EngineError::UnsupportedChannelLayout(format!("mask {:#x} is not registered", mask))
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn channels(&self) -> usize {
        self.locations.len()
    }

    pub fn locations(&self) -> &[SpeakerLocation] {
        &self.locations
    }

    pub fn location(&self, channel: usize) -> Option<SpeakerLocation> {
        self.locations.get(channel).copied()
    }
}

impl fmt::Display for SpeakerLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.name)?;
        for (i, location) in self.locations.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", location)?;
        }
        f.write_str(")")
    }
}

/// Label of `channel`: its speaker name if the channel count has a
/// default layout, else its number
pub fn channel_label(channels: usize, channel: usize) -> String {
    SpeakerLayout::for_channels(channels)
        .ok()
        .and_then(|layout| layout.location(channel))
        .map(|location| location.short_name().to_string())
        .unwrap_or_else(|| channel.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layouts_follow_mask_bits() {
        let layout = SpeakerLayout::for_mask(SURROUND_5_1).unwrap();
        assert_eq!(layout.channels(), 6);
        assert_eq!(layout.location(3), Some(SpeakerLocation::LowFrequency));
        assert_eq!(layout.to_string(), "5.1 (FL FR FC LF BL BR)");

        let surround = SpeakerLayout::for_mask(SURROUND).unwrap();
        assert_eq!(
            surround.locations(),
            &[
                SpeakerLocation::FrontLeft,
                SpeakerLocation::FrontRight,
                SpeakerLocation::FrontCenter,
                SpeakerLocation::BackCenter
            ]
        );
    }

    #[test]
    fn test_for_channels() {
        assert_eq!(SpeakerLayout::for_channels(1).unwrap().name(), "mono");
        assert_eq!(SpeakerLayout::for_channels(2).unwrap().mask(), STEREO);
        assert_eq!(SpeakerLayout::for_channels(4).unwrap().mask(), QUAD);
        assert_eq!(SpeakerLayout::for_channels(8).unwrap().channels(), 8);
        assert!(matches!(
            SpeakerLayout::for_channels(3),
            Err(EngineError::UnsupportedChannelLayout(_))
        ));
        assert!(SpeakerLayout::for_mask(0x7).is_none());
    }

    #[test]
    fn test_channel_labels() {
        assert_eq!(channel_label(2, 1), "FR");
        assert_eq!(channel_label(1, 0), "FC");
        assert_eq!(channel_label(3, 2), "2");
    }
}
