//! Raw-data shapes shared by the estimator and the batch driver.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Number of samples the readout digitizes per channel per event.
pub const SAMPLES_PER_FRAME: usize = 10;

const ADC_MASK: u16 = 0x0FFF;
const GAIN_SHIFT: u16 = 12;
const GAIN_MASK: u16 = 0x3;

/// Stable integer key identifying one detector channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u32);

impl Display for ChannelId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subdetector {
    Barrel,
    Endcap,
}

impl Subdetector {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Barrel => "barrel",
            Self::Endcap => "endcap",
        }
    }
}

impl Display for Subdetector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Amplification range the readout electronics selected for one sample.
///
/// The ladder runs x12 -> x6 -> x1; the electronics step down the ladder
/// automatically when the signal risks saturating the ADC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GainMode {
    Gain12,
    Gain6,
    Gain1,
}

impl GainMode {
    /// Index into pedestal and gain-ratio triples.
    pub const fn index(self) -> usize {
        match self {
            Self::Gain12 => 0,
            Self::Gain6 => 1,
            Self::Gain1 => 2,
        }
    }

    /// x12 is the reference range; leaving it anywhere in a frame is a
    /// gain switch and selects the after-switch weight pair.
    pub const fn is_reference(self) -> bool {
        matches!(self, Self::Gain12)
    }

    /// Decodes the two-bit range selector. Selector 3 has no physical
    /// range of its own and is read as the saturated end of the ladder.
    pub const fn from_selector(selector: u8) -> Self {
        match selector & 0x3 {
            0 => Self::Gain12,
            1 => Self::Gain6,
            _ => Self::Gain1,
        }
    }
}

/// One raw digitized reading: a 12-bit ADC magnitude plus a 2-bit gain
/// range selector, packed exactly as the front-end emits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawSample(u16);

impl RawSample {
    pub const fn new(adc: u16, selector: u8) -> Self {
        Self((adc & ADC_MASK) | (((selector as u16) & GAIN_MASK) << GAIN_SHIFT))
    }

    pub const fn from_raw(raw: u16) -> Self {
        Self(raw & (ADC_MASK | (GAIN_MASK << GAIN_SHIFT)))
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn adc(self) -> u16 {
        self.0 & ADC_MASK
    }

    pub const fn gain_selector(self) -> u8 {
        ((self.0 >> GAIN_SHIFT) & GAIN_MASK) as u8
    }

    pub const fn gain_mode(self) -> GainMode {
        GainMode::from_selector(self.gain_selector())
    }
}

/// One channel's ordered sample sequence for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigiFrame {
    channel: ChannelId,
    samples: Vec<RawSample>,
}

impl DigiFrame {
    pub fn new(channel: ChannelId, samples: Vec<RawSample>) -> Self {
        Self { channel, samples }
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn samples(&self) -> &[RawSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// All frames of one subdetector for one event, in readout order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DigiCollection {
    frames: Vec<DigiFrame>,
}

impl DigiCollection {
    pub fn new(frames: Vec<DigiFrame>) -> Self {
        Self { frames }
    }

    pub fn frames(&self) -> &[DigiFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn push(&mut self, frame: DigiFrame) {
        self.frames.push(frame);
    }
}

/// Per-event digi input. Either collection may be absent when upstream
/// unpacking produced nothing for that subdetector; the driver still
/// emits an (empty) output collection in that case.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventDigis {
    pub barrel: Option<DigiCollection>,
    pub endcap: Option<DigiCollection>,
}

/// Output record of the estimator: uncalibrated amplitude on the
/// reference-gain scale plus the weight-fit chi-square.
#[derive(Debug, Clone, PartialEq)]
pub struct UncalibratedHit {
    pub channel: ChannelId,
    pub amplitude: f64,
    pub chi2: f64,
    pub gain_switched: bool,
}

#[cfg(test)]
mod tests {
    use super::{ChannelId, DigiFrame, GainMode, RawSample, SAMPLES_PER_FRAME};

    #[test]
    fn raw_sample_packs_and_decodes_adc_and_selector() {
        let sample = RawSample::new(0x0ABC, 2);
        assert_eq!(sample.adc(), 0x0ABC);
        assert_eq!(sample.gain_selector(), 2);
        assert_eq!(sample.gain_mode(), GainMode::Gain1);
    }

    #[test]
    fn raw_sample_masks_out_of_range_inputs() {
        let sample = RawSample::new(0xFFFF, 0xFF);
        assert_eq!(sample.adc(), 0x0FFF);
        assert_eq!(sample.gain_selector(), 3);

        let from_raw = RawSample::from_raw(0xFFFF);
        assert_eq!(from_raw.raw(), 0x3FFF);
    }

    #[test]
    fn selector_three_reads_as_saturated_low_gain() {
        assert_eq!(GainMode::from_selector(3), GainMode::Gain1);
    }

    #[test]
    fn selector_maps_onto_gain_ladder_indices() {
        assert_eq!(GainMode::from_selector(0).index(), 0);
        assert_eq!(GainMode::from_selector(1).index(), 1);
        assert_eq!(GainMode::from_selector(2).index(), 2);
        assert!(GainMode::Gain12.is_reference());
        assert!(!GainMode::Gain6.is_reference());
        assert!(!GainMode::Gain1.is_reference());
    }

    #[test]
    fn digi_frame_preserves_sample_order() {
        let samples: Vec<RawSample> = (0..SAMPLES_PER_FRAME)
            .map(|i| RawSample::new(200 + i as u16, 0))
            .collect();
        let frame = DigiFrame::new(ChannelId(42), samples.clone());

        assert_eq!(frame.channel(), ChannelId(42));
        assert_eq!(frame.len(), SAMPLES_PER_FRAME);
        assert_eq!(frame.samples(), samples.as_slice());
    }
}
