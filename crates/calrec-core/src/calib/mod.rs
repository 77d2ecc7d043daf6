//! Calibration data shapes and the lookup seam the batch driver runs
//! against.
//!
//! Everything here is immutable once built: the conditions adapter
//! assembles a [`CalibrationSnapshot`] between events and the driver
//! only ever reads it. Weight bundles are dimension-validated at
//! construction so the estimator can assume consistent shapes.

mod snapshot;

pub use snapshot::{
    GainRatioEntry, GroupEntry, PedestalEntry, SnapshotError, SnapshotSpec, WeightBundleEntry,
};

use crate::domain::{ChannelId, GainMode};
use faer::Mat;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// Dense real matrix used for the chi-square weight blocks.
pub type DenseMatrix = Mat<f64>;

/// Key of the weight set shared by all channels with similar pulse
/// shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u32);

impl Display for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Timing-reference bucket of a weight bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TdcId(pub u32);

impl Display for TdcId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Placeholder timing reference used until per-event timing buckets are
/// available in the raw data; every weight lookup currently uses this
/// fixed bucket.
pub const DEFAULT_TDC_ID: TdcId = TdcId(1);

/// Lookup key of one weight bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeightKey {
    pub group: GroupId,
    pub tdc: TdcId,
}

impl WeightKey {
    pub const fn new(group: GroupId, tdc: TdcId) -> Self {
        Self { group, tdc }
    }
}

/// Baseline (zero-signal) reading level per gain range for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pedestals {
    means: [f64; 3],
}

impl Pedestals {
    pub const fn new(means: [f64; 3]) -> Self {
        Self { means }
    }

    pub fn mean(&self, mode: GainMode) -> f64 {
        self.means[mode.index()]
    }

    pub const fn means(&self) -> &[f64; 3] {
        &self.means
    }
}

/// Multiplicative conversion factors bringing the lower gain ranges
/// onto the reference (x12) scale.
///
/// Only the two adjacent-range ratios are measured; the x12-over-x1
/// factor is their product, accumulating one factor per step down the
/// ladder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainRatios {
    gain12_over_6: f64,
    gain6_over_1: f64,
}

impl GainRatios {
    pub const fn new(gain12_over_6: f64, gain6_over_1: f64) -> Self {
        Self {
            gain12_over_6,
            gain6_over_1,
        }
    }

    pub const fn gain12_over_6(&self) -> f64 {
        self.gain12_over_6
    }

    pub const fn gain6_over_1(&self) -> f64 {
        self.gain6_over_1
    }

    /// Conversion factor from `mode` to the reference scale. The
    /// reference range converts with exactly 1.0.
    pub fn ratio(&self, mode: GainMode) -> f64 {
        match mode {
            GainMode::Gain12 => 1.0,
            GainMode::Gain6 => self.gain12_over_6,
            GainMode::Gain1 => self.gain6_over_1 * self.gain12_over_6,
        }
    }

    pub fn triple(&self) -> [f64; 3] {
        [
            1.0,
            self.gain12_over_6,
            self.gain6_over_1 * self.gain12_over_6,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalibError {
    #[error("weight bundle must have at least one sample weight")]
    EmptyWeightBundle,
    #[error("amplitude weight vectors disagree in length: before={before}, after={after}")]
    AmplitudeWeightLengthMismatch { before: usize, after: usize },
    #[error(
        "chi-square weight matrix ({which}) must be {expected}x{expected}, got {rows}x{cols}"
    )]
    Chi2ShapeMismatch {
        which: &'static str,
        expected: usize,
        rows: usize,
        cols: usize,
    },
}

/// Immutable set of precomputed weights for one (group, timing
/// reference) pair: amplitude-weight vectors and chi-square weight
/// matrices, one of each for the no-gain-switch and gain-switch cases.
///
/// All four blocks are dimensioned against the same sample count; the
/// constructors reject inconsistent shapes so downstream algebra never
/// has to re-check.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightBundle {
    amp_before: Vec<f64>,
    amp_after: Vec<f64>,
    chi2_before: DenseMatrix,
    chi2_after: DenseMatrix,
}

impl WeightBundle {
    pub fn new(
        amp_before: Vec<f64>,
        amp_after: Vec<f64>,
        chi2_before: DenseMatrix,
        chi2_after: DenseMatrix,
    ) -> Result<Self, CalibError> {
        let sample_count = amp_before.len();
        if sample_count == 0 {
            return Err(CalibError::EmptyWeightBundle);
        }
        if amp_after.len() != sample_count {
            return Err(CalibError::AmplitudeWeightLengthMismatch {
                before: sample_count,
                after: amp_after.len(),
            });
        }
        validate_chi2_shape("before gain switch", &chi2_before, sample_count)?;
        validate_chi2_shape("after gain switch", &chi2_after, sample_count)?;

        Ok(Self {
            amp_before,
            amp_after,
            chi2_before,
            chi2_after,
        })
    }

    /// Builds a bundle from row-major chi-square matrices, the layout
    /// used by the snapshot exchange format.
    pub fn from_rows(
        amp_before: Vec<f64>,
        amp_after: Vec<f64>,
        chi2_before: &[Vec<f64>],
        chi2_after: &[Vec<f64>],
    ) -> Result<Self, CalibError> {
        let sample_count = amp_before.len();
        if sample_count == 0 {
            return Err(CalibError::EmptyWeightBundle);
        }
        let chi2_before = matrix_from_rows("before gain switch", chi2_before, sample_count)?;
        let chi2_after = matrix_from_rows("after gain switch", chi2_after, sample_count)?;
        Self::new(amp_before, amp_after, chi2_before, chi2_after)
    }

    pub fn sample_count(&self) -> usize {
        self.amp_before.len()
    }

    /// Amplitude-weight vector for the given gain-switch state.
    pub fn amplitude_weights(&self, gain_switched: bool) -> &[f64] {
        if gain_switched {
            &self.amp_after
        } else {
            &self.amp_before
        }
    }

    /// Chi-square weight matrix for the given gain-switch state.
    pub fn chi2_weights(&self, gain_switched: bool) -> &DenseMatrix {
        if gain_switched {
            &self.chi2_after
        } else {
            &self.chi2_before
        }
    }
}

fn validate_chi2_shape(
    which: &'static str,
    matrix: &DenseMatrix,
    expected: usize,
) -> Result<(), CalibError> {
    if matrix.nrows() != expected || matrix.ncols() != expected {
        return Err(CalibError::Chi2ShapeMismatch {
            which,
            expected,
            rows: matrix.nrows(),
            cols: matrix.ncols(),
        });
    }
    Ok(())
}

fn matrix_from_rows(
    which: &'static str,
    rows: &[Vec<f64>],
    expected: usize,
) -> Result<DenseMatrix, CalibError> {
    if rows.len() != expected || rows.iter().any(|row| row.len() != expected) {
        return Err(CalibError::Chi2ShapeMismatch {
            which,
            expected,
            rows: rows.len(),
            cols: rows.first().map_or(0, |row| row.len()),
        });
    }
    Ok(Mat::from_fn(expected, expected, |row, col| rows[row][col]))
}

/// Read-only calibration access the driver needs per channel. The
/// production implementation is [`CalibrationSnapshot`]; tests and
/// alternative conditions backends provide their own.
pub trait CalibrationLookup {
    fn pedestals(&self, channel: ChannelId) -> Option<&Pedestals>;
    fn gain_ratios(&self, channel: ChannelId) -> Option<&GainRatios>;
    fn group(&self, channel: ChannelId) -> Option<GroupId>;
    fn weights(&self, key: WeightKey) -> Option<&WeightBundle>;
}

/// One immutable set of calibration tables, valid for (at least) one
/// event. The conditions adapter may swap in a fresh snapshot between
/// events; nothing mutates a snapshot while reconstruction runs.
#[derive(Debug, Clone, Default)]
pub struct CalibrationSnapshot {
    pedestals: HashMap<ChannelId, Pedestals>,
    gain_ratios: HashMap<ChannelId, GainRatios>,
    groups: HashMap<ChannelId, GroupId>,
    weights: HashMap<WeightKey, WeightBundle>,
}

impl CalibrationSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pedestals(&mut self, channel: ChannelId, pedestals: Pedestals) {
        self.pedestals.insert(channel, pedestals);
    }

    pub fn set_gain_ratios(&mut self, channel: ChannelId, ratios: GainRatios) {
        self.gain_ratios.insert(channel, ratios);
    }

    pub fn set_group(&mut self, channel: ChannelId, group: GroupId) {
        self.groups.insert(channel, group);
    }

    pub fn set_weights(&mut self, key: WeightKey, bundle: WeightBundle) {
        self.weights.insert(key, bundle);
    }

    pub fn channel_count(&self) -> usize {
        self.pedestals.len()
    }

    pub fn weight_bundle_count(&self) -> usize {
        self.weights.len()
    }
}

impl CalibrationLookup for CalibrationSnapshot {
    fn pedestals(&self, channel: ChannelId) -> Option<&Pedestals> {
        self.pedestals.get(&channel)
    }

    fn gain_ratios(&self, channel: ChannelId) -> Option<&GainRatios> {
        self.gain_ratios.get(&channel)
    }

    fn group(&self, channel: ChannelId) -> Option<GroupId> {
        self.groups.get(&channel).copied()
    }

    fn weights(&self, key: WeightKey) -> Option<&WeightBundle> {
        self.weights.get(&key)
    }
}
