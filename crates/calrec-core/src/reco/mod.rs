//! Weight-method reconstruction: the per-channel amplitude estimator
//! and the per-event batch driver.

mod driver;
mod estimator;

pub use driver::{
    ChannelSkip, EventReco, MissingCalibration, SubdetectorReco, reconstruct_event,
    reconstruct_subdetector,
};
pub use estimator::WeightsEstimator;

use crate::domain::ChannelId;

pub type RecoResult<T> = Result<T, RecoError>;

/// Faults that abort reconstruction outright. Per-channel calibration
/// misses are not errors; the driver logs and skips those.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecoError {
    #[error(
        "channel {channel}: frame carries {frame_len} samples but the weight bundle is dimensioned for {weight_len}"
    )]
    DimensionMismatch {
        channel: ChannelId,
        frame_len: usize,
        weight_len: usize,
    },
}
