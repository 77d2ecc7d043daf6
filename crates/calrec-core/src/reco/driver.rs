//! Channel batch driver: one generic reconstruction loop shared by both
//! subdetectors.

use super::RecoResult;
use super::estimator::WeightsEstimator;
use crate::calib::{CalibrationLookup, DEFAULT_TDC_ID, WeightKey};
use crate::domain::{ChannelId, DigiCollection, EventDigis, Subdetector, UncalibratedHit};
use std::fmt::{Display, Formatter};
use tracing::{debug, warn};

/// Which calibration lookup failed for a skipped channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingCalibration {
    Pedestals,
    GainRatios,
    Group,
    Weights(WeightKey),
}

impl Display for MissingCalibration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pedestals => f.write_str("pedestals"),
            Self::GainRatios => f.write_str("gain ratios"),
            Self::Group => f.write_str("group assignment"),
            Self::Weights(key) => {
                write!(f, "weights for group {}, tdc {}", key.group, key.tdc)
            }
        }
    }
}

/// A channel omitted from the output because a calibration lookup
/// missed. Skips are logged as they happen and returned as structured
/// data so coverage gaps can be audited without scraping logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSkip {
    pub channel: ChannelId,
    pub missing: MissingCalibration,
}

/// Reconstruction output of one subdetector for one event. Always
/// produced, even when the input collection was absent or every channel
/// was skipped; downstream stages expect the collection to exist.
#[derive(Debug, Clone, PartialEq)]
pub struct SubdetectorReco {
    pub subdetector: Subdetector,
    pub hits: Vec<UncalibratedHit>,
    pub skips: Vec<ChannelSkip>,
}

impl SubdetectorReco {
    fn empty(subdetector: Subdetector) -> Self {
        Self {
            subdetector,
            hits: Vec::new(),
            skips: Vec::new(),
        }
    }
}

/// Per-event reconstruction output, one collection per subdetector.
#[derive(Debug, Clone, PartialEq)]
pub struct EventReco {
    pub barrel: SubdetectorReco,
    pub endcap: SubdetectorReco,
}

/// Runs the estimator over every frame of one subdetector, in input
/// order.
///
/// Calibration misses are per-channel data-quality conditions: each one
/// is logged with the channel and the failing lookup, recorded as a
/// [`ChannelSkip`], and the loop moves on. An absent input collection
/// yields an empty output. Only a frame/bundle dimension mismatch
/// aborts, since it signals corrupt calibration rather than a coverage
/// gap.
pub fn reconstruct_subdetector<C: CalibrationLookup>(
    subdetector: Subdetector,
    digis: Option<&DigiCollection>,
    calib: &C,
) -> RecoResult<SubdetectorReco> {
    let Some(digis) = digis else {
        warn!(%subdetector, "no digi collection available; producing empty hit collection");
        return Ok(SubdetectorReco::empty(subdetector));
    };
    debug!(%subdetector, frames = digis.len(), "reconstructing digi collection");

    let estimator = WeightsEstimator::new();
    let mut output = SubdetectorReco::empty(subdetector);

    for frame in digis.frames() {
        let channel = frame.channel();

        let Some(pedestals) = calib.pedestals(channel) else {
            skip(&mut output, channel, MissingCalibration::Pedestals);
            continue;
        };
        let Some(ratios) = calib.gain_ratios(channel) else {
            skip(&mut output, channel, MissingCalibration::GainRatios);
            continue;
        };
        let Some(group) = calib.group(channel) else {
            skip(&mut output, channel, MissingCalibration::Group);
            continue;
        };

        let key = WeightKey::new(group, DEFAULT_TDC_ID);
        let Some(weights) = calib.weights(key) else {
            skip(&mut output, channel, MissingCalibration::Weights(key));
            continue;
        };

        let hit = estimator.make_hit(frame, pedestals, ratios, weights)?;
        output.hits.push(hit);
    }

    debug!(
        %subdetector,
        hits = output.hits.len(),
        skipped = output.skips.len(),
        "digi collection reconstructed"
    );
    Ok(output)
}

/// Reconstructs both subdetectors of one event. Both output collections
/// are always present, possibly empty.
pub fn reconstruct_event<C: CalibrationLookup>(
    digis: &EventDigis,
    calib: &C,
) -> RecoResult<EventReco> {
    Ok(EventReco {
        barrel: reconstruct_subdetector(Subdetector::Barrel, digis.barrel.as_ref(), calib)?,
        endcap: reconstruct_subdetector(Subdetector::Endcap, digis.endcap.as_ref(), calib)?,
    })
}

fn skip(output: &mut SubdetectorReco, channel: ChannelId, missing: MissingCalibration) {
    warn!(
        subdetector = %output.subdetector,
        %channel,
        lookup = %missing,
        "calibration lookup missed; no hit will be made for this digi"
    );
    output.skips.push(ChannelSkip { channel, missing });
}
