//! JSON exchange format for calibration snapshots.
//!
//! The conditions adapter hands calibration over as plain serde records;
//! conversion into [`CalibrationSnapshot`] validates weight-bundle
//! shapes so a malformed payload is rejected up front instead of
//! surfacing later as a wrong number.

use super::{CalibError, CalibrationSnapshot, GainRatios, GroupId, Pedestals, TdcId, WeightBundle, WeightKey};
use crate::domain::ChannelId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SnapshotError {
    #[error("cannot read snapshot file {}: {message}", .path.display())]
    Unreadable { path: PathBuf, message: String },
    #[error("snapshot payload is not valid JSON: {0}")]
    Malformed(String),
    #[error("weight bundle for group {group}, tdc {tdc} is invalid: {source}")]
    InvalidWeightBundle {
        group: GroupId,
        tdc: TdcId,
        source: CalibError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PedestalEntry {
    pub channel: ChannelId,
    pub means: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GainRatioEntry {
    pub channel: ChannelId,
    pub gain12_over_6: f64,
    pub gain6_over_1: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupEntry {
    pub channel: ChannelId,
    pub group: GroupId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightBundleEntry {
    pub group: GroupId,
    pub tdc: TdcId,
    pub amp_before: Vec<f64>,
    pub amp_after: Vec<f64>,
    pub chi2_before: Vec<Vec<f64>>,
    pub chi2_after: Vec<Vec<f64>>,
}

/// Serde mirror of one full calibration snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSpec {
    pub pedestals: Vec<PedestalEntry>,
    pub gain_ratios: Vec<GainRatioEntry>,
    pub groups: Vec<GroupEntry>,
    pub weights: Vec<WeightBundleEntry>,
}

impl SnapshotSpec {
    pub fn from_json_str(payload: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(payload).map_err(|error| SnapshotError::Malformed(error.to_string()))
    }

    pub fn from_json_file(path: &Path) -> Result<Self, SnapshotError> {
        let payload = fs::read_to_string(path).map_err(|error| SnapshotError::Unreadable {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;
        Self::from_json_str(&payload)
    }
}

impl TryFrom<SnapshotSpec> for CalibrationSnapshot {
    type Error = SnapshotError;

    fn try_from(spec: SnapshotSpec) -> Result<Self, Self::Error> {
        let mut snapshot = CalibrationSnapshot::new();

        for entry in spec.pedestals {
            snapshot.set_pedestals(entry.channel, Pedestals::new(entry.means));
        }
        for entry in spec.gain_ratios {
            snapshot.set_gain_ratios(
                entry.channel,
                GainRatios::new(entry.gain12_over_6, entry.gain6_over_1),
            );
        }
        for entry in spec.groups {
            snapshot.set_group(entry.channel, entry.group);
        }
        for entry in spec.weights {
            let key = WeightKey::new(entry.group, entry.tdc);
            let bundle = WeightBundle::from_rows(
                entry.amp_before,
                entry.amp_after,
                &entry.chi2_before,
                &entry.chi2_after,
            )
            .map_err(|source| SnapshotError::InvalidWeightBundle {
                group: key.group,
                tdc: key.tdc,
                source,
            })?;
            snapshot.set_weights(key, bundle);
        }

        Ok(snapshot)
    }
}

impl CalibrationSnapshot {
    /// Parses and validates a JSON snapshot payload in one step.
    pub fn from_json_str(payload: &str) -> Result<Self, SnapshotError> {
        SnapshotSpec::from_json_str(payload)?.try_into()
    }

    /// Reads, parses, and validates a snapshot file in one step.
    pub fn from_json_file(path: &Path) -> Result<Self, SnapshotError> {
        SnapshotSpec::from_json_file(path)?.try_into()
    }
}
