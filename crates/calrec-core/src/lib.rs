//! Weight-method amplitude reconstruction for a sampling calorimeter.
//!
//! Converts raw multi-gain digitized waveforms into uncalibrated
//! amplitude estimates (plus a chi-square fit quality) using banks of
//! precomputed linear weights keyed by channel group and gain-switch
//! state. Calibration retrieval, event routing, and job orchestration
//! live outside this crate; it consumes immutable calibration snapshots
//! and produces per-subdetector hit collections.

pub mod calib;
pub mod domain;
pub mod reco;
