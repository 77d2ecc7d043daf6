//! Per-channel amplitude estimation from precomputed linear weights.

use super::{RecoError, RecoResult};
use crate::calib::{GainRatios, Pedestals, WeightBundle};
use crate::domain::{DigiFrame, UncalibratedHit};

/// Estimates one channel's pulse amplitude and fit chi-square from its
/// raw frame and the matching calibration inputs.
///
/// Pure: a given (frame, pedestals, ratios, weights) tuple always
/// produces the same hit. One instance per subdetector is conventional
/// but nothing here is subdetector-specific.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeightsEstimator;

impl WeightsEstimator {
    pub fn new() -> Self {
        Self
    }

    /// Builds the reconstructed hit for one frame.
    ///
    /// Each sample is pedestal-subtracted in its own gain range and
    /// scaled onto the reference range; a frame containing any
    /// non-reference sample selects the after-switch weight pair for
    /// the whole frame. amplitude = w·s, chi2 = sT M s.
    ///
    /// A frame whose length disagrees with the bundle dimension is a
    /// calibration-integrity fault and fails the whole event rather
    /// than producing a silently wrong estimate.
    pub fn make_hit(
        &self,
        frame: &DigiFrame,
        pedestals: &Pedestals,
        ratios: &GainRatios,
        weights: &WeightBundle,
    ) -> RecoResult<UncalibratedHit> {
        let sample_count = weights.sample_count();
        if frame.len() != sample_count {
            return Err(RecoError::DimensionMismatch {
                channel: frame.channel(),
                frame_len: frame.len(),
                weight_len: sample_count,
            });
        }

        let (corrected, gain_switched) = gain_corrected_samples(frame, pedestals, ratios);

        let amp_weights = weights.amplitude_weights(gain_switched);
        let mut amplitude = 0.0;
        for (weight, sample) in amp_weights.iter().zip(&corrected) {
            amplitude += weight * sample;
        }

        let chi2_weights = weights.chi2_weights(gain_switched);
        let mut chi2 = 0.0;
        for row in 0..sample_count {
            let mut row_sum = 0.0;
            for col in 0..sample_count {
                row_sum += chi2_weights[(row, col)] * corrected[col];
            }
            chi2 += corrected[row] * row_sum;
        }

        Ok(UncalibratedHit {
            channel: frame.channel(),
            amplitude,
            chi2,
            gain_switched,
        })
    }
}

/// Pedestal-subtracts and gain-unifies a frame, reporting whether any
/// sample left the reference range.
fn gain_corrected_samples(
    frame: &DigiFrame,
    pedestals: &Pedestals,
    ratios: &GainRatios,
) -> (Vec<f64>, bool) {
    let mut corrected = Vec::with_capacity(frame.len());
    let mut gain_switched = false;

    for sample in frame.samples() {
        let mode = sample.gain_mode();
        if !mode.is_reference() {
            gain_switched = true;
        }
        let subtracted = f64::from(sample.adc()) - pedestals.mean(mode);
        corrected.push(subtracted * ratios.ratio(mode));
    }

    (corrected, gain_switched)
}

#[cfg(test)]
mod tests {
    use super::{WeightsEstimator, gain_corrected_samples};
    use crate::calib::{DenseMatrix, GainRatios, Pedestals, WeightBundle};
    use crate::domain::{ChannelId, DigiFrame, RawSample};
    use crate::reco::RecoError;

    fn frame(channel: u32, samples: &[(u16, u8)]) -> DigiFrame {
        DigiFrame::new(
            ChannelId(channel),
            samples
                .iter()
                .map(|&(adc, selector)| RawSample::new(adc, selector))
                .collect(),
        )
    }

    fn identity(size: usize) -> DenseMatrix {
        DenseMatrix::from_fn(size, size, |row, col| if row == col { 1.0 } else { 0.0 })
    }

    fn bundle(
        amp_before: Vec<f64>,
        amp_after: Vec<f64>,
        chi2_before: DenseMatrix,
        chi2_after: DenseMatrix,
    ) -> WeightBundle {
        WeightBundle::new(amp_before, amp_after, chi2_before, chi2_after)
            .expect("test bundle should build")
    }

    // Reference pulse from the data-model contract: three reference
    // samples on a 200 pedestal, then seven x6 samples on a 900
    // pedestal with a 2.0 conversion back to the reference scale.
    fn reference_scenario_frame() -> DigiFrame {
        frame(
            7,
            &[
                (200, 0),
                (205, 0),
                (203, 0),
                (900, 1),
                (905, 1),
                (902, 1),
                (898, 1),
                (901, 1),
                (899, 1),
                (897, 1),
            ],
        )
    }

    #[test]
    fn gain_correction_matches_reference_scenario() {
        let pedestals = Pedestals::new([200.0, 900.0, 1000.0]);
        let ratios = GainRatios::new(2.0, 6.0);

        let (corrected, gain_switched) =
            gain_corrected_samples(&reference_scenario_frame(), &pedestals, &ratios);

        assert!(gain_switched, "non-reference samples must flag a switch");
        assert_eq!(
            corrected,
            vec![0.0, 5.0, 3.0, 0.0, 10.0, 4.0, -4.0, 2.0, -2.0, -6.0]
        );
    }

    #[test]
    fn switched_frame_uses_after_switch_weight_pair() {
        let pedestals = Pedestals::new([200.0, 900.0, 1000.0]);
        let ratios = GainRatios::new(2.0, 6.0);
        // Before-switch weights would give a wildly different answer;
        // the switched frame must ignore them entirely.
        let mut amp_after = vec![0.0; 10];
        for slot in &mut amp_after[3..7] {
            *slot = 0.25;
        }
        let weights = bundle(
            vec![100.0; 10],
            amp_after,
            DenseMatrix::zeros(10, 10),
            identity(10),
        );

        let hit = WeightsEstimator::new()
            .make_hit(&reference_scenario_frame(), &pedestals, &ratios, &weights)
            .expect("hit should be produced");

        assert!(hit.gain_switched);
        // 0.25 * (0 + 10 + 4 - 4)
        assert_eq!(hit.amplitude, 2.5);
        // sum of squares of the corrected vector
        assert_eq!(hit.chi2, 210.0);
    }

    #[test]
    fn unswitched_frame_uses_before_switch_weight_pair() {
        let pedestals = Pedestals::new([200.0, 0.0, 0.0]);
        let ratios = GainRatios::new(2.0, 6.0);
        let weights = bundle(
            vec![0.1; 10],
            vec![0.0; 10],
            identity(10),
            DenseMatrix::zeros(10, 10),
        );

        let samples: Vec<(u16, u8)> = (1..=10).map(|i| (200 + 10 * i as u16, 0)).collect();
        let hit = WeightsEstimator::new()
            .make_hit(&frame(8, &samples), &pedestals, &ratios, &weights)
            .expect("hit should be produced");

        assert!(!hit.gain_switched);
        // 0.1 * (10 + 20 + ... + 100)
        assert!((hit.amplitude - 55.0).abs() < 1.0e-12);
        // identity quadratic form: 100 + 400 + ... + 10000
        assert!((hit.chi2 - 38_500.0).abs() < 1.0e-9);
    }

    #[test]
    fn amplitude_is_linear_and_chi2_quadratic_in_the_samples() {
        let pedestals = Pedestals::new([0.0, 0.0, 0.0]);
        let ratios = GainRatios::new(2.0, 6.0);
        let weights = bundle(
            vec![0.5, -0.25, 0.125, 1.0],
            vec![0.0; 4],
            identity(4),
            DenseMatrix::zeros(4, 4),
        );
        let estimator = WeightsEstimator::new();

        let base = estimator
            .make_hit(&frame(1, &[(8, 0), (16, 0), (24, 0), (32, 0)]), &pedestals, &ratios, &weights)
            .expect("base hit");
        let scaled = estimator
            .make_hit(&frame(1, &[(24, 0), (48, 0), (72, 0), (96, 0)]), &pedestals, &ratios, &weights)
            .expect("scaled hit");

        assert!((scaled.amplitude - 3.0 * base.amplitude).abs() < 1.0e-9);
        assert!((scaled.chi2 - 9.0 * base.chi2).abs() < 1.0e-9);
    }

    #[test]
    fn frame_and_bundle_dimension_mismatch_is_fatal() {
        let pedestals = Pedestals::new([0.0, 0.0, 0.0]);
        let ratios = GainRatios::new(2.0, 6.0);
        let weights = bundle(
            vec![0.25; 4],
            vec![0.25; 4],
            identity(4),
            identity(4),
        );

        let error = WeightsEstimator::new()
            .make_hit(
                &frame(9, &[(1, 0), (2, 0), (3, 0), (4, 0), (5, 0)]),
                &pedestals,
                &ratios,
                &weights,
            )
            .expect_err("mismatch should fail");

        assert_eq!(
            error,
            RecoError::DimensionMismatch {
                channel: ChannelId(9),
                frame_len: 5,
                weight_len: 4,
            }
        );
    }
}
