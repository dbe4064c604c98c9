//! Zero-energy peak diagnostics.
//!
//! The FWHM search is a forward scan from the zero channel: the first channel
//! within 5% of half height wins, and the first channel that drops below half
//! height settles between itself and its predecessor. It is a heuristic, not
//! an interpolated half-max crossing.

use serde::Serialize;

use super::spectrum::extract_whole;
use crate::data::axis::{self, AxisModel};
use crate::data::model::Signal;
use crate::error::{EngineError, Result};

/// Fraction of the peak height accepted as "at half height".
pub const HALF_HEIGHT_TOLERANCE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeakMetrics {
    pub zero_index: Option<usize>,
    pub height: f64,
    pub half_height: f64,
    pub fwhm_index: Option<usize>,
    pub width_in_units: f64,
}

impl PeakMetrics {
    /// No zero crossing inside the captured channels.
    pub fn undefined() -> Self {
        Self {
            zero_index: None,
            height: 0.0,
            half_height: 0.0,
            fwhm_index: None,
            width_in_units: 0.0,
        }
    }
}

/// First channel after `zero_index` at (about) half the zero-peak height.
/// Falls back to `zero_index` when the spectrum never falls off, and is
/// `None` when `zero_index` lies outside the spectrum.
pub fn fwhm_index(spectrum: &[f64], zero_index: usize) -> Option<usize> {
    let height = *spectrum.get(zero_index)?;
    let half = height / 2.0;
    let tolerance = height * HALF_HEIGHT_TOLERANCE;

    for i in zero_index + 1..spectrum.len() {
        let value = spectrum[i];
        if (value - half).abs() <= tolerance {
            return Some(i);
        }
        if value < half {
            if i == zero_index + 1 {
                return Some(i);
            }
            let prev_diff = (spectrum[i - 1] - half).abs();
            let curr_diff = (value - half).abs();
            return Some(if curr_diff < prev_diff { i } else { i - 1 });
        }
    }
    Some(zero_index)
}

/// Measure the zero peak of `spectrum` calibrated by `axis`.
pub fn analyze(spectrum: &[f64], axis: &AxisModel) -> Result<PeakMetrics> {
    let Some(zero) = axis.zero_index()? else {
        return Ok(PeakMetrics::undefined());
    };
    let (Some(&height), Some(fwhm)) = (spectrum.get(zero), fwhm_index(spectrum, zero)) else {
        return Ok(PeakMetrics::undefined());
    };

    Ok(PeakMetrics {
        zero_index: Some(zero),
        height,
        half_height: height / 2.0,
        fwhm_index: Some(fwhm),
        width_in_units: fwhm.abs_diff(zero) as f64 * axis.scale.abs(),
    })
}

/// Whole-frame zero-peak metrics of a 1D or 3D signal.
pub fn analyze_signal(signal: &Signal) -> Result<PeakMetrics> {
    let spectral = signal
        .spectral_axis()
        .ok_or_else(|| EngineError::shape("zero peak width", "a 1D or 3D signal", signal.shape()))?;
    let model = axis::calibrated(spectral)?;
    let spectrum = extract_whole(signal)?;
    analyze(&spectrum, &model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::AxisDescriptor;
    use approx::assert_relative_eq;
    use ndarray::Array3;

    fn energy(offset: f64, scale: f64, size: usize) -> AxisModel {
        AxisModel::new(offset, scale, size)
    }

    #[test]
    fn test_constant_cube_has_zero_width() {
        let data = Array3::<f64>::ones((4, 4, 10)).into_dyn();
        let axes = vec![
            AxisDescriptor::uncalibrated(4),
            AxisDescriptor::uncalibrated(4),
            AxisDescriptor::new("Energy", 10, -2.0, 1.0, "keV"),
        ];
        let sig = Signal::new(data, axes).unwrap();

        let metrics = analyze_signal(&sig).unwrap();
        assert_eq!(metrics.zero_index, Some(2));
        assert_eq!(metrics.height, 16.0);
        assert_eq!(metrics.half_height, 8.0);
        assert_eq!(metrics.fwhm_index, Some(2));
        assert_eq!(metrics.width_in_units, 0.0);
    }

    #[test]
    fn test_match_within_tolerance() {
        // half height 50, tolerance 5: 53 qualifies
        let spectrum = [0.0, 100.0, 80.0, 53.0, 20.0];
        assert_eq!(fwhm_index(&spectrum, 1), Some(3));

        let metrics = analyze(&spectrum, &energy(-0.01, 0.01, 5)).unwrap();
        assert_eq!(metrics.zero_index, Some(1));
        assert_relative_eq!(metrics.width_in_units, 0.02);
    }

    #[test]
    fn test_drop_below_picks_closer_neighbor() {
        // 60 is 10 above half, 44 is 6 below → current wins
        assert_eq!(fwhm_index(&[100.0, 80.0, 60.0, 44.0], 0), Some(3));
        // 58 is 8 above half, 30 is 20 below → previous wins
        assert_eq!(fwhm_index(&[100.0, 80.0, 58.0, 30.0], 0), Some(2));
        // equal distance keeps the previous channel
        assert_eq!(fwhm_index(&[100.0, 80.0, 60.0, 40.0], 0), Some(2));
    }

    #[test]
    fn test_immediate_drop_takes_first_channel() {
        assert_eq!(fwhm_index(&[100.0, 10.0, 0.0], 0), Some(1));
    }

    #[test]
    fn test_noisy_spectrum_takes_first_qualifying_channel() {
        // the later, closer match at index 5 is never reached
        let spectrum = [100.0, 70.0, 90.0, 40.0, 70.0, 50.0];
        assert_eq!(fwhm_index(&spectrum, 0), Some(3));
    }

    #[test]
    fn test_index_past_end_has_no_width() {
        assert_eq!(fwhm_index(&[100.0, 50.0], 2), None);
        assert_eq!(fwhm_index(&[], 0), None);
    }

    #[test]
    fn test_axis_longer_than_spectrum_is_sentinel() {
        // zero at channel 4, spectrum only 3 long
        let metrics = analyze(&[5.0, 4.0, 3.0], &energy(-4.0, 1.0, 8)).unwrap();
        assert_eq!(metrics, PeakMetrics::undefined());
    }

    #[test]
    fn test_zero_outside_axis_is_sentinel() {
        let metrics = analyze(&[5.0, 4.0, 3.0], &energy(1.0, 0.1, 3)).unwrap();
        assert_eq!(metrics, PeakMetrics::undefined());
    }

    #[test]
    fn test_zero_scale_fails() {
        let err = analyze(&[1.0, 2.0], &energy(0.0, 0.0, 2)).unwrap_err();
        assert_eq!(err.kind(), "calibration_error");
    }
}
