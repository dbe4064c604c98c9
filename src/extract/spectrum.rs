use std::ops::Range;

use ndarray::{s, Axis, Ix3, Slice};
use serde::{Deserialize, Serialize};

use crate::data::axis::{self, AxisModel};
use crate::data::model::Signal;
use crate::error::{EngineError, Result};

// ---------------------------------------------------------------------------
// Region of interest
// ---------------------------------------------------------------------------

/// Rectangular pixel bounds in the spatial plane, as sent by a client.
/// May be unordered or out of bounds; see [`Region::clamp_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl Region {
    pub fn new(x1: i64, y1: i64, x2: i64, y2: i64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Clamp x to `[0, width]` and y to `[0, height]`, then order each pair.
    /// Returns half-open (rows, columns) ranges.
    pub fn clamp_to(&self, width: usize, height: usize) -> (Range<usize>, Range<usize>) {
        let x1 = clamp(self.x1, width);
        let x2 = clamp(self.x2, width);
        let y1 = clamp(self.y1, height);
        let y2 = clamp(self.y2, height);
        (y1.min(y2)..y1.max(y2), x1.min(x2)..x1.max(x2))
    }
}

fn clamp(v: i64, hi: usize) -> usize {
    v.clamp(0, hi as i64) as usize
}

// ---------------------------------------------------------------------------
// Spectrum extraction
// ---------------------------------------------------------------------------

/// One intensity per channel: 1D data verbatim, 3D summed over both
/// spatial axes.
pub fn extract_whole(signal: &Signal) -> Result<Vec<f64>> {
    match signal.ndim() {
        1 => Ok(signal.data().iter().copied().collect()),
        3 => {
            let cube = cube_view(signal, "spectrum")?;
            Ok(cube.sum_axis(Axis(0)).sum_axis(Axis(0)).to_vec())
        }
        _ => Err(EngineError::shape(
            "spectrum",
            "a 1D or 3D signal",
            signal.shape(),
        )),
    }
}

/// Sum of the (clamped, reordered) region of a 3D signal, one value per
/// channel. A zero-area region yields all zeros.
pub fn extract_region(signal: &Signal, region: &Region) -> Result<Vec<f64>> {
    let cube = cube_view(signal, "region spectrum")?;
    let (height, width, channels) = cube.dim();
    let (rows, cols) = region.clamp_to(width, height);

    if rows.is_empty() || cols.is_empty() {
        return Ok(vec![0.0; channels]);
    }

    let block = cube.slice(s![rows, cols, ..]);
    Ok(block.sum_axis(Axis(0)).sum_axis(Axis(0)).to_vec())
}

/// Total counts over every pixel whose channel falls in the energy window
/// `[start, end)`. Both bounds must lie inside the spectral axis.
pub fn energy_window_sum(signal: &Signal, start: f64, end: f64) -> Result<f64> {
    let spectral = signal.spectral_axis().ok_or_else(|| {
        EngineError::shape("energy window sum", "a 1D or 3D signal", signal.shape())
    })?;
    let model = axis::calibrated(spectral)?;

    let (low, high) = (model.low_value(), model.high_value());
    if start > high || end > high {
        return Err(EngineError::OutOfRange(format!(
            "energy range {start}..{end} exceeds spectrum maximum {high}"
        )));
    }
    if start < low || end < low {
        return Err(EngineError::OutOfRange(format!(
            "energy range {start}..{end} below spectrum minimum {low}"
        )));
    }

    let first = channel_of(&model, start)?;
    let last = channel_of(&model, end)?;
    let channels = first.min(last)..first.max(last);

    let last_axis = Axis(signal.ndim() - 1);
    Ok(signal
        .data()
        .slice_axis(last_axis, Slice::from(channels))
        .sum())
}

/// Nearest channel to `value`, clamped to `[0, size]`.
fn channel_of(model: &AxisModel, value: f64) -> Result<usize> {
    let index = model.to_index(value)?.round();
    Ok(index.clamp(0.0, model.size as f64) as usize)
}

pub(crate) fn cube_view<'a>(
    signal: &'a Signal,
    operation: &'static str,
) -> Result<ndarray::ArrayView3<'a, f64>> {
    signal
        .data()
        .view()
        .into_dimensionality::<Ix3>()
        .map_err(|_| EngineError::shape(operation, "a 3D signal", signal.shape()))
}

// ---------------------------------------------------------------------------
// SpectrumResult
// ---------------------------------------------------------------------------

/// Calibrated spectrum ready for plotting. `x.len() == y.len()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectrumResult {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub x_label: String,
    pub x_units: String,
    pub y_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zero_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fwhm_index: Option<usize>,
}

impl SpectrumResult {
    /// Pair `y` with the calibrated values of the signal's spectral axis.
    pub fn calibrated(signal: &Signal, y: Vec<f64>) -> Result<Self> {
        let axis = signal
            .spectral_axis()
            .ok_or_else(|| EngineError::shape("spectrum", "a 1D or 3D signal", signal.shape()))?;

        let x = AxisModel::from(axis).values();
        debug_assert_eq!(x.len(), y.len());

        Ok(Self {
            x,
            y,
            x_label: axis.name.clone().unwrap_or_else(|| "Energy".to_string()),
            x_units: axis.units.clone().unwrap_or_else(|| "keV".to_string()),
            y_label: "Intensity".to_string(),
            zero_index: None,
            fwhm_index: None,
        })
    }

    pub fn with_markers(mut self, zero_index: Option<usize>, fwhm_index: Option<usize>) -> Self {
        self.zero_index = zero_index;
        self.fwhm_index = fwhm_index;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::AxisDescriptor;
    use ndarray::{Array1, Array2, Array3};

    /// value = row * 100 + col * 10 + channel
    fn ramp_cube(h: usize, w: usize, c: usize) -> Signal {
        let data = Array3::from_shape_fn((h, w, c), |(y, x, k)| (y * 100 + x * 10 + k) as f64);
        Signal::uncalibrated(data.into_dyn()).unwrap()
    }

    #[test]
    fn test_whole_frame_lengths() {
        let cube = ramp_cube(3, 4, 7);
        assert_eq!(extract_whole(&cube).unwrap().len(), 7);

        let line = Signal::uncalibrated(Array1::from(vec![1.0, 2.0, 3.0]).into_dyn()).unwrap();
        assert_eq!(extract_whole(&line).unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_whole_frame_rejects_images() {
        let image = Signal::uncalibrated(Array2::<f64>::zeros((4, 4)).into_dyn()).unwrap();
        assert_eq!(extract_whole(&image).unwrap_err().kind(), "shape_error");
        assert_eq!(
            extract_region(&image, &Region::new(0, 0, 1, 1)).unwrap_err().kind(),
            "shape_error"
        );
    }

    #[test]
    fn test_whole_frame_sums_spatial_plane() {
        let ones = Signal::uncalibrated(Array3::<f64>::ones((4, 4, 10)).into_dyn()).unwrap();
        assert_eq!(extract_whole(&ones).unwrap(), vec![16.0; 10]);
    }

    #[test]
    fn test_region_single_pixel() {
        let cube = ramp_cube(3, 4, 2);
        // x in [2,3), y in [1,2) → pixel (row 1, col 2)
        assert_eq!(extract_region(&cube, &Region::new(2, 1, 3, 2)).unwrap(), vec![120.0, 121.0]);
    }

    #[test]
    fn test_region_is_reordered_and_clamped() {
        let cube = ramp_cube(3, 4, 2);
        let ordered = extract_region(&cube, &Region::new(0, 0, 4, 3)).unwrap();
        let swapped = extract_region(&cube, &Region::new(99, 50, -7, -1)).unwrap();
        assert_eq!(ordered, swapped);
        assert_eq!(ordered, extract_whole(&cube).unwrap());
    }

    #[test]
    fn test_region_zero_area_is_zeros() {
        let cube = ramp_cube(3, 4, 5);
        assert_eq!(extract_region(&cube, &Region::new(2, 0, 2, 3)).unwrap(), vec![0.0; 5]);
        assert_eq!(extract_region(&cube, &Region::new(-5, -5, -1, -1)).unwrap(), vec![0.0; 5]);
    }

    #[test]
    fn test_region_sum_decomposes() {
        let cube = ramp_cube(5, 6, 4);
        let whole = extract_region(&cube, &Region::new(1, 1, 5, 4)).unwrap();
        let left = extract_region(&cube, &Region::new(1, 1, 3, 4)).unwrap();
        let right = extract_region(&cube, &Region::new(3, 1, 5, 4)).unwrap();
        let combined: Vec<f64> = left.iter().zip(&right).map(|(a, b)| a + b).collect();
        assert_eq!(whole, combined);
    }

    #[test]
    fn test_region_clamping_never_fails() {
        let cube = ramp_cube(2, 3, 3);
        for &(x1, y1, x2, y2) in &[
            (i64::MIN, i64::MIN, i64::MAX, i64::MAX),
            (-1, 10, 10, -1),
            (3, 2, 3, 2),
            (1, 1, 1, 1),
        ] {
            let spectrum = extract_region(&cube, &Region::new(x1, y1, x2, y2)).unwrap();
            assert_eq!(spectrum.len(), 3);
        }
    }

    fn calibrated_cube() -> Signal {
        // 2x2 pixels, channel k holds k counts; energy = 0.5 * k
        let data = Array3::from_shape_fn((2, 2, 6), |(_, _, k)| k as f64).into_dyn();
        let axes = vec![
            AxisDescriptor::uncalibrated(2),
            AxisDescriptor::uncalibrated(2),
            AxisDescriptor::new("Energy", 6, 0.0, 0.5, "keV"),
        ];
        Signal::new(data, axes).unwrap()
    }

    #[test]
    fn test_energy_window_sum() {
        let cube = calibrated_cube();
        // channels 1..4 → (1 + 2 + 3) * 4 pixels
        assert_eq!(energy_window_sum(&cube, 0.5, 2.0).unwrap(), 24.0);
        // reversed bounds select the same channels
        assert_eq!(energy_window_sum(&cube, 2.0, 0.5).unwrap(), 24.0);
        assert_eq!(energy_window_sum(&cube, 1.0, 1.0).unwrap(), 0.0);

        let line = Signal::new(
            Array1::from(vec![1.0, 2.0, 3.0, 4.0]).into_dyn(),
            vec![AxisDescriptor::new("Energy", 4, -1.0, 1.0, "keV")],
        )
        .unwrap();
        assert_eq!(energy_window_sum(&line, -1.0, 1.0).unwrap(), 3.0);
    }

    #[test]
    fn test_energy_window_outside_axis() {
        let cube = calibrated_cube();
        for (start, end) in [(0.5, 9.0), (-1.0, 1.0), (3.0, 2.0)] {
            assert_eq!(
                energy_window_sum(&cube, start, end).unwrap_err().kind(),
                "out_of_range",
                "{start}..{end}"
            );
        }
        let image = Signal::uncalibrated(Array2::<f64>::zeros((2, 2)).into_dyn()).unwrap();
        assert_eq!(energy_window_sum(&image, 0.0, 1.0).unwrap_err().kind(), "shape_error");
    }

    #[test]
    fn test_calibrated_result_labels() {
        let data = Array3::<f64>::ones((1, 1, 3)).into_dyn();
        let axes = vec![
            AxisDescriptor::uncalibrated(1),
            AxisDescriptor::uncalibrated(1),
            AxisDescriptor {
                name: None,
                size: 3,
                offset: -0.5,
                scale: 0.5,
                units: None,
            },
        ];
        let sig = Signal::new(data, axes).unwrap();
        let result = SpectrumResult::calibrated(&sig, extract_whole(&sig).unwrap()).unwrap();
        assert_eq!(result.x, vec![-0.5, 0.0, 0.5]);
        assert_eq!(result.x.len(), result.y.len());
        assert_eq!(result.x_label, "Energy");
        assert_eq!(result.x_units, "keV");
        assert_eq!(result.y_label, "Intensity");
    }
}
