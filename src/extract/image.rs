use ndarray::{s, Array2, Axis, Ix2};
use serde::Serialize;

use super::spectrum::cube_view;
use crate::data::model::Signal;
use crate::error::{EngineError, Result};

/// Upper bound of the display range.
pub const DISPLAY_MAX: f64 = 255.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DataRange {
    pub min: f64,
    pub max: f64,
}

/// Displayable image plus the intensity range it was rescaled from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageResult {
    pub data_shape: Vec<usize>,
    pub image_shape: [usize; 2],
    pub image_data: Vec<Vec<f64>>,
    pub data_range: DataRange,
}

/// 2D data as-is; 3D summed over the channel axis.
pub fn reduce(signal: &Signal) -> Result<Array2<f64>> {
    match signal.ndim() {
        2 => signal
            .data()
            .view()
            .into_dimensionality::<Ix2>()
            .map(|v| v.to_owned())
            .map_err(|_| EngineError::shape("image", "a 2D or 3D signal", signal.shape())),
        3 => Ok(cube_view(signal, "image")?.sum_axis(Axis(2))),
        _ => Err(EngineError::shape(
            "image",
            "a 2D or 3D signal",
            signal.shape(),
        )),
    }
}

/// Reduce and rescale to `[0, 255]`.
pub fn extract(signal: &Signal) -> Result<ImageResult> {
    let reduced = reduce(signal)?;
    let data_range = range_of(&reduced);
    let normalized = normalize(reduced, data_range);
    let (rows, cols) = normalized.dim();

    Ok(ImageResult {
        data_shape: signal.shape().to_vec(),
        image_shape: [rows, cols],
        image_data: to_rows(&normalized),
        data_range,
    })
}

/// Linear rescale to `[0, 255]`. Flat images are returned untouched.
pub fn normalize(image: Array2<f64>, range: DataRange) -> Array2<f64> {
    let span = range.max - range.min;
    if span == 0.0 || !span.is_finite() {
        return image;
    }
    image.mapv_into(|v| (v - range.min) / span * DISPLAY_MAX)
}

/// Sum of channels `start..=end` of a 3D signal, without rescaling.
pub fn channel_range_image(signal: &Signal, start: usize, end: usize) -> Result<Vec<Vec<f64>>> {
    let cube = cube_view(signal, "energy range image")?;
    let channels = cube.len_of(Axis(2));
    if start > end || end >= channels {
        return Err(EngineError::OutOfRange(format!(
            "invalid channel range: start={start}, end={end}, spectrum_length={channels}"
        )));
    }

    let summed = cube.slice(s![.., .., start..=end]).sum_axis(Axis(2));
    Ok(to_rows(&summed))
}

fn range_of(image: &Array2<f64>) -> DataRange {
    if image.is_empty() {
        return DataRange { min: 0.0, max: 0.0 };
    }
    let min = image.iter().copied().fold(f64::INFINITY, f64::min);
    let max = image.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    DataRange { min, max }
}

fn to_rows(image: &Array2<f64>) -> Vec<Vec<f64>> {
    image.outer_iter().map(|row| row.to_vec()).collect()
}
