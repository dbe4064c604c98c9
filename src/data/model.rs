use std::collections::BTreeMap;
use std::fmt;

use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

// ---------------------------------------------------------------------------
// MetadataValue – a single leaf of a signal's metadata tree
// ---------------------------------------------------------------------------

/// A dynamically-typed metadata value as found in instrument headers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// ISO-8601 date string kept as text for simplicity.
    Date(String),
    /// Numeric arrays (e.g. per-detector calibration tables).
    List(Vec<f64>),
    Null,
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v:.4}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Date(d) => write!(f, "{d}"),
            MetadataValue::List(v) => write!(f, "[{} values]", v.len()),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

impl MetadataValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) | MetadataValue::Date(s) => Some(s),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// AxisDescriptor – calibration of one array dimension
// ---------------------------------------------------------------------------

/// Physical calibration of one dimension: `value = offset + scale * index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    pub size: usize,
    #[serde(default)]
    pub offset: f64,
    #[serde(default = "unit_scale")]
    pub scale: f64,
    #[serde(default)]
    pub units: Option<String>,
}

fn unit_scale() -> f64 {
    1.0
}

impl AxisDescriptor {
    /// Uncalibrated axis: offset 0, scale 1, no name or units.
    pub fn uncalibrated(size: usize) -> Self {
        Self {
            name: None,
            size,
            offset: 0.0,
            scale: 1.0,
            units: None,
        }
    }

    pub fn new(name: &str, size: usize, offset: f64, scale: f64, units: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            size,
            offset,
            scale,
            units: Some(units.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Signal – an N-dimensional array with per-axis calibration
// ---------------------------------------------------------------------------

/// What a signal can be displayed as, derived from its dimensionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub has_spectrum: bool,
    pub has_image: bool,
}

/// A decoded signal. 3D data is laid out as (height, width, channel).
///
/// The array is never mutated once the signal is built; cached signals are
/// shared behind `Arc` between concurrent readers.
#[derive(Debug, Clone)]
pub struct Signal {
    pub title: Option<String>,
    /// Instrument signal family reported by the reader (e.g. `EDS_TEM`).
    pub signal_type: Option<String>,
    data: ArrayD<f64>,
    axes: Vec<AxisDescriptor>,
    /// Flattened metadata tree: `Category.key` → value.
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl Signal {
    /// Build a signal, checking one axis per dimension with matching sizes.
    pub fn new(data: ArrayD<f64>, axes: Vec<AxisDescriptor>) -> Result<Self> {
        if !(1..=3).contains(&data.ndim()) {
            return Err(EngineError::shape(
                "signal",
                "1, 2 or 3 dimensions",
                data.shape(),
            ));
        }
        if axes.len() != data.ndim() {
            return Err(EngineError::shape(
                "signal",
                "one axis descriptor per dimension",
                data.shape(),
            ));
        }
        if axes.iter().zip(data.shape()).any(|(a, &len)| a.size != len) {
            return Err(EngineError::shape(
                "signal",
                "axis sizes matching the array",
                data.shape(),
            ));
        }
        Ok(Self {
            title: None,
            signal_type: None,
            data,
            axes,
            metadata: BTreeMap::new(),
        })
    }

    /// Build from flat row-major values and a shape.
    pub fn from_shape_vec(
        shape: &[usize],
        values: Vec<f64>,
        axes: Vec<AxisDescriptor>,
    ) -> Result<Self> {
        let expected = shape
            .iter()
            .try_fold(1usize, |n, &d| n.checked_mul(d))
            .ok_or_else(|| EngineError::shape("signal", "a shape that fits in memory", shape))?;
        if expected != values.len() {
            return Err(EngineError::shape(
                "signal",
                "as many values as the shape holds",
                shape,
            ));
        }
        let data = ArrayD::from_shape_vec(IxDyn(shape), values)
            .map_err(|_| EngineError::shape("signal", "a valid shape", shape))?;
        Self::new(data, axes)
    }

    /// Uncalibrated signal (offset 0, scale 1 on every axis).
    pub fn uncalibrated(data: ArrayD<f64>) -> Result<Self> {
        let axes = data
            .shape()
            .iter()
            .map(|&len| AxisDescriptor::uncalibrated(len))
            .collect();
        Self::new(data, axes)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_signal_type(mut self, signal_type: impl Into<String>) -> Self {
        self.signal_type = Some(signal_type.into());
        self
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, MetadataValue>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn axes(&self) -> &[AxisDescriptor] {
        &self.axes
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// The energy axis: the only axis of a 1D signal, the last of a 3D one.
    pub fn spectral_axis(&self) -> Option<&AxisDescriptor> {
        match self.ndim() {
            1 | 3 => self.axes.last(),
            _ => None,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        let dims = self.ndim();
        Capabilities {
            has_spectrum: dims == 1 || dims == 3,
            has_image: dims == 2 || dims == 3,
        }
    }

    /// Title for display, falling back to `Signal <index>`.
    pub fn display_title(&self, index: usize) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| format!("Signal {index}"))
    }
}
