use super::model::AxisDescriptor;
use crate::error::{EngineError, Result};

// ---------------------------------------------------------------------------
// AxisModel – raw channel index ↔ calibrated value
// ---------------------------------------------------------------------------

/// Calibration math for one axis. Pure and `Copy`, so it can be shared
/// freely between concurrent readers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisModel {
    pub offset: f64,
    pub scale: f64,
    pub size: usize,
}

impl AxisModel {
    pub fn new(offset: f64, scale: f64, size: usize) -> Self {
        Self {
            offset,
            scale,
            size,
        }
    }

    /// `offset + scale * index`.
    pub fn to_physical(&self, index: f64) -> f64 {
        self.offset + self.scale * index
    }

    /// `(value - offset) / scale`; fractional indices are returned as-is.
    pub fn to_index(&self, value: f64) -> Result<f64> {
        self.check_scale()?;
        Ok((value - self.offset) / self.scale)
    }

    /// Channel where the calibrated value crosses zero, or `None` when the
    /// crossing lies outside the captured channels.
    pub fn zero_index(&self) -> Result<Option<usize>> {
        let raw = self.to_index(0.0)?.round();
        if self.size == 0 || !raw.is_finite() || raw < 0.0 {
            return Ok(None);
        }
        if raw > (self.size - 1) as f64 {
            return Ok(None);
        }
        Ok(Some(raw as usize))
    }

    /// Smallest calibrated value covered by the axis.
    pub fn low_value(&self) -> f64 {
        self.offset.min(self.last_value())
    }

    /// Largest calibrated value covered by the axis.
    pub fn high_value(&self) -> f64 {
        self.offset.max(self.last_value())
    }

    fn last_value(&self) -> f64 {
        self.to_physical(self.size.saturating_sub(1) as f64)
    }

    /// Calibrated value of every channel, in channel order.
    pub fn values(&self) -> Vec<f64> {
        (0..self.size).map(|i| self.to_physical(i as f64)).collect()
    }

    fn check_scale(&self) -> Result<()> {
        if self.scale == 0.0 {
            return Err(EngineError::Calibration {
                axis: format!("offset={} size={}", self.offset, self.size),
            });
        }
        Ok(())
    }
}

impl From<&AxisDescriptor> for AxisModel {
    fn from(axis: &AxisDescriptor) -> Self {
        Self::new(axis.offset, axis.scale, axis.size)
    }
}

/// Build a model for `axis`, naming the axis in any calibration error.
pub fn calibrated(axis: &AxisDescriptor) -> Result<AxisModel> {
    if axis.scale == 0.0 {
        return Err(EngineError::Calibration {
            axis: axis.name.clone().unwrap_or_else(|| "unnamed".to_string()),
        });
    }
    Ok(AxisModel::from(axis))
}
