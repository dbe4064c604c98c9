//! Request and response shapes exchanged with the transport layer.
//!
//! Requests are JSON objects tagged by `op`; responses are tagged by `type`
//! with the payload under `data`. Every optional `user` selects the
//! multi-user scope; without it the global slot is used.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cache::CacheStats;
use crate::data::model::MetadataValue;
use crate::data::select::SignalSummary;
use crate::error::ErrorPayload;
use crate::extract::{ImageResult, PeakMetrics, Region, SpectrumResult};
use crate::lines::EmissionLines;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    ListFiles {
        #[serde(default)]
        user: Option<String>,
    },
    ListSignals {
        file: String,
        #[serde(default)]
        user: Option<String>,
    },
    Spectrum {
        file: String,
        #[serde(default)]
        signal: usize,
        #[serde(default)]
        user: Option<String>,
    },
    RegionSpectrum {
        file: String,
        #[serde(default)]
        signal: usize,
        region: Region,
        #[serde(default)]
        user: Option<String>,
    },
    Image {
        file: String,
        #[serde(default)]
        signal: usize,
        #[serde(default)]
        user: Option<String>,
    },
    HaadfImage {
        file: String,
        #[serde(default)]
        user: Option<String>,
    },
    /// Channel indices, both inclusive.
    EnergyRangeImage {
        file: String,
        #[serde(default)]
        signal: usize,
        start: usize,
        end: usize,
        #[serde(default)]
        user: Option<String>,
    },
    /// Calibrated energies.
    EnergyWindowSum {
        file: String,
        #[serde(default)]
        signal: usize,
        start: f64,
        end: f64,
        #[serde(default)]
        user: Option<String>,
    },
    Metadata {
        file: String,
        #[serde(default)]
        signal: usize,
        #[serde(default)]
        user: Option<String>,
    },
    Axes {
        file: String,
        #[serde(default)]
        signal: usize,
        #[serde(default)]
        user: Option<String>,
    },
    ZeroPeakWidth {
        file: String,
        #[serde(default)]
        signal: usize,
        #[serde(default)]
        user: Option<String>,
    },
    EmissionLines {
        atomic_number: u32,
    },
    CacheStats,
    EndSession {
        user: String,
    },
    ClearCache,
}

/// Spectral axis of a 3D signal as shown to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisInfo {
    pub name: Option<String>,
    pub size: usize,
    pub offset: f64,
    pub scale: f64,
    pub units: Option<String>,
    pub zero_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Response {
    Files(Vec<String>),
    Signals(Vec<SignalSummary>),
    Spectrum(SpectrumResult),
    Image(ImageResult),
    /// `None` when the file has no HAADF signal.
    Haadf(Option<ImageResult>),
    EnergyImage(Vec<Vec<f64>>),
    Counts(f64),
    Metadata(BTreeMap<String, MetadataValue>),
    Axes(AxisInfo),
    ZeroPeak(PeakMetrics),
    EmissionLines(EmissionLines),
    Stats(CacheStats),
    SessionEnded(bool),
    Cleared,
    Error(ErrorPayload),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_defaults() {
        let req: Request = serde_json::from_value(json!({"op": "spectrum", "file": "a.emd"})).unwrap();
        assert_eq!(
            req,
            Request::Spectrum {
                file: "a.emd".into(),
                signal: 0,
                user: None
            }
        );
    }

    #[test]
    fn test_region_request() {
        let req: Request = serde_json::from_value(json!({
            "op": "region_spectrum",
            "file": "a.emd",
            "signal": 2,
            "region": {"x1": 5, "y1": -1, "x2": 0, "y2": 40},
            "user": "alice"
        }))
        .unwrap();
        match req {
            Request::RegionSpectrum { signal, region, user, .. } => {
                assert_eq!(signal, 2);
                assert_eq!(region, Region::new(5, -1, 0, 40));
                assert_eq!(user.as_deref(), Some("alice"));
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn test_emission_lines_request() {
        let req: Request =
            serde_json::from_value(json!({"op": "emission_lines", "atomic_number": 26})).unwrap();
        assert_eq!(req, Request::EmissionLines { atomic_number: 26 });
    }

    #[test]
    fn test_unknown_op_is_rejected() {
        assert!(serde_json::from_value::<Request>(json!({"op": "delete_everything"})).is_err());
    }

    #[test]
    fn test_response_tagging() {
        let value = serde_json::to_value(Response::Counts(12.5)).unwrap();
        assert_eq!(value, json!({"type": "counts", "data": 12.5}));

        let value = serde_json::to_value(Response::Error(ErrorPayload {
            kind: "shape_error".into(),
            message: "bad".into(),
        }))
        .unwrap();
        assert_eq!(
            value,
            json!({"type": "error", "data": {"kind": "shape_error", "message": "bad"}})
        );
        assert_eq!(
            serde_json::to_value(Response::Cleared).unwrap(),
            json!({"type": "cleared"})
        );
    }
}
