use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, AsArray, Float32Array, Float64Array, Int32Array, Int64Array, LargeListArray,
    ListArray, StringArray,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::model::{AxisDescriptor, MetadataValue, Signal};

// ---------------------------------------------------------------------------
// Decode collaborator contract
// ---------------------------------------------------------------------------

/// Which decode family to assume for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatHint {
    /// Let the reader detect the format.
    Auto,
    /// Signal container (multi-signal files).
    Emd,
    /// EDS spectrum recorded on a TEM.
    EdsTem,
    /// EDS spectrum recorded on an SEM.
    EdsSem,
}

impl FormatHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatHint::Auto => "auto",
            FormatHint::Emd => "emd",
            FormatHint::EdsTem => "eds_tem",
            FormatHint::EdsSem => "eds_sem",
        }
    }

    /// `signal_type` reported for signals decoded under this hint.
    fn signal_type(&self) -> Option<&'static str> {
        match self {
            FormatHint::EdsTem => Some("EDS_TEM"),
            FormatHint::EdsSem => Some("EDS_SEM"),
            _ => None,
        }
    }
}

impl fmt::Display for FormatHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatHint {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(FormatHint::Auto),
            "emd" => Ok(FormatHint::Emd),
            "eds_tem" => Ok(FormatHint::EdsTem),
            "eds_sem" => Ok(FormatHint::EdsSem),
            other => bail!("Unknown format hint: {other}"),
        }
    }
}

/// A reader decodes either one bare signal or a list of them.
#[derive(Debug, Clone)]
pub enum Decoded {
    One(Signal),
    Many(Vec<Signal>),
}

impl Decoded {
    pub fn into_signals(self) -> Vec<Signal> {
        match self {
            Decoded::One(sig) => vec![sig],
            Decoded::Many(sigs) => sigs,
        }
    }
}

/// Format-reading collaborator: `Decode(file_path, format_hint)`.
pub trait SignalReader: Send + Sync {
    fn decode(&self, path: &Path, hint: FormatHint) -> Result<Decoded>;
}

// ---------------------------------------------------------------------------
// Interchange reader
// ---------------------------------------------------------------------------

/// Reader for open interchange files (JSON containers, CSV spectra,
/// Parquet signal tables). Vendor binary layouts are not decoded here.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterchangeReader;

impl SignalReader for InterchangeReader {
    fn decode(&self, path: &Path, hint: FormatHint) -> Result<Decoded> {
        match hint {
            FormatHint::Auto => {
                let ext = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("")
                    .to_ascii_lowercase();

                match ext.as_str() {
                    "parquet" | "pq" => load_parquet(path),
                    "json" => load_json(path),
                    "csv" => load_csv(path, None).map(Decoded::One),
                    other => bail!("Unsupported file extension: .{other}"),
                }
            }
            FormatHint::Emd => load_json(path),
            FormatHint::EdsTem | FormatHint::EdsSem => {
                load_csv(path, hint.signal_type()).map(Decoded::One)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// JSON container
// ---------------------------------------------------------------------------

/// Expected JSON schema (one signal, an array of them, or `{"signals": [...]}`):
///
/// ```json
/// {
///   "title": "EDS",
///   "signal_type": "EDS_TEM",
///   "axes": [
///     { "name": "y", "size": 2, "offset": 0.0, "scale": 1.0, "units": "nm" },
///     { "name": "x", "size": 2, "offset": 0.0, "scale": 1.0, "units": "nm" },
///     { "name": "Energy", "size": 3, "offset": -0.1, "scale": 0.1, "units": "keV" }
///   ],
///   "data": [ ...12 numbers, row-major... ],
///   "metadata": { "General": { "date": "2024-03-01" } }
/// }
/// ```
#[derive(Debug, Deserialize)]
struct SignalRecord {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    signal_type: Option<String>,
    axes: Vec<AxisDescriptor>,
    data: Vec<f64>,
    #[serde(default)]
    metadata: Option<JsonValue>,
}

fn load_json(path: &Path) -> Result<Decoded> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    match root {
        JsonValue::Array(records) => records
            .into_iter()
            .enumerate()
            .map(|(i, rec)| record_to_signal(rec).with_context(|| format!("Signal {i}")))
            .collect::<Result<Vec<_>>>()
            .map(Decoded::Many),
        JsonValue::Object(ref obj) if obj.contains_key("signals") => {
            let records = obj
                .get("signals")
                .and_then(|v| v.as_array())
                .context("'signals' is not an array")?;
            records
                .iter()
                .enumerate()
                .map(|(i, rec)| {
                    record_to_signal(rec.clone()).with_context(|| format!("Signal {i}"))
                })
                .collect::<Result<Vec<_>>>()
                .map(Decoded::Many)
        }
        other => record_to_signal(other).map(Decoded::One),
    }
}

fn record_to_signal(value: JsonValue) -> Result<Signal> {
    let record: SignalRecord = serde_json::from_value(value).context("invalid signal record")?;
    let shape: Vec<usize> = record.axes.iter().map(|a| a.size).collect();

    let mut signal = Signal::from_shape_vec(&shape, record.data, record.axes)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    signal.title = record.title;
    signal.signal_type = record.signal_type;

    if let Some(meta) = record.metadata {
        let mut flat = BTreeMap::new();
        flatten_metadata("", &meta, &mut flat);
        signal.metadata = flat;
    }
    if signal.title.is_none() {
        signal.title = signal
            .metadata
            .get("General.title")
            .and_then(|v| v.as_str())
            .map(str::to_string);
    }
    Ok(signal)
}

/// Flatten nested objects into `Category.key` entries. Private keys (`_x`)
/// are skipped.
fn flatten_metadata(prefix: &str, value: &JsonValue, out: &mut BTreeMap<String, MetadataValue>) {
    match value {
        JsonValue::Object(map) => {
            for (key, child) in map {
                if key.starts_with('_') {
                    continue;
                }
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_metadata(&path, child, out);
            }
        }
        leaf => {
            out.insert(prefix.to_string(), json_to_metadata(leaf));
        }
    }
}

fn json_to_metadata(val: &JsonValue) -> MetadataValue {
    match val {
        JsonValue::String(s) => {
            if looks_like_date(s) {
                MetadataValue::Date(s.clone())
            } else {
                MetadataValue::String(s.clone())
            }
        }
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                MetadataValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                MetadataValue::Float(f)
            } else {
                MetadataValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => MetadataValue::Bool(*b),
        JsonValue::Null => MetadataValue::Null,
        JsonValue::Array(items) if items.iter().all(|v| v.is_number()) => {
            MetadataValue::List(items.iter().filter_map(|v| v.as_f64()).collect())
        }
        other => MetadataValue::String(other.to_string()),
    }
}

/// `YYYY-MM-DD` prefix.
fn looks_like_date(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() >= 10
        && b[..4].iter().all(u8::is_ascii_digit)
        && b[4] == b'-'
        && b[5..7].iter().all(u8::is_ascii_digit)
        && b[7] == b'-'
        && b[8..10].iter().all(u8::is_ascii_digit)
}

// ---------------------------------------------------------------------------
// CSV spectrum
// ---------------------------------------------------------------------------

/// CSV layout: header row, then `energy,counts` rows with uniform energy
/// spacing. A header like `Energy (keV)` names the axis and its units.
fn load_csv(path: &Path, signal_type: Option<&str>) -> Result<Signal> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.len() < 2 {
        bail!("CSV needs an energy and a counts column, found {}", headers.len());
    }

    let mut energies = Vec::new();
    let mut counts = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        energies.push(parse_cell(record.get(0), row_no, &headers[0])?);
        counts.push(parse_cell(record.get(1), row_no, &headers[1])?);
    }

    if energies.len() < 2 {
        bail!("CSV spectrum needs at least two rows, found {}", energies.len());
    }

    let scale = energies[1] - energies[0];
    if scale == 0.0 {
        bail!("CSV energy column does not advance");
    }
    for (i, pair) in energies.windows(2).enumerate() {
        let step = pair[1] - pair[0];
        if (step - scale).abs() > scale.abs() * 1e-3 {
            bail!("CSV energy spacing is not uniform at row {}", i + 1);
        }
    }

    let (name, units) = split_header(&headers[0]);
    let axis = AxisDescriptor {
        name: Some(name),
        size: counts.len(),
        offset: energies[0],
        scale,
        units,
    };

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("spectrum")
        .to_string();
    let mut signal = Signal::from_shape_vec(&[counts.len()], counts, vec![axis])
        .map_err(|e| anyhow::anyhow!("{e}"))?
        .with_title(stem);
    if let Some(kind) = signal_type {
        signal = signal.with_signal_type(kind);
    }
    Ok(signal)
}

fn parse_cell(cell: Option<&str>, row: usize, col: &str) -> Result<f64> {
    let tok = cell.unwrap_or("").trim();
    tok.parse::<f64>()
        .with_context(|| format!("Row {row}, {col}: '{tok}' is not a number"))
}

/// `"Energy (keV)"` → (`"Energy"`, `Some("keV")`).
fn split_header(header: &str) -> (String, Option<String>) {
    let header = header.trim();
    match (header.find('('), header.rfind(')')) {
        (Some(open), Some(close)) if open < close => {
            let name = header[..open].trim().to_string();
            let units = header[open + 1..close].trim().to_string();
            (name, (!units.is_empty()).then_some(units))
        }
        _ => (header.to_string(), None),
    }
}

// ---------------------------------------------------------------------------
// Parquet signal table
// ---------------------------------------------------------------------------

/// Load a Parquet file holding one signal per row.
///
/// Expected schema:
/// - `data`: List<Float64|Float32> or LargeList – flat row-major values
/// - `shape`: List<Int64|Int32> – array shape
/// - `axes`: Utf8 – JSON-encoded list of axis descriptors
/// - `title`, `signal_type`: Utf8, optional
fn load_parquet(path: &Path) -> Result<Decoded> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut signals = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let data_idx = schema
            .index_of("data")
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'data' column"))?;
        let shape_idx = schema
            .index_of("shape")
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'shape' column"))?;
        let axes_idx = schema
            .index_of("axes")
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'axes' column"))?;
        let title_idx = schema.index_of("title").ok();
        let type_idx = schema.index_of("signal_type").ok();

        for row in 0..batch.num_rows() {
            let values = extract_f64_list(batch.column(data_idx), row)
                .with_context(|| format!("Row {row}: failed to read 'data'"))?;
            let shape: Vec<usize> = extract_f64_list(batch.column(shape_idx), row)
                .with_context(|| format!("Row {row}: failed to read 'shape'"))?
                .into_iter()
                .map(|d| d as usize)
                .collect();
            let axes_json = extract_string(batch.column(axes_idx), row)
                .with_context(|| format!("Row {row}: missing 'axes'"))?;
            let axes: Vec<AxisDescriptor> = serde_json::from_str(&axes_json)
                .with_context(|| format!("Row {row}: invalid 'axes' JSON"))?;

            let mut signal = Signal::from_shape_vec(&shape, values, axes)
                .map_err(|e| anyhow::anyhow!("Row {row}: {e}"))?;
            signal.title = title_idx.and_then(|i| extract_string(batch.column(i), row));
            signal.signal_type = type_idx.and_then(|i| extract_string(batch.column(i), row));
            signals.push(signal);
        }
    }

    if signals.is_empty() {
        bail!("Parquet file holds no signals");
    }
    Ok(Decoded::Many(signals))
}

// -- Parquet / Arrow helpers --

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<ListArray>()
                .context("expected ListArray")?;
            list_arr.value(row)
        }
        DataType::LargeList(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<LargeListArray>()
                .context("expected LargeListArray")?;
            list_arr.value(row)
        }
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };

    let any = values_array.as_any();
    if let Some(arr) = any.downcast_ref::<Float64Array>() {
        Ok(arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(arr) = any.downcast_ref::<Float32Array>() {
        Ok(arr.iter().map(|v| v.unwrap_or(f32::NAN) as f64).collect())
    } else if let Some(arr) = any.downcast_ref::<Int64Array>() {
        Ok(arr.iter().map(|v| v.unwrap_or(0) as f64).collect())
    } else if let Some(arr) = any.downcast_ref::<Int32Array>() {
        Ok(arr.iter().map(|v| v.unwrap_or(0) as f64).collect())
    } else {
        bail!(
            "List inner type is {:?}, expected a numeric type",
            values_array.data_type()
        )
    }
}

/// Extract a Utf8 / LargeUtf8 cell; `None` for nulls and non-string columns.
fn extract_string(col: &Arc<dyn Array>, row: usize) -> Option<String> {
    if col.is_null(row) {
        return None;
    }
    match col.data_type() {
        DataType::Utf8 => col
            .as_any()
            .downcast_ref::<StringArray>()
            .map(|s| s.value(row).to_string()),
        DataType::LargeUtf8 => Some(col.as_string::<i64>().value(row).to_string()),
        _ => None,
    }
}
