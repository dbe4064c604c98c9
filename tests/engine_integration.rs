//! End-to-end tests: interchange files on disk → service → responses.

use std::path::Path;
use std::sync::Arc;

use approx::assert_relative_eq;
use arrow::array::{Float64Builder, Int64Builder, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde_json::json;

use cubeview::cache::CacheOutcome;
use cubeview::config::CacheMode;
use cubeview::extract::Region;
use cubeview::{EngineConfig, EngineError, Request, Response, ScopeKey, SignalService};

const HEIGHT: usize = 3;
const WIDTH: usize = 4;
/// Per-pixel spectrum before the pixel weight is applied.
const BASE: [f64; 6] = [2.0, 10.0, 7.0, 5.0, 1.0, 0.0];

/// Pixel (row, col) carries `BASE * (1 + row * WIDTH + col)`.
fn weight(row: usize, col: usize) -> f64 {
    (1 + row * WIDTH + col) as f64
}

fn cube_values() -> Vec<f64> {
    let mut values = Vec::new();
    for row in 0..HEIGHT {
        for col in 0..WIDTH {
            values.extend(BASE.iter().map(|b| b * weight(row, col)));
        }
    }
    values
}

fn write_container(dir: &Path) {
    let container = json!({
        "signals": [
            {
                "title": "EDS",
                "signal_type": "EDS_TEM",
                "axes": [
                    {"name": "y", "size": HEIGHT, "units": "nm"},
                    {"name": "x", "size": WIDTH, "units": "nm"},
                    {"name": "Energy", "size": BASE.len(), "offset": -0.1, "scale": 0.1, "units": "keV"}
                ],
                "data": cube_values(),
                "metadata": {"General": {"date": "2024-03-01"}, "Detector": {"live_time": 60.5}}
            },
            {
                "title": "HAADF Image",
                "axes": [{"size": HEIGHT}, {"size": WIDTH}],
                "data": (0..HEIGHT * WIDTH).map(|v| v as f64).collect::<Vec<_>>()
            }
        ]
    });
    std::fs::write(dir.join("cube.json"), container.to_string()).unwrap();
}

fn write_parquet(dir: &Path) {
    let mut shape = ListBuilder::new(Int64Builder::new());
    shape.values().append_slice(&[4]);
    shape.append(true);
    let mut data = ListBuilder::new(Float64Builder::new());
    data.values().append_slice(&[1.0, 8.0, 3.0, 0.0]);
    data.append(true);

    let axes = json!([{"name": "Energy", "size": 4, "offset": -1.0, "scale": 0.5, "units": "keV"}]);

    let schema = Arc::new(Schema::new(vec![
        Field::new("title", DataType::Utf8, false),
        Field::new("shape", DataType::List(Arc::new(Field::new("item", DataType::Int64, true))), false),
        Field::new("data", DataType::List(Arc::new(Field::new("item", DataType::Float64, true))), false),
        Field::new("axes", DataType::Utf8, false),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(vec!["point"])),
            Arc::new(shape.finish()),
            Arc::new(data.finish()),
            Arc::new(StringArray::from(vec![axes.to_string()])),
        ],
    )
    .unwrap();

    let file = std::fs::File::create(dir.join("point.parquet")).unwrap();
    let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
}

fn setup(mode: CacheMode) -> (tempfile::TempDir, SignalService) {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    std::fs::create_dir_all(&data).unwrap();

    write_container(&data);
    write_parquet(&data);
    std::fs::write(
        data.join("line.csv"),
        "Energy (keV),Counts\n0.0,9\n0.5,4\n1.0,1\n",
    )
    .unwrap();
    std::fs::write(data.join("broken.emd"), "definitely not a signal").unwrap();
    std::fs::write(data.join("readme.txt"), "ignored").unwrap();

    let mut config = EngineConfig::default();
    config.files.data_dir = data;
    config.files.user_root = dir.path().join("users");
    config.cache.mode = mode;
    (dir, SignalService::from_config(config))
}

#[test]
fn test_list_files_and_signals() {
    let (_dir, svc) = setup(CacheMode::SingleUser);

    assert_eq!(
        svc.list_files(None).unwrap(),
        vec!["broken.emd", "cube.json", "line.csv", "point.parquet"]
    );

    let signals = svc.list_signals("cube.json", None).unwrap();
    assert_eq!(signals.len(), 2);
    assert_eq!(signals[0].title, "EDS");
    assert_eq!(signals[0].shape, vec![HEIGHT, WIDTH, BASE.len()]);
    assert!(signals[0].capabilities.has_spectrum && signals[0].capabilities.has_image);
    assert_eq!(signals[1].shape, vec![HEIGHT, WIDTH]);
    assert!(!signals[1].capabilities.has_spectrum);
}

#[test]
fn test_whole_spectrum_and_zero_peak() {
    let (_dir, svc) = setup(CacheMode::SingleUser);
    let total: f64 = (0..HEIGHT)
        .flat_map(|r| (0..WIDTH).map(move |c| weight(r, c)))
        .sum();

    let spectrum = svc.spectrum("cube.json", 0, None).unwrap();
    assert_eq!(spectrum.x.len(), spectrum.y.len());
    assert_relative_eq!(spectrum.x[1], 0.0, epsilon = 1e-12);
    assert_eq!(spectrum.x_label, "Energy");
    assert_eq!(spectrum.x_units, "keV");
    for (y, base) in spectrum.y.iter().zip(BASE) {
        assert_relative_eq!(*y, base * total);
    }
    // height 10*total, half 5*total: channel 3 sits exactly on it
    assert_eq!(spectrum.zero_index, Some(1));
    assert_eq!(spectrum.fwhm_index, Some(3));

    let metrics = svc.zero_peak_width("cube.json", 0, None).unwrap();
    assert_relative_eq!(metrics.width_in_units, 0.2, epsilon = 1e-12);
    assert_relative_eq!(metrics.half_height, 5.0 * total);
}

#[test]
fn test_region_spectrum() {
    let (_dir, svc) = setup(CacheMode::SingleUser);

    // pixels (row 0, col 1) and (row 0, col 2): weights 2 + 3
    let region = svc
        .region_spectrum("cube.json", 0, &Region::new(3, 1, 1, 0), None)
        .unwrap();
    let expected: Vec<f64> = BASE.iter().map(|b| b * 5.0).collect();
    assert_eq!(region.y, expected);
    assert_eq!(region.zero_index, None);

    let everything = svc
        .region_spectrum("cube.json", 0, &Region::new(-10, -10, 100, 100), None)
        .unwrap();
    assert_eq!(everything.y, svc.spectrum("cube.json", 0, None).unwrap().y);

    let empty = svc
        .region_spectrum("cube.json", 0, &Region::new(2, 0, 2, 3), None)
        .unwrap();
    assert_eq!(empty.y, vec![0.0; BASE.len()]);
}

#[test]
fn test_images() {
    let (_dir, svc) = setup(CacheMode::SingleUser);

    let cube_image = svc.image("cube.json", 0, None).unwrap();
    assert_eq!(cube_image.data_shape, vec![HEIGHT, WIDTH, BASE.len()]);
    assert_eq!(cube_image.image_shape, [HEIGHT, WIDTH]);
    assert_eq!(cube_image.image_data[0][0], 0.0);
    assert_eq!(cube_image.image_data[HEIGHT - 1][WIDTH - 1], 255.0);
    assert_relative_eq!(cube_image.data_range.min, 25.0);
    assert_relative_eq!(cube_image.data_range.max, 25.0 * 12.0);

    let haadf = svc.haadf_image("cube.json", None).unwrap().unwrap();
    assert_eq!(haadf.data_range.max, 11.0);
    assert!(svc.haadf_image("point.parquet", None).unwrap().is_none());

    // channels 1..=2 of pixel (0, 0): 10 + 7
    let summed = svc.energy_range_image("cube.json", 0, 1, 2, None).unwrap();
    assert_eq!(summed[0][0], 17.0);
    assert_eq!(
        svc.energy_range_image("cube.json", 0, 2, 6, None).unwrap_err().kind(),
        "out_of_range"
    );
}

#[test]
fn test_energy_window_and_axes() {
    let (_dir, svc) = setup(CacheMode::SingleUser);

    // 0.0 keV → channel 1, 0.2 keV → channel 3: channels 1 and 2
    let counts = svc.energy_window_sum("cube.json", 0, 0.0, 0.2, None).unwrap();
    assert_relative_eq!(counts, 17.0 * 78.0);
    assert_eq!(
        svc.energy_window_sum("cube.json", 0, 0.0, 5.0, None).unwrap_err().kind(),
        "out_of_range"
    );

    let axes = svc.axes("cube.json", 0, None).unwrap();
    assert_eq!(axes.size, BASE.len());
    assert_eq!(axes.zero_index, Some(1));
    assert_eq!(svc.axes("point.parquet", 0, None).unwrap_err().kind(), "shape_error");

    let metadata = svc.metadata("cube.json", 0, None).unwrap();
    assert_eq!(metadata["Detector.live_time"].as_f64(), Some(60.5));
}

#[test]
fn test_csv_and_parquet_sources() {
    let (_dir, svc) = setup(CacheMode::SingleUser);

    let line = svc.spectrum("line.csv", 0, None).unwrap();
    assert_eq!(line.y, vec![9.0, 4.0, 1.0]);
    assert_eq!(line.x, vec![0.0, 0.5, 1.0]);
    // 4 is already below half height 4.5 on the first channel after the peak
    assert_eq!(line.fwhm_index, Some(1));

    let point = svc.spectrum("point.parquet", 0, None).unwrap();
    assert_eq!(point.y, vec![1.0, 8.0, 3.0, 0.0]);
    assert_eq!(point.zero_index, Some(2));
    assert_eq!(point.fwhm_index, Some(3));
}

#[test]
fn test_single_user_cache_replaces_on_switch() {
    let (dir, svc) = setup(CacheMode::SingleUser);
    let data = dir.path().join("data");

    svc.list_signals("cube.json", None).unwrap();
    svc.spectrum("cube.json", 0, None).unwrap();
    svc.image("cube.json", 1, None).unwrap();
    let stats = svc.stats();
    assert_eq!((stats.hits, stats.misses, stats.loads), (2, 1, 1));

    svc.list_signals("line.csv", None).unwrap();
    assert_eq!(svc.cache().len(), 1);
    assert_eq!(
        svc.cache().cached_path(&ScopeKey::Global),
        Some(data.join("line.csv"))
    );
}

#[test]
fn test_load_failure_reports_every_strategy() {
    let (dir, svc) = setup(CacheMode::SingleUser);
    svc.list_signals("cube.json", None).unwrap();

    match svc.list_signals("broken.emd", None) {
        Err(EngineError::Load { attempts, .. }) => {
            let hints: Vec<&str> = attempts.iter().map(|a| a.hint.as_str()).collect();
            assert_eq!(hints, vec!["auto", "emd", "eds_tem", "eds_sem"]);
        }
        other => panic!("expected load error, got {other:?}"),
    }
    // the previous entry survives a failed load
    assert_eq!(
        svc.cache().cached_path(&ScopeKey::Global),
        Some(dir.path().join("data").join("cube.json"))
    );
}

#[test]
fn test_oversized_axes_become_load_error() {
    let (dir, svc) = setup(CacheMode::SingleUser);
    let axis = json!({"size": 1_099_511_627_776u64});
    let huge = json!({"axes": [axis, axis, axis], "data": [1, 2, 3]});
    std::fs::write(dir.path().join("data").join("huge.json"), huge.to_string()).unwrap();

    match svc.handle(Request::ListSignals {
        file: "huge.json".into(),
        user: None,
    }) {
        Response::Error(payload) => assert_eq!(payload.kind, "load_error"),
        other => panic!("expected an error response, got {other:?}"),
    }
}

#[test]
fn test_emission_line_picks_energy_window() {
    let (_dir, svc) = setup(CacheMode::SingleUser);

    let carbon = match svc.handle(Request::EmissionLines { atomic_number: 6 }) {
        Response::EmissionLines(lines) => lines,
        other => panic!("expected emission lines, got {other:?}"),
    };
    let ka = carbon.ka1_energy.unwrap();
    assert_relative_eq!(ka, 0.277);
    assert_eq!(carbon.la1_energy, None);

    // 0.227..0.327 keV maps to channel 3 alone
    let counts = svc
        .energy_window_sum("cube.json", 0, ka - 0.05, ka + 0.05, None)
        .unwrap();
    assert_relative_eq!(counts, BASE[3] * 78.0);

    let value = serde_json::to_value(svc.handle(Request::EmissionLines { atomic_number: 200 })).unwrap();
    assert_eq!(value["data"]["kind"], "out_of_range");
}

#[test]
fn test_multi_user_scopes() {
    let (dir, svc) = setup(CacheMode::MultiUser);
    let alice_dir = dir.path().join("users").join("alice");
    std::fs::create_dir_all(&alice_dir).unwrap();
    write_container(&alice_dir);

    assert_eq!(svc.list_files(Some("Alice")).unwrap(), vec!["cube.json"]);
    assert_eq!(
        svc.spectrum("line.csv", 0, Some("alice")).unwrap_err().kind(),
        "not_found"
    );

    svc.list_signals("cube.json", Some("alice")).unwrap();
    svc.list_signals("cube.json", None).unwrap();
    let lookup = svc
        .cache()
        .get_or_load(
            &ScopeKey::User("alice".into()),
            &alice_dir.join("cube.json"),
        )
        .unwrap();
    assert_eq!(lookup.outcome, CacheOutcome::Hit);
    assert_eq!(svc.stats().scopes, 2);

    assert_eq!(
        svc.handle(Request::EndSession {
            user: "alice".into()
        }),
        Response::SessionEnded(true)
    );
    assert_eq!(svc.stats().scopes, 1);
}

#[test]
fn test_json_requests_round_trip_through_handle() {
    let (_dir, svc) = setup(CacheMode::SingleUser);

    let request: Request = serde_json::from_str(
        r#"{"op": "energy_window_sum", "file": "cube.json", "start": 0.0, "end": 0.2}"#,
    )
    .unwrap();
    let value = serde_json::to_value(svc.handle(request)).unwrap();
    assert_eq!(value["type"], "counts");
    assert_relative_eq!(value["data"].as_f64().unwrap(), 17.0 * 78.0);

    let request: Request =
        serde_json::from_str(r#"{"op": "image", "file": "line.csv"}"#).unwrap();
    let value = serde_json::to_value(svc.handle(request)).unwrap();
    assert_eq!(value["type"], "error");
    assert_eq!(value["data"]["kind"], "shape_error");
}
