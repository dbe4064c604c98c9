use std::sync::Arc;

use arrow::array::{Float64Builder, Int64Builder, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde_json::json;

const HEIGHT: usize = 24;
const WIDTH: usize = 24;
const CHANNELS: usize = 1024;
const ENERGY_OFFSET: f64 = -0.2;
const ENERGY_SCALE: f64 = 0.01;

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Fraction of a centred round particle covering pixel (row, col).
fn particle_weight(row: usize, col: usize) -> f64 {
    let dy = row as f64 - HEIGHT as f64 / 2.0;
    let dx = col as f64 - WIDTH as f64 / 2.0;
    let r = (dx * dx + dy * dy).sqrt();
    (1.0 - r / 7.0).clamp(0.0, 1.0)
}

/// (energy keV, sigma keV, amplitude) of the matrix and particle lines.
const MATRIX_LINES: [(f64, f64, f64); 3] = [(0.277, 0.03, 6.0), (0.525, 0.035, 12.0), (1.740, 0.05, 20.0)];
const PARTICLE_LINES: [(f64, f64, f64); 3] = [(6.404, 0.07, 30.0), (7.058, 0.07, 5.0), (8.048, 0.08, 10.0)];

fn pixel_spectrum(row: usize, col: usize, rng: &mut SimpleRng) -> Vec<f64> {
    let w = particle_weight(row, col);
    (0..CHANNELS)
        .map(|k| {
            let e = ENERGY_OFFSET + ENERGY_SCALE * k as f64;
            let zero_peak = gaussian(e, 0.0, 0.04, 400.0);
            let matrix: f64 = MATRIX_LINES
                .iter()
                .map(|&(mu, sigma, amp)| gaussian(e, mu, sigma, amp * (1.0 - w)))
                .sum();
            let particle: f64 = PARTICLE_LINES
                .iter()
                .map(|&(mu, sigma, amp)| gaussian(e, mu, sigma, amp * w))
                .sum();
            let background = 2.0 * (-e.max(0.0) / 3.0).exp();
            (zero_peak + matrix + particle + background + rng.gauss(0.0, 0.5)).max(0.0)
        })
        .collect()
}

fn main() {
    let mut rng = SimpleRng::new(42);

    let mut cube = Vec::with_capacity(HEIGHT * WIDTH * CHANNELS);
    for row in 0..HEIGHT {
        for col in 0..WIDTH {
            cube.extend(pixel_spectrum(row, col, &mut rng));
        }
    }

    let haadf: Vec<f64> = (0..HEIGHT)
        .flat_map(|row| (0..WIDTH).map(move |col| (row, col)))
        .map(|(row, col)| 100.0 + 900.0 * particle_weight(row, col) + rng.gauss(0.0, 5.0))
        .collect();

    let spatial = |name: &str, size: usize| {
        json!({"name": name, "size": size, "offset": 0.0, "scale": 0.5, "units": "nm"})
    };
    let cube_axes = json!([
        spatial("y", HEIGHT),
        spatial("x", WIDTH),
        {"name": "Energy", "size": CHANNELS, "offset": ENERGY_OFFSET, "scale": ENERGY_SCALE, "units": "keV"}
    ]);
    let haadf_axes = json!([spatial("y", HEIGHT), spatial("x", WIDTH)]);

    std::fs::create_dir_all("sample_data").expect("Failed to create sample_data/");

    // JSON container
    let container = json!({
        "signals": [
            {
                "title": "EDS",
                "signal_type": "EDS_TEM",
                "axes": &cube_axes,
                "data": &cube,
                "metadata": {
                    "General": {"title": "EDS", "date": "2024-03-01"},
                    "Acquisition_instrument": {"TEM": {"beam_energy": 200.0, "Detector": {"EDS": {"live_time": 120.0}}}}
                }
            },
            {
                "title": "HAADF",
                "axes": &haadf_axes,
                "data": &haadf,
                "metadata": {"General": {"title": "HAADF", "date": "2024-03-01"}}
            }
        ]
    });
    let json_path = "sample_data/sample_cube.json";
    let file = std::fs::File::create(json_path).expect("Failed to create JSON file");
    serde_json::to_writer(file, &container).expect("Failed to write JSON");

    // Parquet table: one row per signal
    let rows: [(&str, Option<&str>, Vec<i64>, &Vec<f64>, String); 2] = [
        (
            "EDS",
            Some("EDS_TEM"),
            vec![HEIGHT as i64, WIDTH as i64, CHANNELS as i64],
            &cube,
            cube_axes.to_string(),
        ),
        (
            "HAADF",
            None,
            vec![HEIGHT as i64, WIDTH as i64],
            &haadf,
            haadf_axes.to_string(),
        ),
    ];

    let mut shape_builder = ListBuilder::new(Int64Builder::new());
    let mut data_builder = ListBuilder::new(Float64Builder::new());
    for (_, _, shape, data, _) in &rows {
        shape_builder.values().append_slice(shape);
        shape_builder.append(true);
        data_builder.values().append_slice(data);
        data_builder.append(true);
    }

    let titles = StringArray::from(rows.iter().map(|r| r.0).collect::<Vec<_>>());
    let types = StringArray::from(rows.iter().map(|r| r.1).collect::<Vec<_>>());
    let axes = StringArray::from(rows.iter().map(|r| r.4.as_str()).collect::<Vec<_>>());

    let schema = Arc::new(Schema::new(vec![
        Field::new("title", DataType::Utf8, false),
        Field::new("signal_type", DataType::Utf8, true),
        Field::new("shape", DataType::List(Arc::new(Field::new("item", DataType::Int64, true))), false),
        Field::new("data", DataType::List(Arc::new(Field::new("item", DataType::Float64, true))), false),
        Field::new("axes", DataType::Utf8, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(titles),
            Arc::new(types),
            Arc::new(shape_builder.finish()),
            Arc::new(data_builder.finish()),
            Arc::new(axes),
        ],
    )
    .expect("Failed to create RecordBatch");

    let parquet_path = "sample_data/sample_cube.parquet";
    let file = std::fs::File::create(parquet_path).expect("Failed to create output file");
    let mut writer = ArrowWriter::try_new(file, schema, None).expect("Failed to create writer");
    writer.write(&batch).expect("Failed to write batch");
    writer.close().expect("Failed to close writer");

    println!(
        "Wrote {HEIGHT}x{WIDTH}x{CHANNELS} EDS cube and HAADF image to {json_path} and {parquet_path}"
    );
}
