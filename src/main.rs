use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info};

use cubeview::error::ErrorPayload;
use cubeview::extract::Region;
use cubeview::{EngineConfig, Request, Response, SignalService};

#[derive(Parser, Debug)]
#[command(author, version, about = "Browse hyperspectral microscopy signals")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory for the single-user scope (overrides the config)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Run requests in this user's scope
    #[arg(short, long)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List supported files.
    Files,
    /// List the signals held by a file.
    Signals { file: String },
    /// Whole-frame spectrum with zero-peak markers.
    Spectrum {
        file: String,
        #[arg(short, long, default_value_t = 0)]
        signal: usize,
    },
    /// Spectrum summed over a rectangular region (pixel bounds).
    Region {
        file: String,
        #[arg(short, long, default_value_t = 0)]
        signal: usize,
        #[arg(allow_negative_numbers = true)]
        x1: i64,
        #[arg(allow_negative_numbers = true)]
        y1: i64,
        #[arg(allow_negative_numbers = true)]
        x2: i64,
        #[arg(allow_negative_numbers = true)]
        y2: i64,
    },
    /// Normalized image of a 2D or 3D signal.
    Image {
        file: String,
        #[arg(short, long, default_value_t = 0)]
        signal: usize,
    },
    /// The file's HAADF reference image, if any.
    Haadf { file: String },
    /// Image summed over channels `start..=end`.
    EnergyImage {
        file: String,
        #[arg(short, long, default_value_t = 0)]
        signal: usize,
        start: usize,
        end: usize,
    },
    /// Total counts inside an energy window.
    WindowSum {
        file: String,
        #[arg(short, long, default_value_t = 0)]
        signal: usize,
        #[arg(allow_negative_numbers = true)]
        start: f64,
        #[arg(allow_negative_numbers = true)]
        end: f64,
    },
    /// Flattened signal metadata.
    Metadata {
        file: String,
        #[arg(short, long, default_value_t = 0)]
        signal: usize,
    },
    /// Spectral axis calibration of a 3D signal.
    Axes {
        file: String,
        #[arg(short, long, default_value_t = 0)]
        signal: usize,
    },
    /// Zero-peak FWHM diagnostics.
    ZeroPeak {
        file: String,
        #[arg(short, long, default_value_t = 0)]
        signal: usize,
    },
    /// K, L and M line energies (keV) of an element.
    Lines { atomic_number: u32 },
    /// Answer JSON requests, one per line, on stdin.
    Serve,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = cli.data_dir.clone() {
        config.files.data_dir = dir;
    }
    debug!("Configuration: {config:?}");

    let service = SignalService::from_config(config);
    let user = cli.user.clone();

    let request = match cli.command {
        Command::Serve => return serve(&service),
        Command::Files => Request::ListFiles { user },
        Command::Signals { file } => Request::ListSignals { file, user },
        Command::Spectrum { file, signal } => Request::Spectrum { file, signal, user },
        Command::Region {
            file,
            signal,
            x1,
            y1,
            x2,
            y2,
        } => Request::RegionSpectrum {
            file,
            signal,
            region: Region::new(x1, y1, x2, y2),
            user,
        },
        Command::Image { file, signal } => Request::Image { file, signal, user },
        Command::Haadf { file } => Request::HaadfImage { file, user },
        Command::EnergyImage {
            file,
            signal,
            start,
            end,
        } => Request::EnergyRangeImage {
            file,
            signal,
            start,
            end,
            user,
        },
        Command::WindowSum {
            file,
            signal,
            start,
            end,
        } => Request::EnergyWindowSum {
            file,
            signal,
            start,
            end,
            user,
        },
        Command::Metadata { file, signal } => Request::Metadata { file, signal, user },
        Command::Axes { file, signal } => Request::Axes { file, signal, user },
        Command::ZeroPeak { file, signal } => Request::ZeroPeakWidth { file, signal, user },
        Command::Lines { atomic_number } => Request::EmissionLines { atomic_number },
    };

    let response = service.handle(request);
    let failed = matches!(response, Response::Error(_));
    println!("{}", serde_json::to_string_pretty(&response)?);

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// JSON-lines loop sharing one cache across requests.
fn serve(service: &SignalService) -> Result<()> {
    info!("Serving requests on stdin");
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line.context("reading request")?;
        if line.trim().is_empty() {
            continue;
        }
        service.expire_sessions();

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => service.handle(request),
            Err(err) => Response::Error(ErrorPayload {
                kind: "bad_request".to_string(),
                message: err.to_string(),
            }),
        };
        serde_json::to_writer(&mut stdout, &response)?;
        writeln!(stdout)?;
        stdout.flush()?;
    }
    Ok(())
}
