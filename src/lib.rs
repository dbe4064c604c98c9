//! Signal cache and calibrated extraction engine for hyperspectral
//! microscopy data.
//!
//! ```text
//!  request ──► service ──► files (scope + path)
//!                 │
//!                 ▼
//!               cache ──miss──► data::loader ──► data::reader
//!                 │
//!                 ▼
//!        extract::{spectrum, image, peak} ──► protocol::Response
//! ```

pub mod cache;
pub mod config;
pub mod data;
pub mod error;
pub mod extract;
pub mod files;
pub mod lines;
pub mod protocol;
pub mod service;

pub use cache::{CacheOutcome, ScopeKey, SignalCache};
pub use config::EngineConfig;
pub use data::axis::AxisModel;
pub use data::loader::SignalLoader;
pub use data::model::{AxisDescriptor, Signal};
pub use error::{EngineError, ErrorPayload, Result};
pub use protocol::{Request, Response};
pub use service::SignalService;
