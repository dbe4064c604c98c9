/// Data layer: signal types, calibration, decoding and loading.
///
/// Architecture:
/// ```text
///  .json / .csv / .parquet / vendor files
///        │
///        ▼
///   ┌──────────┐
///   │  reader   │  decode(path, hint) → Signal | [Signal]
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  ordered hints, first success wins → [Signal]
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  model    │  Signal, AxisDescriptor  ── axis: AxisModel
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  select   │  summaries, capabilities, title lookup
///   └──────────┘
/// ```

pub mod axis;
pub mod loader;
pub mod model;
pub mod reader;
pub mod select;
