use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};

use super::model::Signal;
use super::reader::{FormatHint, InterchangeReader, SignalReader};
use crate::error::{DecodeAttempt, EngineError, Result};

/// Anything that can turn a file path into signals. The cache depends on
/// this rather than on [`SignalLoader`] so tests can count invocations.
pub trait SignalSource: Send + Sync {
    fn load(&self, path: &Path) -> Result<Vec<Signal>>;
}

/// Default strategy order: auto-detect, then each known signal family.
pub const DEFAULT_HINTS: [FormatHint; 4] = [
    FormatHint::Auto,
    FormatHint::Emd,
    FormatHint::EdsTem,
    FormatHint::EdsSem,
];

/// Ordered-fallback loader over a [`SignalReader`].
///
/// Each hint is tried in order; the first successful decode wins. On total
/// failure every strategy's reason is kept in [`EngineError::Load`]. No
/// retries and no caching happen here.
#[derive(Clone)]
pub struct SignalLoader {
    reader: Arc<dyn SignalReader>,
    hints: Vec<FormatHint>,
}

impl Default for SignalLoader {
    fn default() -> Self {
        Self::new(Arc::new(InterchangeReader), DEFAULT_HINTS.to_vec())
    }
}

impl SignalLoader {
    pub fn new(reader: Arc<dyn SignalReader>, hints: Vec<FormatHint>) -> Self {
        Self { reader, hints }
    }

    pub fn hints(&self) -> &[FormatHint] {
        &self.hints
    }

    /// Decode `path`, normalizing a bare signal into a one-element list.
    pub fn load(&self, path: &Path) -> Result<Vec<Signal>> {
        let mut attempts = Vec::with_capacity(self.hints.len());

        for &hint in &self.hints {
            debug!("Loading {} with format hint {hint}", path.display());
            let start = Instant::now();

            match self.reader.decode(path, hint) {
                Ok(decoded) => {
                    let signals = decoded.into_signals();
                    info!(
                        "Loaded {} ({} signals, hint {hint}) in {:.2?}",
                        path.display(),
                        signals.len(),
                        start.elapsed()
                    );
                    return Ok(signals);
                }
                Err(err) => {
                    debug!("Format hint {hint} failed for {}: {err:#}", path.display());
                    attempts.push(DecodeAttempt {
                        hint: hint.to_string(),
                        reason: format!("{err:#}"),
                    });
                }
            }
        }

        warn!("No reader succeeded for {}", path.display());
        Err(EngineError::Load {
            path: path.to_path_buf(),
            attempts,
        })
    }
}

impl SignalSource for SignalLoader {
    fn load(&self, path: &Path) -> Result<Vec<Signal>> {
        SignalLoader::load(self, path)
    }
}
