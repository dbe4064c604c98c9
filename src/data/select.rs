use std::sync::Arc;

use serde::Serialize;

use super::model::{Capabilities, Signal};

// ---------------------------------------------------------------------------
// Signal summaries and title-based selection
// ---------------------------------------------------------------------------

/// What a client needs to choose a signal from a file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalSummary {
    pub index: usize,
    pub title: String,
    pub signal_type: Option<String>,
    pub shape: Vec<usize>,
    pub capabilities: Capabilities,
}

pub fn summarize(signals: &[Arc<Signal>]) -> Vec<SignalSummary> {
    signals
        .iter()
        .enumerate()
        .map(|(index, sig)| SignalSummary {
            index,
            title: sig.display_title(index),
            signal_type: sig.signal_type.clone(),
            shape: sig.shape().to_vec(),
            capabilities: sig.capabilities(),
        })
        .collect()
}

/// Index of the first signal whose display title contains `needle`,
/// ignoring case.
pub fn find_by_title(signals: &[Arc<Signal>], needle: &str) -> Option<usize> {
    let needle = needle.to_uppercase();
    signals
        .iter()
        .enumerate()
        .find(|(i, sig)| sig.display_title(*i).to_uppercase().contains(&needle))
        .map(|(i, _)| i)
}
