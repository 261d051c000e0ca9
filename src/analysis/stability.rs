//! Debounce for noisy per-frame OCR
//!
//! A (name, clan) pair has to repeat unchanged for `threshold` consecutive
//! plausible ticks before it is reported, and a pair is reported only once
//! while it stays the last resolved pair.

use crate::vision::{RecognizedField, RecognizedPair};

/// Plausibility/confidence gate and stabilization threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilityConfig {
    /// Minimum text length in characters
    pub min_text_len: usize,
    /// Minimum mean OCR confidence (0.0 - 100.0)
    pub min_confidence: f32,
    /// Consecutive identical readings needed to stabilize
    pub threshold: u32,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            min_text_len: 3,
            min_confidence: 35.0,
            threshold: 1,
        }
    }
}

/// A stabilized (name, clan) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StablePair {
    pub name: String,
    pub clan: String,
}

impl StablePair {
    pub fn new(name: impl Into<String>, clan: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clan: clan.into(),
        }
    }
}

/// Outcome of one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// A field failed the gate; candidate cleared
    Rejected,
    /// Candidate seen `count` times, below the threshold
    Accumulating { count: u32 },
    /// Candidate is stable but was already resolved
    Holding { count: u32 },
    /// Candidate just became stable and differs from the last resolved pair
    Stabilized(StablePair),
}

/// Snapshot of the tracker state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StabilityState {
    pub candidate: Option<StablePair>,
    pub counter: u32,
    pub last_resolved: Option<StablePair>,
}

/// Plausible text: long enough and containing an ASCII letter or digit
pub fn is_plausible(text: &str, min_len: usize) -> bool {
    !text.is_empty()
        && text.chars().count() >= min_len
        && text.chars().any(|c| c.is_ascii_alphanumeric())
}

/// Debounce state machine, owned by the scan worker
#[derive(Debug, Clone, Default)]
pub struct StabilityTracker {
    config: StabilityConfig,
    state: StabilityState,
}

impl StabilityTracker {
    pub fn new(config: StabilityConfig) -> Self {
        Self {
            config,
            state: StabilityState::default(),
        }
    }

    pub fn state(&self) -> &StabilityState {
        &self.state
    }

    /// Whether a single field passes the gate
    pub fn accepts(&self, field: &RecognizedField) -> bool {
        is_plausible(&field.text, self.config.min_text_len)
            && field.confidence >= self.config.min_confidence
    }

    /// Feed one tick's readings
    pub fn observe(&mut self, pair: &RecognizedPair) -> Observation {
        if !self.accepts(&pair.name) || !self.accepts(&pair.clan) {
            self.state.candidate = None;
            self.state.counter = 0;
            return Observation::Rejected;
        }

        let reading = StablePair::new(pair.name.text.as_str(), pair.clan.text.as_str());
        if self.state.candidate.as_ref() == Some(&reading) {
            self.state.counter = self.state.counter.saturating_add(1);
        } else {
            self.state.candidate = Some(reading.clone());
            self.state.counter = 1;
        }

        let count = self.state.counter;
        if count < self.config.threshold {
            return Observation::Accumulating { count };
        }
        if self.state.last_resolved.as_ref() == Some(&reading) {
            return Observation::Holding { count };
        }

        self.state.last_resolved = Some(reading.clone());
        Observation::Stabilized(reading)
    }
}
