//! Analysis Engine
//!
//! Debouncing of per-frame readings and deck analytics over a resolved
//! player's battle history.

pub mod decks;
pub mod profile;
pub mod stability;

pub use profile::DeckProfile;
pub use stability::{Observation, StabilityConfig, StabilityTracker};
