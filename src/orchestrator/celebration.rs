use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::DisplayError;
use crate::models::MilestoneEvent;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CelebrationEffect {
    Confetti,
    Spotlight,
    SatsRain,
}

impl CelebrationEffect {
    pub const ALL: [CelebrationEffect; 3] = [
        CelebrationEffect::Confetti,
        CelebrationEffect::Spotlight,
        CelebrationEffect::SatsRain,
    ];

    pub fn random() -> Self {
        *Self::ALL
            .choose(&mut rand::thread_rng())
            .unwrap_or(&CelebrationEffect::Confetti)
    }
}

/// The milestone overlay currently on screen.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Celebration {
    pub event: MilestoneEvent,
    pub effect: CelebrationEffect,
    pub shown_at: DateTime<Utc>,
    pub dwell_ms: u64,
}

/// Last-event-wins overlay slot. Every show or dismiss moves `generation`
/// so a dwell timer armed for an earlier overlay cannot clear a newer one.
#[derive(Debug, Default)]
pub struct CelebrationState {
    pub active: Option<Celebration>,
    pub generation: u64,
}

impl CelebrationState {
    /// Replaces whatever is showing. Returns the generation to arm the
    /// dwell timer with.
    pub fn show(&mut self, celebration: Celebration) -> u64 {
        self.active = Some(celebration);
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }

    /// Dwell expiry for the overlay shown at `generation`.
    pub fn expire(&mut self, generation: u64) -> Result<Option<Celebration>, DisplayError> {
        if generation != self.generation {
            return Err(DisplayError::ShutdownRace);
        }
        Ok(self.active.take())
    }

    pub fn dismiss(&mut self) -> Option<Celebration> {
        self.generation = self.generation.wrapping_add(1);
        self.active.take()
    }
}
