use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::DisplayError;
use crate::models::SceneDescriptor;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum RotationStatus {
    #[default]
    Stopped,
    Running,
    Paused,
}

/// Which scene is up and whether the rotation is moving.
///
/// `generation` changes on every transition that invalidates an armed
/// timer (start, pause, resume, skip, a duration-changing reconfigure,
/// stop). A timer only applies its advance if the generation it was armed
/// with is still current.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RotationState {
    pub status: RotationStatus,
    pub active_index: usize,
    pub sequence: Vec<SceneDescriptor>,
    #[serde(skip)]
    pub generation: u64,
}

impl RotationState {
    pub fn new(sequence: Vec<SceneDescriptor>) -> Self {
        Self {
            sequence,
            ..Self::default()
        }
    }

    pub fn active_scene(&self) -> Option<&SceneDescriptor> {
        if self.sequence.is_empty() {
            return None;
        }
        self.sequence.get(self.active_index % self.sequence.len())
    }

    pub fn require_active_scene(&self) -> Result<&SceneDescriptor, DisplayError> {
        self.active_scene().ok_or(DisplayError::ConfigurationEmpty)
    }

    /// Active scene id, or an empty string when there is nothing to show.
    pub fn current_scene_id(&self) -> String {
        self.active_scene()
            .map(|scene| scene.id.clone())
            .unwrap_or_default()
    }

    pub fn active_duration(&self) -> Option<Duration> {
        self.active_scene()
            .map(|scene| Duration::from_millis(scene.duration_ms))
    }

    /// Moves to the next scene, wrapping. A single-scene rotation stays put.
    pub fn advance(&mut self) {
        let len = self.sequence.len();
        if len == 0 {
            self.active_index = 0;
            return;
        }
        self.active_index = (self.active_index % len + 1) % len;
    }

    /// Replaces the rotation. The active scene keeps its place if it
    /// survives the swap, otherwise the rotation restarts from the top.
    ///
    /// Returns true when the armed timer no longer matches the active
    /// scene's duration and has to be replaced.
    pub fn configure(&mut self, sequence: Vec<SceneDescriptor>) -> bool {
        let previous = self.active_scene().cloned();

        self.active_index = previous
            .as_ref()
            .and_then(|prev| sequence.iter().position(|scene| scene.id == prev.id))
            .unwrap_or(0);
        self.sequence = sequence;

        let timer_stale = match (previous.as_ref(), self.active_scene()) {
            (Some(prev), Some(next)) => prev.duration_ms != next.duration_ms,
            (None, None) => false,
            _ => true,
        };
        if timer_stale {
            self.bump_generation();
        }
        timer_stale
    }

    /// Stopped -> Running. Returns false if the rotation was already started.
    pub fn start(&mut self) -> bool {
        if self.status != RotationStatus::Stopped {
            return false;
        }
        self.status = RotationStatus::Running;
        self.bump_generation();
        true
    }

    /// Running -> Paused. Idempotent.
    pub fn pause(&mut self) -> bool {
        if self.status != RotationStatus::Running {
            return false;
        }
        self.status = RotationStatus::Paused;
        self.bump_generation();
        true
    }

    /// Paused -> Running with a fresh dwell for the current scene.
    pub fn resume(&mut self) -> bool {
        if self.status != RotationStatus::Paused {
            return false;
        }
        self.status = RotationStatus::Running;
        self.bump_generation();
        true
    }

    /// Advances regardless of pause state.
    pub fn skip(&mut self) {
        self.advance();
        self.bump_generation();
    }

    pub fn stop(&mut self) {
        self.status = RotationStatus::Stopped;
        self.bump_generation();
    }

    /// Applies a timer fire armed at `generation`.
    pub fn fire(&mut self, generation: u64) -> Result<(), DisplayError> {
        if generation != self.generation || self.status != RotationStatus::Running {
            return Err(DisplayError::ShutdownRace);
        }
        self.advance();
        Ok(())
    }

    fn bump_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}
