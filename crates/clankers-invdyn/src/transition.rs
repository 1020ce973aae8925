//! Timed blending of contacts and tasks entering or leaving the problem.
//!
//! A window linearly interpolates a contact's max normal force, or scales a
//! task's weight, over `[time_start, time_end]`:
//!
//! ```text
//! Entering (t < start) ──► Blending (start <= t <= end) ──► Complete (t > end)
//! ```
//!
//! Windows are advanced purely from the cycle time. Interpolated values are
//! recomputed from scratch every cycle, never accumulated.

use tracing::debug;

use crate::error::FormulationError;
use crate::registry::Registry;

/// Direction of a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionKind {
    /// Entity fades in and ends in its steady state.
    Activation,
    /// Entity fades out and is evicted once the window elapses.
    Removal,
}

/// Kind of entity a window blends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionTarget {
    /// Blends the contact's max normal force.
    Contact,
    /// Blends the task's weight.
    Task,
}

/// Where a window stands at a given time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionPhase {
    Entering,
    Blending,
    Complete,
}

/// One active transition.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionWindow {
    /// Registry name of the blended entity.
    pub entity: String,
    pub target: TransitionTarget,
    pub kind: TransitionKind,
    pub time_start: f64,
    pub time_end: f64,
    /// Max normal force at `time_start` (contacts only).
    pub f_max_start: f64,
    /// Max normal force at `time_end` (contacts only).
    pub f_max_end: f64,
}

impl TransitionWindow {
    /// Create a window; fails unless `time_start < time_end` and both are finite.
    pub fn new(
        entity: impl Into<String>,
        target: TransitionTarget,
        kind: TransitionKind,
        time_start: f64,
        time_end: f64,
    ) -> Result<Self, FormulationError> {
        if !(time_start.is_finite() && time_end.is_finite() && time_start < time_end) {
            return Err(FormulationError::InvalidDuration(time_end - time_start));
        }
        Ok(Self {
            entity: entity.into(),
            target,
            kind,
            time_start,
            time_end,
            f_max_start: 0.0,
            f_max_end: 0.0,
        })
    }

    #[must_use]
    pub const fn with_force_ramp(mut self, f_max_start: f64, f_max_end: f64) -> Self {
        self.f_max_start = f_max_start;
        self.f_max_end = f_max_end;
        self
    }

    /// Normalized progress in `[0, 1]`.
    pub fn progress(&self, time: f64) -> f64 {
        ((time - self.time_start) / (self.time_end - self.time_start)).clamp(0.0, 1.0)
    }

    pub fn phase(&self, time: f64) -> TransitionPhase {
        if time < self.time_start {
            TransitionPhase::Entering
        } else if time <= self.time_end {
            TransitionPhase::Blending
        } else {
            TransitionPhase::Complete
        }
    }

    /// Interpolated max normal force.
    pub fn f_max_at(&self, time: f64) -> f64 {
        let alpha = self.progress(time);
        self.f_max_start + alpha * (self.f_max_end - self.f_max_start)
    }

    /// Factor applied to a task's registered weight.
    pub fn weight_scale(&self, time: f64) -> f64 {
        match self.kind {
            TransitionKind::Activation => self.progress(time),
            TransitionKind::Removal => 1.0 - self.progress(time),
        }
    }
}

/// Independent transition windows, at most one per entity.
#[derive(Clone, Debug, Default)]
pub struct TransitionScheduler {
    windows: Vec<TransitionWindow>,
}

impl TransitionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a window, replacing any pending window for the same entity.
    pub fn schedule(&mut self, window: TransitionWindow) -> Option<TransitionWindow> {
        let previous = self.cancel(&window.entity);
        self.windows.push(window);
        previous
    }

    /// Drop the window for `entity`, if any.
    pub fn cancel(&mut self, entity: &str) -> Option<TransitionWindow> {
        let idx = self.windows.iter().position(|w| w.entity == entity)?;
        Some(self.windows.remove(idx))
    }

    pub fn get(&self, entity: &str) -> Option<&TransitionWindow> {
        self.windows.iter().find(|w| w.entity == entity)
    }

    pub fn is_transitioning(&self, entity: &str) -> bool {
        self.get(entity).is_some()
    }

    pub fn windows(&self) -> &[TransitionWindow] {
        &self.windows
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Weight factor for `entity` at `time` (1 when not transitioning).
    pub fn weight_scale(&self, entity: &str, time: f64) -> f64 {
        self.get(entity).map_or(1.0, |w| w.weight_scale(time))
    }

    /// Advance every window to `time`.
    ///
    /// Applies interpolated force bounds to contacts in `registry`, restores
    /// steady bounds for completed activations, and returns the completed
    /// windows. Completed removals must be evicted by the caller.
    pub fn advance(&mut self, time: f64, registry: &mut Registry) -> Vec<TransitionWindow> {
        let mut completed = Vec::new();
        let mut i = 0;
        while i < self.windows.len() {
            let window = &mut self.windows[i];
            let phase = window.phase(time);

            if window.target == TransitionTarget::Contact {
                let Ok(entry) = registry.contact_mut(&window.entity) else {
                    debug!(entity = %window.entity, "dropping transition for unregistered contact");
                    self.windows.remove(i);
                    continue;
                };
                if window.kind == TransitionKind::Activation {
                    // Follow edits of the steady bound made during the blend.
                    window.f_max_end = entry.contact.max_normal_force();
                }
                match (phase, window.kind) {
                    (TransitionPhase::Complete, TransitionKind::Activation) => {
                        entry.contact.restore_steady_bounds();
                    }
                    (TransitionPhase::Complete, TransitionKind::Removal) => {}
                    _ => entry.contact.set_current_max_normal_force(window.f_max_at(time)),
                }
            } else if registry.task(&window.entity).is_err() {
                debug!(entity = %window.entity, "dropping transition for unregistered task");
                self.windows.remove(i);
                continue;
            }

            if phase == TransitionPhase::Complete {
                let window = self.windows.remove(i);
                debug!(entity = %window.entity, kind = ?window.kind, time, "transition complete");
                completed.push(window);
            } else {
                i += 1;
            }
        }
        completed
    }
}
