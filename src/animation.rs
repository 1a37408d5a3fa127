//! # Reveal Animation
//!
//! Progressive reveal of an ordered activity list: each tick shows the next
//! slice of records until everything is on the map.
//!
//! ## State machine
//!
//! | From | Call | To |
//! |------|------|----|
//! | any | [`AnimationSequencer::start`] (non-empty) | `Running` |
//! | any | [`AnimationSequencer::start`] (empty) | `Complete` |
//! | `Running` | [`AnimationSequencer::tick`] (last slice) | `Complete` |
//! | any | [`AnimationSequencer::reset`] / [`AnimationSequencer::locate`] | `Idle` |
//!
//! The sequencer does not own a timer. `start` and every non-final `tick`
//! hand back a [`TickToken`]; the host waits `delay_ms` and passes the token
//! back. Every state change, including each accepted tick, bumps the
//! generation, so a token from a cancelled run or a duplicate delivery is
//! recognized as stale and ignored.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{ActivityMapError, Result};
use crate::geometry::build_geometry;
use crate::{ActivityRecord, GeometryCollection};

/// Configuration for the reveal animation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct AnimationConfig {
    /// Delay between ticks in milliseconds (default: 300)
    pub tick_interval_ms: u64,
    /// Number of slices a large list is revealed in (default: 8).
    /// Lists shorter than this reveal one record per tick.
    pub max_reveal_steps: u32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 300,
            max_reveal_steps: 8,
        }
    }
}

impl AnimationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_reveal_steps == 0 {
            return Err(ActivityMapError::InvalidConfig(
                "max_reveal_steps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum AnimationPhase {
    Idle,
    Running,
    Complete,
}

/// Handle for the next scheduled tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct TickToken {
    /// Sequencer generation this token belongs to
    pub generation: u64,
    /// How long the host should wait before delivering it
    pub delay_ms: u64,
}

/// What the renderer should show after a sequencer transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Snapshot {
    /// Geometry of the revealed prefix
    pub geometry: GeometryCollection,
    /// Records revealed so far
    pub revealed_count: u32,
    /// Records in the animation
    pub total: u32,
    /// Records revealed by this transition
    pub delta: u32,
    pub phase: AnimationPhase,
    /// Present while `Running`
    pub next_tick: Option<TickToken>,
}

/// Current animation data, for inspection.
#[derive(Debug, Clone, Default)]
pub struct AnimationState {
    /// Ordered records being revealed
    pub records: Vec<ActivityRecord>,
    pub revealed_count: usize,
    /// Records added per tick
    pub slice: usize,
    pub generation: u64,
}

/// Records revealed per tick: `ceil(count / max_steps)` once the list has at
/// least `max_steps` records, otherwise one.
///
/// ```
/// use activity_map::slice_size;
/// assert_eq!(slice_size(20, 8), 3);
/// assert_eq!(slice_size(5, 8), 1);
/// ```
pub fn slice_size(count: usize, max_steps: usize) -> usize {
    let max_steps = max_steps.max(1);
    if count >= max_steps {
        count.div_ceil(max_steps)
    } else {
        1
    }
}

/// Tick-driven state machine for the reveal animation.
#[derive(Debug, Clone)]
pub struct AnimationSequencer {
    config: AnimationConfig,
    phase: AnimationPhase,
    state: AnimationState,
}

impl AnimationSequencer {
    pub fn new(config: AnimationConfig) -> Self {
        Self {
            config,
            phase: AnimationPhase::Idle,
            state: AnimationState::default(),
        }
    }

    pub fn phase(&self) -> AnimationPhase {
        self.phase
    }

    pub fn state(&self) -> &AnimationState {
        &self.state
    }

    /// Token for the next tick of the current run, if one is running.
    ///
    /// Same token as the last transition handed out; tokens are single use,
    /// so a host holding both copies still advances only once.
    pub fn pending_tick(&self) -> Option<TickToken> {
        (self.phase == AnimationPhase::Running).then_some(TickToken {
            generation: self.state.generation,
            delay_ms: self.config.tick_interval_ms,
        })
    }

    /// Begin revealing `ordered`, cancelling any animation in progress.
    ///
    /// The first snapshot has nothing revealed yet. An empty list completes
    /// immediately with no further ticks.
    pub fn start(&mut self, ordered: Vec<ActivityRecord>) -> Snapshot {
        self.state.generation += 1;
        self.state.slice = slice_size(ordered.len(), self.config.max_reveal_steps as usize);
        self.state.revealed_count = 0;
        self.state.records = ordered;

        if self.state.records.is_empty() {
            self.phase = AnimationPhase::Complete;
            debug!("[ActivityMap] Animation started with nothing to reveal");
            return self.snapshot(GeometryCollection::default(), 0);
        }

        self.phase = AnimationPhase::Running;
        debug!(
            "[ActivityMap] Animation started: {} records, {} per tick",
            self.state.records.len(),
            self.state.slice
        );
        self.snapshot(GeometryCollection::default(), 0)
    }

    /// Advance one slice. Returns `None` for a stale token or when nothing
    /// is running.
    pub fn tick(&mut self, token: TickToken) -> Option<Snapshot> {
        if self.phase != AnimationPhase::Running || token.generation != self.state.generation {
            debug!(
                "[ActivityMap] Ignoring stale tick (token gen {}, current gen {})",
                token.generation, self.state.generation
            );
            return None;
        }

        // Spend the token
        self.state.generation += 1;

        let total = self.state.records.len();
        let before = self.state.revealed_count;
        let after = (before + self.state.slice).min(total);
        self.state.revealed_count = after;

        let geometry = build_geometry(&self.state.records[..after]);
        if after >= total {
            self.phase = AnimationPhase::Complete;
            info!(
                "[ActivityMap] Animation complete: {} records, {} paths",
                total,
                geometry.len()
            );
        } else {
            debug!("[ActivityMap] Revealed {}/{}", after, total);
        }

        Some(self.snapshot(geometry, after - before))
    }

    /// Stop any animation and return to `Idle`.
    pub fn reset(&mut self) {
        self.state.generation += 1;
        self.state.revealed_count = 0;
        self.state.records.clear();
        self.phase = AnimationPhase::Idle;
    }

    /// Stop any animation and return the full geometry of `selection` at once.
    pub fn locate(&mut self, selection: &[ActivityRecord]) -> GeometryCollection {
        self.reset();
        build_geometry(selection)
    }

    fn snapshot(&self, geometry: GeometryCollection, delta: usize) -> Snapshot {
        let next_tick = self.pending_tick();
        Snapshot {
            geometry,
            revealed_count: self.state.revealed_count as u32,
            total: self.state.records.len() as u32,
            delta: delta as u32,
            phase: self.phase,
            next_tick,
        }
    }
}

impl Default for AnimationSequencer {
    fn default() -> Self {
        Self::new(AnimationConfig::default())
    }
}
