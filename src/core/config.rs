//! World configuration
//!
//! Collects the knobs that shape a simulation run in one place so a
//! world can be constructed from a single, validated value.

use std::time::Duration;

/// Configuration for a [`World`](crate::world::World)
#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Interval between ticks when the world is driven by the blocking
    /// run loop (`World::start`). Ignored by direct `tick()` calls.
    ///
    /// Must be non-zero for `start()`; the run loop cannot schedule a
    /// zero-period timer.
    pub tick_interval: Duration,

    /// Number of agents in the population.
    ///
    /// Fixed at construction: the agent factory is invoked exactly this
    /// many times, once per index, and the population never grows or
    /// shrinks afterwards.
    pub population: usize,

    /// Per-tick, per-agent probability of being stepped at all.
    ///
    /// At 1.0 every agent updates every tick; at 0.25 each agent has an
    /// independent 25% chance per tick. Must lie in [0, 1].
    pub sampling_fraction: f64,

    /// Seed for the world's random source.
    ///
    /// The same seed, population, and rule set reproduce the same
    /// trajectory exactly.
    pub seed: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            population: 1,
            sampling_fraction: 1.0,
            seed: 12345,
        }
    }
}

impl WorldConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.sampling_fraction) {
            return Err(format!(
                "sampling_fraction ({}) must be within [0, 1]",
                self.sampling_fraction
            ));
        }

        Ok(())
    }
}
