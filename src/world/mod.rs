//! World - population container and tick driver
//!
//! A world owns a fixed population of agents, built once at
//! construction from an index factory. Each `tick()` offers every
//! agent an update opportunity, gated by the sampling fraction, and
//! fires the lifecycle hooks around the sweep.
//!
//! All mutation happens synchronously inside a single `tick()` call;
//! there is no concurrency at this layer.

pub mod runner;

pub use runner::StopHandle;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::agent::MarkovAgent;
use crate::core::config::WorldConfig;
use crate::core::error::{Result, SimError};
use crate::core::types::Tick;

type Hook = Box<dyn FnMut()>;
type AgentHook = Box<dyn FnMut(&MarkovAgent)>;

/// The population container and tick driver
pub struct World {
    config: WorldConfig,
    agents: Vec<MarkovAgent>,
    current_tick: Tick,
    rng: ChaCha8Rng,
    begin_hook: Option<Hook>,
    step_hook: Option<AgentHook>,
    end_hook: Option<Hook>,
    stop: StopHandle,
}

impl World {
    /// Build a world from a validated config and an agent factory.
    ///
    /// The factory is invoked exactly `config.population` times, once
    /// per index in order. A factory error (for example a cyclic
    /// dependency in an agent definition) aborts construction.
    pub fn new(
        config: WorldConfig,
        mut factory: impl FnMut(usize) -> Result<MarkovAgent>,
    ) -> Result<Self> {
        config.validate().map_err(SimError::InvalidConfig)?;

        let mut agents = Vec::with_capacity(config.population);
        for index in 0..config.population {
            agents.push(factory(index)?);
        }

        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        tracing::debug!(
            population = agents.len(),
            sampling_fraction = config.sampling_fraction,
            seed = config.seed,
            "world created"
        );

        Ok(Self {
            config,
            agents,
            current_tick: 0,
            rng,
            begin_hook: None,
            step_hook: None,
            end_hook: None,
            stop: StopHandle::new(),
        })
    }

    /// Advance the simulation one tick.
    ///
    /// Fires the begin hook once, then sweeps the population in order:
    /// each agent is independently selected with probability equal to
    /// the sampling fraction, and a selected agent is stepped one round
    /// and passed to the step hook. Unselected agents are left
    /// completely untouched. The end hook fires once after the whole
    /// population has been considered.
    ///
    /// An agent resolution error aborts the sweep immediately: later
    /// agents are not stepped and the end hook does not fire.
    pub fn tick(&mut self) -> Result<()> {
        if let Some(hook) = &mut self.begin_hook {
            hook();
        }

        for i in 0..self.agents.len() {
            if !self.rng.gen_bool(self.config.sampling_fraction) {
                continue;
            }
            self.agents[i].step(&mut self.rng, 1)?;
            if let Some(hook) = &mut self.step_hook {
                hook(&self.agents[i]);
            }
        }

        if let Some(hook) = &mut self.end_hook {
            hook();
        }

        self.current_tick += 1;
        tracing::trace!(tick = self.current_tick, "tick complete");
        Ok(())
    }

    /// Hook fired once at the start of every tick
    pub fn set_begin_hook(&mut self, hook: impl FnMut() + 'static) {
        self.begin_hook = Some(Box::new(hook));
    }

    /// Hook fired after each sampled agent is stepped
    pub fn set_step_hook(&mut self, hook: impl FnMut(&MarkovAgent) + 'static) {
        self.step_hook = Some(Box::new(hook));
    }

    /// Hook fired once at the end of every completed tick
    pub fn set_end_hook(&mut self, hook: impl FnMut() + 'static) {
        self.end_hook = Some(Box::new(hook));
    }

    pub fn agents(&self) -> &[MarkovAgent] {
        &self.agents
    }

    pub fn agent(&self, index: usize) -> Option<&MarkovAgent> {
        self.agents.get(index)
    }

    pub fn population(&self) -> usize {
        self.agents.len()
    }

    pub fn current_tick(&self) -> Tick {
        self.current_tick
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("population", &self.agents.len())
            .field("current_tick", &self.current_tick)
            .field("sampling_fraction", &self.config.sampling_fraction)
            .finish()
    }
}
