//! micro-agents - discrete-time agent-based stochastic simulation engine
//!
//! Each agent owns a set of named parameters whose values evolve tick
//! by tick under probabilistic update rules that may depend on other
//! parameters' current or freshly-updated values. A [`world::World`]
//! drives a fixed population of [`agent::MarkovAgent`]s, sampling a
//! subset per tick and firing lifecycle hooks around every sweep.

pub mod agent;
pub mod core;
pub mod world;
