//! MarkovAgent - dependency-ordered stochastic parameter resolution
//!
//! An agent owns a declaration-ordered set of named parameters. Each
//! round of `step()` resolves every parameter exactly once: before a
//! parameter's change rule runs, its dependencies are resolved
//! recursively, so values flow through the implicit dependency graph in
//! topological order without the graph ever being built explicitly.
//!
//! A per-round memo array keeps the work linear in the number of
//! parameters: a parameter referenced by several dependents is still
//! evaluated at most once per round.
//!
//! Cyclic `depends_on` relationships are rejected when the agent is
//! built, so the resolver's recursion depth is bounded by the parameter
//! count.

pub mod parameter;

pub use parameter::{ChangeRule, Parameter, ParameterBuilder};

use std::cmp::Ordering;

use ahash::AHashMap;
use rand::Rng;

use crate::core::error::{Result, SimError};
use crate::core::types::Value;

/// An autonomous entity whose parameters update stochastically in
/// dependency order.
///
/// Parameters are addressed by stable index internally; the name map
/// exists for dependency lookup and the public accessors.
pub struct MarkovAgent {
    names: Vec<String>,
    params: Vec<Parameter>,
    index: AHashMap<String, usize>,
    /// Per-round memo: `resolved[i]` marks parameter `i` as settled for
    /// the current round
    resolved: Vec<bool>,
}

impl MarkovAgent {
    /// Start building an agent
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    /// Perform `rounds` independent update rounds.
    ///
    /// Each round clears the memo and resolves every parameter. The
    /// iteration order does not affect outcomes beyond the order in
    /// which randomness is consumed: dependencies are always resolved
    /// before their dependents.
    ///
    /// On error (missing dependency, invalid bounds) the current round
    /// is abandoned immediately; parameters resolved earlier in the
    /// round keep their updated values.
    pub fn step<R: Rng>(&mut self, rng: &mut R, rounds: u32) -> Result<()> {
        for _ in 0..rounds {
            self.resolved.iter_mut().for_each(|flag| *flag = false);
            for idx in 0..self.params.len() {
                self.resolve(idx, rng)?;
            }
        }
        Ok(())
    }

    /// Current value of the named parameter, if it exists.
    ///
    /// No resolution is triggered; this is a plain read.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.index.get(name).map(|&i| &self.params[i].value)
    }

    /// All current values, keyed by parameter name
    pub fn snapshot(&self) -> AHashMap<String, Value> {
        self.names
            .iter()
            .zip(self.params.iter())
            .map(|(name, param)| (name.clone(), param.value.clone()))
            .collect()
    }

    /// Parameter names in declaration order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The named parameter, if it exists
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.index.get(name).map(|&i| &self.params[i])
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Resolve one parameter for the current round, resolving its
    /// dependencies first.
    ///
    /// Base case: a parameter already settled this round, or one with
    /// no change rule, returns its current value unchanged and consumes
    /// no randomness.
    fn resolve<R: Rng>(&mut self, idx: usize, rng: &mut R) -> Result<Value> {
        if self.resolved[idx] || self.params[idx].change_rule.is_none() {
            return Ok(self.params[idx].value.clone());
        }

        // Argument list: own current value first, then each dependency's
        // resolved value in declared order.
        let dep_names = self.params[idx].depends_on.clone();
        let mut args = Vec::with_capacity(dep_names.len() + 1);
        args.push(self.params[idx].value.clone());
        for dep_name in &dep_names {
            let dep_idx = match self.index.get(dep_name) {
                Some(&i) => i,
                None => {
                    return Err(SimError::MissingDependency {
                        dependent: self.names[idx].clone(),
                        missing: dep_name.clone(),
                    })
                }
            };
            let dep_value = self.resolve(dep_idx, rng)?;
            args.push(dep_value);
        }

        // One draw per rule-bearing parameter per round, taken after the
        // dependencies are settled. gen_bool(0.0) never fires and
        // gen_bool(1.0) always fires.
        if rng.gen_bool(self.params[idx].probability) {
            let candidate = self.params[idx]
                .change_rule
                .as_ref()
                .map(|rule| rule(&args[0], &args[1..]));
            if let Some(candidate) = candidate {
                self.params[idx].value = candidate;
            }
        }

        self.clamp(idx)?;
        self.resolved[idx] = true;
        Ok(self.params[idx].value.clone())
    }

    /// Clamp the parameter's value into its declared bounds.
    ///
    /// Bounds of a different value kind than the current value are
    /// ignored (cross-variant comparisons are undefined).
    fn clamp(&mut self, idx: usize) -> Result<()> {
        let param = &mut self.params[idx];
        if let (Some(min), Some(max)) = (&param.min, &param.max) {
            if min.partial_cmp(max) == Some(Ordering::Greater) {
                return Err(SimError::InvalidBounds {
                    parameter: self.names[idx].clone(),
                    min: min.clone(),
                    max: max.clone(),
                });
            }
        }
        if let Some(min) = &param.min {
            if param.value.partial_cmp(min) == Some(Ordering::Less) {
                param.value = min.clone();
            }
        }
        if let Some(max) = &param.max {
            if param.value.partial_cmp(max) == Some(Ordering::Greater) {
                param.value = max.clone();
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for MarkovAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkovAgent")
            .field("parameters", &self.names)
            .finish()
    }
}

/// Builder for [`MarkovAgent`].
///
/// Declares parameters in order; `build()` validates probabilities and
/// rejects cyclic dependency graphs before the agent ever steps.
#[derive(Default)]
pub struct AgentBuilder {
    names: Vec<String>,
    params: Vec<Parameter>,
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a parameter, configuring it through the builder closure.
    ///
    /// Declaration order is the round iteration order and the snapshot
    /// order.
    pub fn parameter(
        mut self,
        name: impl Into<String>,
        configure: impl FnOnce(&mut ParameterBuilder),
    ) -> Self {
        self.names.push(name.into());
        self.params.push(Parameter::configure(configure));
        self
    }

    /// Validate and freeze the agent.
    ///
    /// Fails with `DuplicateParameter`, `InvalidProbability`, or
    /// `CyclicDependency`. References to parameters that do not exist
    /// are deliberately not checked here; they surface as
    /// `MissingDependency` on the first `step()`.
    pub fn build(self) -> Result<MarkovAgent> {
        let mut index = AHashMap::with_capacity(self.names.len());
        for (i, name) in self.names.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(SimError::DuplicateParameter {
                    parameter: name.clone(),
                });
            }
        }

        for (name, param) in self.names.iter().zip(self.params.iter()) {
            if !(0.0..=1.0).contains(&param.probability) {
                return Err(SimError::InvalidProbability {
                    parameter: name.clone(),
                    value: param.probability,
                });
            }
        }

        detect_cycles(&self.names, &self.params, &index)?;

        let count = self.params.len();
        Ok(MarkovAgent {
            names: self.names,
            params: self.params,
            index,
            resolved: vec![false; count],
        })
    }
}

/// Reject cyclic `depends_on` graphs with an iterative three-color DFS.
///
/// Edges to names that do not exist are skipped: missing dependencies
/// are a step-time error, not a build-time one.
fn detect_cycles(
    names: &[String],
    params: &[Parameter],
    index: &AHashMap<String, usize>,
) -> Result<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let mut marks = vec![Mark::Unvisited; params.len()];
    // (node, next outgoing edge to examine)
    let mut stack: Vec<(usize, usize)> = Vec::new();
    let mut path: Vec<usize> = Vec::new();

    for start in 0..params.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }
        marks[start] = Mark::InProgress;
        stack.push((start, 0));
        path.push(start);

        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            let edge = frame.1;
            let deps = &params[node].depends_on;

            if edge >= deps.len() {
                marks[node] = Mark::Done;
                stack.pop();
                path.pop();
                continue;
            }
            frame.1 += 1;

            let Some(&next) = index.get(&deps[edge]) else {
                continue;
            };
            match marks[next] {
                Mark::Unvisited => {
                    marks[next] = Mark::InProgress;
                    stack.push((next, 0));
                    path.push(next);
                }
                Mark::InProgress => {
                    let pos = path.iter().position(|&i| i == next).unwrap_or(0);
                    let mut cycle: Vec<&str> =
                        path[pos..].iter().map(|&i| names[i].as_str()).collect();
                    cycle.push(names[next].as_str());
                    return Err(SimError::CyclicDependency {
                        cycle: cycle.join(" -> "),
                    });
                }
                Mark::Done => {}
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::cell::Cell;
    use std::rc::Rc;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    fn number(agent: &MarkovAgent, name: &str) -> f64 {
        agent
            .get(name)
            .and_then(Value::as_number)
            .expect("numeric parameter")
    }

    #[test]
    fn test_parameter_without_rule_never_changes() {
        let mut agent = MarkovAgent::builder()
            .parameter("label", |p| {
                p.start_value("sim_0");
            })
            .build()
            .unwrap();

        agent.step(&mut rng(), 100).unwrap();
        assert_eq!(agent.get("label"), Some(&Value::Text("sim_0".into())));
    }

    #[test]
    fn test_shared_dependency_resolved_once_per_round() {
        // a and b both depend on c: c's rule must fire at most once per
        // round regardless of how many dependents reference it.
        let calls = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&calls);

        let mut agent = MarkovAgent::builder()
            .parameter("a", |p| {
                p.depends_on(["c"]).change_rule(|_, deps| deps[0].clone());
            })
            .parameter("b", |p| {
                p.depends_on(["c"]).change_rule(|_, deps| deps[0].clone());
            })
            .parameter("c", |p| {
                p.start_value(0.0).change_rule(move |value, _| {
                    counter.set(counter.get() + 1);
                    Value::Number(value.as_number().unwrap_or(0.0) + 1.0)
                });
            })
            .build()
            .unwrap();

        agent.step(&mut rng(), 1).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(number(&agent, "a"), 1.0);
        assert_eq!(number(&agent, "b"), 1.0);
        assert_eq!(number(&agent, "c"), 1.0);

        agent.step(&mut rng(), 4).unwrap();
        assert_eq!(calls.get(), 5);
    }

    #[test]
    fn test_dependency_resolved_before_dependent() {
        // "derived" is declared before its dependency, so the resolver
        // must recurse into "base" first and use the fresh value.
        let mut agent = MarkovAgent::builder()
            .parameter("derived", |p| {
                p.start_value(0.0)
                    .depends_on(["base"])
                    .change_rule(|_, deps| {
                        Value::Number(deps[0].as_number().unwrap_or(0.0) * 10.0)
                    });
            })
            .parameter("base", |p| {
                p.start_value(0.0).change_rule(|value, _| {
                    Value::Number(value.as_number().unwrap_or(0.0) + 1.0)
                });
            })
            .build()
            .unwrap();

        agent.step(&mut rng(), 1).unwrap();
        assert_eq!(number(&agent, "base"), 1.0);
        assert_eq!(number(&agent, "derived"), 10.0);
    }

    #[test]
    fn test_missing_dependency_fails_on_first_step() {
        let mut agent = MarkovAgent::builder()
            .parameter("distance", |p| {
                p.start_value(0.0)
                    .depends_on(["speed"])
                    .change_rule(|value, _| value.clone());
            })
            .build()
            .unwrap();

        let err = agent.step(&mut rng(), 1).unwrap_err();
        match err {
            SimError::MissingDependency { dependent, missing } => {
                assert_eq!(dependent, "distance");
                assert_eq!(missing, "speed");
            }
            other => panic!("expected MissingDependency, got {other:?}"),
        }
    }

    #[test]
    fn test_cycle_rejected_at_build() {
        let err = MarkovAgent::builder()
            .parameter("a", |p| {
                p.depends_on(["b"]).change_rule(|v, _| v.clone());
            })
            .parameter("b", |p| {
                p.depends_on(["a"]).change_rule(|v, _| v.clone());
            })
            .build()
            .unwrap_err();

        match err {
            SimError::CyclicDependency { cycle } => {
                assert!(cycle.contains('a') && cycle.contains('b'), "{cycle}");
            }
            other => panic!("expected CyclicDependency, got {other:?}"),
        }
    }

    #[test]
    fn test_self_dependency_rejected_at_build() {
        let err = MarkovAgent::builder()
            .parameter("a", |p| {
                p.depends_on(["a"]).change_rule(|v, _| v.clone());
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, SimError::CyclicDependency { .. }));
    }

    #[test]
    fn test_probability_zero_is_a_deterministic_noop() {
        let mut agent = MarkovAgent::builder()
            .parameter("frozen", |p| {
                p.start_value(5.0).probability(0.0).change_rule(|value, _| {
                    Value::Number(value.as_number().unwrap_or(0.0) + 1.0)
                });
            })
            .build()
            .unwrap();

        agent.step(&mut rng(), 500).unwrap();
        assert_eq!(number(&agent, "frozen"), 5.0);
    }

    #[test]
    fn test_probability_one_applies_rule_every_round() {
        let mut agent = MarkovAgent::builder()
            .parameter("counter", |p| {
                p.start_value(0.0).change_rule(|value, _| {
                    Value::Number(value.as_number().unwrap_or(0.0) + 1.0)
                });
            })
            .build()
            .unwrap();

        agent.step(&mut rng(), 10).unwrap();
        assert_eq!(number(&agent, "counter"), 10.0);
    }

    #[test]
    fn test_value_clamped_to_bounds() {
        let mut agent = MarkovAgent::builder()
            .parameter("speed", |p| {
                p.start_value(50.0).min(0.0).max(60.0).change_rule(|value, _| {
                    Value::Number(value.as_number().unwrap_or(0.0) + 100.0)
                });
            })
            .build()
            .unwrap();

        agent.step(&mut rng(), 1).unwrap();
        assert_eq!(number(&agent, "speed"), 60.0);
    }

    #[test]
    fn test_inverted_bounds_fail_the_step() {
        let mut agent = MarkovAgent::builder()
            .parameter("broken", |p| {
                p.start_value(5.0)
                    .min(10.0)
                    .max(1.0)
                    .change_rule(|v, _| v.clone());
            })
            .build()
            .unwrap();

        let err = agent.step(&mut rng(), 1).unwrap_err();
        assert!(matches!(err, SimError::InvalidBounds { .. }));
    }

    #[test]
    fn test_out_of_range_probability_rejected_at_build() {
        let err = MarkovAgent::builder()
            .parameter("p", |p| {
                p.probability(1.5).change_rule(|v, _| v.clone());
            })
            .build()
            .unwrap_err();
        match err {
            SimError::InvalidProbability { parameter, value } => {
                assert_eq!(parameter, "p");
                assert_eq!(value, 1.5);
            }
            other => panic!("expected InvalidProbability, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_parameter_rejected_at_build() {
        let err = MarkovAgent::builder()
            .parameter("speed", |p| {
                p.start_value(1.0);
            })
            .parameter("speed", |p| {
                p.start_value(2.0);
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, SimError::DuplicateParameter { .. }));
    }

    #[test]
    fn test_identical_seeds_give_identical_trajectories() {
        let build = || {
            MarkovAgent::builder()
                .parameter("noise", |p| {
                    p.start_value(0.0).probability(0.5).change_rule(|value, _| {
                        Value::Number(value.as_number().unwrap_or(0.0) + 1.0)
                    });
                })
                .build()
                .unwrap()
        };

        let mut first = build();
        let mut second = build();
        first.step(&mut ChaCha8Rng::seed_from_u64(99), 50).unwrap();
        second.step(&mut ChaCha8Rng::seed_from_u64(99), 50).unwrap();
        assert_eq!(first.snapshot(), second.snapshot());
    }

    #[test]
    fn test_snapshot_contains_all_parameters() {
        let agent = MarkovAgent::builder()
            .parameter("name", |p| {
                p.start_value("sim_1");
            })
            .parameter("ignition", |p| {
                p.start_value(true);
            })
            .parameter("speed", |p| {
                p.start_value(40.0);
            })
            .build()
            .unwrap();

        let snapshot = agent.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot["name"], Value::Text("sim_1".into()));
        assert_eq!(snapshot["ignition"], Value::Bool(true));
        assert_eq!(snapshot["speed"], Value::Number(40.0));
    }
}
