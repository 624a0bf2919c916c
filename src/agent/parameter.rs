//! Parameter: a named, bounded, probabilistically-updated value holder
//!
//! A parameter is pure data plus construction-time defaulting. All
//! value changes after construction are performed by the agent's
//! resolver; reading a value has no side effects.

use std::fmt;

use crate::core::types::Value;

/// Computes a parameter's candidate new value.
///
/// Called with the parameter's current value and the resolved values of
/// its dependencies, in `depends_on` declaration order. The returned
/// value is expected (not enforced) to match the variant of the
/// parameter's start value.
pub type ChangeRule = Box<dyn Fn(&Value, &[Value]) -> Value>;

/// A single parameter of an agent.
///
/// Built once through [`ParameterBuilder`] and then mutated in place by
/// the owning agent on each step. The shape (probability, rule,
/// dependencies, bounds) is frozen at build time; only `value` changes.
pub struct Parameter {
    pub(crate) start_value: Value,
    pub(crate) value: Value,
    pub(crate) probability: f64,
    pub(crate) change_rule: Option<ChangeRule>,
    pub(crate) depends_on: Vec<String>,
    pub(crate) min: Option<Value>,
    pub(crate) max: Option<Value>,
}

impl Parameter {
    /// Start building a parameter
    pub fn builder() -> ParameterBuilder {
        ParameterBuilder::new()
    }

    /// Build a parameter by configuring a builder in a closure.
    ///
    /// ```
    /// use micro_agents::agent::Parameter;
    /// use micro_agents::core::Value;
    ///
    /// let speed = Parameter::configure(|p| {
    ///     p.start_value(50.0)
    ///         .probability(0.3)
    ///         .min(0.0)
    ///         .max(100.0)
    ///         .change_rule(|value, _deps| {
    ///             Value::Number(value.as_number().unwrap_or(0.0) + 1.0)
    ///         });
    /// });
    /// assert_eq!(speed.value(), &Value::Number(50.0));
    /// ```
    pub fn configure(f: impl FnOnce(&mut ParameterBuilder)) -> Parameter {
        let mut builder = ParameterBuilder::new();
        f(&mut builder);
        builder.build()
    }

    /// Current value (no resolution is triggered)
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Value the parameter was initialized with
    pub fn start_value(&self) -> &Value {
        &self.start_value
    }

    /// Per-round probability that the change rule fires
    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Names of the parameters this one depends on, in declared order
    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    pub fn min(&self) -> Option<&Value> {
        self.min.as_ref()
    }

    pub fn max(&self) -> Option<&Value> {
        self.max.as_ref()
    }

    pub fn has_change_rule(&self) -> bool {
        self.change_rule.is_some()
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("start_value", &self.start_value)
            .field("value", &self.value)
            .field("probability", &self.probability)
            .field("change_rule", &self.change_rule.is_some())
            .field("depends_on", &self.depends_on)
            .field("min", &self.min)
            .field("max", &self.max)
            .finish()
    }
}

/// Builder for [`Parameter`].
///
/// Defaults: probability 1.0, no dependencies, no change rule, no
/// bounds, start value `Number(0.0)`. `build()` finalizes the value to
/// the start value.
pub struct ParameterBuilder {
    start_value: Value,
    probability: f64,
    change_rule: Option<ChangeRule>,
    depends_on: Vec<String>,
    min: Option<Value>,
    max: Option<Value>,
}

impl ParameterBuilder {
    pub fn new() -> Self {
        Self {
            start_value: Value::Number(0.0),
            probability: 1.0,
            change_rule: None,
            depends_on: Vec::new(),
            min: None,
            max: None,
        }
    }

    /// Starting (and initial current) value
    pub fn start_value(&mut self, value: impl Into<Value>) -> &mut Self {
        self.start_value = value.into();
        self
    }

    /// Probability that the change rule fires on a given round.
    ///
    /// Must lie in [0, 1]; validated when the owning agent is built.
    pub fn probability(&mut self, probability: f64) -> &mut Self {
        self.probability = probability;
        self
    }

    /// Rule producing the candidate new value each round the
    /// probability gate fires
    pub fn change_rule(
        &mut self,
        rule: impl Fn(&Value, &[Value]) -> Value + 'static,
    ) -> &mut Self {
        self.change_rule = Some(Box::new(rule));
        self
    }

    /// Parameters whose resolved values are passed to the change rule,
    /// in this order
    pub fn depends_on<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = names.into_iter().map(Into::into).collect();
        self
    }

    /// Lower bound applied after each update
    pub fn min(&mut self, min: impl Into<Value>) -> &mut Self {
        self.min = Some(min.into());
        self
    }

    /// Upper bound applied after each update
    pub fn max(&mut self, max: impl Into<Value>) -> &mut Self {
        self.max = Some(max.into());
        self
    }

    /// Freeze the builder into a parameter, initializing the current
    /// value to the start value
    pub fn build(&mut self) -> Parameter {
        Parameter {
            start_value: self.start_value.clone(),
            value: self.start_value.clone(),
            probability: self.probability,
            change_rule: self.change_rule.take(),
            depends_on: std::mem::take(&mut self.depends_on),
            min: self.min.take(),
            max: self.max.take(),
        }
    }
}

impl Default for ParameterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let p = Parameter::configure(|_| {});
        assert_eq!(p.value(), &Value::Number(0.0));
        assert_eq!(p.probability(), 1.0);
        assert!(p.depends_on().is_empty());
        assert!(!p.has_change_rule());
        assert!(p.min().is_none());
        assert!(p.max().is_none());
    }

    #[test]
    fn test_value_initialized_from_start_value() {
        let p = Parameter::configure(|b| {
            b.start_value("sim_0");
        });
        assert_eq!(p.value(), &Value::Text("sim_0".into()));
        assert_eq!(p.start_value(), p.value());
    }

    #[test]
    fn test_configured_fields_are_kept() {
        let p = Parameter::configure(|b| {
            b.start_value(5.0)
                .probability(0.25)
                .depends_on(["speed", "time"])
                .min(0.0)
                .max(10.0)
                .change_rule(|value, _| value.clone());
        });
        assert_eq!(p.probability(), 0.25);
        assert_eq!(p.depends_on(), ["speed".to_string(), "time".to_string()]);
        assert_eq!(p.min(), Some(&Value::Number(0.0)));
        assert_eq!(p.max(), Some(&Value::Number(10.0)));
        assert!(p.has_change_rule());
    }
}
