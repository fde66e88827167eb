use crate::error::{Result, ScenarioError};
use crate::types::Instant;
use serde::Deserialize;

pub const DEFAULT_MAX_STEPS: usize = 10_000;

/// Environment variable overriding `max_steps`.
pub const MAX_STEPS_ENV: &str = "BPMN_SCENARIO_MAX_STEPS";

/// Knobs for one scenario run.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Upper bound on executions plus clock advances before the run is
    /// aborted with `StepLimitExceeded`.
    pub max_steps: usize,
    /// Move the virtual clock here before starting the process. Ignored if
    /// the clock is already later.
    pub start_time: Option<Instant>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            start_time: None,
        }
    }
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with `max_steps` taken from `BPMN_SCENARIO_MAX_STEPS` when set.
    /// Runners only see it when handed over through `with_config`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(MAX_STEPS_ENV) {
            config.max_steps = parse_max_steps(&raw)?;
        }
        Ok(config)
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_start_time(mut self, start_time: Instant) -> Self {
        self.start_time = Some(start_time);
        self
    }
}

fn parse_max_steps(raw: &str) -> Result<usize> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ScenarioError::Config(format!(
            "{MAX_STEPS_ENV} must be a positive integer, got '{raw}'"
        ))),
    }
}
