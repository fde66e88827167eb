//! Scenario-driven testing for waitstate-based BPMN processes.
//!
//! A test describes what should happen whenever a process instance waits
//! (a user task is completed, a message arrives, an external task fails with
//! a business error) as a [`Scenario`]. The [`ScenarioRunner`] then drives
//! the instance through all its waitstates against a [`ProcessEngine`],
//! fast-forwarding a virtual clock instead of sleeping, and reports what
//! happened in an [`OutcomeRecord`].
//!
//! [`memory::MemoryEngine`] is a small in-memory engine implementing
//! [`ProcessEngine`] for processes authored in YAML.

pub mod clock;
pub mod config;
pub mod delegate;
pub mod discovery;
pub mod duration;
pub mod engine;
pub mod error;
pub mod memory;
pub mod outcome;
pub mod runner;
pub mod scenario;
pub mod types;
pub mod waitstate;

pub use config::RunnerConfig;
pub use engine::ProcessEngine;
pub use error::{Result, ScenarioError};
pub use outcome::{OutcomeRecord, Phase};
pub use runner::{RunReport, ScenarioRunner};
pub use scenario::Scenario;
pub use types::{variables, Variables};
pub use waitstate::{Waitstate, WaitstateKind};
