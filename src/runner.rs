//! Scenario runner
//!
//! The drive loop. Each iteration discovers every waitstate of the root
//! instance and of all called instances entered so far, then does exactly
//! one of:
//!
//! 1. execute the most urgent waitstate that is due and has an action,
//! 2. fail on an unmocked waitstate when nothing else can move,
//! 3. advance the virtual clock to the nearest pending deadline,
//! 4. stop, because nothing is blocked any more.
//!
//! A run where nothing is pending but some instance is still blocked at an
//! already executed waitstate fails with `StalledWaitstate`.
//!
//! Every iteration either executes something, strictly advances the clock,
//! or ends the run. `RunnerConfig::max_steps` bounds engines that keep
//! producing work forever.
//!
//! Among several due waitstates the earliest deadline wins; on equal
//! deadlines timers go first (the timer "fired" at that instant), and after
//! that discovery order decides: scopes in the order they were entered, rows
//! in history order.

use crate::clock::VirtualClock;
use crate::config::RunnerConfig;
use crate::discovery::discover;
use crate::engine::ProcessEngine;
use crate::error::{Result, ScenarioError};
use crate::outcome::OutcomeRecord;
use crate::scenario::Scenario;
use crate::types::{Instant, Variables};
use crate::waitstate::{Executed, Waitstate};
use std::sync::Arc;
use tracing::{debug, info};

// ─── Scope stack ──────────────────────────────────────────────

/// A process instance driven under one scenario.
#[derive(Debug)]
struct Frame<'s> {
    scenario: &'s Scenario,
    process_instance_id: String,
}

/// Scenario scopes entered so far: the root, then one frame per call
/// activity entered. Frames leave once their instance has nothing left to
/// wait for.
#[derive(Debug)]
struct ScopeStack<'s> {
    frames: Vec<Frame<'s>>,
}

impl<'s> ScopeStack<'s> {
    fn new(root: Frame<'s>) -> Self {
        Self { frames: vec![root] }
    }

    fn push(&mut self, frame: Frame<'s>) {
        info!(
            scenario = frame.scenario.name(),
            process_instance_id = %frame.process_instance_id,
            depth = self.frames.len(),
            "entering called process scope"
        );
        self.frames.push(frame);
    }

    fn pop_exhausted(&mut self, exhausted: &[String]) {
        self.frames.retain(|frame| {
            let done = exhausted.contains(&frame.process_instance_id);
            if done {
                info!(
                    scenario = frame.scenario.name(),
                    process_instance_id = %frame.process_instance_id,
                    "leaving process scope"
                );
            }
            !done
        });
    }

    fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

// ─── Classification ───────────────────────────────────────────

struct Candidate<'s> {
    waitstate: Waitstate,
    scenario: &'s Scenario,
    deadline: Instant,
}

#[derive(Default)]
struct Classified<'s> {
    actionable: Vec<Candidate<'s>>,
    deferred: Vec<Instant>,
    unbound: Vec<Waitstate>,
}

impl<'s> Classified<'s> {
    fn classify(discovered: Vec<(&'s Scenario, Waitstate)>, now: Instant) -> Result<Self> {
        let mut classified = Self::default();
        for (scenario, waitstate) in discovered {
            let deadline = waitstate.deadline()?;
            if waitstate.resolve_action(scenario).is_none() {
                classified.unbound.push(waitstate);
            } else if deadline <= now {
                classified.actionable.push(Candidate {
                    waitstate,
                    scenario,
                    deadline,
                });
            } else {
                classified.deferred.push(deadline);
            }
        }
        Ok(classified)
    }

    /// Earliest deadline, timers first on ties, then discovery order.
    fn take_next(&mut self) -> Option<Candidate<'s>> {
        let index = self
            .actionable
            .iter()
            .enumerate()
            .min_by_key(|(i, c)| (c.deadline, !c.waitstate.kind().is_timer(), *i))
            .map(|(i, _)| i)?;
        Some(self.actionable.swap_remove(index))
    }
}

// ─── Runner ───────────────────────────────────────────────────

/// Summary of a finished run.
#[derive(Debug)]
pub struct RunReport {
    pub process_instance_id: String,
    pub outcome: OutcomeRecord,
    /// Waitstates executed, including call activities entered.
    pub executed: usize,
    pub clock_advances: usize,
    pub finished_at: Instant,
}

/// Drives one process instance (and the instances it calls) to completion
/// against a scenario.
pub struct ScenarioRunner<'s> {
    engine: Arc<dyn ProcessEngine>,
    scenario: &'s Scenario,
    config: RunnerConfig,
}

impl<'s> ScenarioRunner<'s> {
    pub fn new(engine: Arc<dyn ProcessEngine>, scenario: &'s Scenario) -> Self {
        Self {
            engine,
            scenario,
            config: RunnerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    /// Start the latest definition deployed under `key` and drive it.
    pub fn start_by_key(&self, key: &str, variables: Variables) -> Result<RunReport> {
        self.start_by(|engine| engine.start_process_instance_by_key(key, variables))
    }

    /// Start the process with a custom starter returning the instance id.
    pub fn start_by<F>(&self, starter: F) -> Result<RunReport>
    where
        F: FnOnce(&dyn ProcessEngine) -> anyhow::Result<String>,
    {
        if let Some(start_time) = self.config.start_time {
            VirtualClock::new(self.engine.as_ref()).advance_to(start_time)?;
        }
        let process_instance_id = starter(self.engine.as_ref())?;
        self.run(&process_instance_id)
    }

    /// Drive an already started process instance.
    pub fn run(&self, process_instance_id: &str) -> Result<RunReport> {
        let engine = self.engine.as_ref();
        let mut clock = VirtualClock::new(engine);
        let mut outcome = OutcomeRecord::new();
        let mut scopes = ScopeStack::new(Frame {
            scenario: self.scenario,
            process_instance_id: process_instance_id.to_string(),
        });
        let mut executed = 0usize;
        let mut clock_advances = 0usize;

        info!(
            scenario = self.scenario.name(),
            process_instance_id,
            "scenario run started"
        );

        while !scopes.is_empty() {
            // Discover
            let mut discovered = Vec::new();
            let mut stalled = Vec::new();
            let mut exhausted = Vec::new();
            for frame in &scopes.frames {
                let pass = discover(engine, frame.scenario, &frame.process_instance_id, &mut outcome)?;
                if pass.is_exhausted() {
                    exhausted.push(frame.process_instance_id.clone());
                }
                discovered.extend(pass.waitstates.into_iter().map(|ws| (frame.scenario, ws)));
                stalled.extend(pass.executed);
            }
            scopes.pop_exhausted(&exhausted);

            // Classify
            let now = clock.now()?;
            let mut classified = Classified::classify(discovered, now)?;

            let nothing_to_do = classified.actionable.is_empty()
                && classified.deferred.is_empty()
                && classified.unbound.is_empty();
            if nothing_to_do {
                // A frame still blocked only at points already executed
                // will never move again.
                if let Some(stuck) = stalled.first() {
                    return Err(stuck.stalled());
                }
                break;
            }
            if executed + clock_advances >= self.config.max_steps {
                return Err(ScenarioError::StepLimitExceeded {
                    limit: self.config.max_steps,
                });
            }

            // Advance
            if let Some(next) = classified.take_next() {
                let result = next
                    .waitstate
                    .execute(engine, next.scenario, &mut outcome)?;
                executed += 1;
                if let Executed::Entered {
                    scenario,
                    process_instance_id,
                } = result
                {
                    scopes.push(Frame {
                        scenario,
                        process_instance_id,
                    });
                }
                continue;
            }

            if let Some(stuck) = classified.unbound.first() {
                if classified.deferred.is_empty() {
                    return Err(stuck.unmocked());
                }
            }

            if let Some(deadline) = classified.deferred.iter().min().copied() {
                debug!(%now, %deadline, "only deferred waitstates left");
                clock.advance_to(deadline)?;
                clock_advances += 1;
            }
        }

        let finished_at = clock.now()?;
        info!(
            scenario = self.scenario.name(),
            process_instance_id,
            executed,
            clock_advances,
            %finished_at,
            "scenario run finished"
        );

        Ok(RunReport {
            process_instance_id: process_instance_id.to_string(),
            outcome,
            executed,
            clock_advances,
            finished_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryEngine;
    use crate::types::*;
    use crate::waitstate::WaitstateKind;

    const SINGLE_TASK: &str = r#"
id: single
nodes:
  - kind: Start
    id: start
  - kind: UserTask
    id: sign
  - kind: End
    id: end
edges:
  - from: start
    to: sign
  - from: sign
    to: end
"#;

    /// Accepts task completions without applying them.
    struct DropsCompletions(MemoryEngine);

    impl ProcessEngine for DropsCompletions {
        fn process_instance(&self, id: &str) -> anyhow::Result<Option<ProcessInstanceInfo>> {
            self.0.process_instance(id)
        }
        fn start_process_instance_by_key(&self, key: &str, variables: Variables) -> anyhow::Result<String> {
            self.0.start_process_instance_by_key(key, variables)
        }
        fn historic_activity_instances(&self, pid: &str) -> anyhow::Result<Vec<HistoricActivityInstance>> {
            self.0.historic_activity_instances(pid)
        }
        fn historic_activity_instance(&self, id: &str) -> anyhow::Result<Option<HistoricActivityInstance>> {
            self.0.historic_activity_instance(id)
        }
        fn task(&self, execution_id: &str) -> anyhow::Result<Option<Task>> {
            self.0.task(execution_id)
        }
        fn external_task(&self, execution_id: &str) -> anyhow::Result<Option<ExternalTask>> {
            self.0.external_task(execution_id)
        }
        fn event_subscription(
            &self,
            event_type: EventType,
            execution_id: &str,
        ) -> anyhow::Result<Option<EventSubscription>> {
            self.0.event_subscription(event_type, execution_id)
        }
        fn timer_jobs(&self, pid: &str) -> anyhow::Result<Vec<TimerJob>> {
            self.0.timer_jobs(pid)
        }
        fn complete_task(&self, _task_id: &str, _variables: Variables) -> anyhow::Result<()> {
            Ok(())
        }
        fn complete_external_task(&self, id: &str, variables: Variables) -> anyhow::Result<()> {
            self.0.complete_external_task(id, variables)
        }
        fn handle_bpmn_error(&self, id: &str, code: &str, variables: Variables) -> anyhow::Result<()> {
            self.0.handle_bpmn_error(id, code, variables)
        }
        fn message_event_received(&self, name: &str, execution_id: &str, variables: Variables) -> anyhow::Result<()> {
            self.0.message_event_received(name, execution_id, variables)
        }
        fn signal_event_received(&self, name: &str, execution_id: &str, variables: Variables) -> anyhow::Result<()> {
            self.0.signal_event_received(name, execution_id, variables)
        }
        fn signal(&self, execution_id: &str, variables: Variables) -> anyhow::Result<()> {
            self.0.signal(execution_id, variables)
        }
        fn execute_job(&self, job_id: &str) -> anyhow::Result<()> {
            self.0.execute_job(job_id)
        }
        fn current_time(&self) -> anyhow::Result<Instant> {
            self.0.current_time()
        }
        fn set_current_time(&self, at: Instant) -> anyhow::Result<()> {
            self.0.set_current_time(at)
        }
    }

    fn sign_scenario() -> Scenario {
        Scenario::new("single").acts_on_user_task("sign", |task| {
            task.complete();
            Ok(())
        })
    }

    #[test]
    fn test_blocked_after_execution_is_stalled() {
        let memory = MemoryEngine::new();
        memory.deploy_yaml(SINGLE_TASK).unwrap();
        let engine: Arc<dyn ProcessEngine> = Arc::new(DropsCompletions(memory));
        let scenario = sign_scenario();

        let err = ScenarioRunner::new(engine, &scenario)
            .start_by_key("single", Variables::new())
            .unwrap_err();

        match err {
            ScenarioError::StalledWaitstate {
                kind,
                activity_id,
                process_definition_id,
                ..
            } => {
                assert_eq!(kind, WaitstateKind::UserTask);
                assert_eq!(activity_id, "sign");
                assert_eq!(process_definition_id, "single:1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_finished_run_reports_once_executed() {
        let memory = MemoryEngine::new();
        memory.deploy_yaml(SINGLE_TASK).unwrap();
        let scenario = sign_scenario();

        let report = ScenarioRunner::new(Arc::new(memory), &scenario)
            .start_by_key("single", Variables::new())
            .unwrap();

        assert_eq!(report.executed, 1);
        assert_eq!(report.clock_advances, 0);
        assert!(report.outcome.has_completed("sign"));
        assert!(report.outcome.has_completed("end"));
    }
}
