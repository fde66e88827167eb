//! Waitstates
//!
//! A `Waitstate` is a snapshot of one point where a process instance is
//! blocked, taken during a single discovery pass. It knows its identity, when
//! it is due, which scenario action it resolves to, and how to resume the
//! underlying execution. Snapshots are never carried over into the next pass.

use crate::delegate::*;
use crate::duration;
use crate::engine::ProcessEngine;
use crate::error::{Result, ScenarioError};
use crate::outcome::OutcomeRecord;
use crate::scenario::*;
use crate::types::*;
use tracing::{debug, warn};

// ─── Kinds ────────────────────────────────────────────────────

/// The closed set of waitstate variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WaitstateKind {
    UserTask,
    ServiceTask,
    SendTask,
    ReceiveTask,
    MessageIntermediateCatchEvent,
    SignalIntermediateCatchEvent,
    TimerIntermediateEvent,
    TimerBoundaryEvent,
    CallActivity,
}

impl WaitstateKind {
    /// Kinds discovered from unfinished history rows. Timers come from jobs.
    pub fn from_activity_type(activity_type: ActivityType) -> Option<Self> {
        match activity_type {
            ActivityType::UserTask => Some(Self::UserTask),
            ActivityType::ServiceTask => Some(Self::ServiceTask),
            ActivityType::SendTask => Some(Self::SendTask),
            ActivityType::ReceiveTask => Some(Self::ReceiveTask),
            ActivityType::IntermediateMessageCatch => Some(Self::MessageIntermediateCatchEvent),
            ActivityType::IntermediateSignalCatch => Some(Self::SignalIntermediateCatchEvent),
            ActivityType::CallActivity => Some(Self::CallActivity),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserTask => "UserTask",
            Self::ServiceTask => "ServiceTask",
            Self::SendTask => "SendTask",
            Self::ReceiveTask => "ReceiveTask",
            Self::MessageIntermediateCatchEvent => "MessageIntermediateCatchEvent",
            Self::SignalIntermediateCatchEvent => "SignalIntermediateCatchEvent",
            Self::TimerIntermediateEvent => "TimerIntermediateEvent",
            Self::TimerBoundaryEvent => "TimerBoundaryEvent",
            Self::CallActivity => "CallActivity",
        }
    }

    pub fn is_timer(&self) -> bool {
        matches!(self, Self::TimerIntermediateEvent | Self::TimerBoundaryEvent)
    }
}

impl std::fmt::Display for WaitstateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identifies one blocked point within a discovery pass.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WaitstateIdentity {
    pub execution_id: String,
    pub activity_id: String,
    pub process_instance_id: String,
}

/// The scenario binding a waitstate resolved to.
pub enum BoundAction<'s> {
    UserTask(&'s UserTaskAction),
    ExternalTask(&'s ExternalTaskAction),
    ReceiveTask(&'s ReceiveTaskAction),
    Event(&'s EventAction),
    /// Timers are always bound; the action is optional.
    Timer(Option<&'s TimerAction>),
    CallActivity(&'s Scenario),
}

/// What `execute` did.
#[derive(Debug)]
pub enum Executed<'s> {
    /// The execution was resumed.
    Left,
    /// A call activity was entered; its called instance runs under `scenario`.
    Entered {
        scenario: &'s Scenario,
        process_instance_id: String,
    },
}

// ─── Waitstate ────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct Waitstate {
    kind: WaitstateKind,
    historic: HistoricActivityInstance,
    job: Option<TimerJob>,
    duration: Option<String>,
}

impl Waitstate {
    /// Snapshot an unfinished history row. `None` for rows that are not
    /// history-backed waitstates.
    pub fn from_history(historic: HistoricActivityInstance, duration: Option<String>) -> Option<Self> {
        if historic.is_finished() {
            return None;
        }
        let kind = WaitstateKind::from_activity_type(historic.activity_type)?;
        Some(Self {
            kind,
            historic,
            job: None,
            duration,
        })
    }

    /// Snapshot a pending timer job. Boundary timers have no history row of
    /// their own until they fire, so one is derived from the job.
    pub fn from_timer(job: TimerJob, historic: Option<HistoricActivityInstance>) -> Self {
        let kind = match job.activity_type {
            ActivityType::BoundaryTimer => WaitstateKind::TimerBoundaryEvent,
            _ => WaitstateKind::TimerIntermediateEvent,
        };
        let historic = historic.unwrap_or_else(|| HistoricActivityInstance {
            id: job.id.clone(),
            activity_id: job.activity_id.clone(),
            activity_type: job.activity_type,
            execution_id: job.execution_id.clone(),
            process_instance_id: job.process_instance_id.clone(),
            process_definition_id: job.process_definition_id.clone(),
            start_time: job.created,
            end_time: None,
            canceled: false,
            called_process_instance_id: None,
        });
        Self {
            kind,
            historic,
            job: Some(job),
            duration: None,
        }
    }

    pub fn kind(&self) -> WaitstateKind {
        self.kind
    }

    pub fn historic(&self) -> &HistoricActivityInstance {
        &self.historic
    }

    pub fn activity_id(&self) -> &str {
        &self.historic.activity_id
    }

    pub fn execution_id(&self) -> &str {
        &self.historic.execution_id
    }

    pub fn process_instance_id(&self) -> &str {
        &self.historic.process_instance_id
    }

    pub fn duration(&self) -> Option<&str> {
        self.duration.as_deref()
    }

    pub fn identity(&self) -> WaitstateIdentity {
        WaitstateIdentity {
            execution_id: self.historic.execution_id.clone(),
            activity_id: self.historic.activity_id.clone(),
            process_instance_id: self.historic.process_instance_id.clone(),
        }
    }

    /// Stable across passes: the timer job id, otherwise the history row id.
    pub fn key(&self) -> &str {
        match &self.job {
            Some(job) => &job.id,
            None => &self.historic.id,
        }
    }

    /// When this waitstate is due. Timers are due at their job's due date;
    /// everything else at its start time plus the configured wait duration.
    pub fn deadline(&self) -> Result<Instant> {
        match &self.job {
            Some(job) => Ok(job.due_date),
            None => duration::deadline(self.historic.start_time, self.duration.as_deref()),
        }
    }

    pub fn resolve_action<'s>(&self, scenario: &'s Scenario) -> Option<BoundAction<'s>> {
        let id = self.activity_id();
        match self.kind {
            WaitstateKind::UserTask => scenario.user_task(id).map(BoundAction::UserTask),
            WaitstateKind::ServiceTask => scenario.service_task(id).map(BoundAction::ExternalTask),
            WaitstateKind::SendTask => scenario.send_task(id).map(BoundAction::ExternalTask),
            WaitstateKind::ReceiveTask => scenario.receive_task(id).map(BoundAction::ReceiveTask),
            WaitstateKind::MessageIntermediateCatchEvent => {
                scenario.message_event(id).map(BoundAction::Event)
            }
            WaitstateKind::SignalIntermediateCatchEvent => {
                scenario.signal_event(id).map(BoundAction::Event)
            }
            WaitstateKind::TimerIntermediateEvent | WaitstateKind::TimerBoundaryEvent => {
                Some(BoundAction::Timer(scenario.timer(id)))
            }
            WaitstateKind::CallActivity => {
                scenario.call_activity(id).map(BoundAction::CallActivity)
            }
        }
    }

    /// Run the bound action, resume the execution and record the outcome.
    pub fn execute<'s>(
        &self,
        engine: &dyn ProcessEngine,
        scenario: &'s Scenario,
        outcome: &mut OutcomeRecord,
    ) -> Result<Executed<'s>> {
        let action = self
            .resolve_action(scenario)
            .ok_or_else(|| self.unmocked())?;

        debug!(
            kind = %self.kind,
            activity_id = self.activity_id(),
            execution_id = self.execution_id(),
            process_instance_id = self.process_instance_id(),
            "executing waitstate"
        );

        let resolution = match action {
            BoundAction::UserTask(action) => {
                let task = engine
                    .task(self.execution_id())?
                    .ok_or_else(|| self.missing("task"))?;
                let ctx = self.context(engine, task.tenant_id.as_deref(), task.created);
                let mut delegate = UserTaskDelegate::new(ctx, task);
                action(&mut delegate).map_err(|e| self.action_failed(e))?;
                delegate.into_resolution()
            }
            BoundAction::ExternalTask(action) => {
                let external_task = engine
                    .external_task(self.execution_id())?
                    .ok_or_else(|| self.missing("external task"))?;
                let ctx = self.context(
                    engine,
                    external_task.tenant_id.as_deref(),
                    external_task.created,
                );
                let mut delegate = ExternalTaskDelegate::new(ctx, external_task);
                action(&mut delegate).map_err(|e| self.action_failed(e))?;
                delegate.into_resolution()
            }
            BoundAction::ReceiveTask(action) => {
                let subscription =
                    engine.event_subscription(EventType::Message, self.execution_id())?;
                let (tenant_id, created) = match &subscription {
                    Some(s) => (s.tenant_id.clone(), s.created),
                    None => (None, self.historic.start_time),
                };
                let ctx = self.context(engine, tenant_id.as_deref(), created);
                let mut delegate = ReceiveTaskDelegate::new(ctx, subscription);
                action(&mut delegate).map_err(|e| self.action_failed(e))?;
                delegate.into_resolution()
            }
            BoundAction::Event(action) => {
                let subscription = engine
                    .event_subscription(self.event_type(), self.execution_id())?
                    .ok_or_else(|| self.missing("event subscription"))?;
                let ctx = self.context(engine, subscription.tenant_id.as_deref(), subscription.created);
                let mut delegate = EventSubscriptionDelegate::new(ctx, subscription);
                action(&mut delegate).map_err(|e| self.action_failed(e))?;
                delegate.into_resolution()
            }
            BoundAction::Timer(action) => {
                if let (Some(action), Some(job)) = (action, &self.job) {
                    let ctx = self.context(engine, job.tenant_id.as_deref(), job.created);
                    let delegate = TimerDelegate::new(ctx, job.clone());
                    action(&delegate).map_err(|e| self.action_failed(e))?;
                }
                Resolution::default()
            }
            BoundAction::CallActivity(nested) => {
                let process_instance_id = self
                    .historic
                    .called_process_instance_id
                    .clone()
                    .ok_or_else(|| self.missing("called process instance"))?;
                outcome.record_executed(scenario.name(), self);
                return Ok(Executed::Entered {
                    scenario: nested,
                    process_instance_id,
                });
            }
        };

        match resolution {
            Resolution::Complete(variables) => self.leave(engine, variables)?,
            Resolution::BpmnError {
                error_code,
                variables,
            } => self.throw_bpmn_error(engine, &error_code, variables)?,
        }

        outcome.record_executed(scenario.name(), self);
        Ok(Executed::Left)
    }

    /// Resume the underlying execution.
    pub fn leave(&self, engine: &dyn ProcessEngine, variables: Variables) -> Result<()> {
        match self.kind {
            WaitstateKind::UserTask => {
                let task = engine
                    .task(self.execution_id())?
                    .ok_or_else(|| self.missing("task"))?;
                engine.complete_task(&task.id, variables)?;
            }
            WaitstateKind::ServiceTask | WaitstateKind::SendTask => {
                let external_task = engine
                    .external_task(self.execution_id())?
                    .ok_or_else(|| self.missing("external task"))?;
                engine.complete_external_task(&external_task.id, variables)?;
            }
            WaitstateKind::ReceiveTask => {
                if !deliver_to_subscription(engine, EventType::Message, self.execution_id(), &variables)? {
                    warn!(
                        activity_id = self.activity_id(),
                        execution_id = self.execution_id(),
                        "receive task has no message subscription, signalling execution"
                    );
                    engine.signal(self.execution_id(), variables)?;
                }
            }
            WaitstateKind::MessageIntermediateCatchEvent
            | WaitstateKind::SignalIntermediateCatchEvent => {
                if !deliver_to_subscription(engine, self.event_type(), self.execution_id(), &variables)? {
                    return Err(self.missing("event subscription"));
                }
            }
            WaitstateKind::TimerIntermediateEvent | WaitstateKind::TimerBoundaryEvent => {
                let job = self.job.as_ref().ok_or_else(|| self.missing("timer job"))?;
                engine.execute_job(&job.id)?;
            }
            WaitstateKind::CallActivity => {
                return Err(ScenarioError::UnsupportedOperation(format!(
                    "call activity '{}' is left by its called process instance",
                    self.activity_id()
                )));
            }
        }
        Ok(())
    }

    fn throw_bpmn_error(
        &self,
        engine: &dyn ProcessEngine,
        error_code: &str,
        variables: Variables,
    ) -> Result<()> {
        if !matches!(self.kind, WaitstateKind::ServiceTask | WaitstateKind::SendTask) {
            return Err(ScenarioError::UnsupportedOperation(format!(
                "{} '{}' cannot throw a BPMN error",
                self.kind,
                self.activity_id()
            )));
        }
        let external_task = engine
            .external_task(self.execution_id())?
            .ok_or_else(|| self.missing("external task"))?;
        engine.handle_bpmn_error(&external_task.id, error_code, variables)?;
        Ok(())
    }

    fn event_type(&self) -> EventType {
        match self.kind {
            WaitstateKind::SignalIntermediateCatchEvent => EventType::Signal,
            _ => EventType::Message,
        }
    }

    fn context<'a>(
        &self,
        engine: &'a dyn ProcessEngine,
        tenant_id: Option<&str>,
        created: Instant,
    ) -> DelegateContext<'a> {
        DelegateContext::new(
            engine,
            self.activity_id(),
            self.execution_id(),
            self.process_instance_id(),
            tenant_id,
            created,
        )
    }

    pub(crate) fn unmocked(&self) -> ScenarioError {
        ScenarioError::UnmockedWaitstate {
            process_definition_id: self.historic.process_definition_id.clone(),
            process_instance_id: self.historic.process_instance_id.clone(),
            kind: self.kind,
            activity_id: self.historic.activity_id.clone(),
        }
    }

    pub(crate) fn stalled(&self) -> ScenarioError {
        ScenarioError::StalledWaitstate {
            process_definition_id: self.historic.process_definition_id.clone(),
            process_instance_id: self.historic.process_instance_id.clone(),
            kind: self.kind,
            activity_id: self.historic.activity_id.clone(),
        }
    }

    fn missing(&self, expected: &'static str) -> ScenarioError {
        ScenarioError::MissingRuntimeState {
            kind: self.kind,
            activity_id: self.activity_id().to_string(),
            execution_id: self.execution_id().to_string(),
            expected,
        }
    }

    fn action_failed(&self, source: anyhow::Error) -> ScenarioError {
        ScenarioError::Action {
            activity_id: self.activity_id().to_string(),
            source,
        }
    }
}

/// Deliver to the subscription of `event_type` held by `execution_id`.
/// Returns false when there is none.
fn deliver_to_subscription(
    engine: &dyn ProcessEngine,
    event_type: EventType,
    execution_id: &str,
    variables: &Variables,
) -> Result<bool> {
    let Some(subscription) = engine.event_subscription(event_type, execution_id)? else {
        return Ok(false);
    };
    match event_type {
        EventType::Message => engine.message_event_received(
            &subscription.event_name,
            &subscription.execution_id,
            variables.clone(),
        )?,
        EventType::Signal => engine.signal_event_received(
            &subscription.event_name,
            &subscription.execution_id,
            variables.clone(),
        )?,
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryEngine;
    use crate::types::variables;

    const WAITS: &str = r#"
id: waits
nodes:
  - kind: Start
    id: start
  - kind: UserTask
    id: approve
  - kind: MessageCatch
    id: payment
    message: PAYMENT
  - kind: SignalCatch
    id: opened
    signal: OPENED
  - kind: ReceiveTask
    id: check
  - kind: End
    id: end
edges:
  - from: start
    to: approve
  - from: approve
    to: payment
  - from: payment
    to: opened
  - from: opened
    to: check
  - from: check
    to: end
"#;

    fn started() -> (MemoryEngine, String) {
        let engine = MemoryEngine::new();
        engine.deploy_yaml(WAITS).unwrap();
        let pid = engine
            .start_process_instance_by_key("waits", Variables::new())
            .unwrap();
        (engine, pid)
    }

    /// Snapshot of the open row for `activity_id`.
    fn waiting_at(engine: &MemoryEngine, pid: &str, activity_id: &str) -> Waitstate {
        engine
            .historic_activity_instances(pid)
            .unwrap()
            .into_iter()
            .filter(|r| r.activity_id == activity_id)
            .find_map(|r| Waitstate::from_history(r, None))
            .unwrap_or_else(|| panic!("not waiting at {activity_id}"))
    }

    fn assert_missing(result: Result<()>, expected_kind: WaitstateKind, what: &str) {
        match result {
            Err(ScenarioError::MissingRuntimeState { kind, expected, .. }) => {
                assert_eq!(kind, expected_kind);
                assert_eq!(expected, what);
            }
            other => panic!("expected MissingRuntimeState, got {other:?}"),
        }
    }

    #[test]
    fn test_user_task_without_task_fails() {
        let (engine, pid) = started();
        let approve = waiting_at(&engine, &pid, "approve");
        approve.leave(&engine, Variables::new()).unwrap();

        // Same snapshot again: the task is gone.
        assert_missing(
            approve.leave(&engine, Variables::new()),
            WaitstateKind::UserTask,
            "task",
        );
    }

    #[test]
    fn test_consumed_subscription_fails_for_catch_events() {
        let (engine, pid) = started();
        waiting_at(&engine, &pid, "approve")
            .leave(&engine, Variables::new())
            .unwrap();

        let payment = waiting_at(&engine, &pid, "payment");
        assert_eq!(payment.kind(), WaitstateKind::MessageIntermediateCatchEvent);
        payment.leave(&engine, variables([("paid", true)])).unwrap();
        assert_missing(
            payment.leave(&engine, Variables::new()),
            WaitstateKind::MessageIntermediateCatchEvent,
            "event subscription",
        );

        let opened = waiting_at(&engine, &pid, "opened");
        assert_eq!(opened.kind(), WaitstateKind::SignalIntermediateCatchEvent);
        opened.leave(&engine, Variables::new()).unwrap();
        assert_missing(
            opened.leave(&engine, Variables::new()),
            WaitstateKind::SignalIntermediateCatchEvent,
            "event subscription",
        );
    }

    #[test]
    fn test_receive_task_without_subscription_signals_execution() {
        let (engine, pid) = started();
        for activity_id in ["approve", "payment", "opened"] {
            waiting_at(&engine, &pid, activity_id)
                .leave(&engine, Variables::new())
                .unwrap();
        }

        let check = waiting_at(&engine, &pid, "check");
        assert!(engine
            .event_subscription(EventType::Message, check.execution_id())
            .unwrap()
            .is_none());
        check
            .leave(&engine, variables([("checked", true)]))
            .unwrap();

        assert!(engine.process_instance(&pid).unwrap().unwrap().ended);
        assert_eq!(
            engine.variables(&pid).unwrap().get("checked"),
            Some(&serde_json::json!(true))
        );
    }
}
