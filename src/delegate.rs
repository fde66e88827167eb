//! Delegates handed to scenario actions
//!
//! Each waitstate variant gets its own delegate type exposing read access to
//! the blocked point plus the one operation that resumes it. Operations only
//! record the action's decision; the waitstate applies it through the engine
//! after the action returns.

use crate::engine::ProcessEngine;
use crate::error::{Result, ScenarioError};
use crate::types::*;
use std::ops::Deref;

/// What an action decided to do with its waitstate.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    Complete(Variables),
    BpmnError {
        error_code: String,
        variables: Variables,
    },
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution::Complete(Variables::new())
    }
}

// ─── Shared context ───────────────────────────────────────────

/// Read access common to every delegate.
pub struct DelegateContext<'a> {
    engine: &'a dyn ProcessEngine,
    activity_id: String,
    execution_id: String,
    process_instance_id: String,
    tenant_id: Option<String>,
    created: Instant,
}

impl<'a> DelegateContext<'a> {
    pub(crate) fn new(
        engine: &'a dyn ProcessEngine,
        activity_id: &str,
        execution_id: &str,
        process_instance_id: &str,
        tenant_id: Option<&str>,
        created: Instant,
    ) -> Self {
        Self {
            engine,
            activity_id: activity_id.to_string(),
            execution_id: execution_id.to_string(),
            process_instance_id: process_instance_id.to_string(),
            tenant_id: tenant_id.map(str::to_string),
            created,
        }
    }

    pub fn activity_id(&self) -> &str {
        &self.activity_id
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn process_instance_id(&self) -> &str {
        &self.process_instance_id
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn created(&self) -> Instant {
        self.created
    }

    /// The engine, for actions that need to poke at other parts of the
    /// process (e.g. correlate an unrelated message).
    pub fn engine(&self) -> &'a dyn ProcessEngine {
        self.engine
    }
}

macro_rules! deref_context {
    ($($delegate:ident),*) => {
        $(
            impl<'a> Deref for $delegate<'a> {
                type Target = DelegateContext<'a>;

                fn deref(&self) -> &Self::Target {
                    &self.ctx
                }
            }
        )*
    };
}

deref_context!(
    UserTaskDelegate,
    ExternalTaskDelegate,
    ReceiveTaskDelegate,
    EventSubscriptionDelegate,
    TimerDelegate
);

// ─── User task ────────────────────────────────────────────────

pub struct UserTaskDelegate<'a> {
    ctx: DelegateContext<'a>,
    task: Task,
    resolution: Option<Resolution>,
}

impl<'a> UserTaskDelegate<'a> {
    pub(crate) fn new(ctx: DelegateContext<'a>, task: Task) -> Self {
        Self {
            ctx,
            task,
            resolution: None,
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn name(&self) -> Option<&str> {
        self.task.name.as_deref()
    }

    pub fn assignee(&self) -> Option<&str> {
        self.task.assignee.as_deref()
    }

    pub fn candidate_groups(&self) -> &[String] {
        &self.task.candidate_groups
    }

    pub fn complete(&mut self) {
        self.complete_with(Variables::new());
    }

    pub fn complete_with(&mut self, variables: Variables) {
        self.resolution = Some(Resolution::Complete(variables));
    }

    pub(crate) fn into_resolution(self) -> Resolution {
        self.resolution.unwrap_or_default()
    }
}

// ─── External (service / send) task ───────────────────────────

pub struct ExternalTaskDelegate<'a> {
    ctx: DelegateContext<'a>,
    external_task: ExternalTask,
    resolution: Option<Resolution>,
}

impl<'a> ExternalTaskDelegate<'a> {
    pub(crate) fn new(ctx: DelegateContext<'a>, external_task: ExternalTask) -> Self {
        Self {
            ctx,
            external_task,
            resolution: None,
        }
    }

    pub fn external_task(&self) -> &ExternalTask {
        &self.external_task
    }

    pub fn topic_name(&self) -> &str {
        &self.external_task.topic_name
    }

    pub fn complete(&mut self) {
        self.complete_with(Variables::new());
    }

    pub fn complete_with(&mut self, variables: Variables) {
        self.resolution = Some(Resolution::Complete(variables));
    }

    /// Throw a business error to a boundary error event on the task.
    pub fn handle_bpmn_error(&mut self, error_code: impl Into<String>) {
        self.handle_bpmn_error_with(error_code, Variables::new());
    }

    pub fn handle_bpmn_error_with(&mut self, error_code: impl Into<String>, variables: Variables) {
        self.resolution = Some(Resolution::BpmnError {
            error_code: error_code.into(),
            variables,
        });
    }

    pub(crate) fn into_resolution(self) -> Resolution {
        self.resolution.unwrap_or_default()
    }
}

// ─── Receive task ─────────────────────────────────────────────

/// Receive tasks may run without a message subscription; event details are
/// only available when one exists.
pub struct ReceiveTaskDelegate<'a> {
    ctx: DelegateContext<'a>,
    subscription: Option<EventSubscription>,
    received: Option<Variables>,
}

impl<'a> ReceiveTaskDelegate<'a> {
    pub(crate) fn new(ctx: DelegateContext<'a>, subscription: Option<EventSubscription>) -> Self {
        Self {
            ctx,
            subscription,
            received: None,
        }
    }

    pub fn subscription(&self) -> Option<&EventSubscription> {
        self.subscription.as_ref()
    }

    /// The message subscription, or `UnsupportedOperation` for receive tasks
    /// used without one.
    pub fn require_subscription(&self) -> Result<&EventSubscription> {
        self.subscription.as_ref().ok_or_else(|| {
            ScenarioError::UnsupportedOperation(format!(
                "receive task '{}' is used without a message event subscription",
                self.ctx.activity_id
            ))
        })
    }

    pub fn event_type(&self) -> Result<EventType> {
        Ok(self.require_subscription()?.event_type)
    }

    pub fn event_name(&self) -> Result<&str> {
        Ok(&self.require_subscription()?.event_name)
    }

    pub fn receive(&mut self) {
        self.receive_with(Variables::new());
    }

    pub fn receive_with(&mut self, variables: Variables) {
        self.received = Some(variables);
    }

    pub(crate) fn into_resolution(self) -> Resolution {
        Resolution::Complete(self.received.unwrap_or_default())
    }
}

// ─── Message / signal catch event ─────────────────────────────

pub struct EventSubscriptionDelegate<'a> {
    ctx: DelegateContext<'a>,
    subscription: EventSubscription,
    received: Option<Variables>,
}

impl<'a> EventSubscriptionDelegate<'a> {
    pub(crate) fn new(ctx: DelegateContext<'a>, subscription: EventSubscription) -> Self {
        Self {
            ctx,
            subscription,
            received: None,
        }
    }

    pub fn subscription(&self) -> &EventSubscription {
        &self.subscription
    }

    pub fn event_type(&self) -> EventType {
        self.subscription.event_type
    }

    pub fn event_name(&self) -> &str {
        &self.subscription.event_name
    }

    pub fn receive(&mut self) {
        self.receive_with(Variables::new());
    }

    pub fn receive_with(&mut self, variables: Variables) {
        self.received = Some(variables);
    }

    pub(crate) fn into_resolution(self) -> Resolution {
        Resolution::Complete(self.received.unwrap_or_default())
    }
}

// ─── Timer ────────────────────────────────────────────────────

/// Read-only: timers always fire once their action returns.
pub struct TimerDelegate<'a> {
    ctx: DelegateContext<'a>,
    job: TimerJob,
}

impl<'a> TimerDelegate<'a> {
    pub(crate) fn new(ctx: DelegateContext<'a>, job: TimerJob) -> Self {
        Self { ctx, job }
    }

    pub fn job(&self) -> &TimerJob {
        &self.job
    }

    pub fn due_date(&self) -> Instant {
        self.job.due_date
    }

    pub fn is_boundary(&self) -> bool {
        self.job.activity_type == ActivityType::BoundaryTimer
    }
}
