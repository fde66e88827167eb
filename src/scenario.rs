//! Scenario definitions
//!
//! A `Scenario` maps activity ids of one process definition to the mock
//! actions a test wants to run when the process waits there, plus optional
//! wait durations. Call activities nest a further `Scenario` for the called
//! process. Scenarios are built up front and only read during a run.

use crate::delegate::{
    EventSubscriptionDelegate, ExternalTaskDelegate, ReceiveTaskDelegate, TimerDelegate,
    UserTaskDelegate,
};
use std::collections::HashMap;

pub type UserTaskAction = Box<dyn Fn(&mut UserTaskDelegate<'_>) -> anyhow::Result<()>>;
pub type ExternalTaskAction = Box<dyn Fn(&mut ExternalTaskDelegate<'_>) -> anyhow::Result<()>>;
pub type ReceiveTaskAction = Box<dyn Fn(&mut ReceiveTaskDelegate<'_>) -> anyhow::Result<()>>;
pub type EventAction = Box<dyn Fn(&mut EventSubscriptionDelegate<'_>) -> anyhow::Result<()>>;
pub type TimerAction = Box<dyn Fn(&TimerDelegate<'_>) -> anyhow::Result<()>>;

/// Mock actions and wait durations for one process definition.
#[derive(Default)]
pub struct Scenario {
    name: String,
    user_tasks: HashMap<String, UserTaskAction>,
    service_tasks: HashMap<String, ExternalTaskAction>,
    send_tasks: HashMap<String, ExternalTaskAction>,
    receive_tasks: HashMap<String, ReceiveTaskAction>,
    message_events: HashMap<String, EventAction>,
    signal_events: HashMap<String, EventAction>,
    timers: HashMap<String, TimerAction>,
    call_activities: HashMap<String, Scenario>,
    durations: HashMap<String, String>,
}

impl Scenario {
    /// `name` scopes outcome queries; typically the process-definition key.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ── Builder ──

    pub fn acts_on_user_task<F>(mut self, activity_id: impl Into<String>, action: F) -> Self
    where
        F: Fn(&mut UserTaskDelegate<'_>) -> anyhow::Result<()> + 'static,
    {
        self.user_tasks.insert(activity_id.into(), Box::new(action));
        self
    }

    pub fn acts_on_service_task<F>(mut self, activity_id: impl Into<String>, action: F) -> Self
    where
        F: Fn(&mut ExternalTaskDelegate<'_>) -> anyhow::Result<()> + 'static,
    {
        self.service_tasks
            .insert(activity_id.into(), Box::new(action));
        self
    }

    pub fn acts_on_send_task<F>(mut self, activity_id: impl Into<String>, action: F) -> Self
    where
        F: Fn(&mut ExternalTaskDelegate<'_>) -> anyhow::Result<()> + 'static,
    {
        self.send_tasks.insert(activity_id.into(), Box::new(action));
        self
    }

    pub fn acts_on_receive_task<F>(mut self, activity_id: impl Into<String>, action: F) -> Self
    where
        F: Fn(&mut ReceiveTaskDelegate<'_>) -> anyhow::Result<()> + 'static,
    {
        self.receive_tasks
            .insert(activity_id.into(), Box::new(action));
        self
    }

    pub fn acts_on_message_intermediate_catch_event<F>(
        mut self,
        activity_id: impl Into<String>,
        action: F,
    ) -> Self
    where
        F: Fn(&mut EventSubscriptionDelegate<'_>) -> anyhow::Result<()> + 'static,
    {
        self.message_events
            .insert(activity_id.into(), Box::new(action));
        self
    }

    pub fn acts_on_signal_intermediate_catch_event<F>(
        mut self,
        activity_id: impl Into<String>,
        action: F,
    ) -> Self
    where
        F: Fn(&mut EventSubscriptionDelegate<'_>) -> anyhow::Result<()> + 'static,
    {
        self.signal_events
            .insert(activity_id.into(), Box::new(action));
        self
    }

    /// Observe a timer before it fires. Timers fire without a binding too.
    pub fn acts_on_timer<F>(mut self, activity_id: impl Into<String>, action: F) -> Self
    where
        F: Fn(&TimerDelegate<'_>) -> anyhow::Result<()> + 'static,
    {
        self.timers.insert(activity_id.into(), Box::new(action));
        self
    }

    /// Drive the process called by `activity_id` with `scenario`.
    pub fn runs_call_activity(mut self, activity_id: impl Into<String>, scenario: Scenario) -> Self {
        self.call_activities.insert(activity_id.into(), scenario);
        self
    }

    /// Hold back the action for `activity_id` until `duration` (ISO-8601
    /// period) after the waitstate started.
    pub fn waits_for_action_on(
        mut self,
        activity_id: impl Into<String>,
        duration: impl Into<String>,
    ) -> Self {
        self.durations.insert(activity_id.into(), duration.into());
        self
    }

    // ── Lookups ──

    pub fn user_task(&self, activity_id: &str) -> Option<&UserTaskAction> {
        self.user_tasks.get(activity_id)
    }

    pub fn service_task(&self, activity_id: &str) -> Option<&ExternalTaskAction> {
        self.service_tasks.get(activity_id)
    }

    pub fn send_task(&self, activity_id: &str) -> Option<&ExternalTaskAction> {
        self.send_tasks.get(activity_id)
    }

    pub fn receive_task(&self, activity_id: &str) -> Option<&ReceiveTaskAction> {
        self.receive_tasks.get(activity_id)
    }

    pub fn message_event(&self, activity_id: &str) -> Option<&EventAction> {
        self.message_events.get(activity_id)
    }

    pub fn signal_event(&self, activity_id: &str) -> Option<&EventAction> {
        self.signal_events.get(activity_id)
    }

    pub fn timer(&self, activity_id: &str) -> Option<&TimerAction> {
        self.timers.get(activity_id)
    }

    pub fn call_activity(&self, activity_id: &str) -> Option<&Scenario> {
        self.call_activities.get(activity_id)
    }

    pub fn wait_duration(&self, activity_id: &str) -> Option<&str> {
        self.durations.get(activity_id).map(String::as_str)
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn keys<V>(map: &HashMap<String, V>) -> Vec<&str> {
            let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
            keys.sort_unstable();
            keys
        }
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("user_tasks", &keys(&self.user_tasks))
            .field("service_tasks", &keys(&self.service_tasks))
            .field("send_tasks", &keys(&self.send_tasks))
            .field("receive_tasks", &keys(&self.receive_tasks))
            .field("message_events", &keys(&self.message_events))
            .field("signal_events", &keys(&self.signal_events))
            .field("timers", &keys(&self.timers))
            .field("call_activities", &self.call_activities)
            .field("durations", &self.durations)
            .finish()
    }
}
