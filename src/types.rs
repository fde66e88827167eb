use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ─── Scalar aliases ───────────────────────────────────────────

/// Process variables exchanged with the engine. Ordered so that snapshots
/// compare and print deterministically.
pub type Variables = BTreeMap<String, serde_json::Value>;

/// Virtual-clock instant.
pub type Instant = DateTime<Utc>;

/// Build a `Variables` map from `(name, value)` pairs.
pub fn variables<I, K, V>(pairs: I) -> Variables
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<serde_json::Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

// ─── Activity types ───────────────────────────────────────────

/// Kind of a process-definition element as reported by history.
///
/// Only a subset are waitstates; the rest pass through the engine without
/// external input and are recorded as plain history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityType {
    StartEvent,
    NoneEndEvent,
    TerminateEndEvent,
    UserTask,
    ServiceTask,
    SendTask,
    ReceiveTask,
    IntermediateMessageCatch,
    IntermediateSignalCatch,
    IntermediateTimer,
    BoundaryTimer,
    BoundaryError,
    CallActivity,
    ExclusiveGateway,
    ParallelGateway,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartEvent => "startEvent",
            Self::NoneEndEvent => "noneEndEvent",
            Self::TerminateEndEvent => "terminateEndEvent",
            Self::UserTask => "userTask",
            Self::ServiceTask => "serviceTask",
            Self::SendTask => "sendTask",
            Self::ReceiveTask => "receiveTask",
            Self::IntermediateMessageCatch => "intermediateMessageCatch",
            Self::IntermediateSignalCatch => "intermediateSignalCatch",
            Self::IntermediateTimer => "intermediateTimer",
            Self::BoundaryTimer => "boundaryTimer",
            Self::BoundaryError => "boundaryError",
            Self::CallActivity => "callActivity",
            Self::ExclusiveGateway => "exclusiveGateway",
            Self::ParallelGateway => "parallelGateway",
        }
    }

    /// True for element types the drive loop has to resolve with an action
    /// (or, for timers, by firing a job).
    pub fn is_waitstate(&self) -> bool {
        matches!(
            self,
            Self::UserTask
                | Self::ServiceTask
                | Self::SendTask
                | Self::ReceiveTask
                | Self::IntermediateMessageCatch
                | Self::IntermediateSignalCatch
                | Self::IntermediateTimer
                | Self::BoundaryTimer
                | Self::CallActivity
        )
    }
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ─── History ──────────────────────────────────────────────────

/// One activity occurrence in the engine's history. Unfinished rows are the
/// raw material for waitstate discovery.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoricActivityInstance {
    /// Unique per occurrence, also across loop iterations of the same activity.
    pub id: String,
    pub activity_id: String,
    pub activity_type: ActivityType,
    pub execution_id: String,
    pub process_instance_id: String,
    pub process_definition_id: String,
    pub start_time: Instant,
    pub end_time: Option<Instant>,
    pub canceled: bool,
    /// Set on call-activity rows once the sub-process instance exists.
    pub called_process_instance_id: Option<String>,
}

impl HistoricActivityInstance {
    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }
}

// ─── Runtime records ──────────────────────────────────────────

/// A pending user task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: Option<String>,
    pub task_definition_key: String,
    pub execution_id: String,
    pub process_instance_id: String,
    pub assignee: Option<String>,
    pub candidate_groups: Vec<String>,
    pub tenant_id: Option<String>,
    pub created: Instant,
}

/// A pending external (service or send) task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExternalTask {
    pub id: String,
    pub topic_name: String,
    pub activity_id: String,
    pub execution_id: String,
    pub process_instance_id: String,
    pub tenant_id: Option<String>,
    pub created: Instant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Message,
    Signal,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Signal => "signal",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A live message or signal subscription held by an execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventSubscription {
    pub id: String,
    pub event_type: EventType,
    pub event_name: String,
    pub activity_id: String,
    pub execution_id: String,
    pub process_instance_id: String,
    pub tenant_id: Option<String>,
    pub created: Instant,
}

/// A scheduled timer (intermediate or boundary).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimerJob {
    pub id: String,
    pub activity_id: String,
    /// `IntermediateTimer` or `BoundaryTimer`.
    pub activity_type: ActivityType,
    pub execution_id: String,
    pub process_instance_id: String,
    pub process_definition_id: String,
    pub tenant_id: Option<String>,
    pub created: Instant,
    pub due_date: Instant,
}

/// Minimal view of a process instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessInstanceInfo {
    pub id: String,
    pub process_definition_id: String,
    pub process_definition_key: String,
    pub tenant_id: Option<String>,
    pub ended: bool,
}
