use crate::types::*;
use anyhow::Result;

/// The execution-engine collaborator.
///
/// The drive loop reads and mutates process state exclusively through this
/// trait. Every call is synchronous and is assumed to have taken effect when it
/// returns. Failures are surfaced to the caller unchanged; nothing here is
/// retried.
///
/// Implementations own the virtual clock. One runner holds the engine
/// exclusively for the duration of a run.
pub trait ProcessEngine {
    // ── Instances ──

    fn process_instance(&self, id: &str) -> Result<Option<ProcessInstanceInfo>>;

    /// Start the latest definition deployed under `key`. Returns the new
    /// process-instance id.
    fn start_process_instance_by_key(&self, key: &str, variables: Variables) -> Result<String>;

    // ── History ──

    /// All activity rows of one process instance, finished or not, in start order.
    fn historic_activity_instances(
        &self,
        process_instance_id: &str,
    ) -> Result<Vec<HistoricActivityInstance>>;

    fn historic_activity_instance(&self, id: &str) -> Result<Option<HistoricActivityInstance>>;

    // ── Runtime queries ──

    fn task(&self, execution_id: &str) -> Result<Option<Task>>;
    fn external_task(&self, execution_id: &str) -> Result<Option<ExternalTask>>;
    fn event_subscription(
        &self,
        event_type: EventType,
        execution_id: &str,
    ) -> Result<Option<EventSubscription>>;

    /// Pending timer jobs of one process instance, in creation order.
    fn timer_jobs(&self, process_instance_id: &str) -> Result<Vec<TimerJob>>;

    // ── Mutations ──

    fn complete_task(&self, task_id: &str, variables: Variables) -> Result<()>;
    fn complete_external_task(&self, external_task_id: &str, variables: Variables) -> Result<()>;
    fn handle_bpmn_error(
        &self,
        external_task_id: &str,
        error_code: &str,
        variables: Variables,
    ) -> Result<()>;

    /// Correlate a message to the subscription `message_name` held by `execution_id`.
    fn message_event_received(
        &self,
        message_name: &str,
        execution_id: &str,
        variables: Variables,
    ) -> Result<()>;

    /// Deliver signal `signal_name` to the subscription held by `execution_id`.
    fn signal_event_received(
        &self,
        signal_name: &str,
        execution_id: &str,
        variables: Variables,
    ) -> Result<()>;

    /// Resume a waiting execution without any subscription.
    fn signal(&self, execution_id: &str, variables: Variables) -> Result<()>;

    /// Fire a timer job regardless of its due date.
    fn execute_job(&self, job_id: &str) -> Result<()>;

    // ── Virtual clock ──

    fn current_time(&self) -> Result<Instant>;
    fn set_current_time(&self, at: Instant) -> Result<()>;
}
