//! In-memory process engine
//!
//! A small, synchronous [`ProcessEngine`] for processes authored as YAML
//! node graphs (see [`definition`]). It keeps full activity history, pending
//! user tasks, external tasks, event subscriptions and timer jobs, and owns a
//! virtual clock that only moves when told to.
//!
//! Supported elements: start and (terminate) end events, user, service, send
//! and receive tasks, message/signal/timer intermediate catch events,
//! interrupting and non-interrupting boundary timers, boundary error events,
//! call activities, exclusive and parallel gateways.

pub mod definition;
mod state;

use crate::engine::ProcessEngine;
use crate::types::*;
use anyhow::{anyhow, Result};
use chrono::{TimeZone, Utc};
use definition::{parse_process_yaml, ProcessDefinitionDto};
use state::EngineState;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory `ProcessEngine` for tests and local runs.
pub struct MemoryEngine {
    inner: RwLock<EngineState>,
}

impl MemoryEngine {
    /// Clock starts at 2024-01-01T00:00:00Z.
    pub fn new() -> Self {
        Self::starting_at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default())
    }

    pub fn starting_at(now: Instant) -> Self {
        Self {
            inner: RwLock::new(EngineState::new(now)),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, EngineState>> {
        self.inner.read().map_err(|e| anyhow!("Lock: {}", e))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, EngineState>> {
        self.inner.write().map_err(|e| anyhow!("Lock: {}", e))
    }

    // ── Deployment ──

    /// Deploy a definition as the next version of its key. Returns the
    /// process-definition id (`key:version`).
    pub fn deploy(&self, dto: ProcessDefinitionDto) -> Result<String> {
        self.write()?.deploy(dto)
    }

    pub fn deploy_yaml(&self, yaml: &str) -> Result<String> {
        self.deploy(parse_process_yaml(yaml)?)
    }

    // ── Extras outside the engine contract ──

    /// Correlate a message to whichever execution subscribed to it first.
    pub fn correlate_message(&self, message_name: &str, variables: Variables) -> Result<()> {
        self.write()?.correlate_message(message_name, variables)
    }

    /// Current variables of a process instance.
    pub fn variables(&self, process_instance_id: &str) -> Result<Variables> {
        self.read()?
            .instance(process_instance_id)
            .map(|i| i.variables.clone())
            .ok_or_else(|| anyhow!("Unknown process instance '{process_instance_id}'"))
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessEngine for MemoryEngine {
    fn process_instance(&self, id: &str) -> Result<Option<ProcessInstanceInfo>> {
        Ok(self.read()?.instance(id).map(|i| i.info.clone()))
    }

    fn start_process_instance_by_key(&self, key: &str, variables: Variables) -> Result<String> {
        self.write()?.start_instance(key, variables)
    }

    fn historic_activity_instances(
        &self,
        process_instance_id: &str,
    ) -> Result<Vec<HistoricActivityInstance>> {
        Ok(self
            .read()?
            .history()
            .iter()
            .filter(|r| r.process_instance_id == process_instance_id)
            .cloned()
            .collect())
    }

    fn historic_activity_instance(&self, id: &str) -> Result<Option<HistoricActivityInstance>> {
        Ok(self.read()?.history().iter().find(|r| r.id == id).cloned())
    }

    fn task(&self, execution_id: &str) -> Result<Option<Task>> {
        Ok(self
            .read()?
            .tasks()
            .iter()
            .find(|t| t.execution_id == execution_id)
            .cloned())
    }

    fn external_task(&self, execution_id: &str) -> Result<Option<ExternalTask>> {
        Ok(self
            .read()?
            .external_tasks()
            .iter()
            .find(|t| t.execution_id == execution_id)
            .cloned())
    }

    fn event_subscription(
        &self,
        event_type: EventType,
        execution_id: &str,
    ) -> Result<Option<EventSubscription>> {
        Ok(self
            .read()?
            .subscriptions()
            .iter()
            .find(|s| s.event_type == event_type && s.execution_id == execution_id)
            .cloned())
    }

    fn timer_jobs(&self, process_instance_id: &str) -> Result<Vec<TimerJob>> {
        Ok(self
            .read()?
            .jobs()
            .iter()
            .filter(|j| j.job.process_instance_id == process_instance_id)
            .map(|j| j.job.clone())
            .collect())
    }

    fn complete_task(&self, task_id: &str, variables: Variables) -> Result<()> {
        self.write()?.complete_task(task_id, variables)
    }

    fn complete_external_task(&self, external_task_id: &str, variables: Variables) -> Result<()> {
        self.write()?
            .complete_external_task(external_task_id, variables)
    }

    fn handle_bpmn_error(
        &self,
        external_task_id: &str,
        error_code: &str,
        variables: Variables,
    ) -> Result<()> {
        self.write()?
            .handle_bpmn_error(external_task_id, error_code, variables)
    }

    fn message_event_received(
        &self,
        message_name: &str,
        execution_id: &str,
        variables: Variables,
    ) -> Result<()> {
        self.write()?
            .event_received(EventType::Message, message_name, execution_id, variables)
    }

    fn signal_event_received(
        &self,
        signal_name: &str,
        execution_id: &str,
        variables: Variables,
    ) -> Result<()> {
        self.write()?
            .event_received(EventType::Signal, signal_name, execution_id, variables)
    }

    fn signal(&self, execution_id: &str, variables: Variables) -> Result<()> {
        self.write()?.leave(execution_id, variables)
    }

    fn execute_job(&self, job_id: &str) -> Result<()> {
        self.write()?.execute_job(job_id)
    }

    fn current_time(&self) -> Result<Instant> {
        Ok(self.read()?.now)
    }

    fn set_current_time(&self, at: Instant) -> Result<()> {
        self.write()?.now = at;
        Ok(())
    }
}
