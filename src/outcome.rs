//! Outcome tracking
//!
//! Append-only log of which activities started, completed or were canceled
//! during a run, scoped by scenario. The drive loop feeds it after every
//! discovery pass and every execution; tests read it afterwards.

use crate::engine::ProcessEngine;
use crate::error::Result;
use crate::types::HistoricActivityInstance;
use crate::waitstate::{Waitstate, WaitstateKind};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Started,
    Completed,
    Canceled,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OutcomeEntry {
    pub scenario: String,
    pub process_instance_id: String,
    pub activity_id: String,
    pub phase: Phase,
}

/// A waitstate observed but not yet resolved.
#[derive(Debug)]
struct Pending {
    key: String,
    historic_id: String,
    scenario: String,
    process_instance_id: String,
    activity_id: String,
    /// Call activity whose called instance is being driven.
    entered: bool,
}

#[derive(Debug, Default)]
pub struct OutcomeRecord {
    entries: Vec<OutcomeEntry>,
    pending: Vec<Pending>,
    executed: HashSet<String>,
    seen_rows: HashSet<String>,
    finished_rows: HashSet<String>,
}

impl OutcomeRecord {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Recording (drive loop only) ──

    /// Record pass-through activities (events, gateways) straight from
    /// history. Waitstate rows are tracked through `observe` instead.
    pub(crate) fn ingest_history(&mut self, scenario: &str, rows: &[HistoricActivityInstance]) {
        for row in rows.iter().filter(|r| !r.activity_type.is_waitstate()) {
            if self.seen_rows.insert(row.id.clone()) {
                self.push(scenario, &row.process_instance_id, &row.activity_id, Phase::Started);
            }
            if row.is_finished() && self.finished_rows.insert(row.id.clone()) {
                let phase = if row.canceled {
                    Phase::Canceled
                } else {
                    Phase::Completed
                };
                self.push(scenario, &row.process_instance_id, &row.activity_id, phase);
            }
        }
    }

    /// First sighting of a waitstate records it as started. Boundary timers
    /// only enter the log when they fire.
    pub(crate) fn observe(&mut self, scenario: &str, waitstate: &Waitstate) {
        if waitstate.kind() == WaitstateKind::TimerBoundaryEvent
            || self.executed.contains(waitstate.key())
            || self.pending.iter().any(|p| p.key == waitstate.key())
        {
            return;
        }
        self.pending.push(Pending {
            key: waitstate.key().to_string(),
            historic_id: waitstate.historic().id.clone(),
            scenario: scenario.to_string(),
            process_instance_id: waitstate.process_instance_id().to_string(),
            activity_id: waitstate.activity_id().to_string(),
            entered: false,
        });
        self.push(
            scenario,
            waitstate.process_instance_id(),
            waitstate.activity_id(),
            Phase::Started,
        );
    }

    /// Settle pending waitstates of `process_instance_id` that are no longer
    /// present. Entered call activities count as completed when their
    /// history row finished normally; everything else vanished unresolved and
    /// is recorded as canceled.
    pub(crate) fn reconcile(
        &mut self,
        engine: &dyn ProcessEngine,
        process_instance_id: &str,
        present: &HashSet<String>,
    ) -> Result<()> {
        let (gone, kept): (Vec<Pending>, Vec<Pending>) =
            std::mem::take(&mut self.pending).into_iter().partition(|p| {
                p.process_instance_id == process_instance_id && !present.contains(&p.key)
            });
        self.pending = kept;

        for p in gone {
            let phase = if p.entered {
                match engine.historic_activity_instance(&p.historic_id)? {
                    Some(row) if row.is_finished() && !row.canceled => Phase::Completed,
                    _ => Phase::Canceled,
                }
            } else {
                Phase::Canceled
            };
            self.push(&p.scenario, &p.process_instance_id, &p.activity_id, phase);
        }
        Ok(())
    }

    /// Mark a waitstate as executed so later passes skip it. Call activities
    /// stay pending until their called instance is done.
    pub(crate) fn record_executed(&mut self, scenario: &str, waitstate: &Waitstate) {
        self.executed.insert(waitstate.key().to_string());
        let pid = waitstate.process_instance_id();
        let activity_id = waitstate.activity_id();

        match waitstate.kind() {
            WaitstateKind::CallActivity => {
                if let Some(p) = self.pending.iter_mut().find(|p| p.key == waitstate.key()) {
                    p.entered = true;
                }
            }
            WaitstateKind::TimerBoundaryEvent => {
                self.push(scenario, pid, activity_id, Phase::Started);
                self.push(scenario, pid, activity_id, Phase::Completed);
            }
            _ => {
                self.pending.retain(|p| p.key != waitstate.key());
                self.push(scenario, pid, activity_id, Phase::Completed);
            }
        }
    }

    pub(crate) fn is_executed(&self, key: &str) -> bool {
        self.executed.contains(key)
    }

    fn push(&mut self, scenario: &str, process_instance_id: &str, activity_id: &str, phase: Phase) {
        self.entries.push(OutcomeEntry {
            scenario: scenario.to_string(),
            process_instance_id: process_instance_id.to_string(),
            activity_id: activity_id.to_string(),
            phase,
        });
    }

    // ── Queries ──

    pub fn entries(&self) -> &[OutcomeEntry] {
        &self.entries
    }

    /// Restrict queries to one scenario (e.g. a called process).
    pub fn in_scenario<'a>(&'a self, scenario: &'a str) -> OutcomeView<'a> {
        OutcomeView {
            record: self,
            scenario: Some(scenario),
        }
    }

    fn all(&self) -> OutcomeView<'_> {
        OutcomeView {
            record: self,
            scenario: None,
        }
    }

    pub fn count(&self, activity_id: &str, phase: Phase) -> usize {
        self.all().count(activity_id, phase)
    }

    pub fn has_started(&self, activity_id: &str) -> bool {
        self.all().has_started(activity_id)
    }

    pub fn has_completed(&self, activity_id: &str) -> bool {
        self.all().has_completed(activity_id)
    }

    pub fn has_canceled(&self, activity_id: &str) -> bool {
        self.all().has_canceled(activity_id)
    }

    pub fn has_finished(&self, activity_id: &str) -> bool {
        self.all().has_finished(activity_id)
    }
}

/// Read-only query view over an `OutcomeRecord`.
#[derive(Clone, Copy)]
pub struct OutcomeView<'a> {
    record: &'a OutcomeRecord,
    scenario: Option<&'a str>,
}

impl OutcomeView<'_> {
    pub fn count(&self, activity_id: &str, phase: Phase) -> usize {
        self.record
            .entries
            .iter()
            .filter(|e| self.scenario.map_or(true, |s| e.scenario == s))
            .filter(|e| e.activity_id == activity_id && e.phase == phase)
            .count()
    }

    pub fn has_started(&self, activity_id: &str) -> bool {
        self.count(activity_id, Phase::Started) > 0
    }

    pub fn has_completed(&self, activity_id: &str) -> bool {
        self.count(activity_id, Phase::Completed) > 0
    }

    pub fn has_canceled(&self, activity_id: &str) -> bool {
        self.count(activity_id, Phase::Canceled) > 0
    }

    /// Completed or canceled.
    pub fn has_finished(&self, activity_id: &str) -> bool {
        self.has_completed(activity_id) || self.has_canceled(activity_id)
    }
}
