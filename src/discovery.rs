use crate::engine::ProcessEngine;
use crate::error::Result;
use crate::outcome::OutcomeRecord;
use crate::scenario::Scenario;
use crate::types::HistoricActivityInstance;
use crate::waitstate::Waitstate;
use std::collections::HashSet;
use tracing::debug;

/// Result of one discovery pass over one process instance.
#[derive(Debug, Default)]
pub struct Discovered {
    /// Waitstates not yet executed in this run, in discovery order: history
    /// rows in start order, then timer jobs in creation order.
    pub waitstates: Vec<Waitstate>,
    /// Already executed in this run but still blocking (entered call
    /// activities, or a resume the engine did not honour).
    pub executed: Vec<Waitstate>,
    /// Number of blocked points found, executed or not.
    pub present: usize,
}

impl Discovered {
    /// Nothing blocks the instance any more.
    pub fn is_exhausted(&self) -> bool {
        self.present == 0
    }
}

/// Find every point `process_instance_id` is currently blocked on.
///
/// Always starts from the engine's current state. Results are deduplicated
/// by waitstate identity, and the outcome record is brought up to date
/// (started / canceled / pass-through rows) as a side effect.
pub fn discover(
    engine: &dyn ProcessEngine,
    scenario: &Scenario,
    process_instance_id: &str,
    outcome: &mut OutcomeRecord,
) -> Result<Discovered> {
    let rows = engine.historic_activity_instances(process_instance_id)?;
    outcome.ingest_history(scenario.name(), &rows);

    let mut found: Vec<Waitstate> = rows
        .iter()
        .filter_map(|row| {
            let duration = scenario.wait_duration(&row.activity_id).map(str::to_string);
            Waitstate::from_history(row.clone(), duration)
        })
        .collect();

    for job in engine.timer_jobs(process_instance_id)? {
        let row = timer_row(&rows, &job.activity_id, &job.execution_id).cloned();
        found.push(Waitstate::from_timer(job, row));
    }

    let mut identities = HashSet::new();
    found.retain(|ws| identities.insert(ws.identity()));

    let present: HashSet<String> = found.iter().map(|ws| ws.key().to_string()).collect();
    outcome.reconcile(engine, process_instance_id, &present)?;
    for ws in &found {
        outcome.observe(scenario.name(), ws);
    }

    let total = found.len();
    let (executed, found): (Vec<_>, Vec<_>) =
        found.into_iter().partition(|ws| outcome.is_executed(ws.key()));

    debug!(
        process_instance_id,
        scenario = scenario.name(),
        present = total,
        pending = found.len(),
        "discovery pass"
    );

    Ok(Discovered {
        waitstates: found,
        executed,
        present: total,
    })
}

/// The unfinished intermediate-timer row a job belongs to, if any.
fn timer_row<'a>(
    rows: &'a [HistoricActivityInstance],
    activity_id: &str,
    execution_id: &str,
) -> Option<&'a HistoricActivityInstance> {
    rows.iter().find(|r| {
        !r.is_finished()
            && r.activity_type == crate::types::ActivityType::IntermediateTimer
            && r.activity_id == activity_id
            && r.execution_id == execution_id
    })
}
