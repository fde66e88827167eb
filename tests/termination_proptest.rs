//! Property tests over generated sequential processes: every run terminates,
//! executes each waitstate exactly once and ends exactly at the sum of the
//! configured waits.

mod common;

use std::sync::Arc;

use bpmn_scenario::memory::definition::{EdgeDto, NodeDto, ProcessDefinitionDto};
use bpmn_scenario::memory::MemoryEngine;
use bpmn_scenario::{Phase, Scenario, ScenarioRunner, Variables};
use chrono::Duration;
use common::{init_tracing, t0};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Step {
    User,
    Service,
    Timer,
}

fn step() -> impl Strategy<Value = (Step, u32)> {
    (
        prop_oneof![Just(Step::User), Just(Step::Service), Just(Step::Timer)],
        0u32..72,
    )
}

fn edge(from: &str, to: &str) -> EdgeDto {
    EdgeDto {
        from: from.to_string(),
        to: to.to_string(),
        condition: None,
        is_default: false,
    }
}

/// `start → s0 → s1 → … → end`. Timer steps wait `hours` themselves; task
/// steps get the wait from the scenario instead.
fn build(steps: &[(Step, u32)]) -> (ProcessDefinitionDto, Scenario) {
    let mut nodes = vec![NodeDto::Start {
        id: "start".to_string(),
    }];
    let mut edges = Vec::new();
    let mut scenario = Scenario::new("generated");
    let mut previous = "start".to_string();

    for (i, (step, hours)) in steps.iter().enumerate() {
        let id = format!("s{i}");
        let wait = format!("PT{hours}H");
        match step {
            Step::User => {
                nodes.push(NodeDto::UserTask {
                    id: id.clone(),
                    name: None,
                    assignee: None,
                    candidate_groups: Vec::new(),
                });
                scenario = scenario
                    .acts_on_user_task(id.clone(), |task| {
                        task.complete();
                        Ok(())
                    })
                    .waits_for_action_on(id.clone(), wait);
            }
            Step::Service => {
                nodes.push(NodeDto::ServiceTask {
                    id: id.clone(),
                    topic: "work".to_string(),
                });
                scenario = scenario
                    .acts_on_service_task(id.clone(), |job| {
                        job.complete();
                        Ok(())
                    })
                    .waits_for_action_on(id.clone(), wait);
            }
            Step::Timer => nodes.push(NodeDto::TimerCatch {
                id: id.clone(),
                duration: wait,
            }),
        }
        edges.push(edge(&previous, &id));
        previous = id;
    }

    nodes.push(NodeDto::End {
        id: "end".to_string(),
        terminate: false,
    });
    edges.push(edge(&previous, "end"));

    let dto = ProcessDefinitionDto {
        id: "generated".to_string(),
        tenant_id: None,
        nodes,
        edges,
    };
    (dto, scenario)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_sequential_process_terminates(steps in prop::collection::vec(step(), 1..12)) {
        init_tracing();
        let (dto, scenario) = build(&steps);
        let engine = Arc::new(MemoryEngine::starting_at(t0()));
        engine.deploy(dto).unwrap();

        let report = ScenarioRunner::new(engine, &scenario)
            .start_by_key("generated", Variables::new())
            .unwrap();

        let total: i64 = steps.iter().map(|(_, hours)| i64::from(*hours)).sum();
        let waits = steps.iter().filter(|(_, hours)| *hours > 0).count();

        prop_assert_eq!(report.executed, steps.len());
        prop_assert_eq!(report.finished_at, t0() + Duration::hours(total));
        prop_assert_eq!(report.clock_advances, waits);
        for i in 0..steps.len() {
            let id = format!("s{i}");
            prop_assert_eq!(report.outcome.count(&id, Phase::Started), 1);
            prop_assert_eq!(report.outcome.count(&id, Phase::Completed), 1);
        }
        prop_assert!(report.outcome.has_completed("end"));
    }
}
