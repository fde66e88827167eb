//! Nested scenarios for call activities: scope entry and exit, recurring
//! boundary timers inside the called process, and cancellation from both
//! sides of the call.

mod common;

use std::cell::Cell;
use std::rc::Rc;

use bpmn_scenario::{
    variables, Phase, ProcessEngine, Scenario, ScenarioError, ScenarioRunner, Variables,
};
use chrono::Duration;
use common::{engine, t0, APPLICATION, DOCUMENT_REQUEST};

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

/// Documents never arrive in time: five reminders, then the customer is called.
fn slow_documents(call_after: &str) -> Scenario {
    Scenario::new("document_request")
        .acts_on_receive_task("ReceiveTaskWaitForDocuments", |task| {
            task.receive();
            Ok(())
        })
        .waits_for_action_on("ReceiveTaskWaitForDocuments", "P7D")
        .acts_on_send_task("SendTaskSendReminder", |job| {
            job.complete();
            Ok(())
        })
        .acts_on_user_task("UserTaskCallCustomer", |task| {
            task.complete_with(variables([("documents_missing", true)]));
            Ok(())
        })
        .waits_for_action_on("UserTaskCallCustomer", call_after)
}

fn application(documents: Scenario) -> Scenario {
    Scenario::new("application")
        .runs_call_activity("CallActivityDocumentRequest", documents)
        .acts_on_user_task("UserTaskDecideOnApplication", |task| {
            task.complete();
            Ok(())
        })
        .acts_on_user_task("UserTaskRejectApplication", |task| {
            task.complete();
            Ok(())
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn test_documents_arrive_before_first_reminder() {
    let engine = engine(&[APPLICATION, DOCUMENT_REQUEST]);
    let documents = Scenario::new("document_request")
        .acts_on_receive_task("ReceiveTaskWaitForDocuments", |task| {
            assert_eq!(task.event_name()?, "DOCUMENTS");
            task.receive_with(variables([("documents", 3)]));
            Ok(())
        })
        .waits_for_action_on("ReceiveTaskWaitForDocuments", "PT12H");
    let scenario = application(documents);

    let report = ScenarioRunner::new(engine.clone(), &scenario)
        .start_by_key("application", Variables::new())
        .unwrap();

    let parent = report.outcome.in_scenario("application");
    let child = report.outcome.in_scenario("document_request");
    assert!(parent.has_completed("CallActivityDocumentRequest"));
    assert!(parent.has_completed("UserTaskDecideOnApplication"));
    assert!(!parent.has_started("UserTaskRejectApplication"));
    assert!(child.has_completed("ReceiveTaskWaitForDocuments"));
    assert!(child.has_completed("EndEventDocumentsReceived"));
    assert!(!child.has_started("SendTaskSendReminder"));
    assert_eq!(report.finished_at, t0() + Duration::hours(12));

    // Variables flow back out of the called instance.
    let vars = engine.variables(&report.process_instance_id).unwrap();
    assert_eq!(vars.get("documents"), Some(&serde_json::json!(3)));
}

#[test]
fn test_recurring_reminders_then_receive_task_canceled() {
    let engine = engine(&[APPLICATION, DOCUMENT_REQUEST]);
    let scenario = application(slow_documents("PT1H"));

    let report = ScenarioRunner::new(engine.clone(), &scenario)
        .start_by_key("application", Variables::new())
        .unwrap();

    let child = report.outcome.in_scenario("document_request");
    assert_eq!(child.count("BoundaryTimerReminder", Phase::Completed), 5);
    assert_eq!(child.count("SendTaskSendReminder", Phase::Completed), 5);
    assert_eq!(child.count("EndEventReminderSent", Phase::Completed), 5);
    assert!(child.has_canceled("ReceiveTaskWaitForDocuments"));
    assert!(!child.has_completed("ReceiveTaskWaitForDocuments"));
    assert_eq!(child.count("BoundaryTimerGiveUp", Phase::Completed), 1);
    assert!(child.has_completed("UserTaskCallCustomer"));

    let parent = report.outcome.in_scenario("application");
    assert!(parent.has_completed("CallActivityDocumentRequest"));
    assert!(parent.has_completed("UserTaskDecideOnApplication"));

    assert_eq!(
        report.finished_at,
        t0() + Duration::days(6) + Duration::hours(1)
    );
    let vars = engine.variables(&report.process_instance_id).unwrap();
    assert_eq!(vars.get("documents_missing"), Some(&serde_json::json!(true)));
}

#[test]
fn test_parent_boundary_timer_cancels_called_instance() {
    let engine = engine(&[APPLICATION, DOCUMENT_REQUEST]);
    // The call to the customer would happen on day 11; the application
    // expires on day 10.
    let scenario = application(slow_documents("P5D"));

    let report = ScenarioRunner::new(engine.clone(), &scenario)
        .start_by_key("application", Variables::new())
        .unwrap();

    let parent = report.outcome.in_scenario("application");
    let child = report.outcome.in_scenario("document_request");
    assert!(parent.has_canceled("CallActivityDocumentRequest"));
    assert!(parent.has_completed("BoundaryTimerApplicationExpired"));
    assert!(parent.has_completed("UserTaskRejectApplication"));
    assert!(!parent.has_started("UserTaskDecideOnApplication"));
    assert!(child.has_started("UserTaskCallCustomer"));
    assert!(child.has_canceled("UserTaskCallCustomer"));
    assert!(!child.has_completed("UserTaskCallCustomer"));
    assert_eq!(report.finished_at, t0() + Duration::days(10));

    let rows = engine
        .historic_activity_instances(&report.process_instance_id)
        .unwrap();
    let call = rows
        .iter()
        .find(|r| r.activity_id == "CallActivityDocumentRequest")
        .unwrap();
    let called = call.called_process_instance_id.as_deref().unwrap();
    assert!(engine.process_instance(called).unwrap().unwrap().ended);
}

#[test]
fn test_called_scope_uses_its_own_bindings() {
    let engine = engine(&[APPLICATION, DOCUMENT_REQUEST]);
    let parent_calls = Rc::new(Cell::new(0));

    // The parent binds UserTaskCallCustomer too; only the child binding may run.
    let scenario = {
        let parent_calls = parent_calls.clone();
        application(slow_documents("PT1H")).acts_on_user_task(
            "UserTaskCallCustomer",
            move |_| {
                parent_calls.set(parent_calls.get() + 1);
                Ok(())
            },
        )
    };

    ScenarioRunner::new(engine, &scenario)
        .start_by_key("application", Variables::new())
        .unwrap();

    assert_eq!(parent_calls.get(), 0);
}

#[test]
fn test_unbound_call_activity_fails() {
    let engine = engine(&[APPLICATION, DOCUMENT_REQUEST]);
    let scenario = Scenario::new("application");

    let err = ScenarioRunner::new(engine, &scenario)
        .start_by_key("application", Variables::new())
        .unwrap_err();

    // The expiry timer fires first, then the reject task is unbound.
    match err {
        ScenarioError::UnmockedWaitstate { activity_id, .. } => {
            assert_eq!(activity_id, "UserTaskRejectApplication");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_unbound_waitstate_in_called_scope_waits_for_parent_timer() {
    let engine = engine(&[APPLICATION, DOCUMENT_REQUEST]);
    // Nobody calls the customer, but the application expiry is still pending.
    let documents = Scenario::new("document_request")
        .acts_on_receive_task("ReceiveTaskWaitForDocuments", |_| Ok(()))
        .waits_for_action_on("ReceiveTaskWaitForDocuments", "P7D")
        .acts_on_send_task("SendTaskSendReminder", |_| Ok(()));
    let scenario = application(documents);

    let report = ScenarioRunner::new(engine, &scenario)
        .start_by_key("application", Variables::new())
        .unwrap();

    let child = report.outcome.in_scenario("document_request");
    assert!(child.has_canceled("UserTaskCallCustomer"));
    assert!(report
        .outcome
        .in_scenario("application")
        .has_completed("UserTaskRejectApplication"));
    assert_eq!(report.finished_at, t0() + Duration::days(10));
}

#[test]
fn test_unbound_waitstate_names_its_definition() {
    let engine = engine(&[DOCUMENT_REQUEST]);
    let documents = Scenario::new("document_request")
        .acts_on_receive_task("ReceiveTaskWaitForDocuments", |_| Ok(()))
        .waits_for_action_on("ReceiveTaskWaitForDocuments", "P7D")
        .acts_on_send_task("SendTaskSendReminder", |_| Ok(()));

    let err = ScenarioRunner::new(engine, &documents)
        .start_by_key("document_request", Variables::new())
        .unwrap_err();

    match err {
        ScenarioError::UnmockedWaitstate {
            process_definition_id,
            activity_id,
            ..
        } => {
            assert_eq!(process_definition_id, "document_request:1");
            assert_eq!(activity_id, "UserTaskCallCustomer");
        }
        other => panic!("unexpected error: {other}"),
    }
}
