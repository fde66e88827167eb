//! Message and signal catch events, receive tasks without a subscription,
//! intermediate timers and BPMN errors thrown from external tasks.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use bpmn_scenario::delegate::ExternalTaskDelegate;
use bpmn_scenario::types::EventType;
use bpmn_scenario::{variables, Scenario, ScenarioError, ScenarioRunner, Variables};
use chrono::Duration;
use common::{engine, t0, SHIPMENT};

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

fn shipment(log: Rc<RefCell<Vec<String>>>, ship: fn(&mut ExternalTaskDelegate<'_>)) -> Scenario {
    let payment = log.clone();
    let warehouse = log.clone();
    let check = log.clone();
    let call = log.clone();
    let mail = log;
    Scenario::new("shipment")
        .acts_on_message_intermediate_catch_event("MessageCatchPaymentReceived", move |event| {
            assert_eq!(event.event_type(), EventType::Message);
            assert_eq!(event.event_name(), "PAYMENT_RECEIVED");
            payment.borrow_mut().push(event.activity_id().to_string());
            event.receive_with(variables([("paid", true)]));
            Ok(())
        })
        .acts_on_signal_intermediate_catch_event("SignalCatchWarehouseOpen", move |event| {
            assert_eq!(event.event_type(), EventType::Signal);
            assert_eq!(event.event_name(), "WAREHOUSE_OPEN");
            warehouse.borrow_mut().push(event.activity_id().to_string());
            event.receive();
            Ok(())
        })
        .acts_on_receive_task("ReceiveTaskManualCheck", move |task| {
            // No message on this receive task.
            assert!(task.subscription().is_none());
            assert!(matches!(
                task.event_name(),
                Err(ScenarioError::UnsupportedOperation(_))
            ));
            check.borrow_mut().push(task.activity_id().to_string());
            task.receive_with(variables([("checked_by", "qa")]));
            Ok(())
        })
        .acts_on_service_task("ServiceTaskShipGoods", move |job| {
            ship(job);
            Ok(())
        })
        .acts_on_user_task("UserTaskCallCustomer", move |task| {
            call.borrow_mut().push(task.activity_id().to_string());
            Ok(())
        })
        .acts_on_send_task("SendTaskApologyMail", move |job| {
            mail.borrow_mut().push(job.activity_id().to_string());
            Ok(())
        })
}

fn ship_ok(job: &mut ExternalTaskDelegate<'_>) {
    job.complete();
}

fn out_of_stock(job: &mut ExternalTaskDelegate<'_>) {
    job.handle_bpmn_error("OUT_OF_STOCK");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn test_events_receive_task_and_timer() {
    let engine = engine(&[SHIPMENT]);
    let log = Rc::new(RefCell::new(Vec::new()));
    let scenario = shipment(log.clone(), ship_ok);

    let report = ScenarioRunner::new(engine.clone(), &scenario)
        .start_by_key("shipment", Variables::new())
        .unwrap();

    // Both branches due at once: discovery order decides.
    assert_eq!(
        *log.borrow(),
        vec![
            "MessageCatchPaymentReceived",
            "SignalCatchWarehouseOpen",
            "ReceiveTaskManualCheck",
        ]
    );

    let outcome = &report.outcome;
    assert!(outcome.has_completed("GatewayPreconditionsMet"));
    assert!(outcome.has_completed("TimerCatchCoolingOff"));
    assert!(outcome.has_completed("ServiceTaskShipGoods"));
    assert!(outcome.has_completed("EndEventShipped"));
    assert!(!outcome.has_started("GatewayApologyChannel"));

    // The intermediate timer was the only thing that moved the clock.
    assert_eq!(report.clock_advances, 1);
    assert_eq!(report.finished_at, t0() + Duration::hours(2));

    let vars = engine.variables(&report.process_instance_id).unwrap();
    assert_eq!(vars.get("paid"), Some(&serde_json::json!(true)));
    assert_eq!(vars.get("checked_by"), Some(&serde_json::json!("qa")));
}

#[test]
fn test_bpmn_error_routes_to_boundary() {
    let engine = engine(&[SHIPMENT]);
    let log = Rc::new(RefCell::new(Vec::new()));
    let scenario = shipment(log.clone(), out_of_stock);

    let report = ScenarioRunner::new(engine, &scenario)
        .start_by_key("shipment", Variables::new())
        .unwrap();

    let outcome = &report.outcome;
    assert!(outcome.has_finished("ServiceTaskShipGoods"));
    assert!(outcome.has_completed("BoundaryErrorOutOfStock"));
    assert!(outcome.has_completed("GatewayApologyChannel"));
    assert!(!outcome.has_started("EndEventShipped"));
    assert!(outcome.has_completed("EndEventCustomerInformed"));
    // Not a VIP: default flow to the apology mail.
    assert_eq!(log.borrow().last().map(String::as_str), Some("SendTaskApologyMail"));
    assert!(!outcome.has_started("UserTaskCallCustomer"));
}

#[test]
fn test_bpmn_error_takes_conditional_flow() {
    let engine = engine(&[SHIPMENT]);
    let log = Rc::new(RefCell::new(Vec::new()));
    let scenario = shipment(log.clone(), out_of_stock);

    let report = ScenarioRunner::new(engine, &scenario)
        .start_by_key("shipment", variables([("vip", true)]))
        .unwrap();

    assert!(report.outcome.has_completed("UserTaskCallCustomer"));
    assert!(!report.outcome.has_started("SendTaskApologyMail"));
}

#[test]
fn test_uncaught_bpmn_error_surfaces_engine_error() {
    let engine = engine(&[SHIPMENT]);
    let log = Rc::new(RefCell::new(Vec::new()));
    let scenario = shipment(log, |job| job.handle_bpmn_error("CARRIER_STRIKE"));

    let err = ScenarioRunner::new(engine, &scenario)
        .start_by_key("shipment", Variables::new())
        .unwrap_err();

    assert!(matches!(err, ScenarioError::Engine(_)));
    assert!(err.to_string().contains("CARRIER_STRIKE"));
}
