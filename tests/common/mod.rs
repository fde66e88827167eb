//! Shared fixtures for the scenario integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Once};

use bpmn_scenario::memory::MemoryEngine;
use chrono::{DateTime, TimeZone, Utc};

pub const ORDER: &str = include_str!("../models/order.yaml");
pub const CLAIM: &str = include_str!("../models/claim.yaml");
pub const DOCUMENT_REQUEST: &str = include_str!("../models/document_request.yaml");
pub const APPLICATION: &str = include_str!("../models/application.yaml");
pub const SHIPMENT: &str = include_str!("../models/shipment.yaml");
pub const REVIEW: &str = include_str!("../models/review.yaml");

static TRACING: Once = Once::new();

/// Route engine and runner logs to the test output. Honors `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
}

/// Memory engine at `t0()` with the given models deployed.
pub fn engine(models: &[&str]) -> Arc<MemoryEngine> {
    init_tracing();
    let engine = MemoryEngine::starting_at(t0());
    for yaml in models {
        engine.deploy_yaml(yaml).expect("model deploys");
    }
    Arc::new(engine)
}
