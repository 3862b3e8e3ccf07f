//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use testbus::{HandlerPipeline, TestingBus, TestingOptions, VirtualClock};
use tracing_subscriber::EnvFilter;

/// Route test logs through the test writer. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Greeting {
    pub text: String,
}

impl Greeting {
    pub fn new(text: &str) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub order_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipOrder {
    pub order_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Numbered {
    pub n: u32,
}

/// A fixed starting instant, so timestamps in assertions are stable.
pub fn clock() -> VirtualClock {
    VirtualClock::at(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap())
}

/// A testing bus on a virtual clock with default options.
pub fn bus_with(pipeline: HandlerPipeline) -> (VirtualClock, TestingBus) {
    bus_with_options(pipeline, TestingOptions::default())
}

pub fn bus_with_options(pipeline: HandlerPipeline, options: TestingOptions) -> (VirtualClock, TestingBus) {
    init_tracing();
    let clock = clock();
    let bus = TestingBus::builder()
        .with_options(options)
        .with_clock(Arc::new(clock.clone()))
        .with_pipeline(pipeline)
        .build()
        .unwrap();
    (clock, bus)
}
