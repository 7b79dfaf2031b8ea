#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};

pub const T0_MS: i64 = 1_767_225_600_000;

pub fn fixed_now() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(T0_MS).unwrap()
}

pub fn init_test_logging() {
    let _ = lingo_adaptive_core::logging::init_tracing("debug");
}
