use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

pub static TX_REJECTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "meridian_tx_rejections_total",
        "Transactions rejected by the admission pipeline",
        &["stage", "reason"]
    )
    .expect("register meridian_tx_rejections_total")
});

pub static SIGNATURE_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "meridian_signature_failures_total",
        "Signature envelopes that failed verification or recovery",
        &["scheme"]
    )
    .expect("register meridian_signature_failures_total")
});

pub static SEQUENCE_MISMATCHES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "meridian_sequence_mismatches_total",
        "Transactions rejected for a stale or repeated sequence number"
    )
    .expect("register meridian_sequence_mismatches_total")
});
