use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec, TextEncoder,
};

use crate::{Error, Result};

lazy_static! {
    pub static ref NOTIFICATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "triggernotify_notifications_total",
        "Total number of notifications assembled, by channel.",
        &["channel"]
    )
    .expect("notifications counter registers once");
    pub static ref ALERTS_SUPPRESSED_TOTAL: IntCounter = register_int_counter!(
        "triggernotify_alerts_suppressed_total",
        "Total number of firings suppressed by an existing alert record."
    )
    .expect("suppressed counter registers once");
    pub static ref EVENTS_UNPROCESSABLE_TOTAL: IntCounter = register_int_counter!(
        "triggernotify_events_unprocessable_total",
        "Total number of events skipped for an unsupported type or a missing entity."
    )
    .expect("unprocessable counter registers once");
    pub static ref TICKETS_FILED_TOTAL: IntCounter = register_int_counter!(
        "triggernotify_tickets_filed_total",
        "Total number of tickets created in the issue tracker."
    )
    .expect("tickets counter registers once");
}

/// Register every counter up front so scrapes see them before first use.
pub fn register_metrics() {
    lazy_static::initialize(&NOTIFICATIONS_TOTAL);
    lazy_static::initialize(&ALERTS_SUPPRESSED_TOTAL);
    lazy_static::initialize(&EVENTS_UNPROCESSABLE_TOTAL);
    lazy_static::initialize(&TICKETS_FILED_TOTAL);
}

// Gather every registered metric in the Prometheus text format
pub fn gather_metrics() -> Result<String> {
    register_metrics();
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| Error::Internal(format!("metrics are not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gathered_metrics_include_counters() {
        TICKETS_FILED_TOTAL.inc();
        NOTIFICATIONS_TOTAL.with_label_values(&["email"]).inc();
        let text = gather_metrics().unwrap();
        assert!(text.contains("triggernotify_tickets_filed_total"));
        assert!(text.contains("triggernotify_notifications_total{channel=\"email\"}"));
    }
}
