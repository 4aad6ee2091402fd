use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter,
    register_int_counter_vec, CounterVec, Encoder, HistogramVec, IntCounter, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    // Command metrics
    pub static ref COMMAND_COUNTER: CounterVec = register_counter_vec!(
        "ticketing_commands_total",
        "Total number of booking and event commands processed",
        &["command", "status"]
    )
    .expect("metric cannot be created");

    pub static ref COMMAND_DURATION: HistogramVec = register_histogram_vec!(
        "ticketing_command_duration_seconds",
        "Command processing duration in seconds",
        &["command"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("metric cannot be created");

    // Query metrics
    pub static ref QUERY_COUNTER: CounterVec = register_counter_vec!(
        "ticketing_queries_total",
        "Total number of queries processed",
        &["query", "status"]
    )
    .expect("metric cannot be created");

    pub static ref QUERY_DURATION: HistogramVec = register_histogram_vec!(
        "ticketing_query_duration_seconds",
        "Query processing duration in seconds",
        &["query"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("metric cannot be created");

    // Inventory metrics
    pub static ref TICKET_COUNTER: IntCounterVec = register_int_counter_vec!(
        "ticketing_tickets_total",
        "Tickets moved in or out of event inventory",
        &["operation"]
    )
    .expect("metric cannot be created");

    pub static ref INVENTORY_REJECTIONS: IntCounterVec = register_int_counter_vec!(
        "ticketing_inventory_rejections_total",
        "Reservations refused by the inventory store",
        &["reason"]
    )
    .expect("metric cannot be created");

    // Compensation metrics
    pub static ref COMPENSATION_COUNTER: IntCounterVec = register_int_counter_vec!(
        "ticketing_compensations_total",
        "Inventory releases run to undo a failed booking step",
        &["operation", "outcome"]
    )
    .expect("metric cannot be created");

    pub static ref PARTIAL_CANCELLATIONS: IntCounter = register_int_counter!(
        "ticketing_partial_cancellations_total",
        "Cancellations whose inventory release did not commit"
    )
    .expect("metric cannot be created");

    // Idempotency metrics
    pub static ref IDEMPOTENCY_CHECK: IntCounterVec = register_int_counter_vec!(
        "ticketing_idempotency_checks_total",
        "Total number of idempotency checks",
        &["status"]
    )
    .expect("metric cannot be created");
}

/// Get all metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Helper function to record command execution
pub fn record_command(command: &str, success: bool, duration_secs: f64) {
    let status = if success { "success" } else { "error" };
    COMMAND_COUNTER.with_label_values(&[command, status]).inc();
    COMMAND_DURATION
        .with_label_values(&[command])
        .observe(duration_secs);
}

/// Helper function to record query execution
pub fn record_query(query: &str, success: bool, duration_secs: f64) {
    let status = if success { "success" } else { "error" };
    QUERY_COUNTER.with_label_values(&[query, status]).inc();
    QUERY_DURATION
        .with_label_values(&[query])
        .observe(duration_secs);
}

pub fn record_tickets_reserved(count: u32) {
    TICKET_COUNTER
        .with_label_values(&["reserved"])
        .inc_by(u64::from(count));
}

pub fn record_tickets_released(count: u32) {
    TICKET_COUNTER
        .with_label_values(&["released"])
        .inc_by(u64::from(count));
}

/// `reason` is the error kind, e.g. `INSUFFICIENT_INVENTORY`
pub fn record_inventory_rejection(reason: &str) {
    INVENTORY_REJECTIONS.with_label_values(&[reason]).inc();
}

pub fn record_compensation(operation: &str, success: bool) {
    let outcome = if success { "released" } else { "failed" };
    COMPENSATION_COUNTER
        .with_label_values(&[operation, outcome])
        .inc();
}

pub fn record_partial_cancellation() {
    PARTIAL_CANCELLATIONS.inc();
}

/// Helper function to record idempotency check
pub fn record_idempotency_check(status: &str) {
    IDEMPOTENCY_CHECK.with_label_values(&[status]).inc();
}
