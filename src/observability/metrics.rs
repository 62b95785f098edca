//! Metrics collection.
//!
//! # Metrics
//! - `dispatch_compiled_groups_total` (counter): handler groups compiled
//! - `dispatch_group_cache_hits_total` (counter): group fragments reused
//! - `dispatch_requests_total` (counter): requests by `outcome`
//!   (`matched`, `not_found`)
//! - `dispatch_controlled_errors_total` (counter): controlled errors by
//!   `handled` (`true`, `false`)

pub fn record_group_compiled() {
    ::metrics::counter!("dispatch_compiled_groups_total").increment(1);
}

pub fn record_group_cache_hit() {
    ::metrics::counter!("dispatch_group_cache_hits_total").increment(1);
}

pub fn record_request(outcome: &'static str) {
    ::metrics::counter!("dispatch_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_controlled_error(handled: bool) {
    let handled = if handled { "true" } else { "false" };
    ::metrics::counter!("dispatch_controlled_errors_total", "handled" => handled).increment(1);
}
