//! Client-side counters
//!
//! - `medkit_client_requests_total` (counter): label `status`
//! - `medkit_client_token_refresh_total` (counter): label `outcome`
//!
//! No-ops unless the embedding binary installs a `metrics` recorder.

pub fn record_response(status: u16) {
    metrics::counter!("medkit_client_requests_total", "status" => status.to_string()).increment(1);
}

pub fn record_refresh(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!("medkit_client_token_refresh_total", "outcome" => outcome).increment(1);
}
