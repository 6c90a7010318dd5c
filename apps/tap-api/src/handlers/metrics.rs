//! 抓包指标快照。
//!
//! - GET /metrics

use crate::utils::response::ok;
use api_contract::MetricsDto;
use axum::response::Response;
use tap_telemetry::metrics;

pub async fn get_metrics() -> Response {
    let snapshot = metrics().snapshot();
    ok(MetricsDto {
        arrivals: snapshot.arrivals,
        captured: snapshot.captured,
        dropped_paused: snapshot.dropped_paused,
        adapter_errors: snapshot.adapter_errors,
        decode_degraded: snapshot.decode_degraded,
        evicted: snapshot.evicted,
        cleared: snapshot.cleared,
    })
}
