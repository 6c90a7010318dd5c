//! 追踪、请求 ID 与抓包计数指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 抓包指标快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub arrivals: u64,
    pub captured: u64,
    pub dropped_paused: u64,
    pub adapter_errors: u64,
    pub decode_degraded: u64,
    pub evicted: u64,
    pub cleared: u64,
}

/// 进程级抓包指标。
pub struct TelemetryMetrics {
    arrivals: AtomicU64,
    captured: AtomicU64,
    dropped_paused: AtomicU64,
    adapter_errors: AtomicU64,
    decode_degraded: AtomicU64,
    evicted: AtomicU64,
    cleared: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            arrivals: AtomicU64::new(0),
            captured: AtomicU64::new(0),
            dropped_paused: AtomicU64::new(0),
            adapter_errors: AtomicU64::new(0),
            decode_degraded: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            cleared: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            arrivals: self.arrivals.load(Ordering::Relaxed),
            captured: self.captured.load(Ordering::Relaxed),
            dropped_paused: self.dropped_paused.load(Ordering::Relaxed),
            adapter_errors: self.adapter_errors.load(Ordering::Relaxed),
            decode_degraded: self.decode_degraded.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            cleared: self.cleared.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录采集源到达次数（含暂停期间被丢弃的到达）。
pub fn record_arrival() {
    metrics().arrivals.fetch_add(1, Ordering::Relaxed);
}

/// 记录写入抓包缓冲的事件数。
pub fn record_captured() {
    metrics().captured.fetch_add(1, Ordering::Relaxed);
}

/// 记录暂停期间丢弃的到达数。
pub fn record_dropped_paused() {
    metrics().dropped_paused.fetch_add(1, Ordering::Relaxed);
}

/// 记录采集源错误次数。
pub fn record_adapter_error() {
    metrics().adapter_errors.fetch_add(1, Ordering::Relaxed);
}

/// 记录降级解码次数（畸形输入仍产出 TapEvent）。
pub fn record_decode_degraded() {
    metrics().decode_degraded.fetch_add(1, Ordering::Relaxed);
}

/// 记录因容量上限被淘汰的事件数。
pub fn record_evicted() {
    metrics().evicted.fetch_add(1, Ordering::Relaxed);
}

/// 记录清空缓冲次数。
pub fn record_cleared() {
    metrics().cleared.fetch_add(1, Ordering::Relaxed);
}
