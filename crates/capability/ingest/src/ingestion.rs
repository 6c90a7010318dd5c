//! 采集循环与运行状态机
//!
//! ```text
//!            pause()            stop()
//! RUNNING ───────────► PAUSED ─────────► STOPPED
//!    ▲                   │                  ▲
//!    └──── resume() ─────┘                  │
//!    └──────────────────── stop() ──────────┘
//! ```
//!
//! 解码与写入缓冲都在状态锁内完成，`stop()` 拿到同一把锁后才置为 STOPPED，
//! 因此 `stop()` 返回之后不会再有任何写入。

use crate::{ArrivalSource, IngestError};
use domain::{ProtocolFamily, RawSourceEvent};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use tap_capture::CaptureBuffer;
use tap_decode::Decoder;
use tap_inspect::Selection;
use tap_telemetry::{
    record_adapter_error, record_arrival, record_captured, record_dropped_paused, record_evicted,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 采集循环运行状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Running,
    Paused,
    Stopped,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Running => "RUNNING",
            RunState::Paused => "PAUSED",
            RunState::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 循环计数快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopCounters {
    pub captured: u64,
    pub dropped_while_paused: u64,
    pub adapter_errors: u64,
    /// 最近一次写入缓冲的时间；从未写入时为 None。
    pub last_capture_ms: Option<i64>,
}

/// 运行状态 + 取消令牌 + 计数。
pub struct LoopControl {
    state: Mutex<RunState>,
    cancel: CancellationToken,
    captured: AtomicU64,
    dropped_while_paused: AtomicU64,
    adapter_errors: AtomicU64,
    last_capture_ms: AtomicI64,
}

impl LoopControl {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RunState::Running),
            cancel: CancellationToken::new(),
            captured: AtomicU64::new(0),
            dropped_while_paused: AtomicU64::new(0),
            adapter_errors: AtomicU64::new(0),
            last_capture_ms: AtomicI64::new(0),
        }
    }

    pub fn state(&self) -> RunState {
        *self.state.lock()
    }

    pub fn pause(&self) -> Result<(), IngestError> {
        self.transition("pause", |from| {
            (from == RunState::Running).then_some(RunState::Paused)
        })
    }

    pub fn resume(&self) -> Result<(), IngestError> {
        self.transition("resume", |from| {
            (from == RunState::Paused).then_some(RunState::Running)
        })
    }

    /// 停止循环。返回时循环已不可能再写入缓冲。
    pub fn stop(&self) -> Result<(), IngestError> {
        self.transition("stop", |from| {
            (from != RunState::Stopped).then_some(RunState::Stopped)
        })?;
        self.cancel.cancel();
        Ok(())
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn counters(&self) -> LoopCounters {
        let last = self.last_capture_ms.load(Ordering::Acquire);
        LoopCounters {
            captured: self.captured.load(Ordering::Relaxed),
            dropped_while_paused: self.dropped_while_paused.load(Ordering::Relaxed),
            adapter_errors: self.adapter_errors.load(Ordering::Relaxed),
            last_capture_ms: (last > 0).then_some(last),
        }
    }

    fn transition(
        &self,
        action: &'static str,
        next: impl FnOnce(RunState) -> Option<RunState>,
    ) -> Result<(), IngestError> {
        let mut state = self.state.lock();
        let from = *state;
        let to = next(from).ok_or(IngestError::InvalidTransition { from, action })?;
        *state = to;
        info!(target: "tap.ingest", from = %from, to = %to, "run_state_changed");
        Ok(())
    }
}

impl Default for LoopControl {
    fn default() -> Self {
        Self::new()
    }
}

/// 单次到达的处理结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArrivalOutcome {
    Captured(u64),
    DroppedPaused,
    Discarded,
}

/// 采集循环：独占采集源，逐个处理到达。
pub(crate) struct IngestionLoop {
    pub(crate) control: Arc<LoopControl>,
    pub(crate) decoder: Arc<Decoder>,
    pub(crate) protocol: ProtocolFamily,
    pub(crate) buffer: Arc<CaptureBuffer>,
    pub(crate) selection: Arc<Mutex<Selection>>,
}

impl IngestionLoop {
    pub(crate) async fn run(self, mut source: Box<dyn ArrivalSource>) {
        let cancel = self.control.cancellation_token();
        info!(target: "tap.ingest", protocol = %self.protocol, "ingestion_loop_started");
        loop {
            let arrival = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                arrival = source.next_arrival() => arrival,
            };
            match arrival {
                Ok(raw) => {
                    self.on_arrival(raw);
                }
                Err(IngestError::Exhausted) => {
                    info!(target: "tap.ingest", "source_exhausted");
                    cancel.cancelled().await;
                    break;
                }
                Err(err) => {
                    self.control.adapter_errors.fetch_add(1, Ordering::Relaxed);
                    record_adapter_error();
                    warn!(target: "tap.ingest", error = %err, "source_error");
                }
            }
        }
        info!(target: "tap.ingest", "ingestion_loop_stopped");
    }

    /// 同步处理一次到达；状态锁只在这里持有，不跨越 await。
    pub(crate) fn on_arrival(&self, raw: RawSourceEvent) -> ArrivalOutcome {
        record_arrival();
        let state = self.control.state.lock();
        match *state {
            RunState::Running => {
                let event = Arc::new(self.decoder.decode(&raw, self.protocol));
                let sequence_id = event.sequence_id;
                let captured_at_ms = event.captured_at_ms;
                let outcome = self.buffer.push(event);
                self.control.captured.fetch_add(1, Ordering::Relaxed);
                self.control
                    .last_capture_ms
                    .store(captured_at_ms.max(1), Ordering::Release);
                record_captured();
                if let Some(evicted) = outcome.evicted {
                    record_evicted();
                    self.selection.lock().on_evicted(evicted.sequence_id);
                }
                debug!(target: "tap.ingest", sequence_id, "event_captured");
                ArrivalOutcome::Captured(sequence_id)
            }
            RunState::Paused => {
                self.control
                    .dropped_while_paused
                    .fetch_add(1, Ordering::Relaxed);
                record_dropped_paused();
                ArrivalOutcome::DroppedPaused
            }
            RunState::Stopped => ArrivalOutcome::Discarded,
        }
    }
}
