//! 抓包会话：一个采集源 + 一个缓冲 + 一个采集循环 + 一个选中状态。

use crate::ingestion::{IngestionLoop, LoopControl, RunState};
use crate::{ArrivalSource, IngestError};
use domain::{SourceDescriptor, TapEvent, now_epoch_ms};
use parking_lot::Mutex;
use std::sync::Arc;
use tap_capture::{CaptureBuffer, CaptureConfig, TapFilter};
use tap_decode::{DecodeConfig, Decoder, DirectionPolicy};
use tap_inspect::{InspectError, Inspection, Selection, inspect_in};
use tap_telemetry::record_cleared;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// 会话参数。
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub capture: CaptureConfig,
    pub decode: DecodeConfig,
    /// RUNNING 状态下超过该时长没有新事件即视为停滞
    pub stall_after_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            decode: DecodeConfig::default(),
            stall_after_ms: 5 * 800,
        }
    }
}

/// 会话统计。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub state: RunState,
    pub buffered: usize,
    pub capacity: usize,
    pub captured: u64,
    pub evicted: u64,
    pub dropped_while_paused: u64,
    pub adapter_errors: u64,
    pub next_sequence_id: u64,
    pub last_capture_ms: Option<i64>,
}

pub struct TapSession {
    descriptor: SourceDescriptor,
    control: Arc<LoopControl>,
    buffer: Arc<CaptureBuffer>,
    selection: Arc<Mutex<Selection>>,
    decoder: Arc<Decoder>,
    stall_after_ms: u64,
    opened_at_ms: i64,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TapSession {
    /// 打开会话并在当前 tokio 运行时上启动采集循环。
    pub fn open(
        descriptor: SourceDescriptor,
        config: SessionConfig,
        source: Box<dyn ArrivalSource>,
        direction: Arc<dyn DirectionPolicy>,
    ) -> Self {
        let control = Arc::new(LoopControl::new());
        let buffer = Arc::new(CaptureBuffer::with_config(config.capture));
        let selection = Arc::new(Mutex::new(Selection::new()));
        let decoder = Arc::new(Decoder::new(config.decode, direction));

        let ingestion = IngestionLoop {
            control: Arc::clone(&control),
            decoder: Arc::clone(&decoder),
            protocol: descriptor.protocol,
            buffer: Arc::clone(&buffer),
            selection: Arc::clone(&selection),
        };
        let task = tokio::spawn(ingestion.run(source));
        info!(
            target: "tap.ingest",
            source = %descriptor.name,
            protocol = %descriptor.protocol,
            capacity = buffer.capacity(),
            "tap_session_opened"
        );

        Self {
            descriptor,
            control,
            buffer,
            selection,
            decoder,
            stall_after_ms: config.stall_after_ms,
            opened_at_ms: now_epoch_ms(),
            task: Mutex::new(Some(task)),
        }
    }

    pub fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> RunState {
        self.control.state()
    }

    pub fn pause(&self) -> Result<(), IngestError> {
        self.control.pause()
    }

    pub fn resume(&self) -> Result<(), IngestError> {
        self.control.resume()
    }

    /// 停止采集；返回后缓冲不会再增长。
    pub fn stop(&self) -> Result<(), IngestError> {
        self.control.stop()
    }

    /// 停止并等待采集循环退出。可重复调用。
    pub async fn close(&self) {
        if self.control.state() != RunState::Stopped {
            let _ = self.control.stop();
        }
        let task = self.task.lock().take();
        if let Some(task) = task
            && let Err(err) = task.await
        {
            warn!(target: "tap.ingest", error = %err, "ingestion_task_join_failed");
        }
        info!(target: "tap.ingest", source = %self.descriptor.name, "tap_session_closed");
    }

    /// 清空缓冲并校正选中状态，返回被清掉的事件数。
    pub fn clear(&self) -> usize {
        let cleared = self.buffer.clear();
        self.selection.lock().reconcile(&self.buffer);
        record_cleared();
        info!(target: "tap.ingest", cleared, "capture_buffer_cleared");
        cleared
    }

    pub fn snapshot(&self) -> Vec<Arc<TapEvent>> {
        self.buffer.snapshot()
    }

    pub fn filter(&self, filter: &TapFilter) -> Vec<Arc<TapEvent>> {
        filter.apply(&self.buffer.snapshot())
    }

    pub fn inspect(&self, sequence_id: u64) -> Result<Inspection, InspectError> {
        inspect_in(&self.buffer, sequence_id)
    }

    /// 选中一个事件并返回其详情。
    pub fn select(&self, sequence_id: u64) -> Result<Inspection, InspectError> {
        let mut selection = self.selection.lock();
        selection.select(sequence_id, &self.buffer)?;
        selection
            .current(&self.buffer)
            .ok_or(InspectError::NotCaptured(sequence_id))
    }

    pub fn clear_selection(&self) -> Option<u64> {
        self.selection.lock().clear()
    }

    /// 当前选中事件的详情；已被淘汰时清除选中并返回 None。
    pub fn selected(&self) -> Option<Inspection> {
        self.selection.lock().current(&self.buffer)
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.buffer.subscribe()
    }

    pub fn stats(&self) -> SessionStats {
        let counters = self.control.counters();
        let buffer = self.buffer.stats();
        SessionStats {
            state: self.control.state(),
            buffered: buffer.len,
            capacity: buffer.capacity,
            captured: counters.captured,
            evicted: buffer.total_evicted,
            dropped_while_paused: counters.dropped_while_paused,
            adapter_errors: counters.adapter_errors,
            next_sequence_id: self.decoder.peek_sequence_id(),
            last_capture_ms: counters.last_capture_ms,
        }
    }

    /// RUNNING 且自上次抓包（或会话打开）以来超过停滞阈值。
    pub fn is_stalled(&self, now_ms: i64) -> bool {
        if self.control.state() != RunState::Running {
            return false;
        }
        let since = self
            .control
            .counters()
            .last_capture_ms
            .unwrap_or(self.opened_at_ms);
        now_ms.saturating_sub(since) > self.stall_after_ms as i64
    }
}
