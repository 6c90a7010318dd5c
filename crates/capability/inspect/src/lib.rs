//! 单事件详情（Inspector）与选中状态。
//!
//! Inspector 本身无状态；唯一的状态是 [`Selection`] 中的选中序列号。
//! 选中事件被缓冲淘汰或清空后，选中状态必须被清除，不能继续展示过期数据。

use domain::{Direction, ProtocolFamily, TapEvent, TapPayload};
use serde::Serialize;
use tap_capture::CaptureBuffer;
use tracing::debug;

/// Inspector 错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InspectError {
    #[error("event {0} is not in the capture buffer")]
    NotCaptured(u64),
}

/// 事件元数据。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionMetadata {
    pub sequence_id: u64,
    pub captured_at_ms: i64,
    pub protocol: ProtocolFamily,
    pub direction: Direction,
    pub size_bytes: u64,
    pub summary: String,
}

/// 单事件详情。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inspection {
    pub payload: TapPayload,
    pub raw_preview: String,
    pub metadata: InspectionMetadata,
}

/// 渲染单个事件的完整详情。
pub fn inspect(event: &TapEvent) -> Inspection {
    Inspection {
        payload: event.payload.clone(),
        raw_preview: event.raw_preview.clone(),
        metadata: InspectionMetadata {
            sequence_id: event.sequence_id,
            captured_at_ms: event.captured_at_ms,
            protocol: event.protocol,
            direction: event.direction,
            size_bytes: event.size_bytes,
            summary: event.summary.clone(),
        },
    }
}

/// 按序列号从缓冲中取出并渲染。
pub fn inspect_in(buffer: &CaptureBuffer, sequence_id: u64) -> Result<Inspection, InspectError> {
    buffer
        .get(sequence_id)
        .map(|event| inspect(&event))
        .ok_or(InspectError::NotCaptured(sequence_id))
}

/// 选中的事件已不在缓冲中（本地恢复：清除选中）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionStale {
    pub sequence_id: u64,
}

/// 选中状态。
#[derive(Debug, Clone, Default)]
pub struct Selection {
    selected: Option<u64>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<u64> {
        self.selected
    }

    /// 选中一个仍在缓冲中的事件。
    pub fn select(&mut self, sequence_id: u64, buffer: &CaptureBuffer) -> Result<(), InspectError> {
        if !buffer.contains(sequence_id) {
            return Err(InspectError::NotCaptured(sequence_id));
        }
        self.selected = Some(sequence_id);
        Ok(())
    }

    pub fn clear(&mut self) -> Option<u64> {
        self.selected.take()
    }

    /// 对照缓冲内容校正选中状态。
    pub fn reconcile(&mut self, buffer: &CaptureBuffer) -> Option<SelectionStale> {
        let sequence_id = self.selected?;
        if buffer.contains(sequence_id) {
            return None;
        }
        self.selected = None;
        debug!(target: "tap.inspect", sequence_id, "selection_stale_cleared");
        Some(SelectionStale { sequence_id })
    }

    /// push 淘汰了某个事件时调用；O(1)。
    pub fn on_evicted(&mut self, evicted_id: u64) -> Option<SelectionStale> {
        if self.selected != Some(evicted_id) {
            return None;
        }
        self.selected = None;
        debug!(target: "tap.inspect", sequence_id = evicted_id, "selection_evicted");
        Some(SelectionStale {
            sequence_id: evicted_id,
        })
    }

    /// 当前选中事件的详情（先校正）。
    pub fn current(&mut self, buffer: &CaptureBuffer) -> Option<Inspection> {
        self.reconcile(buffer);
        let sequence_id = self.selected?;
        buffer.get(sequence_id).map(|event| inspect(&event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn event(sequence_id: u64) -> Arc<TapEvent> {
        let payload = json!({"topic": "a/b", "qos": 0, "value": "1"})
            .as_object()
            .cloned()
            .unwrap_or_default();
        Arc::new(TapEvent {
            sequence_id,
            captured_at_ms: 1_700_000_000_123,
            direction: Direction::In,
            protocol: ProtocolFamily::Mqtt,
            size_bytes: 34,
            payload,
            summary: "PUBLISH [a/b] (1 bytes)".to_string(),
            raw_preview: "7B 22".to_string(),
        })
    }

    #[test]
    fn inspect_copies_payload_preview_and_metadata() {
        let inspection = inspect(&event(9));
        assert_eq!(inspection.metadata.sequence_id, 9);
        assert_eq!(inspection.metadata.captured_at_ms, 1_700_000_000_123);
        assert_eq!(inspection.metadata.protocol, ProtocolFamily::Mqtt);
        assert_eq!(inspection.metadata.size_bytes, 34);
        assert_eq!(inspection.raw_preview, "7B 22");
        assert_eq!(inspection.payload.get("topic"), Some(&json!("a/b")));
    }

    #[test]
    fn select_requires_captured_event() {
        let buffer = CaptureBuffer::with_capacity(2);
        buffer.push(event(1));
        let mut selection = Selection::new();
        assert_eq!(selection.select(5, &buffer), Err(InspectError::NotCaptured(5)));
        assert!(selection.select(1, &buffer).is_ok());
        assert_eq!(selection.selected(), Some(1));
    }

    #[test]
    fn on_evicted_only_clears_matching_id() {
        let buffer = CaptureBuffer::with_capacity(3);
        for id in 1..=3 {
            buffer.push(event(id));
        }
        let mut selection = Selection::new();
        selection.select(2, &buffer).expect("select");
        assert!(selection.on_evicted(1).is_none());
        assert_eq!(selection.selected(), Some(2));
        assert_eq!(selection.on_evicted(2), Some(SelectionStale { sequence_id: 2 }));
        assert_eq!(selection.selected(), None);
    }

    #[test]
    fn current_reconciles_after_clear() {
        let buffer = CaptureBuffer::with_capacity(3);
        buffer.push(event(1));
        let mut selection = Selection::new();
        selection.select(1, &buffer).expect("select");
        assert!(selection.current(&buffer).is_some());
        buffer.clear();
        assert!(selection.current(&buffer).is_none());
        assert_eq!(selection.selected(), None);
    }
}
