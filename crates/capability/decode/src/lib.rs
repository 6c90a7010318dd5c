//! # 协议解码能力
//!
//! 将采集源适配器交来的原始事件 + 协议族映射为统一的 [`TapEvent`]：
//!
//! ```text
//! RawSourceEvent ──► decode_payload (按协议族)  ──► payload + summary + size
//!                └─► DirectionPolicy            ──► direction
//!                                                 ──► hex_preview ──► raw_preview
//!                                                 ──► sequence_id（会话内单调递增）
//! ```
//!
//! 解码是全函数：畸形输入不会让解码失败，只会产出摘要为 `Len: <n>` 的降级事件。

mod direction;
mod preview;
mod protocols;

pub use direction::{DirectionPolicy, FixedDirection, RandomDirection};
pub use preview::{TRUNCATION_MARKER, hex_preview};
pub use protocols::{DecodedPayload, decode_payload};

use domain::{ProtocolFamily, RawSourceEvent, TapEvent, now_epoch_ms};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tap_telemetry::record_decode_degraded;
use tracing::debug;

/// 解码错误。仅在解码器内部使用：总会被降级处理，不会传播给采集循环。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("{0} payload is not an object")]
    NotAnObject(ProtocolFamily),
    #[error("{protocol} payload missing field: {field}")]
    MissingField {
        protocol: ProtocolFamily,
        field: &'static str,
    },
    #[error("{protocol} payload has invalid field: {field}")]
    InvalidField {
        protocol: ProtocolFamily,
        field: &'static str,
    },
}

/// 解码参数。
#[derive(Debug, Clone)]
pub struct DecodeConfig {
    pub preview_max_chars: usize,
    pub first_sequence_id: u64,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            preview_max_chars: 100,
            first_sequence_id: 1,
        }
    }
}

/// 会话级解码器：持有序列号计数器与方向策略。
pub struct Decoder {
    config: DecodeConfig,
    next_sequence_id: AtomicU64,
    direction: Arc<dyn DirectionPolicy>,
}

impl Decoder {
    pub fn new(config: DecodeConfig, direction: Arc<dyn DirectionPolicy>) -> Self {
        let config = DecodeConfig {
            preview_max_chars: config.preview_max_chars.max(1),
            ..config
        };
        Self {
            next_sequence_id: AtomicU64::new(config.first_sequence_id),
            config,
            direction,
        }
    }

    /// 下一个将要分配的序列号。
    pub fn peek_sequence_id(&self) -> u64 {
        self.next_sequence_id.load(Ordering::Acquire)
    }

    pub fn preview_max_chars(&self) -> usize {
        self.config.preview_max_chars
    }

    /// 解码一个原始事件并分配序列号。
    pub fn decode(&self, raw: &RawSourceEvent, protocol: ProtocolFamily) -> TapEvent {
        let decoded = decode_payload(&raw.payload, protocol);
        if let Some(reason) = decoded.degraded.as_ref() {
            record_decode_degraded();
            debug!(target: "tap.decode", protocol = %protocol, reason = %reason, "decode_degraded");
        }
        let direction = raw
            .direction
            .unwrap_or_else(|| self.direction.assign(raw));
        let sequence_id = self.next_sequence_id.fetch_add(1, Ordering::AcqRel);
        let payload_text = serde_json::to_string(&decoded.payload).unwrap_or_default();

        TapEvent {
            sequence_id,
            captured_at_ms: now_epoch_ms(),
            direction,
            protocol,
            size_bytes: decoded.size_bytes,
            raw_preview: hex_preview(&payload_text, self.config.preview_max_chars),
            payload: decoded.payload,
            summary: decoded.summary,
        }
    }
}
