use crate::{Direction, ProtocolFamily};
use serde::Serialize;

/// 协议相关的结构化 payload（字符串键 → JSON 值）。
pub type TapPayload = serde_json::Map<String, serde_json::Value>;

/// 采集源适配器交给解码器的原始内容。
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    /// 适配器已解析出的结构化字段。
    Structured(serde_json::Value),
    /// 未解析的线上字节。
    Bytes(Vec<u8>),
}

/// 采集源适配器产生的原始事件。
#[derive(Debug, Clone, PartialEq)]
pub struct RawSourceEvent {
    pub received_at_ms: i64,
    /// 适配器已知的真实方向；为空时由方向策略决定。
    pub direction: Option<Direction>,
    pub payload: RawPayload,
}

impl RawSourceEvent {
    pub fn structured(received_at_ms: i64, value: serde_json::Value) -> Self {
        Self {
            received_at_ms,
            direction: None,
            payload: RawPayload::Structured(value),
        }
    }

    pub fn bytes(received_at_ms: i64, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            received_at_ms,
            direction: None,
            payload: RawPayload::Bytes(bytes.into()),
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }
}

/// 抓包单元。构造后不可变，在缓冲、过滤视图与 Inspector 间以 `Arc` 共享。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TapEvent {
    pub sequence_id: u64,
    pub captured_at_ms: i64,
    pub direction: Direction,
    pub protocol: ProtocolFamily,
    pub size_bytes: u64,
    pub payload: TapPayload,
    pub summary: String,
    pub raw_preview: String,
}

impl TapEvent {
    /// payload 的序列化文本（过滤与预览共用）。
    pub fn payload_text(&self) -> String {
        serde_json::to_string(&self.payload).unwrap_or_default()
    }
}
