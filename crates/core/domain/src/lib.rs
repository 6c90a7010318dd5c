pub mod data;

pub use data::{RawPayload, RawSourceEvent, TapEvent, TapPayload};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 被抓包通道的协议族。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolFamily {
    #[serde(rename = "MQTT")]
    Mqtt,
    #[serde(rename = "KAFKA")]
    Kafka,
    #[serde(rename = "HTTP")]
    Http,
    #[serde(rename = "GENERIC_TCP")]
    GenericTcp,
}

impl ProtocolFamily {
    pub const ALL: [ProtocolFamily; 4] = [
        ProtocolFamily::Mqtt,
        ProtocolFamily::Kafka,
        ProtocolFamily::Http,
        ProtocolFamily::GenericTcp,
    ];

    /// 协议标签（与序列化形式一致）。
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolFamily::Mqtt => "MQTT",
            ProtocolFamily::Kafka => "KAFKA",
            ProtocolFamily::Http => "HTTP",
            ProtocolFamily::GenericTcp => "GENERIC_TCP",
        }
    }
}

impl fmt::Display for ProtocolFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 无法识别的协议标签。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownProtocol(pub String);

impl fmt::Display for UnknownProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown protocol family: {}", self.0)
    }
}

impl std::error::Error for UnknownProtocol {}

impl FromStr for ProtocolFamily {
    type Err = UnknownProtocol;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "MQTT" => Ok(ProtocolFamily::Mqtt),
            "KAFKA" => Ok(ProtocolFamily::Kafka),
            "HTTP" => Ok(ProtocolFamily::Http),
            "GENERIC_TCP" | "TCP" => Ok(ProtocolFamily::GenericTcp),
            _ => Err(UnknownProtocol(value.to_string())),
        }
    }
}

/// 事件方向。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "IN" => Ok(Direction::In),
            "OUT" => Ok(Direction::Out),
            _ => Err(format!("unknown direction: {}", value)),
        }
    }
}

/// 被抓包通道描述：会话期间不可变，由调用方持有。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub name: String,
    pub protocol: ProtocolFamily,
}

impl SourceDescriptor {
    pub fn new(name: impl Into<String>, protocol: ProtocolFamily) -> Self {
        Self {
            name: name.into(),
            protocol,
        }
    }
}

/// 当前 Unix 毫秒时间戳。
pub fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}
