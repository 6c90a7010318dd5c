//! # 采集循环能力
//!
//! 从采集源适配器拉取原始事件，经解码写入抓包缓冲，并提供暂停/恢复/停止控制：
//!
//! ```text
//! ArrivalSource (synthetic / push / mqtt / tcp)
//!       │ next_arrival()
//!       ▼
//! IngestionLoop ── RUNNING ──► Decoder ──► CaptureBuffer ──► Selection 校正
//!       │
//!       └── PAUSED：到达被消费并丢弃（不排队、不回放）
//! ```
//!
//! 采集源错误只影响当前这一次到达：记录日志后继续等待下一次到达。

mod ingestion;
mod mqtt;
mod push;
mod session;
mod synthetic;
mod tcp;

pub use ingestion::{LoopControl, LoopCounters, RunState};
pub use mqtt::{MqttSource, MqttSourceConfig};
pub use push::{PushHandle, PushSource, push_channel};
pub use session::{SessionConfig, SessionStats, TapSession};
pub use synthetic::{SyntheticConfig, SyntheticSource};
pub use tcp::{TcpFrameConfig, TcpFrameSource};

use async_trait::async_trait;
use domain::RawSourceEvent;

/// 采集错误。
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// 采集源本次未能产出事件（隔离处理，循环继续）。
    #[error("source error: {0}")]
    Source(String),
    /// 采集源已关闭，不会再有到达。
    #[error("source exhausted")]
    Exhausted,
    #[error("config error: {0}")]
    Config(String),
    #[error("cannot {action} while {from}")]
    InvalidTransition {
        from: RunState,
        action: &'static str,
    },
    #[error("push queue full")]
    QueueFull,
    #[error("push queue closed")]
    QueueClosed,
}

/// 采集源抽象：由采集循环独占持有并逐个拉取到达。
#[async_trait]
pub trait ArrivalSource: Send {
    async fn next_arrival(&mut self) -> Result<RawSourceEvent, IngestError>;
}

#[async_trait]
impl ArrivalSource for Box<dyn ArrivalSource> {
    async fn next_arrival(&mut self) -> Result<RawSourceEvent, IngestError> {
        (**self).next_arrival().await
    }
}
