//! 过滤视图
//!
//! 对缓冲快照做只读投影：needle 为空或在 `summary` / payload 序列化文本中
//! 出现（不区分大小写）的事件被保留，顺序与缓冲一致。
//!
//! 过滤是纯函数，每次快照变化或输入变化时重新求值，不维护订阅状态。

use domain::{Direction, ProtocolFamily, TapEvent};
use std::sync::Arc;

/// 事件过滤条件
///
/// - needle：不区分大小写的子串
/// - protocol / direction：可选的精确收窄（None = 不限）
#[derive(Debug, Clone, Default)]
pub struct TapFilter {
    needle: String,
    protocol: Option<ProtocolFamily>,
    direction: Option<Direction>,
}

impl TapFilter {
    pub fn new(needle: &str) -> Self {
        Self {
            needle: needle.to_lowercase(),
            protocol: None,
            direction: None,
        }
    }

    pub fn with_protocol(mut self, protocol: ProtocolFamily) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.needle.is_empty() && self.protocol.is_none() && self.direction.is_none()
    }

    pub fn matches(&self, event: &TapEvent) -> bool {
        if let Some(protocol) = self.protocol
            && event.protocol != protocol
        {
            return false;
        }
        if let Some(direction) = self.direction
            && event.direction != direction
        {
            return false;
        }
        if self.needle.is_empty() {
            return true;
        }
        event.summary.to_lowercase().contains(&self.needle)
            || event.payload_text().to_lowercase().contains(&self.needle)
    }

    /// 保序过滤。
    pub fn apply(&self, snapshot: &[Arc<TapEvent>]) -> Vec<Arc<TapEvent>> {
        if self.is_empty() {
            return snapshot.to_vec();
        }
        snapshot
            .iter()
            .filter(|event| self.matches(event))
            .cloned()
            .collect()
    }
}

/// `filter(snapshot, needle)`：仅按文本过滤。
pub fn filter(snapshot: &[Arc<TapEvent>], needle: &str) -> Vec<Arc<TapEvent>> {
    TapFilter::new(needle).apply(snapshot)
}
