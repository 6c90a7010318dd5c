//! 定长抓包环形缓冲
//!
//! `CaptureBuffer` 只保留最近 N 个 [`TapEvent`]：满时先淘汰最旧的一个再插入，
//! 插入顺序即抓包顺序。容量约束由环形结构本身保证，而不是“追加后裁剪”。
//!
//! 唯一写者是采集循环；读者通过 [`CaptureBuffer::snapshot`] 在读锁内复制 `Arc`，
//! 因此永远看不到写了一半的缓冲。

use domain::TapEvent;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::watch;

/// 默认容量
pub const DEFAULT_CAPACITY: usize = 100;

/// 容量上限，防止配置错误占满内存
pub const MAX_CAPACITY: usize = 100_000;

/// 缓冲参数。
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl CaptureConfig {
    fn sanitized(mut self) -> Self {
        self.capacity = self.capacity.clamp(1, MAX_CAPACITY);
        self
    }
}

/// 一次 push 的结果。
#[derive(Debug, Clone, Default)]
pub struct PushOutcome {
    /// 因容量上限被淘汰的事件
    pub evicted: Option<Arc<TapEvent>>,
    /// push 之后的缓冲版本
    pub version: u64,
}

/// 缓冲计数。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub len: usize,
    pub capacity: usize,
    pub total_pushed: u64,
    pub total_evicted: u64,
    pub version: u64,
}

#[derive(Debug)]
struct Ring {
    slots: Vec<Option<Arc<TapEvent>>>,
    /// 最旧元素位置
    head: usize,
    len: usize,
    total_pushed: u64,
    total_evicted: u64,
    version: u64,
}

impl Ring {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, index: usize) -> Option<&Arc<TapEvent>> {
        if index >= self.len {
            return None;
        }
        self.slots[(self.head + index) % self.capacity()].as_ref()
    }

    /// 序列号严格递增，按逻辑下标二分查找。
    fn position(&self, sequence_id: u64) -> Option<usize> {
        let (mut low, mut high) = (0usize, self.len);
        while low < high {
            let mid = low + (high - low) / 2;
            let current = self.slot(mid)?.sequence_id;
            if current == sequence_id {
                return Some(mid);
            }
            if current < sequence_id {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        None
    }
}

/// 抓包环形缓冲。
#[derive(Debug)]
pub struct CaptureBuffer {
    ring: RwLock<Ring>,
    version_tx: watch::Sender<u64>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::with_config(CaptureConfig::default())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_config(CaptureConfig { capacity })
    }

    pub fn with_config(config: CaptureConfig) -> Self {
        let config = config.sanitized();
        let (version_tx, _) = watch::channel(0);
        Self {
            ring: RwLock::new(Ring {
                slots: vec![None; config.capacity],
                head: 0,
                len: 0,
                total_pushed: 0,
                total_evicted: 0,
                version: 0,
            }),
            version_tx,
        }
    }

    /// 插入事件；满时先淘汰最旧的一个。均摊 O(1)。
    pub fn push(&self, event: Arc<TapEvent>) -> PushOutcome {
        let outcome = {
            let mut ring = self.ring.write();
            let capacity = ring.capacity();
            let evicted = if ring.len == capacity {
                let head = ring.head;
                let evicted = ring.slots[head].take();
                ring.head = (head + 1) % capacity;
                ring.len -= 1;
                ring.total_evicted += 1;
                evicted
            } else {
                None
            };
            let tail = (ring.head + ring.len) % capacity;
            ring.slots[tail] = Some(event);
            ring.len += 1;
            ring.total_pushed += 1;
            ring.version += 1;
            assert!(
                ring.len <= capacity,
                "capture buffer exceeded capacity: {} > {}",
                ring.len,
                capacity
            );
            PushOutcome {
                evicted,
                version: ring.version,
            }
        };
        self.version_tx.send_replace(outcome.version);
        outcome
    }

    /// 清空缓冲，返回被清掉的事件数。
    pub fn clear(&self) -> usize {
        let (cleared, version) = {
            let mut ring = self.ring.write();
            let cleared = ring.len;
            for slot in ring.slots.iter_mut() {
                *slot = None;
            }
            ring.head = 0;
            ring.len = 0;
            ring.version += 1;
            (cleared, ring.version)
        };
        self.version_tx.send_replace(version);
        cleared
    }

    /// 当前内容（最旧在前）。只读，不影响 push。
    pub fn snapshot(&self) -> Vec<Arc<TapEvent>> {
        let ring = self.ring.read();
        (0..ring.len)
            .filter_map(|index| ring.slot(index).cloned())
            .collect()
    }

    /// 按序列号查找事件。
    pub fn get(&self, sequence_id: u64) -> Option<Arc<TapEvent>> {
        let ring = self.ring.read();
        let index = ring.position(sequence_id)?;
        ring.slot(index).cloned()
    }

    pub fn contains(&self, sequence_id: u64) -> bool {
        self.ring.read().position(sequence_id).is_some()
    }

    /// 最新事件。
    pub fn latest(&self) -> Option<Arc<TapEvent>> {
        let ring = self.ring.read();
        ring.len.checked_sub(1).and_then(|last| ring.slot(last).cloned())
    }

    pub fn len(&self) -> usize {
        self.ring.read().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.ring.read().capacity()
    }

    pub fn version(&self) -> u64 {
        self.ring.read().version
    }

    pub fn stats(&self) -> CaptureStats {
        let ring = self.ring.read();
        CaptureStats {
            len: ring.len,
            capacity: ring.capacity(),
            total_pushed: ring.total_pushed,
            total_evicted: ring.total_evicted,
            version: ring.version,
        }
    }

    /// 订阅缓冲版本变化（每次 push/clear 递增），供展示层实时刷新。
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version_tx.subscribe()
    }
}

impl Default for CaptureBuffer {
    fn default() -> Self {
        Self::new()
    }
}
