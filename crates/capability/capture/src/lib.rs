//! 抓包缓冲与过滤视图。
//!
//! ```text
//! 采集循环 ──push──► CaptureBuffer ──snapshot──► TapFilter ──► 展示层
//!                          │
//!                          └──subscribe (version)──► 实时刷新
//! ```

pub mod buffer;
pub mod filter;

pub use buffer::{
    CaptureBuffer, CaptureConfig, CaptureStats, DEFAULT_CAPACITY, MAX_CAPACITY, PushOutcome,
};
pub use filter::{TapFilter, filter};
