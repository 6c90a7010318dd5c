//! Handlers 模块

pub mod health;
pub mod metrics;
pub mod tap;

pub use health::*;
pub use metrics::*;
pub use tap::*;
