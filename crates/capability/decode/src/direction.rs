//! 方向分配策略。
//!
//! 方向不是协议事实：适配器能给出真实方向时直接使用，否则交由可注入的策略决定。

use domain::{Direction, RawSourceEvent};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 方向策略抽象。
pub trait DirectionPolicy: Send + Sync {
    fn assign(&self, raw: &RawSourceEvent) -> Direction;
}

/// 固定方向（默认 IN）。
#[derive(Debug, Clone, Copy)]
pub struct FixedDirection(pub Direction);

impl Default for FixedDirection {
    fn default() -> Self {
        Self(Direction::In)
    }
}

impl DirectionPolicy for FixedDirection {
    fn assign(&self, _raw: &RawSourceEvent) -> Direction {
        self.0
    }
}

/// 以固定小概率分配 OUT，其余为 IN（模拟采集通道以入站为主）。
pub struct RandomDirection {
    out_probability: f64,
    rng: Mutex<StdRng>,
}

impl RandomDirection {
    pub fn new(out_probability: f64) -> Self {
        Self::with_rng(out_probability, StdRng::from_os_rng())
    }

    /// 固定种子（用于测试复现）。
    pub fn seeded(out_probability: f64, seed: u64) -> Self {
        Self::with_rng(out_probability, StdRng::seed_from_u64(seed))
    }

    fn with_rng(out_probability: f64, rng: StdRng) -> Self {
        let out_probability = if out_probability.is_finite() {
            out_probability.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            out_probability,
            rng: Mutex::new(rng),
        }
    }

    pub fn out_probability(&self) -> f64 {
        self.out_probability
    }
}

impl DirectionPolicy for RandomDirection {
    fn assign(&self, _raw: &RawSourceEvent) -> Direction {
        if self.rng.lock().random_bool(self.out_probability) {
            Direction::Out
        } else {
            Direction::In
        }
    }
}
