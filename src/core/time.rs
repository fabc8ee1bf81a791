//! 帧时钟抽象
//!
//! 剔除（粒子年龄）、画质管理（冷却窗口）和各组件的耗时统计都从注入的
//! [`TimeSource`] 读取时间，测试可以用 [`ManualClock`] 提供确定的时间戳。

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// 毫秒时间源
pub trait TimeSource {
    /// 当前时间（毫秒），只要求单调不减
    fn now_ms(&self) -> f64;
}

/// 组件之间共享的时钟句柄
pub type SharedClock = Rc<dyn TimeSource>;

/// 基于 `Instant` 的单调系统时钟，原点为创建时刻
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// 创建共享句柄
    pub fn shared() -> SharedClock {
        Rc::new(Self::new())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// 手动推进的时钟
///
/// 克隆出的句柄共享同一个时间值，测试在把时钟交给管线之后仍然可以推进它。
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    /// 设置绝对时间
    pub fn set(&self, now_ms: f64) {
        self.now.set(now_ms);
    }

    /// 向前推进
    pub fn advance(&self, delta_ms: f64) {
        self.now.set(self.now.get() + delta_ms);
    }

    /// 以共享句柄形式返回，内部状态仍与 `self` 共享
    pub fn shared(&self) -> SharedClock {
        Rc::new(self.clone())
    }
}

impl TimeSource for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}
