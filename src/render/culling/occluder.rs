//! 遮挡物注册表
//!
//! 遮挡物由调用方显式注册和移除，跨帧保留。

use crate::render::particles::Rect;
use glam::Vec2;

/// 遮挡物 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OccluderId(u64);

/// 轴对齐矩形遮挡物
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Occluder {
    pub id: OccluderId,
    pub bounds: Rect,
}

/// 遮挡物集合
#[derive(Debug, Default)]
pub struct OccluderSet {
    occluders: Vec<Occluder>,
    next_id: u64,
}

impl OccluderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册遮挡物
    pub fn add(&mut self, bounds: Rect) -> OccluderId {
        let id = OccluderId(self.next_id);
        self.next_id += 1;
        self.occluders.push(Occluder { id, bounds });
        id
    }

    /// 移除遮挡物，不存在时返回 `false`
    pub fn remove(&mut self, id: OccluderId) -> bool {
        let before = self.occluders.len();
        self.occluders.retain(|o| o.id != id);
        self.occluders.len() != before
    }

    pub fn clear(&mut self) {
        self.occluders.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.occluders.is_empty()
    }

    pub fn len(&self) -> usize {
        self.occluders.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Occluder> {
        self.occluders.iter()
    }

    /// 点是否落在任一遮挡物内（使用未扩展的边界）
    pub fn occludes(&self, point: Vec2) -> bool {
        self.occluders.iter().any(|o| o.bounds.contains_point(point))
    }
}
