//! 连续缩放因子
//!
//! 在画质等级之内继续细调保真度。每个因子都有固定上下限，任何增减之后都会重新夹取。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 因子上下限
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorBounds {
    pub min: f32,
    pub max: f32,
}

impl FactorBounds {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f32) -> f32 {
        crate::clamp_finite!(value, self.min, self.max)
    }
}

/// 缩放因子向量
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalingFactors {
    /// 粒子数量倍率
    pub particle_count: f32,
    /// 粒子尺寸倍率
    pub particle_size: f32,
    /// 更新频率倍率
    pub update_rate: f32,
    /// 效果强度（作用于不透明度）
    pub effect_intensity: f32,
    /// 纹理细节
    pub texture_detail: f32,
    /// 物理精度
    pub physics_accuracy: f32,
}

impl ScalingFactors {
    pub const PARTICLE_COUNT_BOUNDS: FactorBounds = FactorBounds::new(0.1, 1.5);
    pub const PARTICLE_SIZE_BOUNDS: FactorBounds = FactorBounds::new(0.5, 1.2);
    pub const UPDATE_RATE_BOUNDS: FactorBounds = FactorBounds::new(0.3, 1.0);
    pub const EFFECT_INTENSITY_BOUNDS: FactorBounds = FactorBounds::new(0.2, 1.0);
    pub const TEXTURE_DETAIL_BOUNDS: FactorBounds = FactorBounds::new(0.25, 1.0);
    pub const PHYSICS_ACCURACY_BOUNDS: FactorBounds = FactorBounds::new(0.25, 1.0);

    /// 画质分数权重，顺序与字段一致
    const SCORE_WEIGHTS: [f32; 6] = [0.30, 0.20, 0.20, 0.15, 0.10, 0.05];

    pub const fn new(
        particle_count: f32,
        particle_size: f32,
        update_rate: f32,
        effect_intensity: f32,
        texture_detail: f32,
        physics_accuracy: f32,
    ) -> Self {
        Self {
            particle_count,
            particle_size,
            update_rate,
            effect_intensity,
            texture_detail,
            physics_accuracy,
        }
    }

    /// 全部为 1.0 的中性因子
    pub const fn identity() -> Self {
        Self::new(1.0, 1.0, 1.0, 1.0, 1.0, 1.0)
    }

    /// 把每个因子夹到各自的上下限内
    pub fn clamped(&self) -> Self {
        Self {
            particle_count: Self::PARTICLE_COUNT_BOUNDS.clamp(self.particle_count),
            particle_size: Self::PARTICLE_SIZE_BOUNDS.clamp(self.particle_size),
            update_rate: Self::UPDATE_RATE_BOUNDS.clamp(self.update_rate),
            effect_intensity: Self::EFFECT_INTENSITY_BOUNDS.clamp(self.effect_intensity),
            texture_detail: Self::TEXTURE_DETAIL_BOUNDS.clamp(self.texture_detail),
            physics_accuracy: Self::PHYSICS_ACCURACY_BOUNDS.clamp(self.physics_accuracy),
        }
    }

    /// 按比例调整四个自适应因子（数量、尺寸、更新频率、效果强度）并夹取
    ///
    /// `ratio` 为 0.9 表示缩小 10%，1.1 表示放大 10%。
    pub fn stepped(&self, ratio: f32) -> Self {
        Self {
            particle_count: self.particle_count * ratio,
            particle_size: self.particle_size * ratio,
            update_rate: self.update_rate * ratio,
            effect_intensity: self.effect_intensity * ratio,
            ..*self
        }
        .clamped()
    }

    /// 画质分数：六个因子的加权和，夹到 [0,1]，仅用于遥测
    pub fn quality_score(&self) -> f32 {
        let values = [
            self.particle_count,
            self.particle_size,
            self.update_rate,
            self.effect_intensity,
            self.texture_detail,
            self.physics_accuracy,
        ];
        let score: f32 = values
            .iter()
            .zip(Self::SCORE_WEIGHTS.iter())
            .map(|(v, w)| v * w)
            .sum();
        crate::clamp_finite!(score, 0.0, 1.0)
    }
}

impl Default for ScalingFactors {
    fn default() -> Self {
        Self::identity()
    }
}

/// 最保守的预设名称，紧急降级时使用
pub const BATTERY_SAVING_PRESET: &str = "battery_saving";

/// 默认的命名缩放预设
pub fn default_presets() -> BTreeMap<String, ScalingFactors> {
    let mut presets = BTreeMap::new();
    presets.insert(
        BATTERY_SAVING_PRESET.to_string(),
        ScalingFactors::new(0.3, 0.7, 0.5, 0.3, 0.5, 0.5),
    );
    presets.insert(
        "performance".to_string(),
        ScalingFactors::new(0.6, 0.8, 0.7, 0.6, 0.75, 0.75),
    );
    presets.insert(
        "balanced".to_string(),
        ScalingFactors::new(0.85, 0.9, 0.85, 0.8, 0.9, 0.9),
    );
    presets.insert("quality".to_string(), ScalingFactors::identity());
    presets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamping_respects_bounds() {
        let wild = ScalingFactors::new(9.0, 0.0, -1.0, f32::NAN, 2.0, 0.0);
        let c = wild.clamped();
        assert_eq!(c.particle_count, 1.5);
        assert_eq!(c.particle_size, 0.5);
        assert_eq!(c.update_rate, 0.3);
        assert_eq!(c.effect_intensity, 0.2);
        assert_eq!(c.texture_detail, 1.0);
        assert_eq!(c.physics_accuracy, 0.25);
    }

    #[test]
    fn test_step_down_hits_minimums() {
        let mut f = ScalingFactors::identity();
        for _ in 0..100 {
            f = f.stepped(0.9);
        }
        assert_eq!(f.particle_count, 0.1);
        assert_eq!(f.particle_size, 0.5);
        assert_eq!(f.update_rate, 0.3);
        assert_eq!(f.effect_intensity, 0.2);
        // 非自适应因子保持不变
        assert_eq!(f.texture_detail, 1.0);
    }

    #[test]
    fn test_step_up_hits_maximums() {
        let mut f = ScalingFactors::identity();
        for _ in 0..100 {
            f = f.stepped(1.1);
        }
        assert_eq!(f.particle_count, 1.5);
        assert_eq!(f.particle_size, 1.2);
        assert_eq!(f.update_rate, 1.0);
        assert_eq!(f.effect_intensity, 1.0);
    }

    #[test]
    fn test_quality_score() {
        assert!((ScalingFactors::identity().quality_score() - 1.0).abs() < 1e-6);
        let low = ScalingFactors::new(0.5, 0.5, 0.5, 0.5, 0.5, 0.5);
        assert!((low.quality_score() - 0.5).abs() < 1e-6);
        let over = ScalingFactors::new(1.5, 1.2, 1.0, 1.0, 1.0, 1.0);
        assert_eq!(over.quality_score(), 1.0);
    }

    #[test]
    fn test_default_presets_within_bounds() {
        let presets = default_presets();
        assert!(presets.contains_key(BATTERY_SAVING_PRESET));
        for (name, factors) in &presets {
            assert_eq!(*factors, factors.clamped(), "preset {} out of bounds", name);
        }
    }
}
