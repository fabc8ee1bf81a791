use super::{ConfigError, ConfigResult};
use crate::impl_default;
use serde::{Deserialize, Serialize};

/// 剔除配置
///
/// 每个过滤器都可以单独关闭；关闭的过滤器直接放行。距离单位为世界坐标，
/// 时间单位为毫秒。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CullingConfig {
    /// 距离剔除
    pub distance_culling: bool,

    /// 视锥剔除
    pub frustum_culling: bool,

    /// 年龄剔除
    pub age_culling: bool,

    /// 遮挡剔除（仅在注册了遮挡物时生效）
    pub occlusion_culling: bool,

    /// 重要性剔除
    pub importance_culling: bool,

    /// 最近保留距离
    pub near_distance: f32,

    /// 最远保留距离
    pub max_distance: f32,

    /// 视口矩形向外扩展的边距
    pub frustum_margin: f32,

    /// 最大粒子年龄（毫秒）
    pub max_age_ms: f64,

    /// 重要性剔除保留比例 (0, 1]
    pub importance_keep_percentage: f32,

    /// 重要性分数缓存的有效帧数
    pub importance_cache_frames: u64,

    /// 重要性各项权重
    pub importance_weights: ImportanceWeights,

    /// 重要性各项的归一化参考值
    pub importance_normalization: ImportanceNormalization,
}

impl_default!(CullingConfig {
    distance_culling: true,
    frustum_culling: true,
    age_culling: true,
    occlusion_culling: true,
    importance_culling: true,
    near_distance: 0.0,
    max_distance: 1500.0,
    frustum_margin: 50.0,
    max_age_ms: 10_000.0,
    importance_keep_percentage: 0.8,
    importance_cache_frames: 5,
    importance_weights: ImportanceWeights::default(),
    importance_normalization: ImportanceNormalization::default(),
});

impl CullingConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.near_distance >= 0.0 && self.near_distance <= self.max_distance) {
            return Err(ConfigError::ValidationError(format!(
                "Culling distances must satisfy 0 <= near ({}) <= max ({})",
                self.near_distance, self.max_distance
            )));
        }
        if !(self.importance_keep_percentage > 0.0 && self.importance_keep_percentage <= 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "Importance keep percentage must be in (0, 1], got {}",
                self.importance_keep_percentage
            )));
        }
        if self.importance_cache_frames == 0 {
            return Err(ConfigError::ValidationError(
                "Importance cache window must be at least one frame".to_string(),
            ));
        }
        if !(self.max_age_ms > 0.0) {
            return Err(ConfigError::ValidationError(
                "Max particle age must be positive".to_string(),
            ));
        }
        self.importance_normalization.validate()
    }
}

/// 单个重要性因子：权重以及是否取反（值越小越重要）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImportanceFactor {
    pub weight: f32,
    pub invert: bool,
}

impl ImportanceFactor {
    pub const fn new(weight: f32, invert: bool) -> Self {
        Self { weight, invert }
    }

    /// 对已归一化到 [0,1] 的分量加权
    pub fn apply(&self, normalized: f32) -> f32 {
        let v = crate::clamp_finite!(normalized, 0.0, 1.0);
        let v = if self.invert { 1.0 - v } else { v };
        v * self.weight
    }
}

/// 重要性权重表
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportanceWeights {
    /// 到相机的距离（越近越重要）
    pub distance: ImportanceFactor,
    /// 粒子尺寸
    pub size: ImportanceFactor,
    /// 不透明度
    pub opacity: ImportanceFactor,
    /// 速度大小
    pub speed: ImportanceFactor,
    /// 年龄（越年轻越重要）
    pub age: ImportanceFactor,
    /// 近似屏幕面积
    pub screen_area: ImportanceFactor,
    /// 调用方提供的优先级
    pub priority: ImportanceFactor,
}

impl_default!(ImportanceWeights {
    distance: ImportanceFactor::new(0.25, true),
    size: ImportanceFactor::new(0.15, false),
    opacity: ImportanceFactor::new(0.15, false),
    speed: ImportanceFactor::new(0.10, false),
    age: ImportanceFactor::new(0.10, true),
    screen_area: ImportanceFactor::new(0.20, false),
    priority: ImportanceFactor::new(0.05, false),
});

/// 重要性分量的归一化参考值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportanceNormalization {
    /// 尺寸达到该值时尺寸分量为 1
    pub reference_size: f32,
    /// 速度达到该值时速度分量为 1
    pub reference_speed: f32,
    /// 屏幕面积达到该值时面积分量为 1
    pub reference_area: f32,
    /// 深度衰减距离，z 每增加该值屏幕尺寸缩小一半
    pub depth_falloff: f32,
}

impl_default!(ImportanceNormalization {
    reference_size: 32.0,
    reference_speed: 500.0,
    reference_area: 4096.0,
    depth_falloff: 100.0,
});

impl ImportanceNormalization {
    fn validate(&self) -> ConfigResult<()> {
        let all_positive = [
            self.reference_size,
            self.reference_speed,
            self.reference_area,
            self.depth_falloff,
        ]
        .iter()
        .all(|v| *v > 0.0);

        if !all_positive {
            return Err(ConfigError::ValidationError(
                "Importance normalization references must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        let w = ImportanceWeights::default();
        let sum = w.distance.weight
            + w.size.weight
            + w.opacity.weight
            + w.speed.weight
            + w.age.weight
            + w.screen_area.weight
            + w.priority.weight;
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_factor_inversion() {
        let f = ImportanceFactor::new(0.5, true);
        assert_eq!(f.apply(0.0), 0.5);
        assert_eq!(f.apply(1.0), 0.0);
        assert_eq!(f.apply(7.0), 0.0);
    }

    #[test]
    fn test_validation() {
        let mut config = CullingConfig::default();
        assert!(config.validate().is_ok());

        config.near_distance = 2000.0;
        assert!(config.validate().is_err());

        config.near_distance = 0.0;
        config.importance_keep_percentage = 0.0;
        assert!(config.validate().is_err());
    }
}
