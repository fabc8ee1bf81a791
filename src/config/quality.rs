use super::{ConfigError, ConfigResult};
use crate::impl_default;
use crate::render::quality::scaling::{default_presets, BATTERY_SAVING_PRESET};
use crate::render::quality::{QualityLevel, QualityProfiles, ScalingFactors};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 画质管理配置
///
/// 帧率阈值满足 `critical < downgrade < upgrade`。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// 是否启用画质缩放与自适应
    ///
    /// 关闭时不再改写尺寸、不透明度和特性，也不再自动调整，
    /// 但输出数量仍受当前等级上限约束。
    pub enabled: bool,

    /// 是否根据帧率自动调整
    pub adaptive: bool,

    /// 初始画质等级
    pub initial_level: QualityLevel,

    /// 目标帧率
    pub target_fps: f32,

    /// 低于该平均帧率时立即紧急降级
    pub critical_threshold: f32,

    /// 稳定且低于该帧率时降一级
    pub downgrade_threshold: f32,

    /// 稳定且高于该帧率时升一级
    pub upgrade_threshold: f32,

    /// 两次调整之间的冷却时间（毫秒）
    pub cooldown_ms: f64,

    /// 允许调整前需要的连续稳定帧数
    pub stable_frames_required: u32,

    /// 稳定性判断使用的最近样本数
    pub stability_window: usize,

    /// 稳定性容差：标准差需低于均值的该比例
    pub stability_tolerance: f32,

    /// 帧率历史长度
    pub history_size: usize,

    /// 等级已到边界时因子的调整幅度
    pub adjustment_step: f32,

    /// 等级描述表
    pub profiles: QualityProfiles,

    /// 命名缩放预设
    pub presets: BTreeMap<String, ScalingFactors>,

    /// 升级后的验证与回滚
    pub validation: ValidationConfig,
}

impl_default!(QualityConfig {
    enabled: true,
    adaptive: true,
    initial_level: QualityLevel::High,
    target_fps: 60.0,
    critical_threshold: 25.0,
    downgrade_threshold: 45.0,
    upgrade_threshold: 58.0,
    cooldown_ms: 2000.0,
    stable_frames_required: 30,
    stability_window: 10,
    stability_tolerance: 0.1,
    history_size: 60,
    adjustment_step: 0.1,
    profiles: QualityProfiles::default(),
    presets: default_presets(),
    validation: ValidationConfig::default(),
});

/// 自动升级后的验证配置
///
/// 升级后观察 `period_ms`，期间平均帧率低于 `rollback_threshold × target_fps`
/// 时回到升级前的等级，并使用更长的 `rollback_cooldown_ms`。
/// 累计 `max_rollbacks` 次回滚后关闭自适应。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub enabled: bool,
    pub period_ms: f64,
    pub rollback_threshold: f32,
    pub max_rollbacks: u32,
    pub rollback_cooldown_ms: f64,
}

impl_default!(ValidationConfig {
    enabled: true,
    period_ms: 3000.0,
    rollback_threshold: 0.8,
    max_rollbacks: 3,
    rollback_cooldown_ms: 30000.0,
});

impl QualityConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.critical_threshold < self.downgrade_threshold
            && self.downgrade_threshold < self.upgrade_threshold)
        {
            return Err(ConfigError::ValidationError(format!(
                "FPS thresholds must satisfy critical ({}) < downgrade ({}) < upgrade ({})",
                self.critical_threshold, self.downgrade_threshold, self.upgrade_threshold
            )));
        }
        if !(self.target_fps > 0.0 && self.target_fps <= 1000.0) {
            return Err(ConfigError::ValidationError(
                "Invalid target FPS".to_string(),
            ));
        }
        if self.stability_window < 2 || self.history_size < self.stability_window {
            return Err(ConfigError::ValidationError(format!(
                "History size ({}) must hold the stability window ({}), which needs at least 2 samples",
                self.history_size, self.stability_window
            )));
        }
        if !(self.adjustment_step > 0.0 && self.adjustment_step < 1.0) {
            return Err(ConfigError::ValidationError(
                "Adjustment step must be in (0, 1)".to_string(),
            ));
        }
        if !(self.validation.rollback_threshold > 0.0 && self.validation.rollback_threshold <= 1.0)
            || !(self.validation.period_ms >= 0.0 && self.validation.rollback_cooldown_ms >= 0.0)
        {
            return Err(ConfigError::ValidationError(
                "Rollback threshold must be in (0, 1] and validation periods non-negative"
                    .to_string(),
            ));
        }
        if !self.presets.contains_key(BATTERY_SAVING_PRESET) {
            return Err(ConfigError::ValidationError(format!(
                "Preset table must contain '{}'",
                BATTERY_SAVING_PRESET
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(QualityConfig::default().validate().is_ok());
    }

    #[test]
    fn test_missing_battery_preset_rejected() {
        let mut config = QualityConfig::default();
        config.presets.remove(BATTERY_SAVING_PRESET);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rollback_threshold_range() {
        let mut config = QualityConfig::default();
        config.validation.rollback_threshold = 1.5;
        assert!(config.validate().is_err());
        config.validation.rollback_threshold = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_history_must_cover_window() {
        let mut config = QualityConfig::default();
        config.history_size = 5;
        assert!(config.validate().is_err());
    }
}
