use super::{ConfigError, ConfigResult};
use crate::impl_default;
use serde::{Deserialize, Serialize};

/// 批处理配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchingConfig {
    /// 是否启用批处理（关闭时每个粒子单独成批）
    pub enabled: bool,

    /// 单批次最大粒子数
    pub max_batch_size: usize,

    /// 批次对象池保留的最大槽位数
    pub max_batches: usize,

    /// 按纹理排序
    pub sort_by_texture: bool,

    /// 按混合模式排序
    pub sort_by_blend_mode: bool,

    /// 纹理图集槽位优化
    pub atlas_optimization: bool,

    /// 图集槽位容量
    pub atlas_slots: usize,
}

impl_default!(BatchingConfig {
    enabled: true,
    max_batch_size: 1000,
    max_batches: 100,
    sort_by_texture: true,
    sort_by_blend_mode: true,
    atlas_optimization: true,
    atlas_slots: 16,
});

impl BatchingConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "Max batch size must be positive".to_string(),
            ));
        }
        if self.max_batches == 0 {
            return Err(ConfigError::ValidationError(
                "Batch pool capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// 实际生效的批次大小
    pub fn effective_batch_size(&self) -> usize {
        if self.enabled {
            self.max_batch_size
        } else {
            1
        }
    }
}
