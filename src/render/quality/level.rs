//! 画质等级定义
//!
//! 等级描述表在启动时构造一次，之后只读；自适应调整只改变"当前等级"，
//! 从不修改等级本身的定义。

use super::scaling::ScalingFactors;
use crate::core::PipelineError;
use crate::impl_default;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 画质等级，按从低到高排序
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Minimal,
    Low,
    Medium,
    #[default]
    High,
    Ultra,
}

impl QualityLevel {
    /// 全部等级，从低到高
    pub const ALL: [QualityLevel; 5] = [
        QualityLevel::Minimal,
        QualityLevel::Low,
        QualityLevel::Medium,
        QualityLevel::High,
        QualityLevel::Ultra,
    ];

    /// 等级序号（minimal = 0）
    pub fn rank(&self) -> usize {
        match self {
            QualityLevel::Minimal => 0,
            QualityLevel::Low => 1,
            QualityLevel::Medium => 2,
            QualityLevel::High => 3,
            QualityLevel::Ultra => 4,
        }
    }

    /// 低一级；已是最低级时返回 `None`
    pub fn lower(&self) -> Option<Self> {
        self.rank().checked_sub(1).map(|r| Self::ALL[r])
    }

    /// 高一级；已是最高级时返回 `None`
    pub fn higher(&self) -> Option<Self> {
        Self::ALL.get(self.rank() + 1).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLevel::Minimal => "minimal",
            QualityLevel::Low => "low",
            QualityLevel::Medium => "medium",
            QualityLevel::High => "high",
            QualityLevel::Ultra => "ultra",
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityLevel {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|level| level.as_str() == name)
            .ok_or_else(|| PipelineError::UnknownQualityLevel(s.to_string()))
    }
}

/// 等级允许的粒子特性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QualityFeatures {
    pub physics: bool,
    pub collision: bool,
    pub trails: bool,
    pub glow: bool,
}

impl QualityFeatures {
    pub const fn new(physics: bool, collision: bool, trails: bool, glow: bool) -> Self {
        Self {
            physics,
            collision,
            trails,
            glow,
        }
    }
}

/// 单个画质等级的描述
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityProfile {
    /// 粒子数量上限
    pub max_particles: usize,
    /// 纹理质量 (0, 1]
    pub texture_quality: f32,
    /// 更新频率倍率 (0, 1]
    pub update_frequency: f32,
    /// 特性开关
    pub features: QualityFeatures,
    /// 切换到该等级时采用的缩放因子
    pub scaling: ScalingFactors,
}

/// 五个等级的描述表
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityProfiles {
    pub minimal: QualityProfile,
    pub low: QualityProfile,
    pub medium: QualityProfile,
    pub high: QualityProfile,
    pub ultra: QualityProfile,
}

impl_default!(QualityProfiles {
    minimal: QualityProfile {
        max_particles: 500,
        texture_quality: 0.25,
        update_frequency: 0.25,
        features: QualityFeatures::new(false, false, false, false),
        scaling: ScalingFactors::new(0.5, 0.7, 0.5, 0.3, 0.25, 0.25),
    },
    low: QualityProfile {
        max_particles: 1000,
        texture_quality: 0.5,
        update_frequency: 0.5,
        features: QualityFeatures::new(true, false, false, false),
        scaling: ScalingFactors::new(0.7, 0.8, 0.7, 0.5, 0.5, 0.5),
    },
    medium: QualityProfile {
        max_particles: 2500,
        texture_quality: 0.75,
        update_frequency: 0.75,
        features: QualityFeatures::new(true, true, false, false),
        scaling: ScalingFactors::new(0.85, 0.9, 0.85, 0.75, 0.75, 0.75),
    },
    high: QualityProfile {
        max_particles: 5000,
        texture_quality: 1.0,
        update_frequency: 1.0,
        features: QualityFeatures::new(true, true, true, false),
        scaling: ScalingFactors::new(1.0, 1.0, 1.0, 1.0, 1.0, 1.0),
    },
    ultra: QualityProfile {
        max_particles: 10_000,
        texture_quality: 1.0,
        update_frequency: 1.0,
        features: QualityFeatures::new(true, true, true, true),
        scaling: ScalingFactors::new(1.2, 1.1, 1.0, 1.0, 1.0, 1.0),
    },
});

impl QualityProfiles {
    /// 取出指定等级的描述
    pub fn get(&self, level: QualityLevel) -> &QualityProfile {
        match level {
            QualityLevel::Minimal => &self.minimal,
            QualityLevel::Low => &self.low,
            QualityLevel::Medium => &self.medium,
            QualityLevel::High => &self.high,
            QualityLevel::Ultra => &self.ultra,
        }
    }
}
