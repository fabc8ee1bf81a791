//! 画质管理
//!
//! - [`level`]: 画质等级与等级描述表
//! - [`scaling`]: 连续缩放因子与命名预设
//! - [`manager`]: 稳定性门控的自适应反馈回路

pub mod level;
pub mod manager;
pub mod scaling;

pub use level::{QualityFeatures, QualityLevel, QualityProfile, QualityProfiles};
pub use manager::{AdaptationKind, QualityManager, QualityStats};
pub use scaling::{default_presets, FactorBounds, ScalingFactors, BATTERY_SAVING_PRESET};
