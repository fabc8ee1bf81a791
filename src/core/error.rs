//! 统一错误处理模块
//!
//! 提供管线范围内的错误类型定义
//!
//! ## 错误分类
//!
//! - **配置错误**: 未知的画质等级或缩放预设，非致命，调用方可以忽略
//! - **输入错误**: 粒子字段包含非有限数值，属于调用方的编程错误
//! - **配置文件错误**: 由 [`ConfigError`] 转换而来
//!
//! 每帧热路径上的预期情况（空输入、缺失相机、池耗尽）不会产生错误。

use crate::config::ConfigError;
use thiserror::Error;

/// 管线错误类型
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Unknown quality level: {0}")]
    UnknownQualityLevel(String),

    #[error("Unknown scaling preset: {0}")]
    UnknownPreset(String),

    #[error("Invalid particle {id}: {reason}")]
    InvalidParticle { id: u64, reason: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// 管线结果类型别名
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let config_err = ConfigError::ValidationError("bad threshold".to_string());
        let err: PipelineError = config_err.into();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_error_display() {
        let err = PipelineError::UnknownQualityLevel("extreme".to_string());
        assert_eq!(err.to_string(), "Unknown quality level: extreme");

        let err = PipelineError::InvalidParticle {
            id: 7,
            reason: "size is NaN".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid particle 7: size is NaN");
    }
}
