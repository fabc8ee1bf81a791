/// 统一配置系统
///
/// 提供TOML/JSON配置文件、环境变量覆盖和构造期校验
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub mod batching;
pub mod culling;
pub mod quality;

pub use batching::BatchingConfig;
pub use culling::{CullingConfig, ImportanceFactor, ImportanceNormalization, ImportanceWeights};
pub use quality::{QualityConfig, ValidationConfig};

use crate::impl_default;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    /// 解析错误
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// 验证错误
    #[error("Config validation error: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 管线主配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 是否在 `optimize` 前校验粒子数值
    #[serde(default = "default_validate_input")]
    pub validate_input: bool,

    /// 剔除配置
    #[serde(default)]
    pub culling: CullingConfig,

    /// 画质配置
    #[serde(default)]
    pub quality: QualityConfig,

    /// 批处理配置
    #[serde(default)]
    pub batching: BatchingConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_validate_input() -> bool {
    true
}

impl_default!(PipelineConfig {
    culling: CullingConfig::default(),
    quality: QualityConfig::default(),
    batching: BatchingConfig::default(),
    logging: LoggingConfig::default(),
    validate_input: true,
});

impl PipelineConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 从TOML文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_toml_str(&content)
    }

    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_json_str(&content)
    }

    /// 从JSON字符串解析配置
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 保存为TOML文件
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 保存为JSON文件
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 从环境变量覆盖配置
    ///
    /// 无法解析的值会被忽略并记录警告。
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("PARTICLE_PIPELINE_QUALITY_LEVEL") {
            match val.parse() {
                Ok(level) => self.quality.initial_level = level,
                Err(_) => {
                    tracing::warn!(target: "config", "Ignoring PARTICLE_PIPELINE_QUALITY_LEVEL={}", val)
                }
            }
        }
        if let Ok(val) = env::var("PARTICLE_PIPELINE_TARGET_FPS") {
            if let Ok(fps) = val.parse() {
                self.quality.target_fps = fps;
            }
        }
        if let Ok(val) = env::var("PARTICLE_PIPELINE_ADAPTIVE") {
            self.quality.adaptive = val.parse().unwrap_or(self.quality.adaptive);
        }
        if let Ok(val) = env::var("PARTICLE_PIPELINE_MAX_BATCH_SIZE") {
            if let Ok(size) = val.parse() {
                self.batching.max_batch_size = size;
            }
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        self.culling.validate()?;
        self.quality.validate()?;
        self.batching.validate()?;
        Ok(())
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: LogLevel,

    /// 是否输出 target
    pub with_target: bool,

    /// 是否使用 ANSI 颜色
    pub ansi: bool,
}

impl_default!(LoggingConfig {
    level: LogLevel::Info,
    with_target: true,
    ansi: true,
});

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// 跟踪
    Trace,
    /// 调试
    Debug,
    /// 信息
    Info,
    /// 警告
    Warn,
    /// 错误
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::quality::QualityLevel;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_serialization() {
        let config = PipelineConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: PipelineConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.batching.max_batch_size, parsed.batching.max_batch_size);
        assert_eq!(config.quality.initial_level, parsed.quality.initial_level);
        assert_eq!(
            config.quality.profiles.high.max_particles,
            parsed.quality.profiles.high.max_particles
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [quality]
            initial_level = "medium"
            critical_threshold = 20.0

            [batching]
            max_batch_size = 256
            "#,
        )
        .unwrap();

        assert_eq!(config.quality.initial_level, QualityLevel::Medium);
        assert_eq!(config.quality.critical_threshold, 20.0);
        assert_eq!(config.quality.downgrade_threshold, 45.0);
        assert_eq!(config.batching.max_batch_size, 256);
        assert!(config.culling.distance_culling);
        assert!(config.validate_input);
    }

    #[test]
    fn test_json_serialization() {
        let config = PipelineConfig::default();
        let json_str = serde_json::to_string(&config).unwrap();
        let parsed = PipelineConfig::from_json_str(&json_str).unwrap();
        assert_eq!(config.culling.max_distance, parsed.culling.max_distance);
        assert_eq!(config.quality.presets.len(), parsed.quality.presets.len());
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("PARTICLE_PIPELINE_QUALITY_LEVEL", "low");
        env::set_var("PARTICLE_PIPELINE_TARGET_FPS", "30");
        env::set_var("PARTICLE_PIPELINE_ADAPTIVE", "false");
        env::set_var("PARTICLE_PIPELINE_MAX_BATCH_SIZE", "not-a-number");

        let mut config = PipelineConfig::default();
        config.apply_env_overrides();

        for key in [
            "PARTICLE_PIPELINE_QUALITY_LEVEL",
            "PARTICLE_PIPELINE_TARGET_FPS",
            "PARTICLE_PIPELINE_ADAPTIVE",
            "PARTICLE_PIPELINE_MAX_BATCH_SIZE",
        ] {
            env::remove_var(key);
        }

        assert_eq!(config.quality.initial_level, QualityLevel::Low);
        assert_eq!(config.quality.target_fps, 30.0);
        assert!(!config.quality.adaptive);
        assert_eq!(config.batching.max_batch_size, 1000);
    }

    #[test]
    fn test_parse_error() {
        let err = PipelineConfig::from_toml_str("[quality\nbroken").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_validation_rejects_unordered_thresholds() {
        let mut config = PipelineConfig::default();
        config.quality.critical_threshold = 50.0;
        config.quality.downgrade_threshold = 45.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
