//! # Particle Pipeline
//!
//! 2D 游戏的自适应粒子渲染管线：每帧从原始粒子集合中挑选值得绘制的粒子，
//! 按当前性能预算调整保真度，并把剩余粒子合并为尽量少的绘制批次。
//!
//! ## 管线顺序
//!
//! ```text
//! particles ─▶ CullingSystem::cull ─▶ QualityManager::apply_quality_scaling
//!           ─▶ BatchRenderer::create_render_batches ─▶ BatchRenderer::render_batches
//!
//! update_performance_metrics(fps) ─▶ QualityManager (自适应反馈回路)
//! ```
//!
//! ### Example
//!
//! ```ignore
//! use particle_pipeline::prelude::*;
//!
//! let mut pipeline = ParticlePipeline::new(PipelineConfig::default())?;
//! let result = pipeline.optimize(&particles, Some(&camera))?;
//! pipeline.render(&mut draw_context, &result);
//! pipeline.update_performance_metrics(measured_fps, frame_time_ms);
//! ```
//!
//! ## Modules
//!
//! - [`core`]: 错误类型、时间源、日志与通用宏
//! - [`config`]: 管线配置（TOML/JSON/环境变量）
//! - [`render`]: 粒子数据、剔除、画质管理与批量渲染
//! - [`performance`]: 对象池与环形缓冲区
//! - [`pipeline`]: 每帧编排器

/// Core types: errors, time source, logging
pub mod core;
/// Configuration system
pub mod config;
/// Particle culling, quality scaling and batch rendering
pub mod render;
/// Pooling and rolling-history primitives
pub mod performance;
/// Per-frame orchestrator
pub mod pipeline;

/// 常用类型的统一导出
pub mod prelude {
    pub use crate::config::{
        BatchingConfig, ConfigError, CullingConfig, LoggingConfig, PipelineConfig, QualityConfig,
    };
    pub use crate::core::{
        ManualClock, PipelineError, PipelineResult, SystemClock, TimeSource,
    };
    pub use crate::pipeline::{OptimizationResult, ParticlePipeline, PerformanceStats};
    pub use crate::render::batch::{
        BatchHandle, BatchRenderer, BatchStats, DrawCommand, DrawContext, RecordingContext,
        RenderBatch,
    };
    pub use crate::render::culling::{CullingStats, CullingSystem, OccluderId};
    pub use crate::render::particles::{BlendMode, Camera, Particle, ParticleFeatures, Rect};
    pub use crate::render::quality::{
        QualityLevel, QualityManager, QualityStats, ScalingFactors,
    };
}
