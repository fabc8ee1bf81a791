//! 每帧编排器
//!
//! 按固定顺序串联三个阶段：剔除 → 画质缩放 → 分批，然后由调用方决定
//! 何时绘制。编排器同时跟踪粒子数量趋势和每帧耗时，供 HUD/遥测读取。
//!
//! ```ignore
//! let mut pipeline = ParticlePipeline::new(PipelineConfig::default())?;
//! let result = pipeline.run_frame(&particles, Some(&camera), &mut ctx)?;
//! pipeline.update_performance_metrics(measured_fps, frame_time_ms);
//! ```

use serde::Serialize;

use crate::config::PipelineConfig;
use crate::core::{PipelineResult, SharedClock, SystemClock};
use crate::performance::RingBuffer;
use crate::render::batch::{BatchHandle, BatchRenderer, BatchStats, DrawContext};
use crate::render::culling::{CullingStats, CullingSystem};
use crate::render::particles::{Camera, Particle};
use crate::render::quality::{QualityLevel, QualityManager, QualityStats};

/// 粒子数量指数移动平均的平滑系数
const PARTICLE_EMA_ALPHA: f64 = 0.1;
/// 帧指标历史长度
const FRAME_HISTORY: usize = 60;
/// 估算帧率和平均耗时使用的最近帧数
const RECENT_FRAMES: usize = 30;
/// 帧指标不足时假定的帧率
const FALLBACK_FPS: f64 = 60.0;

/// 单帧优化结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationResult {
    pub frame: u64,
    /// 输入粒子数
    pub original_count: usize,
    /// 剔除后的粒子数
    pub visible_count: usize,
    /// 画质缩放后的粒子数
    pub final_count: usize,
    #[serde(skip)]
    pub batches: Vec<BatchHandle>,
    pub batch_count: usize,
    pub optimization_time_ms: f64,
    pub culling_time_ms: f64,
    pub scaling_time_ms: f64,
    pub batching_time_ms: f64,
    pub culling_efficiency: f32,
    /// `(original - final) / original`，输入为空时为 0
    pub performance_gain: f32,
}

/// 每帧记录
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameMetrics {
    pub frame: u64,
    pub optimization_time_ms: f64,
    pub culling_time_ms: f64,
    pub batching_time_ms: f64,
    pub original_particles: usize,
    pub final_particles: usize,
    pub timestamp_ms: f64,
}

/// 粒子数量趋势
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ParticleTracking {
    /// 最近一帧的输入粒子数
    pub total: usize,
    /// 最近一帧提交的粒子数
    pub frame: usize,
    /// 指数移动平均
    pub average: f64,
    /// 峰值
    pub peak: usize,
}

impl ParticleTracking {
    fn record(&mut self, count: usize) {
        self.total = count;
        self.frame = count;
        self.average = (1.0 - PARTICLE_EMA_ALPHA) * self.average + PARTICLE_EMA_ALPHA * count as f64;
        self.peak = self.peak.max(count);
    }
}

/// 编排器整体统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OverallStats {
    pub frames: u64,
    pub last_optimization_time_ms: f64,
    pub average_optimization_time_ms: f64,
    pub estimated_fps: f64,
    pub culling_time_ms: f64,
    pub batching_time_ms: f64,
    pub render_time_ms: f64,
    pub hidden: bool,
}

/// 汇总统计，可序列化后直接送往 HUD
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub overall: OverallStats,
    pub culling: CullingStats,
    pub batching: BatchStats,
    pub quality: QualityStats,
    pub particles: ParticleTracking,
}

impl PerformanceStats {
    /// 序列化为 JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// 粒子渲染管线
pub struct ParticlePipeline {
    config: PipelineConfig,
    clock: SharedClock,
    culling: CullingSystem,
    quality: QualityManager,
    batching: BatchRenderer,
    tracking: ParticleTracking,
    frame_metrics: RingBuffer<FrameMetrics>,
    frame: u64,
    hidden: bool,
}

impl ParticlePipeline {
    /// 使用系统时钟创建，配置无效时返回错误
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        Self::with_clock(config, SystemClock::shared())
    }

    /// 使用注入的时钟创建，三个阶段共享同一个时钟
    pub fn with_clock(config: PipelineConfig, clock: SharedClock) -> PipelineResult<Self> {
        config.validate()?;

        let pipeline = Self {
            culling: CullingSystem::with_clock(config.culling.clone(), clock.clone()),
            quality: QualityManager::with_clock(config.quality.clone(), clock.clone()),
            batching: BatchRenderer::with_clock(config.batching.clone(), clock.clone()),
            tracking: ParticleTracking::default(),
            frame_metrics: RingBuffer::new(FRAME_HISTORY),
            frame: 0,
            hidden: false,
            clock,
            config,
        };

        tracing::info!(
            target: "pipeline",
            "Particle pipeline initialized (quality: {}, adaptive: {})",
            pipeline.quality.current_level(),
            pipeline.quality.is_adaptive()
        );
        Ok(pipeline)
    }

    /// 执行一帧的剔除、缩放和分批
    ///
    /// # 参数
    ///
    /// * `particles` - 本帧全部粒子
    /// * `camera` - 可选视口
    ///
    /// # 错误
    ///
    /// 启用输入校验时，包含非有限数值的粒子返回 [`PipelineError::InvalidParticle`]，
    /// 此时各阶段状态保持不变。
    ///
    /// [`PipelineError::InvalidParticle`]: crate::core::PipelineError::InvalidParticle
    pub fn optimize(
        &mut self,
        particles: &[Particle],
        camera: Option<&Camera>,
    ) -> PipelineResult<OptimizationResult> {
        if self.config.validate_input {
            for particle in particles {
                particle.validate()?;
            }
        }

        let start = self.clock.now_ms();
        self.tracking.record(particles.len());

        let culling_start = self.clock.now_ms();
        let visible = self.culling.cull(particles, camera);
        let culling_time_ms = self.clock.now_ms() - culling_start;

        let scaling_start = self.clock.now_ms();
        let scaled = self.quality.apply_quality_scaling(&visible);
        let scaling_time_ms = self.clock.now_ms() - scaling_start;

        let batching_start = self.clock.now_ms();
        let batches = self.batching.create_render_batches(&scaled);
        let batching_time_ms = self.clock.now_ms() - batching_start;

        let optimization_time_ms = self.clock.now_ms() - start;
        self.frame += 1;
        self.frame_metrics.push(FrameMetrics {
            frame: self.frame,
            optimization_time_ms,
            culling_time_ms,
            batching_time_ms,
            original_particles: particles.len(),
            final_particles: scaled.len(),
            timestamp_ms: start,
        });

        let result = OptimizationResult {
            frame: self.frame,
            original_count: particles.len(),
            visible_count: visible.len(),
            final_count: scaled.len(),
            batch_count: batches.len(),
            batches,
            optimization_time_ms,
            culling_time_ms,
            scaling_time_ms,
            batching_time_ms,
            culling_efficiency: self.culling.stats().culling_efficiency,
            performance_gain: performance_gain(particles.len(), scaled.len()),
        };

        tracing::trace!(
            target: "pipeline",
            "Frame {}: {} -> {} visible -> {} final in {} batches",
            result.frame,
            result.original_count,
            result.visible_count,
            result.final_count,
            result.batch_count
        );
        Ok(result)
    }

    /// 绘制一帧的批次，之后这些批次回到对象池
    pub fn render<C>(&mut self, ctx: &mut C, result: &OptimizationResult)
    where
        C: DrawContext + ?Sized,
    {
        self.batching.render_batches(ctx, &result.batches);
    }

    /// `optimize` 之后立即 `render`
    pub fn run_frame<C>(
        &mut self,
        particles: &[Particle],
        camera: Option<&Camera>,
        ctx: &mut C,
    ) -> PipelineResult<OptimizationResult>
    where
        C: DrawContext + ?Sized,
    {
        let result = self.optimize(particles, camera)?;
        self.render(ctx, &result);
        Ok(result)
    }

    /// 把外部帧时钟测得的帧率交给画质管理器
    pub fn update_performance_metrics(&mut self, fps: f32, frame_time_ms: f32) {
        self.quality.update_performance_metrics(fps, frame_time_ms);
    }

    /// 用帧指标时间戳估算的帧率驱动画质管理器
    ///
    /// 适用于宿主不单独测量帧率的情况；帧指标不足两帧时不做任何事。
    pub fn adapt_from_frame_metrics(&mut self) {
        if self.frame_metrics.len() < 2 {
            return;
        }
        let fps = self.estimated_fps();
        self.quality
            .update_performance_metrics(fps as f32, (1000.0 / fps) as f32);
    }

    /// 根据最近帧的时间戳估算帧率，不足两帧时为 60
    pub fn estimated_fps(&self) -> f64 {
        let recent: Vec<&FrameMetrics> = self.frame_metrics.recent(RECENT_FRAMES).collect();
        let (Some(first), Some(last)) = (recent.first(), recent.last()) else {
            return FALLBACK_FPS;
        };
        if recent.len() < 2 {
            return FALLBACK_FPS;
        }
        let frame_time = (last.timestamp_ms - first.timestamp_ms) / (recent.len() - 1) as f64;
        if frame_time > 0.0 {
            1000.0 / frame_time
        } else {
            FALLBACK_FPS
        }
    }

    /// 宿主可见性变化：隐藏时降到 low，恢复时回到配置的初始等级
    pub fn set_visibility(&mut self, hidden: bool) {
        if hidden == self.hidden {
            return;
        }
        self.hidden = hidden;
        let level = if hidden {
            QualityLevel::Low
        } else {
            self.config.quality.initial_level
        };
        self.quality.set_level(level);
        tracing::debug!(target: "pipeline", "Visibility changed (hidden: {}), quality {}", hidden, level);
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// 汇总统计快照
    pub fn performance_stats(&self) -> PerformanceStats {
        let recent: Vec<&FrameMetrics> = self.frame_metrics.recent(RECENT_FRAMES).collect();
        let average_optimization_time_ms = if recent.is_empty() {
            0.0
        } else {
            recent.iter().map(|m| m.optimization_time_ms).sum::<f64>() / recent.len() as f64
        };
        let last = self.frame_metrics.last();
        let batching = self.batching.stats();

        PerformanceStats {
            overall: OverallStats {
                frames: self.frame,
                last_optimization_time_ms: last.map_or(0.0, |m| m.optimization_time_ms),
                average_optimization_time_ms,
                estimated_fps: self.estimated_fps(),
                culling_time_ms: last.map_or(0.0, |m| m.culling_time_ms),
                batching_time_ms: last.map_or(0.0, |m| m.batching_time_ms),
                render_time_ms: batching.render_time_ms,
                hidden: self.hidden,
            },
            culling: self.culling.stats(),
            batching,
            quality: self.quality.stats(),
            particles: self.tracking,
        }
    }

    /// 最近的帧指标（从旧到新）
    pub fn frame_metrics(&self) -> impl Iterator<Item = &FrameMetrics> {
        self.frame_metrics.iter()
    }

    /// 重新配置三个阶段
    ///
    /// 新配置先校验，无效时返回错误且保持原配置。
    pub fn configure(&mut self, config: PipelineConfig) -> PipelineResult<()> {
        config.validate()?;
        self.culling.configure(config.culling.clone());
        self.quality.configure(config.quality.clone());
        self.batching.configure(config.batching.clone());
        self.config = config;
        tracing::info!(target: "pipeline", "Pipeline configuration updated");
        Ok(())
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn culling(&self) -> &CullingSystem {
        &self.culling
    }

    pub fn culling_mut(&mut self) -> &mut CullingSystem {
        &mut self.culling
    }

    pub fn quality(&self) -> &QualityManager {
        &self.quality
    }

    pub fn quality_mut(&mut self) -> &mut QualityManager {
        &mut self.quality
    }

    pub fn batch_renderer(&self) -> &BatchRenderer {
        &self.batching
    }

    /// 清空统计、批次池和帧历史
    pub fn shutdown(&mut self) {
        self.culling.reset_stats();
        self.culling.clear_cache();
        self.batching.cleanup();
        self.quality.reset_stats();
        self.frame_metrics.clear();
        self.tracking = ParticleTracking::default();
        tracing::info!(target: "pipeline", "Particle pipeline shut down after {} frames", self.frame);
    }
}

fn performance_gain(original: usize, final_count: usize) -> f32 {
    if original == 0 {
        return 0.0;
    }
    (original.saturating_sub(final_count)) as f32 / original as f32
}
