//! 粒子重要性评分
//!
//! 分数是若干归一化分量的加权和，结果夹到 [0,1]。分数按粒子 ID 缓存，
//! 记录计算时的帧号；超过有效窗口的条目不会被当作新鲜值读取，并在周期性清扫中移除。

use std::collections::HashMap;

use crate::config::{CullingConfig, ImportanceNormalization, ImportanceWeights};
use crate::render::particles::{Camera, Particle};

/// 评分时的帧上下文
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub camera: &'a Camera,
    pub now_ms: f64,
    pub max_distance: f32,
    pub max_age_ms: f64,
}

#[derive(Debug, Clone, Copy)]
struct CachedScore {
    score: f32,
    frame: u64,
}

/// 重要性评分器
#[derive(Debug)]
pub struct ImportanceScorer {
    weights: ImportanceWeights,
    normalization: ImportanceNormalization,
    cache: HashMap<u64, CachedScore>,
    validity_frames: u64,
    last_sweep_frame: u64,
    cache_hits: u64,
    cache_misses: u64,
}

impl ImportanceScorer {
    pub fn new(config: &CullingConfig) -> Self {
        Self {
            weights: config.importance_weights,
            normalization: config.importance_normalization,
            cache: HashMap::new(),
            validity_frames: config.importance_cache_frames.max(1),
            last_sweep_frame: 0,
            cache_hits: 0,
            cache_misses: 0,
        }
    }

    /// 更新权重和窗口；缓存的分数可能基于旧权重，一并清空
    pub fn configure(&mut self, config: &CullingConfig) {
        self.weights = config.importance_weights;
        self.normalization = config.importance_normalization;
        self.validity_frames = config.importance_cache_frames.max(1);
        self.cache.clear();
    }

    /// 直接计算分数，不读写缓存
    pub fn compute(&self, particle: &Particle, ctx: &ScoringContext<'_>) -> f32 {
        let w = &self.weights;
        let n = &self.normalization;

        let distance = particle.position_2d().distance(ctx.camera.center());
        let distance_norm = if ctx.max_distance > 0.0 {
            distance / ctx.max_distance
        } else {
            0.0
        };

        let age_norm = if ctx.max_age_ms > 0.0 {
            (particle.age_ms(ctx.now_ms) / ctx.max_age_ms) as f32
        } else {
            0.0
        };

        let depth_scale = 1.0 / (1.0 + particle.depth().max(0.0) / n.depth_falloff);
        let projected = particle.size * depth_scale;
        let area_norm = projected * projected / n.reference_area;

        let score = w.distance.apply(distance_norm)
            + w.size.apply(particle.size / n.reference_size)
            + w.opacity.apply(particle.opacity)
            + w.speed.apply(particle.speed() / n.reference_speed)
            + w.age.apply(age_norm)
            + w.screen_area.apply(area_norm)
            + w.priority.apply(particle.priority_or_default());

        crate::clamp_finite!(score, 0.0, 1.0)
    }

    /// 取得分数：缓存新鲜时直接返回，否则重新计算并写回
    pub fn score(&mut self, particle: &Particle, ctx: &ScoringContext<'_>, frame: u64) -> f32 {
        if let Some(cached) = self.cache.get(&particle.id) {
            if self.is_fresh(cached.frame, frame) {
                self.cache_hits += 1;
                return cached.score;
            }
        }

        self.cache_misses += 1;
        let score = self.compute(particle, ctx);
        self.cache.insert(particle.id, CachedScore { score, frame });
        score
    }

    fn is_fresh(&self, cached_frame: u64, frame: u64) -> bool {
        frame >= cached_frame && frame - cached_frame < self.validity_frames
    }

    /// 每个有效窗口清扫一次过期条目
    ///
    /// # 返回
    ///
    /// 本次移除的条目数。
    pub fn sweep(&mut self, frame: u64) -> usize {
        if frame.saturating_sub(self.last_sweep_frame) < self.validity_frames {
            return 0;
        }
        self.last_sweep_frame = frame;

        let window = self.validity_frames;
        let before = self.cache.len();
        self.cache
            .retain(|_, cached| frame >= cached.frame && frame - cached.frame < window);
        let removed = before - self.cache.len();
        if removed > 0 {
            tracing::trace!(target: "culling", "Swept {} stale importance scores at frame {}", removed, frame);
        }
        removed
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses
    }

    pub fn reset_counters(&mut self) {
        self.cache_hits = 0;
        self.cache_misses = 0;
    }

    pub fn clear(&mut self) {
        self.cache.clear();
        self.last_sweep_frame = 0;
    }
}
