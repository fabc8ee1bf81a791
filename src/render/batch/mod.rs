//! 批量渲染
//!
//! 把最终粒子列表合并为尽量少的同材质绘制批次：
//!
//! 1. 按 (纹理, 混合模式, 深度) 排序，让同材质粒子连续
//! 2. 线性扫描分组，材质变化或批次达到上限时开新批次
//! 3. 为每个批次计算包围盒、顶点/索引缓冲，并分配图集槽位
//! 4. 通过 [`DrawContext`] 绘制后把批次归还对象池
//!
//! 批次对象来自容量为 `max_batches` 的 [`ObjectArena`]，调用方只持有
//! [`BatchHandle`]，批次被回收后旧句柄解析为 `None`。

pub mod atlas;
pub mod draw;
pub mod material;
pub mod render_batch;

use serde::Serialize;

use crate::config::BatchingConfig;
use crate::core::{SharedClock, SystemClock};
use crate::performance::{ArenaHandle, ObjectArena};
use crate::render::particles::{compare_for_batching, Particle};

pub use atlas::TextureAtlas;
pub use draw::{DrawCommand, DrawContext, RecordingContext};
pub use material::MaterialKey;
pub use render_batch::{ParticleVertex, RenderBatch};

/// 批次句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchHandle(ArenaHandle);

/// 批处理统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BatchStats {
    pub batch_count: usize,
    pub particle_count: usize,
    pub average_batch_size: f32,
    /// `min(1, particles / batches / max_batch_size)`，没有批次时为 0
    pub batch_efficiency: f32,
    pub draw_calls: usize,
    pub vertices: usize,
    pub triangles: usize,
    pub atlas_slots_used: usize,
    pub atlas_misses: u64,
    pub pool_allocations: u64,
    pub pool_reuses: u64,
    pub pool_drops: u64,
    pub batching_time_ms: f64,
    pub render_time_ms: f64,
    /// 累计渲染帧数
    pub frames_rendered: u64,
}

/// 批量渲染器
pub struct BatchRenderer {
    config: BatchingConfig,
    pool: ObjectArena<RenderBatch>,
    live: Vec<BatchHandle>,
    atlas: TextureAtlas,
    clock: SharedClock,
    stats: BatchStats,
}

impl BatchRenderer {
    /// 使用系统时钟创建
    pub fn new(config: BatchingConfig) -> Self {
        Self::with_clock(config, SystemClock::shared())
    }

    /// 使用注入的时钟创建
    pub fn with_clock(config: BatchingConfig, clock: SharedClock) -> Self {
        Self {
            pool: ObjectArena::new(config.max_batches),
            atlas: TextureAtlas::new(config.atlas_slots),
            live: Vec::new(),
            clock,
            stats: BatchStats::default(),
            config,
        }
    }

    /// 替换配置；池和图集容量变化时重建
    pub fn configure(&mut self, config: BatchingConfig) {
        if config.max_batches != self.config.max_batches {
            self.live.clear();
            self.pool = ObjectArena::new(config.max_batches);
        }
        if config.atlas_slots != self.config.atlas_slots {
            self.atlas = TextureAtlas::new(config.atlas_slots);
        }
        self.config = config;
        tracing::debug!(target: "batching", "Batching configuration updated");
    }

    pub fn config(&self) -> &BatchingConfig {
        &self.config
    }

    /// 把粒子分组为渲染批次
    ///
    /// 上一帧未渲染的批次会先被回收，它们的句柄随之失效。
    /// 输入为空时返回空列表，本帧统计归零。
    pub fn create_render_batches(&mut self, particles: &[Particle]) -> Vec<BatchHandle> {
        let start = self.clock.now_ms();
        self.reclaim_live();
        self.begin_frame_stats();

        if particles.is_empty() {
            return Vec::new();
        }

        let mut sorted: Vec<&Particle> = particles.iter().collect();
        let (by_texture, by_blend) = (self.config.sort_by_texture, self.config.sort_by_blend_mode);
        sorted.sort_by(|a, b| compare_for_batching(a, b, by_texture, by_blend));

        let max_size = self.config.effective_batch_size();
        let mut handles: Vec<BatchHandle> = Vec::new();
        let mut current: Option<ArenaHandle> = None;

        for particle in sorted {
            let fits = current
                .and_then(|h| self.pool.get(h))
                .is_some_and(|batch| batch.len() < max_size && batch.material.matches(particle));

            if !fits {
                let (handle, batch) = self.pool.acquire();
                batch.reset_for(particle);
                handles.push(BatchHandle(handle));
                current = Some(handle);
            }
            if let Some(batch) = current.and_then(|h| self.pool.get_mut(h)) {
                batch.particles.push(particle.clone());
            }
        }

        for handle in &handles {
            if let Some(batch) = self.pool.get_mut(handle.0) {
                batch.build_geometry();
                if self.config.atlas_optimization {
                    batch.atlas_slot = self.atlas.slot_for(&batch.material.texture);
                }
            }
        }

        self.live.extend_from_slice(&handles);
        self.record_batching(particles.len(), handles.len(), start);
        handles
    }

    fn reclaim_live(&mut self) {
        for handle in self.live.drain(..) {
            self.pool.release(handle.0);
        }
    }

    fn begin_frame_stats(&mut self) {
        let frames_rendered = self.stats.frames_rendered;
        self.stats = BatchStats {
            frames_rendered,
            ..BatchStats::default()
        };
    }

    fn record_batching(&mut self, particle_count: usize, batch_count: usize, start: f64) {
        // 关闭合批时也按配置的批次大小计算
        let max_size = self.config.max_batch_size.max(1);
        let pool = self.pool.stats();

        self.stats.batch_count = batch_count;
        self.stats.particle_count = particle_count;
        self.stats.average_batch_size = if batch_count == 0 {
            0.0
        } else {
            particle_count as f32 / batch_count as f32
        };
        self.stats.batch_efficiency = if batch_count == 0 {
            0.0
        } else {
            (self.stats.average_batch_size / max_size as f32).min(1.0)
        };
        self.stats.atlas_slots_used = self.atlas.used();
        self.stats.atlas_misses = self.atlas.misses();
        self.stats.pool_allocations = pool.allocations;
        self.stats.pool_reuses = pool.reuses;
        self.stats.pool_drops = pool.drops;
        self.stats.batching_time_ms = self.clock.now_ms() - start;

        tracing::debug!(
            target: "batching",
            "Built {} batches for {} particles (efficiency {:.2})",
            batch_count,
            particle_count,
            self.stats.batch_efficiency
        );
    }

    /// 解析句柄；批次已被回收时返回 `None`
    pub fn batch(&self, handle: BatchHandle) -> Option<&RenderBatch> {
        self.pool.get(handle.0)
    }

    /// 按顺序解析一组句柄，跳过失效的
    pub fn batches<'a>(
        &'a self,
        handles: &'a [BatchHandle],
    ) -> impl Iterator<Item = &'a RenderBatch> + 'a {
        handles.iter().filter_map(move |h| self.batch(*h))
    }

    /// 绘制批次并归还对象池
    ///
    /// 每个批次绘制前切换到它的混合模式，绘制后恢复到之前的模式。
    pub fn render_batches<C>(&mut self, ctx: &mut C, handles: &[BatchHandle])
    where
        C: DrawContext + ?Sized,
    {
        let start = self.clock.now_ms();

        for handle in handles {
            let Some(batch) = self.pool.get(handle.0) else {
                continue;
            };
            if batch.is_empty() {
                continue;
            }

            let previous = ctx.blend_mode();
            ctx.set_blend_mode(batch.blend_mode());
            for particle in &batch.particles {
                ctx.fill_circle(
                    particle.position_2d(),
                    particle.size * 0.5,
                    particle.color_or_default(),
                    particle.opacity,
                );
            }
            ctx.set_blend_mode(previous);

            self.stats.draw_calls += 1;
            self.stats.vertices += batch.vertices.len();
            self.stats.triangles += batch.triangle_count();
        }

        for handle in handles {
            self.pool.release(handle.0);
        }
        self.live.retain(|h| !handles.contains(h));

        self.stats.frames_rendered += 1;
        self.stats.render_time_ms = self.clock.now_ms() - start;
        tracing::trace!(
            target: "batching",
            "Rendered {} draw calls, {} triangles",
            self.stats.draw_calls,
            self.stats.triangles
        );
    }

    /// 等待绘制的批次数
    pub fn live_batches(&self) -> usize {
        self.live.len()
    }

    /// 池中可复用的批次数
    pub fn pooled_batches(&self) -> usize {
        self.pool.available_count()
    }

    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = BatchStats::default();
        self.pool.reset_stats();
        self.atlas.reset_misses();
    }

    /// 释放所有批次、对象池和图集，所有句柄失效
    pub fn cleanup(&mut self) {
        self.live.clear();
        self.pool.clear();
        self.atlas.clear();
        self.stats = BatchStats::default();
        tracing::debug!(target: "batching", "Batch renderer cleaned up");
    }
}
