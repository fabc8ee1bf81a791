//! 粒子剔除系统
//!
//! 把每帧的完整粒子集合缩减为值得渲染的子集。过滤器按固定顺序执行，
//! 后一个过滤器只处理前一个的幸存者：
//!
//! 1. 距离剔除（需要相机）：到相机中心的距离在 `[near, max]` 内
//! 2. 视锥剔除（需要相机）：包围正方形与扩展后的视口相交
//! 3. 年龄剔除：`now - birth <= max_age`
//! 4. 遮挡剔除（需要相机且存在遮挡物）：位置不在任何遮挡矩形内
//! 5. 重要性剔除（需要相机）：按分数降序保留前 `keep_percentage` 比例
//!
//! 关闭的过滤器直接放行；缺少相机（或视口面积为零）时所有依赖相机的过滤器都被跳过。

pub mod importance;
pub mod occluder;

use serde::Serialize;

use crate::config::CullingConfig;
use crate::core::{SharedClock, SystemClock};
use crate::render::particles::{Camera, Particle, Rect};

pub use importance::{ImportanceScorer, ScoringContext};
pub use occluder::{Occluder, OccluderId, OccluderSet};

/// 单次剔除的统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CullingStats {
    /// 输入粒子数
    pub total_particles: usize,
    /// 距离剔除移除数
    pub distance_culled: usize,
    /// 视锥剔除移除数
    pub frustum_culled: usize,
    /// 年龄剔除移除数
    pub age_culled: usize,
    /// 遮挡剔除移除数
    pub occlusion_culled: usize,
    /// 重要性剔除移除数
    pub importance_culled: usize,
    /// 最终保留数
    pub final_count: usize,
    /// 剔除效率 `1 - final / total`
    pub culling_efficiency: f32,
    /// 整个剔除过程耗时（毫秒）
    pub culling_time_ms: f64,
    /// 评分耗时（毫秒）
    pub scoring_time_ms: f64,
    /// 本次评分的缓存命中数
    pub cache_hits: u64,
    /// 本次评分的缓存未命中数
    pub cache_misses: u64,
}

/// 剔除系统
pub struct CullingSystem {
    config: CullingConfig,
    occluders: OccluderSet,
    scorer: ImportanceScorer,
    clock: SharedClock,
    keep_percentage: f32,
    frame: u64,
    stats: CullingStats,
}

impl CullingSystem {
    /// 使用系统时钟创建
    pub fn new(config: CullingConfig) -> Self {
        Self::with_clock(config, SystemClock::shared())
    }

    /// 使用注入的时钟创建
    pub fn with_clock(config: CullingConfig, clock: SharedClock) -> Self {
        let scorer = ImportanceScorer::new(&config);
        let keep_percentage = sanitize_keep(config.importance_keep_percentage);
        Self {
            config,
            occluders: OccluderSet::new(),
            scorer,
            clock,
            keep_percentage,
            frame: 0,
            stats: CullingStats::default(),
        }
    }

    /// 替换配置
    pub fn configure(&mut self, config: CullingConfig) {
        self.keep_percentage = sanitize_keep(config.importance_keep_percentage);
        self.scorer.configure(&config);
        self.config = config;
        tracing::debug!(target: "culling", "Culling configuration updated");
    }

    pub fn config(&self) -> &CullingConfig {
        &self.config
    }

    /// 设置重要性剔除保留比例，夹到 (0, 1]
    pub fn set_keep_percentage(&mut self, keep: f32) {
        self.keep_percentage = sanitize_keep(keep);
    }

    pub fn keep_percentage(&self) -> f32 {
        self.keep_percentage
    }

    /// 注册遮挡物
    pub fn add_occluder(&mut self, bounds: Rect) -> OccluderId {
        self.occluders.add(bounds)
    }

    /// 移除遮挡物
    pub fn remove_occluder(&mut self, id: OccluderId) -> bool {
        self.occluders.remove(id)
    }

    pub fn clear_occluders(&mut self) {
        self.occluders.clear();
    }

    pub fn occluder_count(&self) -> usize {
        self.occluders.len()
    }

    /// 已处理的非空帧数
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// 执行剔除
    ///
    /// # 参数
    ///
    /// * `particles` - 本帧全部粒子
    /// * `camera` - 视口快照；`None` 或零面积视口会跳过依赖相机的过滤器
    ///
    /// # 返回
    ///
    /// 幸存粒子的副本，保持输入顺序（重要性剔除启用时按分数降序）。
    pub fn cull(&mut self, particles: &[Particle], camera: Option<&Camera>) -> Vec<Particle> {
        self.stats = CullingStats::default();
        self.scorer.reset_counters();
        if particles.is_empty() {
            return Vec::new();
        }

        let start = self.clock.now_ms();
        self.frame += 1;
        let camera = camera.filter(|c| !c.is_degenerate());
        let mut survivors: Vec<&Particle> = particles.iter().collect();
        self.stats.total_particles = particles.len();

        if let Some(cam) = camera {
            if self.config.distance_culling {
                let (near, far) = (self.config.near_distance, self.config.max_distance);
                let center = cam.center();
                self.stats.distance_culled = retain_counting(&mut survivors, |p| {
                    let d = p.position_2d().distance(center);
                    d >= near && d <= far
                });
            }

            if self.config.frustum_culling {
                let view = cam.viewport().expanded(self.config.frustum_margin);
                self.stats.frustum_culled =
                    retain_counting(&mut survivors, |p| p.bounds().intersects(&view));
            }
        }

        if self.config.age_culling {
            let max_age = self.config.max_age_ms;
            self.stats.age_culled =
                retain_counting(&mut survivors, |p| p.age_ms(start) <= max_age);
        }

        if let Some(cam) = camera {
            if self.config.occlusion_culling && !self.occluders.is_empty() {
                let occluders = &self.occluders;
                self.stats.occlusion_culled =
                    retain_counting(&mut survivors, |p| !occluders.occludes(p.position_2d()));
            }

            if self.config.importance_culling && !survivors.is_empty() {
                self.stats.importance_culled =
                    self.importance_cull(&mut survivors, cam, start);
            }
        }

        self.stats.final_count = survivors.len();
        self.stats.culling_efficiency =
            1.0 - self.stats.final_count as f32 / self.stats.total_particles as f32;
        self.stats.cache_hits = self.scorer.cache_hits();
        self.stats.cache_misses = self.scorer.cache_misses();
        self.stats.culling_time_ms = self.clock.now_ms() - start;

        tracing::debug!(
            target: "culling",
            "Frame {}: {} -> {} particles (efficiency {:.2})",
            self.frame,
            self.stats.total_particles,
            self.stats.final_count,
            self.stats.culling_efficiency
        );

        survivors.into_iter().cloned().collect()
    }

    /// 重要性截断：评分、降序排序、保留前 `ceil(n * keep)` 个
    fn importance_cull(&mut self, survivors: &mut Vec<&Particle>, camera: &Camera, now_ms: f64) -> usize {
        let score_start = self.clock.now_ms();
        let ctx = ScoringContext {
            camera,
            now_ms,
            max_distance: self.config.max_distance,
            max_age_ms: self.config.max_age_ms,
        };
        let frame = self.frame;

        let mut scored: Vec<(f32, &Particle)> = survivors
            .iter()
            .map(|p| (self.scorer.score(p, &ctx, frame), *p))
            .collect();
        // 稳定排序，同分保持输入顺序
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let before = scored.len();
        let keep = ((before as f32 * self.keep_percentage).ceil() as usize).min(before);
        scored.truncate(keep);

        survivors.clear();
        survivors.extend(scored.into_iter().map(|(_, p)| p));

        self.scorer.sweep(frame);
        self.stats.scoring_time_ms = self.clock.now_ms() - score_start;
        before - keep
    }

    /// 获取最近一次剔除的统计
    pub fn stats(&self) -> CullingStats {
        self.stats
    }

    /// 重置统计
    pub fn reset_stats(&mut self) {
        self.stats = CullingStats::default();
        self.scorer.reset_counters();
    }

    /// 清空分数缓存
    pub fn clear_cache(&mut self) {
        self.scorer.clear();
    }

    pub fn cached_scores(&self) -> usize {
        self.scorer.cache_len()
    }
}

fn sanitize_keep(keep: f32) -> f32 {
    if keep.is_finite() && keep > 0.0 {
        keep.min(1.0)
    } else {
        1.0
    }
}

/// 保留满足条件的元素，返回移除数
fn retain_counting<'a, F>(items: &mut Vec<&'a Particle>, mut keep: F) -> usize
where
    F: FnMut(&Particle) -> bool,
{
    let before = items.len();
    items.retain(|p| keep(p));
    before - items.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ManualClock, TimeSource};
    use glam::Vec2;
    use proptest::prelude::*;

    fn system(config: CullingConfig) -> (CullingSystem, ManualClock) {
        let clock = ManualClock::new(10_000.0);
        (CullingSystem::with_clock(config, clock.shared()), clock)
    }

    fn only(mut f: impl FnMut(&mut CullingConfig)) -> CullingConfig {
        let mut config = CullingConfig {
            distance_culling: false,
            frustum_culling: false,
            age_culling: false,
            occlusion_culling: false,
            importance_culling: false,
            ..CullingConfig::default()
        };
        f(&mut config);
        config
    }

    #[test]
    fn test_empty_input_zero_stats() {
        let (mut culling, _) = system(CullingConfig::default());
        let camera = Camera::new(0.0, 0.0, 800.0, 600.0);
        assert!(culling.cull(&[], Some(&camera)).is_empty());
        assert_eq!(culling.stats(), CullingStats::default());
        assert_eq!(culling.frame(), 0);
    }

    #[test]
    fn test_distance_culling() {
        let (mut culling, _) = system(only(|c| {
            c.distance_culling = true;
            c.near_distance = 50.0;
            c.max_distance = 1500.0;
        }));
        let camera = Camera::new(0.0, 0.0, 800.0, 600.0);
        let particles = vec![
            Particle::new(1, 10.0, 0.0),
            Particle::new(2, 100.0, 0.0),
            Particle::new(3, 0.0, 1500.0),
            Particle::new(4, 2000.0, 0.0),
        ];

        let out = culling.cull(&particles, Some(&camera));
        let ids: Vec<u64> = out.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(culling.stats().distance_culled, 2);
    }

    #[test]
    fn test_missing_camera_disables_camera_filters() {
        let (mut culling, _) = system(CullingConfig::default());
        let particles = vec![
            Particle::new(1, 1e6, 1e6).with_birth_time(10_000.0),
            Particle::new(2, -1e6, 0.0).with_birth_time(10_000.0),
        ];

        assert_eq!(culling.cull(&particles, None).len(), 2);

        let flat = Camera::new(0.0, 0.0, 0.0, 600.0);
        assert_eq!(culling.cull(&particles, Some(&flat)).len(), 2);
    }

    #[test]
    fn test_frustum_culling_uses_margin_and_size() {
        let (mut culling, _) = system(only(|c| {
            c.frustum_culling = true;
            c.frustum_margin = 50.0;
        }));
        // 视口 [-400, 400] x [-300, 300]，扩展后 [-450, 450]
        let camera = Camera::new(0.0, 0.0, 800.0, 600.0);
        let particles = vec![
            Particle::new(1, 440.0, 0.0).with_size(2.0),
            Particle::new(2, 460.0, 0.0).with_size(2.0),
            Particle::new(3, 460.0, 0.0).with_size(30.0),
        ];

        let ids: Vec<u64> = culling
            .cull(&particles, Some(&camera))
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(culling.stats().frustum_culled, 1);
    }

    #[test]
    fn test_age_culling_boundaries() {
        let (mut culling, clock) = system(only(|c| {
            c.age_culling = true;
            c.max_age_ms = 1000.0;
        }));
        let now = clock.now_ms();
        let particles = vec![
            Particle::new(1, 0.0, 0.0).with_birth_time(now - 1001.0),
            Particle::new(2, 0.0, 0.0).with_birth_time(now),
            Particle::new(3, 0.0, 0.0).with_birth_time(now - 1000.0),
        ];

        let ids: Vec<u64> = culling.cull(&particles, None).iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(culling.stats().age_culled, 1);
    }

    #[test]
    fn test_occlusion_culling() {
        let (mut culling, _) = system(only(|c| c.occlusion_culling = true));
        let camera = Camera::new(0.0, 0.0, 800.0, 600.0);
        let particles = vec![Particle::new(1, 5.0, 5.0), Particle::new(2, 50.0, 50.0)];

        // 没有遮挡物时不过滤
        assert_eq!(culling.cull(&particles, Some(&camera)).len(), 2);

        let id = culling.add_occluder(Rect::new(0.0, 0.0, 10.0, 10.0));
        let out = culling.cull(&particles, Some(&camera));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, 2);
        assert_eq!(culling.stats().occlusion_culled, 1);

        assert!(culling.remove_occluder(id));
        assert_eq!(culling.cull(&particles, Some(&camera)).len(), 2);
    }

    #[test]
    fn test_importance_keeps_top_fraction() {
        let (mut culling, clock) = system(only(|c| {
            c.importance_culling = true;
            c.importance_keep_percentage = 0.5;
        }));
        let camera = Camera::new(0.0, 0.0, 800.0, 600.0);
        let now = clock.now_ms();
        let particles: Vec<Particle> = (0..10)
            .map(|i| Particle::new(i, i as f32 * 100.0, 0.0).with_birth_time(now))
            .collect();

        let out = culling.cull(&particles, Some(&camera));
        let ids: Vec<u64> = out.iter().map(|p| p.id).collect();
        // 距离越近分数越高
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(culling.stats().importance_culled, 5);
        assert!((culling.stats().culling_efficiency - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_importance_never_drops_single_survivor() {
        let (mut culling, _) = system(only(|c| c.importance_culling = true));
        let camera = Camera::new(0.0, 0.0, 800.0, 600.0);
        let out = culling.cull(&[Particle::new(1, 0.0, 0.0)], Some(&camera));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_default_pipeline_stats_add_up() {
        let (mut culling, clock) = system(CullingConfig::default());
        let camera = Camera::new(0.0, 0.0, 800.0, 600.0);
        let now = clock.now_ms();
        let particles: Vec<Particle> = (0..200)
            .map(|i| {
                Particle::new(i, (i as f32 - 100.0) * 10.0, 0.0)
                    .with_velocity(Vec2::new(1.0, 0.0))
                    .with_birth_time(now - (i as f64) * 100.0)
            })
            .collect();

        let out = culling.cull(&particles, Some(&camera));
        let s = culling.stats();
        assert_eq!(s.total_particles, 200);
        assert_eq!(
            s.total_particles
                - s.distance_culled
                - s.frustum_culled
                - s.age_culled
                - s.occlusion_culled
                - s.importance_culled,
            s.final_count
        );
        assert_eq!(out.len(), s.final_count);
        assert_eq!(s.cache_misses as usize + s.cache_hits as usize, s.final_count + s.importance_culled);
    }

    #[test]
    fn test_keep_percentage_is_clamped() {
        let (mut culling, _) = system(CullingConfig::default());
        assert_eq!(culling.keep_percentage(), 0.8);
        culling.set_keep_percentage(3.0);
        assert_eq!(culling.keep_percentage(), 1.0);
        culling.set_keep_percentage(f32::NAN);
        assert_eq!(culling.keep_percentage(), 1.0);
    }

    proptest! {
        #[test]
        fn prop_distance_culling_bounds(
            points in proptest::collection::vec((-3000.0f32..3000.0, -3000.0f32..3000.0), 0..200)
        ) {
            let (mut culling, _) = system(only(|c| {
                c.distance_culling = true;
                c.near_distance = 50.0;
                c.max_distance = 1500.0;
            }));
            let camera = Camera::new(0.0, 0.0, 800.0, 600.0);
            let particles: Vec<Particle> = points
                .iter()
                .enumerate()
                .map(|(i, (x, y))| Particle::new(i as u64, *x, *y))
                .collect();

            for p in culling.cull(&particles, Some(&camera)) {
                let d = p.position_2d().length();
                prop_assert!((50.0..=1500.0).contains(&d));
            }
        }
    }
}
