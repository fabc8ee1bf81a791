//! 自适应画质管理器
//!
//! 维护"当前画质等级 + 连续缩放因子"，由 [`QualityManager::update_performance_metrics`]
//! 驱动的稳定性门控反馈回路调整：
//!
//! ```text
//! fps ─▶ 历史 ─▶ 冷却门 ─▶ 紧急降级 (avg < critical)
//!                       └▶ 稳定性门 (最近窗口 std < tolerance × mean，连续 N 帧)
//!                             ├▶ avg < downgrade: 降一级 / 已最低则缩小因子
//!                             └▶ avg > upgrade:   升一级 / 已最高则放大因子
//! ```
//!
//! 自动升级后进入验证期：验证期内只允许紧急降级，期满时平均帧率不达标则回滚到
//! 升级前的状态并进入更长的冷却。手动设置等级默认关闭自适应，直到
//! [`QualityManager::set_adaptive`] 重新开启。

use serde::Serialize;

use super::level::{QualityLevel, QualityProfile};
use super::scaling::{ScalingFactors, BATTERY_SAVING_PRESET};
use crate::config::QualityConfig;
use crate::core::{PipelineError, PipelineResult, SharedClock, SystemClock};
use crate::performance::RingBuffer;
use crate::render::particles::Particle;

/// 自适应调整的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptationKind {
    Downgrade,
    Upgrade,
    EmergencyReduction,
    FactorDecrease,
    FactorIncrease,
    Rollback,
}

#[derive(Debug, Clone, Copy, Default)]
struct AdaptationCounters {
    downgrades: u64,
    upgrades: u64,
    emergency_reductions: u64,
    factor_steps: u64,
    rollbacks: u64,
    user_overrides: u64,
}

/// 等待验证的自动升级
#[derive(Debug, Clone)]
struct PendingValidation {
    previous_level: QualityLevel,
    previous_factors: ScalingFactors,
    previous_preset: Option<String>,
    started_ms: f64,
    fps_sum: f64,
    samples: u32,
}

/// 画质管理器统计快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityStats {
    pub level: QualityLevel,
    pub scaling_factors: ScalingFactors,
    pub active_preset: Option<String>,
    pub quality_score: f32,
    pub target_fps: f32,
    pub average_fps: f32,
    /// `average_fps / target_fps`，没有样本时为 0
    pub fps_headroom: f32,
    pub average_frame_time_ms: f32,
    pub samples: usize,
    pub stable_frames: u32,
    pub downgrades: u64,
    pub upgrades: u64,
    pub emergency_reductions: u64,
    pub factor_steps: u64,
    pub rollbacks: u64,
    /// 手动设置等级的次数
    pub user_overrides: u64,
    pub user_override_active: bool,
    pub validation_pending: bool,
    pub last_adaptation: Option<AdaptationKind>,
    pub last_adaptation_ms: Option<f64>,
    /// 最近一次缩放的输入数
    pub last_input_count: usize,
    /// 最近一次缩放的输出数
    pub last_output_count: usize,
}

/// 画质管理器
pub struct QualityManager {
    config: QualityConfig,
    clock: SharedClock,
    level: QualityLevel,
    factors: ScalingFactors,
    active_preset: Option<String>,
    fps_history: RingBuffer<f32>,
    frame_time_history: RingBuffer<f32>,
    average_fps: f32,
    stable_frames: u32,
    last_adaptation: Option<AdaptationKind>,
    last_adaptation_ms: Option<f64>,
    cooldown_until_ms: Option<f64>,
    pending_validation: Option<PendingValidation>,
    consecutive_rollbacks: u32,
    user_override_active: bool,
    counters: AdaptationCounters,
    last_input_count: usize,
    last_output_count: usize,
}

impl QualityManager {
    /// 使用系统时钟创建
    pub fn new(config: QualityConfig) -> Self {
        Self::with_clock(config, SystemClock::shared())
    }

    /// 使用注入的时钟创建
    pub fn with_clock(config: QualityConfig, clock: SharedClock) -> Self {
        let level = config.initial_level;
        let factors = config.profiles.get(level).scaling.clamped();
        let history_size = config.history_size;
        Self {
            config,
            clock,
            level,
            factors,
            active_preset: None,
            fps_history: RingBuffer::new(history_size),
            frame_time_history: RingBuffer::new(history_size),
            average_fps: 0.0,
            stable_frames: 0,
            last_adaptation: None,
            last_adaptation_ms: None,
            cooldown_until_ms: None,
            pending_validation: None,
            consecutive_rollbacks: 0,
            user_override_active: false,
            counters: AdaptationCounters::default(),
            last_input_count: 0,
            last_output_count: 0,
        }
    }

    /// 替换配置，保留当前等级与因子
    pub fn configure(&mut self, config: QualityConfig) {
        if config.history_size != self.config.history_size {
            self.fps_history = RingBuffer::new(config.history_size);
            self.frame_time_history = RingBuffer::new(config.history_size);
            self.average_fps = 0.0;
        }
        self.stable_frames = 0;
        self.config = config;
        tracing::debug!(target: "quality", "Quality configuration updated");
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// 开启或关闭自适应
    ///
    /// 开启时清除手动覆盖并重置连续回滚计数。
    pub fn set_adaptive(&mut self, adaptive: bool) {
        self.config.adaptive = adaptive;
        self.stable_frames = 0;
        self.pending_validation = None;
        self.user_override_active = !adaptive;
        if adaptive {
            self.consecutive_rollbacks = 0;
        }
        tracing::debug!(target: "quality", "Adaptive quality set to {}", adaptive);
    }

    pub fn is_adaptive(&self) -> bool {
        self.config.adaptive
    }

    pub fn current_level(&self) -> QualityLevel {
        self.level
    }

    /// 当前等级名称
    pub fn get_current_quality_level(&self) -> &'static str {
        self.level.as_str()
    }

    pub fn profile(&self) -> &QualityProfile {
        self.config.profiles.get(self.level)
    }

    pub fn scaling_factors(&self) -> ScalingFactors {
        self.factors
    }

    /// 当前粒子上限 `floor(max_particles × particle_count)`
    pub fn particle_cap(&self) -> usize {
        let max = self.profile().max_particles as f32;
        (max * self.factors.particle_count).floor().max(0.0) as usize
    }

    /// 手动按名称切换等级
    ///
    /// `preserve_adaptive` 为 false 时关闭自适应，手动选择不会被反馈回路覆盖。
    /// 未知名称记录警告并返回错误，当前状态保持不变。
    pub fn set_quality_level(
        &mut self,
        name: &str,
        preserve_adaptive: bool,
    ) -> PipelineResult<()> {
        match name.parse::<QualityLevel>() {
            Ok(level) => {
                tracing::info!(target: "quality", "Manual quality override to {}", level);
                self.counters.user_overrides += 1;
                self.pending_validation = None;
                if !preserve_adaptive {
                    self.config.adaptive = false;
                    self.user_override_active = true;
                }
                self.stable_frames = 0;
                self.set_level(level);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(target: "quality", "Ignoring unknown quality level '{}'", name);
                Err(err)
            }
        }
    }

    /// 切换到指定等级，并采用该等级的缩放因子，不影响自适应状态
    pub fn set_level(&mut self, level: QualityLevel) {
        if level == self.level {
            return;
        }
        tracing::info!(target: "quality", "Quality level {} -> {}", self.level, level);
        self.level = level;
        self.factors = self.config.profiles.get(level).scaling.clamped();
        self.active_preset = None;
    }

    /// 应用命名缩放预设
    pub fn apply_scaling_preset(&mut self, name: &str) -> PipelineResult<()> {
        let Some(preset) = self.config.presets.get(name) else {
            tracing::warn!(target: "quality", "Ignoring unknown scaling preset '{}'", name);
            return Err(PipelineError::UnknownPreset(name.to_string()));
        };
        self.factors = preset.clamped();
        self.active_preset = Some(name.to_string());
        tracing::info!(target: "quality", "Applied scaling preset '{}'", name);
        Ok(())
    }

    /// 画质分数，仅用于遥测
    pub fn calculate_quality_score(&self) -> f32 {
        self.factors.quality_score()
    }

    /// 按当前等级和缩放因子生成粒子副本
    ///
    /// 超出上限时按固定步长 `ceil(n / cap)` 抽样，然后缩放尺寸与不透明度，
    /// 并去掉当前等级不允许的特性。管理器关闭时只做抽样。
    pub fn apply_quality_scaling(&mut self, particles: &[Particle]) -> Vec<Particle> {
        self.last_input_count = particles.len();
        let cap = self.particle_cap();
        if particles.is_empty() || cap == 0 {
            self.last_output_count = 0;
            return Vec::new();
        }

        let stride = particles.len().div_ceil(cap);
        let sampled = particles.iter().step_by(stride);
        let scaled: Vec<Particle> = if self.config.enabled {
            sampled.map(|p| self.scale_particle(p)).collect()
        } else {
            sampled.cloned().collect()
        };

        self.last_output_count = scaled.len();
        scaled
    }

    fn scale_particle(&self, particle: &Particle) -> Particle {
        let allowed = self.profile().features;
        let mut scaled = particle.clone();
        scaled.size *= self.factors.particle_size;
        scaled.opacity = crate::clamp_finite!(
            particle.opacity * self.factors.effect_intensity,
            0.0,
            1.0
        );
        scaled.features.physics &= allowed.physics;
        scaled.features.collision &= allowed.collision;
        scaled.features.trail &= allowed.trails;
        scaled.features.glow &= allowed.glow;
        scaled
    }

    /// 记录一帧的性能测量并（在自适应模式下）评估是否调整
    ///
    /// 非有限或非正的 fps 被忽略。
    pub fn update_performance_metrics(&mut self, fps: f32, frame_time_ms: f32) {
        if !fps.is_finite() || fps <= 0.0 {
            tracing::trace!(target: "quality", "Ignoring fps sample {}", fps);
            return;
        }

        self.fps_history.push(fps);
        if frame_time_ms.is_finite() && frame_time_ms >= 0.0 {
            self.frame_time_history.push(frame_time_ms);
        }
        self.average_fps = self.fps_history.average() as f32;

        if self.config.enabled && self.config.adaptive {
            self.evaluate(fps);
        }
    }

    fn evaluate(&mut self, fps: f32) {
        let now = self.clock.now_ms();
        if let Some(pending) = self.pending_validation.as_mut() {
            pending.fps_sum += f64::from(fps);
            pending.samples += 1;
        }
        if self.resolve_validation(now) {
            return;
        }

        if self.cooldown_until_ms.is_some_and(|until| now < until) {
            return;
        }

        if self.average_fps < self.config.critical_threshold {
            self.emergency_reduce(now);
            return;
        }

        // 验证期内保持当前等级
        if self.pending_validation.is_some() {
            return;
        }

        if !self.is_window_stable() {
            self.stable_frames = 0;
            return;
        }
        self.stable_frames = self.stable_frames.saturating_add(1);
        if self.stable_frames < self.config.stable_frames_required {
            return;
        }

        if self.average_fps < self.config.downgrade_threshold {
            self.downgrade(now);
        } else if self.average_fps > self.config.upgrade_threshold {
            self.upgrade(now);
        }
    }

    /// 验证期满时结算；发生回滚返回 true
    fn resolve_validation(&mut self, now: f64) -> bool {
        let validation = self.config.validation;
        let due = self
            .pending_validation
            .as_ref()
            .is_some_and(|pending| now - pending.started_ms >= validation.period_ms);
        if !due {
            return false;
        }
        let Some(pending) = self.pending_validation.take() else {
            return false;
        };

        let observed = if pending.samples == 0 {
            self.average_fps
        } else {
            (pending.fps_sum / f64::from(pending.samples)) as f32
        };
        let ratio = observed / self.config.target_fps;
        if ratio >= validation.rollback_threshold {
            tracing::debug!(target: "quality", "Quality {} validated at {:.1} FPS", self.level, observed);
            return false;
        }

        tracing::warn!(
            target: "quality",
            "Rolling back quality {} -> {}: FPS ratio {:.2} below {:.2}",
            self.level,
            pending.previous_level,
            ratio,
            validation.rollback_threshold
        );
        self.level = pending.previous_level;
        self.factors = pending.previous_factors;
        self.active_preset = pending.previous_preset;
        self.counters.rollbacks += 1;
        self.consecutive_rollbacks = self.consecutive_rollbacks.saturating_add(1);
        self.record_adaptation(AdaptationKind::Rollback, now);
        self.cooldown_until_ms = Some(now + validation.rollback_cooldown_ms);

        if self.consecutive_rollbacks >= validation.max_rollbacks {
            tracing::warn!(
                target: "quality",
                "{} rollbacks reached, disabling adaptive quality",
                self.consecutive_rollbacks
            );
            self.config.adaptive = false;
        }
        true
    }

    fn is_window_stable(&self) -> bool {
        match self
            .fps_history
            .recent_mean_std_dev(self.config.stability_window)
        {
            Some((mean, std_dev)) => {
                mean > 0.0 && std_dev < f64::from(self.config.stability_tolerance) * mean
            }
            None => false,
        }
    }

    fn emergency_reduce(&mut self, now: f64) {
        let preset = self
            .config
            .presets
            .get(BATTERY_SAVING_PRESET)
            .copied()
            .unwrap_or_else(|| self.config.profiles.minimal.scaling)
            .clamped();

        if self.level == QualityLevel::Minimal && self.factors == preset {
            return;
        }

        tracing::warn!(
            target: "quality",
            "Average FPS {:.1} below critical threshold {:.1}, forcing minimal quality",
            self.average_fps,
            self.config.critical_threshold
        );
        self.pending_validation = None;
        self.level = QualityLevel::Minimal;
        self.factors = preset;
        self.active_preset = Some(BATTERY_SAVING_PRESET.to_string());
        self.counters.emergency_reductions += 1;
        self.record_adaptation(AdaptationKind::EmergencyReduction, now);
    }

    fn downgrade(&mut self, now: f64) {
        match self.level.lower() {
            Some(lower) => {
                self.set_level(lower);
                self.counters.downgrades += 1;
                self.record_adaptation(AdaptationKind::Downgrade, now);
            }
            None => {
                self.factors = self.factors.stepped(1.0 - self.config.adjustment_step);
                self.active_preset = None;
                self.counters.factor_steps += 1;
                tracing::debug!(target: "quality", "Scaling factors decreased: {:?}", self.factors);
                self.record_adaptation(AdaptationKind::FactorDecrease, now);
            }
        }
    }

    fn upgrade(&mut self, now: f64) {
        match self.level.higher() {
            Some(higher) => {
                let pending = PendingValidation {
                    previous_level: self.level,
                    previous_factors: self.factors,
                    previous_preset: self.active_preset.clone(),
                    started_ms: now,
                    fps_sum: 0.0,
                    samples: 0,
                };
                self.set_level(higher);
                self.counters.upgrades += 1;
                self.record_adaptation(AdaptationKind::Upgrade, now);
                if self.config.validation.enabled {
                    self.pending_validation = Some(pending);
                }
            }
            None => {
                self.factors = self.factors.stepped(1.0 + self.config.adjustment_step);
                self.active_preset = None;
                self.counters.factor_steps += 1;
                tracing::debug!(target: "quality", "Scaling factors increased: {:?}", self.factors);
                self.record_adaptation(AdaptationKind::FactorIncrease, now);
            }
        }
    }

    fn record_adaptation(&mut self, kind: AdaptationKind, now: f64) {
        self.stable_frames = 0;
        self.last_adaptation = Some(kind);
        self.last_adaptation_ms = Some(now);
        self.cooldown_until_ms = Some(now + self.config.cooldown_ms);
    }

    pub fn average_fps(&self) -> f32 {
        self.average_fps
    }

    /// 平均帧率相对目标帧率的比例
    pub fn fps_headroom(&self) -> f32 {
        if self.fps_history.is_empty() || self.config.target_fps <= 0.0 {
            return 0.0;
        }
        self.average_fps / self.config.target_fps
    }

    pub fn stable_frames(&self) -> u32 {
        self.stable_frames
    }

    /// 统计快照
    pub fn stats(&self) -> QualityStats {
        QualityStats {
            level: self.level,
            scaling_factors: self.factors,
            active_preset: self.active_preset.clone(),
            quality_score: self.calculate_quality_score(),
            target_fps: self.config.target_fps,
            average_fps: self.average_fps,
            fps_headroom: self.fps_headroom(),
            average_frame_time_ms: self.frame_time_history.average() as f32,
            samples: self.fps_history.len(),
            stable_frames: self.stable_frames,
            downgrades: self.counters.downgrades,
            upgrades: self.counters.upgrades,
            emergency_reductions: self.counters.emergency_reductions,
            factor_steps: self.counters.factor_steps,
            rollbacks: self.counters.rollbacks,
            user_overrides: self.counters.user_overrides,
            user_override_active: self.user_override_active,
            validation_pending: self.pending_validation.is_some(),
            last_adaptation: self.last_adaptation,
            last_adaptation_ms: self.last_adaptation_ms,
            last_input_count: self.last_input_count,
            last_output_count: self.last_output_count,
        }
    }

    /// 清零计数器和历史，保留当前等级与因子
    pub fn reset_stats(&mut self) {
        self.fps_history.clear();
        self.frame_time_history.clear();
        self.average_fps = 0.0;
        self.stable_frames = 0;
        self.counters = AdaptationCounters::default();
        self.last_adaptation = None;
        self.last_adaptation_ms = None;
        self.cooldown_until_ms = None;
        self.pending_validation = None;
        self.consecutive_rollbacks = 0;
        self.last_input_count = 0;
        self.last_output_count = 0;
    }
}
