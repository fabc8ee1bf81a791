//! 粒子数据模型
//!
//! 粒子由外部模拟系统拥有，管线只读取它们；只有画质缩放步骤会生成修改过的副本。
//!
//! ## 默认值
//!
//! 可选字段在读取时才解析默认值，数值 `0` 永远不会被当作"缺失"：
//!
//! | 字段 | 缺省 |
//! |------|------|
//! | `texture` | `"default"` |
//! | `shader` | `"default"` |
//! | `priority` | `0.5` |
//! | `color` | 不透明白色 |
//! | `position.z` | `0.0` |

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::core::{PipelineError, PipelineResult};

/// 默认纹理/着色器键
pub const DEFAULT_MATERIAL: &str = "default";
/// 默认优先级
pub const DEFAULT_PRIORITY: f32 = 0.5;
/// 默认颜色
pub const DEFAULT_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// 混合模式
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    #[default]
    Normal,
    Additive,
    Multiply,
    Screen,
}

impl BlendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlendMode::Normal => "normal",
            BlendMode::Additive => "additive",
            BlendMode::Multiply => "multiply",
            BlendMode::Screen => "screen",
        }
    }
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 粒子特性开关
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParticleFeatures {
    pub physics: bool,
    pub collision: bool,
    pub trail: bool,
    pub glow: bool,
}

impl ParticleFeatures {
    /// 全部开启
    pub const fn all() -> Self {
        Self {
            physics: true,
            collision: true,
            trail: true,
            glow: true,
        }
    }
}

/// 粒子
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    /// 稳定的粒子 ID（用于重要性分数缓存）
    pub id: u64,
    /// 位置，z 作为深度
    pub position: Vec3,
    /// 直径
    pub size: f32,
    /// 不透明度 [0,1]
    pub opacity: f32,
    /// 速度
    pub velocity: Vec2,
    /// 出生时间（毫秒，与管线时钟同一时间轴）
    pub birth_time_ms: f64,
    /// 纹理/类型键
    pub texture: Option<String>,
    /// 混合模式
    pub blend_mode: BlendMode,
    /// 着色器键
    pub shader: Option<String>,
    /// 调用方优先级 [0,1]
    pub priority: Option<f32>,
    /// 颜色 (RGBA)
    pub color: Option<[f32; 4]>,
    /// 特性开关
    pub features: ParticleFeatures,
}

impl Particle {
    /// 创建粒子，其余字段取默认值
    pub fn new(id: u64, x: f32, y: f32) -> Self {
        Self {
            id,
            position: Vec3::new(x, y, 0.0),
            size: 4.0,
            opacity: 1.0,
            velocity: Vec2::ZERO,
            birth_time_ms: 0.0,
            texture: None,
            blend_mode: BlendMode::Normal,
            shader: None,
            priority: None,
            color: None,
            features: ParticleFeatures::all(),
        }
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_depth(mut self, z: f32) -> Self {
        self.position.z = z;
        self
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_birth_time(mut self, birth_time_ms: f64) -> Self {
        self.birth_time_ms = birth_time_ms;
        self
    }

    pub fn with_texture(mut self, texture: impl Into<String>) -> Self {
        self.texture = Some(texture.into());
        self
    }

    pub fn with_shader(mut self, shader: impl Into<String>) -> Self {
        self.shader = Some(shader.into());
        self
    }

    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    pub fn with_priority(mut self, priority: f32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_features(mut self, features: ParticleFeatures) -> Self {
        self.features = features;
        self
    }

    /// 二维位置
    pub fn position_2d(&self) -> Vec2 {
        self.position.truncate()
    }

    /// 深度
    pub fn depth(&self) -> f32 {
        self.position.z
    }

    pub fn texture_key(&self) -> &str {
        self.texture.as_deref().unwrap_or(DEFAULT_MATERIAL)
    }

    pub fn shader_key(&self) -> &str {
        self.shader.as_deref().unwrap_or(DEFAULT_MATERIAL)
    }

    pub fn priority_or_default(&self) -> f32 {
        self.priority.unwrap_or(DEFAULT_PRIORITY)
    }

    pub fn color_or_default(&self) -> [f32; 4] {
        self.color.unwrap_or(DEFAULT_COLOR)
    }

    /// 粒子年龄（毫秒）
    pub fn age_ms(&self, now_ms: f64) -> f64 {
        now_ms - self.birth_time_ms
    }

    /// 速度大小
    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    /// 以尺寸为边长的包围正方形
    pub fn bounds(&self) -> Rect {
        let half = self.size * 0.5;
        let p = self.position_2d();
        Rect::new(p.x - half, p.y - half, p.x + half, p.y + half)
    }

    /// 检查数值字段是否有限
    ///
    /// 非有限的数值是模拟端的编程错误，由调用方的帧循环处理。
    pub fn validate(&self) -> PipelineResult<()> {
        let reason = if !self.position.is_finite() {
            Some("position is not finite")
        } else if !self.size.is_finite() {
            Some("size is not finite")
        } else if !self.opacity.is_finite() {
            Some("opacity is not finite")
        } else if !self.velocity.is_finite() {
            Some("velocity is not finite")
        } else if !self.birth_time_ms.is_finite() {
            Some("birth time is not finite")
        } else if self.priority.map_or(false, |p| !p.is_finite()) {
            Some("priority is not finite")
        } else if self.color.is_some_and(|c| !c.iter().all(|v| v.is_finite())) {
            Some("color is not finite")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(PipelineError::InvalidParticle {
                id: self.id,
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// 轴对齐矩形
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self {
            min: Vec2::new(min_x, min_y),
            max: Vec2::new(max_x, max_y),
        }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    /// 点是否在矩形内（含边界）
    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// 两矩形是否相交（含接触）
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// 向外扩展
    pub fn expanded(&self, margin: f32) -> Self {
        Self {
            min: self.min - Vec2::splat(margin),
            max: self.max + Vec2::splat(margin),
        }
    }

    /// 合并为包含两者的矩形
    pub fn union(&self, other: &Rect) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// 相机/视口快照
///
/// `(x, y)` 是视口中心，可见区域为 `[x ± width/2] × [y ± height/2]`。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Camera {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// 视口矩形
    pub fn viewport(&self) -> Rect {
        let half = Vec2::new(self.width, self.height) * 0.5;
        Rect {
            min: self.center() - half,
            max: self.center() + half,
        }
    }

    /// 宽或高不为正（或非有限）的视口被视为不存在
    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0 && self.center().is_finite())
    }
}

/// 按 (texture, blend, shader) 的可选组合再按深度比较两个粒子
///
/// 按纹理排序时也比较着色器，同一材质的粒子因此保持相邻。
pub(crate) fn compare_for_batching(
    a: &Particle,
    b: &Particle,
    by_texture: bool,
    by_blend: bool,
) -> Ordering {
    let mut ord = Ordering::Equal;
    if by_texture {
        ord = a.texture_key().cmp(b.texture_key());
    }
    if ord == Ordering::Equal && by_blend {
        ord = a.blend_mode.cmp(&b.blend_mode);
    }
    if ord == Ordering::Equal && by_texture {
        ord = a.shader_key().cmp(b.shader_key());
    }
    ord.then_with(|| a.depth().total_cmp(&b.depth()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_resolve_lazily() {
        let p = Particle::new(1, 0.0, 0.0).with_priority(0.0);
        assert_eq!(p.texture_key(), DEFAULT_MATERIAL);
        assert_eq!(p.shader_key(), DEFAULT_MATERIAL);
        // 显式的 0 不是缺失值
        assert_eq!(p.priority_or_default(), 0.0);
        assert_eq!(Particle::new(2, 0.0, 0.0).priority_or_default(), DEFAULT_PRIORITY);
        assert_eq!(p.color_or_default(), DEFAULT_COLOR);
    }

    #[test]
    fn test_validate_rejects_nan() {
        assert!(Particle::new(1, 1.0, 2.0).validate().is_ok());

        let bad = Particle::new(9, f32::NAN, 0.0);
        match bad.validate() {
            Err(PipelineError::InvalidParticle { id, .. }) => assert_eq!(id, 9),
            other => panic!("unexpected: {:?}", other),
        }

        let bad = Particle::new(3, 0.0, 0.0).with_size(f32::INFINITY);
        assert!(bad.validate().is_err());
        let bad = Particle::new(4, 0.0, 0.0).with_color([1.0, f32::NAN, 0.0, 1.0]);
        match bad.validate() {
            Err(PipelineError::InvalidParticle { reason, .. }) => assert!(reason.contains("color")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_camera_viewport_is_centred() {
        let cam = Camera::new(100.0, 50.0, 200.0, 100.0);
        let vp = cam.viewport();
        assert_eq!(vp.min, Vec2::new(0.0, 0.0));
        assert_eq!(vp.max, Vec2::new(200.0, 100.0));
        assert!(!cam.is_degenerate());
        assert!(Camera::new(0.0, 0.0, 0.0, 100.0).is_degenerate());
    }

    #[test]
    fn test_rect_operations() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 10.0, 20.0, 20.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&Rect::new(10.1, 0.0, 12.0, 1.0)));
        assert!(a.contains_point(Vec2::new(10.0, 0.0)));
        assert_eq!(a.union(&b), Rect::new(0.0, 0.0, 20.0, 20.0));
        assert_eq!(a.expanded(1.0), Rect::new(-1.0, -1.0, 11.0, 11.0));
    }

    #[test]
    fn test_batching_order() {
        let a = Particle::new(1, 0.0, 0.0).with_texture("a").with_depth(5.0);
        let b = Particle::new(2, 0.0, 0.0).with_texture("b").with_depth(1.0);
        assert_eq!(compare_for_batching(&a, &b, true, true), Ordering::Less);
        assert_eq!(compare_for_batching(&a, &b, false, true), Ordering::Greater);
    }

    #[test]
    fn test_batching_order_groups_shaders() {
        let mut particles: Vec<Particle> = (0..6)
            .map(|i| {
                let shader = if i % 2 == 0 { "glow" } else { "plain" };
                Particle::new(i, 0.0, 0.0)
                    .with_texture("spark")
                    .with_shader(shader)
                    .with_depth(i as f32)
            })
            .collect();
        particles.sort_by(|a, b| compare_for_batching(a, b, true, true));

        let shaders: Vec<&str> = particles.iter().map(|p| p.shader_key()).collect();
        assert_eq!(shaders, ["glow", "glow", "glow", "plain", "plain", "plain"]);
        // 同一着色器内仍按深度排序
        assert_eq!(particles[0].id, 0);
        assert_eq!(particles[2].id, 4);
    }
}
