use std::fmt;

use crate::render::particles::{BlendMode, Particle};

/// 材质键：纹理 + 混合模式 + 着色器
///
/// 同一批次内的所有粒子共享同一个材质键，显示形式为 `texture_blend_shader`。
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialKey {
    pub texture: String,
    pub blend_mode: BlendMode,
    pub shader: String,
}

impl MaterialKey {
    pub fn new(texture: impl Into<String>, blend_mode: BlendMode, shader: impl Into<String>) -> Self {
        Self {
            texture: texture.into(),
            blend_mode,
            shader: shader.into(),
        }
    }

    /// 从粒子解析（缺省值在此处展开）
    pub fn from_particle(particle: &Particle) -> Self {
        Self::new(particle.texture_key(), particle.blend_mode, particle.shader_key())
    }

    /// 粒子是否属于该材质，不分配字符串
    pub fn matches(&self, particle: &Particle) -> bool {
        self.blend_mode == particle.blend_mode
            && self.texture == particle.texture_key()
            && self.shader == particle.shader_key()
    }

    /// 复用已有字符串缓冲区，改写为粒子的材质
    pub fn assign_from(&mut self, particle: &Particle) {
        self.texture.clear();
        self.texture.push_str(particle.texture_key());
        self.shader.clear();
        self.shader.push_str(particle.shader_key());
        self.blend_mode = particle.blend_mode;
    }
}

impl fmt::Display for MaterialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.texture, self.blend_mode, self.shader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format_and_defaults() {
        let p = Particle::new(1, 0.0, 0.0).with_blend_mode(BlendMode::Additive);
        let key = MaterialKey::from_particle(&p);
        assert_eq!(key.to_string(), "default_additive_default");
        assert!(key.matches(&p));

        let other = Particle::new(2, 0.0, 0.0).with_texture("spark");
        assert!(!key.matches(&other));
    }

    #[test]
    fn test_assign_from_reuses_key() {
        let mut key = MaterialKey::new("smoke", BlendMode::Screen, "soft");
        let p = Particle::new(1, 0.0, 0.0).with_texture("fire");
        key.assign_from(&p);
        assert_eq!(key, MaterialKey::new("fire", BlendMode::Normal, "default"));
    }
}
