use bytemuck::{Pod, Zeroable};

use super::material::MaterialKey;
use crate::render::particles::{BlendMode, Particle, Rect};

/// 粒子四边形顶点
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct ParticleVertex {
    /// 世界坐标
    pub position: [f32; 2],
    /// 纹理坐标
    pub uv: [f32; 2],
}

/// 四个角的纹理坐标，顺序与顶点一致
const CORNER_UVS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
/// 每个粒子两个三角形
const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

/// 同材质粒子的渲染单元
///
/// 对象池中的批次会被反复复用，`reset` 只清空内容，保留缓冲区容量。
#[derive(Debug, Clone, Default)]
pub struct RenderBatch {
    pub material: MaterialKey,
    pub particles: Vec<Particle>,
    pub bounds: Rect,
    pub vertices: Vec<ParticleVertex>,
    pub indices: Vec<u32>,
    /// 图集槽位；图集已满或未启用时为 `None`
    pub atlas_slot: Option<usize>,
}

impl RenderBatch {
    /// 清空并改写为新粒子的材质
    pub(crate) fn reset_for(&mut self, first: &Particle) {
        self.material.assign_from(first);
        self.particles.clear();
        self.vertices.clear();
        self.indices.clear();
        self.bounds = Rect::default();
        self.atlas_slot = None;
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// 材质键字符串 `texture_blend_shader`
    pub fn key(&self) -> String {
        self.material.to_string()
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.material.blend_mode
    }

    pub fn texture(&self) -> &str {
        &self.material.texture
    }

    /// 计算包围盒并生成顶点/索引缓冲
    pub(crate) fn build_geometry(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.vertices.reserve(self.particles.len() * 4);
        self.indices.reserve(self.particles.len() * 6);

        let mut bounds: Option<Rect> = None;
        for particle in &self.particles {
            let quad = particle.bounds();
            bounds = Some(match bounds {
                Some(b) => b.union(&quad),
                None => quad,
            });

            let base = self.vertices.len() as u32;
            let corners = [
                [quad.min.x, quad.min.y],
                [quad.max.x, quad.min.y],
                [quad.max.x, quad.max.y],
                [quad.min.x, quad.max.y],
            ];
            self.vertices
                .extend(corners.iter().zip(CORNER_UVS.iter()).map(|(&position, &uv)| {
                    ParticleVertex { position, uv }
                }));
            self.indices.extend(QUAD_INDICES.iter().map(|i| base + i));
        }
        self.bounds = bounds.unwrap_or_default();
    }

    /// 顶点缓冲的原始字节，可直接上传到 GPU
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// 索引缓冲的原始字节
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}
