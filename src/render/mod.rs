//! 粒子渲染管线的三个阶段及其共享数据模型
//!
//! - [`particles`]: 粒子、相机、矩形
//! - [`culling`]: 距离/视锥/年龄/遮挡/重要性剔除
//! - [`quality`]: 画质等级与自适应缩放
//! - [`batch`]: 同材质批次与绘制

pub mod batch;
pub mod culling;
pub mod particles;
pub mod quality;

pub use batch::{BatchHandle, BatchRenderer, BatchStats, DrawContext, RenderBatch};
pub use culling::{CullingStats, CullingSystem};
pub use particles::{BlendMode, Camera, Particle, ParticleFeatures, Rect};
pub use quality::{QualityLevel, QualityManager, QualityStats, ScalingFactors};
