//! 绘制表面抽象
//!
//! 渲染后端提供 [`DrawContext`] 实现，管线只借用它，从不创建或持有。

use glam::Vec2;

use crate::render::particles::BlendMode;

/// 绘制表面
pub trait DrawContext {
    /// 当前混合模式
    fn blend_mode(&self) -> BlendMode;

    /// 切换混合模式
    fn set_blend_mode(&mut self, mode: BlendMode);

    /// 绘制实心圆
    fn fill_circle(&mut self, center: Vec2, radius: f32, color: [f32; 4], opacity: f32);
}

/// 记录下来的绘制命令
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    SetBlendMode(BlendMode),
    FillCircle {
        center: Vec2,
        radius: f32,
        color: [f32; 4],
        opacity: f32,
    },
}

/// 只记录命令的绘制表面，用于测试和无头后端
#[derive(Debug, Default)]
pub struct RecordingContext {
    blend_mode: BlendMode,
    commands: Vec<DrawCommand>,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blend_mode(blend_mode: BlendMode) -> Self {
        Self {
            blend_mode,
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// 取出已记录的命令
    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    /// 已记录的圆数量
    pub fn circle_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::FillCircle { .. }))
            .count()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl DrawContext for RecordingContext {
    fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.blend_mode = mode;
        self.commands.push(DrawCommand::SetBlendMode(mode));
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: [f32; 4], opacity: f32) {
        self.commands.push(DrawCommand::FillCircle {
            center,
            radius,
            color,
            opacity,
        });
    }
}
