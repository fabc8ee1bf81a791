//! 核心模块
//!
//! 包含管线的基础设施：
//! - `error` - 错误类型定义
//! - `time` - 可注入的帧时钟
//! - `logging` - tracing 日志初始化
//! - `macros` - 通用宏

pub mod error;
pub mod logging;
pub mod time;
#[macro_use]
pub mod macros;

// 重新导出错误类型
pub use error::{PipelineError, PipelineResult};

// 重新导出时间源
pub use time::{ManualClock, SharedClock, SystemClock, TimeSource};

pub use logging::init_logging;
