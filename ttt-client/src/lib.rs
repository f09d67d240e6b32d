//! 串口井字棋客户端
//!
//! 包含:
//! - 控制台提示与人类落子输入
//! - 棋盘显示与结果输出
//! - 设置持久化
//! - 状态文档存档

pub mod console;
pub mod display;
pub mod settings;
pub mod storage;

pub use console::Console;
pub use display::ConsoleObserver;
pub use settings::{ClientSettings, FirstPlayer};
pub use storage::{ArchiveInfo, StateStore};
