//! 串口井字棋对端（裁判）
//!
//! 包含:
//! - 裁判：计算状态并为自动一方落子
//! - 服务循环：每轮接受句柄、读取一帧、回复、关闭

pub mod referee;
pub mod server;

pub use referee::Referee;
pub use server::{ServeSummary, Server, ServerConfig};
