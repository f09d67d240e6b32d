//! 错误类型定义

use std::time::Duration;

use thiserror::Error;

/// 井字棋规则错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    /// 落子编号不在 1..=9 之内
    #[error("Move out of range: {value} (expected 1-9)")]
    OutOfRange { value: u32 },

    /// 目标格子已被占用
    #[error("Cell already occupied: {cell}")]
    CellOccupied { cell: u8 },

    /// 游戏已结束
    #[error("Game is already over")]
    GameOver,
}

/// 协议错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 无法打开传输端口
    #[error("Failed to open transport {address}: {reason}")]
    TransportOpen { address: String, reason: String },

    /// 等待回复超时
    #[error("No reply within {0:?}")]
    ReceiveTimeout(Duration),

    /// 帧大小超限
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// 文档内部出现帧结束符
    #[error("Document contains an embedded terminator at byte {offset}")]
    InvalidFrame { offset: usize },

    /// 连接已关闭
    #[error("Connection closed")]
    ConnectionClosed,

    /// 不支持的波特率
    #[error("Unsupported baud rate: {0}")]
    UnsupportedBaudRate(u32),

    /// 规则错误
    #[error("Game error: {0}")]
    Game(#[from] GameError),
}

impl ProtocolError {
    /// 是否为传输层错误（会使本轮的句柄失效）
    pub fn is_transport(&self) -> bool {
        !matches!(self, ProtocolError::Game(_) | ProtocolError::UnsupportedBaudRate(_))
    }
}

/// 协议操作结果类型
pub type Result<T> = std::result::Result<T, ProtocolError>;
