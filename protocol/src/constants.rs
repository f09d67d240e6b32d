//! 协议常量定义

use std::time::Duration;

/// 棋盘边长（行数 = 列数）
pub const BOARD_SIZE: usize = 3;

/// 棋盘格子总数
pub const CELL_COUNT: usize = BOARD_SIZE * BOARD_SIZE;

/// 消息帧结束符
pub const FRAME_TERMINATOR: u8 = b'\n';

/// 消息帧最大大小（未遇到结束符时的累积上限）
pub const MAX_FRAME_SIZE: usize = 8192;

/// 单次读取的块大小
pub const READ_CHUNK_SIZE: usize = 256;

/// 默认波特率
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// 默认串口设备
#[cfg(windows)]
pub const DEFAULT_SERIAL_PORT: &str = "COM1";

/// 默认串口设备
#[cfg(not(windows))]
pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyUSB0";

/// 默认 TCP 地址（串口经 ser2net/socat 桥接时使用）
pub const DEFAULT_TCP_ADDRESS: &str = "127.0.0.1:9527";

/// 连接超时（秒）
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// 等待对端回复的默认超时（秒）
pub const RECEIVE_TIMEOUT_SECS: u64 = 30;

/// 串口读写超时（毫秒）
pub const SERIAL_IO_TIMEOUT_MS: u64 = 1000;

/// 状态文档文件名
pub const STATE_FILE_NAME: &str = "game_state.xml";

/// 连接超时 Duration
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(CONNECT_TIMEOUT_SECS);

/// 回复超时 Duration
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(RECEIVE_TIMEOUT_SECS);

/// 串口读写超时 Duration
pub const SERIAL_IO_TIMEOUT: Duration = Duration::from_millis(SERIAL_IO_TIMEOUT_MS);
