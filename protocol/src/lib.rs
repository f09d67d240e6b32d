//! 串口井字棋共享协议库
//!
//! 包含:
//! - 棋子标记、格子、落子编号等核心数据结构
//! - 棋盘与胜负裁定
//! - 对局状态 (GameState) 与状态标签
//! - 状态文档编解码 (StateCodec)
//! - 传输层抽象 (Connector, Connection, Listener traits) 与帧编解码
//! - 回合交换协议 (Session)

mod board;
mod constants;
mod document;
mod error;
mod exchange;
mod marker;
mod state;
mod transport;

pub use board::{Board, Verdict, LINES};
pub use constants::*;
pub use document::{DecodeIssue, DecodeReport, StateCodec};
pub use error::{GameError, ProtocolError, Result};
pub use exchange::{
    MoveSource, RoundOutcome, Session, SessionConfig, SessionObserver, SessionOutcome,
};
pub use marker::{Cell, Marker, Move, Position};
pub use state::{GameMode, GameState, Status};
pub use transport::{
    BaudRate, Connection, Connector, FrameReader, FrameWriter, LineConnection, LinkConfig, Listener,
    SerialConnection, SerialConnector, SerialListener, TcpConnection, TcpConnector, TcpListener,
    TransportKind,
};
