//! 传输层抽象
//!
//! 提供 Connector/Connection/Listener traits 使上层协议与具体链路解耦：
//! 串口（tokio-serial）或经 TCP 桥接的串口（ser2net/socat）。
//!
//! 帧规则：一个换行符标记一条消息的结束。状态文档的所有取值都来自不含
//! 换行符的小枚举，因此文档内部永远不会出现结束符。

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, SerialStream, StopBits};

use crate::constants::{
    CONNECT_TIMEOUT, DEFAULT_SERIAL_PORT, FRAME_TERMINATOR, MAX_FRAME_SIZE, READ_CHUNK_SIZE,
    RECEIVE_TIMEOUT_SECS, SERIAL_IO_TIMEOUT,
};
use crate::error::{ProtocolError, Result};

/// 链路速率
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BaudRate {
    B300,
    B1200,
    B2400,
    B4800,
    #[default]
    B9600,
    B14400,
    B19200,
    B38400,
    B57600,
    B115200,
    B128000,
}

impl BaudRate {
    /// 每秒比特数
    pub fn as_u32(&self) -> u32 {
        match self {
            BaudRate::B300 => 300,
            BaudRate::B1200 => 1200,
            BaudRate::B2400 => 2400,
            BaudRate::B4800 => 4800,
            BaudRate::B9600 => 9600,
            BaudRate::B14400 => 14400,
            BaudRate::B19200 => 19200,
            BaudRate::B38400 => 38400,
            BaudRate::B57600 => 57600,
            BaudRate::B115200 => 115200,
            BaudRate::B128000 => 128000,
        }
    }

    /// 所有选项
    pub fn all() -> &'static [BaudRate] {
        &[
            BaudRate::B300,
            BaudRate::B1200,
            BaudRate::B2400,
            BaudRate::B4800,
            BaudRate::B9600,
            BaudRate::B14400,
            BaudRate::B19200,
            BaudRate::B38400,
            BaudRate::B57600,
            BaudRate::B115200,
            BaudRate::B128000,
        ]
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = ProtocolError;

    fn try_from(value: u32) -> Result<Self> {
        BaudRate::all()
            .iter()
            .copied()
            .find(|rate| rate.as_u32() == value)
            .ok_or(ProtocolError::UnsupportedBaudRate(value))
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bps", self.as_u32())
    }
}

/// 链路类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransportKind {
    #[default]
    Serial,
    Tcp,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Serial => f.write_str("serial"),
            TransportKind::Tcp => f.write_str("tcp"),
        }
    }
}

impl std::str::FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serial" => Ok(TransportKind::Serial),
            "tcp" => Ok(TransportKind::Tcp),
            other => Err(format!("unknown transport: {}", other)),
        }
    }
}

/// 链路配置
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    pub transport: TransportKind,
    /// 串口设备（如 `/dev/ttyUSB0`、`COM3`）或 `host:port`
    pub address: String,
    pub baud_rate: BaudRate,
    /// 等待对端回复的上限（秒）
    pub receive_timeout_secs: u64,
}

impl LinkConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_secs(self.receive_timeout_secs)
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Serial,
            address: DEFAULT_SERIAL_PORT.to_string(),
            baud_rate: BaudRate::default(),
            receive_timeout_secs: RECEIVE_TIMEOUT_SECS,
        }
    }
}

/// 连接抽象 trait（一轮交换期间独占的句柄）
#[async_trait]
pub trait Connection: Send {
    /// 发送一份文档（追加帧结束符）
    async fn send(&mut self, document: &str) -> Result<()>;

    /// 阻塞读取直到收到完整一帧
    async fn recv(&mut self) -> Result<String>;

    /// 有界等待的接收，超时返回 [`ProtocolError::ReceiveTimeout`]
    async fn recv_within(&mut self, limit: Duration) -> Result<String> {
        match timeout(limit, self.recv()).await {
            Ok(result) => result,
            Err(_) => Err(ProtocolError::ReceiveTimeout(limit)),
        }
    }

    /// 关闭连接
    async fn close(&mut self) -> Result<()>;

    /// 获取对端地址
    fn peer_addr(&self) -> Option<String>;
}

/// 连接器 trait（客户端每轮打开一次）
#[async_trait]
pub trait Connector: Send + Sync {
    type Conn: Connection;

    /// 打开链路
    async fn open(&self, address: &str, baud_rate: BaudRate) -> Result<Self::Conn>;
}

/// 监听器 trait（服务端每轮接受一次）
#[async_trait]
pub trait Listener: Send {
    type Conn: Connection;

    /// 接受连接
    async fn accept(&mut self) -> Result<Self::Conn>;

    /// 获取本地地址
    fn local_addr(&self) -> Option<String>;
}

/// 任意字节流上的行帧连接
pub struct LineConnection<S> {
    reader: FrameReader<ReadHalf<S>>,
    writer: FrameWriter<WriteHalf<S>>,
    peer_addr: Option<String>,
}

impl<S: AsyncRead + AsyncWrite + Send + Unpin + 'static> LineConnection<S> {
    /// 包装字节流
    pub fn new(stream: S, peer_addr: Option<String>) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            reader: FrameReader::new(read_half),
            writer: FrameWriter::new(write_half),
            peer_addr,
        }
    }
}

#[async_trait]
impl<S: AsyncRead + AsyncWrite + Send + Unpin + 'static> Connection for LineConnection<S> {
    async fn send(&mut self, document: &str) -> Result<()> {
        self.writer.write_frame(document).await
    }

    async fn recv(&mut self) -> Result<String> {
        self.reader.read_frame().await
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await
    }

    fn peer_addr(&self) -> Option<String> {
        self.peer_addr.clone()
    }
}

// ============================================================================
// TCP 实现
// ============================================================================

/// TCP 连接
pub type TcpConnection = LineConnection<TcpStream>;

impl TcpConnection {
    /// 从 TcpStream 创建（服务端使用）
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr().ok().map(|a| a.to_string());
        Ok(LineConnection::new(stream, peer_addr))
    }
}

/// TCP 连接器（波特率对 TCP 无意义，仅记录）
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Conn = TcpConnection;

    async fn open(&self, address: &str, baud_rate: BaudRate) -> Result<Self::Conn> {
        tracing::debug!("打开 TCP 链路 {} ({})", address, baud_rate);
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(address))
            .await
            .map_err(|_| ProtocolError::TransportOpen {
                address: address.to_string(),
                reason: format!("connect timed out after {:?}", CONNECT_TIMEOUT),
            })?
            .map_err(|e| ProtocolError::TransportOpen {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        TcpConnection::from_stream(stream)
    }
}

/// TCP 监听器
pub struct TcpListener {
    listener: tokio::net::TcpListener,
}

impl TcpListener {
    /// 绑定地址
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ProtocolError::TransportOpen {
                address: addr.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { listener })
    }
}

#[async_trait]
impl Listener for TcpListener {
    type Conn = TcpConnection;

    async fn accept(&mut self) -> Result<Self::Conn> {
        let (stream, _addr) = self.listener.accept().await.map_err(ProtocolError::Io)?;
        TcpConnection::from_stream(stream)
    }

    fn local_addr(&self) -> Option<String> {
        self.listener.local_addr().ok().map(|a| a.to_string())
    }
}

// ============================================================================
// 串口实现
// ============================================================================

/// 串口连接
pub type SerialConnection = LineConnection<SerialStream>;

/// 串口连接器：8 数据位、1 停止位、无校验
pub struct SerialConnector;

#[async_trait]
impl Connector for SerialConnector {
    type Conn = SerialConnection;

    async fn open(&self, address: &str, baud_rate: BaudRate) -> Result<Self::Conn> {
        tracing::debug!("打开串口 {} ({})", address, baud_rate);
        let port = tokio_serial::new(address, baud_rate.as_u32())
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .timeout(SERIAL_IO_TIMEOUT)
            .open_native_async()
            .map_err(|e| ProtocolError::TransportOpen {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        Ok(LineConnection::new(port, Some(address.to_string())))
    }
}

/// 串口"监听器"：每次 accept 重新打开同一个设备
pub struct SerialListener {
    path: String,
    baud_rate: BaudRate,
}

impl SerialListener {
    pub fn new(path: impl Into<String>, baud_rate: BaudRate) -> Self {
        Self {
            path: path.into(),
            baud_rate,
        }
    }
}

#[async_trait]
impl Listener for SerialListener {
    type Conn = SerialConnection;

    async fn accept(&mut self) -> Result<Self::Conn> {
        SerialConnector.open(&self.path, self.baud_rate).await
    }

    fn local_addr(&self) -> Option<String> {
        Some(self.path.clone())
    }
}

// ============================================================================
// 帧编解码
// ============================================================================

/// 帧读取器
pub struct FrameReader<R> {
    reader: R,
    buffer: Vec<u8>,
}

impl<R: AsyncRead + Unpin + Send> FrameReader<R> {
    /// 创建新的帧读取器
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(READ_CHUNK_SIZE),
        }
    }

    /// 读取一帧：返回截至并包含结束符的全部内容
    ///
    /// 结束符之后已读到的字节保留给下一帧。
    pub async fn read_frame(&mut self) -> Result<String> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            if let Some(end) = self.buffer.iter().position(|b| *b == FRAME_TERMINATOR) {
                let frame: Vec<u8> = self.buffer.drain(..=end).collect();
                tracing::debug!("收到一帧: {} 字节", frame.len());
                return Ok(String::from_utf8_lossy(&frame).into_owned());
            }

            if self.buffer.len() > MAX_FRAME_SIZE {
                let size = self.buffer.len();
                self.buffer.clear();
                return Err(ProtocolError::FrameTooLarge {
                    size,
                    max: MAX_FRAME_SIZE,
                });
            }

            let n = self.reader.read(&mut chunk).await?;
            if n == 0 {
                if !self.buffer.is_empty() {
                    tracing::debug!("连接关闭，丢弃 {} 字节不完整数据", self.buffer.len());
                    self.buffer.clear();
                }
                return Err(ProtocolError::ConnectionClosed);
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }
}

/// 帧写入器
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> FrameWriter<W> {
    /// 创建新的帧写入器
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// 原样写出文档，缺少结束符时补上
    pub async fn write_frame(&mut self, document: &str) -> Result<()> {
        let body = document
            .strip_suffix(FRAME_TERMINATOR as char)
            .unwrap_or(document);
        if let Some(offset) = body.bytes().position(|b| b == FRAME_TERMINATOR) {
            return Err(ProtocolError::InvalidFrame { offset });
        }

        let size = body.len() + 1;
        if size > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size,
                max: MAX_FRAME_SIZE,
            });
        }

        let mut frame = Vec::with_capacity(size);
        frame.extend_from_slice(body.as_bytes());
        frame.push(FRAME_TERMINATOR);

        self.writer.write_all(&frame).await?;
        self.writer.flush().await?;
        tracing::debug!("发送一帧: {} 字节", size);

        Ok(())
    }

    /// 关闭写端
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
