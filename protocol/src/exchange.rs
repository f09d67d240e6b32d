//! 回合交换协议与状态机
//!
//! 每一轮：打开新句柄 → （需要时）本地落子 → 编码发送 → 有界等待回复 →
//! 以刚发送的状态为默认值解码 → 关闭句柄 → 按回复的状态决定是否继续。
//!
//! 终局状态（`Win X`、`Win O`、`Draw`）是吸收态：到达之后不再有任何传输。
//! 终局判定以对端为准，本地裁定只用于告警校验。

use std::time::Duration;

use async_trait::async_trait;

use crate::board::Verdict;
use crate::constants::RECEIVE_TIMEOUT;
use crate::document::StateCodec;
use crate::error::{GameError, Result};
use crate::marker::{Marker, Move};
use crate::state::{GameMode, GameState, Status};
use crate::transport::{BaudRate, Connection, Connector, LinkConfig};

/// 落子来源（人类输入或 AI）
#[async_trait]
pub trait MoveSource: Send {
    /// 为 `state.player` 提议一个 1 起始的格子编号；`None` 表示放弃对局
    ///
    /// 编号的范围与占用由协议校验，不合法时会再次调用。
    async fn propose(&mut self, state: &GameState) -> Result<Option<u32>>;
}

/// 会话事件回调，默认全部为空操作
pub trait SessionObserver: Send {
    fn round_started(&mut self, _round: u32, _state: &GameState) {}

    fn move_rejected(&mut self, _error: &GameError) {}

    fn move_applied(&mut self, _mv: Move, _state: &GameState) {}

    /// `document` 为收到的原始文档
    fn reply_received(&mut self, _document: &str, _state: &GameState) {}

    fn finished(&mut self, _status: Status) {}
}

impl SessionObserver for () {}

/// 会话配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub address: String,
    pub baud_rate: BaudRate,
    /// 等待对端回复的上限
    pub receive_timeout: Duration,
}

impl SessionConfig {
    pub fn new(address: impl Into<String>, baud_rate: BaudRate) -> Self {
        Self {
            address: address.into(),
            baud_rate,
            receive_timeout: RECEIVE_TIMEOUT,
        }
    }

    pub fn with_receive_timeout(mut self, receive_timeout: Duration) -> Self {
        self.receive_timeout = receive_timeout;
        self
    }
}

impl From<&LinkConfig> for SessionConfig {
    fn from(link: &LinkConfig) -> Self {
        Self::new(link.address.clone(), link.baud_rate).with_receive_timeout(link.receive_timeout())
    }
}

/// 单轮结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// 完成一次往返，对局继续
    Advanced(Status),
    /// 完成一次往返，到达终局
    Finished(Status),
    /// 本地落子被拒绝，未发送任何数据
    Rejected(GameError),
    /// 本地放弃对局
    Abandoned,
}

/// 会话结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Finished(Status),
    Abandoned,
}

/// 一局完整对局
///
/// 持有唯一的当前状态，句柄每轮重新打开、用完即关。
pub struct Session<C: Connector> {
    connector: C,
    config: SessionConfig,
    state: GameState,
    /// 已完成的往返轮数
    rounds: u32,
    /// 已发送的文档数
    transmissions: u32,
}

impl<C: Connector> Session<C> {
    /// 创建新会话：状态为 `Start`，棋盘为空
    pub fn new(connector: C, config: SessionConfig, first: Marker, mode: GameMode) -> Self {
        Self::resume(connector, config, GameState::new(first, mode))
    }

    /// 从已有状态继续
    pub fn resume(connector: C, config: SessionConfig, state: GameState) -> Self {
        Self {
            connector,
            config,
            state,
            rounds: 0,
            transmissions: 0,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn status(&self) -> Status {
        self.state.status
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn transmissions(&self) -> u32 {
        self.transmissions
    }

    /// 运行到终局或本地放弃
    pub async fn run<S, O>(&mut self, local: &mut S, observer: &mut O) -> Result<SessionOutcome>
    where
        S: MoveSource + ?Sized,
        O: SessionObserver + ?Sized,
    {
        tracing::info!(
            "会话开始: 模式 {}，{} 先手，链路 {} ({})",
            self.state.mode,
            self.state.player,
            self.config.address,
            self.config.baud_rate
        );

        loop {
            if self.state.status.is_terminal() {
                observer.finished(self.state.status);
                return Ok(SessionOutcome::Finished(self.state.status));
            }

            match self.play_round(local, observer).await? {
                RoundOutcome::Advanced(_) | RoundOutcome::Rejected(_) => continue,
                RoundOutcome::Finished(status) => {
                    tracing::info!("对局结束: {}（共 {} 轮）", status, self.rounds);
                    observer.finished(status);
                    return Ok(SessionOutcome::Finished(status));
                }
                RoundOutcome::Abandoned => {
                    tracing::info!("本地放弃对局（第 {} 轮）", self.rounds + 1);
                    return Ok(SessionOutcome::Abandoned);
                }
            }
        }
    }

    /// 执行一轮交换
    pub async fn play_round<S, O>(&mut self, local: &mut S, observer: &mut O) -> Result<RoundOutcome>
    where
        S: MoveSource + ?Sized,
        O: SessionObserver + ?Sized,
    {
        if self.state.status.is_terminal() {
            return Err(GameError::GameOver.into());
        }

        observer.round_started(self.rounds, &self.state);
        let mut conn = self
            .connector
            .open(&self.config.address, self.config.baud_rate)
            .await?;

        let outgoing = if self.state.local_moves() {
            match local.propose(&self.state).await {
                Ok(Some(value)) => match self.validate(value) {
                    Ok((mv, next)) => {
                        observer.move_applied(mv, &next);
                        next
                    }
                    Err(error) => {
                        tracing::debug!("落子被拒绝: {}", error);
                        observer.move_rejected(&error);
                        Self::close_quietly(&mut conn).await;
                        return Ok(RoundOutcome::Rejected(error));
                    }
                },
                Ok(None) => {
                    Self::close_quietly(&mut conn).await;
                    return Ok(RoundOutcome::Abandoned);
                }
                Err(e) => {
                    Self::close_quietly(&mut conn).await;
                    return Err(e);
                }
            }
        } else {
            self.state
        };

        let result = self.exchange(&mut conn, &outgoing, observer).await;
        Self::close_quietly(&mut conn).await;
        let reply = result?;

        let status = self.state.status.transition(reply.status);
        Self::cross_check(&outgoing, &reply, status);

        self.state = GameState { status, ..reply };
        self.rounds += 1;

        if status.is_terminal() {
            Ok(RoundOutcome::Finished(status))
        } else {
            Ok(RoundOutcome::Advanced(status))
        }
    }

    /// 校验范围与占用，返回落子后的新状态
    fn validate(&self, value: u32) -> std::result::Result<(Move, GameState), GameError> {
        let mv = Move::new(value)?;
        let next = self.state.with_move(mv)?;
        Ok((mv, next))
    }

    /// 发送并等待回复，回复缺失的字段沿用刚发送的状态
    async fn exchange<O>(
        &mut self,
        conn: &mut C::Conn,
        outgoing: &GameState,
        observer: &mut O,
    ) -> Result<GameState>
    where
        O: SessionObserver + ?Sized,
    {
        let document = StateCodec::encode(outgoing);
        conn.send(&document).await?;
        self.transmissions += 1;
        tracing::debug!("第 {} 轮已发送: {}", self.rounds + 1, document.trim_end());

        let reply = conn.recv_within(self.config.receive_timeout).await?;
        tracing::debug!("第 {} 轮收到回复: {}", self.rounds + 1, reply.trim_end());

        let decoded = StateCodec::decode_state(&reply, outgoing);
        observer.reply_received(&reply, &decoded);
        Ok(decoded)
    }

    /// 对端报告与本地裁定不一致时告警（对端仍为准）
    fn cross_check(sent: &GameState, reply: &GameState, status: Status) {
        if !reply.board.is_successor_of(&sent.board) {
            tracing::warn!("对端回复改写了已落子的格子");
        }
        if reply.mode != sent.mode {
            tracing::warn!("对端回复的模式 {} 与本会话 {} 不一致", reply.mode, sent.mode);
        }
        let local = reply.board.verdict();
        let agrees = match local {
            Verdict::InProgress => !status.is_terminal(),
            _ => Status::from(local) == status,
        };
        if !agrees {
            tracing::warn!("对端状态 {} 与本地裁定 {:?} 不一致，以对端为准", status, local);
        }
    }

    async fn close_quietly(conn: &mut C::Conn) {
        if let Err(e) = conn.close().await {
            tracing::debug!("关闭句柄失败: {}", e);
        }
    }
}
