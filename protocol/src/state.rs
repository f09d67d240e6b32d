//! 对局状态：模式、状态标签与交换单元

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::board::{Board, Verdict};
use crate::error::GameError;
use crate::marker::{Marker, Move};

/// 对局模式
///
/// 第一个词是先手一方，本地（客户端）一方始终是其中的 "Man"（若存在）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GameMode {
    /// 双人在客户端轮流落子，对端只做裁判
    #[default]
    ManVsMan,
    /// 本地玩家先手，对端 AI 应对
    ManVsAi,
    /// 对端 AI 先手，本地玩家应对
    AiVsMan,
    /// 对端 AI 自我对弈，本地只做中继
    AiVsAi,
}

impl GameMode {
    /// 文档中的标签
    pub fn label(&self) -> &'static str {
        match self {
            GameMode::ManVsMan => "Man vs Man",
            GameMode::ManVsAi => "Man vs AI",
            GameMode::AiVsMan => "AI vs Man",
            GameMode::AiVsAi => "AI vs AI",
        }
    }

    /// 所有选项
    pub fn all() -> &'static [GameMode] {
        &[
            GameMode::ManVsMan,
            GameMode::ManVsAi,
            GameMode::AiVsMan,
            GameMode::AiVsAi,
        ]
    }

    /// 对端是否在每次收到文档后自动落子
    pub fn remote_moves(&self) -> bool {
        !matches!(self, GameMode::ManVsMan)
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for GameMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        GameMode::all()
            .iter()
            .copied()
            .find(|mode| mode.label().to_ascii_lowercase() == normalized)
            .ok_or_else(|| format!("unknown game type: {}", s.trim()))
    }
}

/// 对局状态标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Status {
    /// 新会话的初始状态
    #[default]
    Start,
    /// 对局继续
    NextMove,
    /// X 获胜
    WinX,
    /// O 获胜
    WinO,
    /// 和棋
    Draw,
}

impl Status {
    /// 文档中的标签
    pub fn label(&self) -> &'static str {
        match self {
            Status::Start => "Start",
            Status::NextMove => "NextMove",
            Status::WinX => "Win X",
            Status::WinO => "Win O",
            Status::Draw => "Draw",
        }
    }

    /// 终局状态：之后不再有任何传输
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::WinX | Status::WinO | Status::Draw)
    }

    /// 获胜方
    pub fn winner(&self) -> Option<Marker> {
        match self {
            Status::WinX => Some(Marker::X),
            Status::WinO => Some(Marker::O),
            _ => None,
        }
    }

    /// 检查状态迁移是否合法
    ///
    /// `Start → NextMove | 终局`，`NextMove → NextMove | 终局`，终局吸收一切。
    /// 保持原状态总是合法的。
    pub fn can_transition_to(&self, next: Status) -> bool {
        if *self == next {
            return true;
        }
        match self {
            Status::Start | Status::NextMove => next != Status::Start,
            Status::WinX | Status::WinO | Status::Draw => false,
        }
    }

    /// 按对端报告推进状态，非法报告时保持当前状态
    pub fn transition(self, reported: Status) -> Status {
        if self.can_transition_to(reported) {
            reported
        } else {
            tracing::warn!("忽略非法状态迁移: {:?} -> {:?}", self, reported);
            self
        }
    }
}

impl From<Verdict> for Status {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::InProgress => Status::NextMove,
            Verdict::Win(Marker::X) => Status::WinX,
            Verdict::Win(Marker::O) => Status::WinO,
            Verdict::Draw => Status::Draw,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Start" => Ok(Status::Start),
            "NextMove" => Ok(Status::NextMove),
            "Win X" | "WinX" => Ok(Status::WinX),
            "Win O" | "WinO" => Ok(Status::WinO),
            "Draw" => Ok(Status::Draw),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

/// 交换单元：一份完整的对局状态
///
/// `player` 始终表示下一个落子的一方：落子的一方在发送前翻转它。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameState {
    pub player: Marker,
    pub mode: GameMode,
    pub board: Board,
    pub status: Status,
}

impl GameState {
    /// 创建新会话的初始状态
    pub fn new(first: Marker, mode: GameMode) -> Self {
        Self {
            player: first,
            mode,
            board: Board::empty(),
            status: Status::Start,
        }
    }

    /// 由 `player` 落子，返回新状态（`player` 已翻转）
    pub fn with_move(&self, mv: Move) -> Result<GameState, GameError> {
        if self.status.is_terminal() {
            return Err(GameError::GameOver);
        }
        let (board, accepted) = self.board.apply_move(mv, self.player);
        if !accepted {
            return Err(GameError::CellOccupied { cell: mv.number() });
        }
        Ok(GameState {
            player: self.player.opponent(),
            board,
            ..*self
        })
    }

    /// 本地一方是否在发送这份状态前落子
    ///
    /// 只看状态本身，与会话已进行的轮数无关：AI 先手时，只有尚未开局的空棋盘
    /// 原样发送给对端，之后每轮都由本地先落子。
    pub fn local_moves(&self) -> bool {
        match self.mode {
            GameMode::ManVsMan | GameMode::ManVsAi => true,
            GameMode::AiVsMan => !(self.status == Status::Start && self.board == Board::empty()),
            GameMode::AiVsAi => false,
        }
    }

    /// 本地裁定（仅用于裁判与校验，不驱动客户端循环）
    pub fn verdict(&self) -> Verdict {
        self.board.verdict()
    }
}
