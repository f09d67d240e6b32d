//! 棋子标记、格子与落子定义

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{BOARD_SIZE, CELL_COUNT};
use crate::error::GameError;

/// 棋子标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Marker {
    X,
    O,
}

impl Marker {
    /// 获取对方标记
    pub fn opponent(&self) -> Marker {
        match self {
            Marker::X => Marker::O,
            Marker::O => Marker::X,
        }
    }

    /// 文档中的字符
    pub fn to_char(&self) -> char {
        match self {
            Marker::X => 'X',
            Marker::O => 'O',
        }
    }

    /// 从文档字符解析
    pub fn from_char(c: char) -> Option<Marker> {
        match c {
            'X' | 'x' => Some(Marker::X),
            'O' | 'o' => Some(Marker::O),
            _ => None,
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// 棋盘格子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Cell {
    #[default]
    Empty,
    X,
    O,
}

impl Cell {
    /// 文档中的字符（空格子为 `_`）
    pub fn to_char(&self) -> char {
        match self {
            Cell::Empty => '_',
            Cell::X => 'X',
            Cell::O => 'O',
        }
    }

    /// 从文档字符解析
    pub fn from_char(c: char) -> Option<Cell> {
        match c {
            '_' => Some(Cell::Empty),
            other => Marker::from_char(other).map(Cell::from),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Cell::Empty
    }

    /// 占据该格的标记
    pub fn marker(&self) -> Option<Marker> {
        match self {
            Cell::Empty => None,
            Cell::X => Some(Marker::X),
            Cell::O => Some(Marker::O),
        }
    }
}

impl From<Marker> for Cell {
    fn from(marker: Marker) -> Self {
        match marker {
            Marker::X => Cell::X,
            Marker::O => Cell::O,
        }
    }
}

/// 棋盘坐标（0 起始，行优先）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: u8,
    pub col: u8,
}

impl Position {
    /// 创建新坐标（不检查边界）
    pub const fn new_unchecked(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    pub fn is_valid(&self) -> bool {
        (self.row as usize) < BOARD_SIZE && (self.col as usize) < BOARD_SIZE
    }

    /// 转换为一维索引
    pub fn to_index(&self) -> usize {
        self.row as usize * BOARD_SIZE + self.col as usize
    }
}

/// 落子：1 起始的格子编号（1..=9）
///
/// 编号到坐标的映射为 `((n-1)/3, (n-1)%3)`：
///
/// ```text
///  1 | 2 | 3
///  4 | 5 | 6
///  7 | 8 | 9
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move(u8);

impl Move {
    /// 校验并创建落子，越界时返回 [`GameError::OutOfRange`]
    pub fn new(value: u32) -> Result<Self, GameError> {
        if (1..=CELL_COUNT as u32).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(GameError::OutOfRange { value })
        }
    }

    /// 格子编号
    pub fn number(&self) -> u8 {
        self.0
    }

    pub fn position(&self) -> Position {
        let index = self.0 - 1;
        Position::new_unchecked(index / BOARD_SIZE as u8, index % BOARD_SIZE as u8)
    }

    /// 全部九个落子
    pub fn all() -> impl Iterator<Item = Move> {
        (1..=CELL_COUNT as u8).map(Move)
    }
}

impl TryFrom<u32> for Move {
    type Error = GameError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Move::new(value)
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
