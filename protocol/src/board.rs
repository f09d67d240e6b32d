//! 棋盘状态

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::BOARD_SIZE;
use crate::marker::{Cell, Marker, Move, Position};

/// 所有连线（三行、三列、两条对角线），元素为一维索引
pub const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// 局面裁定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// 对局进行中
    InProgress,
    /// 某方连成一线
    Win(Marker),
    /// 棋盘已满且无人获胜
    Draw,
}

/// 棋盘
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Board {
    /// 3x3 棋盘，行优先
    cells: [[Cell; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    /// 创建空棋盘
    pub fn empty() -> Self {
        Self::default()
    }

    /// 从行数据创建
    pub fn from_rows(cells: [[Cell; BOARD_SIZE]; BOARD_SIZE]) -> Self {
        Self { cells }
    }

    /// 获取指定位置的格子
    pub fn get(&self, pos: Position) -> Cell {
        if pos.is_valid() {
            self.cells[pos.row as usize][pos.col as usize]
        } else {
            Cell::Empty
        }
    }

    /// 设置指定位置的格子（不检查占用）
    pub fn set(&mut self, pos: Position, cell: Cell) {
        if pos.is_valid() {
            self.cells[pos.row as usize][pos.col as usize] = cell;
        }
    }

    /// 落子
    ///
    /// 目标格子非空时拒绝：返回未改变的棋盘副本和 `false`。
    /// 否则写入 `marker` 并返回 `true`。落子编号的范围由 [`Move::new`] 保证。
    pub fn apply_move(&self, mv: Move, marker: Marker) -> (Board, bool) {
        let pos = mv.position();
        if !self.get(pos).is_empty() {
            return (*self, false);
        }
        let mut next = *self;
        next.set(pos, Cell::from(marker));
        (next, true)
    }

    /// 按行遍历
    pub fn rows(&self) -> impl Iterator<Item = &[Cell; BOARD_SIZE]> {
        self.cells.iter()
    }

    /// 行优先的全部格子
    pub fn iter(&self) -> impl Iterator<Item = Cell> + '_ {
        self.cells.iter().flatten().copied()
    }

    /// 所有空格对应的落子
    pub fn empty_cells(&self) -> Vec<Move> {
        Move::all().filter(|mv| self.get(mv.position()).is_empty()).collect()
    }

    pub fn is_full(&self) -> bool {
        self.iter().all(|cell| !cell.is_empty())
    }

    /// 指定标记已占据的格子数
    pub fn count(&self, marker: Marker) -> usize {
        self.iter().filter(|cell| cell.marker() == Some(marker)).count()
    }

    /// 裁定当前局面
    pub fn verdict(&self) -> Verdict {
        let flat: Vec<Cell> = self.iter().collect();
        for line in LINES {
            let first = flat[line[0]];
            if let Some(marker) = first.marker() {
                if flat[line[1]] == first && flat[line[2]] == first {
                    return Verdict::Win(marker);
                }
            }
        }
        if self.is_full() {
            Verdict::Draw
        } else {
            Verdict::InProgress
        }
    }

    /// 检查本棋盘是否可由 `prev` 继续落子得到（已占据的格子未被改写）
    pub fn is_successor_of(&self, prev: &Board) -> bool {
        prev.iter()
            .zip(self.iter())
            .all(|(before, after)| before.is_empty() || before == after)
    }

    /// 格子编号提示棋盘
    pub fn hints() -> String {
        let mut out = String::new();
        for row in 0..BOARD_SIZE {
            let labels: Vec<String> = (0..BOARD_SIZE)
                .map(|col| format!(" {} ", row * BOARD_SIZE + col + 1))
                .collect();
            out.push_str(&labels.join("|"));
            out.push('\n');
            if row + 1 < BOARD_SIZE {
                out.push_str("-----------\n");
            }
        }
        out
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.cells.iter().enumerate() {
            let labels: Vec<String> = row.iter().map(|c| format!(" {} ", c.to_char())).collect();
            writeln!(f, "{}", labels.join("|"))?;
            if i + 1 < BOARD_SIZE {
                writeln!(f, "-----------")?;
            }
        }
        Ok(())
    }
}
