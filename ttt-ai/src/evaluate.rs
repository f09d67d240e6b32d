//! 局面评估函数

use protocol::{Board, Cell, Marker, LINES};

/// 评估器
pub struct Evaluator;

/// 格子位置分值（中心 > 角 > 边），索引为 row * 3 + col
const POSITION_TABLE: [i32; 9] = [
    3, 2, 3,
    2, 4, 2,
    3, 2, 3,
];

/// 连线分值：同一条线上只有一方的 1 子 / 2 子
const ONE_IN_LINE: i32 = 1;
const TWO_IN_LINE: i32 = 10;

impl Evaluator {
    /// 评估棋局（`side` 视角，正值对 `side` 有利）
    ///
    /// 只用于非终局局面，终局由搜索直接计分。
    pub fn evaluate(board: &Board, side: Marker) -> i32 {
        let cells: Vec<Cell> = board.iter().collect();
        let mut score = 0;

        for line in LINES {
            score += Self::evaluate_line(line.map(|i| cells[i]), side);
        }

        for (index, cell) in cells.iter().enumerate() {
            match cell.marker() {
                Some(marker) if marker == side => score += POSITION_TABLE[index],
                Some(_) => score -= POSITION_TABLE[index],
                None => {}
            }
        }

        score
    }

    /// 评估单条连线：双方都有子的线没有价值
    fn evaluate_line(line: [Cell; 3], side: Marker) -> i32 {
        let own = line.iter().filter(|c| c.marker() == Some(side)).count();
        let other = line
            .iter()
            .filter(|c| c.marker() == Some(side.opponent()))
            .count();

        let value = |count: usize| match count {
            1 => ONE_IN_LINE,
            2 => TWO_IN_LINE,
            _ => 0,
        };

        match (own, other) {
            (n, 0) => value(n),
            (0, n) => -value(n),
            _ => 0,
        }
    }

    /// 格子的位置分（用于走法排序）
    pub fn position_bonus(index: usize) -> i32 {
        POSITION_TABLE.get(index).copied().unwrap_or(0)
    }
}
