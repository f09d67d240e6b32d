//! 搜索引擎
//!
//! 实现 Negamax + Alpha-Beta 剪枝

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use protocol::{Board, GameState, Marker, Move, MoveSource, Verdict};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::evaluate::Evaluator;

/// 胜局基础分，减去层数使更快的胜利得分更高
const WIN_SCORE: i32 = 1000;

/// AI 难度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn all() -> &'static [Difficulty] {
        &[Difficulty::Easy, Difficulty::Medium, Difficulty::Hard]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Difficulty::all()
            .iter()
            .copied()
            .find(|d| d.label() == normalized)
            .ok_or_else(|| format!("unknown difficulty: {}", s.trim()))
    }
}

/// AI 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub difficulty: Difficulty,
    pub max_depth: u8,
    /// 放弃搜索、随机落子的概率
    pub random_move_chance: f64,
}

impl AiConfig {
    pub fn from_difficulty(difficulty: Difficulty) -> Self {
        match difficulty {
            Difficulty::Easy => Self {
                difficulty,
                max_depth: 2,
                random_move_chance: 0.5,
            },
            Difficulty::Medium => Self {
                difficulty,
                max_depth: 4,
                random_move_chance: 0.2,
            },
            Difficulty::Hard => Self {
                difficulty,
                max_depth: 9,
                random_move_chance: 0.0,
            },
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self::from_difficulty(Difficulty::Medium)
    }
}

/// AI 引擎
pub struct AiEngine {
    config: AiConfig,
    rng: ChaCha8Rng,
    nodes_searched: u64,
}

impl AiEngine {
    /// 创建新的 AI 引擎
    pub fn new(config: AiConfig) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::from_entropy(),
            nodes_searched: 0,
        }
    }

    /// 使用固定种子创建（结果可复现）
    pub fn with_seed(config: AiConfig, seed: u64) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
            nodes_searched: 0,
        }
    }

    /// 为 `side` 搜索最佳落子，棋盘已满时返回 `None`
    pub fn search(&mut self, board: &Board, side: Marker) -> Option<Move> {
        self.nodes_searched = 0;

        let moves = Self::ordered_moves(board);
        if moves.len() <= 1 {
            return moves.first().copied();
        }

        if self.config.random_move_chance > 0.0 && self.rng.gen_bool(self.config.random_move_chance) {
            let mv = moves.choose(&mut self.rng).copied();
            tracing::debug!("AI ({}) 随机落子: {:?}", self.config.difficulty, mv);
            return mv;
        }

        let mut best_moves = Vec::new();
        let mut best_score = i32::MIN;
        let mut alpha = -WIN_SCORE * 2;
        let beta = WIN_SCORE * 2;

        for mv in &moves {
            let (next, _) = board.apply_move(*mv, side);
            let score = -self.negamax(&next, side.opponent(), self.config.max_depth.saturating_sub(1), -beta, -alpha, 1);

            if score > best_score {
                best_score = score;
                best_moves.clear();
                best_moves.push(*mv);
            } else if score == best_score {
                best_moves.push(*mv);
            }
            // 只收紧到严格更优，保留同分走法以便随机挑选
            if score > alpha {
                alpha = score - 1;
            }
        }

        let mv = best_moves.choose(&mut self.rng).copied();
        tracing::debug!(
            "AI ({}) 为 {} 选择 {:?}，评分 {}，搜索节点 {}",
            self.config.difficulty,
            side,
            mv,
            best_score,
            self.nodes_searched
        );
        mv
    }

    /// Negamax 搜索，返回 `to_move` 视角的分数
    fn negamax(&mut self, board: &Board, to_move: Marker, depth: u8, mut alpha: i32, beta: i32, ply: i32) -> i32 {
        self.nodes_searched += 1;

        match board.verdict() {
            Verdict::Win(winner) if winner == to_move => return WIN_SCORE - ply,
            Verdict::Win(_) => return -(WIN_SCORE - ply),
            Verdict::Draw => return 0,
            Verdict::InProgress => {}
        }

        if depth == 0 {
            return Evaluator::evaluate(board, to_move);
        }

        let mut best = -WIN_SCORE * 2;
        for mv in Self::ordered_moves(board) {
            let (next, _) = board.apply_move(mv, to_move);
            let score = -self.negamax(&next, to_move.opponent(), depth - 1, -beta, -alpha, ply + 1);

            if score > best {
                best = score;
            }
            if score > alpha {
                alpha = score;
            }
            if alpha >= beta {
                break; // Beta 剪枝
            }
        }

        best
    }

    /// 空格按位置分排序（中心、角、边）
    fn ordered_moves(board: &Board) -> Vec<Move> {
        let mut moves = board.empty_cells();
        moves.sort_by_key(|mv| -Evaluator::position_bonus(mv.position().to_index()));
        moves
    }
}

#[async_trait]
impl MoveSource for AiEngine {
    async fn propose(&mut self, state: &GameState) -> protocol::Result<Option<u32>> {
        Ok(self.search(&state.board, state.player).map(|mv| u32::from(mv.number())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{Cell, GameMode, Position};

    fn board_from(rows: [&str; 3]) -> Board {
        let mut board = Board::empty();
        for (row, text) in rows.iter().enumerate() {
            for (col, c) in text.chars().enumerate() {
                let cell = Cell::from_char(c).unwrap();
                board.set(Position::new_unchecked(row as u8, col as u8), cell);
            }
        }
        board
    }

    fn hard(seed: u64) -> AiEngine {
        AiEngine::with_seed(AiConfig::from_difficulty(Difficulty::Hard), seed)
    }

    #[test]
    fn test_difficulty_config() {
        let easy = AiConfig::from_difficulty(Difficulty::Easy);
        assert_eq!(easy.random_move_chance, 0.5);

        let medium = AiConfig::from_difficulty(Difficulty::Medium);
        assert_eq!(medium.random_move_chance, 0.2);

        let hard = AiConfig::from_difficulty(Difficulty::Hard);
        assert_eq!(hard.max_depth, 9);
        assert_eq!(hard.random_move_chance, 0.0);

        assert_eq!("HARD".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert!("expert".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_takes_winning_move() {
        let board = board_from(["XX_", "OO_", "___"]);
        let mv = hard(1).search(&board, Marker::X);
        assert_eq!(mv, Some(Move::new(3).unwrap()));
    }

    #[test]
    fn test_blocks_opponent() {
        let board = board_from(["OO_", "_X_", "__X"]);
        let mv = hard(2).search(&board, Marker::X);
        assert_eq!(mv, Some(Move::new(3).unwrap()));
    }

    #[test]
    fn test_full_board_has_no_move() {
        let board = board_from(["XOX", "XOO", "OXX"]);
        assert_eq!(hard(3).search(&board, Marker::O), None);
    }

    #[test]
    fn test_single_empty_cell() {
        let board = board_from(["XOX", "XOO", "OX_"]);
        assert_eq!(hard(4).search(&board, Marker::X), Some(Move::new(9).unwrap()));
    }

    #[test]
    fn test_hard_self_play_draws() {
        let mut x = hard(5);
        let mut o = hard(6);
        let mut board = Board::empty();
        let mut side = Marker::X;

        while board.verdict() == Verdict::InProgress {
            let engine = if side == Marker::X { &mut x } else { &mut o };
            let mv = engine.search(&board, side).unwrap();
            let (next, accepted) = board.apply_move(mv, side);
            assert!(accepted);
            board = next;
            side = side.opponent();
        }

        assert_eq!(board.verdict(), Verdict::Draw);
    }

    #[test]
    fn test_seeded_engines_agree() {
        let board = board_from(["X__", "___", "___"]);
        let config = AiConfig::from_difficulty(Difficulty::Easy);
        let mut a = AiEngine::with_seed(config.clone(), 42);
        let mut b = AiEngine::with_seed(config, 42);
        for _ in 0..10 {
            assert_eq!(a.search(&board, Marker::O), b.search(&board, Marker::O));
        }
    }

    #[tokio::test]
    async fn test_propose_returns_cell_number() {
        let mut state = GameState::new(Marker::O, GameMode::AiVsAi);
        state.board = board_from(["XX_", "OO_", "X__"]);

        let mut engine = hard(7);
        let proposal = engine.propose(&state).await.unwrap();
        assert_eq!(proposal, Some(6));
    }
}
