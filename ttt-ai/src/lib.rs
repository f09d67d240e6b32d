//! 井字棋 AI 引擎
//!
//! 包含:
//! - 局面评估函数
//! - Negamax + Alpha-Beta 搜索
//! - 难度分级（随机走法概率）

mod evaluate;
mod search;

pub use evaluate::Evaluator;
pub use search::{AiConfig, AiEngine, Difficulty};
