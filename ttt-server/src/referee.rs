//! 裁判
//!
//! 对端的权威判定：解码收到的文档，计算局面状态；
//! 若当前模式的对端一方是自动的，先为其落子再判定。

use protocol::{
    Board, GameMode, GameState, Marker, Move, MoveSource, StateCodec, Status, Verdict,
};

/// 裁判
pub struct Referee {
    ai: Box<dyn MoveSource>,
    /// 上一次回复的状态，作为下一份文档缺失字段的默认值
    last: Option<GameState>,
    games_finished: u32,
}

impl Referee {
    pub fn new(ai: Box<dyn MoveSource>) -> Self {
        Self {
            ai,
            last: None,
            games_finished: 0,
        }
    }

    /// 处理一份文档，返回回复文档
    pub async fn handle(&mut self, document: &str) -> String {
        let defaults = self
            .last
            .unwrap_or_else(|| GameState::new(Marker::X, GameMode::default()));
        let report = StateCodec::decode(document, &defaults);
        if !report.has_root() {
            tracing::warn!("收到的文档没有根元素，按上一状态处理");
        }

        let mut state = report.state;
        if state.status == Status::Start && state.board == Board::empty() {
            tracing::info!("新对局: {}，{} 先手", state.mode, state.player);
        }

        let mut verdict = state.verdict();
        state.status = Status::from(verdict);
        if verdict == Verdict::InProgress && state.mode.remote_moves() {
            verdict = self.play_automated(&mut state).await;
            state.status = Status::from(verdict);
        }

        if state.status.is_terminal() {
            self.games_finished += 1;
            tracing::info!("对局结束: {}", state.status);
        }

        self.last = Some(state);
        StateCodec::encode(&state)
    }

    /// 为 `state.player` 自动落子，返回落子后的裁定
    async fn play_automated(&mut self, state: &mut GameState) -> Verdict {
        match self.ai.propose(state).await {
            Ok(Some(value)) => match Move::new(value).and_then(|mv| state.with_move(mv)) {
                Ok(next) => {
                    tracing::debug!("AI 以 {} 落子 {}", state.player, value);
                    *state = next;
                }
                Err(e) => tracing::warn!("AI 落子无效 ({}): {}", value, e),
            },
            Ok(None) => tracing::warn!("AI 没有可走的格子"),
            Err(e) => tracing::warn!("AI 落子失败: {}", e),
        }
        state.verdict()
    }

    /// 上一次回复的状态
    pub fn last_state(&self) -> Option<&GameState> {
        self.last.as_ref()
    }

    pub fn last_status(&self) -> Option<Status> {
        self.last.map(|state| state.status)
    }

    pub fn games_finished(&self) -> u32 {
        self.games_finished
    }

    /// 清除上一状态，准备下一局
    pub fn reset(&mut self) {
        self.last = None;
    }
}
