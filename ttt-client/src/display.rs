//! 棋盘显示与结果输出

use protocol::{Board, GameError, GameMode, GameState, Marker, Move, SessionObserver, Status};

use crate::storage::StateStore;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// 着色
pub fn paint(text: &str, color: &str, enabled: bool) -> String {
    if enabled {
        format!("{}{}{}", color, text, RESET)
    } else {
        text.to_string()
    }
}

/// 渲染棋盘，标记按执子方着色
pub fn render_board(board: &Board, color: bool) -> String {
    if !color {
        return board.to_string();
    }
    board
        .to_string()
        .replace('X', &paint("X", GREEN, true))
        .replace('O', &paint("O", RED, true))
}

/// 结果描述
pub fn render_result(status: Status, color: bool) -> String {
    match status.winner() {
        Some(marker) => paint(&format!("Player {} wins!", marker), GREEN, color),
        None if status == Status::Draw => paint("It's a draw!", GREEN, color),
        None => format!("Game status: {}", status),
    }
}

/// 控制台观察者：打印每一轮，并把收到的文档写入状态文件
pub struct ConsoleObserver {
    color: bool,
    store: Option<StateStore>,
    last: Option<GameState>,
}

impl ConsoleObserver {
    pub fn new(color: bool, store: Option<StateStore>) -> Self {
        Self {
            color,
            store,
            last: None,
        }
    }

    /// 最后收到的状态
    pub fn last_state(&self) -> Option<&GameState> {
        self.last.as_ref()
    }
}

impl SessionObserver for ConsoleObserver {
    fn round_started(&mut self, round: u32, state: &GameState) {
        println!();
        println!("== Round {} ({}, next: {}) ==", round + 1, state.mode, state.player);
        if round == 0 {
            println!("Cell numbers:");
            println!("{}", Board::hints());
        }
    }

    fn move_rejected(&mut self, error: &GameError) {
        let text = match error {
            GameError::OutOfRange { .. } => "Invalid move. Please enter a number between 1 and 9.".to_string(),
            GameError::CellOccupied { cell } => format!("Cell {} is already taken. Try again.", cell),
            GameError::GameOver => "The game is already over.".to_string(),
        };
        println!("{}", paint(&text, RED, self.color));
    }

    fn move_applied(&mut self, mv: Move, state: &GameState) {
        println!("{} plays {}", state.player.opponent(), mv);
    }

    fn reply_received(&mut self, document: &str, state: &GameState) {
        println!("{}", render_board(&state.board, self.color));
        if !state.status.is_terminal() {
            println!("Status: {}", state.status);
        }

        self.last = Some(*state);
        if let Some(store) = &self.store {
            if let Err(e) = store.save_current(document) {
                tracing::warn!("无法写入状态文件: {:#}", e);
            }
        }
    }

    fn finished(&mut self, status: Status) {
        println!();
        println!("{}", render_result(status, self.color));

        if let (Some(store), Some(state)) = (&self.store, &self.last) {
            match store.archive(state) {
                Ok(name) => println!("Saved as {}", name),
                Err(e) => tracing::warn!("存档失败: {:#}", e),
            }
        }
    }
}

/// 显示一份状态（用于列出存档）
pub fn render_state(state: &GameState, color: bool) -> String {
    let mut out = render_board(&state.board, color);
    out.push('\n');
    out.push_str(&render_result(state.status, color));
    out
}

/// 某方是否由本地控制
pub fn is_local(mode: GameMode, first: Marker, marker: Marker) -> bool {
    match mode {
        GameMode::ManVsMan => true,
        GameMode::ManVsAi => marker == first,
        GameMode::AiVsMan => marker != first,
        GameMode::AiVsAi => false,
    }
}

/// 先手方：棋盘上标记较多的一方，数量相同时为下一个落子方
pub fn first_mover(state: &GameState) -> Marker {
    let next = state.player;
    if state.board.count(next) < state.board.count(next.opponent()) {
        next.opponent()
    } else {
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::StateCodec;
    use tempfile::TempDir;

    #[test]
    fn test_render_board_plain() {
        let state = GameState::new(Marker::X, GameMode::ManVsMan)
            .with_move(Move::new(5).unwrap())
            .unwrap();
        let text = render_board(&state.board, false);
        assert_eq!(text, state.board.to_string());
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn test_render_board_colored() {
        let state = GameState::new(Marker::O, GameMode::ManVsMan)
            .with_move(Move::new(1).unwrap())
            .unwrap();
        let text = render_board(&state.board, true);
        assert!(text.contains("\x1b[31mO\x1b[0m"));
    }

    #[test]
    fn test_render_result() {
        assert_eq!(render_result(Status::WinO, false), "Player O wins!");
        assert_eq!(render_result(Status::Draw, false), "It's a draw!");
        assert!(render_result(Status::WinX, true).starts_with(GREEN));
    }

    #[test]
    fn test_is_local() {
        assert!(is_local(GameMode::ManVsAi, Marker::O, Marker::O));
        assert!(!is_local(GameMode::ManVsAi, Marker::O, Marker::X));
        assert!(is_local(GameMode::AiVsMan, Marker::X, Marker::O));
        assert!(!is_local(GameMode::AiVsAi, Marker::X, Marker::X));
    }

    #[test]
    fn test_first_mover() {
        let opening = GameState::new(Marker::O, GameMode::AiVsMan);
        assert_eq!(first_mover(&opening), Marker::O);

        let one = opening.with_move(Move::new(5).unwrap()).unwrap();
        assert_eq!(one.player, Marker::X);
        assert_eq!(first_mover(&one), Marker::O);

        let two = one.with_move(Move::new(1).unwrap()).unwrap();
        assert_eq!(first_mover(&two), Marker::O);
    }

    #[test]
    fn test_observer_persists_and_archives() {
        let temp_dir = TempDir::new().unwrap();
        let store = StateStore::with_dir(temp_dir.path()).unwrap();
        let mut observer = ConsoleObserver::new(false, Some(store));

        let mut state = GameState::new(Marker::X, GameMode::ManVsAi);
        for value in [1, 4, 2, 5, 3] {
            state = state.with_move(Move::new(value).unwrap()).unwrap();
        }
        state.status = Status::WinX;
        let document = StateCodec::encode(&state);

        observer.reply_received(&document, &state);
        observer.finished(Status::WinX);

        let saved = std::fs::read_to_string(temp_dir.path().join("game_state.xml")).unwrap();
        assert_eq!(saved, document);
        assert_eq!(observer.last_state(), Some(&state));

        let store = StateStore::with_dir(temp_dir.path()).unwrap();
        assert_eq!(store.list_archives().unwrap().len(), 1);
    }
}
