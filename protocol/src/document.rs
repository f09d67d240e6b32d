//! 状态文档编解码
//!
//! 文档格式（单行，以换行结尾）：
//!
//! ```text
//! <GameState><Player>X</Player><GameType>Man vs Man</GameType><Board>
//!   <Row><Cell>X</Cell><Cell>_</Cell><Cell>_</Cell></Row> ... 共三行
//! </Board><Status>NextMove</Status></GameState>\n
//! ```
//!
//! 解码按字段更新：每个字段只有在存在且合法时才覆盖调用方给出的默认值，
//! 其余字段保持默认。解析问题只记录和告警，从不返回错误。

use std::fmt;

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::constants::BOARD_SIZE;
use crate::marker::{Cell, Marker, Position};
use crate::state::{GameMode, GameState, Status};

/// 根元素
const ROOT: &str = "GameState";
const PLAYER: &str = "Player";
const GAME_TYPE: &str = "GameType";
const BOARD: &str = "Board";
const ROW: &str = "Row";
const CELL: &str = "Cell";
const STATUS: &str = "Status";

/// 解码过程中发现的问题（非致命）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeIssue {
    /// 没有 `<GameState>` 根元素，所有默认值保持不变
    MissingRoot { found: Option<String> },
    /// XML 格式错误，解析在此处停止
    Malformed { position: u64, reason: String },
    /// 字段缺失，保留默认值
    MissingField(&'static str),
    /// 字段值不合法，保留默认值
    InvalidValue { field: &'static str, value: String },
}

impl fmt::Display for DecodeIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeIssue::MissingRoot { found: Some(name) } => {
                write!(f, "expected <{}> root, found <{}>", ROOT, name)
            }
            DecodeIssue::MissingRoot { found: None } => write!(f, "no <{}> element found", ROOT),
            DecodeIssue::Malformed { position, reason } => {
                write!(f, "malformed document at byte {}: {}", position, reason)
            }
            DecodeIssue::MissingField(field) => write!(f, "missing <{}>", field),
            DecodeIssue::InvalidValue { field, value } => {
                write!(f, "invalid <{}> value: {:?}", field, value)
            }
        }
    }
}

/// 解码结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeReport {
    pub state: GameState,
    pub issues: Vec<DecodeIssue>,
}

impl DecodeReport {
    /// 文档完整且合法
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// 是否找到了根元素
    pub fn has_root(&self) -> bool {
        !self
            .issues
            .iter()
            .any(|issue| matches!(issue, DecodeIssue::MissingRoot { .. }))
    }
}

/// 状态文档编解码器
pub struct StateCodec;

impl StateCodec {
    /// 编码为以换行结尾的文档
    pub fn encode(state: &GameState) -> String {
        let mut doc = String::with_capacity(320);
        doc.push_str("<GameState>");
        push_element(&mut doc, PLAYER, &state.player.to_char().to_string());
        push_element(&mut doc, GAME_TYPE, state.mode.label());
        doc.push_str("<Board>");
        for row in state.board.rows() {
            doc.push_str("<Row>");
            for cell in row {
                push_element(&mut doc, CELL, &cell.to_char().to_string());
            }
            doc.push_str("</Row>");
        }
        doc.push_str("</Board>");
        push_element(&mut doc, STATUS, state.status.label());
        doc.push_str("</GameState>\n");
        doc
    }

    /// 解码文档，缺失或不合法的字段保留 `defaults` 中的值
    pub fn decode(document: &str, defaults: &GameState) -> DecodeReport {
        let mut parser = DocumentParser::new(*defaults);
        parser.run(document);
        let report = parser.finish();
        for issue in &report.issues {
            tracing::warn!("状态文档解析问题: {}", issue);
        }
        report
    }

    /// 只取解码后的状态
    pub fn decode_state(document: &str, defaults: &GameState) -> GameState {
        Self::decode(document, defaults).state
    }
}

fn push_element(doc: &mut String, name: &str, text: &str) {
    doc.push('<');
    doc.push_str(name);
    doc.push('>');
    doc.push_str(&escape(text));
    doc.push_str("</");
    doc.push_str(name);
    doc.push('>');
}

/// 基于事件流的增量解析器
struct DocumentParser {
    state: GameState,
    issues: Vec<DecodeIssue>,
    /// 当前元素路径
    path: Vec<String>,
    seen_root: bool,
    seen_player: bool,
    seen_game_type: bool,
    seen_board: bool,
    seen_status: bool,
    /// 已进入的 `<Row>` 数量
    rows_seen: usize,
    /// 当前行内已结束的 `<Cell>` 数量
    col: usize,
}

impl DocumentParser {
    fn new(defaults: GameState) -> Self {
        Self {
            state: defaults,
            issues: Vec::new(),
            path: Vec::new(),
            seen_root: false,
            seen_player: false,
            seen_game_type: false,
            seen_board: false,
            seen_status: false,
            rows_seen: 0,
            col: 0,
        }
    }

    fn run(&mut self, document: &str) {
        let mut reader = Reader::from_str(document);
        reader.config_mut().trim_text(true);

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if !self.open(name) {
                        return;
                    }
                }
                Ok(Event::Empty(e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if self.path.is_empty() && !self.seen_root {
                        // `<GameState/>` 没有任何字段
                        if name != ROOT {
                            self.issues.push(DecodeIssue::MissingRoot { found: Some(name) });
                            return;
                        }
                        self.seen_root = true;
                        continue;
                    }
                    if name == CELL && self.in_row() {
                        self.col += 1;
                    }
                }
                Ok(Event::End(_)) => self.close(),
                Ok(Event::Text(t)) => match t.unescape() {
                    Ok(text) => self.text(text.trim()),
                    Err(e) => {
                        self.issues.push(DecodeIssue::Malformed {
                            position: reader.buffer_position() as u64,
                            reason: e.to_string(),
                        });
                        return;
                    }
                },
                Ok(Event::Eof) => return,
                Ok(_) => {}
                Err(e) => {
                    self.issues.push(DecodeIssue::Malformed {
                        position: reader.buffer_position() as u64,
                        reason: e.to_string(),
                    });
                    return;
                }
            }
        }
    }

    /// 进入元素；返回 `false` 表示应停止解析
    fn open(&mut self, name: String) -> bool {
        if self.path.is_empty() {
            if self.seen_root {
                // 根元素之后的内容忽略
                return false;
            }
            if name != ROOT {
                self.issues.push(DecodeIssue::MissingRoot { found: Some(name) });
                return false;
            }
            self.seen_root = true;
        } else if self.at(&[ROOT]) && name == BOARD {
            self.seen_board = true;
        } else if self.at(&[ROOT, BOARD]) && name == ROW {
            self.rows_seen += 1;
            self.col = 0;
        }
        self.path.push(name);
        true
    }

    fn close(&mut self) {
        if let Some(name) = self.path.pop() {
            if name == CELL && self.in_row() {
                self.col += 1;
            }
        }
    }

    fn text(&mut self, text: &str) {
        if self.at(&[ROOT, PLAYER]) {
            self.seen_player = true;
            match single_char(text).and_then(Marker::from_char) {
                Some(marker) => self.state.player = marker,
                None => self.invalid(PLAYER, text),
            }
        } else if self.at(&[ROOT, GAME_TYPE]) {
            self.seen_game_type = true;
            match text.parse::<GameMode>() {
                Ok(mode) => self.state.mode = mode,
                Err(_) => self.invalid(GAME_TYPE, text),
            }
        } else if self.at(&[ROOT, STATUS]) {
            self.seen_status = true;
            match text.parse::<Status>() {
                Ok(status) => self.state.status = status,
                Err(_) => self.invalid(STATUS, text),
            }
        } else if self.at(&[ROOT, BOARD, ROW, CELL]) {
            let row = self.rows_seen - 1;
            if row >= BOARD_SIZE || self.col >= BOARD_SIZE {
                tracing::debug!("忽略多余的格子: row={}, col={}", row, self.col);
                return;
            }
            match single_char(text).and_then(Cell::from_char) {
                Some(cell) => self
                    .state
                    .board
                    .set(Position::new_unchecked(row as u8, self.col as u8), cell),
                None => self.invalid(CELL, text),
            }
        }
    }

    fn invalid(&mut self, field: &'static str, value: &str) {
        self.issues.push(DecodeIssue::InvalidValue {
            field,
            value: value.to_string(),
        });
    }

    fn at(&self, path: &[&str]) -> bool {
        self.path.len() == path.len() && self.path.iter().zip(path).all(|(a, b)| a == b)
    }

    fn in_row(&self) -> bool {
        self.at(&[ROOT, BOARD, ROW])
    }

    fn finish(mut self) -> DecodeReport {
        if !self.seen_root {
            if !self
                .issues
                .iter()
                .any(|issue| matches!(issue, DecodeIssue::MissingRoot { .. }))
            {
                self.issues.push(DecodeIssue::MissingRoot { found: None });
            }
        } else {
            for (seen, field) in [
                (self.seen_player, PLAYER),
                (self.seen_game_type, GAME_TYPE),
                (self.seen_board, BOARD),
                (self.seen_status, STATUS),
            ] {
                if !seen {
                    self.issues.push(DecodeIssue::MissingField(field));
                }
            }
        }
        DecodeReport {
            state: self.state,
            issues: self.issues,
        }
    }
}

/// 单字符字段的取值，其他长度都不合法
fn single_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;
    use crate::marker::Move;

    fn sample_state() -> GameState {
        let mut state = GameState::new(Marker::X, GameMode::ManVsAi);
        for n in [5, 1, 9] {
            state = state.with_move(Move::new(n).unwrap()).unwrap();
        }
        state.status = Status::NextMove;
        state
    }

    #[test]
    fn test_encode_layout() {
        let state = GameState::new(Marker::O, GameMode::AiVsMan);
        let doc = StateCodec::encode(&state);

        assert!(doc.contains("<Player>O</Player>"));
        assert!(doc.contains("<GameType>AI vs Man</GameType>"));
        assert!(doc.contains("<Status>Start</Status>"));
        assert_eq!(doc.matches("<Cell>_</Cell>").count(), 9);
        assert!(doc.starts_with("<GameState><Player>"));
        assert!(doc.ends_with("</Status></GameState>\n"));
        assert_eq!(doc.matches('\n').count(), 1);
    }

    #[test]
    fn test_encode_field_order() {
        let doc = StateCodec::encode(&sample_state());
        let player = doc.find("<Player>").unwrap();
        let game_type = doc.find("<GameType>").unwrap();
        let board = doc.find("<Board>").unwrap();
        let status = doc.find("<Status>").unwrap();
        assert!(player < game_type && game_type < board && board < status);
        assert!(doc.contains("<Row><Cell>O</Cell><Cell>_</Cell><Cell>_</Cell></Row>"));
        assert!(doc.contains("<Row><Cell>_</Cell><Cell>X</Cell><Cell>_</Cell></Row>"));
    }

    #[test]
    fn test_round_trip() {
        let other = GameState::new(Marker::O, GameMode::AiVsAi);
        let full = Move::all().fold(GameState::new(Marker::X, GameMode::ManVsMan), |state, mv| {
            state.with_move(mv).unwrap()
        });
        assert!(full.board.is_full());
        let statuses = [Status::Start, Status::NextMove, Status::WinX, Status::WinO, Status::Draw];

        for board in [Board::empty(), sample_state().board, full.board] {
            for mode in GameMode::all() {
                for status in statuses {
                    let mut state = sample_state();
                    state.board = board;
                    state.mode = *mode;
                    state.status = status;

                    let report = StateCodec::decode(&StateCodec::encode(&state), &other);
                    assert!(report.is_clean(), "{:?}", report.issues);
                    assert_eq!(report.state, state);
                }
            }
        }
    }

    #[test]
    fn test_missing_status_keeps_default() {
        let mut defaults = sample_state();
        defaults.status = Status::NextMove;
        let doc = "<GameState><Player>O</Player><GameType>Man vs AI</GameType>\
                   <Board><Row><Cell>X</Cell><Cell>_</Cell><Cell>_</Cell></Row></Board></GameState>\n";

        let report = StateCodec::decode(doc, &defaults);
        assert_eq!(report.state.status, Status::NextMove);
        assert_eq!(report.state.player, Marker::O);
        assert!(report.issues.contains(&DecodeIssue::MissingField("Status")));
    }

    #[test]
    fn test_no_root_keeps_everything() {
        let defaults = sample_state();
        for doc in ["", "hello\n", "<Other><Player>O</Player></Other>\n"] {
            let report = StateCodec::decode(doc, &defaults);
            assert_eq!(report.state, defaults);
            assert!(!report.has_root());
        }
    }

    #[test]
    fn test_invalid_fields_keep_defaults() {
        let defaults = sample_state();
        let doc = "<GameState><Player>Z</Player><GameType>Chess</GameType>\
                   <Board><Row><Cell>Q</Cell><Cell>O</Cell><Cell>_</Cell></Row></Board>\
                   <Status>Paused</Status></GameState>\n";

        let report = StateCodec::decode(doc, &defaults);
        assert_eq!(report.state.player, defaults.player);
        assert_eq!(report.state.mode, defaults.mode);
        assert_eq!(report.state.status, defaults.status);
        // 合法的格子仍然生效，不合法的保留默认
        let corner = Position::new_unchecked(0, 0);
        assert_eq!(report.state.board.get(corner), defaults.board.get(corner));
        assert_eq!(report.state.board.get(Position::new_unchecked(0, 1)), Cell::O);
        assert_eq!(report.issues.len(), 4);
    }

    #[test]
    fn test_player_must_be_single_marker() {
        let defaults = sample_state();
        for text in ["Xylophone", "OX", ""] {
            let doc = format!(
                "<GameState><Player>{}</Player><Status>Draw</Status></GameState>\n",
                text
            );
            let report = StateCodec::decode(&doc, &defaults);
            assert_eq!(report.state.player, defaults.player);
            assert_eq!(report.state.status, Status::Draw);
            if !text.is_empty() {
                assert!(report.issues.contains(&DecodeIssue::InvalidValue {
                    field: "Player",
                    value: text.to_string(),
                }));
            }
        }
    }

    #[test]
    fn test_truncated_document_keeps_parsed_fields() {
        let defaults = GameState::new(Marker::X, GameMode::ManVsMan);
        let doc = "<GameState><Player>O</Player><GameType>AI vs AI</GameType><Board><Row><Cell>X</Ce";

        let report = StateCodec::decode(doc, &defaults);
        assert_eq!(report.state.player, Marker::O);
        assert_eq!(report.state.mode, GameMode::AiVsAi);
        assert_eq!(report.state.status, Status::Start);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_decode_peer_document() {
        // 对端带 XML 声明、使用 "Win X" 标签
        let doc = "<?xml version=\"1.0\" encoding=\"utf-8\"?><GameState><Player>O</Player>\
                   <GameType>AI vs AI</GameType><Board>\
                   <Row><Cell>X</Cell><Cell>X</Cell><Cell>X</Cell></Row>\
                   <Row><Cell>O</Cell><Cell>O</Cell><Cell>_</Cell></Row>\
                   <Row><Cell>_</Cell><Cell>_</Cell><Cell>_</Cell></Row>\
                   </Board><Status>Win X</Status></GameState>\n";

        let report = StateCodec::decode(doc, &GameState::new(Marker::X, GameMode::ManVsMan));
        assert!(report.is_clean(), "{:?}", report.issues);
        assert_eq!(report.state.status, Status::WinX);
        assert_eq!(report.state.board.count(Marker::X), 3);
        assert_eq!(report.state.board.count(Marker::O), 2);
    }

    #[test]
    fn test_empty_cell_elements_advance_column() {
        let defaults = GameState::new(Marker::X, GameMode::ManVsMan);
        let doc = "<GameState><Board><Row><Cell/><Cell>O</Cell><Cell/></Row></Board></GameState>";

        let report = StateCodec::decode(doc, &defaults);
        assert_eq!(report.state.board.get(Position::new_unchecked(0, 1)), Cell::O);
        assert_eq!(report.state.board.count(Marker::O), 1);
        assert_eq!(report.state.board, {
            let mut board = Board::empty();
            board.set(Position::new_unchecked(0, 1), Cell::O);
            board
        });
    }
}
