//! 服务器主循环
//!
//! 半双工：每轮接受一个句柄，等待一份文档，回复后关闭。

use std::time::Duration;

use protocol::{Connection, Listener, ProtocolError, Result, RECEIVE_TIMEOUT};

use crate::referee::Referee;

/// 服务配置
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 每轮等待文档的上限
    pub receive_timeout: Duration,
    /// 对局结束后是否继续服务下一局
    pub keep_alive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            receive_timeout: RECEIVE_TIMEOUT,
            keep_alive: false,
        }
    }
}

/// 服务统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeSummary {
    /// 已回复的文档数
    pub rounds: u32,
    /// 已结束的对局数
    pub games: u32,
}

/// 裁判服务
pub struct Server {
    referee: Referee,
    config: ServerConfig,
}

impl Server {
    pub fn new(referee: Referee, config: ServerConfig) -> Self {
        Self { referee, config }
    }

    pub fn referee(&self) -> &Referee {
        &self.referee
    }

    /// 运行服务循环，直到一局结束（`keep_alive` 时不返回，除非出错）
    pub async fn serve<L: Listener>(&mut self, listener: &mut L) -> Result<ServeSummary> {
        let mut summary = ServeSummary::default();
        tracing::info!(
            "裁判服务已启动: {}",
            listener.local_addr().unwrap_or_else(|| "?".to_string())
        );

        loop {
            let mut conn = listener.accept().await?;
            let peer = conn.peer_addr().unwrap_or_else(|| "?".to_string());

            let document = match conn.recv_within(self.config.receive_timeout).await {
                Ok(document) => document,
                Err(e @ (ProtocolError::ReceiveTimeout(_) | ProtocolError::ConnectionClosed)) => {
                    tracing::warn!("{} 本轮未收到文档: {}", peer, e);
                    close_quietly(&mut conn).await;
                    continue;
                }
                Err(e) => {
                    close_quietly(&mut conn).await;
                    return Err(e);
                }
            };
            tracing::debug!("收到 {}: {}", peer, document.trim_end());

            let reply = self.referee.handle(&document).await;
            let sent = conn.send(&reply).await;
            close_quietly(&mut conn).await;
            sent?;
            summary.rounds += 1;
            tracing::debug!("回复 {}: {}", peer, reply.trim_end());

            if self.referee.last_status().is_some_and(|status| status.is_terminal()) {
                summary.games += 1;
                if !self.config.keep_alive {
                    tracing::info!("对局结束，服务停止（共 {} 轮）", summary.rounds);
                    return Ok(summary);
                }
                self.referee.reset();
            }
        }
    }
}

async fn close_quietly<C: Connection>(conn: &mut C) {
    if let Err(e) = conn.close().await {
        tracing::debug!("关闭句柄失败: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use protocol::{
        BaudRate, Board, Connector, GameMode, GameState, Marker, Move, MoveSource, StateCodec,
        Status, TcpConnector, TcpListener,
    };

    struct Silent;

    #[async_trait]
    impl MoveSource for Silent {
        async fn propose(&mut self, _state: &GameState) -> Result<Option<u32>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_serve_stops_after_terminal_reply() {
        let mut listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let mut server = Server::new(Referee::new(Box::new(Silent)), ServerConfig::default());
            server.serve(&mut listener).await
        });

        // 一个空连接：对端不发送就关闭，服务继续
        let mut idle = TcpConnector.open(&addr, BaudRate::default()).await.unwrap();
        idle.close().await.unwrap();

        let mut state = GameState::new(Marker::O, GameMode::ManVsMan);
        for value in [1, 4, 2, 5] {
            state = state.with_move(Move::new(value).unwrap()).unwrap();
        }
        let mut conn = TcpConnector.open(&addr, BaudRate::default()).await.unwrap();
        conn.send(&StateCodec::encode(&state)).await.unwrap();
        let reply = conn.recv().await.unwrap();
        assert!(reply.contains("<Status>NextMove</Status>"));
        conn.close().await.unwrap();

        state = state.with_move(Move::new(3).unwrap()).unwrap();
        let mut conn = TcpConnector.open(&addr, BaudRate::default()).await.unwrap();
        conn.send(&StateCodec::encode(&state)).await.unwrap();
        let reply = StateCodec::decode_state(&conn.recv().await.unwrap(), &state);
        assert_eq!(reply.status, Status::WinO);

        let summary = handle.await.unwrap().unwrap();
        assert_eq!(summary, ServeSummary { rounds: 2, games: 1 });
    }

    /// 预设来文的链路：每次接受取出一份，取完后链路断开
    struct ScriptedListener {
        incoming: VecDeque<Result<String>>,
        replies: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedListener {
        fn new(incoming: Vec<Result<String>>) -> Self {
            Self {
                incoming: incoming.into(),
                replies: Arc::default(),
            }
        }

        fn replies(&self) -> Vec<String> {
            self.replies.lock().unwrap().clone()
        }
    }

    struct ScriptedConnection {
        incoming: Option<Result<String>>,
        replies: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Connection for ScriptedConnection {
        async fn send(&mut self, document: &str) -> Result<()> {
            self.replies.lock().unwrap().push(document.to_string());
            Ok(())
        }

        async fn recv(&mut self) -> Result<String> {
            self.incoming.take().unwrap_or(Err(ProtocolError::ConnectionClosed))
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }

        fn peer_addr(&self) -> Option<String> {
            Some("script".to_string())
        }
    }

    #[async_trait]
    impl Listener for ScriptedListener {
        type Conn = ScriptedConnection;

        async fn accept(&mut self) -> Result<Self::Conn> {
            match self.incoming.pop_front() {
                Some(incoming) => Ok(ScriptedConnection {
                    incoming: Some(incoming),
                    replies: self.replies.clone(),
                }),
                None => Err(link_lost()),
            }
        }

        fn local_addr(&self) -> Option<String> {
            None
        }
    }

    fn link_lost() -> ProtocolError {
        std::io::Error::new(std::io::ErrorKind::BrokenPipe, "link lost").into()
    }

    /// `first` 先手，落子 1 4 2 5 3 后先手方连成第一行
    fn won_by(first: Marker) -> GameState {
        let mut state = GameState::new(first, GameMode::ManVsMan);
        for value in [1, 4, 2, 5, 3] {
            state = state.with_move(Move::new(value).unwrap()).unwrap();
        }
        state
    }

    #[tokio::test]
    async fn test_keep_alive_serves_next_game_from_fresh_state() {
        let mut listener = ScriptedListener::new(vec![
            Ok(StateCodec::encode(&won_by(Marker::O))),
            Ok("<GameState><Status>Start</Status></GameState>\n".to_string()),
            Ok(StateCodec::encode(&won_by(Marker::X))),
        ]);
        let config = ServerConfig {
            keep_alive: true,
            ..ServerConfig::default()
        };
        let mut server = Server::new(Referee::new(Box::new(Silent)), config);

        // 来文取完后链路断开，服务以错误返回
        let err = server.serve(&mut listener).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Io(_)));
        assert_eq!(server.referee().games_finished(), 2);

        let replies = listener.replies();
        assert_eq!(replies.len(), 3);
        assert!(replies[0].contains("<Status>Win O</Status>"));

        // 第二局的第一份回复不沿用上一局的棋盘
        let defaults = won_by(Marker::O);
        let opening = StateCodec::decode_state(&replies[1], &defaults);
        assert_eq!(opening.board, Board::empty());
        assert_eq!(opening.player, Marker::X);
        assert_eq!(opening.status, Status::NextMove);

        assert!(replies[2].contains("<Status>Win X</Status>"));
        // 终局后已为下一局清空
        assert_eq!(server.referee().last_status(), None);
    }

    #[tokio::test]
    async fn test_link_error_ends_serve() {
        // 接收时的链路错误不同于超时，不会被跳过
        let mut listener = ScriptedListener::new(vec![
            Err(ProtocolError::ReceiveTimeout(RECEIVE_TIMEOUT)),
            Err(link_lost()),
            Ok(StateCodec::encode(&won_by(Marker::X))),
        ]);
        let mut server = Server::new(Referee::new(Box::new(Silent)), ServerConfig::default());

        let err = server.serve(&mut listener).await.unwrap_err();
        assert!(err.is_transport());
        assert!(listener.replies().is_empty());
        assert_eq!(listener.incoming.len(), 1);
        assert_eq!(server.referee().last_status(), None);
    }
}
