//! 控制台交互
//!
//! 开局前的选项提示与对局中的人类落子输入共用同一个输入流

use std::fmt::Display;

use anyhow::Result;
use async_trait::async_trait;
use protocol::{GameState, MoveSource};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};

/// 控制台
pub struct Console<R, W> {
    reader: R,
    writer: W,
}

impl Console<BufReader<Stdin>, Stdout> {
    /// 标准输入输出
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// 输出一行
    pub async fn say(&mut self, text: &str) -> std::io::Result<()> {
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }

    /// 读取一行（去掉首尾空白），输入结束时返回 `None`
    async fn read_line(&mut self) -> std::io::Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    async fn prompt(&mut self, text: &str) -> std::io::Result<Option<String>> {
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.flush().await?;
        self.read_line().await
    }

    /// 从列表中选择，空输入取默认值，输入结束时返回 `None`
    pub async fn choose<T>(&mut self, title: &str, options: &[T], default: T) -> Result<Option<T>>
    where
        T: Copy + PartialEq + Display + Send + Sync,
    {
        let mut menu = format!("{}:", title);
        for (i, option) in options.iter().enumerate() {
            let mark = if *option == default { " (default)" } else { "" };
            menu.push_str(&format!("\n  {}. {}{}", i + 1, option, mark));
        }
        self.say(&menu).await?;

        loop {
            let Some(input) = self.prompt("> ").await? else {
                return Ok(None);
            };
            if input.is_empty() {
                return Ok(Some(default));
            }
            match input.parse::<usize>() {
                Ok(n) if (1..=options.len()).contains(&n) => return Ok(Some(options[n - 1])),
                _ => {
                    self.say(&format!("Please enter a number between 1 and {}", options.len()))
                        .await?
                }
            }
        }
    }

    /// 询问一段文本，空输入取默认值，输入结束时返回 `None`
    pub async fn ask_text(&mut self, title: &str, default: &str) -> Result<Option<String>> {
        let Some(input) = self.prompt(&format!("{} [{}]: ", title, default)).await? else {
            return Ok(None);
        };
        if input.is_empty() {
            Ok(Some(default.to_string()))
        } else {
            Ok(Some(input))
        }
    }

    /// 询问落子编号，`q` 或输入结束表示放弃
    pub async fn ask_move(&mut self, state: &GameState) -> std::io::Result<Option<u32>> {
        loop {
            let text = format!("Player {}, enter cell (1-9, q to quit): ", state.player);
            let Some(input) = self.prompt(&text).await? else {
                return Ok(None);
            };
            if input.eq_ignore_ascii_case("q") {
                return Ok(None);
            }
            match input.parse::<u32>() {
                Ok(value) => return Ok(Some(value)),
                Err(_) => self.say(&format!("'{}' is not a cell number", input)).await?,
            }
        }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

/// 人类落子来源：范围与占用由协议校验，不合法时会再次询问
#[async_trait]
impl<R, W> MoveSource for Console<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn propose(&mut self, state: &GameState) -> protocol::Result<Option<u32>> {
        Ok(self.ask_move(state).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{BaudRate, GameMode, Marker};

    fn console(input: &'static str) -> Console<&'static [u8], Vec<u8>> {
        Console::new(input.as_bytes(), Vec::new())
    }

    fn output(console: Console<&'static [u8], Vec<u8>>) -> String {
        String::from_utf8(console.into_inner().1).unwrap()
    }

    #[tokio::test]
    async fn test_choose_by_number_and_default() {
        let mut c = console("3\n\n");
        let mode = c.choose("Game type", GameMode::all(), GameMode::ManVsMan).await.unwrap();
        assert_eq!(mode, Some(GameMode::AiVsMan));

        let baud = c.choose("Speed", BaudRate::all(), BaudRate::B19200).await.unwrap();
        assert_eq!(baud, Some(BaudRate::B19200));

        let text = output(c);
        assert!(text.contains("3. AI vs Man"));
        assert!(text.contains("19200 bps (default)"));
    }

    #[tokio::test]
    async fn test_choose_reprompts_on_bad_input() {
        let mut c = console("0\nabc\n2\n");
        let mode = c.choose("Game type", GameMode::all(), GameMode::ManVsMan).await.unwrap();
        assert_eq!(mode, Some(GameMode::ManVsAi));
        assert_eq!(output(c).matches("between 1 and 4").count(), 2);
    }

    #[tokio::test]
    async fn test_choose_eof() {
        let mut c = console("");
        let mode = c.choose("Game type", GameMode::all(), GameMode::ManVsMan).await.unwrap();
        assert_eq!(mode, None);
    }

    #[tokio::test]
    async fn test_ask_text() {
        let mut c = console("\n/dev/ttyS1\n");
        assert_eq!(c.ask_text("Port", "COM1").await.unwrap().as_deref(), Some("COM1"));
        assert_eq!(c.ask_text("Port", "COM1").await.unwrap().as_deref(), Some("/dev/ttyS1"));
        assert_eq!(c.ask_text("Port", "COM1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_propose_moves() {
        let state = GameState::new(Marker::O, GameMode::ManVsMan);
        let mut c = console("five\n 12 \n7\nQ\n");

        // 超出范围的编号交给协议校验
        assert_eq!(c.propose(&state).await.unwrap(), Some(12));
        assert_eq!(c.propose(&state).await.unwrap(), Some(7));
        assert_eq!(c.propose(&state).await.unwrap(), None);
        assert_eq!(c.propose(&state).await.unwrap(), None);

        let text = output(c);
        assert!(text.contains("Player O, enter cell"));
        assert!(text.contains("'five' is not a cell number"));
    }
}
