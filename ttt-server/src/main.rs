use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use protocol::{
    BaudRate, SerialListener, TcpListener, TransportKind, DEFAULT_BAUD_RATE, DEFAULT_SERIAL_PORT,
    DEFAULT_TCP_ADDRESS, RECEIVE_TIMEOUT_SECS,
};
use ttt_ai::{AiConfig, AiEngine, Difficulty};
use ttt_server::{Referee, Server, ServerConfig};

/// 串口井字棋裁判端
#[derive(Parser, Debug)]
#[command(name = "ttt-server")]
#[command(about = "Referee endpoint for serial-link tic-tac-toe", long_about = None)]
#[command(version)]
struct Args {
    /// Link type: serial or tcp
    #[arg(long, default_value = "serial")]
    transport: TransportKind,

    /// Serial device or host:port to listen on
    #[arg(long)]
    address: Option<String>,

    /// Line speed in bits per second
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// AI strength: easy, medium or hard
    #[arg(long, default_value = "medium")]
    difficulty: Difficulty,

    /// Seconds to wait for a document each round
    #[arg(long, default_value_t = RECEIVE_TIMEOUT_SECS)]
    timeout: u64,

    /// Keep serving after a game finishes
    #[arg(long)]
    keep_alive: bool,

    /// Fixed seed for reproducible AI play
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("ttt_server=debug".parse()?)
            .add_directive("protocol=info".parse()?))
        .init();

    let args = Args::parse();
    let baud_rate = BaudRate::try_from(args.baud)?;

    let ai_config = AiConfig::from_difficulty(args.difficulty);
    let engine = match args.seed {
        Some(seed) => AiEngine::with_seed(ai_config, seed),
        None => AiEngine::new(ai_config),
    };
    let config = ServerConfig {
        receive_timeout: Duration::from_secs(args.timeout),
        keep_alive: args.keep_alive,
    };
    let mut server = Server::new(Referee::new(Box::new(engine)), config);

    info!("井字棋裁判端启动中... (AI: {})", args.difficulty);

    let summary = match args.transport {
        TransportKind::Serial => {
            let address = args.address.unwrap_or_else(|| DEFAULT_SERIAL_PORT.to_string());
            let mut listener = SerialListener::new(address.clone(), baud_rate);
            server
                .serve(&mut listener)
                .await
                .with_context(|| format!("串口 {} 服务失败", address))?
        }
        TransportKind::Tcp => {
            let address = args.address.unwrap_or_else(|| DEFAULT_TCP_ADDRESS.to_string());
            let mut listener = TcpListener::bind(&address).await?;
            server
                .serve(&mut listener)
                .await
                .with_context(|| format!("TCP {} 服务失败", address))?
        }
    };

    info!("服务结束: {} 轮，{} 局", summary.rounds, summary.games);
    Ok(())
}
