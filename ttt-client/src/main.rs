use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use protocol::{
    BaudRate, Connector, GameMode, GameState, Marker, MoveSource, SerialConnector, Session,
    SessionConfig, SessionOutcome, TcpConnector, TransportKind, DEFAULT_SERIAL_PORT,
    DEFAULT_TCP_ADDRESS,
};
use ttt_ai::{AiConfig, AiEngine, Difficulty};
use ttt_client::display::{first_mover, is_local, render_board, render_state};
use ttt_client::{ClientSettings, Console, ConsoleObserver, FirstPlayer, StateStore};

/// 串口井字棋客户端
#[derive(Parser, Debug)]
#[command(name = "ttt-client")]
#[command(about = "Play tic-tac-toe against a peer over a serial link", long_about = None)]
#[command(version)]
struct Args {
    /// Link type: serial or tcp
    #[arg(long)]
    transport: Option<TransportKind>,

    /// Serial device (COM3, /dev/ttyUSB0) or host:port
    #[arg(long)]
    port: Option<String>,

    /// Line speed in bits per second
    #[arg(long)]
    baud: Option<u32>,

    /// First player: x, o or random
    #[arg(long)]
    first: Option<FirstPlayer>,

    /// Game type: "Man vs Man", "Man vs AI", "AI vs Man" or "AI vs AI"
    #[arg(long)]
    mode: Option<GameMode>,

    /// Let the local AI play the local side
    #[arg(long)]
    autoplay: bool,

    /// Local AI strength when autoplaying
    #[arg(long)]
    difficulty: Option<Difficulty>,

    /// Seconds to wait for each reply
    #[arg(long)]
    timeout: Option<u64>,

    /// Do not write game_state.xml or archives
    #[arg(long)]
    no_save: bool,

    /// List archived games and exit
    #[arg(long)]
    list: bool,

    /// Continue the unfinished game saved in game_state.xml
    #[arg(long)]
    resume: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // 初始化日志（输出到 stderr，避免与棋盘混在一起）
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "ttt_client=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let mut settings = ClientSettings::load();

    if args.list {
        return list_archives(settings.color);
    }

    let mut console = Console::stdio();
    if !configure(&args, &mut settings, &mut console).await? {
        info!("未完成设置，退出");
        return Ok(());
    }
    if let Err(e) = settings.save() {
        tracing::warn!("设置保存失败: {:#}", e);
    }

    let first = settings.first_player.resolve(&mut rand::thread_rng());
    let config = SessionConfig::from(&settings.link);
    let saved = if args.resume {
        resume_point(&GameState::new(first, settings.mode), settings.color, &mut console).await?
    } else {
        None
    };

    let store = if settings.save_state {
        match StateStore::new() {
            Ok(store) => Some(store),
            Err(e) => {
                tracing::warn!("无法打开存储目录，不保存状态: {:#}", e);
                None
            }
        }
    } else {
        None
    };
    let mut observer = ConsoleObserver::new(settings.color, store);

    let opening = saved.unwrap_or_else(|| GameState::new(first, settings.mode));
    announce(&settings, &opening, &mut console).await?;

    let outcome = if settings.autoplay {
        let mut engine = AiEngine::new(AiConfig::from_difficulty(settings.difficulty));
        play(&settings, config, first, saved, &mut engine, &mut observer).await?
    } else {
        play(&settings, config, first, saved, &mut console, &mut observer).await?
    };

    match outcome {
        SessionOutcome::Finished(status) => info!("对局结束: {}", status),
        SessionOutcome::Abandoned => {
            console.say("Game abandoned.").await?;
        }
    }
    Ok(())
}

/// 读取上次保存的未完成对局，没有可继续的对局时开始新对局
async fn resume_point<R, W>(
    defaults: &GameState,
    color: bool,
    console: &mut Console<R, W>,
) -> Result<Option<GameState>>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let store = StateStore::new()?;
    match store.load_unfinished(defaults)? {
        Some(state) => {
            console
                .say(&format!("Resuming saved game ({}, {}):", state.mode, state.status))
                .await?;
            console.say(&render_board(&state.board, color)).await?;
            Ok(Some(state))
        }
        None => {
            console.say("No unfinished game to resume, starting a new one.").await?;
            Ok(None)
        }
    }
}

/// 按链路类型选择连接器并运行会话
async fn play<S>(
    settings: &ClientSettings,
    config: SessionConfig,
    first: Marker,
    saved: Option<GameState>,
    local: &mut S,
    observer: &mut ConsoleObserver,
) -> Result<SessionOutcome>
where
    S: MoveSource + ?Sized,
{
    match settings.link.transport {
        TransportKind::Serial => {
            let session = open_session(SerialConnector, config, first, settings.mode, saved);
            run_session(session, local, observer).await
        }
        TransportKind::Tcp => {
            let session = open_session(TcpConnector, config, first, settings.mode, saved);
            run_session(session, local, observer).await
        }
    }
}

fn open_session<C: Connector>(
    connector: C,
    config: SessionConfig,
    first: Marker,
    mode: GameMode,
    saved: Option<GameState>,
) -> Session<C> {
    match saved {
        Some(state) => Session::resume(connector, config, state),
        None => Session::new(connector, config, first, mode),
    }
}

async fn run_session<C, S>(
    mut session: Session<C>,
    local: &mut S,
    observer: &mut ConsoleObserver,
) -> Result<SessionOutcome>
where
    C: Connector,
    S: MoveSource + ?Sized,
{
    let address = session.config().address.clone();
    session
        .run(local, observer)
        .await
        .with_context(|| format!("与 {} 的通信失败", address))
}

/// 用命令行参数填充设置，缺少的项目逐一询问；输入结束时返回 `false`
async fn configure<R, W>(args: &Args, settings: &mut ClientSettings, console: &mut Console<R, W>) -> Result<bool>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    if let Some(transport) = args.transport {
        if transport != settings.link.transport {
            settings.link.address = match transport {
                TransportKind::Serial => DEFAULT_SERIAL_PORT.to_string(),
                TransportKind::Tcp => DEFAULT_TCP_ADDRESS.to_string(),
            };
        }
        settings.link.transport = transport;
    }

    settings.link.address = match &args.port {
        Some(port) => port.clone(),
        None => match console.ask_text("Port", &settings.link.address).await? {
            Some(port) => port,
            None => return Ok(false),
        },
    };

    settings.link.baud_rate = match args.baud {
        Some(baud) => BaudRate::try_from(baud)?,
        None => match console.choose("Speed", BaudRate::all(), settings.link.baud_rate).await? {
            Some(rate) => rate,
            None => return Ok(false),
        },
    };

    settings.first_player = match args.first {
        Some(first) => first,
        None => match console.choose("First player", FirstPlayer::all(), settings.first_player).await? {
            Some(first) => first,
            None => return Ok(false),
        },
    };

    settings.mode = match args.mode {
        Some(mode) => mode,
        None => match console.choose("Game type", GameMode::all(), settings.mode).await? {
            Some(mode) => mode,
            None => return Ok(false),
        },
    };

    if args.autoplay {
        settings.autoplay = true;
    }
    if let Some(difficulty) = args.difficulty {
        settings.difficulty = difficulty;
    }
    if let Some(timeout) = args.timeout {
        settings.link.receive_timeout_secs = timeout;
    }
    if args.no_save {
        settings.save_state = false;
    }
    Ok(true)
}

async fn announce<R, W>(
    settings: &ClientSettings,
    opening: &GameState,
    console: &mut Console<R, W>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let first = first_mover(opening);
    let local: Vec<String> = [Marker::X, Marker::O]
        .into_iter()
        .filter(|marker| is_local(opening.mode, first, *marker))
        .map(|marker| marker.to_string())
        .collect();
    let sides = if local.is_empty() {
        "none (relaying)".to_string()
    } else {
        local.join(" and ")
    };

    console
        .say(&format!(
            "{} on {} at {}, {} moves first. Local side: {}{}",
            opening.mode,
            settings.link.address,
            settings.link.baud_rate,
            first,
            sides,
            if settings.autoplay { " (autoplay)" } else { "" }
        ))
        .await?;
    info!(
        "会话参数: {:?}，等待回复上限 {:?}",
        settings.link,
        Duration::from_secs(settings.link.receive_timeout_secs)
    );
    Ok(())
}

fn list_archives(color: bool) -> Result<()> {
    let store = StateStore::new()?;
    let archives = store.list_archives()?;
    if archives.is_empty() {
        println!("No archived games in {:?}", store.directory());
        return Ok(());
    }
    for archive in archives {
        println!("{} ({})", archive.name, archive.saved_at.format("%Y-%m-%d %H:%M:%S"));
        println!("{}", render_state(&archive.state, color));
        println!();
    }
    Ok(())
}
