//! 状态文档存储
//!
//! 当前对局写入 `game_state.xml`，结束的对局另存为带时间戳的存档

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use protocol::{GameMode, GameState, Marker, StateCodec, STATE_FILE_NAME};

/// 存档目录名
const ARCHIVE_DIR: &str = "archive";

/// 状态存储
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// 在应用数据目录下创建
    pub fn new() -> Result<Self> {
        Self::with_dir(get_data_directory()?)
    }

    /// 在指定目录下创建
    pub fn with_dir(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let archive = dir.join(ARCHIVE_DIR);
        if !archive.exists() {
            fs::create_dir_all(&archive)
                .with_context(|| format!("无法创建存储目录: {:?}", archive))?;
        }
        Ok(Self { dir })
    }

    /// 当前状态文件路径
    pub fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE_NAME)
    }

    /// 写入当前状态文档（原样保存）
    pub fn save_current(&self, document: &str) -> Result<PathBuf> {
        let path = self.state_path();
        fs::write(&path, document).with_context(|| format!("写入文件失败: {:?}", path))?;
        Ok(path)
    }

    /// 读取当前状态，文件不存在时返回 `None`
    pub fn load_current(&self, defaults: &GameState) -> Result<Option<GameState>> {
        let path = self.state_path();
        if !path.exists() {
            return Ok(None);
        }
        let content =
            fs::read_to_string(&path).with_context(|| format!("读取文件失败: {:?}", path))?;
        Ok(Some(StateCodec::decode_state(&content, defaults)))
    }

    /// 读取可继续的对局：文件不存在或对局已结束时返回 `None`
    pub fn load_unfinished(&self, defaults: &GameState) -> Result<Option<GameState>> {
        match self.load_current(defaults)? {
            Some(state) if state.status.is_terminal() => {
                tracing::info!("上次的对局已结束 ({})，不再继续", state.status);
                Ok(None)
            }
            loaded => Ok(loaded),
        }
    }

    /// 存档一局，返回存档名（不含路径）
    pub fn archive(&self, state: &GameState) -> Result<String> {
        let base = generate_stem(&Utc::now(), state.mode);
        let mut name = format!("{}.xml", base);
        let mut suffix = 1;
        while self.archive_dir().join(&name).exists() {
            name = format!("{}_{}.xml", base, suffix);
            suffix += 1;
        }

        let path = self.archive_dir().join(&name);
        fs::write(&path, StateCodec::encode(state))
            .with_context(|| format!("写入文件失败: {:?}", path))?;
        tracing::info!("对局已存档: {}", name);
        Ok(name)
    }

    /// 读取一份存档
    pub fn load_archive(&self, name: &str) -> Result<GameState> {
        let path = self.archive_dir().join(name);
        if !path.exists() {
            anyhow::bail!("存档不存在: {}", name);
        }
        let content =
            fs::read_to_string(&path).with_context(|| format!("读取文件失败: {:?}", path))?;
        let report = StateCodec::decode(&content, &GameState::new(Marker::X, GameMode::default()));
        if !report.has_root() {
            anyhow::bail!("存档格式无效: {}", name);
        }
        Ok(report.state)
    }

    /// 列出所有存档（最新的在前）
    pub fn list_archives(&self) -> Result<Vec<ArchiveInfo>> {
        let mut archives = Vec::new();
        let dir = self.archive_dir();
        if !dir.exists() {
            return Ok(archives);
        }

        let entries =
            fs::read_dir(&dir).with_context(|| format!("读取存储目录失败: {:?}", dir))?;
        for entry in entries {
            let entry = entry.context("读取目录项失败")?;
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("xml") {
                continue;
            }
            let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
                continue;
            };

            // 跳过损坏的文件
            let Ok(state) = self.load_archive(name) else {
                continue;
            };
            let saved_at = parse_timestamp(name).unwrap_or_else(|| {
                entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .map(DateTime::from)
                    .unwrap_or_else(|_| Utc::now())
            });
            archives.push(ArchiveInfo {
                name: name.to_string(),
                saved_at,
                state,
            });
        }

        archives.sort_by(|a, b| b.saved_at.cmp(&a.saved_at).then_with(|| b.name.cmp(&a.name)));
        Ok(archives)
    }

    /// 存储目录
    pub fn directory(&self) -> &Path {
        &self.dir
    }

    fn archive_dir(&self) -> PathBuf {
        self.dir.join(ARCHIVE_DIR)
    }
}

/// 存档信息
#[derive(Debug, Clone)]
pub struct ArchiveInfo {
    /// 存档名（文件名）
    pub name: String,
    pub saved_at: DateTime<Utc>,
    /// 终局状态
    pub state: GameState,
}

/// 获取跨平台数据目录
fn get_data_directory() -> Result<PathBuf> {
    let app_data_dir = dirs::data_dir().context("无法获取应用数据目录")?;
    Ok(app_data_dir.join("tictactoe-serial"))
}

/// 生成存档名主体：`YYYYmmdd_HHMMSS_<模式>`
fn generate_stem(timestamp: &DateTime<Utc>, mode: GameMode) -> String {
    format!("{}_{}", timestamp.format("%Y%m%d_%H%M%S"), sanitize_filename(mode.label()))
}

/// 从存档名解析时间戳
fn parse_timestamp(name: &str) -> Option<DateTime<Utc>> {
    let stamp = name.get(..15)?;
    NaiveDateTime::parse_from_str(stamp, "%Y%m%d_%H%M%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// 清理文件名中的特殊字符
fn sanitize_filename(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c => c,
        })
        .collect()
}
