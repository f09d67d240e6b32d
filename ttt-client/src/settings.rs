//! 客户端设置
//!
//! 上一次选择的链路、先手与模式，下次启动时作为提示的默认值

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use protocol::{GameMode, LinkConfig, Marker};
use rand::Rng;
use serde::{Deserialize, Serialize};
use ttt_ai::Difficulty;

/// 先手选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FirstPlayer {
    #[default]
    X,
    O,
    /// 开局时随机决定
    Random,
}

impl FirstPlayer {
    pub fn display_name(&self) -> &'static str {
        match self {
            FirstPlayer::X => "X",
            FirstPlayer::O => "O",
            FirstPlayer::Random => "Random",
        }
    }

    /// 所有选项
    pub fn all() -> &'static [FirstPlayer] {
        &[FirstPlayer::X, FirstPlayer::O, FirstPlayer::Random]
    }

    /// 确定先手标记
    pub fn resolve<R: Rng + ?Sized>(self, rng: &mut R) -> Marker {
        match self {
            FirstPlayer::X => Marker::X,
            FirstPlayer::O => Marker::O,
            FirstPlayer::Random => {
                if rng.gen_bool(0.5) {
                    Marker::X
                } else {
                    Marker::O
                }
            }
        }
    }
}

impl fmt::Display for FirstPlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for FirstPlayer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x" => Ok(FirstPlayer::X),
            "o" => Ok(FirstPlayer::O),
            "random" | "r" => Ok(FirstPlayer::Random),
            other => Err(format!("unknown first player: {}", other)),
        }
    }
}

/// 客户端设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    // === 链路设置 ===
    pub link: LinkConfig,

    // === 对局设置 ===
    pub first_player: FirstPlayer,
    pub mode: GameMode,
    /// 本地一方由 AI 代为落子
    pub autoplay: bool,
    /// 本地 AI 难度（autoplay 时使用）
    pub difficulty: Difficulty,

    // === 显示设置 ===
    /// 彩色输出
    pub color: bool,
    /// 将每份收到的文档写入状态文件
    pub save_state: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            link: LinkConfig::default(),
            first_player: FirstPlayer::default(),
            mode: GameMode::default(),
            autoplay: false,
            difficulty: Difficulty::Medium,
            color: true,
            save_state: true,
        }
    }
}

impl ClientSettings {
    /// 获取设置文件路径
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut path| {
            path.push("tictactoe-serial");
            path.push("settings.json");
            path
        })
    }

    /// 从默认位置加载设置，失败时使用默认设置
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            tracing::warn!("无法获取配置目录，使用默认设置");
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// 从文件加载设置，失败时使用默认设置
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            tracing::info!("设置文件不存在，使用默认设置");
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(settings) => {
                    tracing::info!("已加载设置: {:?}", path);
                    settings
                }
                Err(e) => {
                    tracing::warn!("设置文件格式无效: {}，使用默认设置", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("无法读取设置文件: {}，使用默认设置", e);
                Self::default()
            }
        }
    }

    /// 保存设置到默认位置
    pub fn save(&self) -> Result<()> {
        let path = Self::settings_path().context("无法获取配置目录")?;
        self.save_to(&path)
    }

    /// 保存设置到文件
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // 确保目录存在
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("无法创建配置目录: {:?}", parent))?;
        }

        let content = serde_json::to_string_pretty(self).context("序列化设置失败")?;
        std::fs::write(path, content)
            .with_context(|| format!("写入设置文件失败: {:?}", path))?;

        tracing::info!("设置已保存: {:?}", path);
        Ok(())
    }
}
