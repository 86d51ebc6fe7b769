//! 通知配置 - webhook 列表、代理与颜色表
//!
//! 配置读取优先级：
//! 1. 命令行 `--config` 指定的文件
//! 2. `~/.config/o365-build-notifier/config.json`
//! 3. 空配置
//!
//! 环境变量 `O365_WEBHOOK_URL` 会追加一个启用全部触发条件的 webhook。

use crate::host::ResultColors;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 默认超时（毫秒）
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// 配置文件相对 home 的路径
pub const CONFIG_RELATIVE_PATH: &str = ".config/o365-build-notifier/config.json";

/// 追加 webhook 的环境变量
pub const WEBHOOK_URL_ENV: &str = "O365_WEBHOOK_URL";

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// 条件规则：模板展开结果必须等于期望值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Macro {
    pub template: String,
    pub value: String,
}

/// 用户自定义 fact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactDefinition {
    pub name: String,
    pub template: String,
}

/// 插件级代理配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Proxy {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Proxy {
    /// 主机名为空白时视为未配置
    pub fn is_configured(&self) -> bool {
        self.host.as_deref().is_some_and(|h| !h.trim().is_empty())
    }
}

/// 宿主的全局代理配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostProxy {
    pub name: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// 不走代理的主机模式，`*` 为通配符
    pub no_proxy_patterns: Vec<String>,
}

/// 单个 webhook 的配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
    #[serde(default)]
    pub url: String,
    /// 凭据 ID，设置后优先使用凭据中的 URL
    #[serde(default)]
    pub url_credentials_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub start_notification: bool,
    #[serde(default)]
    pub notify_success: bool,
    #[serde(default)]
    pub notify_aborted: bool,
    #[serde(default)]
    pub notify_not_built: bool,
    #[serde(default)]
    pub notify_unstable: bool,
    #[serde(default)]
    pub notify_failure: bool,
    #[serde(default)]
    pub notify_back_to_normal: bool,
    #[serde(default)]
    pub notify_repeated_failure: bool,
    #[serde(default)]
    pub mention_on_failure: bool,
    /// 使用 AdaptiveCard 格式
    #[serde(default)]
    pub adaptive_cards: bool,
    #[serde(default)]
    pub macros: Vec<Macro>,
    #[serde(default)]
    pub fact_definitions: Vec<FactDefinition>,
    #[serde(default)]
    pub proxy: Option<Proxy>,
}

impl Webhook {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            url_credentials_id: None,
            name: None,
            timeout: DEFAULT_TIMEOUT_MS,
            start_notification: false,
            notify_success: false,
            notify_aborted: false,
            notify_not_built: false,
            notify_unstable: false,
            notify_failure: false,
            notify_back_to_normal: false,
            notify_repeated_failure: false,
            mention_on_failure: false,
            adaptive_cards: false,
            macros: Vec::new(),
            fact_definitions: Vec::new(),
            proxy: None,
        }
    }

    /// 启用所有触发条件
    pub fn notify_all(mut self) -> Self {
        self.start_notification = true;
        self.notify_success = true;
        self.notify_aborted = true;
        self.notify_not_built = true;
        self.notify_unstable = true;
        self.notify_failure = true;
        self.notify_back_to_normal = true;
        self.notify_repeated_failure = true;
        self
    }

    /// 日志中使用的名称
    pub fn label(&self) -> &str {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.url,
        }
    }
}

/// 顶层配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotifierConfig {
    pub webhooks: Vec<Webhook>,
    /// 插件级代理，优先于宿主代理
    pub proxy: Option<Proxy>,
    pub host_proxy: Option<HostProxy>,
    pub result_colors: ResultColors,
    /// 凭据 ID -> webhook URL
    pub credentials: HashMap<String, String>,
}

impl NotifierConfig {
    /// 按优先级加载配置
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match Self::default_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };

        if let Ok(url) = std::env::var(WEBHOOK_URL_ENV) {
            if !url.trim().is_empty() {
                debug!("Using {} from environment", WEBHOOK_URL_ENV);
                config.webhooks.push(Webhook::new(url.trim()).notify_all());
            }
        }

        Ok(config)
    }

    /// 读取 JSON 配置文件
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(CONFIG_RELATIVE_PATH))
    }
}
