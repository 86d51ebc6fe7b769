//! 宿主 CI 服务器抽象 - 构建快照、构建结果与外部协作者
//!
//! 通知核心不直接依赖任何 CI 服务器。宿主在每次事件时提供一份只读的
//! `BuildSnapshot`，并通过 `Host` trait 提供模板展开、链接解析、代理配置
//! 和控制台输出等能力。

use crate::config::{HostProxy, NotifierConfig, Proxy, Webhook};
use crate::template::{EnvTemplateEngine, TemplateError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 构建结果（宿主结果的闭合子集）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildResult {
    Success,
    Failure,
    Unstable,
    Aborted,
    NotBuilt,
}

impl BuildResult {
    /// 宿主使用的原始名称
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildResult::Success => "SUCCESS",
            BuildResult::Failure => "FAILURE",
            BuildResult::Unstable => "UNSTABLE",
            BuildResult::Aborted => "ABORTED",
            BuildResult::NotBuilt => "NOT_BUILT",
        }
    }

    /// FAILURE 或 UNSTABLE
    pub fn is_worse_than_success(&self) -> bool {
        matches!(self, BuildResult::Failure | BuildResult::Unstable)
    }
}

impl std::fmt::Display for BuildResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 构建结果到显示颜色的映射（由宿主提供，这里给出默认值）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResultColors {
    pub success: String,
    pub failure: String,
    pub unstable: String,
    pub aborted: String,
    pub not_built: String,
}

impl Default for ResultColors {
    fn default() -> Self {
        Self {
            success: "#0000FF".to_string(),
            failure: "#EF2929".to_string(),
            unstable: "#FCE94F".to_string(),
            aborted: "#949393".to_string(),
            not_built: "#949393".to_string(),
        }
    }
}

impl ResultColors {
    pub fn color(&self, result: BuildResult) -> &str {
        match result {
            BuildResult::Success => &self.success,
            BuildResult::Failure => &self.failure,
            BuildResult::Unstable => &self.unstable,
            BuildResult::Aborted => &self.aborted,
            BuildResult::NotBuilt => &self.not_built,
        }
    }
}

/// 对另一次构建的引用
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildRef {
    pub number: u32,
    /// 尚未完成的构建没有结果
    pub result: Option<BuildResult>,
    /// 开始时间（epoch 毫秒）
    pub start_time: i64,
}

/// 测试结果统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestSummary {
    pub total: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl TestSummary {
    pub fn passed(&self) -> u64 {
        self.total.saturating_sub(self.failed).saturating_sub(self.skipped)
    }
}

/// 外部对象元数据（如 Pull Request 页面）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectMetadata {
    pub object_url: Option<String>,
    pub display_name: Option<String>,
}

/// 贡献者元数据
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContributorMetadata {
    pub id: Option<String>,
    pub display_name: Option<String>,
}

/// 源码管理 head 信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScmHead {
    /// 是否为 change request / pull request head
    pub change_request: bool,
    /// 例如 "Pull Request"、"Merge Request"
    pub pronoun: Option<String>,
    pub object_metadata: Option<ObjectMetadata>,
    pub contributor: Option<ContributorMetadata>,
}

/// 宿主在每次事件时提供的只读构建视图
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildSnapshot {
    /// Job 的完整显示名称
    pub job_name: String,
    pub number: u32,
    /// 构建显示名称，为空时使用 `#<number>`
    pub display_name: String,
    /// 构建永久链接
    pub url: String,
    /// 开始时间（epoch 毫秒）
    pub start_time: i64,
    /// 持续时间（毫秒），0 表示未设置或仍在运行
    pub duration: i64,
    pub result: Option<BuildResult>,
    pub previous_build: Option<BuildRef>,
    /// 最近一次未失败构建的下一次构建；没有未失败构建时为第一次构建
    pub failing_since: Option<BuildRef>,
    /// 触发原因的简短描述
    pub causes: Vec<String>,
    /// 提交者全名
    pub culprits: Vec<String>,
    /// 变更集作者全名
    pub developers: Vec<String>,
    pub changed_files: u64,
    pub test_results: Option<TestSummary>,
    pub scm_head: Option<ScmHead>,
    pub workspace: Option<String>,
    pub environment: HashMap<String, String>,
}

impl BuildSnapshot {
    /// 当前结果，缺失时按 SUCCESS 处理
    pub fn completed_result(&self) -> BuildResult {
        self.result.unwrap_or(BuildResult::Success)
    }

    /// 上一次构建的结果，没有上一次构建时按 SUCCESS 处理
    pub fn previous_result(&self) -> BuildResult {
        self.previous_build
            .as_ref()
            .and_then(|b| b.result)
            .unwrap_or(BuildResult::Success)
    }

    pub fn run_name(&self) -> String {
        if self.display_name.trim().is_empty() {
            format!("#{}", self.number)
        } else {
            self.display_name.clone()
        }
    }
}

/// 通知核心消费的宿主协作者
pub trait Host: Send + Sync {
    /// 当前 job 配置的 webhook 列表
    fn webhooks(&self, build: &BuildSnapshot) -> Vec<Webhook>;

    /// 使用宿主模板引擎展开模板
    fn expand(&self, template: &str, build: &BuildSnapshot) -> Result<String, TemplateError>;

    /// 构建的永久链接
    fn run_url(&self, build: &BuildSnapshot) -> String {
        build.url.clone()
    }

    /// 插件级代理，优先于宿主的全局代理
    fn plugin_proxy(&self) -> Option<Proxy> {
        None
    }

    /// 宿主的全局代理配置
    fn proxy_configuration(&self) -> Option<HostProxy> {
        None
    }

    /// 从凭据存储中解析密文
    fn credential_secret(&self, _id: &str) -> Option<String> {
        None
    }

    fn result_colors(&self) -> ResultColors {
        ResultColors::default()
    }

    /// 写入构建控制台输出
    fn console(&self, line: &str);
}

/// 基于本地配置文件的宿主实现（CLI 使用）
pub struct StaticHost {
    config: NotifierConfig,
    engine: EnvTemplateEngine,
}

impl StaticHost {
    pub fn new(config: NotifierConfig) -> Self {
        Self {
            config,
            engine: EnvTemplateEngine::new(),
        }
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }
}

impl Host for StaticHost {
    fn webhooks(&self, _build: &BuildSnapshot) -> Vec<Webhook> {
        self.config.webhooks.clone()
    }

    fn expand(&self, template: &str, build: &BuildSnapshot) -> Result<String, TemplateError> {
        self.engine.expand(template, build)
    }

    fn run_url(&self, build: &BuildSnapshot) -> String {
        if !build.url.is_empty() {
            return build.url.clone();
        }
        build.environment.get("BUILD_URL").cloned().unwrap_or_default()
    }

    fn plugin_proxy(&self) -> Option<Proxy> {
        self.config.proxy.clone().filter(|p| p.is_configured())
    }

    fn proxy_configuration(&self) -> Option<HostProxy> {
        self.config.host_proxy.clone()
    }

    fn credential_secret(&self, id: &str) -> Option<String> {
        self.config.credentials.get(id).cloned()
    }

    fn result_colors(&self) -> ResultColors {
        self.config.result_colors.clone()
    }

    fn console(&self, line: &str) {
        println!("{}", line);
    }
}
