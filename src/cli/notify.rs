// src/cli/notify.rs
//! 通知命令 - 从 JSON 构建快照触发 started / completed / message 事件

use crate::config::{FactDefinition, NotifierConfig};
use crate::host::{BuildSnapshot, StaticHost};
use crate::notification::{
    DeliveryPool, DeliveryReport, DeliveryWorker, NotificationOrchestrator, StepParameters,
};
use anyhow::{Context, Result};
use clap::Args;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::warn;

/// 构建事件的公共参数
#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// 构建快照 JSON 文件
    #[arg(long, short)]
    pub build: PathBuf,

    /// 配置文件（默认 ~/.config/o365-build-notifier/config.json）
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// 只打印文档，不发送
    #[arg(long)]
    pub dry_run: bool,

    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

/// message 命令参数
#[derive(Args, Debug, Clone)]
pub struct MessageArgs {
    #[command(flatten)]
    pub common: BuildArgs,

    /// 消息正文
    #[arg(long, short)]
    pub text: String,

    /// 状态（显示为 Status fact）
    #[arg(long)]
    pub status: Option<String>,

    /// 主题色，例如 #FF0000
    #[arg(long)]
    pub color: Option<String>,

    /// 只发送到该 URL
    #[arg(long)]
    pub webhook_url: Option<String>,

    /// 自定义 fact，格式 NAME=TEMPLATE
    #[arg(long = "fact")]
    pub facts: Vec<String>,

    /// 使用 AdaptiveCard 格式
    #[arg(long)]
    pub adaptive: bool,
}

/// 处理 started 命令
pub async fn handle_started(args: BuildArgs) -> Result<()> {
    let (orchestrator, build) = prepare(&args)?;
    let handles = orchestrator.on_build_started(&build);
    finish(handles, args.json).await
}

/// 处理 completed 命令
pub async fn handle_completed(args: BuildArgs) -> Result<()> {
    let (orchestrator, build) = prepare(&args)?;
    let handles = orchestrator.on_build_completed(&build);
    finish(handles, args.json).await
}

/// 处理 message 命令
pub async fn handle_message(args: MessageArgs) -> Result<()> {
    let (orchestrator, build) = prepare(&args.common)?;
    let step = StepParameters {
        message: args.text,
        webhook_url: args.webhook_url,
        status: args.status,
        color: args.color,
        fact_definitions: parse_facts(&args.facts)?,
        adaptive_cards: args.adaptive,
    };
    let handles = orchestrator.on_pipeline_step(&build, &step);
    finish(handles, args.common.json).await
}

fn prepare(args: &BuildArgs) -> Result<(NotificationOrchestrator, BuildSnapshot)> {
    let config = NotifierConfig::load(args.config.as_deref())?;
    let build = read_build(&args.build)?;
    let orchestrator = NotificationOrchestrator::new(
        Arc::new(StaticHost::new(config)),
        DeliveryWorker::http(),
        DeliveryPool::current(),
    )
    .with_dry_run(args.dry_run);
    Ok((orchestrator, build))
}

/// 读取构建快照
pub fn read_build(path: &Path) -> Result<BuildSnapshot> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read build snapshot {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid build snapshot {}", path.display()))
}

/// 解析 NAME=TEMPLATE
pub fn parse_facts(raw: &[String]) -> Result<Vec<FactDefinition>> {
    raw.iter()
        .map(|entry| -> Result<FactDefinition> {
            let (name, template) = entry
                .split_once('=')
                .with_context(|| format!("Invalid fact '{}', expected NAME=TEMPLATE", entry))?;
            Ok(FactDefinition {
                name: name.trim().to_string(),
                template: template.to_string(),
            })
        })
        .collect()
}

/// 等待所有投递完成（CLI 进程退出前）
async fn finish(handles: Vec<JoinHandle<DeliveryReport>>, json: bool) -> Result<()> {
    let mut reports = Vec::new();
    for handle in handles {
        match handle.await {
            Ok(report) => reports.push(report),
            Err(e) => warn!(error = %e, "Delivery task panicked"),
        }
    }
    super::output::print_reports(&reports, json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_facts() {
        let facts = parse_facts(&["Branch=${BRANCH_NAME}".to_string(), "Url=a=b".to_string()]).unwrap();
        assert_eq!(facts[0].name, "Branch");
        assert_eq!(facts[0].template, "${BRANCH_NAME}");
        assert_eq!(facts[1].template, "a=b");
    }

    #[test]
    fn test_parse_facts_rejects_missing_separator() {
        assert!(parse_facts(&["Branch".to_string()]).is_err());
    }

    #[test]
    fn test_read_build() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"jobName": "app", "number": 3, "result": "UNSTABLE"}}"#).unwrap();
        let build = read_build(file.path()).unwrap();
        assert_eq!(build.job_name, "app");
        assert_eq!(build.run_name(), "#3");
    }

    #[test]
    fn test_read_build_missing_file() {
        let err = read_build(Path::new("/nonexistent/build.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read build snapshot"));
    }
}
