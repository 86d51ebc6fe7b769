//! O365 Build Notifier CLI
//!
//! 将构建事件发送到 Microsoft Teams / Office 365 connector webhook

use anyhow::Result;
use clap::{Parser, Subcommand};
use o365_build_notifier::cli::{handle_completed, handle_message, handle_started, BuildArgs, MessageArgs};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "o365-notify")]
#[command(about = "O365 Build Notifier - 发送构建通知到 Teams webhook")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 发送构建开始通知
    Started(BuildArgs),
    /// 发送构建完成通知（按 webhook 的触发条件筛选）
    Completed(BuildArgs),
    /// 发送自定义消息
    Message(MessageArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // 通过 RUST_LOG 环境变量控制日志级别，默认为 info
    // 例如: RUST_LOG=debug o365-notify completed --build build.json
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("o365_build_notifier=info,o365_notify=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Started(args) => handle_started(args).await?,
        Commands::Completed(args) => handle_completed(args).await?,
        Commands::Message(args) => handle_message(args).await?,
    }

    Ok(())
}
