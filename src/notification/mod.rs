//! 构建通知核心 - 决策、卡片构建与投递
//!
//! # 设计目标
//! 1. 决策独立：每个 webhook 单独判断是否需要通知
//! 2. 卡片一次构建：相同配置的 webhook 共用同一份文档
//! 3. 异步投递：每个 webhook 一个投递任务，互不影响
//! 4. 尽力而为：通知失败只记录日志，从不影响构建
//!
//! # 使用示例
//! ```ignore
//! use o365_build_notifier::notification::{DeliveryPool, DeliveryWorker, NotificationOrchestrator};
//!
//! let orchestrator = NotificationOrchestrator::new(host, DeliveryWorker::http(), DeliveryPool::global()?);
//! orchestrator.on_build_completed(&build);
//! ```

pub mod actions;
pub mod builder;
pub mod card;
pub mod decision;
pub mod dispatcher;
pub mod facts;
pub mod proxy;
pub mod time_format;
pub mod webhook;

/// 控制台日志前缀
pub const LOG_PREFIX: &str = "[Office365connector]";

pub use actions::ActionBuilder;
pub use builder::{calculate_status, calculate_summary, escape_markdown, CardBuilder, CardProfile, StepParameters};
pub use card::{Action, AdaptiveCard, CardFormat, Fact, MessageCard, NotificationDocument, Section};
pub use decision::DecisionMaker;
pub use dispatcher::{DeliveryPool, NotificationOrchestrator};
pub use facts::FactCollector;
pub use proxy::{resolve_proxy, ResolvedProxy};
pub use webhook::{DeliveryReport, DeliveryRequest, DeliveryWorker, HttpTransport, WebhookTransport, MAX_ATTEMPTS};
