//! O365 Build Notifier - 构建事件通知到 Microsoft Teams / Office 365 connector

pub mod cli;
pub mod config;
pub mod host;
pub mod notification;
pub mod template;

#[cfg(test)]
mod testing;

pub use config::{FactDefinition, HostProxy, Macro, NotifierConfig, Proxy, Webhook};
pub use host::{BuildRef, BuildResult, BuildSnapshot, Host, ResultColors, StaticHost, TestSummary};
pub use notification::{
    DeliveryPool, DeliveryReport, DeliveryWorker, NotificationDocument, NotificationOrchestrator, StepParameters,
};
pub use template::{EnvTemplateEngine, TemplateError};
