//! 通知决策 - 判断某个 webhook 是否需要接收本次构建完成通知
//!
//! 构建完成需要依次通过两道检查：
//! 1. 条件规则：至少一条 `{template, value}` 规则展开后等于期望值（没有规则时直接通过）
//! 2. 状态变化：webhook 启用的触发条件之一与本次结果匹配

use crate::config::Webhook;
use crate::host::{BuildResult, BuildSnapshot, Host};
use crate::template::TemplateError;
use tracing::debug;

pub struct DecisionMaker<'a> {
    host: &'a dyn Host,
    build: &'a BuildSnapshot,
}

impl<'a> DecisionMaker<'a> {
    pub fn new(host: &'a dyn Host, build: &'a BuildSnapshot) -> Self {
        Self { host, build }
    }

    /// 模板展开失败时返回错误，不视为未命中
    pub fn is_at_least_one_rule_matched(&self, webhook: &Webhook) -> Result<bool, TemplateError> {
        if webhook.macros.is_empty() {
            return Ok(true);
        }
        for rule in &webhook.macros {
            let evaluated = self.host.expand(&rule.template, self.build)?;
            if evaluated == rule.value {
                debug!(webhook = %webhook.label(), template = %rule.template, "Macro rule matched");
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn is_status_matched(&self, webhook: &Webhook) -> bool {
        status_matches(webhook, self.build.completed_result(), self.build.previous_result())
    }
}

/// FAILURE/UNSTABLE 之后的 SUCCESS 只匹配恢复正常（back to normal）
pub fn status_matches(webhook: &Webhook, result: BuildResult, previous: BuildResult) -> bool {
    match result {
        BuildResult::Aborted => webhook.notify_aborted,
        BuildResult::Failure if previous == BuildResult::Failure => webhook.notify_repeated_failure,
        BuildResult::Failure => webhook.notify_failure,
        BuildResult::NotBuilt => webhook.notify_not_built,
        BuildResult::Success if previous.is_worse_than_success() => webhook.notify_back_to_normal,
        BuildResult::Success => webhook.notify_success,
        BuildResult::Unstable => webhook.notify_unstable,
    }
}
