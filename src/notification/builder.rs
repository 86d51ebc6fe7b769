//! 卡片构建器 - 根据构建状态生成通知文档
//!
//! 状态计算规则（按顺序匹配）：
//! - SUCCESS 且上一次为 FAILURE/UNSTABLE -> "Back to Normal"
//! - SUCCESS -> "Build Success"
//! - FAILURE 且为连续失败 -> "Repeated Failure"
//! - FAILURE -> "Build Failed"
//! - ABORTED -> "Build Aborted"
//! - UNSTABLE -> "Build Unstable"
//! - 其他 -> 原始结果名称

use super::actions::ActionBuilder;
use super::card::{CardFormat, NotificationDocument, Section};
use super::facts::FactCollector;
use crate::config::{FactDefinition, Webhook};
use crate::host::{BuildResult, BuildSnapshot, Host};
use chrono::Utc;
use regex::Regex;
use std::sync::LazyLock;

/// 成功构建的主题色
pub const SUCCESS_COLOR: &str = "#00FF00";

pub const STATUS_STARTED: &str = "Started";

static MARKDOWN_SPECIAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([*_#-])").expect("Invalid markdown regex"));

/// 影响卡片内容的 webhook 配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardProfile {
    pub format: CardFormat,
    pub mention_on_failure: bool,
    pub fact_definitions: Vec<FactDefinition>,
}

impl From<&Webhook> for CardProfile {
    fn from(webhook: &Webhook) -> Self {
        Self {
            format: CardFormat::from_flag(webhook.adaptive_cards),
            mention_on_failure: webhook.mention_on_failure,
            fact_definitions: webhook.fact_definitions.clone(),
        }
    }
}

/// Pipeline step 发送的自定义消息
#[derive(Debug, Clone, Default)]
pub struct StepParameters {
    pub message: String,
    /// 设置后只通知该 URL
    pub webhook_url: Option<String>,
    pub status: Option<String>,
    pub color: Option<String>,
    pub fact_definitions: Vec<FactDefinition>,
    pub adaptive_cards: bool,
}

/// 卡片构建器
pub struct CardBuilder<'a> {
    host: &'a dyn Host,
    build: &'a BuildSnapshot,
    now: i64,
}

impl<'a> CardBuilder<'a> {
    pub fn new(host: &'a dyn Host, build: &'a BuildSnapshot) -> Self {
        Self {
            host,
            build,
            now: Utc::now().timestamp_millis(),
        }
    }

    /// 固定当前时间（用于测试）
    pub fn with_now(mut self, now: i64) -> Self {
        self.now = now;
        self
    }

    /// 构建开始通知
    pub fn create_started_card(&self, profile: &CardProfile) -> NotificationDocument {
        let mut facts = FactCollector::new();
        facts.add_status(STATUS_STARTED);
        facts.add_remarks(self.build);
        facts.add_culprits(self.build);
        facts.add_developers(self.build);
        facts.add_user_facts(self.host, self.build, &profile.fact_definitions);

        let actions = self.actions(&mut facts);
        let section = self.section(Some(self.latest_status_subtitle()), facts);
        let mut document = NotificationDocument::new(profile.format, self.summary(None), section, None);
        document.set_actions(actions);
        document
    }

    /// 构建完成通知
    pub fn create_completed_card(&self, profile: &CardProfile) -> NotificationDocument {
        let last = self.build.completed_result();
        let previous = self.build.previous_result();
        let failing_since = self.build.failing_since.as_ref();
        let repeated = is_repeated_failure(last, Some(previous), failing_since.is_some());

        let mut facts = FactCollector::new();
        if last == BuildResult::Failure && previous == BuildResult::Failure {
            if let Some(since) = failing_since {
                facts.add_failing_since_build(since.number);
            }
        }

        facts.add_status(calculate_status(last, Some(previous), repeated));
        if is_back_to_normal(last, Some(previous)) {
            if let Some(since) = failing_since {
                facts.add_back_to_normal_time(self.build, since.start_time, self.now);
            }
        }
        facts.add_remarks(self.build);

        if profile.mention_on_failure && (last.is_worse_than_success() || repeated) {
            facts.add_culprits(self.build);
            facts.add_developers(self.build);
        }
        facts.add_changed_files(self.build);
        facts.add_tests(self.build);
        facts.add_user_facts(self.host, self.build, &profile.fact_definitions);

        // 成功的构建不附加链接
        let actions = if last == BuildResult::Success {
            Vec::new()
        } else {
            self.actions(&mut facts)
        };

        let summary = self.summary(Some(calculate_summary(last, Some(previous), repeated)));
        let section = self.section(Some(self.latest_status_subtitle()), facts);
        let mut document = NotificationDocument::new(profile.format, summary, section, Some(last));
        if let NotificationDocument::MessageCard(card) = &mut document {
            card.theme_color = if last == BuildResult::Success {
                SUCCESS_COLOR.to_string()
            } else {
                self.host.result_colors().color(last).to_string()
            };
        }
        document.set_actions(actions);
        document
    }

    /// Pipeline step 自定义消息
    pub fn create_message_card(&self, step: &StepParameters) -> NotificationDocument {
        let mut facts = FactCollector::new();
        if let Some(status) = &step.status {
            facts.add_status(status.clone());
        }
        facts.add_user_facts(self.host, self.build, &step.fact_definitions);

        let actions = self.actions(&mut facts);
        let message = Some(step.message.clone()).filter(|m| !m.trim().is_empty());
        let section = self.section(message, facts);
        let format = CardFormat::from_flag(step.adaptive_cards);
        let mut document = NotificationDocument::new(format, self.summary(None), section, None);
        if let (NotificationDocument::MessageCard(card), Some(color)) = (&mut document, &step.color) {
            if !color.trim().is_empty() {
                card.theme_color = color.clone();
            }
        }
        document.set_actions(actions);
        document
    }

    /// 转义 job 显示名称中的 markdown 特殊字符
    pub fn escaped_display_name(&self) -> String {
        escape_markdown(&self.build.job_name)
    }

    fn actions(&self, facts: &mut FactCollector) -> Vec<super::card::Action> {
        ActionBuilder::new(self.build, self.host.run_url(self.build)).build_actionable(facts)
    }

    fn section(&self, subtitle: Option<String>, facts: FactCollector) -> Section {
        Section::new(
            format!("Notification from {}", self.escaped_display_name()),
            subtitle,
            facts.collect(),
        )
    }

    fn latest_status_subtitle(&self) -> String {
        format!("Latest status of build {}", self.build.run_name())
    }

    fn summary(&self, status: Option<&str>) -> String {
        let base = format!("{}: Build {}", self.build.job_name, self.build.run_name());
        match status {
            Some(s) => format!("{} {}", base, s),
            None => base,
        }
    }
}

/// 本次失败且上一次也失败，并且能确定开始失败的构建
pub fn is_repeated_failure(last: BuildResult, previous: Option<BuildResult>, failing_since_known: bool) -> bool {
    last == BuildResult::Failure && failing_since_known && previous == Some(BuildResult::Failure)
}

fn is_back_to_normal(last: BuildResult, previous: Option<BuildResult>) -> bool {
    last == BuildResult::Success && previous.is_some_and(|p| p.is_worse_than_success())
}

/// 状态长文本（用于 Status fact）
pub fn calculate_status(last: BuildResult, previous: Option<BuildResult>, repeated_failure: bool) -> &'static str {
    match last {
        BuildResult::Success if is_back_to_normal(last, previous) => "Back to Normal",
        BuildResult::Success => "Build Success",
        BuildResult::Failure if repeated_failure => "Repeated Failure",
        BuildResult::Failure => "Build Failed",
        BuildResult::Aborted => "Build Aborted",
        BuildResult::Unstable => "Build Unstable",
        other => other.as_str(),
    }
}

/// 状态短文本（用于 summary）
pub fn calculate_summary(last: BuildResult, previous: Option<BuildResult>, repeated_failure: bool) -> &'static str {
    match last {
        BuildResult::Success if is_back_to_normal(last, previous) => "Back to Normal",
        BuildResult::Success => "Success",
        BuildResult::Failure if repeated_failure => "Repeated Failure",
        BuildResult::Failure => "Failed",
        BuildResult::Aborted => "Aborted",
        BuildResult::Unstable => "Unstable",
        other => other.as_str(),
    }
}

/// 对 `* _ # -` 加反斜杠
pub fn escape_markdown(text: &str) -> String {
    MARKDOWN_SPECIAL.replace_all(text, r"\$1").into_owned()
}
