//! Fact 收集器 - 按顺序累积通知中的信息行
//!
//! 规则：
//! 1. 名称或值为空白的 fact 直接丢弃
//! 2. 数值为 0 的 fact 不显示
//! 3. Status 总是位于第一位

use super::card::Fact;
use super::time_format::{completion_time, date_to_string, duration_to_string};
use crate::config::FactDefinition;
use crate::host::{BuildSnapshot, Host};
use tracing::warn;

pub const NAME_STATUS: &str = "Status";
pub const NAME_REMARKS: &str = "Remarks";
pub const NAME_CULPRITS: &str = "Culprits";
pub const NAME_DEVELOPERS: &str = "Developers";
pub const NAME_CHANGED_FILES: &str = "Number of files changed";
pub const NAME_FAILING_SINCE_BUILD: &str = "Failing since build";
pub const NAME_START_TIME: &str = "Start time";
pub const NAME_COMPLETION_TIME: &str = "Completion time";
pub const NAME_BACK_TO_NORMAL_TIME: &str = "Back to normal time";
pub const NAME_TOTAL_TESTS: &str = "Total tests";
pub const NAME_PASSED_TESTS: &str = "Passed tests";
pub const NAME_FAILED_TESTS: &str = "Failed tests";
pub const NAME_SKIPPED_TESTS: &str = "Skipped tests";

/// 单个文档使用的 fact 收集器
#[derive(Debug, Default)]
pub struct FactCollector {
    facts: Vec<Fact>,
}

impl FactCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加 fact，名称或值为空白时忽略
    pub fn add_fact(&mut self, name: impl Into<String>, value: impl Into<String>) {
        if let Some(fact) = Fact::new(name, value) {
            self.facts.push(fact);
        }
    }

    /// 添加数值 fact，值为 0 时忽略
    pub fn add_count(&mut self, name: impl Into<String>, value: u64) {
        if value != 0 {
            self.add_fact(name, value.to_string());
        }
    }

    /// 状态总是插入到第一位
    pub fn add_status(&mut self, status: impl Into<String>) {
        if let Some(fact) = Fact::new(NAME_STATUS, status) {
            self.facts.insert(0, fact);
        }
    }

    pub fn add_start_time(&mut self, build: &BuildSnapshot) {
        self.add_fact(NAME_START_TIME, date_to_string(build.start_time));
    }

    pub fn add_completion_time(&mut self, build: &BuildSnapshot, now: i64) {
        let completed = completion_time(build.start_time, build.duration, now);
        self.add_fact(NAME_COMPLETION_TIME, date_to_string(completed));
    }

    /// 从失败开始到本次构建完成的时长
    pub fn add_back_to_normal_time(&mut self, build: &BuildSnapshot, failing_since_start: i64, now: i64) {
        let completed = completion_time(build.start_time, build.duration, now);
        self.add_fact(NAME_BACK_TO_NORMAL_TIME, duration_to_string(completed - failing_since_start));
    }

    pub fn add_failing_since_build(&mut self, number: u32) {
        self.add_fact(NAME_FAILING_SINCE_BUILD, format!("#{}", number));
    }

    /// 所有触发原因，以 ". " 连接
    pub fn add_remarks(&mut self, build: &BuildSnapshot) {
        let remarks: String = build
            .causes
            .iter()
            .filter(|c| !c.trim().is_empty())
            .map(|c| format!("{}. ", c))
            .collect();
        self.add_fact(NAME_REMARKS, remarks.trim_end());
    }

    pub fn add_culprits(&mut self, build: &BuildSnapshot) {
        self.add_fact(NAME_CULPRITS, join_names(&build.culprits));
    }

    pub fn add_developers(&mut self, build: &BuildSnapshot) {
        self.add_fact(NAME_DEVELOPERS, join_names(&build.developers));
    }

    pub fn add_changed_files(&mut self, build: &BuildSnapshot) {
        self.add_count(NAME_CHANGED_FILES, build.changed_files);
    }

    /// 测试统计；构建没有测试结果时不添加
    pub fn add_tests(&mut self, build: &BuildSnapshot) {
        let Some(tests) = build.test_results else {
            return;
        };
        self.add_count(NAME_TOTAL_TESTS, tests.total);
        self.add_count(NAME_PASSED_TESTS, tests.passed());
        self.add_count(NAME_FAILED_TESTS, tests.failed);
        self.add_count(NAME_SKIPPED_TESTS, tests.skipped);
    }

    /// 用户自定义 fact，模板展开失败或为空时丢弃
    pub fn add_user_facts(&mut self, host: &dyn Host, build: &BuildSnapshot, definitions: &[FactDefinition]) {
        for definition in definitions {
            match host.expand(&definition.template, build) {
                Ok(value) => self.add_fact(definition.name.clone(), value),
                Err(e) => {
                    warn!(fact = %definition.name, error = %e, "Failed to evaluate fact template");
                    host.console(&format!(
                        "{} Failed to evaluate fact '{}': {}",
                        super::LOG_PREFIX,
                        definition.name,
                        e
                    ));
                }
            }
        }
    }

    pub fn collect(self) -> Vec<Fact> {
        self.facts
    }
}

fn join_names(names: &[String]) -> String {
    names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}
