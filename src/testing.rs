//! 单元测试共用的宿主实现

use crate::config::{HostProxy, Proxy, Webhook};
use crate::host::{BuildSnapshot, Host};
use crate::template::{EnvTemplateEngine, TemplateError};
use std::collections::HashMap;
use std::sync::Mutex;

/// 使用真实模板引擎、记录控制台输出的测试宿主
#[derive(Default)]
pub struct FakeHost {
    pub webhooks: Vec<Webhook>,
    pub credentials: HashMap<String, String>,
    pub plugin_proxy: Option<Proxy>,
    pub host_proxy: Option<HostProxy>,
    engine: EnvTemplateEngine,
    lines: Mutex<Vec<String>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_webhooks(webhooks: Vec<Webhook>) -> Self {
        Self { webhooks, ..Self::default() }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl Host for FakeHost {
    fn webhooks(&self, _build: &BuildSnapshot) -> Vec<Webhook> {
        self.webhooks.clone()
    }

    fn expand(&self, template: &str, build: &BuildSnapshot) -> Result<String, TemplateError> {
        self.engine.expand(template, build)
    }

    fn run_url(&self, build: &BuildSnapshot) -> String {
        format!("https://ci.example.com/job/{}/{}/", build.job_name, build.number)
    }

    fn plugin_proxy(&self) -> Option<Proxy> {
        self.plugin_proxy.clone()
    }

    fn proxy_configuration(&self) -> Option<HostProxy> {
        self.host_proxy.clone()
    }

    fn credential_secret(&self, id: &str) -> Option<String> {
        self.credentials.get(id).cloned()
    }

    fn console(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}
