//! 通知分发器 - 宿主事件入口，筛选 webhook 并分发投递任务
//!
//! 流程：宿主事件 -> 决策（每个 webhook）-> 构建卡片 -> 每个命中的 webhook 一个投递任务

use super::builder::{CardBuilder, CardProfile, StepParameters};
use super::card::NotificationDocument;
use super::decision::DecisionMaker;
use super::proxy::resolve_proxy;
use super::webhook::{DeliveryReport, DeliveryRequest, DeliveryWorker};
use super::LOG_PREFIX;
use crate::config::Webhook;
use crate::host::{BuildSnapshot, Host};
use anyhow::Result;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

static GLOBAL_RUNTIME: OnceLock<Runtime> = OnceLock::new();
static GLOBAL_INIT: Mutex<()> = Mutex::new(());

/// 投递任务池（所有投递共享）
#[derive(Clone, Debug)]
pub struct DeliveryPool {
    handle: Handle,
}

impl DeliveryPool {
    /// 进程级共享的任务池，首次调用时创建
    pub fn global() -> Result<Self> {
        if let Some(rt) = GLOBAL_RUNTIME.get() {
            return Ok(Self { handle: rt.handle().clone() });
        }

        let _guard = GLOBAL_INIT.lock().map_err(|_| anyhow::anyhow!("delivery pool lock poisoned"))?;
        if let Some(rt) = GLOBAL_RUNTIME.get() {
            return Ok(Self { handle: rt.handle().clone() });
        }

        let runtime = Builder::new_multi_thread()
            .thread_name("o365-delivery")
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();
        let _ = GLOBAL_RUNTIME.set(runtime);
        info!("Delivery pool started");
        Ok(Self { handle })
    }

    /// 使用已有的 tokio runtime
    pub fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }

    /// 使用当前 runtime（必须在 tokio 上下文中调用）
    pub fn current() -> Self {
        Self::from_handle(Handle::current())
    }

    fn spawn(&self, worker: DeliveryWorker, request: DeliveryRequest, host: Arc<dyn Host>) -> JoinHandle<DeliveryReport> {
        self.handle.spawn(async move {
            let report = worker.deliver(&request).await;
            if !report.delivered {
                host.console(&format!(
                    "{} Failed to notify {} after {} attempts: {}",
                    LOG_PREFIX,
                    report.url,
                    report.attempts,
                    report.last_error.as_deref().unwrap_or("unknown error")
                ));
            }
            report
        })
    }
}

/// 宿主事件入口
pub struct NotificationOrchestrator {
    host: Arc<dyn Host>,
    worker: DeliveryWorker,
    pool: DeliveryPool,
    dry_run: bool,
}

impl NotificationOrchestrator {
    pub fn new(host: Arc<dyn Host>, worker: DeliveryWorker, pool: DeliveryPool) -> Self {
        Self {
            host,
            worker,
            pool,
            dry_run: false,
        }
    }

    /// 设置 dry-run 模式（只打印文档，不发送）
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// 构建开始：只检查 webhook 的开始通知开关
    pub fn on_build_started(&self, build: &BuildSnapshot) -> Vec<JoinHandle<DeliveryReport>> {
        let webhooks = self.host.webhooks(build);
        if webhooks.is_empty() {
            debug!(job = %build.job_name, "No webhooks configured");
            return Vec::new();
        }

        let builder = CardBuilder::new(self.host.as_ref(), build);
        let mut cards = CardCache::default();
        let mut handles = Vec::new();

        for webhook in webhooks.iter().filter(|w| w.start_notification) {
            let document = cards.get_or_build(CardProfile::from(webhook), |p| builder.create_started_card(p));
            handles.extend(self.dispatch(webhook, &document));
        }
        handles
    }

    /// 构建完成：先检查条件规则，再检查状态变化
    pub fn on_build_completed(&self, build: &BuildSnapshot) -> Vec<JoinHandle<DeliveryReport>> {
        let webhooks = self.host.webhooks(build);
        if webhooks.is_empty() {
            debug!(job = %build.job_name, "No webhooks configured");
            return Vec::new();
        }

        let decision = DecisionMaker::new(self.host.as_ref(), build);
        let builder = CardBuilder::new(self.host.as_ref(), build);
        let mut cards = CardCache::default();
        let mut handles = Vec::new();

        for webhook in &webhooks {
            match decision.is_at_least_one_rule_matched(webhook) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(webhook = %webhook.label(), "No macro rule matched");
                    continue;
                }
                Err(e) => {
                    error!(webhook = %webhook.label(), error = %e, "Failed to evaluate macro rules");
                    self.console(&format!("Failed to evaluate macro rules for {}: {}", webhook.label(), e));
                    continue;
                }
            }
            if !decision.is_status_matched(webhook) {
                continue;
            }

            let document = cards.get_or_build(CardProfile::from(webhook), |p| builder.create_completed_card(p));
            handles.extend(self.dispatch(webhook, &document));
        }
        handles
    }

    /// Pipeline step 自定义消息：不做任何筛选
    pub fn on_pipeline_step(&self, build: &BuildSnapshot, step: &StepParameters) -> Vec<JoinHandle<DeliveryReport>> {
        let webhooks = match step.webhook_url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => vec![Webhook::new(url.trim())],
            None => self.host.webhooks(build),
        };
        if webhooks.is_empty() {
            debug!(job = %build.job_name, "No webhooks configured");
            return Vec::new();
        }

        let document = CardBuilder::new(self.host.as_ref(), build).create_message_card(step);
        webhooks
            .iter()
            .filter_map(|webhook| self.dispatch(webhook, &document))
            .collect()
    }

    fn dispatch(&self, webhook: &Webhook, document: &NotificationDocument) -> Option<JoinHandle<DeliveryReport>> {
        let Some(url) = self.resolve_url(webhook) else {
            warn!(webhook = %webhook.label(), "Webhook has no URL, skipping");
            self.console(&format!("Webhook {} has no URL, skipping", webhook.label()));
            return None;
        };

        let body = match document.to_json() {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "Failed to serialize notification");
                self.console(&format!("Failed to serialize notification: {}", e));
                return None;
            }
        };

        if self.dry_run {
            eprintln!("[DRY-RUN] Would send to {}:\n{}", url, body);
            return None;
        }

        // webhook 自身的代理 > 插件代理 > 宿主代理
        let plugin_proxy = self.host.plugin_proxy();
        let host_proxy = self.host.proxy_configuration();
        let webhook_proxy = webhook.proxy.as_ref().filter(|p| p.is_configured());
        let request = DeliveryRequest {
            proxy: resolve_proxy(webhook_proxy.or(plugin_proxy.as_ref()), host_proxy.as_ref(), &url),
            url,
            body,
            timeout: Duration::from_millis(webhook.timeout),
        };
        self.console(&format!("Notifying webhook {}", webhook.label()));
        Some(self.pool.spawn(self.worker.clone(), request, self.host.clone()))
    }

    /// 凭据中的 URL 优先
    fn resolve_url(&self, webhook: &Webhook) -> Option<String> {
        let from_credentials = webhook
            .url_credentials_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .and_then(|id| self.host.credential_secret(id));
        from_credentials
            .or_else(|| Some(webhook.url.clone()))
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
    }

    fn console(&self, message: &str) {
        self.host.console(&format!("{} {}", LOG_PREFIX, message));
    }
}

/// 每种卡片配置只构建一次
#[derive(Default)]
struct CardCache {
    cards: Vec<(CardProfile, NotificationDocument)>,
}

impl CardCache {
    fn get_or_build(
        &mut self,
        profile: CardProfile,
        build: impl FnOnce(&CardProfile) -> NotificationDocument,
    ) -> NotificationDocument {
        if let Some((_, document)) = self.cards.iter().find(|(p, _)| *p == profile) {
            return document.clone();
        }
        let document = build(&profile);
        self.cards.push((profile, document.clone()));
        document
    }
}
