//! 代理解析 - 插件代理优先，宿主代理遵循 no-proxy 规则

use crate::config::{HostProxy, Proxy};
use regex::Regex;
use reqwest::Url;
use tracing::debug;

/// 最终用于请求的代理
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProxy {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ResolvedProxy {
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// 只有用户名存在时才附加认证信息
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let username = self.username.as_deref().filter(|u| !u.trim().is_empty())?;
        Some((username, self.password.as_deref().unwrap_or("")))
    }
}

/// 解析目标 URL 使用的代理
pub fn resolve_proxy(plugin: Option<&Proxy>, host: Option<&HostProxy>, target_url: &str) -> Option<ResolvedProxy> {
    if let Some(proxy) = plugin.filter(|p| p.is_configured()) {
        return proxy.host.as_ref().map(|h| ResolvedProxy {
            host: h.clone(),
            port: proxy.port,
            username: proxy.username.clone(),
            password: proxy.password.clone(),
        });
    }

    let host = host.filter(|h| !h.name.trim().is_empty())?;
    let target_host = Url::parse(target_url).ok()?.host_str()?.to_string();
    if matches_no_proxy(&host.no_proxy_patterns, &target_host) {
        debug!(target = %target_host, "Target matches no-proxy pattern, connecting directly");
        return None;
    }

    Some(ResolvedProxy {
        host: host.name.clone(),
        port: host.port,
        username: host.username.clone(),
        password: host.password.clone(),
    })
}

/// 模式以空白、`,` 或 `|` 分隔，`*` 为通配符，其余按字面匹配
pub fn matches_no_proxy(patterns: &[String], target_host: &str) -> bool {
    patterns
        .iter()
        .flat_map(|p| p.split(|c: char| c.is_whitespace() || c == ',' || c == '|'))
        .filter(|p| !p.is_empty())
        .filter_map(|p| compile_pattern(p))
        .any(|re| re.is_match(target_host))
}

fn compile_pattern(pattern: &str) -> Option<Regex> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("(?i)^{}$", body)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_proxy(patterns: &[&str]) -> HostProxy {
        HostProxy {
            name: "proxy.corp".to_string(),
            port: 8080,
            username: None,
            password: None,
            no_proxy_patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_plugin_proxy_wins() {
        let plugin = Proxy {
            host: Some("plugin.proxy".to_string()),
            port: 3128,
            username: Some("user".to_string()),
            password: Some("secret".to_string()),
        };
        let resolved = resolve_proxy(Some(&plugin), Some(&host_proxy(&[])), "https://outlook.office.com/webhook/x").unwrap();
        assert_eq!(resolved.url(), "http://plugin.proxy:3128");
        assert_eq!(resolved.credentials(), Some(("user", "secret")));
    }

    #[test]
    fn test_unconfigured_plugin_proxy_falls_back_to_host() {
        let plugin = Proxy::default();
        let resolved = resolve_proxy(Some(&plugin), Some(&host_proxy(&[])), "https://outlook.office.com/x").unwrap();
        assert_eq!(resolved.host, "proxy.corp");
        assert_eq!(resolved.credentials(), None);
    }

    #[test]
    fn test_blank_plugin_host_falls_back_to_host() {
        let plugin = Proxy { host: Some(String::new()), port: 3128, ..Default::default() };
        let resolved = resolve_proxy(Some(&plugin), Some(&host_proxy(&[])), "https://outlook.office.com/x").unwrap();
        assert_eq!(resolved.host, "proxy.corp");
        assert!(resolve_proxy(Some(&plugin), None, "https://outlook.office.com/x").is_none());
    }

    #[test]
    fn test_no_proxy_pattern_skips_host_proxy() {
        let host = host_proxy(&["*.internal.corp, localhost"]);
        assert!(resolve_proxy(None, Some(&host), "https://teams.internal.corp/hook").is_none());
        assert!(resolve_proxy(None, Some(&host), "http://localhost:8080/hook").is_none());
        assert!(resolve_proxy(None, Some(&host), "https://outlook.office.com/hook").is_some());
    }

    #[test]
    fn test_no_proxy_does_not_affect_plugin_proxy() {
        let plugin = Proxy { host: Some("plugin.proxy".to_string()), port: 1, ..Default::default() };
        let host = host_proxy(&["*"]);
        assert!(resolve_proxy(Some(&plugin), Some(&host), "https://anything.example").is_some());
    }

    #[test]
    fn test_no_proxy_literal_dot() {
        let patterns = vec!["example.com".to_string()];
        assert!(matches_no_proxy(&patterns, "example.com"));
        assert!(matches_no_proxy(&patterns, "EXAMPLE.com"));
        assert!(!matches_no_proxy(&patterns, "exampleXcom"));
        assert!(!matches_no_proxy(&patterns, "api.example.com"));
    }

    #[test]
    fn test_no_proxy_separators() {
        let patterns = vec!["a.local|b.local\n*.c.local".to_string()];
        assert!(matches_no_proxy(&patterns, "b.local"));
        assert!(matches_no_proxy(&patterns, "x.c.local"));
        assert!(!matches_no_proxy(&patterns, "d.local"));
    }

    #[test]
    fn test_no_host_proxy() {
        assert!(resolve_proxy(None, None, "https://outlook.office.com").is_none());
    }
}
