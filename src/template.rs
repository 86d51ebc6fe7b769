//! 模板展开 - 用于条件规则和用户自定义 fact
//!
//! 模板引擎通常由宿主提供；`EnvTemplateEngine` 是 CLI 使用的实现，
//! 从构建环境变量和少量内置构建变量中展开 `${NAME}` 与 `$NAME`。

use crate::host::BuildSnapshot;
use regex::Regex;
use std::sync::LazyLock;

/// 模板展开失败（不会被当作规则未命中）
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("I/O error while evaluating template: {0}")]
    Io(#[from] std::io::Error),
    #[error("template evaluation interrupted")]
    Interrupted,
    #[error("macro evaluation failed: {0}")]
    Macro(String),
}

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)").expect("Invalid template token regex")
});

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").expect("Invalid template name regex"));

/// 基于构建快照展开环境变量风格的 token
#[derive(Debug, Default, Clone)]
pub struct EnvTemplateEngine;

impl EnvTemplateEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn expand(&self, template: &str, build: &BuildSnapshot) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(template.len());
        let mut last = 0;

        for caps in TOKEN_PATTERN.captures_iter(template) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&template[last..whole.start()]);
            last = whole.end();

            if let Some(braced) = caps.get(1) {
                let name = braced.as_str().trim();
                if !NAME_PATTERN.is_match(name) {
                    return Err(TemplateError::Macro(format!("malformed token '{}'", whole.as_str())));
                }
                match lookup(name, build) {
                    Some(value) => out.push_str(&value),
                    None => return Err(TemplateError::Macro(format!("unknown token '{}'", name))),
                }
            } else if let Some(bare) = caps.get(2) {
                // 未知的 $NAME 原样保留
                match lookup(bare.as_str(), build) {
                    Some(value) => out.push_str(&value),
                    None => out.push_str(whole.as_str()),
                }
            }
        }

        let rest = &template[last..];
        if rest.contains("${") {
            return Err(TemplateError::Macro("unterminated '${' token".to_string()));
        }
        out.push_str(rest);
        Ok(out)
    }
}

fn lookup(name: &str, build: &BuildSnapshot) -> Option<String> {
    if let Some(value) = build.environment.get(name) {
        return Some(value.clone());
    }
    match name {
        "BUILD_NUMBER" => Some(build.number.to_string()),
        "BUILD_RESULT" | "BUILD_STATUS" => Some(build.completed_result().as_str().to_string()),
        "JOB_NAME" => Some(build.job_name.clone()),
        "BUILD_DISPLAY_NAME" => Some(build.run_name()),
        "BUILD_URL" if !build.url.is_empty() => Some(build.url.clone()),
        "WORKSPACE" => build.workspace.clone(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::BuildResult;

    fn build() -> BuildSnapshot {
        let mut build = BuildSnapshot {
            job_name: "app".to_string(),
            number: 42,
            result: Some(BuildResult::Unstable),
            ..Default::default()
        };
        build.environment.insert("BRANCH_NAME".to_string(), "main".to_string());
        build
    }

    #[test]
    fn test_expand_braced_and_bare_tokens() {
        let engine = EnvTemplateEngine::new();
        let out = engine.expand("${BRANCH_NAME}-$BUILD_NUMBER", &build()).unwrap();
        assert_eq!(out, "main-42");
    }

    #[test]
    fn test_builtin_result() {
        let engine = EnvTemplateEngine::new();
        assert_eq!(engine.expand("${BUILD_STATUS}", &build()).unwrap(), "UNSTABLE");
    }

    #[test]
    fn test_environment_overrides_builtin() {
        let engine = EnvTemplateEngine::new();
        let mut build = build();
        build.environment.insert("JOB_NAME".to_string(), "override".to_string());
        assert_eq!(engine.expand("${JOB_NAME}", &build).unwrap(), "override");
    }

    #[test]
    fn test_unknown_braced_token_is_error() {
        let engine = EnvTemplateEngine::new();
        let err = engine.expand("${NOPE}", &build()).unwrap_err();
        assert!(matches!(err, TemplateError::Macro(_)));
    }

    #[test]
    fn test_unknown_bare_token_kept() {
        let engine = EnvTemplateEngine::new();
        assert_eq!(engine.expand("cost $5 and $NOPE", &build()).unwrap(), "cost $5 and $NOPE");
    }

    #[test]
    fn test_unterminated_token_is_error() {
        let engine = EnvTemplateEngine::new();
        assert!(engine.expand("prefix ${BRANCH_NAME", &build()).is_err());
    }

    #[test]
    fn test_plain_text_unchanged() {
        let engine = EnvTemplateEngine::new();
        assert_eq!(engine.expand("no tokens here", &build()).unwrap(), "no tokens here");
    }
}
