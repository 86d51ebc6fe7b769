//! 链接构建 - "View Build" 以及 Pull Request 相关的链接和 fact

use super::card::Action;
use super::facts::FactCollector;
use crate::host::{BuildSnapshot, ContributorMetadata};

pub const DEFAULT_PRONOUN: &str = "Pull Request";

pub struct ActionBuilder<'a> {
    build: &'a BuildSnapshot,
    run_url: String,
}

impl<'a> ActionBuilder<'a> {
    pub fn new(build: &'a BuildSnapshot, run_url: impl Into<String>) -> Self {
        Self {
            build,
            run_url: run_url.into(),
        }
    }

    /// 构建链接列表，Pull Request 的标题和作者写入 `facts`
    pub fn build_actionable(&self, facts: &mut FactCollector) -> Vec<Action> {
        let mut actions = vec![Action::new("View Build", self.run_url.clone())];
        self.pull_request_actionable(&mut actions, facts);
        actions
    }

    fn pull_request_actionable(&self, actions: &mut Vec<Action>, facts: &mut FactCollector) {
        let Some(head) = self.build.scm_head.as_ref().filter(|h| h.change_request) else {
            return;
        };

        let pronoun = head
            .pronoun
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(DEFAULT_PRONOUN);

        if let Some(metadata) = &head.object_metadata {
            if let Some(url) = metadata.object_url.as_deref().filter(|u| !u.trim().is_empty()) {
                actions.push(Action::new(format!("View {}", pronoun), url));
            }
            facts.add_fact(format!("{} Title", pronoun), metadata.display_name.clone().unwrap_or_default());
        }

        if let Some(contributor) = &head.contributor {
            facts.add_fact(format!("{} Author", pronoun), author(contributor));
        }
    }
}

fn author(contributor: &ContributorMetadata) -> String {
    let id = contributor.id.as_deref().unwrap_or("").trim();
    let name = contributor.display_name.as_deref().unwrap_or("").trim();
    match (id.is_empty(), name.is_empty()) {
        (_, true) => id.to_string(),
        (true, false) => name.to_string(),
        (false, false) => format!("{} ({})", id, name),
    }
}
