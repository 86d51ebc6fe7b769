//! 通知文档模型 - MessageCard 与 AdaptiveCard 两种格式
//!
//! MessageCard 格式：
//! ```json
//! {
//!   "@type": "MessageCard",
//!   "@context": "https://schema.org/extensions",
//!   "summary": "app: Build #12 Failed",
//!   "themeColor": "#EF2929",
//!   "sections": [{ "activityTitle": "...", "activitySubtitle": "...", "markdown": true, "facts": [...] }],
//!   "potentialAction": [{ "@context": "http://schema.org", "@type": "ViewAction", "name": "View Build", "target": ["..."] }]
//! }
//! ```
//!
//! AdaptiveCard 以 Teams 消息附件的形式发送。

use crate::host::BuildResult;
use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;

/// MessageCard 默认主题色
pub const DEFAULT_THEME_COLOR: &str = "#3479BF";

const MESSAGE_CARD_CONTEXT: &str = "https://schema.org/extensions";
const ACTION_CONTEXT: &str = "http://schema.org";
const ADAPTIVE_CARD_SCHEMA: &str = "http://adaptivecards.io/schemas/adaptive-card.json";
const ADAPTIVE_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.adaptive";
const ADAPTIVE_CARD_VERSION: &str = "1.4";

/// 通知中的一行信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fact {
    pub name: String,
    pub value: String,
}

impl Fact {
    /// 名称或值为空白时返回 None
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Option<Self> {
        let name = name.into();
        let value = value.into();
        if name.trim().is_empty() || value.trim().is_empty() {
            return None;
        }
        Some(Self { name, value })
    }
}

/// 可点击的链接，两种格式共用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub name: String,
    pub url: String,
}

impl Action {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub activity_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_subtitle: Option<String>,
    pub markdown: bool,
    pub facts: Vec<Fact>,
}

impl Section {
    pub fn new(title: impl Into<String>, subtitle: Option<String>, facts: Vec<Fact>) -> Self {
        Self {
            activity_title: title.into(),
            activity_subtitle: subtitle,
            markdown: true,
            facts,
        }
    }
}

/// 文档格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardFormat {
    MessageCard,
    AdaptiveCard,
}

impl CardFormat {
    pub fn from_flag(adaptive_cards: bool) -> Self {
        if adaptive_cards {
            CardFormat::AdaptiveCard
        } else {
            CardFormat::MessageCard
        }
    }
}

/// 旧版 Office 365 connector 卡片
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageCard {
    #[serde(rename = "@type")]
    card_type: &'static str,
    #[serde(rename = "@context")]
    context: &'static str,
    pub summary: String,
    pub theme_color: String,
    #[serde(rename = "sections", serialize_with = "single_section")]
    pub section: Section,
    #[serde(rename = "potentialAction", serialize_with = "view_actions")]
    pub actions: Vec<Action>,
}

impl MessageCard {
    pub fn new(summary: impl Into<String>, section: Section) -> Self {
        Self {
            card_type: "MessageCard",
            context: MESSAGE_CARD_CONTEXT,
            summary: summary.into(),
            theme_color: DEFAULT_THEME_COLOR.to_string(),
            section,
            actions: Vec::new(),
        }
    }
}

fn single_section<S: Serializer>(section: &Section, serializer: S) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(1))?;
    seq.serialize_element(section)?;
    seq.end()
}

#[derive(Serialize)]
struct ViewAction<'a> {
    #[serde(rename = "@context")]
    context: &'static str,
    #[serde(rename = "@type")]
    action_type: &'static str,
    name: &'a str,
    target: [&'a str; 1],
}

fn view_actions<S: Serializer>(actions: &[Action], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(actions.iter().map(|a| ViewAction {
        context: ACTION_CONTEXT,
        action_type: "ViewAction",
        name: &a.name,
        target: [&a.url],
    }))
}

/// AdaptiveCard 标题颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TitleColor {
    Good,
    Warning,
    Attention,
    Default,
}

impl TitleColor {
    pub fn for_result(result: Option<BuildResult>) -> Self {
        match result {
            Some(BuildResult::Success) => TitleColor::Good,
            Some(BuildResult::Unstable) => TitleColor::Warning,
            Some(BuildResult::Failure) => TitleColor::Attention,
            _ => TitleColor::Default,
        }
    }
}

/// Teams AdaptiveCard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdaptiveCard {
    pub summary: String,
    pub title_color: TitleColor,
    pub section: Section,
    pub actions: Vec<Action>,
}

impl AdaptiveCard {
    pub fn new(summary: impl Into<String>, section: Section, result: Option<BuildResult>) -> Self {
        Self {
            summary: summary.into(),
            title_color: TitleColor::for_result(result),
            section,
            actions: Vec::new(),
        }
    }

    fn body(&self) -> Vec<Block<'_>> {
        let mut body = vec![Block::TextBlock {
            text: &self.summary,
            weight: Some("Bolder"),
            size: Some("Medium"),
            color: Some(self.title_color),
            is_subtle: None,
            wrap: true,
        }];

        if !self.section.activity_title.trim().is_empty() {
            let mut items = vec![Block::TextBlock {
                text: &self.section.activity_title,
                weight: Some("Bolder"),
                size: None,
                color: None,
                is_subtle: None,
                wrap: true,
            }];
            if let Some(subtitle) = self.section.activity_subtitle.as_deref() {
                items.push(Block::TextBlock {
                    text: subtitle,
                    weight: None,
                    size: None,
                    color: None,
                    is_subtle: Some(true),
                    wrap: true,
                });
            }
            body.push(Block::Container { items });
        }

        if !self.section.facts.is_empty() {
            body.push(Block::FactSet {
                facts: self
                    .section
                    .facts
                    .iter()
                    .map(|f| FactSetEntry { title: &f.name, value: &f.value })
                    .collect(),
            });
        }

        body
    }
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum Block<'a> {
    #[serde(rename_all = "camelCase")]
    TextBlock {
        text: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        weight: Option<&'static str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        size: Option<&'static str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        color: Option<TitleColor>,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_subtle: Option<bool>,
        wrap: bool,
    },
    Container {
        items: Vec<Block<'a>>,
    },
    FactSet {
        facts: Vec<FactSetEntry<'a>>,
    },
}

#[derive(Serialize)]
struct FactSetEntry<'a> {
    title: &'a str,
    value: &'a str,
}

#[derive(Serialize)]
struct OpenUrlAction<'a> {
    #[serde(rename = "type")]
    action_type: &'static str,
    title: &'a str,
    url: &'a str,
}

#[derive(Serialize)]
struct MsTeams {
    width: &'static str,
}

#[derive(Serialize)]
struct AdaptiveContent<'a> {
    #[serde(rename = "$schema")]
    schema: &'static str,
    #[serde(rename = "type")]
    card_type: &'static str,
    version: &'static str,
    body: Vec<Block<'a>>,
    actions: Vec<OpenUrlAction<'a>>,
    msteams: MsTeams,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Attachment<'a> {
    content_type: &'static str,
    content: AdaptiveContent<'a>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(rename = "type")]
    message_type: &'static str,
    summary: &'a str,
    attachments: [Attachment<'a>; 1],
}

impl Serialize for AdaptiveCard {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let content = AdaptiveContent {
            schema: ADAPTIVE_CARD_SCHEMA,
            card_type: "AdaptiveCard",
            version: ADAPTIVE_CARD_VERSION,
            body: self.body(),
            actions: self
                .actions
                .iter()
                .map(|a| OpenUrlAction { action_type: "Action.OpenUrl", title: &a.name, url: &a.url })
                .collect(),
            msteams: MsTeams { width: "Full" },
        };
        Envelope {
            message_type: "message",
            summary: &self.summary,
            attachments: [Attachment { content_type: ADAPTIVE_CARD_CONTENT_TYPE, content }],
        }
        .serialize(serializer)
    }
}

/// 通知文档
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum NotificationDocument {
    MessageCard(MessageCard),
    AdaptiveCard(AdaptiveCard),
}

impl NotificationDocument {
    /// 按格式创建文档；`result` 只影响 AdaptiveCard 的标题颜色
    pub fn new(
        format: CardFormat,
        summary: impl Into<String>,
        section: Section,
        result: Option<BuildResult>,
    ) -> Self {
        match format {
            CardFormat::MessageCard => NotificationDocument::MessageCard(MessageCard::new(summary, section)),
            CardFormat::AdaptiveCard => {
                NotificationDocument::AdaptiveCard(AdaptiveCard::new(summary, section, result))
            }
        }
    }

    pub fn format(&self) -> CardFormat {
        match self {
            NotificationDocument::MessageCard(_) => CardFormat::MessageCard,
            NotificationDocument::AdaptiveCard(_) => CardFormat::AdaptiveCard,
        }
    }

    pub fn summary(&self) -> &str {
        match self {
            NotificationDocument::MessageCard(card) => &card.summary,
            NotificationDocument::AdaptiveCard(card) => &card.summary,
        }
    }

    pub fn section(&self) -> &Section {
        match self {
            NotificationDocument::MessageCard(card) => &card.section,
            NotificationDocument::AdaptiveCard(card) => &card.section,
        }
    }

    pub fn facts(&self) -> &[Fact] {
        &self.section().facts
    }

    /// 查找指定名称的 fact 值
    pub fn fact(&self, name: &str) -> Option<&str> {
        self.facts().iter().find(|f| f.name == name).map(|f| f.value.as_str())
    }

    pub fn actions(&self) -> &[Action] {
        match self {
            NotificationDocument::MessageCard(card) => &card.actions,
            NotificationDocument::AdaptiveCard(card) => &card.actions,
        }
    }

    pub fn set_actions(&mut self, actions: Vec<Action>) {
        match self {
            NotificationDocument::MessageCard(card) => card.actions = actions,
            NotificationDocument::AdaptiveCard(card) => card.actions = actions,
        }
    }

    /// 只有 MessageCard 有主题色
    pub fn theme_color(&self) -> Option<&str> {
        match self {
            NotificationDocument::MessageCard(card) => Some(&card.theme_color),
            NotificationDocument::AdaptiveCard(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
