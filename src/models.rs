use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_TITLE: &str = "New Chat";
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

const TITLE_MAX_CHARS: usize = 30;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    File,
}

// A file picked by the user. Images carry a data URL, other files a text excerpt.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Attachment {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    pub kind: AttachmentKind,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub size: u64,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.kind == AttachmentKind::Image
    }
}

// Represents a single message in a conversation
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    #[serde(default = "Uuid::new_v4")] // Generate a new UUID if missing during deserialization
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Set on assistant messages that report a failed request instead of a reply.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            attachments: Vec::new(),
            is_error: false,
        }
    }

    pub fn user(content: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            attachments,
            ..Self::new(Role::User, content)
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// An assistant-authored notice describing a failed request.
    pub fn error_notice(error: impl std::fmt::Display) -> Self {
        Self {
            is_error: true,
            ..Self::new(Role::Assistant, format!("Error: {}", error))
        }
    }

    pub fn image_attachments(&self) -> impl Iterator<Item = &Attachment> {
        self.attachments.iter().filter(|a| a.is_image())
    }

    /// The text sent to the API: the message text followed by the excerpt of
    /// every non-image attachment.
    pub fn outgoing_text(&self) -> String {
        let mut text = self.content.clone();
        for attachment in self.attachments.iter().filter(|a| !a.is_image()) {
            let Some(excerpt) = attachment.excerpt.as_deref() else {
                continue;
            };
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            text.push_str(&format!("--- {} ---\n{}", attachment.name, excerpt));
        }
        text
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Conversation {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
        }
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the default title with the start of the first user message.
    pub fn refresh_title(&mut self) {
        if self.title != DEFAULT_TITLE {
            return;
        }
        let Some(first) = self.messages.iter().find(|m| m.role == Role::User) else {
            return;
        };
        let text = first.content.trim();
        let text = if text.is_empty() {
            first.attachments.first().map(|a| a.name.as_str()).unwrap_or("")
        } else {
            text
        };
        if text.is_empty() {
            return;
        }
        self.title = title_from(text);
    }

    pub fn message_index(&self, message_id: Uuid) -> Option<usize> {
        self.messages.iter().position(|m| m.id == message_id)
    }

    pub fn message_mut(&mut self, message_id: Uuid) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == message_id)
    }
}

fn title_from(text: &str) -> String {
    let line = text.lines().next().unwrap_or(text);
    if line.chars().count() > TITLE_MAX_CHARS {
        let head: String = line.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", head.trim_end())
    } else {
        line.to_string()
    }
}

// Connection and sampling settings shared by both screens
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChatConfig {
    /// A literal key, `env:NAME` or `keyring`.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2048
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl ChatConfig {
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim().trim_end_matches('/'))
    }
}

/// Pending input of the pro screen.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Composer {
    pub text: String,
    pub attachments: Vec<Attachment>,
}

impl Composer {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.attachments.is_empty()
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.attachments.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn file_attachment(name: &str, excerpt: &str) -> Attachment {
        Attachment {
            id: Uuid::new_v4(),
            name: name.to_string(),
            kind: AttachmentKind::File,
            mime_type: "text/plain".to_string(),
            data: None,
            excerpt: Some(excerpt.to_string()),
            size: excerpt.len() as u64,
        }
    }

    #[test]
    fn title_follows_first_user_message() {
        let mut convo = Conversation::new();
        convo.messages.push(Message::user("Explain lifetimes in Rust please", vec![]));
        convo.refresh_title();
        assert_eq!(convo.title, "Explain lifetimes in Rust plea...");

        convo.messages.insert(0, Message::user("later", vec![]));
        convo.refresh_title();
        assert_eq!(convo.title, "Explain lifetimes in Rust plea...");
    }

    #[test]
    fn short_title_is_kept_whole() {
        let mut convo = Conversation::new();
        convo.messages.push(Message::assistant("hello"));
        convo.refresh_title();
        assert_eq!(convo.title, DEFAULT_TITLE);

        convo.messages.push(Message::user("hi there\nsecond line", vec![]));
        convo.refresh_title();
        assert_eq!(convo.title, "hi there");
    }

    #[test]
    fn outgoing_text_appends_file_excerpts() {
        let mut message = Message::user("Review this", vec![file_attachment("notes.txt", "line one")]);
        assert_eq!(message.outgoing_text(), "Review this\n\n--- notes.txt ---\nline one");

        message.content.clear();
        assert_eq!(message.outgoing_text(), "--- notes.txt ---\nline one");
    }

    #[test]
    fn message_json_omits_empty_optionals() {
        let message = Message::assistant("hello");
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["role"], "assistant");
        assert!(value.get("attachments").is_none());
        assert!(value.get("is_error").is_none());

        let notice = Message::error_notice("boom");
        let value = serde_json::to_value(&notice).unwrap();
        assert_eq!(value["content"], "Error: boom");
        assert_eq!(value["is_error"], true);
    }

    #[test]
    fn config_fills_missing_fields_with_defaults() {
        let config: ChatConfig = serde_json::from_str(r#"{"api_key":"sk-1"}"#).unwrap();
        assert_eq!(config.api_key, "sk-1");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.max_tokens, 2048);
        assert_eq!(
            ChatConfig { base_url: "http://host/v1/".into(), ..config }.completions_url(),
            "http://host/v1/chat/completions"
        );
    }
}
