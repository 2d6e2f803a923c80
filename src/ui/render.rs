use crate::attachments::format_size;
use crate::config::display_api_key;
use crate::models::{Conversation, Message, Role};
use crate::state::ChatSettings;
use uuid::Uuid;

pub fn role_label(message: &Message) -> &'static str {
    match (message.role, message.is_error) {
        (_, true) => "error",
        (Role::User, _) => "you",
        (Role::Assistant, _) => "assistant",
        (Role::System, _) => "system",
    }
}

/// One message, numbered from 1, with its attachments listed underneath.
pub fn render_message(number: usize, message: &Message) -> String {
    let mut out = format!(
        "[{}] {} ({}):\n{}",
        number,
        role_label(message),
        message.timestamp.format("%H:%M"),
        message.content
    );
    for attachment in &message.attachments {
        out.push_str(&format!(
            "\n    + {} ({}, {})",
            attachment.name,
            attachment.mime_type,
            format_size(attachment.size)
        ));
    }
    out
}

pub fn render_conversation(conversation: &Conversation) -> String {
    if conversation.messages.is_empty() {
        return format!("== {} ==\n(no messages yet)", conversation.title);
    }
    let body: Vec<String> = conversation
        .messages
        .iter()
        .enumerate()
        .map(|(i, m)| render_message(i + 1, m))
        .collect();
    format!("== {} ==\n{}", conversation.title, body.join("\n\n"))
}

pub fn render_conversation_list(conversations: &[Conversation], active: Option<Uuid>) -> String {
    if conversations.is_empty() {
        return "(no chats)".to_string();
    }
    conversations
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let marker = if Some(c.id) == active { '*' } else { ' ' };
            format!("{} {}. {} ({} messages)", marker, i + 1, c.title, c.messages.len())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_settings(settings: &ChatSettings) -> String {
    let config = &settings.config;
    let addendum = settings.persona_addendum.trim();
    format!(
        "Settings\n  key:         {}\n  url:         {}\n  model:       {}\n  temperature: {}\n  max_tokens:  {}\n  persona:     {}\n  addendum:    {}",
        display_api_key(config),
        config.base_url,
        config.model,
        config.temperature,
        config.max_tokens,
        settings.persona,
        if addendum.is_empty() { "(none)" } else { addendum }
    )
}
