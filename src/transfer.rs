//! Conversation export and import as `{ id, title, messages }` JSON files.

use crate::error::ChatError;
use crate::models::{Conversation, Message, DEFAULT_TITLE};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

#[derive(Deserialize)]
struct ImportedConversation {
    title: Option<String>,
    messages: Option<Vec<Message>>,
}

pub fn export_conversation(conversation: &Conversation) -> Result<String, ChatError> {
    serde_json::to_string_pretty(conversation)
        .map_err(|e| ChatError::Export(format!("Failed to serialize conversation: {}", e)))
}

/// File name for an export: the title with unsafe characters replaced.
pub fn export_file_name(conversation: &Conversation) -> String {
    let stem: String = conversation
        .title
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let stem = stem.trim_matches('_');
    if stem.is_empty() {
        format!("chat-{}.json", conversation.id)
    } else {
        format!("{}.json", stem)
    }
}

/// Parses an imported file. The file must hold a non-empty `messages` list;
/// the title falls back to the file name. The result always gets a fresh id,
/// and repeated message ids are replaced.
pub fn parse_import(contents: &str, file_name: &str) -> Result<Conversation, ChatError> {
    let imported: ImportedConversation = serde_json::from_str(contents)
        .map_err(|e| ChatError::ImportFormat(e.to_string()))?;
    let mut messages = imported
        .messages
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ChatError::ImportFormat("expected a non-empty \"messages\" list".to_string()))?;

    // Message ids must stay unique; repeats get a fresh one.
    let mut seen = HashSet::new();
    for message in &mut messages {
        if !seen.insert(message.id) {
            message.id = Uuid::new_v4();
            seen.insert(message.id);
        }
    }

    let title = imported
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| title_from_file_name(file_name));

    Ok(Conversation {
        id: Uuid::new_v4(),
        title,
        messages,
    })
}

fn title_from_file_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attachment, AttachmentKind};
    use pretty_assertions::assert_eq;

    #[test]
    fn export_then_import_keeps_title_and_messages() {
        let mut convo = Conversation::new();
        convo.title = "Trip planning".into();
        convo.messages.push(Message::user(
            "What should I pack?",
            vec![Attachment {
                id: Uuid::new_v4(),
                name: "list.txt".into(),
                kind: AttachmentKind::File,
                mime_type: "text/plain".into(),
                data: None,
                excerpt: Some("socks".into()),
                size: 5,
            }],
        ));
        convo.messages.push(Message::assistant("An umbrella."));
        convo.messages.push(Message::error_notice("HTTP 502: Bad Gateway"));

        let json = export_conversation(&convo).unwrap();
        let imported = parse_import(&json, "whatever.json").unwrap();

        assert_eq!(imported.title, convo.title);
        assert_eq!(imported.messages, convo.messages);
        assert_ne!(imported.id, convo.id);
    }

    #[test]
    fn missing_messages_are_rejected() {
        assert!(matches!(
            parse_import(r#"{"title":"T"}"#, "t.json"),
            Err(ChatError::ImportFormat(_))
        ));
        assert!(matches!(
            parse_import(r#"{"title":"T","messages":[]}"#, "t.json"),
            Err(ChatError::ImportFormat(_))
        ));
        assert!(matches!(parse_import("not json", "t.json"), Err(ChatError::ImportFormat(_))));
    }

    #[test]
    fn title_falls_back_to_file_name() {
        let imported = parse_import(
            r#"{"messages":[{"role":"user","content":"hi"}]}"#,
            "/tmp/old chat.json",
        )
        .unwrap();
        assert_eq!(imported.title, "old chat");
        assert_eq!(imported.messages[0].content, "hi");
    }

    #[test]
    fn repeated_message_ids_are_replaced() {
        let id = Uuid::new_v4();
        let contents = format!(
            r#"{{"messages":[
                {{"id":"{id}","role":"user","content":"one","timestamp":"2024-05-01T10:00:00Z"}},
                {{"id":"{id}","role":"assistant","content":"two","timestamp":"2024-05-01T10:00:01Z"}},
                {{"id":"{id}","role":"user","content":"three","timestamp":"2024-05-01T10:00:02Z"}}
            ]}}"#
        );
        let imported = parse_import(&contents, "dupes.json").unwrap();

        let ids: HashSet<Uuid> = imported.messages.iter().map(|m| m.id).collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(imported.messages[0].id, id);
        assert_eq!(imported.message_index(imported.messages[2].id), Some(2));
    }

    #[test]
    fn export_names_are_filesystem_safe() {
        let convo = Conversation {
            title: "What is 2/3?".into(),
            ..Conversation::new()
        };
        assert_eq!(export_file_name(&convo), "What_is_2_3.json");
    }
}
