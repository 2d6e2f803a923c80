use crate::api::LLMApiProvider;
use crate::error::ChatError;
use crate::models::{ChatConfig, Composer, Conversation, Message};
use crate::persona::Persona;
use crate::storage::StorageManager;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const EXPLAIN_PROMPT: &str = "Explain the following in simple terms:\n\n";
pub const SUMMARIZE_PROMPT: &str = "Summarize the following text in a few bullet points:\n\n";
pub const TRANSLATE_PROMPT: &str = "Translate the following text into English:\n\n";
pub const CODE_PROMPT: &str = "Write code that does the following, with a short explanation:\n\n";
pub const FIX_PROMPT: &str = "Find and fix the bugs in this code, and explain the changes:\n\n";

/// Result of running composer input through the slash command table.
#[derive(Debug, Clone, PartialEq)]
pub enum SlashOutcome {
    /// The active conversation's messages were removed.
    Cleared,
    /// The screen should bring up its settings section.
    ShowSettings,
    /// The composer text now holds a canned prompt.
    Prompt(String),
    /// Not a recognized command; the input is literal text.
    Literal,
}

/// UI notifications from a running generation.
pub trait ChatEvents: Send + Sync {
    fn generation_started(&self, _conversation_id: Uuid, _message_id: Uuid) {}
    fn delta(&self, _conversation_id: Uuid, _message_id: Uuid, _delta: &str) {}
    fn generation_finished(&self, _conversation_id: Uuid, _outcome: &StreamOutcome) {}
}

/// Discards every notification.
pub struct NoopEvents;

impl ChatEvents for NoopEvents {}

/// How a streaming generation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    Completed(String),
    Cancelled { partial: String },
    Failed { partial: String, error: ChatError },
}

/// Conversations, composer and generation flags of the pro screen.
#[derive(Debug, Default)]
pub struct ChatStore {
    pub conversations: Vec<Conversation>,
    pub active_id: Option<Uuid>,
    pub composer: Composer,
    pub is_generating: bool,
    pub cancel: Option<CancellationToken>,
}

impl ChatStore {
    /// Restores persisted conversations; the first one becomes active.
    pub fn new(conversations: Vec<Conversation>) -> Self {
        let active_id = conversations.first().map(|c| c.id);
        Self {
            conversations,
            active_id,
            ..Self::default()
        }
    }

    pub fn active(&self) -> Option<&Conversation> {
        let id = self.active_id?;
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn active_mut(&mut self) -> Option<&mut Conversation> {
        let id = self.active_id?;
        self.conversation_mut(id)
    }

    pub fn conversation_mut(&mut self, id: Uuid) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    pub fn message_mut(&mut self, conversation_id: Uuid, message_id: Uuid) -> Option<&mut Message> {
        self.conversation_mut(conversation_id)?.message_mut(message_id)
    }

    pub fn new_conversation(&mut self) -> Uuid {
        let conversation = Conversation::new();
        let id = conversation.id;
        self.conversations.insert(0, conversation);
        self.active_id = Some(id);
        self.composer.clear();
        id
    }

    /// Returns the active conversation id, creating one when there is none.
    pub fn ensure_active(&mut self) -> Uuid {
        if let Some(id) = self.active().map(|c| c.id) {
            return id;
        }
        self.new_conversation()
    }

    pub fn select(&mut self, id: Uuid) -> Result<(), ChatError> {
        if !self.conversations.iter().any(|c| c.id == id) {
            return Err(ChatError::NotFound("Conversation"));
        }
        self.active_id = Some(id);
        Ok(())
    }

    /// Removes a conversation. Deleting the active one activates the first
    /// remaining conversation, if any.
    pub fn delete_conversation(&mut self, id: Uuid) -> Result<(), ChatError> {
        let index = self
            .conversations
            .iter()
            .position(|c| c.id == id)
            .ok_or(ChatError::NotFound("Conversation"))?;
        self.conversations.remove(index);
        if self.active_id == Some(id) {
            self.active_id = self.conversations.first().map(|c| c.id);
        }
        Ok(())
    }

    pub fn rename(&mut self, id: Uuid, title: &str) -> Result<(), ChatError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ChatError::MissingConfig("title"));
        }
        let conversation = self.conversation_mut(id).ok_or(ChatError::NotFound("Conversation"))?;
        conversation.title = title.to_string();
        Ok(())
    }

    /// Moves a message back into the composer and drops it together with
    /// everything after it.
    pub fn edit_message(&mut self, message_id: Uuid) -> Result<(), ChatError> {
        if self.is_generating {
            return Err(ChatError::GenerationInProgress);
        }
        let conversation = self.active_mut().ok_or(ChatError::NoActiveConversation)?;
        let index = conversation
            .message_index(message_id)
            .ok_or(ChatError::NotFound("Message"))?;
        let message = conversation.messages.split_off(index).swap_remove(0);
        self.composer = Composer {
            text: message.content,
            attachments: message.attachments,
        };
        Ok(())
    }

    pub fn delete_message(&mut self, message_id: Uuid) -> Result<(), ChatError> {
        let conversation = self.active_mut().ok_or(ChatError::NoActiveConversation)?;
        let index = conversation
            .message_index(message_id)
            .ok_or(ChatError::NotFound("Message"))?;
        conversation.messages.remove(index);
        Ok(())
    }

    pub fn message_text(&self, message_id: Uuid) -> Result<String, ChatError> {
        self.active()
            .ok_or(ChatError::NoActiveConversation)?
            .messages
            .iter()
            .find(|m| m.id == message_id)
            .map(|m| m.content.clone())
            .ok_or(ChatError::NotFound("Message"))
    }

    /// Adds an imported conversation and makes it active.
    pub fn add_conversation(&mut self, conversation: Conversation) -> Uuid {
        let id = conversation.id;
        self.conversations.insert(0, conversation);
        self.active_id = Some(id);
        id
    }

    /// Interprets a leading slash token. Only the exact token counts; any
    /// text after a prompt command is kept after the canned prompt.
    pub fn apply_slash_command(&mut self, input: &str) -> SlashOutcome {
        let trimmed = input.trim_start();
        let (token, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((token, rest)) => (token, rest.trim()),
            None => (trimmed, ""),
        };
        let canned = match token {
            "/clear" => {
                if let Some(conversation) = self.active_mut() {
                    conversation.messages.clear();
                }
                self.composer.text.clear();
                return SlashOutcome::Cleared;
            }
            "/settings" => return SlashOutcome::ShowSettings,
            "/explain" => EXPLAIN_PROMPT,
            "/summarize" => SUMMARIZE_PROMPT,
            "/translate" => TRANSLATE_PROMPT,
            "/code" => CODE_PROMPT,
            "/fix" => FIX_PROMPT,
            _ => return SlashOutcome::Literal,
        };
        self.composer.text = format!("{}{}", canned, rest);
        SlashOutcome::Prompt(self.composer.text.clone())
    }
}

/// Persona selection plus connection settings of the pro screen.
#[derive(Debug, Clone, Default)]
pub struct ChatSettings {
    pub config: ChatConfig,
    pub persona: Persona,
    pub persona_addendum: String,
}

impl ChatSettings {
    pub fn system_prompt(&self) -> String {
        self.persona.system_prompt(&self.persona_addendum)
    }
}

// Core application state shared by commands and the background stream task
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<ChatStore>>,
    pub settings: Arc<Mutex<ChatSettings>>,
    pub storage: StorageManager,
    pub api_provider: Arc<dyn LLMApiProvider>,
    pub events: Arc<dyn ChatEvents>,
}

impl AppState {
    pub fn new(
        storage: StorageManager,
        api_provider: Arc<dyn LLMApiProvider>,
        events: Arc<dyn ChatEvents>,
        conversations: Vec<Conversation>,
        config: ChatConfig,
    ) -> Self {
        Self {
            store: Arc::new(Mutex::new(ChatStore::new(conversations))),
            settings: Arc::new(Mutex::new(ChatSettings {
                config,
                ..ChatSettings::default()
            })),
            storage,
            api_provider,
            events,
        }
    }

    /// Restores conversations and configuration from storage.
    pub async fn load(
        storage: StorageManager,
        api_provider: Arc<dyn LLMApiProvider>,
        events: Arc<dyn ChatEvents>,
    ) -> Result<Self, anyhow::Error> {
        let conversations = storage.load_conversations().await?;
        let config = storage.load_config().await?;
        Ok(Self::new(storage, api_provider, events, conversations, config))
    }
}
