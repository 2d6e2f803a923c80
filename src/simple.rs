//! The "setup then chat" screen: one conversation, one request at a time,
//! no streaming.

use crate::api::{self, LLMApiProvider};
use crate::config;
use crate::error::ChatError;
use crate::models::{ChatConfig, Message};
use crate::persona::Persona;

pub const CONNECTION_PROMPT: &str = "Reply with exactly: Connection successful";
pub const CONNECTION_PHRASE: &str = "Connection successful";

/// Result of the connectivity check.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionCheck {
    pub reply: String,
    /// Whether the model echoed the expected phrase. Models do not always
    /// comply, so a reply without it still counts as connected.
    pub phrase_matched: bool,
}

#[derive(Debug, Default)]
pub struct SimpleChat {
    pub config: ChatConfig,
    pub persona: Persona,
    pub persona_addendum: String,
    pub messages: Vec<Message>,
}

impl SimpleChat {
    pub fn new(config: ChatConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    fn system_prompt(&self) -> String {
        self.persona.system_prompt(&self.persona_addendum)
    }

    /// Sends a one-off request that does not touch the conversation.
    pub async fn test_connection(&self, provider: &dyn LLMApiProvider) -> Result<ConnectionCheck, ChatError> {
        let api_key = config::checked_api_key(&self.config)?;
        let probe = Message::user(CONNECTION_PROMPT, vec![]);
        let request = api::build_chat_request(&self.config, &self.system_prompt(), &[], &probe, false);
        log::info!("Testing connection to {}", self.config.completions_url());

        let reply = provider.send_chat_request(&self.config, &api_key, &request).await?;
        let phrase_matched = reply.to_lowercase().contains(&CONNECTION_PHRASE.to_lowercase());
        if !phrase_matched {
            log::warn!("Connection check reply did not contain the expected phrase: {}", reply);
        }
        Ok(ConnectionCheck { reply, phrase_matched })
    }

    /// Appends the user message and exactly one assistant message: the
    /// reply, or an error notice when the request fails. Missing
    /// configuration is returned as an error before anything is appended.
    pub async fn send(&mut self, provider: &dyn LLMApiProvider, text: &str) -> Result<&Message, ChatError> {
        let api_key = config::checked_api_key(&self.config)?;
        let prompt = Message::user(text.trim(), vec![]);
        let request = api::build_chat_request(
            &self.config,
            &self.system_prompt(),
            &self.messages,
            &prompt,
            false,
        );
        self.messages.push(prompt);

        let reply = match provider.send_chat_request(&self.config, &api_key, &request).await {
            Ok(text) => Message::assistant(text),
            Err(e) => {
                log::error!("Simple chat request failed: {}", e);
                Message::error_notice(e)
            }
        };
        self.messages.push(reply);
        Ok(&self.messages[self.messages.len() - 1])
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ChatRequest, DeltaStream};
    use crate::models::Role;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct OneShot {
        reply: Result<String, ChatError>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl OneShot {
        fn new(reply: Result<String, ChatError>) -> Self {
            Self { reply, requests: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl LLMApiProvider for OneShot {
        async fn send_chat_request(
            &self,
            _config: &ChatConfig,
            _api_key: &str,
            request: &ChatRequest,
        ) -> Result<String, ChatError> {
            self.requests.lock().unwrap().push(request.clone());
            self.reply.clone()
        }

        async fn send_chat_stream_request(
            &self,
            _config: &ChatConfig,
            _api_key: &str,
            _request: &ChatRequest,
        ) -> Result<DeltaStream, ChatError> {
            Err(ChatError::Transport("streaming not used".into()))
        }
    }

    fn chat() -> SimpleChat {
        SimpleChat::new(ChatConfig {
            api_key: "sk-test".into(),
            ..ChatConfig::default()
        })
    }

    #[tokio::test]
    async fn reply_is_appended() {
        let provider = OneShot::new(Ok("hello".into()));
        let mut chat = chat();
        let reply = chat.send(&provider, " hi ").await.unwrap();
        assert_eq!(reply.content, "hello");

        let roles: Vec<Role> = chat.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
        assert_eq!(chat.messages[0].content, "hi");

        let requests = provider.requests.lock().unwrap();
        assert!(!requests[0].stream);
        assert_eq!(requests[0].messages.len(), 2);
    }

    #[tokio::test]
    async fn failure_becomes_error_message() {
        let provider = OneShot::new(Err(ChatError::Http { status: 401, message: "No auth credentials found".into() }));
        let mut chat = chat();
        let reply = chat.send(&provider, "hi").await.unwrap();
        assert!(reply.is_error);
        assert_eq!(reply.content, "Error: HTTP 401: No auth credentials found");
        assert_eq!(chat.messages.len(), 2);
    }

    #[tokio::test]
    async fn missing_model_appends_nothing() {
        let provider = OneShot::new(Ok("hello".into()));
        let mut chat = chat();
        chat.config.model.clear();
        assert_eq!(chat.send(&provider, "hi").await.unwrap_err(), ChatError::MissingConfig("model"));
        assert!(chat.messages.is_empty());
    }

    #[tokio::test]
    async fn connection_check_reports_phrase() {
        let chat = chat();
        let ok = chat.test_connection(&OneShot::new(Ok("Connection successful.".into()))).await.unwrap();
        assert!(ok.phrase_matched);

        let chatty = chat.test_connection(&OneShot::new(Ok("Hi! How can I help?".into()))).await.unwrap();
        assert!(!chatty.phrase_matched);
        assert!(chat.messages.is_empty());
    }
}
