// Operations of the pro screen. Each one mutates the shared store and mirrors
// it to storage before releasing the lock, so writes land in mutation order.

use crate::api::{self, ChatRequest};
use crate::attachments;
use crate::config;
use crate::error::ChatError;
use crate::models::{Attachment, ChatConfig, Conversation, Message};
use crate::persona::Persona;
use crate::state::{AppState, ChatSettings, ChatStore, SlashOutcome, StreamOutcome};
use crate::transfer;
use futures::{FutureExt, StreamExt};
use std::panic::AssertUnwindSafe;
use std::path::Path;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// What a send or regenerate request did.
#[derive(Debug)]
pub enum SendOutcome {
    /// A background generation is running; the handle resolves when it ends.
    Started(JoinHandle<StreamOutcome>),
    /// Another generation is in flight; nothing changed.
    Busy,
    /// The composer holds neither text nor attachments.
    EmptyComposer,
}

async fn persist(state: &AppState, store: &ChatStore) {
    state.storage.persist_conversations(&store.conversations).await;
}

// --- Conversations ---

pub async fn list_conversations(state: &AppState) -> (Vec<Conversation>, Option<Uuid>) {
    let store = state.store.lock().await;
    (store.conversations.clone(), store.active_id)
}

pub async fn active_conversation(state: &AppState) -> Option<Conversation> {
    state.store.lock().await.active().cloned()
}

pub async fn create_conversation(state: &AppState) -> Uuid {
    let mut store = state.store.lock().await;
    let id = store.new_conversation();
    log::info!("Created conversation {}", id);
    persist(state, &store).await;
    id
}

pub async fn select_conversation(state: &AppState, conversation_id: Uuid) -> Result<(), ChatError> {
    state.store.lock().await.select(conversation_id)
}

pub async fn delete_conversation(state: &AppState, conversation_id: Uuid) -> Result<(), ChatError> {
    log::warn!("Deleting conversation {}", conversation_id);
    let mut store = state.store.lock().await;
    store.delete_conversation(conversation_id)?;
    persist(state, &store).await;
    Ok(())
}

pub async fn rename_conversation(
    state: &AppState,
    conversation_id: Uuid,
    new_title: &str,
) -> Result<(), ChatError> {
    log::info!("Renaming conversation {} to: {}", conversation_id, new_title);
    let mut store = state.store.lock().await;
    store.rename(conversation_id, new_title)?;
    persist(state, &store).await;
    Ok(())
}

// --- Messages ---

pub async fn edit_message(state: &AppState, message_id: Uuid) -> Result<(), ChatError> {
    log::info!("Editing message {}", message_id);
    let mut store = state.store.lock().await;
    store.edit_message(message_id)?;
    persist(state, &store).await;
    Ok(())
}

pub async fn delete_message(state: &AppState, message_id: Uuid) -> Result<(), ChatError> {
    log::warn!("Deleting message {}", message_id);
    let mut store = state.store.lock().await;
    store.delete_message(message_id)?;
    persist(state, &store).await;
    Ok(())
}

/// Raw text of a message, for the clipboard.
pub async fn copy_message(state: &AppState, message_id: Uuid) -> Result<String, ChatError> {
    state.store.lock().await.message_text(message_id)
}

// --- Composer ---

pub async fn set_composer_text(state: &AppState, text: &str) {
    state.store.lock().await.composer.text = text.to_string();
}

pub async fn attach_file(state: &AppState, path: &Path) -> Result<Attachment, ChatError> {
    let attachment = attachments::load_attachment(path).await?;
    state.store.lock().await.composer.attachments.push(attachment.clone());
    Ok(attachment)
}

pub async fn clear_attachments(state: &AppState) {
    state.store.lock().await.composer.attachments.clear();
}

pub async fn apply_slash_command(state: &AppState, input: &str) -> SlashOutcome {
    let mut store = state.store.lock().await;
    let outcome = store.apply_slash_command(input);
    if outcome == SlashOutcome::Cleared {
        log::info!("Cleared active conversation");
        persist(state, &store).await;
    }
    outcome
}

// --- Settings ---

pub async fn get_settings(state: &AppState) -> ChatSettings {
    state.settings.lock().await.clone()
}

/// Applies a change to the configuration and persists it.
pub async fn update_config<F>(state: &AppState, change: F) -> ChatConfig
where
    F: FnOnce(&mut ChatConfig),
{
    let mut settings = state.settings.lock().await;
    change(&mut settings.config);
    state.storage.persist_config(&settings.config).await;
    settings.config.clone()
}

pub async fn set_persona(state: &AppState, persona: Persona) {
    log::info!("Switching persona to {}", persona);
    state.settings.lock().await.persona = persona;
}

pub async fn set_persona_addendum(state: &AppState, addendum: &str) {
    state.settings.lock().await.persona_addendum = addendum.to_string();
}

// --- Export / import ---

/// Serialized active conversation and a file name to save it under.
pub async fn export_active(state: &AppState) -> Result<(String, String), ChatError> {
    let store = state.store.lock().await;
    let conversation = store.active().ok_or(ChatError::NoActiveConversation)?;
    Ok((transfer::export_file_name(conversation), transfer::export_conversation(conversation)?))
}

pub async fn import_conversation(
    state: &AppState,
    contents: &str,
    file_name: &str,
) -> Result<Uuid, ChatError> {
    let conversation = transfer::parse_import(contents, file_name)?;
    log::info!(
        "Importing conversation '{}' with {} messages",
        conversation.title,
        conversation.messages.len()
    );
    let mut store = state.store.lock().await;
    let id = store.add_conversation(conversation);
    persist(state, &store).await;
    Ok(id)
}

// --- Generation ---

/// Sends the composer contents to the active conversation (creating one if
/// needed) and starts streaming the reply in the background.
pub async fn send_message(state: &AppState) -> Result<SendOutcome, ChatError> {
    let settings = state.settings.lock().await.clone();
    let mut store = state.store.lock().await;

    if store.is_generating {
        log::warn!("Send ignored: a generation is already in flight");
        return Ok(SendOutcome::Busy);
    }
    if store.composer.is_empty() {
        return Ok(SendOutcome::EmptyComposer);
    }
    let api_key = config::checked_api_key(&settings.config)?;

    let composer = std::mem::take(&mut store.composer);
    let conversation_id = store.ensure_active();
    let conversation = store
        .conversation_mut(conversation_id)
        .ok_or(ChatError::NoActiveConversation)?;
    let history = conversation.messages.clone();
    let prompt = Message::user(composer.text.trim().to_string(), composer.attachments);
    conversation.messages.push(prompt.clone());
    conversation.refresh_title();
    log::info!("User message {} added to conversation {}", prompt.id, conversation_id);

    start_generation(state, &mut store, conversation_id, &history, &prompt, &settings, api_key)
}

/// Drops everything after the last user message and asks for a new reply to it.
pub async fn regenerate(state: &AppState) -> Result<SendOutcome, ChatError> {
    let settings = state.settings.lock().await.clone();
    let mut store = state.store.lock().await;

    if store.is_generating {
        log::warn!("Regenerate ignored: a generation is already in flight");
        return Ok(SendOutcome::Busy);
    }
    let api_key = config::checked_api_key(&settings.config)?;

    let conversation = store.active_mut().ok_or(ChatError::NoActiveConversation)?;
    let conversation_id = conversation.id;
    let index = conversation
        .messages
        .iter()
        .rposition(|m| m.role == crate::models::Role::User)
        .ok_or(ChatError::NothingToRegenerate)?;
    conversation.messages.truncate(index + 1);
    let prompt = conversation.messages[index].clone();
    let history = conversation.messages[..index].to_vec();
    log::info!("Regenerating reply to message {} in {}", prompt.id, conversation_id);

    start_generation(state, &mut store, conversation_id, &history, &prompt, &settings, api_key)
}

/// Signals the in-flight generation, if any, to stop reading.
pub async fn stop_generation(state: &AppState) -> bool {
    let store = state.store.lock().await;
    match &store.cancel {
        Some(token) => {
            log::warn!("Cancellation requested for the running generation");
            token.cancel();
            true
        }
        None => false,
    }
}

fn start_generation(
    state: &AppState,
    store: &mut ChatStore,
    conversation_id: Uuid,
    history: &[Message],
    prompt: &Message,
    settings: &ChatSettings,
    api_key: String,
) -> Result<SendOutcome, ChatError> {
    let request = api::build_chat_request(
        &settings.config,
        &settings.system_prompt(),
        history,
        prompt,
        true,
    );

    let placeholder = Message::assistant(String::new());
    let message_id = placeholder.id;
    store
        .conversation_mut(conversation_id)
        .ok_or(ChatError::NoActiveConversation)?
        .messages
        .push(placeholder);

    let token = CancellationToken::new();
    store.is_generating = true;
    store.cancel = Some(token.clone());

    let task_state = state.clone();
    let config = settings.config.clone();
    let handle = tokio::spawn(async move {
        persist(&task_state, &*task_state.store.lock().await).await;
        let generation = Generation {
            state: task_state,
            conversation_id,
            message_id,
            config,
            api_key,
            request,
            token,
        };
        generation.run().await
    });
    Ok(SendOutcome::Started(handle))
}

struct Generation {
    state: AppState,
    conversation_id: Uuid,
    message_id: Uuid,
    config: ChatConfig,
    api_key: String,
    request: ChatRequest,
    token: CancellationToken,
}

impl Generation {
    async fn run(self) -> StreamOutcome {
        log::info!("BG Task [{}]: Starting stream processing.", self.message_id);
        let streamed = AssertUnwindSafe(async {
            self.state.events.generation_started(self.conversation_id, self.message_id);
            self.stream().await
        })
        .catch_unwind()
        .await;
        let outcome = match streamed {
            Ok(outcome) => outcome,
            Err(_) => {
                log::error!("BG Task [{}]: Panicked while streaming.", self.message_id);
                StreamOutcome::Failed {
                    partial: self.partial_text().await,
                    error: ChatError::Stream("the reply stopped unexpectedly".to_string()),
                }
            }
        };
        self.finish(&outcome).await;
        outcome
    }

    async fn partial_text(&self) -> String {
        let mut store = self.state.store.lock().await;
        store
            .message_mut(self.conversation_id, self.message_id)
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    /// Reads deltas into the placeholder message until the stream ends,
    /// fails or the token is cancelled.
    async fn stream(&self) -> StreamOutcome {
        let provider = self.state.api_provider.clone();
        let opened = tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                return StreamOutcome::Cancelled { partial: String::new() };
            }
            opened = provider.send_chat_stream_request(&self.config, &self.api_key, &self.request) => opened,
        };
        let mut delta_stream = match opened {
            Ok(stream) => stream,
            Err(error) => {
                log::error!("BG Task [{}]: Failed to initiate stream: {}", self.message_id, error);
                return StreamOutcome::Failed { partial: String::new(), error };
            }
        };

        let mut accumulated = String::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    log::warn!("BG Task [{}]: Cancelled, stopping stream.", self.message_id);
                    return StreamOutcome::Cancelled { partial: accumulated };
                }
                next = delta_stream.next() => next,
            };
            match next {
                Some(Ok(delta)) => {
                    if delta.is_empty() {
                        continue;
                    }
                    accumulated.push_str(&delta);
                    {
                        let mut store = self.state.store.lock().await;
                        if let Some(message) = store.message_mut(self.conversation_id, self.message_id) {
                            message.content.push_str(&delta);
                        }
                    }
                    self.state.events.delta(self.conversation_id, self.message_id, &delta);
                }
                Some(Err(error)) => {
                    log::error!("BG Task [{}]: Error receiving stream delta: {}", self.message_id, error);
                    return StreamOutcome::Failed { partial: accumulated, error };
                }
                None => break,
            }
        }

        if accumulated.is_empty() {
            StreamOutcome::Failed { partial: accumulated, error: ChatError::EmptyResponse }
        } else {
            StreamOutcome::Completed(accumulated)
        }
    }

    /// Runs once per generation, whatever the outcome.
    async fn finish(&self, outcome: &StreamOutcome) {
        {
            let mut store = self.state.store.lock().await;
            if let StreamOutcome::Failed { error, .. } = outcome {
                if let Some(conversation) = store.conversation_mut(self.conversation_id) {
                    conversation.messages.push(Message::error_notice(error));
                }
            }
            store.is_generating = false;
            store.cancel = None;
            persist(&self.state, &store).await;
        }
        self.state.events.generation_finished(self.conversation_id, outcome);
        log::info!("BG Task [{}]: Generation finished.", self.message_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiContent, DeltaStream, LLMApiProvider};
    use crate::models::Role;
    use crate::state::{ChatEvents, NoopEvents};
    use crate::storage::StorageManager;
    use async_trait::async_trait;
    use futures::stream;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex as StdMutex};

    /// Replays canned deltas, optionally hanging afterwards, and records requests.
    #[derive(Default)]
    struct ScriptedProvider {
        deltas: Vec<Result<String, ChatError>>,
        hang_after: bool,
        requests: StdMutex<Vec<ChatRequest>>,
    }

    #[async_trait]
    impl LLMApiProvider for ScriptedProvider {
        async fn send_chat_request(
            &self,
            _config: &ChatConfig,
            _api_key: &str,
            request: &ChatRequest,
        ) -> Result<String, ChatError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok("reply".to_string())
        }

        async fn send_chat_stream_request(
            &self,
            _config: &ChatConfig,
            _api_key: &str,
            request: &ChatRequest,
        ) -> Result<DeltaStream, ChatError> {
            self.requests.lock().unwrap().push(request.clone());
            let replay = stream::iter(self.deltas.clone());
            if self.hang_after {
                Ok(Box::pin(replay.chain(stream::pending())))
            } else {
                Ok(Box::pin(replay))
            }
        }
    }

    async fn app_with(provider: Arc<ScriptedProvider>, conversations: Vec<Conversation>) -> AppState {
        let storage = StorageManager::in_memory().await.unwrap();
        let config = ChatConfig {
            api_key: "sk-test".into(),
            ..ChatConfig::default()
        };
        AppState::new(storage, provider, Arc::new(NoopEvents), conversations, config)
    }

    fn deltas(parts: &[&str]) -> Vec<Result<String, ChatError>> {
        parts.iter().map(|p| Ok(p.to_string())).collect()
    }

    async fn type_and_send(state: &AppState, text: &str) -> SendOutcome {
        set_composer_text(state, text).await;
        send_message(state).await.unwrap()
    }

    async fn wait_for_reply_text(state: &AppState, text: &str) {
        loop {
            let conversation = active_conversation(state).await.unwrap();
            if conversation.messages.last().map(|m| m.content.as_str()) == Some(text) {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    async fn wait(outcome: SendOutcome) -> StreamOutcome {
        match outcome {
            SendOutcome::Started(handle) => handle.await.unwrap(),
            other => panic!("expected a started generation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn streamed_reply_fills_placeholder() {
        let provider = Arc::new(ScriptedProvider {
            deltas: deltas(&["Hel", "", "lo"]),
            ..Default::default()
        });
        let state = app_with(provider.clone(), vec![]).await;

        let outcome = wait(type_and_send(&state, "hi").await).await;
        assert_eq!(outcome, StreamOutcome::Completed("Hello".into()));

        let store = state.store.lock().await;
        let conversation = store.active().unwrap();
        assert_eq!(conversation.title, "hi");
        let texts: Vec<(Role, &str)> = conversation.messages.iter().map(|m| (m.role, m.content.as_str())).collect();
        assert_eq!(texts, vec![(Role::User, "hi"), (Role::Assistant, "Hello")]);
        assert!(!store.is_generating);
        assert!(store.cancel.is_none());
        assert!(store.composer.is_empty());

        let persisted = state.storage.load_conversations().await.unwrap();
        assert_eq!(persisted, store.conversations);
    }

    #[tokio::test]
    async fn empty_stream_appends_error_after_placeholder() {
        let provider = Arc::new(ScriptedProvider::default());
        let state = app_with(provider, vec![]).await;

        let outcome = wait(type_and_send(&state, "hi").await).await;
        assert!(matches!(outcome, StreamOutcome::Failed { error: ChatError::EmptyResponse, .. }));

        let conversation = active_conversation(&state).await.unwrap();
        assert_eq!(conversation.messages.len(), 3);
        assert_eq!(conversation.messages[1].content, "");
        assert!(conversation.messages[2].is_error);
        assert_eq!(conversation.messages[2].content, format!("Error: {}", ChatError::EmptyResponse));
    }

    #[tokio::test]
    async fn stream_error_keeps_partial_text() {
        let provider = Arc::new(ScriptedProvider {
            deltas: vec![Ok("partial".into()), Err(ChatError::Stream("overloaded".into()))],
            ..Default::default()
        });
        let state = app_with(provider, vec![]).await;

        wait(type_and_send(&state, "hi").await).await;
        let conversation = active_conversation(&state).await.unwrap();
        assert_eq!(conversation.messages[1].content, "partial");
        assert_eq!(conversation.messages[2].content, "Error: Stream error: overloaded");
    }

    #[tokio::test]
    async fn second_send_while_streaming_is_ignored() {
        let provider = Arc::new(ScriptedProvider {
            deltas: deltas(&["x"]),
            hang_after: true,
            ..Default::default()
        });
        let state = app_with(provider.clone(), vec![]).await;

        let first = type_and_send(&state, "first").await;
        wait_for_reply_text(&state, "x").await;
        let second = type_and_send(&state, "second").await;
        assert!(matches!(second, SendOutcome::Busy));
        assert!(matches!(regenerate(&state).await.unwrap(), SendOutcome::Busy));

        assert!(stop_generation(&state).await);
        wait(first).await;
        let conversation = active_conversation(&state).await.unwrap();
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(provider.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn abort_clears_flag_and_handle() {
        let provider = Arc::new(ScriptedProvider {
            deltas: deltas(&["Once upon"]),
            hang_after: true,
            ..Default::default()
        });
        let state = app_with(provider, vec![]).await;

        let started = type_and_send(&state, "tell a story").await;
        wait_for_reply_text(&state, "Once upon").await;
        assert!(state.store.lock().await.is_generating);
        stop_generation(&state).await;

        let outcome = wait(started).await;
        assert_eq!(outcome, StreamOutcome::Cancelled { partial: "Once upon".into() });
        let store = state.store.lock().await;
        assert!(!store.is_generating);
        assert!(store.cancel.is_none());
        assert_eq!(store.active().unwrap().messages.len(), 2);
        drop(store);
        assert!(!stop_generation(&state).await);
    }

    struct ClosedTerminal;

    impl ChatEvents for ClosedTerminal {
        fn delta(&self, _conversation_id: Uuid, _message_id: Uuid, _delta: &str) {
            panic!("failed printing to stdout: Broken pipe");
        }
    }

    #[tokio::test]
    async fn panicking_listener_still_releases_the_generation() {
        let provider = Arc::new(ScriptedProvider {
            deltas: deltas(&["Hel", "lo"]),
            ..Default::default()
        });
        let mut state = app_with(provider, vec![]).await;
        state.events = Arc::new(ClosedTerminal);

        let outcome = wait(type_and_send(&state, "hi").await).await;
        assert_eq!(
            outcome,
            StreamOutcome::Failed {
                partial: "Hel".into(),
                error: ChatError::Stream("the reply stopped unexpectedly".into()),
            }
        );
        {
            let store = state.store.lock().await;
            assert!(!store.is_generating);
            assert!(store.cancel.is_none());
            let texts: Vec<&str> = store.active().unwrap().messages.iter().map(|m| m.content.as_str()).collect();
            assert_eq!(texts, vec!["hi", "Hel", "Error: Stream error: the reply stopped unexpectedly"]);
        }

        state.events = Arc::new(NoopEvents);
        let outcome = wait(type_and_send(&state, "again").await).await;
        assert_eq!(outcome, StreamOutcome::Completed("Hello".into()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_commands_leave_storage_matching_memory() {
        let provider = Arc::new(ScriptedProvider {
            deltas: deltas(&["a", "b", "c"]),
            ..Default::default()
        });
        let state = app_with(provider, vec![]).await;
        let started = type_and_send(&state, "hi").await;
        let id = active_conversation(&state).await.unwrap().id;

        let renames: Vec<_> = (0..8)
            .map(|i| {
                let state = state.clone();
                tokio::spawn(async move { rename_conversation(&state, id, &format!("Title {}", i)).await })
            })
            .collect();
        for rename in renames {
            rename.await.unwrap().unwrap();
        }
        wait(started).await;

        let store = state.store.lock().await;
        assert_eq!(state.storage.load_conversations().await.unwrap(), store.conversations);
    }

    #[tokio::test]
    async fn regenerate_resends_last_user_message() {
        let mut conversation = Conversation::new();
        conversation.messages.push(Message::user("hi", vec![]));
        conversation.messages.push(Message::assistant("hello"));
        let provider = Arc::new(ScriptedProvider {
            deltas: deltas(&["hey"]),
            ..Default::default()
        });
        let state = app_with(provider.clone(), vec![conversation]).await;

        let outcome = wait(regenerate(&state).await.unwrap()).await;
        assert_eq!(outcome, StreamOutcome::Completed("hey".into()));

        let requests = provider.requests.lock().unwrap();
        let sent: Vec<(Role, ApiContent)> = requests[0]
            .messages
            .iter()
            .map(|m| (m.role, m.content.clone()))
            .collect();
        assert_eq!(sent[1..].to_vec(), vec![(Role::User, ApiContent::Text("hi".into()))]);
        assert_eq!(sent[0].0, Role::System);

        let conversation = active_conversation(&state).await.unwrap();
        let texts: Vec<&str> = conversation.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(texts, vec!["hi", "hey"]);
    }

    #[tokio::test]
    async fn regenerate_without_user_message_fails() {
        let mut conversation = Conversation::new();
        conversation.messages.push(Message::assistant("welcome"));
        let state = app_with(Arc::new(ScriptedProvider::default()), vec![conversation]).await;
        assert!(matches!(regenerate(&state).await, Err(ChatError::NothingToRegenerate)));
    }

    #[tokio::test]
    async fn missing_model_blocks_send_and_keeps_composer() {
        let state = app_with(Arc::new(ScriptedProvider::default()), vec![]).await;
        update_config(&state, |c| c.model = String::new()).await;
        set_composer_text(&state, "hi").await;

        assert!(matches!(send_message(&state).await, Err(ChatError::MissingConfig("model"))));
        let store = state.store.lock().await;
        assert_eq!(store.composer.text, "hi");
        assert!(store.conversations.is_empty());
    }

    #[tokio::test]
    async fn empty_composer_is_not_sent() {
        let provider = Arc::new(ScriptedProvider::default());
        let state = app_with(provider.clone(), vec![]).await;
        set_composer_text(&state, "   ").await;
        assert!(matches!(send_message(&state).await.unwrap(), SendOutcome::EmptyComposer));
        assert!(provider.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn persona_addendum_reaches_system_message() {
        let provider = Arc::new(ScriptedProvider {
            deltas: deltas(&["ok"]),
            ..Default::default()
        });
        let state = app_with(provider.clone(), vec![]).await;
        set_persona(&state, Persona::Qwen).await;
        set_persona_addendum(&state, "Be brief. ").await;

        wait(type_and_send(&state, "hi").await).await;
        let requests = provider.requests.lock().unwrap();
        assert_eq!(
            requests[0].messages[0].content,
            ApiContent::Text(format!("{}\n\nBe brief.", crate::persona::QWEN_INSTRUCTIONS))
        );
    }

    #[tokio::test]
    async fn import_rejects_files_without_messages() {
        let state = app_with(Arc::new(ScriptedProvider::default()), vec![]).await;
        let result = import_conversation(&state, r#"{"title":"T"}"#, "t.json").await;
        assert!(matches!(result, Err(ChatError::ImportFormat(_))));
        assert!(list_conversations(&state).await.0.is_empty());
    }

    #[tokio::test]
    async fn export_import_round_trip_activates_copy() {
        let mut conversation = Conversation::new();
        conversation.title = "Original".into();
        conversation.messages.push(Message::user("hi", vec![]));
        conversation.messages.push(Message::assistant("hello"));
        let state = app_with(Arc::new(ScriptedProvider::default()), vec![conversation.clone()]).await;

        let (file_name, json) = export_active(&state).await.unwrap();
        assert_eq!(file_name, "Original.json");
        let id = import_conversation(&state, &json, &file_name).await.unwrap();

        let (conversations, active) = list_conversations(&state).await;
        assert_eq!(conversations.len(), 2);
        assert_eq!(active, Some(id));
        let imported = active_conversation(&state).await.unwrap();
        assert_eq!(imported.title, conversation.title);
        assert_eq!(imported.messages, conversation.messages);
    }
}
