use super::render::{render_conversation, render_conversation_list, render_message, render_settings};
use super::Terminal;
use crate::commands::{self, SendOutcome};
use crate::config;
use crate::error::ChatError;
use crate::models::ChatConfig;
use crate::persona::Persona;
use crate::state::{AppState, ChatEvents, SlashOutcome, StreamOutcome};
use anyhow::Context;
use std::io::Write;
use std::path::Path;
use tokio::task::JoinHandle;
use uuid::Uuid;

const HELP: &str = "\
Type a message and press Enter to send it. An empty line sends the composer.
  /new                 start a new chat
  /chats               list chats          /open N     switch to chat N
  /delete [N]          delete chat N (default: current)
  /rename TITLE        rename the current chat
  /show                print the current chat
  /edit N              move message N back into the composer and drop it and what follows
  /rm N                delete message N    /copy N     print message N as raw text
  /regen               regenerate the last reply
  /attach PATH         attach a file       /detach     drop pending attachments
  /export [PATH]       save the current chat as JSON
  /import PATH         load a chat from JSON
  /persona NAME        Default, Claude, ChatGPT or Qwen
  /addendum TEXT       extra persona instructions (empty to clear)
  /set FIELD VALUE     key, url, model, temperature, max_tokens
  /keyring KEY         store the API key in the OS keyring
  /clear /settings     clear the chat, show settings
  /explain /summarize /translate /code /fix   canned prompts
  /quit
Press Ctrl-C while a reply is streaming to stop it.";

/// Prints streamed text as it arrives.
pub struct TerminalEvents;

impl ChatEvents for TerminalEvents {
    fn generation_started(&self, _conversation_id: Uuid, _message_id: Uuid) {
        print!("assistant: ");
        let _ = std::io::stdout().flush();
    }

    fn delta(&self, _conversation_id: Uuid, _message_id: Uuid, delta: &str) {
        print!("{}", delta);
        let _ = std::io::stdout().flush();
    }
}

pub async fn run(state: AppState, terminal: &mut Terminal) -> anyhow::Result<()> {
    println!("Pro chat. Type /help for commands.");
    if let Some(conversation) = commands::active_conversation(&state).await {
        println!("{}", render_conversation(&conversation));
    }

    loop {
        let Some(line) = terminal.prompt("> ").await? else {
            return Ok(());
        };
        let line = line.trim_end();
        match handle_line(&state, line).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => return Ok(()),
            Err(e) if e.is_blocking() => println!("!! {}", e),
            Err(e) => println!("{}", e),
        }
    }
}

enum Flow {
    Continue,
    Quit,
}

async fn handle_line(state: &AppState, line: &str) -> Result<Flow, ChatError> {
    if line.trim().is_empty() {
        send(state).await?;
        return Ok(Flow::Continue);
    }

    let (command, arg) = match line.trim().split_once(char::is_whitespace) {
        Some((command, arg)) => (command, arg.trim()),
        None => (line.trim(), ""),
    };
    match command {
        "/help" => println!("{}", HELP),
        "/quit" | "/exit" => return Ok(Flow::Quit),
        "/new" => {
            commands::create_conversation(state).await;
            println!("Started a new chat.");
        }
        "/chats" => {
            let (conversations, active) = commands::list_conversations(state).await;
            println!("{}", render_conversation_list(&conversations, active));
        }
        "/open" => {
            let id = conversation_at(state, arg).await?;
            commands::select_conversation(state, id).await?;
            show_active(state).await;
        }
        "/delete" => {
            let id = if arg.is_empty() {
                active_id(state).await?
            } else {
                conversation_at(state, arg).await?
            };
            commands::delete_conversation(state, id).await?;
            println!("Chat deleted.");
        }
        "/rename" => {
            let id = active_id(state).await?;
            commands::rename_conversation(state, id, arg).await?;
        }
        "/show" => show_active(state).await,
        "/edit" => {
            let id = message_at(state, arg).await?;
            commands::edit_message(state, id).await?;
            let composer = state.store.lock().await.composer.clone();
            println!("Composer: {}", composer.text);
            println!("Press Enter to resend, or type a replacement.");
        }
        "/rm" => {
            let id = message_at(state, arg).await?;
            commands::delete_message(state, id).await?;
        }
        "/copy" => {
            let id = message_at(state, arg).await?;
            println!("{}", commands::copy_message(state, id).await?);
        }
        "/regen" => {
            let outcome = commands::regenerate(state).await?;
            await_outcome(state, outcome).await;
        }
        "/attach" => {
            let attachment = commands::attach_file(state, Path::new(arg)).await?;
            println!("Attached {} ({:?}).", attachment.name, attachment.kind);
        }
        "/detach" => commands::clear_attachments(state).await,
        "/export" => {
            let (file_name, json) = commands::export_active(state).await?;
            let path = if arg.is_empty() { file_name } else { arg.to_string() };
            tokio::fs::write(&path, json)
                .await
                .map_err(|e| ChatError::Export(format!("Failed to write {}: {}", path, e)))?;
            println!("Exported to {}.", path);
        }
        "/import" => {
            let contents = tokio::fs::read_to_string(arg)
                .await
                .map_err(|e| ChatError::ImportFormat(format!("Failed to read {}: {}", arg, e)))?;
            commands::import_conversation(state, &contents, arg).await?;
            show_active(state).await;
        }
        "/persona" => match arg.parse::<Persona>() {
            Ok(persona) => {
                commands::set_persona(state, persona).await;
                println!("Persona: {}", persona);
            }
            Err(message) => println!("{}", message),
        },
        "/addendum" => commands::set_persona_addendum(state, arg).await,
        "/set" => set_field(state, arg).await?,
        "/keyring" => {
            let mut config = commands::get_settings(state).await.config;
            config::store_api_key_in_keyring(&mut config, arg)?;
            commands::update_config(state, |c| c.api_key = config.api_key).await;
            println!("API key stored in the keyring.");
        }
        _ => match commands::apply_slash_command(state, line).await {
            SlashOutcome::Cleared => println!("Chat cleared."),
            SlashOutcome::ShowSettings => println!("{}", render_settings(&commands::get_settings(state).await)),
            SlashOutcome::Prompt(text) => {
                println!("Composer: {}", text);
                println!("Press Enter to send, or type a replacement.");
            }
            SlashOutcome::Literal => {
                commands::set_composer_text(state, line).await;
                send(state).await?;
            }
        },
    }
    Ok(Flow::Continue)
}

async fn send(state: &AppState) -> Result<(), ChatError> {
    let outcome = commands::send_message(state).await?;
    await_outcome(state, outcome).await;
    Ok(())
}

async fn await_outcome(state: &AppState, outcome: SendOutcome) {
    match outcome {
        SendOutcome::Started(handle) => match await_generation(state, handle).await {
            Ok(StreamOutcome::Completed(_)) => println!(),
            Ok(StreamOutcome::Cancelled { .. }) => println!("\n(stopped)"),
            Ok(StreamOutcome::Failed { error, .. }) => println!("\nError: {}", error),
            Err(e) => log::error!("Generation task failed: {:?}", e),
        },
        SendOutcome::Busy => println!("A reply is still being generated."),
        SendOutcome::EmptyComposer => {}
    }
}

/// Waits for the background task, turning Ctrl-C into a stop request.
async fn await_generation(
    state: &AppState,
    mut handle: JoinHandle<StreamOutcome>,
) -> anyhow::Result<StreamOutcome> {
    loop {
        tokio::select! {
            joined = &mut handle => return joined.context("Generation task panicked"),
            _ = tokio::signal::ctrl_c() => {
                commands::stop_generation(state).await;
            }
        }
    }
}

async fn show_active(state: &AppState) {
    match commands::active_conversation(state).await {
        Some(conversation) => println!("{}", render_conversation(&conversation)),
        None => println!("(no active chat)"),
    }
}

async fn active_id(state: &AppState) -> Result<Uuid, ChatError> {
    commands::active_conversation(state)
        .await
        .map(|c| c.id)
        .ok_or(ChatError::NoActiveConversation)
}

fn parse_number(arg: &str) -> Result<usize, ChatError> {
    arg.trim()
        .parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or(ChatError::NotFound("Number"))
}

async fn conversation_at(state: &AppState, arg: &str) -> Result<Uuid, ChatError> {
    let number = parse_number(arg)?;
    let (conversations, _) = commands::list_conversations(state).await;
    conversations
        .get(number - 1)
        .map(|c| c.id)
        .ok_or(ChatError::NotFound("Conversation"))
}

async fn message_at(state: &AppState, arg: &str) -> Result<Uuid, ChatError> {
    let number = parse_number(arg)?;
    let conversation = commands::active_conversation(state)
        .await
        .ok_or(ChatError::NoActiveConversation)?;
    conversation
        .messages
        .get(number - 1)
        .map(|m| {
            println!("{}", render_message(number, m));
            m.id
        })
        .ok_or(ChatError::NotFound("Message"))
}

async fn set_field(state: &AppState, arg: &str) -> Result<(), ChatError> {
    let (field, value) = arg
        .split_once(char::is_whitespace)
        .map(|(f, v)| (f, v.trim()))
        .unwrap_or((arg, ""));
    let change = parse_setting(field, value)?;
    let config = commands::update_config(state, change).await;
    println!("{} = {}", field, setting_value(&config, field));
    Ok(())
}

type SettingChange = Box<dyn FnOnce(&mut ChatConfig) + Send>;

/// Validates a `/set` command into a config change.
pub fn parse_setting(field: &str, value: &str) -> Result<SettingChange, ChatError> {
    let value = value.to_string();
    match field {
        "key" => Ok(Box::new(move |c| c.api_key = value)),
        "url" => Ok(Box::new(move |c| c.base_url = value)),
        "model" => Ok(Box::new(move |c| c.model = value)),
        "temperature" => {
            let t: f32 = value
                .parse()
                .ok()
                .filter(|t: &f32| (0.0..=2.0).contains(t))
                .ok_or_else(|| invalid(field, &value, "a number between 0 and 2"))?;
            Ok(Box::new(move |c| c.temperature = t))
        }
        "max_tokens" => {
            let n: u32 = value
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| invalid(field, &value, "a positive whole number"))?;
            Ok(Box::new(move |c| c.max_tokens = n))
        }
        _ => Err(ChatError::InvalidSetting(format!(
            "unknown field '{}', expected key, url, model, temperature or max_tokens",
            field
        ))),
    }
}

fn invalid(field: &str, value: &str, expected: &str) -> ChatError {
    ChatError::InvalidSetting(format!("{} must be {}, got '{}'", field, expected, value))
}

fn setting_value(config: &ChatConfig, field: &str) -> String {
    match field {
        "key" => config::display_api_key(config),
        "url" => config.base_url.clone(),
        "model" => config.model.clone(),
        "temperature" => config.temperature.to_string(),
        "max_tokens" => config.max_tokens.to_string(),
        _ => String::new(),
    }
}
