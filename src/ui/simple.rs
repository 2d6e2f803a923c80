use super::render::render_message;
use super::Terminal;
use crate::api::LLMApiProvider;
use crate::config;
use crate::persona::Persona;
use crate::simple::SimpleChat;
use crate::storage::StorageManager;

const HELP: &str = "\
Type a message and press Enter. Commands:
  /test            check the connection
  /persona NAME    Default, Claude, ChatGPT or Qwen
  /addendum TEXT   extra persona instructions (empty to clear)
  /clear           forget this conversation
  /setup           change key, URL or model
  /quit";

pub async fn run(
    storage: &StorageManager,
    provider: &dyn LLMApiProvider,
    terminal: &mut Terminal,
) -> anyhow::Result<()> {
    let mut chat = SimpleChat::new(storage.load_config().await?);
    if !setup(&mut chat, storage, terminal).await? {
        return Ok(());
    }
    println!("{}", HELP);

    loop {
        let Some(line) = terminal.prompt("you: ").await? else {
            return Ok(());
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };
        match command {
            "/quit" | "/exit" => return Ok(()),
            "/help" => println!("{}", HELP),
            "/test" => test_connection(&chat, provider).await,
            "/clear" => {
                chat.clear();
                println!("Conversation cleared.");
            }
            "/setup" => {
                if !setup(&mut chat, storage, terminal).await? {
                    return Ok(());
                }
            }
            "/persona" => match arg.parse::<Persona>() {
                Ok(persona) => {
                    chat.persona = persona;
                    println!("Persona: {}", persona);
                }
                Err(message) => println!("{}", message),
            },
            "/addendum" => chat.persona_addendum = arg.to_string(),
            _ => {
                let sent = chat.send(provider, line).await.map(|_| ());
                match sent {
                    Ok(()) => {
                        if let Some(reply) = chat.messages.last() {
                            println!("{}", render_message(chat.messages.len(), reply));
                        }
                    }
                    Err(e) => println!("!! {}", e),
                }
            }
        }
    }
}

/// Walks through the connection fields. Returns false at end of input.
async fn setup(chat: &mut SimpleChat, storage: &StorageManager, terminal: &mut Terminal) -> anyhow::Result<bool> {
    println!("Connection setup. Press Enter to keep the current value.");
    println!("The key may be literal, env:NAME, or keyring.");
    let Some(api_key) = terminal.prompt_with_default("API key", &config::display_api_key(&chat.config)).await? else {
        return Ok(false);
    };
    // The masked value coming back means the key was kept.
    if api_key != config::display_api_key(&chat.config) {
        chat.config.api_key = api_key;
    }
    let Some(base_url) = terminal.prompt_with_default("Base URL", &chat.config.base_url).await? else {
        return Ok(false);
    };
    chat.config.base_url = base_url;
    let Some(model) = terminal.prompt_with_default("Model", &chat.config.model).await? else {
        return Ok(false);
    };
    chat.config.model = model;

    storage.persist_config(&chat.config).await;
    if let Err(e) = config::checked_api_key(&chat.config) {
        println!("!! {}", e);
    }
    Ok(true)
}

async fn test_connection(chat: &SimpleChat, provider: &dyn LLMApiProvider) {
    println!("Testing connection...");
    match chat.test_connection(provider).await {
        Ok(check) if check.phrase_matched => println!("Connected."),
        Ok(check) => println!("Connected, but the model replied: {}", check.reply),
        Err(e) => println!("Connection failed: {}", e),
    }
}
