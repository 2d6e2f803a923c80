//! Terminal front end: the landing selector and the two screens.

pub mod pro;
pub mod render;
pub mod simple;

use anyhow::Context;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Simple,
    Pro,
}

/// Line-oriented stdin reader.
pub struct Terminal {
    lines: Lines<BufReader<Stdin>>,
}

impl Terminal {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Prints `label` and reads one line. `None` at end of input.
    pub async fn prompt(&mut self, label: &str) -> anyhow::Result<Option<String>> {
        print!("{}", label);
        std::io::stdout().flush().context("Failed to flush stdout")?;
        self.lines.next_line().await.context("Failed to read from stdin")
    }

    /// Like `prompt`, but an empty answer keeps `current`.
    pub async fn prompt_with_default(&mut self, label: &str, current: &str) -> anyhow::Result<Option<String>> {
        let answer = self.prompt(&format!("{} [{}]: ", label, current)).await?;
        Ok(answer.map(|a| {
            let a = a.trim();
            if a.is_empty() { current.to_string() } else { a.to_string() }
        }))
    }
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

/// Asks which screen to open. `None` when the user quits.
pub async fn choose_screen(terminal: &mut Terminal) -> anyhow::Result<Option<Screen>> {
    println!("routerchat");
    println!("  1) Simple  - set up a connection, then chat");
    println!("  2) Pro     - multiple chats, attachments, personas, streaming");
    loop {
        let Some(answer) = terminal.prompt("Choose a screen [1/2, q to quit]: ").await? else {
            return Ok(None);
        };
        match parse_screen(&answer) {
            Some(screen) => return Ok(Some(screen)),
            None if answer.trim().eq_ignore_ascii_case("q") => return Ok(None),
            None => println!("Please enter 1 or 2."),
        }
    }
}

pub fn parse_screen(answer: &str) -> Option<Screen> {
    match answer.trim().to_lowercase().as_str() {
        "1" | "simple" => Some(Screen::Simple),
        "2" | "pro" => Some(Screen::Pro),
        _ => None,
    }
}
