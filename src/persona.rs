//! Fixed instruction blocks sent as the system message of every request.

use std::fmt;
use std::str::FromStr;

pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful AI assistant. Answer clearly and accurately, and use Markdown formatting where it improves readability.";

pub const CLAUDE_INSTRUCTIONS: &str = r#"You are a thoughtful, careful assistant in the style of Claude.

- Think through the question before answering and be honest about uncertainty.
- Prefer well-structured prose; use headings and lists only when they help.
- Be direct and warm, and avoid filler or flattery.
- When writing code, explain the key decisions briefly after the code."#;

pub const CHATGPT_INSTRUCTIONS: &str = r#"You are a friendly, versatile assistant in the style of ChatGPT.

- Give clear, practical answers with concrete examples.
- Use Markdown: short paragraphs, bullet points and fenced code blocks.
- Offer a brief summary at the end of long answers.
- Ask a clarifying question when the request is ambiguous."#;

pub const QWEN_INSTRUCTIONS: &str = r#"You are a precise, efficient assistant in the style of Qwen.

- Answer concisely and get straight to the point.
- Show step-by-step reasoning for math, logic and coding tasks.
- Use tables or numbered steps when comparing options or describing procedures.
- Reply in the language the user writes in."#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Persona {
    #[default]
    Default,
    Claude,
    ChatGpt,
    Qwen,
}

impl Persona {
    pub const ALL: [Persona; 4] = [Persona::Default, Persona::Claude, Persona::ChatGpt, Persona::Qwen];

    pub fn name(&self) -> &'static str {
        match self {
            Persona::Default => "Default",
            Persona::Claude => "Claude-style",
            Persona::ChatGpt => "ChatGPT-style",
            Persona::Qwen => "Qwen-style",
        }
    }

    pub fn instructions(&self) -> &'static str {
        match self {
            Persona::Default => DEFAULT_INSTRUCTIONS,
            Persona::Claude => CLAUDE_INSTRUCTIONS,
            Persona::ChatGpt => CHATGPT_INSTRUCTIONS,
            Persona::Qwen => QWEN_INSTRUCTIONS,
        }
    }

    /// Persona text, followed by a blank line and the trimmed addendum when
    /// the addendum is not blank.
    pub fn system_prompt(&self, addendum: &str) -> String {
        let addendum = addendum.trim();
        if addendum.is_empty() {
            self.instructions().to_string()
        } else {
            format!("{}\n\n{}", self.instructions(), addendum)
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Persona {
    type Err = String;

    /// Accepts the display name or its first word, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Persona::ALL
            .into_iter()
            .find(|p| {
                let name = p.name().to_lowercase();
                name == wanted || name.split('-').next() == Some(wanted.as_str())
            })
            .ok_or_else(|| {
                let names: Vec<&str> = Persona::ALL.iter().map(|p| p.name()).collect();
                format!("Unknown persona '{}'. Choose one of: {}", s.trim(), names.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addendum_is_trimmed_and_separated_by_blank_line() {
        assert_eq!(Persona::Qwen.system_prompt("   "), QWEN_INSTRUCTIONS);
        assert_eq!(
            Persona::Default.system_prompt("  Answer in French.\n"),
            format!("{}\n\nAnswer in French.", DEFAULT_INSTRUCTIONS)
        );
    }

    #[test]
    fn parses_names_and_short_forms() {
        assert_eq!("claude".parse::<Persona>(), Ok(Persona::Claude));
        assert_eq!("ChatGPT-style".parse::<Persona>(), Ok(Persona::ChatGpt));
        assert_eq!(" default ".parse::<Persona>(), Ok(Persona::Default));
        assert!("gemini".parse::<Persona>().is_err());
    }
}
