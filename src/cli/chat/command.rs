/// A line typed into the chat, after slash-command parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Status,
    Reset,
    Flush,
    Quit,
    /// Record an assistant reply; never triggers a batch.
    Assistant(String),
    /// Plain text, sent as a user message.
    User(String),
    /// A slash command that could not be run, with the reason.
    Invalid(String),
}

impl Command {
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if !input.starts_with('/') {
            return Command::User(input.to_string());
        }

        let (name, rest) = match input.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (input, ""),
        };

        match name {
            "/help" => Command::Help,
            "/status" => Command::Status,
            "/reset" => Command::Reset,
            "/flush" => Command::Flush,
            "/quit" => Command::Quit,
            "/assistant" if rest.is_empty() => Command::Invalid("Usage: /assistant {text}".to_string()),
            "/assistant" => Command::Assistant(rest.to_string()),
            other => Command::Invalid(format!("Unknown command: {} (try /help)", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_user_message() {
        assert_eq!(Command::parse("  hello there "), Command::User("hello there".to_string()));
    }

    #[test]
    fn parses_assistant_reply() {
        assert_eq!(
            Command::parse("/assistant Sure, here you go"),
            Command::Assistant("Sure, here you go".to_string())
        );
    }

    #[test]
    fn bare_assistant_is_rejected() {
        assert!(matches!(Command::parse("/assistant"), Command::Invalid(_)));
        assert!(matches!(Command::parse("/assistant   "), Command::Invalid(_)));
    }

    #[test]
    fn control_commands_never_become_messages() {
        assert_eq!(Command::parse("/quit"), Command::Quit);
        assert_eq!(Command::parse("/flush"), Command::Flush);
        assert_eq!(Command::parse("/status"), Command::Status);
        assert_eq!(Command::parse("/reset"), Command::Reset);
        assert_eq!(Command::parse("/help"), Command::Help);
        assert!(matches!(Command::parse("/bogus"), Command::Invalid(_)));
    }
}
