/// Administrative operation parsed from a chat message addressed to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add { url: Option<String> },
    Remove { url: Option<String> },
    Check { url: Option<String> },
    List,
    Help,
    Unknown(String),
}

impl Command {
    /// Parse a message into a command. Returns `None` when the message is
    /// not addressed to the bot (does not start with its mention). A bare
    /// mention with no command word asks for help.
    pub fn parse(mention: &str, content: &str) -> Option<Command> {
        let rest = content.strip_prefix(mention)?.trim();

        let mut words = rest.split_whitespace();
        let Some(word) = words.next() else {
            return Some(Command::Help);
        };
        let url = words.next().map(str::to_owned);

        let command = match word.to_lowercase().as_str() {
            "add" => Command::Add { url },
            "remove" => Command::Remove { url },
            "check" => Command::Check { url },
            "list" => Command::List,
            "help" => Command::Help,
            other => Command::Unknown(other.to_string()),
        };
        Some(command)
    }
}
