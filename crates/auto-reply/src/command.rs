/// Marker that turns a chat message into a completion request. Matched
/// case-insensitively after trimming.
pub const COMMAND_PREFIX: &str = "!chatgpt";

pub const USAGE_HINT: &str = "Please provide a question or prompt after !chatgpt";
pub const PROCESSING_NOTICE: &str = "⏳ Processing your request, please wait...";
pub const APOLOGY: &str =
    "Sorry, I encountered an error while processing your request. Please try again later.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// The prefix with nothing after it.
    Empty,
    /// The text after the prefix, trimmed, original case kept.
    Prompt(String),
}

/// Recognize a `!chatgpt` command in a message body.
///
/// Returns `None` for ordinary chat. Only the prefix is case-folded; the
/// prompt keeps its case.
#[must_use]
pub fn parse_command(body: &str) -> Option<Command> {
    let body = body.trim();
    let head = body.get(..COMMAND_PREFIX.len())?;
    if !head.eq_ignore_ascii_case(COMMAND_PREFIX) {
        return None;
    }
    let rest = body[COMMAND_PREFIX.len()..].trim();
    Some(if rest.is_empty() {
        Command::Empty
    } else {
        Command::Prompt(rest.to_string())
    })
}
