//! Conversation state shared by the TUI and the one-shot CLI commands.

use crate::api::Grant;

/// Who wrote a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Bot,
}

/// How a bot message's text is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageFormat {
    #[default]
    Plain,
    /// `**bold**` spans and explicit line breaks are honored
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
    pub format: MessageFormat,
    pub grants: Vec<Grant>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            format: MessageFormat::Plain,
            grants: Vec::new(),
        }
    }

    pub fn bot(text: impl Into<String>, format: MessageFormat, grants: Vec<Grant>) -> Self {
        Self {
            sender: Sender::Bot,
            text: text.into(),
            format,
            grants,
        }
    }
}

/// Append-only list of messages backing the visible conversation.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn has_user_message(&self) -> bool {
        self.messages.iter().any(|m| m.sender == Sender::User)
    }

    /// Grants across all bot messages, in display order
    pub fn grants(&self) -> impl Iterator<Item = &Grant> {
        self.messages.iter().flat_map(|m| m.grants.iter())
    }
}
