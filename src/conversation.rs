use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::translation::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Chat history for one page of one session.
///
/// Messages are only ever appended; the only way to drop them is
/// [`Conversation::reset`]. Consecutive messages with the same role are
/// allowed.
#[derive(Debug, Clone)]
pub struct Conversation {
    welcome: String,
    messages: Vec<Message>,
    // Translated assistant text keyed by message index.
    translations: HashMap<(usize, Language), String>,
}

impl Conversation {
    /// Starts a conversation holding only the page's welcome message.
    pub fn with_welcome(welcome: &str) -> Self {
        Self {
            welcome: welcome.to_string(),
            messages: vec![Message::assistant(welcome)],
            translations: HashMap::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Message::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Message::assistant(content));
    }

    /// Back to the welcome message only.
    pub fn reset(&mut self) {
        self.messages = vec![Message::assistant(&self.welcome)];
        self.translations.clear();
    }

    pub fn cached_translation(
        &self,
        index: usize,
        language: Language,
    ) -> Option<&str> {
        self.translations.get(&(index, language)).map(String::as_str)
    }

    pub fn cache_translation(
        &mut self,
        index: usize,
        language: Language,
        text: String,
    ) {
        self.translations.insert((index, language), text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_welcome_from_assistant() {
        let conversation = Conversation::with_welcome("Welcome!");
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.messages()[0].role, Role::Assistant);
        assert_eq!(conversation.messages()[0].content, "Welcome!");
    }

    #[test]
    fn consecutive_user_messages_are_kept() {
        let mut conversation = Conversation::with_welcome("Welcome!");
        conversation.push_user("first");
        conversation.push_user("second");
        let roles: Vec<Role> =
            conversation.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::Assistant, Role::User, Role::User]);
    }

    #[test]
    fn reset_drops_history_and_translations() {
        let mut conversation = Conversation::with_welcome("Welcome!");
        conversation.push_user("question");
        conversation.push_assistant("answer");
        conversation.cache_translation(2, Language::Hindi, "उत्तर".to_string());

        conversation.reset();

        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.messages()[0].content, "Welcome!");
        assert!(conversation.cached_translation(2, Language::Hindi).is_none());
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::user("hi")).unwrap();
        assert!(json.contains("\"role\":\"user\""));
    }
}
