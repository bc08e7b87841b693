//! Conversation context. Turns the browser's chat history plus the session's
//! resume into the ordered message list sent to the inference endpoint.

use serde::{Deserialize, Serialize};

use crate::chat::prompts::render_resume_prompt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat-completion message. Serializes to `{"role": "...", "content": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// One exchange from the transcript kept by the browser.
/// Either side may be missing (e.g. a turn whose answer never arrived).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub assistant: Option<String>,
}

/// Builds the request message list.
///
/// Order: the system message, then each history turn (user then assistant,
/// skipping empty slots), then `user_message` prefixed with the resume text.
/// No token budgeting happens here; `max_tokens` travels separately.
pub fn build_messages(
    system_prompt: &str,
    history: &[ConversationTurn],
    resume_text: &str,
    user_message: &str,
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(2 + history.len() * 2);
    messages.push(Message::new(Role::System, system_prompt));

    for turn in history {
        if let Some(user) = non_empty(&turn.user) {
            messages.push(Message::new(Role::User, user));
        }
        if let Some(assistant) = non_empty(&turn.assistant) {
            messages.push(Message::new(Role::Assistant, assistant));
        }
    }

    messages.push(Message::new(
        Role::User,
        render_resume_prompt(resume_text, user_message),
    ));
    messages
}

fn non_empty(slot: &Option<String>) -> Option<&str> {
    slot.as_deref().filter(|s| !s.is_empty())
}
