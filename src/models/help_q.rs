use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Help desk request (collection: help_q). Never deduplicated.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, utoipa::ToSchema)]
pub struct HelpQ {
    pub id: Uuid,
    pub technology: String,
    pub language: String,
    pub location: String,
    pub description: String,
    /// Chat transcript, oldest first
    #[serde(default)]
    pub chats: Vec<ChatItem>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, utoipa::ToSchema)]
pub struct ChatItem {
    pub author: String,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

impl HelpQ {
    pub fn new(technology: &str, language: &str, location: &str, description: &str) -> Self {
        HelpQ {
            id: Uuid::new_v4(),
            technology: technology.to_string(),
            language: language.to_string(),
            location: location.to_string(),
            description: description.to_string(),
            chats: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn push_chat_item(&mut self, author: &str, message: &str) {
        self.chats.push(ChatItem {
            author: author.to_string(),
            message: message.to_string(),
            sent_at: Utc::now(),
        });
    }
}
