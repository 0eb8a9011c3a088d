use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::ChatError;
use crate::history::ConversationStore;
use crate::models::chat::{ ChatMessage, Conversation, ConversationSummary };

/// Process-local store. Every operation takes the lock once, so single
/// appends never interleave, but two turns on one id may.
#[derive(Default)]
pub struct MemoryConversationStore {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn get(&self, conversation_id: &str) -> Option<Conversation> {
        self.conversations.read().await.get(conversation_id).cloned()
    }

    async fn list(&self) -> Vec<ConversationSummary> {
        let guard = self.conversations.read().await;
        let mut summaries: Vec<ConversationSummary> = guard
            .values()
            .map(Conversation::summary)
            .collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        summaries
    }

    async fn upsert_append(
        &self,
        conversation_id: Option<&str>,
        message: ChatMessage
    ) -> Conversation {
        let mut guard = self.conversations.write().await;
        let id = match conversation_id {
            Some(id) if guard.contains_key(id) => id.to_string(),
            _ => {
                let id = Uuid::new_v4().to_string();
                debug!("Creating conversation {}", id);
                guard.insert(id.clone(), Conversation::new(id.clone()));
                id
            }
        };

        let conversation = guard.entry(id.clone()).or_insert_with(|| Conversation::new(id));
        conversation.push(message);
        conversation.clone()
    }

    async fn append(
        &self,
        conversation_id: &str,
        message: ChatMessage
    ) -> Result<Conversation, ChatError> {
        let mut guard = self.conversations.write().await;
        let conversation = guard.get_mut(conversation_id).ok_or(ChatError::NotFound)?;
        conversation.push(message);
        Ok(conversation.clone())
    }

    async fn delete(&self, conversation_id: &str) -> bool {
        self.conversations.write().await.remove(conversation_id).is_some()
    }
}
