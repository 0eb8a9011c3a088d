mod memory;

use async_trait::async_trait;
use log::info;
use std::error::Error;
use std::sync::Arc;

use crate::cli::Args;
use crate::error::ChatError;
use crate::models::chat::{ ChatMessage, Conversation, ConversationSummary };

pub use memory::MemoryConversationStore;

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(&self, conversation_id: &str) -> Option<Conversation>;

    async fn list(&self) -> Vec<ConversationSummary>;

    /// Appends to `conversation_id`, or to a new conversation with a fresh id
    /// when the id is absent or unknown.
    async fn upsert_append(
        &self,
        conversation_id: Option<&str>,
        message: ChatMessage
    ) -> Conversation;

    /// Appends to an existing conversation only.
    async fn append(
        &self,
        conversation_id: &str,
        message: ChatMessage
    ) -> Result<Conversation, ChatError>;

    async fn delete(&self, conversation_id: &str) -> bool;
}

pub fn create_conversation_store(
    args: &Args
) -> Result<Arc<dyn ConversationStore>, Box<dyn Error + Send + Sync>> {
    match args.history_type.to_lowercase().as_str() {
        "memory" => Ok(Arc::new(MemoryConversationStore::new())),
        _ => Err(format!("Unsupported history store type: {}", args.history_type).into()),
    }
}

pub fn initialize_conversation_store(
    args: &Args
) -> Result<Arc<dyn ConversationStore>, Box<dyn Error + Send + Sync>> {
    info!("Conversations will be held in: {} (lost on restart)", args.history_type);
    create_conversation_store(args)
}
