use crate::cli::Args;
use crate::config::prompt::{ self, PromptConfig, PromptError };
use crate::error::ChatError;
use crate::history::{ initialize_conversation_store, ConversationStore };
use crate::llm::LlmConfig;
use crate::llm::chat::{ new_client as new_chat_client, ChatClient, CompletionRequest, PromptMessage };
use crate::models::chat::{ ChatMessage, Conversation, ConversationSummary };

use futures::future::join_all;
use log::{ info, warn, error };
use std::error::Error;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Result of a successful turn.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub message: ChatMessage,
    pub conversation_id: String,
}

/// Runs chat turns: stores the user's message, asks the model, stores the reply.
pub struct ChatAgent {
    chat_client: Arc<dyn ChatClient>,
    store: Arc<dyn ConversationStore>,
    prompt_config: RwLock<Arc<PromptConfig>>,
    prompts_path: Option<String>,
}

impl ChatAgent {
    pub async fn new(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let chat_config = LlmConfig::from_args(args)?;
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Type={}, Model={}, BaseURL={}",
            chat_config.llm_type,
            chat_client.get_model(),
            chat_client.get_base_url().as_deref().unwrap_or("adapter default")
        );

        let store = initialize_conversation_store(args)?;
        let prompt_config = match &args.prompts_path {
            Some(path) => prompt::load_prompts(path)
                .map_err(|e| format!("Failed to load prompts file '{}': {}", path, e))?,
            None => Arc::new(PromptConfig::default()),
        };

        Ok(Self::with_parts(chat_client, store, prompt_config, args.prompts_path.clone()))
    }

    pub fn with_parts(
        chat_client: Arc<dyn ChatClient>,
        store: Arc<dyn ConversationStore>,
        prompt_config: Arc<PromptConfig>,
        prompts_path: Option<String>
    ) -> Self {
        Self {
            chat_client,
            store,
            prompt_config: RwLock::new(prompt_config),
            prompts_path,
        }
    }

    /// Handles one turn. The user message is kept even when the model call
    /// fails; the assistant message is only appended on success.
    pub async fn submit(
        &self,
        conversation_id: Option<&str>,
        text: &str,
        images: Vec<String>
    ) -> Result<ChatReply, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::Validation);
        }

        let conversation_id = conversation_id.filter(|id| !id.trim().is_empty());
        let include_images = !images.is_empty();
        let prompts = Arc::clone(&*self.prompt_config.read().await);

        let user_message = ChatMessage::user(text, images.clone());
        let conversation = self.store.upsert_append(conversation_id, user_message).await;
        info!(
            "Conversation {}: user message appended ({} images, {} messages total)",
            conversation.id,
            images.len(),
            conversation.messages.len()
        );

        let enriched = if include_images {
            let descriptions = self.describe_images(&images, &prompts).await;
            Some(prompt::enrich_with_images(text, &descriptions))
        } else {
            None
        };

        let request = CompletionRequest {
            system_prompt: prompts.system_prompt(include_images),
            messages: Self::build_prompt(&conversation, enriched),
            include_images,
        };

        let completion = self.chat_client.complete(&request).await.map_err(|e| {
            error!("Model call failed for conversation {}: {}", conversation.id, e);
            ChatError::from(e)
        })?;

        // A conversation deleted mid-turn still gets its reply delivered.
        let reply = ChatMessage::assistant(completion.response);
        match self.store.append(&conversation.id, reply.clone()).await {
            Ok(_) => info!("Conversation {}: assistant reply appended", conversation.id),
            Err(e) =>
                warn!(
                    "Conversation {}: reply not stored, conversation removed during the turn ({})",
                    conversation.id,
                    e
                ),
        }

        Ok(ChatReply {
            message: reply,
            conversation_id: conversation.id,
        })
    }

    /// Describes every image concurrently; a failed description becomes the
    /// configured fallback notice instead of failing the turn.
    async fn describe_images(&self, images: &[String], prompts: &PromptConfig) -> Vec<String> {
        let calls = images
            .iter()
            .map(|image| self.chat_client.describe_image(image, &prompts.image_description_prompt));

        join_all(calls).await
            .into_iter()
            .enumerate()
            .map(|(i, result)| {
                result.unwrap_or_else(|e| {
                    warn!("Image {} description failed: {}", i + 1, e);
                    prompts.image_fallback(i + 1)
                })
            })
            .collect()
    }

    fn build_prompt(conversation: &Conversation, enriched_last: Option<String>) -> Vec<PromptMessage> {
        let mut messages: Vec<PromptMessage> = conversation.messages
            .iter()
            .map(|m| PromptMessage { role: m.role, content: m.content.clone() })
            .collect();

        if let (Some(content), Some(last)) = (enriched_last, messages.last_mut()) {
            last.content = content;
        }
        messages
    }

    pub async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, ChatError> {
        self.store.get(conversation_id).await.ok_or(ChatError::NotFound)
    }

    pub async fn list_conversations(&self) -> Vec<ConversationSummary> {
        self.store.list().await
    }

    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<(), ChatError> {
        if self.store.delete(conversation_id).await {
            info!("Conversation {} deleted", conversation_id);
            Ok(())
        } else {
            Err(ChatError::NotFound)
        }
    }

    /// Returns `Ok(true)` when a new prompt file was loaded.
    pub async fn reload_prompts_if_changed(&self) -> Result<bool, PromptError> {
        let Some(path) = &self.prompts_path else {
            return Ok(false);
        };

        let current = Arc::clone(&*self.prompt_config.read().await);
        let path = path.clone();
        let reloaded = tokio::task
            ::spawn_blocking(move || prompt::reload_prompts_if_changed(path, &current)).await
            .map_err(|e| PromptError::IoError(std::io::Error::other(e)))??;

        match reloaded {
            Some(new_config) => {
                *self.prompt_config.write().await = new_config;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::history::MemoryConversationStore;
    use crate::llm::chat::CompletionResponse;
    use crate::models::chat::Role;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Canned-reply model used in place of the hosted API.
    struct StubClient {
        reply: Option<String>,
        fail_images: bool,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl StubClient {
        fn replying(reply: &str) -> Self {
            Self { reply: Some(reply.to_string()), fail_images: false, requests: Mutex::new(Vec::new()) }
        }

        fn failing() -> Self {
            Self { reply: None, fail_images: false, requests: Mutex::new(Vec::new()) }
        }

        fn last_request(&self) -> CompletionRequest {
            self.requests.lock().unwrap().last().cloned().expect("model was called")
        }
    }

    #[async_trait]
    impl ChatClient for StubClient {
        async fn complete(
            &self,
            request: &CompletionRequest
        ) -> Result<CompletionResponse, ModelError> {
            self.requests.lock().unwrap().push(request.clone());
            match &self.reply {
                Some(reply) => Ok(CompletionResponse { response: reply.clone() }),
                None => Err(ModelError::Status { status: 503, body: "upstream down".into() }),
            }
        }

        async fn describe_image(&self, image: &str, _instruction: &str) -> Result<String, ModelError> {
            if self.fail_images || image == "broken" {
                Err(ModelError::InvalidImage("cannot decode".into()))
            } else {
                Ok(format!("An image named {}.", image))
            }
        }

        fn get_model(&self) -> String {
            "stub".into()
        }

        fn get_base_url(&self) -> Option<String> {
            None
        }
    }

    fn agent_with(client: Arc<StubClient>) -> (ChatAgent, Arc<MemoryConversationStore>) {
        let store = Arc::new(MemoryConversationStore::new());
        let agent = ChatAgent::with_parts(
            client,
            store.clone(),
            Arc::new(PromptConfig::default()),
            None
        );
        (agent, store)
    }

    #[tokio::test]
    async fn first_turn_creates_conversation_with_two_messages() {
        let (agent, store) = agent_with(Arc::new(StubClient::replying("Hello!")));

        let reply = agent.submit(None, "Hi", Vec::new()).await.unwrap();
        assert_eq!(reply.message.content, "Hello!");
        assert_eq!(reply.message.role, Role::Assistant);

        let summaries = store.list().await;
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, reply.conversation_id);
        assert_eq!(summaries[0].message_count, 2);

        let conv = agent.get_conversation(&reply.conversation_id).await.unwrap();
        assert_eq!(conv.messages[0].role, Role::User);
        assert_eq!(conv.messages[0].content, "Hi");
        assert_eq!(conv.messages[1].id, reply.message.id);
    }

    #[tokio::test]
    async fn blank_text_is_rejected_without_mutation() {
        let client = Arc::new(StubClient::replying("unused"));
        let (agent, store) = agent_with(client.clone());

        for text in ["", "   ", "\n\t"] {
            let err = agent.submit(None, text, Vec::new()).await.unwrap_err();
            assert!(matches!(err, ChatError::Validation));
        }
        assert!(store.list().await.is_empty());
        assert!(client.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn model_failure_keeps_user_message_only() {
        let (agent, store) = agent_with(Arc::new(StubClient::failing()));

        let err = agent.submit(None, "Hi", Vec::new()).await.unwrap_err();
        match err {
            ChatError::ModelService(msg) => assert!(msg.contains("upstream down")),
            other => panic!("unexpected error: {:?}", other),
        }

        let summaries = store.list().await;
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].message_count, 1);
        let conv = store.get(&summaries[0].id).await.unwrap();
        assert_eq!(conv.messages[0].role, Role::User);
    }

    #[tokio::test]
    async fn follow_up_sends_full_history() {
        let client = Arc::new(StubClient::replying("Sure."));
        let (agent, _store) = agent_with(client.clone());

        let first = agent.submit(None, "Hi", Vec::new()).await.unwrap();
        let second = agent.submit(Some(first.conversation_id.as_str()), "Tell me more", Vec::new()).await.unwrap();
        assert_eq!(first.conversation_id, second.conversation_id);

        let request = client.last_request();
        let roles: Vec<Role> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, [Role::User, Role::Assistant, Role::User]);
        assert_eq!(request.messages[2].content, "Tell me more");
        assert!(!request.include_images);
        assert!(!request.system_prompt.contains("analyze images"));
    }

    #[tokio::test]
    async fn image_descriptions_enrich_prompt_but_not_store() {
        let client = Arc::new(StubClient::replying("Nice picture."));
        let (agent, _store) = agent_with(client.clone());

        let reply = agent.submit(None, "What is this?", vec!["cat".into()]).await.unwrap();

        let request = client.last_request();
        assert!(request.include_images);
        assert!(request.system_prompt.contains("You can analyze images."));
        assert_eq!(
            request.messages.last().unwrap().content,
            "What is this?\n\nImages provided:\nAn image named cat."
        );

        let conv = agent.get_conversation(&reply.conversation_id).await.unwrap();
        assert_eq!(conv.messages[0].content, "What is this?");
        assert!(conv.messages[0].has_images);
        assert_eq!(conv.messages[0].images.as_deref(), Some(&["cat".to_string()][..]));
    }

    #[tokio::test]
    async fn failed_image_description_falls_back() {
        let client = Arc::new(StubClient::replying("I see."));
        let (agent, store) = agent_with(client.clone());

        let reply = agent.submit(None, "Look", vec!["dog".into(), "broken".into()]).await.unwrap();
        assert_eq!(reply.message.content, "I see.");

        let request = client.last_request();
        assert_eq!(
            request.messages.last().unwrap().content,
            "Look\n\nImages provided:\nAn image named dog.\n[Note: Image 2 was uploaded but couldn't be processed]"
        );
        assert_eq!(store.list().await[0].message_count, 2);
    }

    #[tokio::test]
    async fn all_images_failing_still_completes_turn() {
        let client = Arc::new(StubClient {
            reply: Some("Okay.".into()),
            fail_images: true,
            requests: Mutex::new(Vec::new()),
        });
        let (agent, _store) = agent_with(client);

        let reply = agent.submit(None, "Look", vec!["a".into(), "b".into()]).await.unwrap();
        let conv = agent.get_conversation(&reply.conversation_id).await.unwrap();
        assert_eq!(conv.messages.len(), 2);
    }

    #[tokio::test]
    async fn empty_conversation_id_starts_new_conversation() {
        let (agent, store) = agent_with(Arc::new(StubClient::replying("Hello!")));
        let reply = agent.submit(Some(""), "Hi", Vec::new()).await.unwrap();
        assert!(!reply.conversation_id.is_empty());
        assert_eq!(store.list().await.len(), 1);
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let (agent, _store) = agent_with(Arc::new(StubClient::replying("Hello!")));
        let reply = agent.submit(None, "Hi", Vec::new()).await.unwrap();

        agent.delete_conversation(&reply.conversation_id).await.unwrap();
        assert!(matches!(
            agent.get_conversation(&reply.conversation_id).await,
            Err(ChatError::NotFound)
        ));
        assert!(matches!(
            agent.delete_conversation(&reply.conversation_id).await,
            Err(ChatError::NotFound)
        ));
    }

    #[tokio::test]
    async fn reload_without_prompt_file_is_noop() {
        let (agent, _store) = agent_with(Arc::new(StubClient::replying("Hello!")));
        assert!(!agent.reload_prompts_if_changed().await.unwrap());
    }

    /// Replies normally, but removes every stored conversation first.
    struct DeletingClient {
        store: Arc<MemoryConversationStore>,
    }

    #[async_trait]
    impl ChatClient for DeletingClient {
        async fn complete(
            &self,
            _request: &CompletionRequest
        ) -> Result<CompletionResponse, ModelError> {
            for summary in self.store.list().await {
                self.store.delete(&summary.id).await;
            }
            Ok(CompletionResponse { response: "Hello!".into() })
        }

        async fn describe_image(&self, _image: &str, _instruction: &str) -> Result<String, ModelError> {
            Ok(String::new())
        }

        fn get_model(&self) -> String {
            "deleting".into()
        }

        fn get_base_url(&self) -> Option<String> {
            None
        }
    }

    #[tokio::test]
    async fn reply_is_returned_when_conversation_deleted_mid_turn() {
        let store = Arc::new(MemoryConversationStore::new());
        let agent = ChatAgent::with_parts(
            Arc::new(DeletingClient { store: store.clone() }),
            store.clone(),
            Arc::new(PromptConfig::default()),
            None
        );

        let reply = agent.submit(None, "Hi", Vec::new()).await.unwrap();
        assert_eq!(reply.message.content, "Hello!");
        assert_eq!(reply.message.role, Role::Assistant);
        assert!(store.get(&reply.conversation_id).await.is_none());
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn reload_picks_up_new_prompt_file() {
        let path = std::env::temp_dir().join(
            format!("chat-relay-agent-{}.json", uuid::Uuid::new_v4())
        );
        std::fs::write(&path, r#"{ "system_prompt": "Answer in French. {image_note}" }"#).unwrap();

        let client = Arc::new(StubClient::replying("Bonjour"));
        let agent = ChatAgent::with_parts(
            client.clone(),
            Arc::new(MemoryConversationStore::new()),
            Arc::new(PromptConfig::default()),
            Some(path.to_string_lossy().into_owned())
        );

        assert!(agent.reload_prompts_if_changed().await.unwrap());
        assert!(!agent.reload_prompts_if_changed().await.unwrap());

        agent.submit(None, "Hi", Vec::new()).await.unwrap();
        assert_eq!(client.last_request().system_prompt, "Answer in French. ");
        std::fs::remove_file(path).unwrap();
    }
}
