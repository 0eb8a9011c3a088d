pub mod azure;
pub mod openai;

use async_trait::async_trait;
use reqwest::{ Client as HttpClient, RequestBuilder, header::HeaderMap };
use serde::{ Deserialize, Serialize };
use std::sync::Arc;
use std::time::Duration;

use super::{ LlmConfig, LlmType };
use self::azure::AzureOpenAIChatClient;
use self::openai::OpenAIChatClient;
use crate::error::ModelError;
use crate::models::chat::Role;

/// One `{role, content}` pair of the conversation history.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub messages: Vec<PromptMessage>,
    /// Set when the last user message carried images.
    pub include_images: bool,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CompletionResponse {
    pub response: String,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(
        &self,
        request: &CompletionRequest
    ) -> Result<CompletionResponse, ModelError>;

    /// Asks the model to describe one base64 image following `instruction`.
    async fn describe_image(
        &self,
        image: &str,
        instruction: &str
    ) -> Result<String, ModelError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> Option<String>;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, ModelError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::Azure => {
            let specific_client = AzureOpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

#[derive(Serialize, Debug)]
pub(crate) struct ChatCompletionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize, Debug)]
struct WireMessage {
    role: &'static str,
    content: WireContent,
}

#[derive(Serialize, Debug)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text {
        text: String,
    },
    ImageUrl {
        image_url: ImageUrl,
    },
}

#[derive(Serialize, Debug)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl ChatCompletionRequest {
    pub(crate) fn conversation(
        model: Option<String>,
        request: &CompletionRequest,
        max_tokens: u32,
        temperature: f32
    ) -> Self {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(WireMessage {
            role: "system",
            content: WireContent::Text(request.system_prompt.clone()),
        });
        messages.extend(
            request.messages.iter().map(|m| WireMessage {
                role: m.role.as_str(),
                content: WireContent::Text(m.content.clone()),
            })
        );
        Self { model, messages, max_tokens, temperature }
    }

    pub(crate) fn image_description(
        model: Option<String>,
        instruction: &str,
        data_url: String,
        max_tokens: u32,
        temperature: f32
    ) -> Self {
        let parts = vec![
            ContentPart::Text { text: instruction.to_string() },
            ContentPart::ImageUrl { image_url: ImageUrl { url: data_url } }
        ];
        Self {
            model,
            messages: vec![WireMessage {
                role: Role::User.as_str(),
                content: WireContent::Parts(parts),
            }],
            max_tokens,
            temperature,
        }
    }
}

pub(crate) fn build_http_client(
    headers: HeaderMap,
    timeout: Option<Duration>
) -> Result<HttpClient, ModelError> {
    let mut builder = HttpClient::builder().default_headers(headers);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// Sends one chat-completions call and returns the first choice's text.
pub(crate) async fn send_chat_completion(
    request: RequestBuilder,
    body: &ChatCompletionRequest
) -> Result<String, ModelError> {
    let resp = request.json(body).send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ModelError::Status { status: status.as_u16(), body });
    }

    let parsed = resp.json::<ChatCompletionResponse>().await?;
    parsed.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(ModelError::EmptyResponse)
}
