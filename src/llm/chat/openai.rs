use async_trait::async_trait;
use log::debug;
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use std::time::Duration;

use super::{
    build_http_client,
    send_chat_completion,
    ChatClient,
    ChatCompletionRequest,
    CompletionRequest,
    CompletionResponse,
};
use crate::error::ModelError;
use crate::llm::{ image, LlmConfig };

/// Client for api.openai.com or any server speaking the same
/// `/v1/chat/completions` protocol.
pub struct OpenAIChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAIChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        max_tokens: u32,
        temperature: f32,
        timeout: Option<Duration>
    ) -> Result<Self, ModelError> {
        let chat_model = model.unwrap_or_else(|| "gpt-4o-mini".to_string());
        let api_url = base_url.unwrap_or_else(|| "https://api.openai.com".to_string());
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e|
                ModelError::Config(format!("Invalid API key format: {}", e))
            )?
        );

        Ok(Self {
            http: build_http_client(headers, timeout)?,
            model: chat_model,
            base_url: api_url,
            max_tokens,
            temperature,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ModelError> {
        let api_key = config.api_key
            .clone()
            .ok_or_else(|| ModelError::Config("OpenAI API key is required".into()))?;

        Self::new(
            api_key,
            config.completion_model.clone(),
            config.base_url.clone(),
            config.max_tokens,
            config.temperature,
            config.timeout
        )
    }

    fn completions_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn complete(
        &self,
        request: &CompletionRequest
    ) -> Result<CompletionResponse, ModelError> {
        debug!("Calling OpenAI model {} with {} messages", self.model, request.messages.len());
        let body = ChatCompletionRequest::conversation(
            Some(self.model.clone()),
            request,
            self.max_tokens,
            self.temperature
        );
        let response = send_chat_completion(self.http.post(self.completions_url()), &body).await?;
        Ok(CompletionResponse { response })
    }

    async fn describe_image(
        &self,
        image: &str,
        instruction: &str
    ) -> Result<String, ModelError> {
        let data_url = image::to_data_url(image)?;
        let body = ChatCompletionRequest::image_description(
            Some(self.model.clone()),
            instruction,
            data_url,
            self.max_tokens,
            self.temperature
        );
        send_chat_completion(self.http.post(self.completions_url()), &body).await
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
