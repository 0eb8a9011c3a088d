use async_trait::async_trait;
use log::{ debug, info };
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE } };
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

const DEFAULT_API_VERSION: &str = "2024-04-01-preview";
const DEFAULT_DEPLOYMENT: &str = "gpt-4o-mini";

/// Azure OpenAI chat client. Requests go to
/// `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version=...`.
pub struct AzureOpenAIChatClient {
    http: HttpClient,
    endpoint: String,
    deployment: String,
    api_version: String,
    max_tokens: u32,
    temperature: f32,
}

impl AzureOpenAIChatClient {
    pub fn new(
        api_key: String,
        endpoint: String,
        deployment: Option<String>,
        api_version: Option<String>,
        max_tokens: u32,
        temperature: f32,
        timeout: Option<Duration>
    ) -> Result<Self, ModelError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "api-key",
            HeaderValue::from_str(&api_key).map_err(|e|
                ModelError::Config(format!("Invalid API key format: {}", e))
            )?
        );

        let endpoint = endpoint.trim_end_matches('/').to_string();
        let deployment = deployment.unwrap_or_else(|| DEFAULT_DEPLOYMENT.to_string());
        let api_version = api_version.unwrap_or_else(|| DEFAULT_API_VERSION.to_string());
        info!(
            "Azure OpenAI client: endpoint={}, deployment={}, api-version={}",
            endpoint,
            deployment,
            api_version
        );

        Ok(Self {
            http: build_http_client(headers, timeout)?,
            endpoint,
            deployment,
            api_version,
            max_tokens,
            temperature,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ModelError> {
        let api_key = config.api_key
            .clone()
            .ok_or_else(|| ModelError::Config("Azure OpenAI API key is required".into()))?;
        let endpoint = config.base_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ModelError::Config("Azure OpenAI endpoint is required".into()))?;

        Self::new(
            api_key,
            endpoint,
            config.completion_model.clone(),
            config.api_version.clone(),
            config.max_tokens,
            config.temperature,
            config.timeout
        )
    }

    fn completions_url(&self) -> String {
        format!("{}/openai/deployments/{}/chat/completions", self.endpoint, self.deployment)
    }

    async fn send(&self, body: &ChatCompletionRequest) -> Result<String, ModelError> {
        let request = self.http
            .post(self.completions_url())
            .query(&[("api-version", self.api_version.as_str())]);
        send_chat_completion(request, body).await
    }
}

#[async_trait]
impl ChatClient for AzureOpenAIChatClient {
    async fn complete(
        &self,
        request: &CompletionRequest
    ) -> Result<CompletionResponse, ModelError> {
        debug!("Calling Azure OpenAI with {} messages", request.messages.len());
        let body = ChatCompletionRequest::conversation(
            Some(self.deployment.clone()),
            request,
            self.max_tokens,
            self.temperature
        );
        let response = self.send(&body).await?;
        Ok(CompletionResponse { response })
    }

    async fn describe_image(
        &self,
        image: &str,
        instruction: &str
    ) -> Result<String, ModelError> {
        let data_url = image::to_data_url(image)?;
        let body = ChatCompletionRequest::image_description(
            Some(self.deployment.clone()),
            instruction,
            data_url,
            self.max_tokens,
            self.temperature
        );
        self.send(&body).await
    }

    fn get_model(&self) -> String {
        self.deployment.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.endpoint.clone())
    }
}
