pub mod chat;
pub mod image;

use serde::{ Deserialize, Serialize };
use std::str::FromStr;
use std::fmt;
use std::time::Duration;

use crate::cli::Args;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmType {
    Azure,
    OpenAI,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseLlmTypeError {
    message: String,
}

impl fmt::Display for ParseLlmTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseLlmTypeError {}
impl FromStr for LlmType {
    type Err = ParseLlmTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "azure" | "azure-openai" => Ok(LlmType::Azure),
            "openai" => Ok(LlmType::OpenAI),
            _ =>
                Err(ParseLlmTypeError {
                    message: format!("Invalid LLM type: '{}'", s),
                }),
        }
    }
}

impl fmt::Display for LlmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmType::Azure => write!(f, "azure"),
            LlmType::OpenAI => write!(f, "openai"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub llm_type: LlmType,
    pub api_key: Option<String>,
    /// Model name, or the deployment name for Azure.
    pub completion_model: Option<String>,
    /// Provider endpoint; for Azure this is the resource endpoint.
    pub base_url: Option<String>,
    pub api_version: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Option<Duration>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            llm_type: LlmType::Azure,
            api_key: None,
            completion_model: None,
            base_url: None,
            api_version: None,
            max_tokens: 800,
            temperature: 0.7,
            timeout: None,
        }
    }
}

impl LlmConfig {
    pub fn from_args(args: &Args) -> Result<Self, ParseLlmTypeError> {
        let llm_type: LlmType = args.chat_llm_type.parse()?;
        let non_empty = |s: &str| Some(s.to_string()).filter(|k| !k.trim().is_empty());

        let config = match llm_type {
            LlmType::Azure => LlmConfig {
                llm_type,
                api_key: non_empty(&args.azure_api_key),
                completion_model: non_empty(&args.azure_deployment),
                base_url: args.azure_endpoint.clone(),
                api_version: non_empty(&args.azure_api_version),
                max_tokens: args.max_tokens,
                temperature: args.temperature,
                timeout: args.request_timeout_secs.map(Duration::from_secs),
            },
            LlmType::OpenAI => LlmConfig {
                llm_type,
                api_key: non_empty(&args.chat_api_key),
                completion_model: args.chat_model.clone(),
                base_url: args.chat_base_url.clone(),
                api_version: None,
                max_tokens: args.max_tokens,
                temperature: args.temperature,
                timeout: args.request_timeout_secs.map(Duration::from_secs),
            },
        };
        Ok(config)
    }
}
