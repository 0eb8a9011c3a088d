use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Server Args ---
    /// Host address and port for the HTTP API to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:3001")]
    pub server_addr: String,

    /// Optional API Key required in the X-API-Key header for /api routes.
    #[arg(long, env = "SERVER_API_KEY")]
    pub server_api_key: Option<String>,

    /// Maximum accepted request body size in bytes (images arrive inline as base64).
    #[arg(long, env = "MAX_BODY_BYTES", default_value = "20971520")]
    pub max_body_bytes: usize,

    // --- History Store Args ---
    /// Conversation store type (memory)
    #[arg(long, env = "HISTORY_TYPE", default_value = "memory")]
    pub history_type: String,

    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (azure, openai)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "azure")]
    pub chat_llm_type: String,

    /// Azure OpenAI API key.
    #[arg(long, env = "AZURE_OPENAI_API_KEY", default_value = "")]
    pub azure_api_key: String,

    /// Azure OpenAI resource endpoint (e.g., https://my-resource.cognitiveservices.azure.com/)
    #[arg(long, env = "AZURE_OPENAI_ENDPOINT")]
    pub azure_endpoint: Option<String>,

    /// Azure OpenAI API version sent as the api-version query parameter.
    #[arg(long, env = "AZURE_OPENAI_API_VERSION", default_value = "2024-04-01-preview")]
    pub azure_api_version: String,

    /// Azure OpenAI deployment name.
    #[arg(long, env = "AZURE_OPENAI_DEPLOYMENT", default_value = "gpt-4o-mini")]
    pub azure_deployment: String,

    /// Base URL for an OpenAI-compatible provider (e.g., https://api.openai.com)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for an OpenAI-compatible provider.
    #[arg(long, env = "CHAT_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Model name for an OpenAI-compatible provider (e.g., gpt-4o-mini)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// Maximum tokens generated per reply.
    #[arg(long, env = "CHAT_MAX_TOKENS", default_value = "800")]
    pub max_tokens: u32,

    /// Sampling temperature for replies.
    #[arg(long, env = "CHAT_TEMPERATURE", default_value = "0.7")]
    pub temperature: f32,

    /// Timeout in seconds for each model API call. Unbounded when unset.
    #[arg(long, env = "REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    // --- General App Args ---
    /// Optional path to a JSON prompt file overriding the built-in prompts.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}
