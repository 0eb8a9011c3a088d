pub mod agent;
pub mod models;
pub mod server;
pub mod config;
pub mod llm;
pub mod cli;
pub mod error;
pub mod history;

use agent::ChatAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("API Key Required: {}", args.server_api_key.as_deref().map_or(false, |k| !k.trim().is_empty()));
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("History Store Type: {}", args.history_type);
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("built-in"));
    info!("Max Tokens: {}", args.max_tokens);
    info!("Temperature: {}", args.temperature);
    info!("Max Body Bytes: {}", args.max_body_bytes);
    if let Some(timeout) = args.request_timeout_secs {
        info!("Model Request Timeout: {}s", timeout);
    }
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let agent = Arc::new(ChatAgent::new(&args).await?);
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, agent, args);
    server.run().await?;

    Ok(())
}
