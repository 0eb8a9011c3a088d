use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use log::info;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt file IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Prompt JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Wording used when building upstream prompts. Every field may be overridden
/// from a JSON file; missing fields keep their defaults.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PromptConfig {
    pub system_prompt: String,
    /// Appended to the system prompt when the turn carries images.
    pub image_capability_note: String,
    pub image_description_prompt: String,
    /// Used in place of a description that failed; `{index}` is 1-based.
    pub image_fallback: String,
    #[serde(skip)]
    pub last_loaded: Option<SystemTime>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You are a helpful AI assistant. Provide intelligent, relevant responses. {image_note} Respond naturally and helpfully.".to_string(),
            image_capability_note: "You can analyze images.".to_string(),
            image_description_prompt: "Describe this image in detail so that an assistant without vision can answer questions about it.".to_string(),
            image_fallback: "[Note: Image {index} was uploaded but couldn't be processed]".to_string(),
            last_loaded: None,
        }
    }
}

impl PromptConfig {
    pub fn system_prompt(&self, include_images: bool) -> String {
        let note = if include_images { self.image_capability_note.as_str() } else { "" };
        self.system_prompt.replace("{image_note}", note)
    }

    pub fn image_fallback(&self, index: usize) -> String {
        self.image_fallback.replace("{index}", &index.to_string())
    }
}

/// Appends image descriptions to the user's text, as sent upstream.
pub fn enrich_with_images(message: &str, descriptions: &[String]) -> String {
    format!("{}\n\nImages provided:\n{}", message, descriptions.join("\n"))
}

pub fn load_prompts<P: AsRef<Path>>(path: P) -> Result<Arc<PromptConfig>, PromptError> {
    let file_content = fs::read_to_string(&path)?;
    let mut config: PromptConfig = serde_json::from_str(&file_content)?;
    config.last_loaded = Some(SystemTime::now());
    info!("Loaded prompts from {}", path.as_ref().display());
    Ok(Arc::new(config))
}

pub fn reload_prompts_if_changed<P: AsRef<Path>>(
    path: P,
    current_config: &Arc<PromptConfig>
) -> Result<Option<Arc<PromptConfig>>, PromptError> {
    let metadata = fs::metadata(&path)?;

    if let Ok(modified) = metadata.modified() {
        match current_config.last_loaded {
            Some(last_loaded) if modified <= last_loaded => {}
            Some(_) => {
                info!("Prompts file changed, reloading...");
                return load_prompts(path).map(Some);
            }
            None => {
                info!("No last_loaded timestamp, reloading prompts...");
                return load_prompts(path).map(Some);
            }
        }
    }
    Ok(None)
}
