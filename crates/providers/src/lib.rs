//! LLM provider implementations for Tessel.
//!
//! All providers implement the `tessel_core::Provider` trait. The
//! `build_provider` factory selects one based on configuration.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use std::sync::Arc;
use tessel_config::AppConfig;
use tessel_core::error::ProviderError;
use tessel_core::Provider;

/// Build the configured provider from application config.
///
/// Resolution order: an explicit `[providers.<name>]` entry wins, then
/// the known provider names (openai, openrouter, ollama). Providers
/// other than Ollama require an API key.
pub fn build_provider(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let name = config.default_provider.as_str();

    if let Some(pc) = config.providers.get(name) {
        let api_key = pc
            .api_key
            .clone()
            .or_else(|| config.api_key.clone())
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!("no API key configured for '{name}'"))
            })?;
        return Ok(Arc::new(OpenAiCompatProvider::new(
            name,
            pc.base_url.clone(),
            api_key,
        )));
    }

    match name {
        "ollama" => Ok(Arc::new(OpenAiCompatProvider::ollama(None))),
        "openai" | "openrouter" => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                ProviderError::NotConfigured(format!(
                    "no API key configured for '{name}' (set TESSEL_API_KEY)"
                ))
            })?;
            if name == "openai" {
                Ok(Arc::new(OpenAiCompatProvider::openai(api_key)))
            } else {
                Ok(Arc::new(OpenAiCompatProvider::openrouter(api_key)))
            }
        }
        other => Err(ProviderError::NotConfigured(format!(
            "unknown provider '{other}'"
        ))),
    }
}
