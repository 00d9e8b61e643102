use std::sync::Arc;

use tracing::warn;

use crate::llm::{CompletionProvider, ProviderError};

/// Ordered fallback over interchangeable completion providers: try each in
/// turn, stop at the first success. `Unavailable` and `Malformed` are both
/// recovered here and never crash a caller; the last provider's error is
/// reported when the whole chain is exhausted.
#[derive(Clone)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn CompletionProvider>>,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn CompletionProvider>>) -> Self {
        Self { providers }
    }

    pub async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        self.complete_parsed(prompt, |raw| Ok(raw.to_string())).await
    }

    /// Completes and parses in one step per provider: a well-formed transport
    /// response that fails `parse` counts as malformed and advances the chain,
    /// exactly like a dead provider.
    pub async fn complete_parsed<T, F>(&self, prompt: &str, parse: F) -> Result<T, ProviderError>
    where
        F: Fn(&str) -> Result<T, ProviderError>,
    {
        let mut last_error = ProviderError::Unavailable("provider chain is empty".to_string());

        for provider in &self.providers {
            match provider.complete(prompt).await {
                Ok(raw) => match parse(&raw) {
                    Ok(value) => return Ok(value),
                    Err(error) => {
                        warn!(provider = provider.name(), error = %error, "provider response rejected");
                        last_error = error;
                    }
                },
                Err(error) => {
                    warn!(provider = provider.name(), error = %error, "provider call failed");
                    last_error = error;
                }
            }
        }

        Err(last_error)
    }
}
