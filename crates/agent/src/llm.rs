use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Network failure, timeout, quota exhaustion, missing credentials.
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    /// The provider answered, but the payload could not be parsed into the
    /// expected shape. Treated exactly like unavailability by callers: try
    /// the next provider, never crash.
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// One text-completion backend. Stateless from the caller's perspective; no
/// provider-specific behavior leaks past this contract.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;

    fn name(&self) -> &str;
}

/// Strips markdown code fences a provider may wrap around structured output.
/// Tolerates a language tag after the opening fence (```` ```json ````).
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match after_open.find('\n') {
        Some(newline) => &after_open[newline + 1..],
        None => after_open,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Deterministic provider for tests: replays a fixed script of outcomes, one
/// per `complete` call, and reports unavailability once exhausted.
pub struct ScriptedProvider {
    name: String,
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
}

impl ScriptedProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), script: Mutex::new(VecDeque::new()) }
    }

    pub fn enqueue(self, outcome: Result<&str, ProviderError>) -> Self {
        {
            let mut script = match self.script.lock() {
                Ok(script) => script,
                Err(poisoned) => poisoned.into_inner(),
            };
            script.push_back(outcome.map(str::to_string));
        }
        self
    }

    pub fn always_unavailable(name: impl Into<String>) -> Self {
        Self::new(name)
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
        let mut script = match self.script.lock() {
            Ok(script) => script,
            Err(poisoned) => poisoned.into_inner(),
        };
        script
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Unavailable("script exhausted".to_string())))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::{strip_code_fences, CompletionProvider, ProviderError, ScriptedProvider};

    #[test]
    fn strips_fences_with_language_tag() {
        let fenced = "```json\n{\"intent\": \"REFILL\"}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"intent\": \"REFILL\"}");
    }

    #[test]
    fn strips_bare_fences() {
        assert_eq!(strip_code_fences("```\n42\n```"), "42");
    }

    #[test]
    fn leaves_unfenced_text_alone() {
        assert_eq!(strip_code_fences("  plain text  "), "plain text");
    }

    #[tokio::test]
    async fn scripted_provider_replays_in_order_then_goes_dark() {
        let provider = ScriptedProvider::new("scripted")
            .enqueue(Ok("first"))
            .enqueue(Err(ProviderError::Malformed("bad".to_string())));

        assert_eq!(provider.complete("p").await.as_deref(), Ok("first"));
        assert!(matches!(provider.complete("p").await, Err(ProviderError::Malformed(_))));
        assert!(matches!(provider.complete("p").await, Err(ProviderError::Unavailable(_))));
    }
}
