use crate::error::ProviderError;
use crate::sessions::Turn;
use async_trait::async_trait;

/// The single capability the orchestrator needs from an upstream model:
/// turn an ordered message list into one generated text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Whether credentials are configured. When `false`, callers take the
    /// canned-response path without attempting a network call.
    fn has_credentials(&self) -> bool {
        true
    }

    async fn generate(&self, messages: &[Turn], max_tokens: u32) -> Result<String, ProviderError>;
}
