use anyhow::Result;

/// Trait for completion backends (OpenAI, OpenRouter, test stubs, etc.)
///
/// Implementations return the first choice's message text, or `None` when the
/// provider answered without any content. Interpreting that text is left to
/// [`crate::services::normalizer`].
#[async_trait::async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete_meal(&self, meal_description: &str) -> Result<Option<String>>;
}
