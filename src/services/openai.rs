use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::services::ai_service::CompletionService;

const SYSTEM_PROMPT: &str = "You are a nutrition expert who works with Indian food composition data. \
For every meal you: identify each food item and its quantity, look up standard values per 100 g \
or per piece, compute calories and protein per item from the quantities, and add them up. \
Reply with valid JSON only, in exactly the requested shape. No markdown, no code fences, no commentary.";

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    content: Option<String>,
}

pub struct OpenAiService {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiService {
    pub fn new(api_key: String, model: String, base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn build_request(&self, meal_description: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: meal_prompt(meal_description),
                },
            ],
            temperature: 0.2,
            max_tokens: 500,
        }
    }
}

fn meal_prompt(meal_description: &str) -> String {
    format!(
        "Estimate the nutrition of this meal or snack using approximate values per 100 g or per piece \
         from standard Indian food composition data.\n\
         \n\
         Meal/Snack: {}\n\
         \n\
         Answer in this EXACT JSON format (no markdown, no code blocks):\n\
         {{\n\
         \x20 \"items\": [\n\
         \x20   {{\"item\": \"food name\", \"quantity\": \"quantity description\", \"calories\": number, \"protein\": number}}\n\
         \x20 ],\n\
         \x20 \"total\": {{\"calories\": number, \"protein\": number}}\n\
         }}\n\
         \n\
         Steps:\n\
         1. Identify each food item and its quantity\n\
         2. Look up calories and protein per 100 g or per standard serving\n\
         3. Compute each item's calories and protein for the given quantity\n\
         4. List every item in \"items\"\n\
         5. Put the sums of calories and protein in \"total\"",
        meal_description
    )
}

fn first_choice_content(response: ChatResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
}

#[async_trait::async_trait]
impl CompletionService for OpenAiService {
    async fn complete_meal(&self, meal_description: &str) -> Result<Option<String>> {
        let request = self.build_request(meal_description);
        let url = format!("{}/chat/completions", self.base_url);

        log::info!("🤖 Sending meal estimate request with model: {}", self.model);
        log::debug!("📤 Meal description: {}", meal_description);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        log::debug!("📥 Completion response status: {}", status);

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            log::error!("❌ Completion API error ({}): {}", status, error_text);
            anyhow::bail!("Completion API error ({}): {}", status, error_text);
        }

        let chat_response: ChatResponse = response.json().await?;
        let content = first_choice_content(chat_response);
        log::debug!("💬 Completion content: {:?}", content);

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> OpenAiService {
        OpenAiService::new(
            "test_key".to_string(),
            "test_model".to_string(),
            "https://api.example.com/v1/".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_build_request() {
        let request = service().build_request("2 rotis and dal");

        assert_eq!(request.model, "test_model");
        assert_eq!(request.max_tokens, 500);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.messages[1].role, "user");
        assert!(request.messages[1].content.contains("Meal/Snack: 2 rotis and dal"));
        assert!(request.messages[1].content.contains("\"total\""));

        let json = serde_json::to_value(&request).unwrap();
        assert!((json["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        assert_eq!(service().base_url, "https://api.example.com/v1");
    }

    #[test]
    fn test_first_choice_content() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"{\"items\":[]}"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_choice_content(response).as_deref(), Some("{\"items\":[]}"));

        let response: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#).unwrap();
        assert_eq!(first_choice_content(response), None);

        let response: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(first_choice_content(response), None);
    }
}
