//! Remote text generation for windows no rule recognizes.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::GenerationError;
use crate::settings::GeneratorSettings;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that generates concise, descriptive task titles. \
For messaging/email apps, use \"Responding to\" when a specific conversation is shown. \
For other apps, describe the specific action being performed. \
Never include the application name in the description.";

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, app: &str, window: &str) -> Result<String, GenerationError>;
}

pub fn user_prompt(app: &str, window: &str) -> String {
    format!(
        "Given that I'm using {app} and the window/tab is '{window}', \
generate a concise, descriptive task title that explains what I'm likely doing. \
Include an appropriate emoji at the start. \
Do NOT include the application name in the description since it's already shown in the category.\n\n\
Special rules:\n\
- If it's an email/messaging app and shows a specific conversation/email/chat, \
use \"Responding to\" instead of \"Working on\" since the user is likely replying to that conversation.\n\
- For other apps, describe the specific action being performed.\n\n\
The response should be just the task title, nothing else."
    )
}

/// Generator backed by an OpenAI-compatible chat completions endpoint.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    settings: GeneratorSettings,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(settings: GeneratorSettings, api_key: Option<String>) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            settings,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        let base = self
            .settings
            .api_url
            .strip_suffix("/v1")
            .unwrap_or(&self.settings.api_url);
        format!("{}/v1/chat/completions", base.trim_end_matches('/'))
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, app: &str, window: &str) -> Result<String, GenerationError> {
        let api_key = self.api_key.as_deref().ok_or(GenerationError::MissingApiKey)?;

        let body = serde_json::json!({
            "model": self.settings.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_prompt(app, window) },
            ],
            "max_tokens": self.settings.max_tokens,
            "temperature": self.settings.temperature,
        });

        let response: CompletionResponse = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_choice(response)
    }
}

fn parse_choice(response: CompletionResponse) -> Result<String, GenerationError> {
    let content = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::Malformed("no choices".into()))?
        .message
        .content
        .ok_or_else(|| GenerationError::Malformed("choice has no content".into()))?;

    let text = content.trim();
    if text.is_empty() {
        return Err(GenerationError::Empty);
    }
    Ok(text.to_string())
}
