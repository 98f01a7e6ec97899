use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::state::{ChatMessage, ChatRole};

pub const DEFAULT_MODEL: &str = "mixtral-8x7b-32768";

#[derive(Serialize)]
struct GroqMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct GroqRequest {
    model: String,
    messages: Vec<GroqMessage>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct GroqChoice {
    message: GroqResponseMessage,
}

#[derive(Deserialize)]
struct GroqResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct GroqResponse {
    choices: Vec<GroqChoice>,
}

#[derive(Clone)]
pub struct GroqClient {
    client: Client,
    api_key: String,
}

fn build_request(model: &str, history: &[ChatMessage]) -> GroqRequest {
    GroqRequest {
        model: model.to_string(),
        messages: history
            .iter()
            .map(|msg| GroqMessage {
                role: match msg.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                },
                content: msg.content.clone(),
            })
            .collect(),
        temperature: 0.7,
        max_tokens: 2048,
        top_p: 1.0,
        stream: false,
    }
}

impl GroqClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
        }
    }

    /// Request a completion for the full conversation so far.
    ///
    /// Every call carries the entire history; the reply is a single
    /// non-streamed assistant message.
    pub async fn complete(&self, model: &str, history: &[ChatMessage]) -> Result<String> {
        let request = build_request(model, history);

        let response = self.client
            .post("https://api.groq.com/openai/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Groq API error {}: {}", status, text));
        }

        let groq_response: GroqResponse = response.json().await?;
        Ok(groq_response.choices.first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_full_history_with_fixed_params() {
        let history = vec![
            ChatMessage::assistant("hi, what can I help with?"),
            ChatMessage::user("reverse a string in rust"),
        ];

        let request = build_request(DEFAULT_MODEL, &history);

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], DEFAULT_MODEL);
        assert_eq!(value["stream"], false);
        assert_eq!(value["max_tokens"], 2048);
        assert_eq!(value["messages"].as_array().unwrap().len(), 2);
        assert_eq!(value["messages"][0]["role"], "assistant");
        assert_eq!(value["messages"][1]["role"], "user");
        assert_eq!(value["messages"][1]["content"], "reverse a string in rust");
    }
}
