// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! LLM coaching assistant proxy.
//!
//! The upstream model is asked to answer as JSON carrying a
//! conversational reply plus an optional structured habit suggestion.
//! Models do not always comply, so [`parse_reply`] degrades through
//! three stages: whole-body JSON, embedded JSON object, plain text.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::services::check_response_json;

const DEEPSEEK_API_BASE: &str = "https://api.deepseek.com";
const DEEPSEEK_MODEL: &str = "deepseek-chat";

const SYSTEM_PROMPT: &str = "You are HabitMate, a concise and encouraging habit coach. \
Always answer with a single JSON object of the form \
{\"humanReply\": string, \"habitJson\": object or null}. \
Put your conversational answer in humanReply. \
When the user asks for a new habit to track, fill habitJson with \
{\"title\": string, \"description\": string, \"category\": string, \"color\": string} \
where color is a Tailwind background class such as \"bg-primary\"; otherwise set habitJson to null. \
Do not wrap the JSON in markdown fences.";

/// Assistant answer delivered to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub human_reply: String,
    pub habit_json: Option<serde_json::Value>,
}

#[derive(Clone)]
pub struct Assistant {
    http: reqwest::Client,
    api_key: String,
}

impl Assistant {
    pub fn from_config(api_key: Option<&str>) -> Option<Self> {
        Some(Self {
            http: reqwest::Client::new(),
            api_key: api_key?.to_string(),
        })
    }

    pub async fn chat(&self, message: &str) -> Result<ChatReply, AppError> {
        let request = ChatRequest {
            model: DEEPSEEK_MODEL,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: message,
                },
            ],
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", DEEPSEEK_API_BASE))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Assistant request failed: {}", e)))?;
        let completion: ChatCompletion =
            check_response_json(response, "Assistant completion").await?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AppError::Upstream("Assistant returned no choices".to_string()))?;

        Ok(parse_reply(&content))
    }
}

/// Recover a [`ChatReply`] from whatever the model actually produced.
fn parse_reply(content: &str) -> ChatReply {
    if let Some(reply) = try_parse(content) {
        return reply;
    }
    // Fenced or prose-wrapped output: try the outermost brace span
    if let (Some(start), Some(end)) = (content.find('{'), content.rfind('}')) {
        if start < end {
            if let Some(reply) = try_parse(&content[start..=end]) {
                return reply;
            }
        }
    }
    ChatReply {
        human_reply: content.trim().to_string(),
        habit_json: None,
    }
}

fn try_parse(candidate: &str) -> Option<ChatReply> {
    let value: serde_json::Value = serde_json::from_str(candidate.trim()).ok()?;
    let obj = value.as_object()?;
    let human_reply = obj.get("humanReply")?.as_str()?.to_string();
    let habit_json = obj.get("habitJson").filter(|v| !v.is_null()).cloned();
    Some(ChatReply {
        human_reply,
        habit_json,
    })
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: String,
}
