//! Chat-completions vision client.

use agrimarket::analysis::{
    AnalysisRequest, KNOWN_WASTE_TYPES, WasteAnalysis, parse_model_reply,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analysis::{VisionError, WasteClassifier};

/// Default chat-completions endpoint.
pub const DEFAULT_VISION_API_URL: &str = "https://api.x.ai/v1/chat/completions";

/// Default vision-capable model.
pub const DEFAULT_VISION_MODEL: &str = "grok-vision-beta";

const TEMPERATURE: f32 = 0.1;
const MAX_TOKENS: u32 = 600;

const SYSTEM_PROMPT: &str =
    "You are a precise agricultural analysis tool that outputs only valid JSON.";

/// Configuration for connecting to a vision endpoint.
#[derive(Debug, Clone)]
pub struct VisionConfig {
    /// Chat-completions URL.
    pub api_url: String,

    /// Bearer token. Requests fail with [`VisionError::MissingApiKey`] without one.
    pub api_key: Option<String>,

    pub model: String,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_VISION_API_URL.to_string(),
            api_key: None,
            model: DEFAULT_VISION_MODEL.to_string(),
        }
    }
}

/// HTTP client asking a vision model to classify waste photos.
#[derive(Debug, Clone)]
pub struct VisionClient {
    config: VisionConfig,
    http: Client,
}

impl VisionClient {
    /// Client for the endpoint in `config`.
    #[must_use]
    pub fn new(config: VisionConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    fn chat_request<'a>(
        &'a self,
        image_data_url: &'a str,
        request: &AnalysisRequest,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage::System {
                    content: SYSTEM_PROMPT,
                },
                ChatMessage::User {
                    content: vec![
                        ContentPart::Text {
                            text: audit_prompt(request),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: image_data_url,
                            },
                        },
                    ],
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        }
    }
}

#[async_trait]
impl WasteClassifier for VisionClient {
    async fn classify(
        &self,
        image_data_url: &str,
        request: &AnalysisRequest,
    ) -> Result<WasteAnalysis, VisionError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(VisionError::MissingApiKey)?;

        debug!(
            url = %self.config.api_url,
            model = %self.config.model,
            image_len = image_data_url.len(),
            "requesting waste classification"
        );

        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(&self.chat_request(image_data_url, request))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(VisionError::UnexpectedResponse(format!(
                "classification request failed with status {status}: {text}"
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        let reply = parsed.into_reply()?;

        let analysis = parse_model_reply(&reply, request)?;

        info!(
            file = %request.file_name,
            waste_type = %analysis.waste_type,
            confidence = analysis.confidence,
            "waste classified"
        );

        Ok(analysis)
    }
}

/// The auditing instructions, listing the known waste types and their visual cues.
fn audit_prompt(request: &AnalysisRequest) -> String {
    let known = KNOWN_WASTE_TYPES
        .iter()
        .map(|(name, cues)| format!("- {name}: {cues}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a professional agricultural waste auditor.\n\
         Analyze the visual characteristics of the provided image \
         (color, fiber length, texture, and density).\n\n\
         Step 1: Identify key visual features.\n\
         Step 2: Compare features against known waste types:\n\
         {known}\n\n\
         Reported location: {location}. Reported quantity: {quantity}.\n\n\
         Step 3: Provide the analysis STRICTLY in this JSON format:\n\
         {{\n  \"wasteType\": \"Exact name from list\",\n  \
         \"reasoning\": \"Brief visual justification for this identification\",\n  \
         \"quality\": \"Excellent/Good/Average/Poor\",\n  \
         \"confidence\": number between 0-100,\n  \
         \"suggestedPrice\": \"₹X-Y per kg\",\n  \
         \"industries\": [\"Industry 1\", \"Industry 2\"],\n  \
         \"estimatedWeight\": \"Quantity estimate if visible\"\n}}",
        location = request.location,
        quantity = request.quantity,
    )
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum ChatMessage<'a> {
    System { content: &'a str },
    User { content: Vec<ContentPart<'a>> },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: String },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl ChatResponse {
    fn into_reply(self) -> Result<String, VisionError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| VisionError::UnexpectedResponse("reply has no content".to_string()))
    }
}
