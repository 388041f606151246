use crate::config::{LLMConfig, LLMProvider};
use crate::error::AnalysisError;
use crate::model::AnalysisResult;
use crate::schema::{self, SchemaDialect};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

/// Anything that can turn article text into a validated analysis.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(&self, raw_text: &str) -> Result<AnalysisResult, AnalysisError>;
}

/// Upstream error messages are cut to this many characters.
const MAX_ERROR_CHARS: usize = 300;

pub struct AnalysisClient {
    config: LLMConfig,
    api_key: Option<String>,
    base_url: String,
    client: Client,
}

impl AnalysisClient {
    /// Fails with [`AnalysisError::Config`] when the provider needs a
    /// credential and none is configured.
    pub fn new(config: LLMConfig) -> Result<Self, AnalysisError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty());

        if config.provider.requires_api_key() && api_key.is_none() {
            return Err(AnalysisError::Config(format!(
                "{:?} API key not provided (set it in the config file or via {})",
                config.provider,
                config.provider.api_key_vars().join(" or ")
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AnalysisError::Config(format!("could not build HTTP client: {}", e)))?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| config.provider.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            config,
            api_key,
            base_url,
            client,
        })
    }

    pub fn provider(&self) -> LLMProvider {
        self.config.provider
    }

    pub fn model(&self) -> &str {
        self.config.model()
    }

    pub async fn analyze(&self, raw_text: &str) -> Result<AnalysisResult, AnalysisError> {
        if raw_text.trim().is_empty() {
            return Err(AnalysisError::EmptyInput);
        }

        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "analyze",
            %request_id,
            provider = ?self.config.provider,
            model = %self.config.model()
        );

        async move {
            let prompt = create_prompt(raw_text);
            let content = match self.config.provider {
                LLMProvider::Gemini => self.generate_with_gemini(&prompt).await?,
                LLMProvider::OpenAI => self.generate_with_openai(&prompt).await?,
                LLMProvider::Ollama => self.generate_with_ollama(&prompt).await?,
            };
            tracing::debug!(content = %content, "model output");

            let result = schema::parse_response(&content);
            match &result {
                Ok(analysis) => tracing::info!(
                    sentiment = %analysis.sentiment,
                    entities = analysis.knowledge_graph_data.nodes.len(),
                    "analysis completed"
                ),
                Err(e) => tracing::warn!(error = %e, "model output rejected"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn generate_with_gemini(&self, prompt: &str) -> Result<String, AnalysisError> {
        let payload = serde_json::json!({
            "contents": [
                { "role": "user", "parts": [ { "text": prompt } ] }
            ],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema::response_schema(SchemaDialect::Gemini),
                "temperature": self.config.temperature
            }
        });

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url,
            self.config.model()
        );
        let request = self
            .client
            .post(url)
            .header("x-goog-api-key", self.api_key.as_deref().unwrap_or_default());

        let response = self.send(request, &payload).await?;
        text_at(&response, &["candidates", "0", "content", "parts", "0", "text"]).ok_or_else(|| {
            let reason = response["candidates"][0]["finishReason"]
                .as_str()
                .or_else(|| response["promptFeedback"]["blockReason"].as_str())
                .unwrap_or("unknown");
            AnalysisError::Upstream(format!("Gemini returned no content (reason: {})", reason))
        })
    }

    async fn generate_with_openai(&self, prompt: &str) -> Result<String, AnalysisError> {
        let payload = serde_json::json!({
            "model": self.config.model(),
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "temperature": self.config.temperature,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "news_analysis",
                    "strict": true,
                    "schema": schema::response_schema(SchemaDialect::Strict)
                }
            }
        });

        let request = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(self.api_key.as_deref().unwrap_or_default());

        let response = self.send(request, &payload).await?;
        text_at(&response, &["choices", "0", "message", "content"])
            .ok_or_else(|| AnalysisError::Upstream("OpenAI returned no content".to_string()))
    }

    async fn generate_with_ollama(&self, prompt: &str) -> Result<String, AnalysisError> {
        let payload = serde_json::json!({
            "model": self.config.model(),
            "prompt": prompt,
            "stream": false,
            "format": schema::response_schema(SchemaDialect::JsonSchema),
            "options": {
                "temperature": self.config.temperature
            }
        });

        let request = self.client.post(format!("{}/api/generate", self.base_url));

        let response = self.send(request, &payload).await?;
        text_at(&response, &["response"])
            .ok_or_else(|| AnalysisError::Upstream("Ollama returned no content".to_string()))
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        payload: &Value,
    ) -> Result<Value, AnalysisError> {
        tracing::debug!(
            payload = %serde_json::to_string_pretty(payload).unwrap_or_else(|_| "Failed to serialize".to_string()),
            "sending request"
        );

        let response = request.json(payload).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Upstream(format!(
                "{:?} API returned HTTP {}: {}",
                self.config.provider,
                status.as_u16(),
                provider_error_message(&body)
            )));
        }

        let response_json: Value = response.json().await.map_err(|e| {
            AnalysisError::Upstream(format!("unreadable response envelope: {}", e))
        })?;
        tracing::debug!(
            response = %serde_json::to_string_pretty(&response_json).unwrap_or_else(|_| "Failed to serialize".to_string()),
            "raw response"
        );
        Ok(response_json)
    }
}

#[async_trait]
impl AnalysisService for AnalysisClient {
    async fn analyze(&self, raw_text: &str) -> Result<AnalysisResult, AnalysisError> {
        AnalysisClient::analyze(self, raw_text).await
    }
}

/// The single instruction sent to the model; the article is embedded verbatim.
pub fn create_prompt(raw_text: &str) -> String {
    format!(
        r#"You are a world-class AI journalist. Analyze the following news text and generate a comprehensive, multi-modal report in a single JSON object.

The news text is:
---
{}
---

Based on the text, provide the following:

1.  **narrative**: A synthesized, comprehensive narrative of the news story, written in an engaging journalistic style.
2.  **audioSummary**: A concise, 2-3 sentence summary suitable for a text-to-speech audio clip.
3.  **sentiment**: The overall sentiment of the article. Must be one of: "Positive", "Negative", or "Neutral".
4.  **infographicData**: Data for an infographic. Extract up to {} key numerical facts or statistics. If no numerical data is available, create representative data based on the text's theme. The structure should be: {{ "title": "...", "data": [ {{ "label": "...", "value": ... }} ] }}.
5.  **knowledgeGraphData**: A knowledge graph identifying key entities (people, organizations, locations) and their relationships. The structure should be: {{ "nodes": [ {{ "id": "...", "group": "person/organization/location" }} ], "links": [ {{ "source": "...", "target": "...", "relationship": "..." }} ] }}. Every link source and target must be the id of a node.

Return ONLY the JSON object that strictly adheres to the provided schema. Do not include any other text, explanations, or markdown formatting."#,
        raw_text,
        schema::MAX_INFOGRAPHIC_ENTRIES
    )
}

fn text_at(value: &Value, path: &[&str]) -> Option<String> {
    let mut current = value;
    for segment in path {
        current = match segment.parse::<usize>() {
            Ok(index) => current.get(index)?,
            Err(_) => current.get(*segment)?,
        };
    }
    current.as_str().map(str::to_string)
}

/// Pull the human-readable message out of a provider error body.
fn provider_error_message(body: &str) -> String {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            json["error"]["message"]
                .as_str()
                .or_else(|| json["error"].as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());

    if message.is_empty() {
        return "no error details".to_string();
    }
    if message.chars().count() > MAX_ERROR_CHARS {
        let cut: String = message.chars().take(MAX_ERROR_CHARS).collect();
        format!("{}...", cut)
    } else {
        message
    }
}
