use crate::config::FetchConfig;
use crate::error::AnalysisError;
use async_trait::async_trait;
use regex::Regex;
use reqwest::{header, Client, Url};
use std::sync::OnceLock;
use std::time::Duration;

/// Source of article text for a URL.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, AnalysisError>;
}

pub struct ArticleFetcher {
    client: Client,
}

impl ArticleFetcher {
    pub fn new(config: &FetchConfig) -> crate::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    pub async fn fetch(&self, url: &str) -> Result<String, AnalysisError> {
        let url = parse_url(url)?;
        tracing::info!(%url, "fetching article");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AnalysisError::Fetch(format!("Could not fetch {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::Fetch(format!(
                "Could not fetch {}: server answered HTTP {}",
                url,
                status.as_u16()
            )));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_ascii_lowercase();

        if !content_type.starts_with("text/") && !content_type.contains("html") && !content_type.contains("xml") {
            return Err(AnalysisError::Fetch(format!(
                "Could not read {}: unsupported content type {}",
                url, content_type
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AnalysisError::Fetch(format!("Could not read {}: {}", url, e)))?;

        let text = if content_type.starts_with("text/plain") {
            collapse_whitespace(&body)
        } else {
            extract_text(&body)
        };

        if text.is_empty() {
            return Err(AnalysisError::Fetch(format!("No readable article text found at {}", url)));
        }

        tracing::debug!(chars = text.len(), "extracted article text");
        Ok(text)
    }
}

#[async_trait]
impl ArticleSource for ArticleFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AnalysisError> {
        ArticleFetcher::fetch(self, url).await
    }
}

fn parse_url(raw: &str) -> Result<Url, AnalysisError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AnalysisError::Validation("Please enter a URL to fetch.".to_string()));
    }
    let url = Url::parse(trimmed)
        .map_err(|e| AnalysisError::Validation(format!("Invalid URL {:?}: {}", trimmed, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(AnalysisError::Validation(format!(
            "Unsupported URL scheme {:?}; use http or https",
            other
        ))),
    }
}

struct Patterns {
    hidden: Regex,
    comment: Regex,
    article: Regex,
    block: Regex,
    tag: Regex,
    spaces: Regex,
    blank_lines: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        hidden: Regex::new(r"(?is)<(script|style|noscript|template|svg)\b[^>]*>.*?</(script|style|noscript|template|svg)\s*>")
            .unwrap(),
        comment: Regex::new(r"(?s)<!--.*?-->").unwrap(),
        article: Regex::new(r"(?is)<article\b[^>]*>(.*?)</article\s*>").unwrap(),
        block: Regex::new(r"(?i)</?(p|div|br|h[1-6]|li|ul|ol|section|article|header|footer|blockquote|tr|table)\b[^>]*>")
            .unwrap(),
        tag: Regex::new(r"(?s)<[^>]*>").unwrap(),
        spaces: Regex::new(r"[ \t\r\f\v\u{a0}]+").unwrap(),
        blank_lines: Regex::new(r"\n\s*\n+").unwrap(),
    })
}

/// Reduce an HTML page to its readable text. Prefers the contents of
/// `<article>` elements when the page has any.
pub fn extract_text(html: &str) -> String {
    let p = patterns();
    let without_hidden = p.hidden.replace_all(html, " ");
    let cleaned = p.comment.replace_all(&without_hidden, " ");

    let articles: Vec<&str> = p
        .article
        .captures_iter(&cleaned)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    let scope = if articles.is_empty() {
        cleaned.to_string()
    } else {
        articles.join("\n\n")
    };

    let with_breaks = p.block.replace_all(&scope, "\n\n");
    let stripped = p.tag.replace_all(&with_breaks, " ");
    collapse_whitespace(&html_escape::decode_html_entities(&stripped))
}

fn collapse_whitespace(text: &str) -> String {
    let p = patterns();
    let spaced = p.spaces.replace_all(text, " ");
    let lines: Vec<&str> = spaced.lines().map(str::trim).collect();
    let joined = lines.join("\n");
    p.blank_lines.replace_all(&joined, "\n\n").trim().to_string()
}
