//! Enrichment backends.
//!
//! [`LlmEnricher`] asks a chat model for a JSON description of the content;
//! [`OpenRouterClient`] is the production [`LlmClient`]. When no API key is
//! configured, [`ExtractiveEnricher`] derives the same fields heuristically
//! from the text itself, with no network access.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use siphon_fetch::USER_AGENT;
use siphon_shared::{AppConfig, Enrichment, RawContent, Result, SiphonError, SourceType, resolve_api_key};

use crate::strategy::Enricher;

/// LLM requests can be slow; this bounds a single completion.
const LLM_TIMEOUT_SECS: u64 = 120;

/// Longest summary the extractive enricher produces, in characters.
const SUMMARY_MAX_CHARS: usize = 600;

/// Longest description (first sentence), in characters.
const DESCRIPTION_MAX_CHARS: usize = 240;

/// Number of topics the extractive enricher reports.
const TOPIC_COUNT: usize = 5;

// ---------------------------------------------------------------------------
// LLM client
// ---------------------------------------------------------------------------

/// A chat model that answers one system + user prompt pair.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Model identifier, for logging.
    fn model(&self) -> &str;

    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// OpenAI-compatible chat-completions client for OpenRouter.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenRouterClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(LLM_TIMEOUT_SECS))
            .build()
            .map_err(|e| SiphonError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: "https://openrouter.ai/api/v1".into(),
            model: model.into(),
        })
    }

    /// Point the client at a different OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Client for the `[openrouter]` config section, or `None` when the
    /// configured API key variable is unset.
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>> {
        let Some(key) = resolve_api_key(config) else {
            return Ok(None);
        };
        let client = Self::new(key, &config.openrouter.default_model)?
            .with_base_url(&config.openrouter.base_url);
        Ok(Some(client))
    }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.2,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .header("X-Title", "Siphon")
            .json(&request)
            .send()
            .await
            .map_err(|e| SiphonError::Network(format!("OpenRouter request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(SiphonError::Network(format!(
                "OpenRouter HTTP {status}: {snippet}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| SiphonError::Conversion(format!("invalid OpenRouter response: {e}")))?;

        if let Some(usage) = &parsed.usage {
            debug!(
                tokens_in = usage.prompt_tokens,
                tokens_out = usage.completion_tokens,
                "completion usage"
            );
        }

        parsed
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| SiphonError::Conversion("OpenRouter returned no content".into()))
    }
}

// ---------------------------------------------------------------------------
// LLM enricher
// ---------------------------------------------------------------------------

const SYSTEM_PROMPT: &str = "You catalogue content for a personal knowledge base. \
Reply with a single JSON object and nothing else, using exactly these keys:
{\"title\": string, \"description\": string, \"summary\": string, \"topics\": [string], \"entities\": [string]}
- title: a concise title; keep an existing title if the content has one
- description: one sentence saying what the content is
- summary: two to four paragraphs covering the main points
- topics: three to eight short subject tags, lowercase
- entities: people, organisations, products and places that are named";

/// The JSON object the model is asked to produce.
#[derive(Debug, Default, Deserialize)]
struct LlmEnrichment {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    entities: Vec<String>,
}

/// Enricher backed by a chat model; one instance per source type.
pub struct LlmEnricher {
    source_type: SourceType,
    client: Arc<dyn LlmClient>,
    max_input_chars: usize,
}

impl LlmEnricher {
    pub fn new(source_type: SourceType, client: Arc<dyn LlmClient>, max_input_chars: usize) -> Self {
        Self {
            source_type,
            client,
            max_input_chars,
        }
    }

    fn render_prompt(&self, content: &RawContent) -> String {
        let metadata = serde_json::to_string_pretty(&content.metadata).unwrap_or_default();
        format!(
            "The following is {kind}.\n\nMetadata:\n{metadata}\n\nContent:\n{text}",
            kind = describe(self.source_type),
            text = truncate_chars(&content.text, self.max_input_chars),
        )
    }
}

#[async_trait]
impl Enricher for LlmEnricher {
    fn source_type(&self) -> SourceType {
        self.source_type
    }

    #[instrument(skip_all, fields(source_type = %self.source_type, model = %self.client.model()))]
    async fn enrich(&self, content: &RawContent) -> Result<Enrichment> {
        let reply = self
            .client
            .complete(SYSTEM_PROMPT, &self.render_prompt(content))
            .await?;
        let parsed = parse_reply(&reply)?;

        let title = match parsed.title.trim() {
            "" => fallback_title(content).unwrap_or_default(),
            t => t.to_string(),
        };

        Ok(Enrichment {
            source_type: self.source_type,
            title,
            description: parsed.description.trim().to_string(),
            summary: parsed.summary.trim().to_string(),
            topics: clean_list(parsed.topics),
            entities: clean_list(parsed.entities),
        })
    }
}

fn describe(source_type: SourceType) -> &'static str {
    match source_type {
        SourceType::VideoPlatform => "the transcript of an online video",
        SourceType::CloudDoc => "a shared cloud document",
        SourceType::Article => "a web article converted to Markdown",
        SourceType::FileAudio => "the transcript of an audio recording",
        SourceType::FileDoc => "a local document",
    }
}

/// Parse the model's reply, tolerating code fences and chatter around the object.
fn parse_reply(reply: &str) -> Result<LlmEnrichment> {
    let json = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => {
            return Err(SiphonError::Conversion(
                "model reply contains no JSON object".into(),
            ));
        }
    };
    serde_json::from_str(json)
        .map_err(|e| SiphonError::Conversion(format!("model reply is not valid JSON: {e}")))
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let item = item.trim();
        if !item.is_empty() && !out.iter().any(|o| o == item) {
            out.push(item.to_string());
        }
    }
    out
}

/// Keep at most `max_chars` characters, marking the cut.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) => {
            warn!(max_chars, "content truncated for enrichment");
            format!(
                "{}\n\n[... content truncated for LLM context window ...]",
                &text[..cut]
            )
        }
    }
}

/// Best title available without a model: metadata `title`, the first
/// Markdown H1, then the file name.
pub fn fallback_title(content: &RawContent) -> Option<String> {
    content
        .meta_str("title")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or_else(|| siphon_markdown::first_heading(&content.text))
        .or_else(|| content.meta_str("file_name").map(str::to_string))
}

// ---------------------------------------------------------------------------
// Extractive enricher
// ---------------------------------------------------------------------------

const STOPWORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "also", "because", "been", "before", "being",
    "below", "between", "both", "but", "could", "does", "doing", "down", "during", "each", "even",
    "every", "from", "further", "have", "having", "here", "into", "just", "like", "made", "make",
    "many", "more", "most", "much", "must", "only", "other", "over", "same", "should", "some",
    "such", "than", "that", "their", "them", "then", "there", "these", "they", "this", "those",
    "through", "under", "until", "very", "want", "were", "what", "when", "where", "which",
    "while", "will", "with", "would", "your", "yours", "http", "https", "www",
];

/// Offline enricher that summarizes by selection rather than generation.
pub struct ExtractiveEnricher {
    source_type: SourceType,
}

impl ExtractiveEnricher {
    pub fn new(source_type: SourceType) -> Self {
        Self { source_type }
    }
}

#[async_trait]
impl Enricher for ExtractiveEnricher {
    fn source_type(&self) -> SourceType {
        self.source_type
    }

    async fn enrich(&self, content: &RawContent) -> Result<Enrichment> {
        let paragraphs = prose_paragraphs(&content.text);

        Ok(Enrichment {
            title: fallback_title(content).unwrap_or_default(),
            description: paragraphs
                .first()
                .map(|p| first_sentence(p))
                .unwrap_or_default(),
            summary: leading_paragraphs(&paragraphs, SUMMARY_MAX_CHARS),
            topics: top_terms(&content.text, TOPIC_COUNT),
            ..Enrichment::empty(self.source_type)
        })
    }
}

/// Paragraphs of running text, skipping headings, fences and tables.
fn prose_paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|p| {
            !p.is_empty() && !p.starts_with('#') && !p.starts_with("```") && !p.starts_with('|')
        })
        .collect()
}

fn first_sentence(paragraph: &str) -> String {
    let end = paragraph
        .char_indices()
        .find(|&(i, c)| {
            matches!(c, '.' | '!' | '?')
                && paragraph[i + c.len_utf8()..]
                    .chars()
                    .next()
                    .is_none_or(char::is_whitespace)
        })
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(paragraph.len());
    clip(&paragraph[..end], DESCRIPTION_MAX_CHARS)
}

fn leading_paragraphs(paragraphs: &[String], max_chars: usize) -> String {
    let mut out = String::new();
    for p in paragraphs {
        let extra = if out.is_empty() { p.len() } else { p.len() + 2 };
        if out.len() + extra > max_chars {
            if out.is_empty() {
                return clip(p, max_chars);
            }
            break;
        }
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(p);
    }
    out
}

/// Cut `text` at a word boundary so it fits in `max_chars` (plus an ellipsis).
fn clip(text: &str, max_chars: usize) -> String {
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };
    let head = &text[..cut];
    let head = head.rfind(' ').map_or(head, |space| &head[..space]);
    format!("{}...", head.trim_end())
}

/// The `n` most frequent non-stopword terms, ties broken alphabetically.
fn top_terms(text: &str, n: usize) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 4 && !w.chars().all(|c| c.is_ascii_digit()))
    {
        let word = word.to_lowercase();
        if !STOPWORDS.contains(&word.as_str()) {
            *counts.entry(word).or_default() += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(n).map(|(word, _)| word).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct CannedClient {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedClient {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for CannedClient {
        fn model(&self) -> &str {
            "canned"
        }

        async fn complete(&self, _system: &str, user: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(user.to_string());
            Ok(self.reply.clone())
        }
    }

    fn article(text: &str) -> RawContent {
        RawContent::new(SourceType::Article, text)
    }

    #[tokio::test]
    async fn llm_reply_in_code_fence_is_parsed() {
        let client = CannedClient::new(
            "Here you go:\n```json\n{\"title\": \"Ownership\", \"description\": \"A guide.\", \
             \"summary\": \"Borrowing rules.\", \"topics\": [\"rust\", \" rust \", \"memory\"], \
             \"entities\": [\"Mozilla\"]}\n```",
        );
        let enricher = LlmEnricher::new(SourceType::Article, client, 1000);

        let out = enricher.enrich(&article("body")).await.unwrap();
        assert_eq!(out.source_type, SourceType::Article);
        assert_eq!(out.title, "Ownership");
        assert_eq!(out.description, "A guide.");
        assert_eq!(out.topics, vec!["rust", "memory"]);
        assert_eq!(out.entities, vec!["Mozilla"]);
    }

    #[tokio::test]
    async fn llm_missing_title_falls_back() {
        let client = CannedClient::new(r#"{"summary": "s"}"#);
        let enricher = LlmEnricher::new(SourceType::FileDoc, client, 1000);

        let mut content = RawContent::new(SourceType::FileDoc, "no heading here");
        content
            .metadata
            .insert("file_name".into(), "notes.txt".into());
        let out = enricher.enrich(&content).await.unwrap();
        assert_eq!(out.title, "notes.txt");
        assert!(out.topics.is_empty());
    }

    #[tokio::test]
    async fn llm_invalid_reply_is_an_error() {
        let client = CannedClient::new("I cannot help with that.");
        let enricher = LlmEnricher::new(SourceType::Article, client, 1000);
        let err = enricher.enrich(&article("body")).await.unwrap_err();
        assert!(matches!(err, SiphonError::Conversion(_)));
    }

    #[tokio::test]
    async fn prompt_truncates_long_input() {
        let client = CannedClient::new(r#"{"title": "t"}"#);
        let enricher = LlmEnricher::new(SourceType::Article, client.clone(), 10);

        enricher
            .enrich(&article("ééééééééééééééééééééé tail"))
            .await
            .unwrap();
        let prompt = client.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("a web article"));
        assert!(prompt.contains("content truncated"));
        assert!(!prompt.contains("tail"));
    }

    #[test]
    fn title_fallback_order() {
        let mut content = RawContent::new(SourceType::FileDoc, "intro\n\n# Heading\n\nbody");
        content
            .metadata
            .insert("file_name".into(), "f.md".into());
        assert_eq!(fallback_title(&content).as_deref(), Some("Heading"));

        content.metadata.insert("title".into(), " Meta ".into());
        assert_eq!(fallback_title(&content).as_deref(), Some("Meta"));
    }

    #[tokio::test]
    async fn extractive_enrichment() {
        let text = "# Borrowing\n\n\
            The borrow checker validates references at compile time. It rejects dangling pointers.\n\n\
            ```rust\nfn main() {}\n```\n\n\
            Borrowing rules keep references valid. Checker errors explain borrowing conflicts.";
        let enricher = ExtractiveEnricher::new(SourceType::Article);

        let out = enricher.enrich(&article(text)).await.unwrap();
        assert_eq!(out.title, "Borrowing");
        assert_eq!(
            out.description,
            "The borrow checker validates references at compile time."
        );
        assert!(out.summary.starts_with("The borrow checker"));
        assert!(out.summary.contains("Borrowing rules"));
        assert!(!out.summary.contains("fn main"));
        assert_eq!(out.topics[0], "borrowing");
        assert!(out.topics.contains(&"checker".to_string()));
        assert!(out.entities.is_empty());
    }

    #[test]
    fn summary_is_bounded() {
        let long = "word ".repeat(400);
        let paragraphs = prose_paragraphs(&long);
        let summary = leading_paragraphs(&paragraphs, SUMMARY_MAX_CHARS);
        assert!(summary.len() <= SUMMARY_MAX_CHARS + 3);
        assert!(summary.ends_with("..."));
    }

    #[tokio::test]
    async fn openrouter_client_posts_chat_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({"model": "test/model"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"title\": \"T\"}"}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 3}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenRouterClient::new("test-key", "test/model")
            .unwrap()
            .with_base_url(server.uri());
        let reply = client.complete("system", "user").await.unwrap();
        assert_eq!(reply, "{\"title\": \"T\"}");
    }

    #[tokio::test]
    async fn openrouter_http_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let client = OpenRouterClient::new("bad", "m")
            .unwrap()
            .with_base_url(format!("{}/", server.uri()));
        let err = client.complete("s", "u").await.unwrap_err();
        assert!(matches!(err, SiphonError::Network(_)));
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("invalid key"));
    }

    #[test]
    fn missing_api_key_means_no_client() {
        let mut config = AppConfig::default();
        config.openrouter.api_key_env = "SIPHON_TEST_UNSET_OPENROUTER_KEY".into();
        assert!(OpenRouterClient::from_config(&config).unwrap().is_none());
    }
}
