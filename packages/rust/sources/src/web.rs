//! Single-page web fetching and visible-text extraction.
//!
//! The fetcher normalizes a user-typed URL, performs one bounded-time GET,
//! and flattens the page body into whitespace-joined visible text.
//! Nothing is cached; every call hits the network.

use reqwest::Client;
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use scraper::{Html, Node};
use tracing::{debug, instrument, warn};
use url::Url;

use sourcechat_shared::{
    Result, SourceChatError, SourceError, SourceOutcome, SourceText, SourcesConfig,
    truncate_chars,
};

/// Elements whose text content is never visible.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Upper bound on bytes read from a page body; the rest is discarded.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

// ---------------------------------------------------------------------------
// SourceFetcher
// ---------------------------------------------------------------------------

/// Fetches a web page and returns its bounded visible text.
#[derive(Clone)]
pub struct SourceFetcher {
    client: Client,
    max_body_bytes: usize,
}

impl SourceFetcher {
    /// Build a fetcher whose client carries the configured timeout,
    /// user agent, and language preference.
    pub fn new(config: &SourcesConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let accept_language = HeaderValue::from_str(&config.accept_language).map_err(|e| {
            SourceChatError::config(format!(
                "invalid accept_language '{}': {e}",
                config.accept_language
            ))
        })?;
        headers.insert(ACCEPT_LANGUAGE, accept_language);

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| SourceChatError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_body_bytes: MAX_BODY_BYTES,
        })
    }

    /// Cap the number of body bytes read per page (minimum 1).
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit.max(1);
        self
    }

    /// Fetch `url` and return its visible text truncated to `max_chars`.
    ///
    /// An empty URL yields empty text. Any status other than 200 is an error.
    #[instrument(skip_all, fields(url = %url, max_chars = max_chars))]
    pub async fn fetch_page_text(&self, url: &str, max_chars: usize) -> SourceOutcome {
        let normalized = normalize_url(url);
        if normalized.is_empty() {
            return Ok(SourceText::empty());
        }

        match self.fetch(&normalized).await {
            Ok(body) => {
                let text = visible_text(&body);
                debug!(
                    url = %normalized,
                    body_len = body.len(),
                    text_chars = text.chars().count(),
                    "page fetched"
                );
                Ok(SourceText::new(normalized, truncate_chars(&text, max_chars)))
            }
            Err(e) => {
                warn!(url = %normalized, error = %e, "page fetch failed");
                Err(e)
            }
        }
    }

    async fn fetch(&self, url: &str) -> std::result::Result<String, SourceError> {
        let parsed = Url::parse(url).map_err(|e| SourceError::Fetch(format!("{url}: {e}")))?;

        let mut response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| SourceError::Fetch(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(SourceError::HttpStatus(status.as_u16()));
        }

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| SourceError::Fetch(format!("body read failed: {e}")))?
        {
            let room = self.max_body_bytes - body.len();
            if chunk.len() >= room {
                body.extend_from_slice(&chunk[..room]);
                debug!(limit = self.max_body_bytes, "page body truncated");
                break;
            }
            body.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Normalize a user-typed URL.
///
/// Trims whitespace and prefixes `https://` when no http(s) scheme is present
/// (including bare `www.` hosts). An empty input stays empty.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let mut url = trimmed.to_string();
    if url.starts_with("www.") {
        url = format!("https://{url}");
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        url = format!("https://{url}");
    }
    url
}

/// Extract visible text from an HTML document.
///
/// Text nodes are trimmed, empty ones dropped, and the rest joined with a
/// single space. Script, style, and template contents are skipped.
pub fn visible_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut parts: Vec<&str> = Vec::new();

    for node in doc.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if hidden {
            continue;
        }

        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }

    parts.join(" ")
}
