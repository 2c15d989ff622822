//! Speech-synthesis collaborator and a Google Translate TTS client.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tracing::{debug, instrument};
use uuid::Uuid;

/// The TTS endpoint rejects longer inputs, so text is sent in pieces.
pub const MAX_CHUNK_CHARS: usize = 100;

/// Failure to synthesize or store speech audio.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("no text to speak")]
    EmptyText,

    #[error("speech request failed: {0}")]
    Transport(String),

    #[error("speech service returned HTTP {0}")]
    Api(u16),

    #[error("failed to write audio to {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Turns text into an audio file.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` in language `lang` and write the audio to `path`.
    async fn synthesize(&self, text: &str, lang: &str, path: &Path) -> Result<(), SpeechError>;
}

/// Fresh, collision-resistant audio path: `<dir>/response_<unix secs>_<8 hex>.mp3`.
pub fn speech_file_path(dir: &Path) -> PathBuf {
    let suffix = Uuid::new_v4().simple().to_string();
    dir.join(format!(
        "response_{}_{}.mp3",
        Utc::now().timestamp(),
        &suffix[..8]
    ))
}

/// Split text on whitespace into chunks of at most `max_chars` characters.
/// Words longer than the limit are cut.
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut word_chars: Vec<char> = word.chars().collect();

        while word_chars.len() > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word_chars.split_off(max_chars);
            chunks.push(word_chars.into_iter().collect());
            word_chars = rest;
        }

        let word_len = word_chars.len();
        if word_len == 0 {
            continue;
        }

        let needed = if current.is_empty() { word_len } else { current_len + 1 + word_len };
        if needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word_chars);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

// ---------------------------------------------------------------------------
// GoogleTts
// ---------------------------------------------------------------------------

/// Client for the public Google Translate TTS endpoint (MP3 output).
#[derive(Clone)]
pub struct GoogleTts {
    http_client: Client,
    base_url: String,
}

impl GoogleTts {
    pub fn new() -> Self {
        Self {
            http_client: Client::new(),
            base_url: "https://translate.google.com".to_string(),
        }
    }

    /// Set a custom base URL (tests, regional hosts).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    async fn fetch_chunk(
        &self,
        chunk: &str,
        lang: &str,
        idx: usize,
        total: usize,
    ) -> Result<Vec<u8>, SpeechError> {
        let idx = idx.to_string();
        let total = total.to_string();
        let textlen = chunk.chars().count().to_string();

        let response = self
            .http_client
            .get(format!("{}/translate_tts", self.base_url))
            .query(&[
                ("ie", "UTF-8"),
                ("q", chunk),
                ("tl", lang),
                ("client", "tw-ob"),
                ("total", total.as_str()),
                ("idx", idx.as_str()),
                ("textlen", textlen.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SpeechError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpeechError::Api(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SpeechError::Transport(format!("body read failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}

impl Default for GoogleTts {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTts {
    #[instrument(skip_all, fields(lang = %lang, path = %path.display()))]
    async fn synthesize(&self, text: &str, lang: &str, path: &Path) -> Result<(), SpeechError> {
        let chunks = split_text(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(SpeechError::EmptyText);
        }

        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            audio.extend(self.fetch_chunk(chunk, lang, idx, chunks.len()).await?);
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| SpeechError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(path, &audio)
            .await
            .map_err(|source| SpeechError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(chunks = chunks.len(), bytes = audio.len(), "speech written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn split_short_text_is_one_chunk() {
        assert_eq!(split_text("Hello there.", 100), vec!["Hello there."]);
    }

    #[test]
    fn split_respects_limit_on_word_boundaries() {
        let chunks = split_text("one two three four five", 9);
        assert_eq!(chunks, vec!["one two", "three", "four five"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 9));
    }

    #[test]
    fn split_cuts_oversized_words() {
        let chunks = split_text("ab abcdefgh c", 4);
        assert_eq!(chunks, vec!["ab", "abcd", "efgh", "c"]);
    }

    #[test]
    fn split_blank_text_is_empty() {
        assert!(split_text("  \n\t ", 100).is_empty());
    }

    #[test]
    fn speech_paths_are_unique_mp3s() {
        let dir = Path::new("/tmp/voices");
        let a = speech_file_path(dir);
        let b = speech_file_path(dir);

        assert_ne!(a, b);
        assert_eq!(a.parent(), Some(dir));
        let name = a.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("response_"));
        assert!(name.ends_with(".mp3"));
        // response_<secs>_<8 hex>.mp3
        let suffix = name.trim_end_matches(".mp3").rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn synthesize_concatenates_chunks() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/translate_tts"))
            .and(query_param("tl", "en"))
            .and(query_param("idx", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"AA".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/translate_tts"))
            .and(query_param("idx", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"BB".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("answer.mp3");
        let text = format!("{} {}", "a".repeat(90), "b".repeat(20));

        GoogleTts::new()
            .with_base_url(server.uri())
            .synthesize(&text, "en", &out)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&out).unwrap(), b"AABB");
    }

    #[tokio::test]
    async fn synthesize_rejects_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        let err = GoogleTts::new()
            .synthesize("   ", "en", &dir.path().join("x.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, SpeechError::EmptyText));
    }

    #[tokio::test]
    async fn synthesize_reports_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("fail.mp3");
        let err = GoogleTts::new()
            .with_base_url(server.uri())
            .synthesize("hello", "en", &out)
            .await
            .unwrap_err();

        assert!(matches!(err, SpeechError::Api(503)));
        assert!(!out.exists());
    }
}
