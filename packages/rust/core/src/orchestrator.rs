//! Answer orchestration: sources → context → model → optional speech.
//!
//! [`Orchestrator::answer`] never fails. Source faults drop the source from
//! the context, a model fault becomes the answer text, and a speech fault
//! only costs the audio.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use sourcechat_shared::{
    AnswerConfig, AppConfig, Result, SessionState, SourceOutcome, SourceText, SourcesConfig,
};
use sourcechat_sources::{DocumentCache, SourceFetcher, SourceLoader};

use crate::context::{Context, ContextBuilder};
use crate::llm::{GeminiClient, LanguageModel, ModelError};
use crate::prompt;
use crate::speech::{GoogleTts, SpeechError, SpeechSynthesizer, speech_file_path};

// ---------------------------------------------------------------------------
// Answer
// ---------------------------------------------------------------------------

/// Outcome of one orchestration call.
#[derive(Debug)]
pub struct Answer {
    text: String,
    model_error: Option<ModelError>,
    audio_path: Option<PathBuf>,
    speech_error: Option<SpeechError>,
    strict: bool,
}

impl Answer {
    /// Answer text, or the bracketed model error when the model call failed.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn model_error(&self) -> Option<&ModelError> {
        self.model_error.as_ref()
    }

    pub fn is_error(&self) -> bool {
        self.model_error.is_some()
    }

    pub fn audio_path(&self) -> Option<&Path> {
        self.audio_path.as_deref()
    }

    /// Set when speech was requested but synthesis failed.
    pub fn speech_error(&self) -> Option<&SpeechError> {
        self.speech_error.as_ref()
    }

    /// Whether the model was restricted to document/web context.
    pub fn strict(&self) -> bool {
        self.strict
    }

    /// `(answer_text, audio_path)`.
    pub fn into_parts(self) -> (String, Option<PathBuf>) {
        (self.text, self.audio_path)
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Top-level entry point wiring sources, context, model, and speech.
#[derive(Clone)]
pub struct Orchestrator {
    loader: SourceLoader,
    fetcher: SourceFetcher,
    model: Arc<dyn LanguageModel>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    config: AnswerConfig,
}

impl Orchestrator {
    pub fn new(
        loader: SourceLoader,
        fetcher: SourceFetcher,
        model: Arc<dyn LanguageModel>,
        config: AnswerConfig,
    ) -> Self {
        Self {
            loader,
            fetcher,
            model,
            speech: None,
            config,
        }
    }

    pub fn with_speech(mut self, speech: Arc<dyn SpeechSynthesizer>) -> Self {
        self.speech = Some(speech);
        self
    }

    /// Wire the production stack (lopdf, reqwest fetcher, Gemini, Google TTS).
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let sources = SourcesConfig::from(config);
        let cache = Arc::new(DocumentCache::new(sources.pdf_cache_capacity));
        let loader = SourceLoader::new(cache);
        let fetcher = SourceFetcher::new(&sources)?;
        let model = GeminiClient::from_config(config)?;

        Ok(Self::new(loader, fetcher, Arc::new(model), AnswerConfig::from(config))
            .with_speech(Arc::new(GoogleTts::new())))
    }

    pub fn loader(&self) -> &SourceLoader {
        &self.loader
    }

    /// Answer `user_input`, grounded in the optional document and URL plus
    /// the session's recent history.
    #[instrument(
        skip_all,
        fields(
            model = %self.model.model_id(),
            has_document = document.is_some(),
            has_url = url.is_some(),
            synthesize_speech = synthesize_speech,
        )
    )]
    pub async fn answer(
        &self,
        user_input: &str,
        document: Option<&str>,
        url: Option<&str>,
        session: Option<&SessionState>,
        synthesize_speech: bool,
    ) -> Answer {
        let empty_session = SessionState::new();
        let session = session.unwrap_or(&empty_session);

        let pdf: SourceOutcome = match document {
            Some(handle) => {
                self.loader
                    .load_document_text(handle, self.config.pdf_max_chars)
                    .await
            }
            None => Ok(SourceText::empty()),
        };

        let web: SourceOutcome = match url {
            Some(url) => self.fetcher.fetch_page_text(url, self.config.web_max_chars).await,
            None => Ok(SourceText::empty()),
        };

        let context = ContextBuilder::from(&self.config).build(&pdf, &web, session);
        debug!(
            strict = context.strict,
            context_chars = context.text.chars().count(),
            pdf_failed = pdf.is_err(),
            web_failed = web.is_err(),
            "context assembled"
        );

        let (text, model_error) = self.ask_model(user_input, &context).await;

        let mut answer = Answer {
            text,
            model_error,
            audio_path: None,
            speech_error: None,
            strict: context.strict,
        };

        if synthesize_speech && !answer.text.is_empty() && !answer.is_error() {
            match self.speak(&answer.text).await {
                Ok(path) => answer.audio_path = path,
                Err(e) => {
                    warn!(error = %e, "speech synthesis failed, returning text only");
                    answer.speech_error = Some(e);
                }
            }
        }

        info!(
            strict = answer.strict,
            error = answer.is_error(),
            audio = answer.audio_path.is_some(),
            "answer ready"
        );
        answer
    }

    async fn ask_model(&self, user_input: &str, context: &Context) -> (String, Option<ModelError>) {
        let system = prompt::system_instruction(context);
        let user = prompt::user_message(user_input);

        match self.model.complete(&system, user).await {
            Ok(text) => (text.trim().to_string(), None),
            Err(e) => {
                warn!(error = %e, "model call failed");
                (e.marker(), Some(e))
            }
        }
    }

    async fn speak(&self, text: &str) -> std::result::Result<Option<PathBuf>, SpeechError> {
        let Some(speech) = &self.speech else {
            debug!("speech requested but no synthesizer configured");
            return Ok(None);
        };

        let path = speech_file_path(&self.config.speech_dir);
        speech
            .synthesize(text, &self.config.speech_language, &path)
            .await?;
        Ok(Some(path))
    }
}
