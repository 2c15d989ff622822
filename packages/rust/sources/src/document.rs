//! Cached, bounded PDF text loading.
//!
//! Parsed text is kept whole in a [`DocumentCache`] keyed by document handle;
//! every read re-truncates to the caller's limit. Failed extractions are
//! never cached, so the next read retries.

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use sourcechat_shared::{
    Result, SourceChatError, SourceError, SourceOutcome, SourceText, truncate_chars,
};

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Produces ordered page texts for a document.
///
/// Implementations are called from a blocking thread.
pub trait DocumentExtractor: Send + Sync + 'static {
    /// Extract the text of every page, in page order.
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>>;

    /// Human-readable extractor name for tracing.
    fn name(&self) -> &str;
}

/// PDF extractor backed by `lopdf`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl DocumentExtractor for PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>> {
        let doc = lopdf::Document::load(path)
            .map_err(|e| SourceChatError::parse(format!("{}: {e}", path.display())))?;

        let pages = doc.get_pages();
        let mut texts = Vec::with_capacity(pages.len());
        for page_number in pages.keys() {
            let text = doc.extract_text(&[*page_number]).map_err(|e| {
                SourceChatError::parse(format!("page {page_number} of {}: {e}", path.display()))
            })?;
            texts.push(text);
        }

        Ok(texts)
    }

    fn name(&self) -> &str {
        "lopdf"
    }
}

// ---------------------------------------------------------------------------
// DocumentCache
// ---------------------------------------------------------------------------

/// Bounded LRU cache of full extracted document text.
///
/// Concurrent misses on the same key are collapsed: one caller extracts,
/// the others wait on a per-key lock and then read the populated entry.
pub struct DocumentCache {
    entries: Mutex<LruCache<String, Arc<str>>>,
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DocumentCache {
    /// Create a cache holding at most `capacity` documents (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a document, marking it most recently used.
    pub async fn get(&self, key: &str) -> Option<Arc<str>> {
        self.entries.lock().await.get(key).cloned()
    }

    pub async fn insert(&self, key: impl Into<String>, text: impl Into<Arc<str>>) {
        let key = key.into();
        if let Some((evicted, _)) = self.entries.lock().await.push(key.clone(), text.into()) {
            if evicted != key {
                debug!(handle = %evicted, "evicted document from cache");
            }
        }
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.lock().await.contains(key)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Return the cached entry for `key`, or run `load` once to populate it.
    ///
    /// The boolean is `true` on a cache hit. Errors from `load` are returned
    /// as-is and leave the cache untouched.
    pub async fn get_or_try_load<F, Fut, E>(
        &self,
        key: &str,
        load: F,
    ) -> std::result::Result<(Arc<str>, bool), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<String, E>>,
    {
        if let Some(hit) = self.get(key).await {
            return Ok((hit, true));
        }

        let key_lock = self.key_lock(key).await;
        let result = {
            let _guard = key_lock.lock().await;

            // Another caller may have populated the entry while we waited.
            if let Some(hit) = self.get(key).await {
                Ok((hit, true))
            } else {
                match load().await {
                    Ok(text) => {
                        let text: Arc<str> = Arc::from(text);
                        self.insert(key, text.clone()).await;
                        Ok((text, false))
                    }
                    Err(e) => Err(e),
                }
            }
        };
        self.release_key(key, &key_lock).await;

        result
    }

    async fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        self.in_flight
            .lock()
            .await
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    async fn release_key(&self, key: &str, key_lock: &Arc<Mutex<()>>) {
        let mut in_flight = self.in_flight.lock().await;
        // Only the last holder (map + ours) removes the entry.
        let last_holder = in_flight
            .get(key)
            .is_some_and(|l| Arc::ptr_eq(l, key_lock) && Arc::strong_count(l) == 2);
        if last_holder {
            in_flight.remove(key);
        }
    }
}

impl Default for DocumentCache {
    fn default() -> Self {
        Self::new(32)
    }
}

// ---------------------------------------------------------------------------
// SourceLoader
// ---------------------------------------------------------------------------

/// Loads bounded document text through an injected cache and extractor.
#[derive(Clone)]
pub struct SourceLoader {
    cache: Arc<DocumentCache>,
    extractor: Arc<dyn DocumentExtractor>,
}

impl SourceLoader {
    /// Create a loader using the `lopdf` extractor.
    pub fn new(cache: Arc<DocumentCache>) -> Self {
        Self::with_extractor(cache, Arc::new(PdfExtractor))
    }

    pub fn with_extractor(cache: Arc<DocumentCache>, extractor: Arc<dyn DocumentExtractor>) -> Self {
        Self { cache, extractor }
    }

    pub fn cache(&self) -> &Arc<DocumentCache> {
        &self.cache
    }

    /// Load the text of `handle`, truncated to `max_chars` characters.
    ///
    /// An empty handle yields empty text. Pages are joined with newlines and
    /// the result trimmed before caching.
    #[instrument(skip_all, fields(handle = %handle, max_chars = max_chars))]
    pub async fn load_document_text(&self, handle: &str, max_chars: usize) -> SourceOutcome {
        if handle.is_empty() {
            return Ok(SourceText::empty());
        }

        let extractor = self.extractor.clone();
        let path = handle.to_string();

        let loaded = self
            .cache
            .get_or_try_load(handle, || async move {
                info!(extractor = extractor.name(), "extracting document text");
                let pages = tokio::task::spawn_blocking(move || {
                    extractor.extract_pages(Path::new(&path))
                })
                .await
                .map_err(|e| SourceError::Document(format!("extraction task failed: {e}")))?
                .map_err(document_error)?;

                Ok::<_, SourceError>(pages.join("\n").trim().to_string())
            })
            .await;

        match loaded {
            Ok((text, hit)) => {
                debug!(cache_hit = hit, chars = text.chars().count(), "document text ready");
                Ok(SourceText::new(handle, truncate_chars(&text, max_chars)))
            }
            Err(e) => {
                warn!(error = %e, "document extraction failed");
                Err(e)
            }
        }
    }
}

/// Keep only the cause, without the infrastructure error's category prefix.
fn document_error(err: SourceChatError) -> SourceError {
    match err {
        SourceChatError::Parse { message } => SourceError::Document(message),
        SourceChatError::Io { path, source } => {
            SourceError::Document(format!("{}: {source}", path.display()))
        }
        other => SourceError::Document(other.to_string()),
    }
}
