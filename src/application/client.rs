//! Cached facade over a [`NovelApi`] backend.
//!
//! Reads go through the shared [`RequestCache`]; mutations always reach the
//! backend and then invalidate the reads they affect. A backend envelope with
//! `success: false` is treated exactly like a transport failure: it is
//! returned to every waiting caller and never stored.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::histogram;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::application::api::{BackendError, BackendResult, NovelApi};
use crate::application::error::ApiError;
use crate::cache::{CacheKey, FetchOptions, RequestCache, Tag};
use crate::config::ClientSettings;
use crate::domain::entities::{
    Chapter, ChapterPatch, GlossaryTerm, GlossaryTermPatch, NewChapter, NewGlossaryTerm, Series,
    SeriesPatch,
};
use crate::domain::envelope::ApiResponse;
use crate::domain::error::DomainError;
use crate::domain::glossary::GlossaryMatcher;
use crate::domain::sharing::{ShareRequest, ShareResponse, ShareStats, SharedContent};

const METRIC_BACKEND_LATENCY_MS: &str = "novella_backend_request_ms";

#[derive(Clone)]
pub struct NovelClient {
    api: Arc<dyn NovelApi>,
    cache: RequestCache,
    settings: ClientSettings,
}

impl NovelClient {
    pub fn new(api: Arc<dyn NovelApi>, cache: RequestCache, settings: ClientSettings) -> Self {
        Self {
            api,
            cache,
            settings,
        }
    }

    pub fn cache(&self) -> &RequestCache {
        &self.cache
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    // Series

    #[instrument(skip(self))]
    pub async fn series(&self) -> Result<Vec<Series>, ApiError> {
        self.read(
            CacheKey::for_call("getSeries", &()),
            FetchOptions::new()
                .with_ttl(self.settings.series_ttl)
                .with_tag(Tag::series()),
            "get_series",
            |api| async move { api.get_series().await },
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn series_by_id(&self, series_id: &str) -> Result<Series, ApiError> {
        let key = CacheKey::for_call("getSeriesById", &[series_id]);
        let series_id = series_id.to_owned();
        self.read(
            key,
            FetchOptions::new()
                .with_ttl(self.settings.series_ttl)
                .with_tags([Tag::series(), Tag::series_scope(&series_id)]),
            "get_series_by_id",
            move |api| async move { api.get_series_by_id(&series_id).await },
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn create_series(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Series, ApiError> {
        if name.trim().is_empty() {
            return Err(DomainError::validation("series name must not be empty").into());
        }
        let outcome = self
            .write("create_series", self.api.create_series(name, description))
            .await;
        self.invalidate_tags(&[Tag::series()]);
        outcome?.into_result("create_series")
    }

    #[instrument(skip(self))]
    pub async fn update_series(
        &self,
        series_id: &str,
        patch: &SeriesPatch,
    ) -> Result<Series, ApiError> {
        patch.validate()?;
        let outcome = self
            .write("update_series", self.api.update_series(series_id, patch))
            .await;
        self.invalidate_tags(&[Tag::series(), Tag::series_scope(series_id)]);
        outcome?.into_result("update_series")
    }

    #[instrument(skip(self))]
    pub async fn delete_series(&self, series_id: &str) -> Result<(), ApiError> {
        let outcome = self
            .write("delete_series", self.api.delete_series(series_id))
            .await;
        // The backend drops the series' chapters and glossary terms with it.
        self.invalidate_tags(&[
            Tag::series(),
            Tag::series_scope(series_id),
            Tag::chapters(),
            Tag::glossary(),
        ]);
        outcome?.into_ack("delete_series")
    }

    // Chapters

    #[instrument(skip(self))]
    pub async fn chapters(&self, series_id: Option<&str>) -> Result<Vec<Chapter>, ApiError> {
        let mut options = FetchOptions::new()
            .with_ttl(self.settings.chapters_ttl)
            .with_tag(Tag::chapters());
        if let Some(series_id) = series_id {
            options = options.with_tag(Tag::series_scope(series_id));
        }
        let series_id = series_id.map(str::to_owned);
        let key = CacheKey::for_call("getChapters", &[&series_id]);

        self.read(
            key,
            options,
            "get_chapters",
            move |api| async move { api.get_chapters(series_id.as_deref()).await },
        )
        .await
    }

    /// One chapter, served from the cached full chapter list.
    #[instrument(skip(self))]
    pub async fn chapter(&self, chapter_id: &str) -> Result<Chapter, ApiError> {
        self.chapters(None)
            .await?
            .into_iter()
            .find(|chapter| chapter.id == chapter_id)
            .ok_or_else(|| DomainError::not_found("chapter").into())
    }

    #[instrument(skip(self, input), fields(series_id = %input.series_id))]
    pub async fn create_chapter(&self, input: &NewChapter) -> Result<Chapter, ApiError> {
        input.validate()?;
        let outcome = self
            .write("create_chapter", self.api.create_chapter(input))
            .await;
        self.invalidate_tags(&[Tag::chapters(), Tag::series()]);
        outcome?.into_result("create_chapter")
    }

    #[instrument(skip(self, patch))]
    pub async fn update_chapter(
        &self,
        chapter_id: &str,
        patch: &ChapterPatch,
    ) -> Result<Chapter, ApiError> {
        let outcome = self
            .write("update_chapter", self.api.update_chapter(chapter_id, patch))
            .await;
        self.invalidate_tags(&[Tag::chapters(), Tag::chapter_scope(chapter_id)]);
        outcome?.into_result("update_chapter")
    }

    #[instrument(skip(self))]
    pub async fn delete_chapter(&self, chapter_id: &str) -> Result<(), ApiError> {
        let outcome = self
            .write("delete_chapter", self.api.delete_chapter(chapter_id))
            .await;
        self.invalidate_tags(&[
            Tag::chapters(),
            Tag::series(),
            Tag::chapter_scope(chapter_id),
        ]);
        outcome?.into_ack("delete_chapter")
    }

    // Glossary

    #[instrument(skip(self))]
    pub async fn glossary_terms(
        &self,
        series_id: Option<&str>,
        chapter_id: Option<&str>,
    ) -> Result<Vec<GlossaryTerm>, ApiError> {
        let mut options = FetchOptions::new()
            .with_ttl(self.settings.glossary_ttl)
            .with_tag(Tag::glossary());
        if let Some(series_id) = series_id {
            options = options.with_tag(Tag::series_scope(series_id));
        }
        if let Some(chapter_id) = chapter_id {
            options = options.with_tag(Tag::chapter_scope(chapter_id));
        }
        let series_id = series_id.map(str::to_owned);
        let chapter_id = chapter_id.map(str::to_owned);
        let key = CacheKey::for_call("getGlossaryTerms", &(&series_id, &chapter_id));

        self.read(
            key,
            options,
            "get_glossary_terms",
            move |api| async move {
                api.get_glossary_terms(series_id.as_deref(), chapter_id.as_deref())
                    .await
            },
        )
        .await
    }

    /// A matcher over the glossary terms in scope.
    pub async fn glossary_matcher(
        &self,
        series_id: Option<&str>,
        chapter_id: Option<&str>,
    ) -> Result<GlossaryMatcher, ApiError> {
        let terms = self.glossary_terms(series_id, chapter_id).await?;
        Ok(GlossaryMatcher::new(&terms)?)
    }

    #[instrument(skip(self, input), fields(series_id = %input.series_id, term = %input.term))]
    pub async fn create_glossary_term(
        &self,
        input: &NewGlossaryTerm,
    ) -> Result<GlossaryTerm, ApiError> {
        input.validate()?;
        let outcome = self
            .write("create_glossary_term", self.api.create_glossary_term(input))
            .await;
        self.invalidate_tags(&[Tag::glossary()]);
        outcome?.into_result("create_glossary_term")
    }

    #[instrument(skip(self, patch))]
    pub async fn update_glossary_term(
        &self,
        term_id: &str,
        patch: &GlossaryTermPatch,
    ) -> Result<GlossaryTerm, ApiError> {
        let outcome = self
            .write(
                "update_glossary_term",
                self.api.update_glossary_term(term_id, patch),
            )
            .await;
        self.invalidate_tags(&[Tag::glossary()]);
        outcome?.into_result("update_glossary_term")
    }

    #[instrument(skip(self))]
    pub async fn delete_glossary_term(&self, term_id: &str) -> Result<(), ApiError> {
        let outcome = self
            .write(
                "delete_glossary_term",
                self.api.delete_glossary_term(term_id),
            )
            .await;
        self.invalidate_tags(&[Tag::glossary()]);
        outcome?.into_ack("delete_glossary_term")
    }

    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn suggest_glossary_terms(&self, text: &str) -> Result<Vec<String>, ApiError> {
        let key = CacheKey::for_call("suggestGlossaryTerms", &[text]);
        let text = text.to_owned();
        self.read(
            key,
            FetchOptions::new()
                .with_ttl(self.settings.suggestions_ttl)
                .with_tag(Tag::suggestions()),
            "suggest_glossary_terms",
            move |api| async move { api.suggest_glossary_terms(&text).await },
        )
        .await
    }

    // Translation: concurrent identical requests share one backend call, but
    // results are never stored.

    #[instrument(skip_all, fields(text_len = text.len(), context = glossary_context.len()))]
    pub async fn translate_text(
        &self,
        text: &str,
        glossary_context: &[String],
    ) -> Result<String, ApiError> {
        let key = CacheKey::for_call("translateText", &(text, glossary_context));
        let text = text.to_owned();
        let context = glossary_context.to_vec();
        self.read(
            key,
            FetchOptions::new().bypass_cache().no_store(),
            "translate_text",
            move |api| async move { api.translate_text(&text, &context).await },
        )
        .await
    }

    #[instrument(skip(self, text, glossary_context))]
    pub async fn translate_paragraph(
        &self,
        text: &str,
        chapter_id: &str,
        paragraph_index: usize,
        glossary_context: &[String],
    ) -> Result<String, ApiError> {
        let key = CacheKey::for_call(
            "translateParagraph",
            &(text, chapter_id, paragraph_index, glossary_context),
        );
        let text = text.to_owned();
        let chapter_id = chapter_id.to_owned();
        let context = glossary_context.to_vec();
        self.read(
            key,
            FetchOptions::new().bypass_cache().no_store(),
            "translate_paragraph",
            move |api| async move {
                api.translate_paragraph(&text, &chapter_id, paragraph_index, &context)
                    .await
            },
        )
        .await
    }

    #[instrument(skip_all, fields(terms = glossary_terms.len()))]
    pub async fn retranslate_with_glossary(
        &self,
        original_text: &str,
        current_translation: &str,
        glossary_terms: &[String],
    ) -> Result<String, ApiError> {
        let key = CacheKey::for_call(
            "retranslateWithGlossary",
            &(original_text, current_translation, glossary_terms),
        );
        let original = original_text.to_owned();
        let current = current_translation.to_owned();
        let terms = glossary_terms.to_vec();
        self.read(
            key,
            FetchOptions::new().bypass_cache().no_store(),
            "retranslate_with_glossary",
            move |api| async move {
                api.retranslate_with_glossary(&original, &current, &terms)
                    .await
            },
        )
        .await
    }

    // Sharing

    #[instrument(skip(self, request))]
    pub async fn create_share(&self, request: &ShareRequest) -> Result<ShareResponse, ApiError> {
        request.validate()?;
        let outcome = self
            .write("create_share", self.api.create_share(request))
            .await;
        self.cache.invalidate(&share_list_key());
        outcome?.into_result("create_share")
    }

    #[instrument(skip(self))]
    pub async fn shares(&self) -> Result<Vec<SharedContent>, ApiError> {
        self.read(
            share_list_key(),
            FetchOptions::new()
                .with_ttl(self.settings.shares_ttl)
                .with_tag(Tag::shares()),
            "list_shares",
            |api| async move { api.list_shares().await },
        )
        .await
    }

    /// View counts change on every read, so stats are shared between
    /// concurrent callers but never stored.
    #[instrument(skip(self))]
    pub async fn share_stats(&self, share_id: &str) -> Result<ShareStats, ApiError> {
        let key = CacheKey::for_call("getShareStats", &[share_id]);
        let share_id = share_id.to_owned();
        self.read(
            key,
            FetchOptions::new().bypass_cache().no_store(),
            "get_share_stats",
            move |api| async move { api.get_share_stats(&share_id).await },
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn shared_content(&self, share_id: &str) -> Result<SharedContent, ApiError> {
        let key = shared_content_key(share_id);
        let share_id = share_id.to_owned();
        self.read(
            key,
            FetchOptions::new()
                .with_ttl(self.settings.shares_ttl)
                .with_tag(Tag::shares()),
            "get_shared_content",
            move |api| async move { api.get_shared_content(&share_id).await },
        )
        .await
    }

    #[instrument(skip(self, password))]
    pub async fn verify_share_password(
        &self,
        share_id: &str,
        password: &str,
    ) -> Result<bool, ApiError> {
        self.write(
            "verify_share_password",
            self.api.verify_share_password(share_id, password),
        )
        .await?
        .into_result("verify_share_password")
    }

    #[instrument(skip(self))]
    pub async fn delete_share(&self, share_id: &str) -> Result<(), ApiError> {
        let outcome = self
            .write("delete_share", self.api.delete_share(share_id))
            .await;
        self.cache.invalidate(&shared_content_key(share_id));
        self.cache.invalidate(&share_list_key());
        outcome?.into_ack("delete_share")
    }

    /// Cached read. The envelope is unwrapped inside the producer so a
    /// rejected response takes the failure path and is not stored.
    async fn read<T, F, Fut>(
        &self,
        key: CacheKey,
        options: FetchOptions,
        operation: &'static str,
        call: F,
    ) -> Result<T, ApiError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(Arc<dyn NovelApi>) -> Fut,
        Fut: Future<Output = BackendResult<T>> + Send + 'static,
    {
        let api = Arc::clone(&self.api);
        let timeout = self.settings.request_timeout;
        self.cache
            .get_or_fetch(
                key,
                move || {
                    let pending = call(api);
                    async move {
                        let response = timed(operation, timeout, pending).await?;
                        response.into_result(operation)
                    }
                },
                options,
            )
            .await
            .map_err(ApiError::from)
    }

    /// Uncached call; the caller decides what to invalidate.
    async fn write<T, Fut>(
        &self,
        operation: &'static str,
        pending: Fut,
    ) -> Result<ApiResponse<T>, ApiError>
    where
        Fut: Future<Output = BackendResult<T>>,
    {
        timed(operation, self.settings.request_timeout, pending).await
    }

    fn invalidate_tags(&self, tags: &[Tag]) {
        for tag in tags {
            let removed = self.cache.invalidate_by_tag(tag);
            debug!(tag = %tag, removed = removed.len(), "Invalidated after mutation");
        }
    }
}

fn shared_content_key(share_id: &str) -> CacheKey {
    CacheKey::for_call("getSharedContent", &[share_id])
}

fn share_list_key() -> CacheKey {
    CacheKey::for_call("listShares", &())
}

async fn timed<T, Fut>(
    operation: &'static str,
    timeout: Duration,
    pending: Fut,
) -> Result<ApiResponse<T>, ApiError>
where
    Fut: Future<Output = BackendResult<T>>,
{
    let started = Instant::now();
    let outcome = tokio::time::timeout(timeout, pending).await;
    histogram!(METRIC_BACKEND_LATENCY_MS, "operation" => operation)
        .record(started.elapsed().as_secs_f64() * 1000.0);

    match outcome {
        Ok(response) => Ok(response?),
        Err(_) => {
            warn!(operation, timeout_ms = timeout.as_millis() as u64, "Backend call timed out");
            Err(BackendError::Timeout.into())
        }
    }
}
