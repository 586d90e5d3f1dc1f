//! Backend contract consumed by the cached client.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{
    Chapter, ChapterPatch, GlossaryTerm, GlossaryTermPatch, NewChapter, NewGlossaryTerm, Series,
    SeriesPatch,
};
use crate::domain::envelope::ApiResponse;
use crate::domain::sharing::{ShareRequest, ShareResponse, ShareStats, SharedContent};

/// The call never produced a response envelope.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("backend did not respond in time")]
    Timeout,
    #[error("malformed backend response: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

pub type BackendResult<T> = Result<ApiResponse<T>, BackendError>;

/// Series, chapter, glossary, translation and sharing operations.
///
/// `Err` means the request failed in transit. A completed request returns an
/// envelope whose `success` flag may still be false.
#[async_trait]
pub trait NovelApi: Send + Sync {
    async fn get_series(&self) -> BackendResult<Vec<Series>>;

    async fn get_series_by_id(&self, series_id: &str) -> BackendResult<Series>;

    async fn create_series(&self, name: &str, description: Option<&str>) -> BackendResult<Series>;

    async fn update_series(&self, series_id: &str, patch: &SeriesPatch) -> BackendResult<Series>;

    async fn delete_series(&self, series_id: &str) -> BackendResult<()>;

    async fn get_chapters(&self, series_id: Option<&str>) -> BackendResult<Vec<Chapter>>;

    async fn create_chapter(&self, input: &NewChapter) -> BackendResult<Chapter>;

    async fn update_chapter(&self, chapter_id: &str, patch: &ChapterPatch)
    -> BackendResult<Chapter>;

    async fn delete_chapter(&self, chapter_id: &str) -> BackendResult<()>;

    async fn get_glossary_terms(
        &self,
        series_id: Option<&str>,
        chapter_id: Option<&str>,
    ) -> BackendResult<Vec<GlossaryTerm>>;

    async fn create_glossary_term(&self, input: &NewGlossaryTerm) -> BackendResult<GlossaryTerm>;

    async fn update_glossary_term(
        &self,
        term_id: &str,
        patch: &GlossaryTermPatch,
    ) -> BackendResult<GlossaryTerm>;

    async fn delete_glossary_term(&self, term_id: &str) -> BackendResult<()>;

    async fn suggest_glossary_terms(&self, text: &str) -> BackendResult<Vec<String>>;

    async fn translate_text(&self, text: &str, glossary_context: &[String])
    -> BackendResult<String>;

    async fn translate_paragraph(
        &self,
        text: &str,
        chapter_id: &str,
        paragraph_index: usize,
        glossary_context: &[String],
    ) -> BackendResult<String>;

    async fn retranslate_with_glossary(
        &self,
        original_text: &str,
        current_translation: &str,
        glossary_terms: &[String],
    ) -> BackendResult<String>;

    async fn create_share(&self, request: &ShareRequest) -> BackendResult<ShareResponse>;

    async fn get_shared_content(&self, share_id: &str) -> BackendResult<SharedContent>;

    async fn verify_share_password(&self, share_id: &str, password: &str) -> BackendResult<bool>;

    async fn delete_share(&self, share_id: &str) -> BackendResult<()>;

    /// Every stored share, newest first.
    async fn list_shares(&self) -> BackendResult<Vec<SharedContent>>;

    async fn get_share_stats(&self, share_id: &str) -> BackendResult<ShareStats>;
}
