//! Chapter translation driven paragraph by paragraph.

use futures::future::join_all;
use tracing::{info, instrument, warn};

use crate::application::client::NovelClient;
use crate::application::error::ApiError;
use crate::domain::entities::{Chapter, ChapterPatch, GlossaryTerm};
use crate::domain::error::DomainError;
use crate::domain::glossary::GlossaryMatcher;

const DEFAULT_BATCH_SIZE: usize = 3;

/// Paragraphs finished so far, reported after every batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationProgress {
    pub done: usize,
    pub total: usize,
}

impl TranslationProgress {
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.done.min(self.total) * 100) / self.total) as u8
    }
}

#[derive(Debug, Clone)]
pub struct ParagraphFailure {
    pub index: usize,
    pub error: ApiError,
}

/// Result of translating a chapter. Failed paragraphs keep their previous
/// translation (or stay empty) and the chapter is not marked translated.
#[derive(Debug, Clone)]
pub struct ChapterTranslation {
    pub chapter: Chapter,
    pub failures: Vec<ParagraphFailure>,
}

impl ChapterTranslation {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Clone)]
pub struct TranslationService {
    client: NovelClient,
    batch_size: usize,
}

impl TranslationService {
    pub fn new(client: NovelClient) -> Self {
        Self {
            client,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// `term => translation` lines for the glossary terms that occur in the
    /// chapter, in order of first appearance.
    pub async fn glossary_context(&self, chapter: &Chapter) -> Result<Vec<String>, ApiError> {
        let terms = self
            .client
            .glossary_terms(Some(&chapter.series_id), Some(&chapter.id))
            .await?;
        let matcher = GlossaryMatcher::new(&terms)?;
        Ok(matcher
            .terms_in(&chapter.content)
            .into_iter()
            .filter_map(|id| terms.iter().find(|term| term.id == id))
            .map(context_line)
            .collect())
    }

    /// Translate every paragraph of `chapter_id`, `batch_size` at a time, and
    /// write the result back to the chapter.
    #[instrument(skip(self, on_progress))]
    pub async fn translate_chapter(
        &self,
        chapter_id: &str,
        mut on_progress: impl FnMut(TranslationProgress) + Send,
    ) -> Result<ChapterTranslation, ApiError> {
        let chapter = self.client.chapter(chapter_id).await?;
        let context = self.glossary_context(&chapter).await?;
        let total = chapter.original_paragraphs.len();

        let mut translated = chapter.translated_paragraphs.clone();
        translated.resize(total, String::new());
        let mut failures = Vec::new();

        for (batch_index, batch) in chapter.original_paragraphs.chunks(self.batch_size).enumerate() {
            let offset = batch_index * self.batch_size;
            let requests = batch.iter().enumerate().map(|(position, paragraph)| {
                self.client
                    .translate_paragraph(paragraph, chapter_id, offset + position, &context)
            });

            for (position, outcome) in join_all(requests).await.into_iter().enumerate() {
                let index = offset + position;
                match outcome {
                    Ok(text) => translated[index] = text,
                    Err(error) => {
                        warn!(chapter_id, index, error = %error, "Paragraph translation failed");
                        failures.push(ParagraphFailure { index, error });
                    }
                }
            }

            on_progress(TranslationProgress {
                done: (offset + batch.len()).min(total),
                total,
            });
        }

        let patch = ChapterPatch {
            translated_content: Some(translated.join("\n")),
            translated_paragraphs: Some(translated),
            is_translated: Some(failures.is_empty() && total > 0),
            ..Default::default()
        };
        let chapter = self.client.update_chapter(chapter_id, &patch).await?;

        info!(
            chapter_id,
            paragraphs = total,
            failed = failures.len(),
            "Chapter translation finished"
        );
        Ok(ChapterTranslation { chapter, failures })
    }

    /// Retranslate one paragraph against the current glossary and store it.
    #[instrument(skip(self))]
    pub async fn retranslate_paragraph(
        &self,
        chapter_id: &str,
        index: usize,
    ) -> Result<Chapter, ApiError> {
        let chapter = self.client.chapter(chapter_id).await?;
        let original = chapter
            .original_paragraphs
            .get(index)
            .ok_or_else(|| DomainError::validation(format!("chapter has no paragraph {index}")))?;
        let current = chapter
            .translated_paragraphs
            .get(index)
            .map(String::as_str)
            .unwrap_or_default();
        let context = self.glossary_context(&chapter).await?;

        let text = self
            .client
            .retranslate_with_glossary(original, current, &context)
            .await?;

        let mut paragraphs = chapter.translated_paragraphs.clone();
        paragraphs.resize(chapter.original_paragraphs.len(), String::new());
        paragraphs[index] = text;

        let patch = ChapterPatch {
            translated_content: Some(paragraphs.join("\n")),
            translated_paragraphs: Some(paragraphs),
            ..Default::default()
        };
        self.client.update_chapter(chapter_id, &patch).await
    }
}

fn context_line(term: &GlossaryTerm) -> String {
    format!("{} => {}", term.term, term.translation)
}
