//! Chapter editing session over the cached client.

use tracing::{info, instrument};

use crate::application::client::NovelClient;
use crate::application::error::ApiError;
use crate::domain::editor::{ChapterDraft, ParagraphSide};
use crate::domain::entities::Chapter;
use crate::domain::error::DomainError;

/// One open chapter. Single-paragraph saves and full-text saves persist
/// immediately; inserts, removals and moves stay local until [`save`].
///
/// [`save`]: ChapterEditor::save
pub struct ChapterEditor {
    client: NovelClient,
    draft: ChapterDraft,
}

impl ChapterEditor {
    pub async fn open(client: NovelClient, chapter_id: &str) -> Result<Self, ApiError> {
        let chapter = client.chapter(chapter_id).await?;
        Ok(Self {
            client,
            draft: ChapterDraft::new(chapter),
        })
    }

    pub fn draft(&self) -> &ChapterDraft {
        &self.draft
    }

    pub fn chapter(&self) -> &Chapter {
        self.draft.chapter()
    }

    pub async fn save_paragraph(
        &mut self,
        side: ParagraphSide,
        index: usize,
        text: &str,
    ) -> Result<&Chapter, ApiError> {
        self.draft.set_paragraph(side, index, text)?;
        self.save().await
    }

    pub fn add_paragraph(
        &mut self,
        side: ParagraphSide,
        index: usize,
        text: &str,
    ) -> Result<(), DomainError> {
        self.draft.insert_paragraph(side, index, text)
    }

    pub fn delete_paragraph(
        &mut self,
        side: ParagraphSide,
        index: usize,
    ) -> Result<String, DomainError> {
        self.draft.remove_paragraph(side, index)
    }

    pub fn move_paragraph(
        &mut self,
        side: ParagraphSide,
        from: usize,
        to: usize,
    ) -> Result<(), DomainError> {
        self.draft.move_paragraph(side, from, to)
    }

    pub async fn save_full_text(
        &mut self,
        side: ParagraphSide,
        text: &str,
    ) -> Result<&Chapter, ApiError> {
        self.draft.replace_text(side, text);
        self.save().await
    }

    pub fn undo(&mut self) -> bool {
        self.draft.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.draft.redo()
    }

    /// Write both sides back. The draft stays dirty if the backend refuses.
    #[instrument(skip(self), fields(chapter_id = %self.draft.chapter().id))]
    pub async fn save(&mut self) -> Result<&Chapter, ApiError> {
        let chapter_id = self.draft.chapter().id.clone();
        let saved = self
            .client
            .update_chapter(&chapter_id, &self.draft.to_patch())
            .await?;
        info!(
            paragraphs = saved.original_paragraphs.len(),
            translated = saved.translated_paragraphs.len(),
            "Chapter saved"
        );
        self.draft.mark_saved(saved);
        Ok(self.draft.chapter())
    }
}
