//! Paragraph editing of a chapter with a bounded undo history.
//!
//! A [`ChapterDraft`] owns a working copy of one chapter. Every edit keeps the
//! paragraph list and the joined text in step and records a snapshot, so
//! undo and redo restore both sides at once. Persisting is left to the caller
//! through [`ChapterDraft::to_patch`].

use std::collections::VecDeque;
use std::sync::LazyLock;

use regex::Regex;

use super::entities::{Chapter, ChapterPatch};
use super::error::DomainError;

/// Snapshots kept per draft, the initial state included.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

const PARAGRAPH_SEPARATOR: &str = "\n\n";

static LINE_BREAK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>\s*").expect("line break pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParagraphSide {
    Original,
    Translated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Snapshot {
    content: String,
    translated_content: String,
    original_paragraphs: Vec<String>,
    translated_paragraphs: Vec<String>,
}

impl Snapshot {
    fn of(chapter: &Chapter) -> Self {
        Self {
            content: chapter.content.clone(),
            translated_content: chapter.translated_content.clone(),
            original_paragraphs: chapter.original_paragraphs.clone(),
            translated_paragraphs: chapter.translated_paragraphs.clone(),
        }
    }

    fn restore(&self, chapter: &mut Chapter) {
        chapter.content.clone_from(&self.content);
        chapter.translated_content.clone_from(&self.translated_content);
        chapter.original_paragraphs.clone_from(&self.original_paragraphs);
        chapter
            .translated_paragraphs
            .clone_from(&self.translated_paragraphs);
    }
}

/// Linear history; recording after an undo discards the redo branch and the
/// oldest snapshot falls off once `limit` is exceeded.
#[derive(Debug, Clone)]
struct EditHistory {
    entries: VecDeque<Snapshot>,
    position: usize,
    limit: usize,
}

impl EditHistory {
    fn new(initial: Snapshot, limit: usize) -> Self {
        Self {
            entries: VecDeque::from([initial]),
            position: 0,
            limit: limit.max(1),
        }
    }

    fn record(&mut self, snapshot: Snapshot) {
        self.entries.truncate(self.position + 1);
        self.entries.push_back(snapshot);
        if self.entries.len() > self.limit {
            self.entries.pop_front();
        }
        self.position = self.entries.len() - 1;
    }

    fn undo(&mut self) -> Option<&Snapshot> {
        self.position = self.position.checked_sub(1)?;
        self.entries.get(self.position)
    }

    fn redo(&mut self) -> Option<&Snapshot> {
        if self.position + 1 >= self.entries.len() {
            return None;
        }
        self.position += 1;
        self.entries.get(self.position)
    }
}

#[derive(Debug, Clone)]
pub struct ChapterDraft {
    chapter: Chapter,
    history: EditHistory,
    unsaved: bool,
}

impl ChapterDraft {
    pub fn new(chapter: Chapter) -> Self {
        Self::with_history_limit(chapter, DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_history_limit(chapter: Chapter, limit: usize) -> Self {
        let history = EditHistory::new(Snapshot::of(&chapter), limit);
        Self {
            chapter,
            history,
            unsaved: false,
        }
    }

    pub fn chapter(&self) -> &Chapter {
        &self.chapter
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved
    }

    pub fn can_undo(&self) -> bool {
        self.history.position > 0
    }

    pub fn can_redo(&self) -> bool {
        self.history.position + 1 < self.history.entries.len()
    }

    /// Replace one paragraph. On the translated side the list is padded with
    /// empty paragraphs up to the original length first.
    pub fn set_paragraph(
        &mut self,
        side: ParagraphSide,
        index: usize,
        text: &str,
    ) -> Result<(), DomainError> {
        if side == ParagraphSide::Translated {
            let original_len = self.chapter.original_paragraphs.len();
            let translated = &mut self.chapter.translated_paragraphs;
            if index < original_len && translated.len() < original_len {
                translated.resize(original_len, String::new());
            }
        }
        let paragraphs = self.paragraphs_mut(side);
        let slot = paragraphs
            .get_mut(index)
            .ok_or_else(|| out_of_range(index))?;
        text.clone_into(slot);
        self.commit(side);
        Ok(())
    }

    /// Insert a paragraph before `index`; `index == len` appends.
    pub fn insert_paragraph(
        &mut self,
        side: ParagraphSide,
        index: usize,
        text: &str,
    ) -> Result<(), DomainError> {
        let paragraphs = self.paragraphs_mut(side);
        if index > paragraphs.len() {
            return Err(out_of_range(index));
        }
        paragraphs.insert(index, text.to_owned());
        self.commit(side);
        Ok(())
    }

    pub fn remove_paragraph(
        &mut self,
        side: ParagraphSide,
        index: usize,
    ) -> Result<String, DomainError> {
        let paragraphs = self.paragraphs_mut(side);
        if index >= paragraphs.len() {
            return Err(out_of_range(index));
        }
        let removed = paragraphs.remove(index);
        self.commit(side);
        Ok(removed)
    }

    /// Move the paragraph at `from` so that it ends up at index `to`.
    pub fn move_paragraph(
        &mut self,
        side: ParagraphSide,
        from: usize,
        to: usize,
    ) -> Result<(), DomainError> {
        let paragraphs = self.paragraphs_mut(side);
        let len = paragraphs.len();
        if from >= len {
            return Err(out_of_range(from));
        }
        if to >= len {
            return Err(out_of_range(to));
        }
        let paragraph = paragraphs.remove(from);
        paragraphs.insert(to, paragraph);
        self.commit(side);
        Ok(())
    }

    /// Replace the whole text of one side. `<br>` tags count as paragraph
    /// breaks; blank paragraphs are dropped.
    pub fn replace_text(&mut self, side: ParagraphSide, text: &str) {
        let normalized = LINE_BREAK_TAG.replace_all(text, PARAGRAPH_SEPARATOR);
        let paragraphs: Vec<String> = normalized
            .split(PARAGRAPH_SEPARATOR)
            .map(str::trim)
            .filter(|paragraph| !paragraph.is_empty())
            .map(str::to_owned)
            .collect();

        match side {
            ParagraphSide::Original => {
                self.chapter.content = normalized.into_owned();
                self.chapter.original_paragraphs = paragraphs;
            }
            ParagraphSide::Translated => {
                self.chapter.translated_content = normalized.into_owned();
                self.chapter.translated_paragraphs = paragraphs;
            }
        }
        self.record();
    }

    /// Step back one snapshot. Returns `false` at the oldest one.
    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(snapshot) => {
                snapshot.restore(&mut self.chapter);
                self.unsaved = true;
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(snapshot) => {
                snapshot.restore(&mut self.chapter);
                self.unsaved = true;
                true
            }
            None => false,
        }
    }

    /// Everything the editor owns, ready for `update_chapter`.
    pub fn to_patch(&self) -> ChapterPatch {
        ChapterPatch {
            content: Some(self.chapter.content.clone()),
            original_paragraphs: Some(self.chapter.original_paragraphs.clone()),
            translated_content: Some(self.chapter.translated_content.clone()),
            translated_paragraphs: Some(self.chapter.translated_paragraphs.clone()),
            ..Default::default()
        }
    }

    /// Adopt the chapter the backend stored. History is kept.
    pub fn mark_saved(&mut self, saved: Chapter) {
        self.chapter = saved;
        self.unsaved = false;
    }

    fn paragraphs_mut(&mut self, side: ParagraphSide) -> &mut Vec<String> {
        match side {
            ParagraphSide::Original => &mut self.chapter.original_paragraphs,
            ParagraphSide::Translated => &mut self.chapter.translated_paragraphs,
        }
    }

    /// Rejoin the edited side and record the new state.
    fn commit(&mut self, side: ParagraphSide) {
        match side {
            ParagraphSide::Original => {
                self.chapter.content = self.chapter.original_paragraphs.join(PARAGRAPH_SEPARATOR);
            }
            ParagraphSide::Translated => {
                self.chapter.translated_content =
                    self.chapter.translated_paragraphs.join(PARAGRAPH_SEPARATOR);
            }
        }
        self.record();
    }

    fn record(&mut self) {
        self.history.record(Snapshot::of(&self.chapter));
        self.unsaved = true;
    }
}

fn out_of_range(index: usize) -> DomainError {
    DomainError::validation(format!("no paragraph at index {index}"))
}
