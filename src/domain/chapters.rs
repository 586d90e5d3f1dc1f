//! Chapter construction and updates.

use super::entities::{Chapter, ChapterPatch, NewChapter};
use super::error::DomainError;

/// Split raw chapter text into trimmed, non-empty paragraphs (one per line).
pub fn split_paragraphs(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

impl NewChapter {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::validation("chapter title must not be empty"));
        }
        if self.series_id.is_empty() {
            return Err(DomainError::validation("chapter needs a series"));
        }
        Ok(())
    }

    pub fn into_chapter(self, id: String) -> Chapter {
        let original_paragraphs = split_paragraphs(&self.content);
        Chapter {
            id,
            title: self.title,
            content: self.content,
            translated_content: self.translated_content.unwrap_or_default(),
            original_paragraphs,
            translated_paragraphs: Vec::new(),
            series_id: self.series_id,
            is_translated: false,
        }
    }
}

impl ChapterPatch {
    /// Apply the patch. Replacing `content` re-splits the original paragraphs
    /// unless the patch carries them explicitly.
    pub fn apply(self, chapter: &mut Chapter) {
        if let Some(title) = self.title {
            chapter.title = title;
        }
        if let Some(content) = self.content {
            chapter.original_paragraphs = split_paragraphs(&content);
            chapter.content = content;
        }
        if let Some(paragraphs) = self.original_paragraphs {
            chapter.original_paragraphs = paragraphs;
        }
        if let Some(translated) = self.translated_content {
            chapter.translated_content = translated;
        }
        if let Some(paragraphs) = self.translated_paragraphs {
            chapter.translated_paragraphs = paragraphs;
        }
        if let Some(done) = self.is_translated {
            chapter.is_translated = done;
        }
    }
}

impl Chapter {
    /// Share of original paragraphs with a non-empty translation, in percent.
    pub fn translation_progress(&self) -> u8 {
        let total = self.original_paragraphs.len();
        if total == 0 {
            return if self.is_translated { 100 } else { 0 };
        }
        let done = self
            .translated_paragraphs
            .iter()
            .take(total)
            .filter(|paragraph| !paragraph.trim().is_empty())
            .count();
        ((done * 100) / total) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_skip_blank_lines() {
        let text = "  First line.\n\n\tSecond line.  \r\n   \nThird.";
        assert_eq!(
            split_paragraphs(text),
            vec!["First line.", "Second line.", "Third."]
        );
    }

    #[test]
    fn new_chapter_is_split_and_untranslated() {
        let chapter = NewChapter {
            title: "Chapter 3".into(),
            content: "One.\nTwo.".into(),
            series_id: "s1".into(),
            translated_content: None,
        }
        .into_chapter("ch3".into());

        assert_eq!(chapter.original_paragraphs.len(), 2);
        assert!(chapter.translated_paragraphs.is_empty());
        assert!(!chapter.is_translated);
    }

    #[test]
    fn patching_content_resplits() {
        let mut chapter = NewChapter {
            title: "c".into(),
            content: "a".into(),
            series_id: "s1".into(),
            translated_content: None,
        }
        .into_chapter("ch1".into());

        ChapterPatch {
            content: Some("x\ny\nz".into()),
            ..Default::default()
        }
        .apply(&mut chapter);

        assert_eq!(chapter.original_paragraphs, vec!["x", "y", "z"]);
    }

    #[test]
    fn explicit_paragraphs_override_the_split() {
        let mut chapter = NewChapter {
            title: "c".into(),
            content: "a".into(),
            series_id: "s1".into(),
            translated_content: None,
        }
        .into_chapter("ch1".into());

        ChapterPatch {
            content: Some("x\n\ny".into()),
            original_paragraphs: Some(vec!["x".into(), String::new(), "y".into()]),
            ..Default::default()
        }
        .apply(&mut chapter);

        assert_eq!(chapter.content, "x\n\ny");
        assert_eq!(chapter.original_paragraphs, vec!["x", "", "y"]);
    }

    #[test]
    fn progress_counts_non_empty_translations() {
        let mut chapter = NewChapter {
            title: "c".into(),
            content: "a\nb\nc\nd".into(),
            series_id: "s1".into(),
            translated_content: None,
        }
        .into_chapter("ch1".into());
        chapter.translated_paragraphs = vec!["A".into(), String::new(), "C".into()];

        assert_eq!(chapter.translation_progress(), 50);
    }
}
