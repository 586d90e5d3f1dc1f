//! Share links for translated content.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use super::entities::{Chapter, Series};
use super::error::DomainError;

const DEFAULT_SHARE_TITLE: &str = "Shared Translation";
const UNKNOWN_SERIES: &str = "Unknown Series";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRequest {
    #[serde(default)]
    pub series_ids: Vec<String>,
    #[serde(default)]
    pub chapter_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ShareRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.series_ids.is_empty() && self.chapter_ids.is_empty() {
            return Err(DomainError::validation(
                "a share needs at least one series or chapter",
            ));
        }
        if self.expiration_days == Some(0) {
            return Err(DomainError::validation(
                "expiration must be at least one day",
            ));
        }
        Ok(())
    }

    pub fn expires_at(&self, now: OffsetDateTime) -> Option<OffsetDateTime> {
        self.expiration_days
            .map(|days| now + Duration::days(i64::from(days)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareResponse {
    pub share_id: String,
    pub share_url: String,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShareKind {
    Chapter,
    Chapters,
    Series,
    MultipleSeries,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedChapter {
    pub id: String,
    pub title: String,
    pub original_text: String,
    pub translated_text: String,
    pub series_name: String,
    pub series_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedContent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ShareKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub content: Vec<SharedChapter>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<OffsetDateTime>,
    pub is_password_protected: bool,
}

impl SharedContent {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }
}

/// Assemble the content of a new share.
///
/// Selected series contribute their fully translated chapters; selected
/// chapters are added individually unless their series is already selected.
/// Returns `None` when nothing qualifies.
pub fn build_shared_content(
    request: &ShareRequest,
    share_id: &str,
    series: &[Series],
    chapters: &[Chapter],
    now: OffsetDateTime,
) -> Option<SharedContent> {
    let from_series = chapters.iter().filter(|chapter| {
        request.series_ids.contains(&chapter.series_id) && chapter.is_translated
    });
    let individual = chapters.iter().filter(|chapter| {
        request.chapter_ids.contains(&chapter.id) && !request.series_ids.contains(&chapter.series_id)
    });

    let content: Vec<SharedChapter> = from_series
        .chain(individual)
        .map(|chapter| SharedChapter {
            id: chapter.id.clone(),
            title: chapter.title.clone(),
            original_text: chapter.content.clone(),
            translated_text: chapter.translated_content.clone(),
            series_name: series
                .iter()
                .find(|candidate| candidate.id == chapter.series_id)
                .map_or_else(|| UNKNOWN_SERIES.to_owned(), |found| found.name.clone()),
            series_id: chapter.series_id.clone(),
        })
        .collect();

    if content.is_empty() {
        return None;
    }

    let kind = match (request.series_ids.len(), content.len()) {
        (0, 1) => ShareKind::Chapter,
        (0, _) => ShareKind::Chapters,
        (1, _) => ShareKind::Series,
        _ => ShareKind::MultipleSeries,
    };

    Some(SharedContent {
        id: share_id.to_owned(),
        kind,
        title: request
            .title
            .clone()
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SHARE_TITLE.to_owned()),
        description: request.description.clone(),
        content,
        created_at: now,
        expires_at: request.expires_at(now),
        is_password_protected: request.password.is_some(),
    })
}

/// Usage of an existing share, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareStats {
    pub views: u64,
    pub total_chapters: usize,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<OffsetDateTime>,
}

/// Preview of what a share request covers, computed before it is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionStats {
    pub total_chapters: usize,
    pub total_series: usize,
    pub translated_paragraphs: usize,
    pub total_paragraphs: usize,
    pub translation_progress: u8,
}

/// Chapters picked directly or through their series, with paragraph totals.
/// `None` when nothing is selected.
pub fn selection_stats(request: &ShareRequest, chapters: &[Chapter]) -> Option<SelectionStats> {
    if request.series_ids.is_empty() && request.chapter_ids.is_empty() {
        return None;
    }

    let selected: Vec<&Chapter> = chapters
        .iter()
        .filter(|chapter| {
            request.chapter_ids.contains(&chapter.id)
                || request.series_ids.contains(&chapter.series_id)
        })
        .collect();

    let total_paragraphs: usize = selected
        .iter()
        .map(|chapter| chapter.original_paragraphs.len())
        .sum();
    let translated_paragraphs: usize = selected
        .iter()
        .map(|chapter| {
            chapter
                .translated_paragraphs
                .iter()
                .filter(|paragraph| !paragraph.trim().is_empty())
                .count()
        })
        .sum();
    let total_series = selected
        .iter()
        .map(|chapter| chapter.series_id.as_str())
        .collect::<HashSet<_>>()
        .len();
    let translation_progress = if total_paragraphs == 0 {
        0
    } else {
        ((translated_paragraphs * 100 + total_paragraphs / 2) / total_paragraphs).min(100) as u8
    };

    Some(SelectionStats {
        total_chapters: selected.len(),
        total_series,
        translated_paragraphs,
        total_paragraphs,
        translation_progress,
    })
}
