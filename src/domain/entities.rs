//! Domain entities exchanged with the backend.
//!
//! Field names serialize in camelCase to match the REST payloads.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::error::DomainError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub chapter_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SeriesPatch {
    pub fn validate(&self) -> Result<(), DomainError> {
        match &self.name {
            Some(name) if name.trim().is_empty() => {
                Err(DomainError::validation("series name must not be empty"))
            }
            _ => Ok(()),
        }
    }

    pub fn apply(self, series: &mut Series) {
        if let Some(name) = self.name {
            series.name = name;
        }
        if let Some(description) = self.description {
            series.description = Some(description);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub translated_content: String,
    #[serde(default)]
    pub original_paragraphs: Vec<String>,
    #[serde(default)]
    pub translated_paragraphs: Vec<String>,
    pub series_id: String,
    #[serde(default)]
    pub is_translated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChapter {
    pub title: String,
    pub content: String,
    pub series_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_paragraphs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_paragraphs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_translated: Option<bool>,
}

/// Kind of glossary entry. Unknown categories from the backend map to `Other`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermCategory {
    Character,
    Place,
    Cultural,
    Idiom,
    #[default]
    #[serde(other)]
    Other,
}

impl TermCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            TermCategory::Character => "character",
            TermCategory::Place => "place",
            TermCategory::Cultural => "cultural",
            TermCategory::Idiom => "idiom",
            TermCategory::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlossaryTerm {
    pub id: String,
    pub term: String,
    #[serde(default)]
    pub definition: String,
    pub translation: String,
    #[serde(default)]
    pub category: TermCategory,
    #[serde(default)]
    pub frequency: u32,
    #[serde(default)]
    pub is_user_defined: bool,
    pub series_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_ids: Option<Vec<String>>,
}

/// A glossary term before the backend assigns its id and frequency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGlossaryTerm {
    pub term: String,
    #[serde(default)]
    pub definition: String,
    pub translation: String,
    #[serde(default)]
    pub category: TermCategory,
    #[serde(default)]
    pub is_user_defined: bool,
    pub series_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_ids: Option<Vec<String>>,
}

impl NewGlossaryTerm {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.term.trim().is_empty() {
            return Err(DomainError::validation("glossary term must not be empty"));
        }
        if self.translation.trim().is_empty() {
            return Err(DomainError::validation(
                "glossary translation must not be empty",
            ));
        }
        if self.series_id.is_empty() {
            return Err(DomainError::validation("glossary term needs a series"));
        }
        Ok(())
    }

    /// Materialize with a backend-assigned id. New terms start at frequency 1.
    pub fn into_term(self, id: String) -> GlossaryTerm {
        GlossaryTerm {
            id,
            term: self.term,
            definition: self.definition,
            translation: self.translation,
            category: self.category,
            frequency: 1,
            is_user_defined: self.is_user_defined,
            series_id: self.series_id,
            chapter_id: self.chapter_id,
            chapter_ids: self.chapter_ids,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlossaryTermPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<TermCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_ids: Option<Vec<String>>,
}

impl GlossaryTermPatch {
    pub fn apply(self, term: &mut GlossaryTerm) {
        if let Some(text) = self.term {
            term.term = text;
        }
        if let Some(definition) = self.definition {
            term.definition = definition;
        }
        if let Some(translation) = self.translation {
            term.translation = translation;
        }
        if let Some(category) = self.category {
            term.category = category;
        }
        if let Some(frequency) = self.frequency {
            term.frequency = frequency;
        }
        if let Some(chapter_ids) = self.chapter_ids {
            term.chapter_ids = Some(chapter_ids);
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn glossary_term_uses_camel_case() {
        let term: GlossaryTerm = serde_json::from_value(json!({
            "id": "t1",
            "term": "Lin Feng",
            "definition": "Protagonist",
            "translation": "林风",
            "category": "character",
            "frequency": 12,
            "isUserDefined": false,
            "seriesId": "s1",
            "chapterIds": ["ch1", "ch2"]
        }))
        .expect("deserialize");

        assert_eq!(term.category, TermCategory::Character);
        assert_eq!(term.chapter_id, None);
        assert_eq!(term.chapter_ids.as_deref().map(<[String]>::len), Some(2));
    }

    #[test]
    fn unknown_category_maps_to_other() {
        let category: TermCategory = serde_json::from_value(json!("technique")).expect("category");
        assert_eq!(category, TermCategory::Other);
    }

    #[test]
    fn new_term_requires_text_and_translation() {
        let mut input = NewGlossaryTerm {
            term: "  ".into(),
            definition: String::new(),
            translation: "x".into(),
            category: TermCategory::Other,
            is_user_defined: true,
            series_id: "s1".into(),
            chapter_id: None,
            chapter_ids: None,
        };
        assert!(matches!(
            input.validate(),
            Err(DomainError::Validation { .. })
        ));

        input.term = "Azure Cloud Sect".into();
        assert!(input.validate().is_ok());
        assert_eq!(input.into_term("t9".into()).frequency, 1);
    }

    #[test]
    fn series_patch_rejects_blank_name() {
        let patch = SeriesPatch {
            name: Some(" ".into()),
            description: None,
        };
        assert!(patch.validate().is_err());
    }
}
