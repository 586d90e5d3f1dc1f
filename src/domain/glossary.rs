//! Glossary scoping, term highlighting and term suggestion.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use super::entities::GlossaryTerm;
use super::error::DomainError;

const MAX_SUGGESTIONS: usize = 5;
const MIN_SUGGESTION_OCCURRENCES: usize = 2;

static SUGGESTION_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w{4,}\b").expect("suggestion word pattern is valid"));

/// Which glossary terms apply to a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlossaryScope {
    /// Every term.
    All,
    /// Terms belonging to one series.
    Series(String),
    /// Terms bound to one chapter, plus the series-wide terms of its series.
    Chapter {
        series_id: Option<String>,
        chapter_id: String,
    },
}

impl GlossaryScope {
    pub fn from_ids(series_id: Option<&str>, chapter_id: Option<&str>) -> Self {
        match (series_id, chapter_id) {
            (series_id, Some(chapter_id)) => Self::Chapter {
                series_id: series_id.map(str::to_owned),
                chapter_id: chapter_id.to_owned(),
            },
            (Some(series_id), None) => Self::Series(series_id.to_owned()),
            (None, None) => Self::All,
        }
    }

    pub fn contains(&self, term: &GlossaryTerm) -> bool {
        match self {
            Self::All => true,
            Self::Series(series_id) => term.series_id == *series_id,
            Self::Chapter {
                series_id,
                chapter_id,
            } => {
                let series_wide = term.chapter_id.is_none()
                    && series_id.as_deref() == Some(term.series_id.as_str());
                let bound = term.chapter_id.as_deref() == Some(chapter_id.as_str());
                let listed = term
                    .chapter_ids
                    .as_ref()
                    .is_some_and(|ids| ids.iter().any(|id| id == chapter_id));
                series_wide || bound || listed
            }
        }
    }

    pub fn filter<'a>(
        &self,
        terms: impl IntoIterator<Item = &'a GlossaryTerm>,
    ) -> Vec<GlossaryTerm> {
        terms
            .into_iter()
            .filter(|term| self.contains(term))
            .cloned()
            .collect()
    }
}

/// True when another term in `existing` has the same text, ignoring case,
/// within the same series.
pub fn is_duplicate_term(existing: &[GlossaryTerm], series_id: &str, text: &str) -> bool {
    let needle = text.to_lowercase();
    existing
        .iter()
        .any(|term| term.series_id == series_id && term.term.to_lowercase() == needle)
}

/// A located glossary occurrence in some text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermMatch {
    pub start: usize,
    pub end: usize,
    pub term_id: String,
}

/// Case-insensitive multi-term matcher over a glossary.
///
/// Both a term's source text and its translation are matched. All patterns
/// are compiled into one alternation ordered longest first, so the text is
/// scanned once and overlapping terms resolve to the longest candidate.
#[derive(Debug, Clone)]
pub struct GlossaryMatcher {
    pattern: Option<Regex>,
    /// Term id for capture group `i + 1`.
    owners: Vec<String>,
}

impl GlossaryMatcher {
    pub fn new<'a>(terms: impl IntoIterator<Item = &'a GlossaryTerm>) -> Result<Self, DomainError> {
        let mut candidates: Vec<(&str, &str)> = Vec::new();
        for term in terms {
            for text in [term.term.as_str(), term.translation.as_str()] {
                let text = text.trim();
                if !text.is_empty() {
                    candidates.push((text, term.id.as_str()));
                }
            }
        }
        candidates.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));

        let mut seen = HashSet::new();
        let mut owners = Vec::new();
        let mut alternatives = Vec::new();
        for (text, id) in candidates {
            if !seen.insert(text.to_lowercase()) {
                continue;
            }
            alternatives.push(format!("({})", regex::escape(text)));
            owners.push(id.to_owned());
        }

        if alternatives.is_empty() {
            return Ok(Self {
                pattern: None,
                owners,
            });
        }

        let pattern = RegexBuilder::new(&alternatives.join("|"))
            .case_insensitive(true)
            .build()
            .map_err(|err| DomainError::invariant(format!("glossary pattern: {err}")))?;

        Ok(Self {
            pattern: Some(pattern),
            owners,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_none()
    }

    /// Non-overlapping matches, left to right.
    pub fn find(&self, text: &str) -> Vec<TermMatch> {
        let Some(pattern) = &self.pattern else {
            return Vec::new();
        };
        pattern
            .captures_iter(text)
            .filter_map(|captures| {
                let (group, found) = captures
                    .iter()
                    .enumerate()
                    .skip(1)
                    .find_map(|(group, found)| found.map(|found| (group, found)))?;
                Some(TermMatch {
                    start: found.start(),
                    end: found.end(),
                    term_id: self.owners.get(group - 1)?.clone(),
                })
            })
            .collect()
    }

    /// HTML with every occurrence wrapped in a `glossary-highlight` span.
    /// Text outside and inside the spans is escaped.
    pub fn highlight(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        for found in self.find(text) {
            push_escaped(&mut out, &text[cursor..found.start]);
            let _ = write!(
                out,
                r#"<span class="glossary-highlight glossary-popup" data-term-id="{}">"#,
                escape_html(&found.term_id)
            );
            push_escaped(&mut out, &text[found.start..found.end]);
            out.push_str("</span>");
            cursor = found.end;
        }
        push_escaped(&mut out, &text[cursor..]);
        out
    }

    /// Ids of the terms that occur in `text`, in first-occurrence order.
    pub fn terms_in(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.find(text)
            .into_iter()
            .filter_map(|found| seen.insert(found.term_id.clone()).then_some(found.term_id))
            .collect()
    }
}

fn push_escaped(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    push_escaped(&mut out, text);
    out
}

/// Words of four or more characters repeated at least twice, most frequent
/// first; ties keep first-occurrence order. At most five.
pub fn suggest_terms(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for word in SUGGESTION_WORD.find_iter(&lowered).map(|m| m.as_str()) {
        let count = counts.entry(word).or_insert(0);
        if *count == 0 {
            order.push(word);
        }
        *count += 1;
    }

    let mut ranked: Vec<(&str, usize)> = order
        .into_iter()
        .map(|word| (word, counts[word]))
        .filter(|(_, count)| *count >= MIN_SUGGESTION_OCCURRENCES)
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(word, _)| word.to_owned())
        .collect()
}
