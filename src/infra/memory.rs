//! In-process backend with seeded data.
//!
//! Used by tests and for running the client without a server. Latency is
//! simulated with `tokio::time::sleep`, so a paused test clock controls it.
//! Failures are injected explicitly (`fail_next`, `reject_next`) or every
//! n-th translation call (`with_translation_failure_every`).

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use time::macros::datetime;
use tracing::debug;
use uuid::Uuid;

use crate::application::api::{BackendError, BackendResult, NovelApi};
use crate::domain::chapters::split_paragraphs;
use crate::domain::entities::{
    Chapter, ChapterPatch, GlossaryTerm, GlossaryTermPatch, NewChapter, NewGlossaryTerm, Series,
    SeriesPatch, TermCategory,
};
use crate::domain::envelope::ApiResponse;
use crate::domain::glossary::{GlossaryScope, is_duplicate_term, suggest_terms};
use crate::domain::sharing::{
    ShareRequest, ShareResponse, ShareStats, SharedContent, build_shared_content,
};

const DEFAULT_SHARE_ORIGIN: &str = "http://localhost:5173";

#[derive(Debug, Default)]
struct MemoryState {
    series: Vec<Series>,
    chapters: Vec<Chapter>,
    terms: Vec<GlossaryTerm>,
    shares: HashMap<String, StoredShare>,
}

#[derive(Debug, Clone)]
struct StoredShare {
    content: SharedContent,
    password: Option<String>,
    views: u64,
}

/// `NovelApi` over in-memory collections.
pub struct InMemoryNovelApi {
    state: Mutex<MemoryState>,
    latency: Range<Duration>,
    share_origin: String,
    translation_failure_every: Option<NonZeroU64>,
    translation_calls: AtomicU64,
    fail_next: AtomicUsize,
    reject_next: AtomicUsize,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl Default for InMemoryNovelApi {
    fn default() -> Self {
        Self::empty()
    }
}

impl InMemoryNovelApi {
    /// A backend with no data and no latency.
    pub fn empty() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            latency: Duration::ZERO..Duration::ZERO,
            share_origin: DEFAULT_SHARE_ORIGIN.to_owned(),
            translation_failure_every: None,
            translation_calls: AtomicU64::new(0),
            fail_next: AtomicUsize::new(0),
            reject_next: AtomicUsize::new(0),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// A backend holding the two demo series with their chapters and glossary.
    pub fn seeded() -> Self {
        let backend = Self::empty();
        {
            let mut state = backend.state();
            state.series = seed_series();
            state.chapters = seed_chapters();
            state.terms = seed_terms();
            let MemoryState {
                series, chapters, ..
            } = &mut *state;
            for entry in series.iter_mut() {
                entry.chapter_ids = chapters
                    .iter()
                    .filter(|chapter| chapter.series_id == entry.id)
                    .map(|chapter| chapter.id.clone())
                    .collect();
            }
        }
        backend
    }

    /// Delay every call by a duration within `latency`.
    pub fn with_latency(mut self, latency: Range<Duration>) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_share_origin(mut self, origin: impl Into<String>) -> Self {
        self.share_origin = origin.into();
        self
    }

    /// Reject every `every`-th translation call with a failed envelope.
    pub fn with_translation_failure_every(mut self, every: NonZeroU64) -> Self {
        self.translation_failure_every = Some(every);
        self
    }

    /// The next `count` calls fail in transit.
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// The next `count` calls complete with `success: false`.
    pub fn reject_next(&self, count: usize) {
        self.reject_next.store(count, Ordering::SeqCst);
    }

    /// How many times `operation` (e.g. `"get_series"`) has been called.
    pub fn calls(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call, wait out the simulated latency and apply injected
    /// failures. `Ok(Some(_))` short-circuits with a rejected envelope.
    async fn enter<T: Send>(&self, operation: &'static str) -> Result<Option<ApiResponse<T>>, BackendError> {
        let call = {
            let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
            let count = calls.entry(operation).or_insert(0);
            *count += 1;
            *count
        };

        let delay = self.delay_for(call);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if take_one(&self.fail_next) {
            debug!(operation, "Injected transport failure");
            return Err(BackendError::transport(format!("{operation}: injected failure")));
        }
        if take_one(&self.reject_next) {
            debug!(operation, "Injected rejection");
            return Ok(Some(ApiResponse::failure(format!(
                "{operation}: injected rejection"
            ))));
        }
        Ok(None)
    }

    async fn enter_translation<T: Send>(
        &self,
        operation: &'static str,
        failure_message: &str,
    ) -> Result<Option<ApiResponse<T>>, BackendError> {
        if let Some(rejected) = self.enter(operation).await? {
            return Ok(Some(rejected));
        }
        let nth = self.translation_calls.fetch_add(1, Ordering::SeqCst) + 1;
        match self.translation_failure_every {
            Some(every) if nth % every.get() == 0 => Ok(Some(ApiResponse::failure(failure_message))),
            _ => Ok(None),
        }
    }

    /// Deterministic spread over the latency range, cycling with the call count.
    fn delay_for(&self, call: usize) -> Duration {
        let Range { start, end } = self.latency.clone();
        if end <= start {
            return start;
        }
        let span = (end - start).as_millis().max(1) as u64;
        let step = (call as u64).wrapping_mul(97) % span;
        start + Duration::from_millis(step)
    }

    fn share_url(&self, share_id: &str) -> String {
        format!("{}/share/{share_id}", self.share_origin.trim_end_matches('/'))
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok()
}

fn next_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4())
}

fn context_note(glossary_context: &[String]) -> String {
    if glossary_context.is_empty() {
        String::new()
    } else {
        format!(" (applying glossary: {})", glossary_context.join(", "))
    }
}

#[async_trait]
impl NovelApi for InMemoryNovelApi {
    async fn get_series(&self) -> BackendResult<Vec<Series>> {
        if let Some(rejected) = self.enter("get_series").await? {
            return Ok(rejected);
        }
        Ok(ApiResponse::ok(self.state().series.clone()))
    }

    async fn get_series_by_id(&self, series_id: &str) -> BackendResult<Series> {
        if let Some(rejected) = self.enter("get_series_by_id").await? {
            return Ok(rejected);
        }
        match self.state().series.iter().find(|series| series.id == series_id) {
            Some(series) => Ok(ApiResponse::ok(series.clone())),
            None => Ok(ApiResponse::failure("Series not found")),
        }
    }

    async fn create_series(&self, name: &str, description: Option<&str>) -> BackendResult<Series> {
        if let Some(rejected) = self.enter("create_series").await? {
            return Ok(rejected);
        }
        let series = Series {
            id: next_id("s"),
            name: name.to_owned(),
            description: description.map(str::to_owned),
            created_at: OffsetDateTime::now_utc(),
            chapter_ids: Vec::new(),
        };
        self.state().series.push(series.clone());
        Ok(ApiResponse::ok(series))
    }

    async fn update_series(&self, series_id: &str, patch: &SeriesPatch) -> BackendResult<Series> {
        if let Some(rejected) = self.enter("update_series").await? {
            return Ok(rejected);
        }
        let mut state = self.state();
        let Some(series) = state.series.iter_mut().find(|series| series.id == series_id) else {
            return Ok(ApiResponse::failure("Series not found"));
        };
        patch.clone().apply(series);
        Ok(ApiResponse::ok(series.clone()))
    }

    async fn delete_series(&self, series_id: &str) -> BackendResult<()> {
        if let Some(rejected) = self.enter("delete_series").await? {
            return Ok(rejected);
        }
        let mut state = self.state();
        let before = state.series.len();
        state.series.retain(|series| series.id != series_id);
        if state.series.len() == before {
            return Ok(ApiResponse::failure("Series not found"));
        }
        state.chapters.retain(|chapter| chapter.series_id != series_id);
        state.terms.retain(|term| term.series_id != series_id);
        Ok(ApiResponse::empty())
    }

    async fn get_chapters(&self, series_id: Option<&str>) -> BackendResult<Vec<Chapter>> {
        if let Some(rejected) = self.enter("get_chapters").await? {
            return Ok(rejected);
        }
        let chapters = self
            .state()
            .chapters
            .iter()
            .filter(|chapter| series_id.is_none_or(|id| chapter.series_id == id))
            .cloned()
            .collect();
        Ok(ApiResponse::ok(chapters))
    }

    async fn create_chapter(&self, input: &NewChapter) -> BackendResult<Chapter> {
        if let Some(rejected) = self.enter("create_chapter").await? {
            return Ok(rejected);
        }
        let mut state = self.state();
        let Some(series) = state
            .series
            .iter_mut()
            .find(|series| series.id == input.series_id)
        else {
            return Ok(ApiResponse::failure("Failed to create chapter"));
        };
        let chapter = input.clone().into_chapter(next_id("ch"));
        series.chapter_ids.push(chapter.id.clone());
        state.chapters.push(chapter.clone());
        Ok(ApiResponse::ok(chapter))
    }

    async fn update_chapter(
        &self,
        chapter_id: &str,
        patch: &ChapterPatch,
    ) -> BackendResult<Chapter> {
        if let Some(rejected) = self.enter("update_chapter").await? {
            return Ok(rejected);
        }
        let mut state = self.state();
        let Some(chapter) = state
            .chapters
            .iter_mut()
            .find(|chapter| chapter.id == chapter_id)
        else {
            return Ok(ApiResponse::failure("Chapter not found"));
        };
        patch.clone().apply(chapter);
        Ok(ApiResponse::ok(chapter.clone()))
    }

    async fn delete_chapter(&self, chapter_id: &str) -> BackendResult<()> {
        if let Some(rejected) = self.enter("delete_chapter").await? {
            return Ok(rejected);
        }
        let mut state = self.state();
        let Some(position) = state
            .chapters
            .iter()
            .position(|chapter| chapter.id == chapter_id)
        else {
            return Ok(ApiResponse::failure("Chapter not found"));
        };
        let removed = state.chapters.remove(position);
        if let Some(series) = state
            .series
            .iter_mut()
            .find(|series| series.id == removed.series_id)
        {
            series.chapter_ids.retain(|id| id != chapter_id);
        }
        Ok(ApiResponse::empty())
    }

    async fn get_glossary_terms(
        &self,
        series_id: Option<&str>,
        chapter_id: Option<&str>,
    ) -> BackendResult<Vec<GlossaryTerm>> {
        if let Some(rejected) = self.enter("get_glossary_terms").await? {
            return Ok(rejected);
        }
        let scope = GlossaryScope::from_ids(series_id, chapter_id);
        Ok(ApiResponse::ok(scope.filter(&self.state().terms)))
    }

    async fn create_glossary_term(&self, input: &NewGlossaryTerm) -> BackendResult<GlossaryTerm> {
        if let Some(rejected) = self.enter("create_glossary_term").await? {
            return Ok(rejected);
        }
        let mut state = self.state();
        if is_duplicate_term(&state.terms, &input.series_id, &input.term) {
            return Ok(ApiResponse::failure("Term already exists in this series"));
        }
        let term = input.clone().into_term(next_id("term"));
        state.terms.push(term.clone());
        Ok(ApiResponse::ok(term))
    }

    async fn update_glossary_term(
        &self,
        term_id: &str,
        patch: &GlossaryTermPatch,
    ) -> BackendResult<GlossaryTerm> {
        if let Some(rejected) = self.enter("update_glossary_term").await? {
            return Ok(rejected);
        }
        let mut state = self.state();
        let Some(term) = state.terms.iter_mut().find(|term| term.id == term_id) else {
            return Ok(ApiResponse::failure("Glossary term not found"));
        };
        patch.clone().apply(term);
        Ok(ApiResponse::ok(term.clone()))
    }

    async fn delete_glossary_term(&self, term_id: &str) -> BackendResult<()> {
        if let Some(rejected) = self.enter("delete_glossary_term").await? {
            return Ok(rejected);
        }
        let mut state = self.state();
        let before = state.terms.len();
        state.terms.retain(|term| term.id != term_id);
        if state.terms.len() == before {
            return Ok(ApiResponse::failure("Glossary term not found"));
        }
        Ok(ApiResponse::empty())
    }

    async fn suggest_glossary_terms(&self, text: &str) -> BackendResult<Vec<String>> {
        if let Some(rejected) = self.enter("suggest_glossary_terms").await? {
            return Ok(rejected);
        }
        Ok(ApiResponse::ok(suggest_terms(text)))
    }

    async fn translate_text(
        &self,
        text: &str,
        glossary_context: &[String],
    ) -> BackendResult<String> {
        if let Some(rejected) = self
            .enter_translation("translate_text", "Translation service temporarily unavailable")
            .await?
        {
            return Ok(rejected);
        }
        Ok(ApiResponse::ok(format!(
            "[Mock Translation]{} {text}",
            context_note(glossary_context)
        )))
    }

    async fn translate_paragraph(
        &self,
        text: &str,
        chapter_id: &str,
        paragraph_index: usize,
        glossary_context: &[String],
    ) -> BackendResult<String> {
        if let Some(rejected) = self
            .enter_translation("translate_paragraph", "Paragraph translation failed")
            .await?
        {
            return Ok(rejected);
        }
        Ok(ApiResponse::ok(format!(
            "[Mock Translation - Ch:{chapter_id}, P:{paragraph_index}]{} {text}",
            context_note(glossary_context)
        )))
    }

    async fn retranslate_with_glossary(
        &self,
        original_text: &str,
        _current_translation: &str,
        glossary_terms: &[String],
    ) -> BackendResult<String> {
        if let Some(rejected) = self
            .enter_translation("retranslate_with_glossary", "Retranslation failed")
            .await?
        {
            return Ok(rejected);
        }
        Ok(ApiResponse::ok(format!(
            "[Mock Retranslation with: {}] {original_text}",
            glossary_terms.join(", ")
        )))
    }

    async fn create_share(&self, request: &ShareRequest) -> BackendResult<ShareResponse> {
        if let Some(rejected) = self.enter("create_share").await? {
            return Ok(rejected);
        }
        let share_id = next_id("share");
        let now = OffsetDateTime::now_utc();
        let mut state = self.state();
        let Some(content) =
            build_shared_content(request, &share_id, &state.series, &state.chapters, now)
        else {
            return Ok(ApiResponse::failure("Failed to create share link"));
        };
        let response = ShareResponse {
            share_url: self.share_url(&share_id),
            share_id: share_id.clone(),
            expires_at: content.expires_at,
        };
        state.shares.insert(
            share_id,
            StoredShare {
                content,
                password: request.password.clone(),
                views: 0,
            },
        );
        Ok(ApiResponse::ok(response))
    }

    async fn get_shared_content(&self, share_id: &str) -> BackendResult<SharedContent> {
        if let Some(rejected) = self.enter("get_shared_content").await? {
            return Ok(rejected);
        }
        let mut state = self.state();
        let Some(stored) = state.shares.get_mut(share_id) else {
            return Ok(ApiResponse::failure("Share not found or has expired"));
        };
        if stored.content.is_expired(OffsetDateTime::now_utc()) {
            state.shares.remove(share_id);
            return Ok(ApiResponse::failure("Share has expired"));
        }
        stored.views += 1;
        Ok(ApiResponse::ok(stored.content.clone()))
    }

    async fn verify_share_password(&self, share_id: &str, password: &str) -> BackendResult<bool> {
        if let Some(rejected) = self.enter("verify_share_password").await? {
            return Ok(rejected);
        }
        let state = self.state();
        let Some(stored) = state.shares.get(share_id) else {
            return Ok(ApiResponse::failure("Share not found or has expired"));
        };
        Ok(ApiResponse::ok(stored.password.as_deref() == Some(password)))
    }

    async fn delete_share(&self, share_id: &str) -> BackendResult<()> {
        if let Some(rejected) = self.enter("delete_share").await? {
            return Ok(rejected);
        }
        self.state().shares.remove(share_id);
        Ok(ApiResponse::empty())
    }

    async fn list_shares(&self) -> BackendResult<Vec<SharedContent>> {
        if let Some(rejected) = self.enter("list_shares").await? {
            return Ok(rejected);
        }
        let mut shares: Vec<SharedContent> = self
            .state()
            .shares
            .values()
            .map(|stored| stored.content.clone())
            .collect();
        shares.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(ApiResponse::ok(shares))
    }

    async fn get_share_stats(&self, share_id: &str) -> BackendResult<ShareStats> {
        if let Some(rejected) = self.enter("get_share_stats").await? {
            return Ok(rejected);
        }
        let state = self.state();
        let Some(stored) = state.shares.get(share_id) else {
            return Ok(ApiResponse::failure("Share not found"));
        };
        Ok(ApiResponse::ok(ShareStats {
            views: stored.views,
            total_chapters: stored.content.content.len(),
            created_at: stored.content.created_at,
            expires_at: stored.content.expires_at,
        }))
    }
}

fn seed_series() -> Vec<Series> {
    vec![
        Series {
            id: "s1".into(),
            name: "Swallowed Star 2: Origin Continent".into(),
            description: Some(
                "Luo Feng, accompanied by Boundary Beast Morosa, traversed reincarnation and arrived at the Origin Continent."
                    .into(),
            ),
            created_at: datetime!(2024-01-15 0:00 UTC),
            chapter_ids: Vec::new(),
        },
        Series {
            id: "s2".into(),
            name: "Tales of the Ancient Realm".into(),
            description: Some(
                "Epic stories from a world where magic and technology coexist".into(),
            ),
            created_at: datetime!(2024-02-01 0:00 UTC),
            chapter_ids: Vec::new(),
        },
    ]
}

fn seed_chapter(id: &str, series_id: &str, title: &str, content: &str) -> Chapter {
    Chapter {
        id: id.into(),
        title: title.into(),
        content: content.into(),
        translated_content: String::new(),
        original_paragraphs: split_paragraphs(content),
        translated_paragraphs: Vec::new(),
        series_id: series_id.into(),
        is_translated: false,
    }
}

fn seed_chapters() -> Vec<Chapter> {
    let mut first = seed_chapter(
        "ch1",
        "s1",
        "Chapter 1: The Beginning",
        "The sun rose over the ancient mountains, casting long shadows across the valley below.\n\n\
         In the small village of Elderbrook, life moved at a peaceful pace. The cobblestone streets were lined with quaint houses.\n\n\
         Young Aria stepped out of her cottage, breathing in the crisp morning air.\n\n\
         The old wizard had promised to teach her the ancient arts, but first, she needed to prove herself worthy.",
    );
    first.translated_paragraphs = vec![
        "El sol se alzó sobre las montañas ancestrales, proyectando largas sombras a través del valle."
            .into(),
    ];
    first.translated_paragraphs.resize(first.original_paragraphs.len(), String::new());

    vec![
        first,
        seed_chapter(
            "ch2",
            "s1",
            "Chapter 2: The Test",
            "The wizard's tower loomed before Aria, its spiraling architecture defying conventional understanding.\n\n\
             Ancient runes glowed softly along the stone walls, pulsing with an otherworldly energy.\n\n\
             \"Enter, young seeker,\" came a voice from within, though no one was visible at the entrance.\n\n\
             Aria took a deep breath and crossed the threshold, her destiny awaiting within.",
        ),
        seed_chapter(
            "ch3",
            "s2",
            "Prologue: The Ancient Realm",
            "Long ago, the Ancient Realm was a place where magic and machines lived side by side.\n\n\
             Its cities floated above clouds, held aloft by engines older than memory.",
        ),
    ]
}

fn seed_term(
    id: &str,
    term: &str,
    translation: &str,
    category: TermCategory,
    series_id: &str,
    chapter_id: Option<&str>,
) -> GlossaryTerm {
    GlossaryTerm {
        id: id.into(),
        term: term.into(),
        definition: String::new(),
        translation: translation.into(),
        category,
        frequency: 1,
        is_user_defined: chapter_id.is_none(),
        series_id: series_id.into(),
        chapter_id: chapter_id.map(str::to_owned),
        chapter_ids: None,
    }
}

fn seed_terms() -> Vec<GlossaryTerm> {
    vec![
        seed_term("term1", "Elderbrook", "Arroyo del Anciano", TermCategory::Place, "s1", Some("ch1")),
        seed_term("term2", "Aria", "Aria", TermCategory::Character, "s1", Some("ch1")),
        seed_term("term3", "ancient arts", "artes ancestrales", TermCategory::Cultural, "s1", Some("ch1")),
        seed_term("term4", "wizard", "mago", TermCategory::Character, "s1", Some("ch1")),
        seed_term("term5", "runes", "runas", TermCategory::Cultural, "s1", Some("ch2")),
        seed_term("term6", "tower", "torre", TermCategory::Place, "s1", Some("ch2")),
        seed_term("term7", "Ancient Realm", "Reino Ancestral", TermCategory::Place, "s2", Some("ch3")),
        seed_term("term8", "Magic Council", "Consejo Mágico", TermCategory::Cultural, "s1", None),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_term(series_id: &str, term: &str) -> NewGlossaryTerm {
        NewGlossaryTerm {
            term: term.into(),
            definition: String::new(),
            translation: "x".into(),
            category: TermCategory::Other,
            is_user_defined: true,
            series_id: series_id.into(),
            chapter_id: None,
            chapter_ids: None,
        }
    }

    #[tokio::test]
    async fn seeded_series_list_their_chapters() {
        let backend = InMemoryNovelApi::seeded();
        let series = backend.get_series().await.expect("call").data.expect("data");

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].chapter_ids, vec!["ch1", "ch2"]);
        assert_eq!(series[1].chapter_ids, vec!["ch3"]);
    }

    #[tokio::test]
    async fn chapter_scope_includes_series_wide_terms() {
        let backend = InMemoryNovelApi::seeded();
        let terms = backend
            .get_glossary_terms(Some("s1"), Some("ch2"))
            .await
            .expect("call")
            .data
            .expect("data");

        let ids: Vec<&str> = terms.iter().map(|term| term.id.as_str()).collect();
        assert_eq!(ids, vec!["term5", "term6", "term8"]);
    }

    #[tokio::test]
    async fn duplicate_terms_are_rejected_per_series() {
        let backend = InMemoryNovelApi::seeded();

        let duplicate = backend
            .create_glossary_term(&new_term("s1", "WIZARD"))
            .await
            .expect("call");
        assert!(!duplicate.success);
        assert_eq!(duplicate.error.as_deref(), Some("Term already exists in this series"));

        let other_series = backend
            .create_glossary_term(&new_term("s2", "wizard"))
            .await
            .expect("call");
        assert!(other_series.success);
        assert!(other_series.data.expect("term").id.starts_with("term-"));
    }

    #[tokio::test]
    async fn created_chapters_are_split_and_linked() {
        let backend = InMemoryNovelApi::seeded();
        let chapter = backend
            .create_chapter(&NewChapter {
                title: "Chapter 3".into(),
                content: "First line.\n\n  Second line.  \n".into(),
                series_id: "s1".into(),
                translated_content: None,
            })
            .await
            .expect("call")
            .data
            .expect("chapter");

        assert_eq!(chapter.original_paragraphs, vec!["First line.", "Second line."]);
        let series = backend.get_series().await.expect("call").data.expect("data");
        assert!(series[0].chapter_ids.contains(&chapter.id));
    }

    #[tokio::test]
    async fn missing_entities_return_failed_envelopes() {
        let backend = InMemoryNovelApi::seeded();
        let response = backend
            .update_chapter("nope", &ChapterPatch::default())
            .await
            .expect("call");
        assert_eq!(response.error.as_deref(), Some("Chapter not found"));
        assert!(!backend.delete_series("nope").await.expect("call").success);
    }

    #[tokio::test]
    async fn shares_verify_their_password() {
        let backend = InMemoryNovelApi::seeded();
        let request = ShareRequest {
            chapter_ids: vec!["ch1".into()],
            password: Some("open sesame".into()),
            ..Default::default()
        };
        let share = backend
            .create_share(&request)
            .await
            .expect("call")
            .data
            .expect("share");
        assert!(share.share_url.ends_with(&format!("/share/{}", share.share_id)));

        let content = backend
            .get_shared_content(&share.share_id)
            .await
            .expect("call")
            .data
            .expect("content");
        assert!(content.is_password_protected);

        let wrong = backend.verify_share_password(&share.share_id, "guess").await;
        assert_eq!(wrong.expect("call").data, Some(false));
        let right = backend.verify_share_password(&share.share_id, "open sesame").await;
        assert_eq!(right.expect("call").data, Some(true));
    }

    #[tokio::test]
    async fn single_series_lookup() {
        let backend = InMemoryNovelApi::seeded();
        let series = backend
            .get_series_by_id("s2")
            .await
            .expect("call")
            .data
            .expect("series");
        assert_eq!(series.name, "Tales of the Ancient Realm");
        assert_eq!(series.chapter_ids, vec!["ch3"]);

        let missing = backend.get_series_by_id("s9").await.expect("call");
        assert_eq!(missing.error.as_deref(), Some("Series not found"));
    }

    #[tokio::test]
    async fn share_stats_count_views() {
        let backend = InMemoryNovelApi::seeded();
        let share = backend
            .create_share(&ShareRequest {
                chapter_ids: vec!["ch1".into(), "ch3".into()],
                expiration_days: Some(3),
                ..Default::default()
            })
            .await
            .expect("call")
            .data
            .expect("share");

        for _ in 0..3 {
            assert!(backend.get_shared_content(&share.share_id).await.expect("call").success);
        }
        let stats = backend
            .get_share_stats(&share.share_id)
            .await
            .expect("call")
            .data
            .expect("stats");

        assert_eq!(stats.views, 3);
        assert_eq!(stats.total_chapters, 2);
        assert_eq!(stats.expires_at, share.expires_at);

        let missing = backend.get_share_stats("share-none").await.expect("call");
        assert_eq!(missing.error.as_deref(), Some("Share not found"));
    }

    #[tokio::test]
    async fn share_list_holds_every_share() {
        let backend = InMemoryNovelApi::seeded();
        assert!(backend.list_shares().await.expect("call").data.expect("list").is_empty());

        let mut created = Vec::new();
        for chapter in ["ch1", "ch3"] {
            let share = backend
                .create_share(&ShareRequest {
                    chapter_ids: vec![chapter.into()],
                    ..Default::default()
                })
                .await
                .expect("call")
                .data
                .expect("share");
            created.push(share.share_id);
        }

        let listed = backend.list_shares().await.expect("call").data.expect("list");
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|share| created.contains(&share.id)));
        assert!(listed[0].created_at >= listed[1].created_at);
    }

    #[tokio::test]
    async fn share_without_translated_content_fails() {
        let backend = InMemoryNovelApi::seeded();
        let request = ShareRequest {
            series_ids: vec!["s2".into()],
            ..Default::default()
        };
        let response = backend.create_share(&request).await.expect("call");
        assert_eq!(response.error.as_deref(), Some("Failed to create share link"));
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let backend = InMemoryNovelApi::seeded();
        backend.fail_next(1);
        backend.reject_next(1);

        assert!(matches!(
            backend.get_series().await,
            Err(BackendError::Transport(_))
        ));
        assert!(!backend.get_series().await.expect("call").success);
        assert!(backend.get_series().await.expect("call").success);
        assert_eq!(backend.calls("get_series"), 3);
    }

    #[tokio::test]
    async fn every_nth_translation_is_rejected() {
        let backend = InMemoryNovelApi::empty()
            .with_translation_failure_every(NonZeroU64::new(2).expect("non-zero"));

        let first = backend.translate_text("hello", &[]).await.expect("call");
        let second = backend.translate_text("hello", &[]).await.expect("call");

        assert_eq!(first.data.as_deref(), Some("[Mock Translation] hello"));
        assert_eq!(
            second.error.as_deref(),
            Some("Translation service temporarily unavailable")
        );
    }

    #[tokio::test]
    async fn translation_mentions_glossary_context() {
        let backend = InMemoryNovelApi::empty();
        let text = backend
            .translate_paragraph("Aria waits.", "ch1", 2, &["Aria => Aria".into()])
            .await
            .expect("call")
            .data
            .expect("text");
        assert_eq!(
            text,
            "[Mock Translation - Ch:ch1, P:2] (applying glossary: Aria => Aria) Aria waits."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn latency_uses_the_tokio_clock() {
        let backend = InMemoryNovelApi::empty()
            .with_latency(Duration::from_millis(300)..Duration::from_millis(300));
        let started = tokio::time::Instant::now();

        backend.get_series().await.expect("call");

        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }
}
