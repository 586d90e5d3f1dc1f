//! JSON REST backend over `reqwest`.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::application::api::{BackendError, BackendResult, NovelApi};
use crate::config::ApiSettings;
use crate::domain::entities::{
    Chapter, ChapterPatch, GlossaryTerm, GlossaryTermPatch, NewChapter, NewGlossaryTerm, Series,
    SeriesPatch,
};
use crate::domain::envelope::ApiResponse;
use crate::domain::sharing::{ShareRequest, ShareResponse, ShareStats, SharedContent};

use super::error::InfraError;

#[derive(Clone, Debug)]
pub struct HttpNovelApi {
    client: Client,
    base: Url,
}

impl HttpNovelApi {
    pub fn new(settings: &ApiSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(settings.timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Self::with_client(client, settings.base_url.clone())
    }

    pub fn with_client(client: Client, base: Url) -> Result<Self, InfraError> {
        if base.cannot_be_a_base() {
            return Err(InfraError::configuration(format!(
                "api base url `{base}` cannot carry paths"
            )));
        }
        Ok(Self { client, base })
    }

    pub fn user_agent() -> &'static str {
        concat!("novella/", env!("CARGO_PKG_VERSION"))
    }

    /// `base` with `segments` appended, each percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        self.client.request(method, self.endpoint(segments))
    }

    /// GET with the present `(name, value)` pairs as the query string.
    fn get_with_query(&self, segments: &[&str], query: &[(&str, Option<&str>)]) -> RequestBuilder {
        let mut url = self.endpoint(segments);
        let present: Vec<_> = query
            .iter()
            .filter_map(|(name, value)| value.map(|value| (*name, value)))
            .collect();
        if !present.is_empty() {
            url.query_pairs_mut().extend_pairs(present);
        }
        self.client.get(url)
    }

    fn post<B: Serialize + ?Sized>(&self, segments: &[&str], body: &B) -> RequestBuilder {
        self.request(Method::POST, segments).json(body)
    }

    fn patch<B: Serialize + ?Sized>(&self, segments: &[&str], body: &B) -> RequestBuilder {
        self.request(Method::PATCH, segments).json(body)
    }

    /// Send and decode the 2xx body as the payload of a successful envelope.
    async fn fetch<T: DeserializeOwned + Send>(&self, request: RequestBuilder) -> BackendResult<T> {
        let response = request.send().await.map_err(map_send_error)?;
        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "Backend rejected request");
            return Ok(status_failure(status));
        }
        let bytes = response.bytes().await.map_err(map_send_error)?;
        let payload = serde_json::from_slice(&bytes).map_err(BackendError::decode)?;
        Ok(ApiResponse::ok(payload))
    }

    /// Send and ignore any 2xx body.
    async fn execute(&self, request: RequestBuilder) -> BackendResult<()> {
        let response = request.send().await.map_err(map_send_error)?;
        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "Backend rejected request");
            return Ok(status_failure(status));
        }
        Ok(ApiResponse::empty())
    }
}

fn map_send_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout
    } else if err.is_decode() {
        BackendError::decode(err)
    } else {
        BackendError::transport(err)
    }
}

fn status_failure<T>(status: StatusCode) -> ApiResponse<T> {
    ApiResponse::failure(format!(
        "HTTP {}: {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown Status")
    ))
}

#[async_trait]
impl NovelApi for HttpNovelApi {
    async fn get_series(&self) -> BackendResult<Vec<Series>> {
        self.fetch(self.request(Method::GET, &["series"])).await
    }

    async fn get_series_by_id(&self, series_id: &str) -> BackendResult<Series> {
        self.fetch(self.request(Method::GET, &["series", series_id]))
            .await
    }

    async fn create_series(&self, name: &str, description: Option<&str>) -> BackendResult<Series> {
        let body = json!({ "name": name, "description": description });
        self.fetch(self.post(&["series"], &body)).await
    }

    async fn update_series(&self, series_id: &str, patch: &SeriesPatch) -> BackendResult<Series> {
        self.fetch(self.patch(&["series", series_id], patch)).await
    }

    async fn delete_series(&self, series_id: &str) -> BackendResult<()> {
        self.execute(self.request(Method::DELETE, &["series", series_id]))
            .await
    }

    async fn get_chapters(&self, series_id: Option<&str>) -> BackendResult<Vec<Chapter>> {
        self.fetch(self.get_with_query(&["chapters"], &[("seriesId", series_id)]))
            .await
    }

    async fn create_chapter(&self, input: &NewChapter) -> BackendResult<Chapter> {
        self.fetch(self.post(&["chapters"], input)).await
    }

    async fn update_chapter(
        &self,
        chapter_id: &str,
        patch: &ChapterPatch,
    ) -> BackendResult<Chapter> {
        self.fetch(self.patch(&["chapters", chapter_id], patch)).await
    }

    async fn delete_chapter(&self, chapter_id: &str) -> BackendResult<()> {
        self.execute(self.request(Method::DELETE, &["chapters", chapter_id]))
            .await
    }

    async fn get_glossary_terms(
        &self,
        series_id: Option<&str>,
        chapter_id: Option<&str>,
    ) -> BackendResult<Vec<GlossaryTerm>> {
        let query = [("seriesId", series_id), ("chapterId", chapter_id)];
        self.fetch(self.get_with_query(&["glossary-terms"], &query))
            .await
    }

    async fn create_glossary_term(&self, input: &NewGlossaryTerm) -> BackendResult<GlossaryTerm> {
        self.fetch(self.post(&["glossary-terms"], input)).await
    }

    async fn update_glossary_term(
        &self,
        term_id: &str,
        patch: &GlossaryTermPatch,
    ) -> BackendResult<GlossaryTerm> {
        self.fetch(self.patch(&["glossary-terms", term_id], patch))
            .await
    }

    async fn delete_glossary_term(&self, term_id: &str) -> BackendResult<()> {
        self.execute(self.request(Method::DELETE, &["glossary-terms", term_id]))
            .await
    }

    async fn suggest_glossary_terms(&self, text: &str) -> BackendResult<Vec<String>> {
        let body = json!({ "text": text });
        self.fetch(self.post(&["glossary-terms", "suggest"], &body))
            .await
    }

    async fn translate_text(
        &self,
        text: &str,
        glossary_context: &[String],
    ) -> BackendResult<String> {
        let body = json!({ "text": text, "glossaryContext": glossary_context });
        self.fetch(self.post(&["translate"], &body)).await
    }

    async fn translate_paragraph(
        &self,
        text: &str,
        chapter_id: &str,
        paragraph_index: usize,
        glossary_context: &[String],
    ) -> BackendResult<String> {
        let body = json!({
            "text": text,
            "chapterId": chapter_id,
            "paragraphIndex": paragraph_index,
            "glossaryContext": glossary_context,
        });
        self.fetch(self.post(&["translate", "paragraph"], &body))
            .await
    }

    async fn retranslate_with_glossary(
        &self,
        original_text: &str,
        current_translation: &str,
        glossary_terms: &[String],
    ) -> BackendResult<String> {
        let body = json!({
            "originalText": original_text,
            "currentTranslation": current_translation,
            "glossaryTerms": glossary_terms,
        });
        self.fetch(self.post(&["translate", "retranslate"], &body))
            .await
    }

    async fn create_share(&self, request: &ShareRequest) -> BackendResult<ShareResponse> {
        self.fetch(self.post(&["shares"], request)).await
    }

    async fn get_shared_content(&self, share_id: &str) -> BackendResult<SharedContent> {
        self.fetch(self.request(Method::GET, &["shares", share_id]))
            .await
    }

    async fn verify_share_password(&self, share_id: &str, password: &str) -> BackendResult<bool> {
        let body = json!({ "password": password });
        self.fetch(self.post(&["shares", share_id, "verify"], &body))
            .await
    }

    async fn delete_share(&self, share_id: &str) -> BackendResult<()> {
        self.execute(self.request(Method::DELETE, &["shares", share_id]))
            .await
    }

    async fn list_shares(&self) -> BackendResult<Vec<SharedContent>> {
        self.fetch(self.request(Method::GET, &["shares"])).await
    }

    async fn get_share_stats(&self, share_id: &str) -> BackendResult<ShareStats> {
        self.fetch(self.request(Method::GET, &["shares", share_id, "stats"]))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn api(base: &str) -> HttpNovelApi {
        HttpNovelApi::new(&ApiSettings {
            base_url: Url::parse(base).expect("base url"),
            timeout: Duration::from_secs(1),
        })
        .expect("client")
    }

    #[test]
    fn endpoints_extend_the_base_path() {
        let api = api("http://localhost:3000/api");
        assert_eq!(
            api.endpoint(&["series", "s1"]).as_str(),
            "http://localhost:3000/api/series/s1"
        );

        let trailing = self::api("http://localhost:3000/api/");
        assert_eq!(
            trailing.endpoint(&["shares", "abc", "verify"]).as_str(),
            "http://localhost:3000/api/shares/abc/verify"
        );
    }

    #[test]
    fn share_stats_live_under_the_share() {
        let api = api("http://localhost:3000/api");
        let request = api
            .request(Method::GET, &["shares", "share-1", "stats"])
            .build()
            .expect("request");
        assert_eq!(request.method(), &Method::GET);
        assert_eq!(
            request.url().as_str(),
            "http://localhost:3000/api/shares/share-1/stats"
        );
    }

    #[test]
    fn ids_are_percent_encoded() {
        let api = api("http://localhost:3000/api");
        assert_eq!(
            api.endpoint(&["chapters", "a/b c"]).as_str(),
            "http://localhost:3000/api/chapters/a%2Fb%20c"
        );
    }

    #[test]
    fn absent_filters_are_left_out_of_the_query() {
        let api = api("http://localhost:3000/api");
        let request = api
            .get_with_query(&["glossary-terms"], &[("seriesId", Some("s1")), ("chapterId", None)])
            .build()
            .expect("request");
        assert_eq!(
            request.url().as_str(),
            "http://localhost:3000/api/glossary-terms?seriesId=s1"
        );
    }

    #[test]
    fn non_success_status_becomes_failed_envelope() {
        let response: ApiResponse<()> = status_failure(StatusCode::NOT_FOUND);
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("HTTP 404: Not Found"));
    }

    #[test]
    fn opaque_urls_are_rejected() {
        let url = Url::parse("mailto:someone@example.com").expect("url");
        assert!(HttpNovelApi::with_client(Client::new(), url).is_err());
    }
}
