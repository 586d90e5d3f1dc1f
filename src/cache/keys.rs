//! Cache key and tag definitions.
//!
//! A `CacheKey` addresses both the store and the in-flight tracker, so two
//! logically identical requests must derive the same key and two different
//! requests must never share one.

use std::fmt;

use serde::Serialize;

/// Identity of a cacheable operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Use a caller-built key verbatim.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key for a named operation and its arguments.
    ///
    /// Arguments are rendered as compact JSON, so every argument (including
    /// `None`) participates in the key: `getGlossaryTerms:["s1",null]`.
    pub fn for_call<A: Serialize + ?Sized>(method: &str, args: &A) -> Self {
        let rendered =
            serde_json::to_string(args).unwrap_or_else(|_| String::from("<unserializable>"));
        Self(format!("{method}:{rendered}"))
    }

    /// Key for an HTTP request: `METHOD:endpoint:body`.
    pub fn for_request(method: &str, endpoint: &str, body: Option<&str>) -> Self {
        Self(format!(
            "{}:{endpoint}:{}",
            method.to_ascii_uppercase(),
            body.unwrap_or_default()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Label for coarse bulk invalidation after a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(String);

impl Tag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// All series listings.
    pub fn series() -> Self {
        Self::new("series")
    }

    /// All chapter listings.
    pub fn chapters() -> Self {
        Self::new("chapters")
    }

    /// All glossary term listings.
    pub fn glossary() -> Self {
        Self::new("glossary")
    }

    /// Shared content lookups.
    pub fn shares() -> Self {
        Self::new("shares")
    }

    /// Glossary suggestions derived from text.
    pub fn suggestions() -> Self {
        Self::new("suggestions")
    }

    /// Every read scoped to one series.
    pub fn series_scope(series_id: &str) -> Self {
        Self(format!("series:{series_id}"))
    }

    /// Every read scoped to one chapter.
    pub fn chapter_scope(chapter_id: &str) -> Self {
        Self(format!("chapter:{chapter_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Tag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
