//! Client core for a novel translation workbench.
//!
//! Series, chapter, glossary and share reads are served through a request
//! cache that collapses concurrent identical requests into one backend call,
//! expires results by TTL and drops them by tag after mutations.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
