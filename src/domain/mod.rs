//! Domain layer types and invariants.

pub mod chapters;
pub mod editor;
pub mod entities;
pub mod envelope;
pub mod error;
pub mod glossary;
pub mod sharing;
