//! Application services: the backend contract and the cached client over it.

pub mod api;
pub mod client;
pub mod editor;
pub mod error;
pub mod translation;
