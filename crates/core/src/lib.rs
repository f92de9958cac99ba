#![warn(clippy::all, missing_docs)]

//! Core domain logic for the gamerec terminal client.
//!
//! This crate hosts the data models, configuration handling, the
//! search-and-select form controller, and the provider HTTP client
//! used by the terminal UI and any future frontends.

pub mod api;
pub mod config;
pub mod form;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use config::AppConfig;
pub use form::{EntryId, GameForm, SearchRequest, SearchedEntry, SubmitRequest};
pub use models::{Game, RatedGame};
