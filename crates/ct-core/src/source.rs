//! The remote calendar as seen by the reconciliation engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::Event;
use crate::types::{AccountId, CalendarId};

/// Remote source errors.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The continuation token was rejected as invalid or expired. The only
    /// condition the engine recovers from, by running a full resync.
    #[error("continuation token is no longer valid: {message}")]
    TokenInvalid { message: String },
    /// The remote API answered with an error.
    #[error("remote API error ({status}): {message}")]
    Api { status: u16, message: String },
    /// The request never produced a response.
    #[error("request failed: {0}")]
    Request(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The response could not be parsed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// No credentials are configured for the account.
    #[error("no credentials for account {0}")]
    UnknownAccount(AccountId),
}

impl SourceError {
    /// Whether the engine should discard its cache and resync from scratch.
    pub const fn is_token_invalid(&self) -> bool {
        matches!(self, Self::TokenInvalid { .. })
    }
}

/// Parameters of one page request.
#[derive(Debug, Clone, Copy)]
pub struct ListRequest<'a> {
    pub account_id: &'a AccountId,
    pub calendar_id: &'a CalendarId,
    /// Token from the previous completed pass; `None` asks for a full listing.
    pub continuation_token: Option<&'a str>,
    /// Cursor for the next page within the current pass.
    pub page_cursor: Option<&'a str>,
    pub max_results: u32,
    /// Ask for deletion markers (`cancelled` items).
    pub include_deleted: bool,
}

/// One page of changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPage {
    #[serde(default)]
    pub items: Vec<Event>,
    /// Present while more pages remain in this pass.
    #[serde(default)]
    pub next_page_cursor: Option<String>,
    /// Present on the final page of a pass.
    #[serde(default)]
    pub next_continuation_token: Option<String>,
}

/// A remote calendar listing events for an account.
pub trait EventSource: Send + Sync {
    /// Fetches one page of events or changes.
    fn list_events(&self, request: &ListRequest<'_>) -> Result<EventPage, SourceError>;
}

impl<S: EventSource + ?Sized> EventSource for &S {
    fn list_events(&self, request: &ListRequest<'_>) -> Result<EventPage, SourceError> {
        (**self).list_events(request)
    }
}
