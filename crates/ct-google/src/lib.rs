//! Google Calendar v3 event source for caltrack.
//!
//! Implements [`EventSource`] over `GET calendars/{calendarId}/events` with
//! sync tokens, and lists an account's calendars. Authentication is a bearer
//! access token per account; obtaining and refreshing tokens is left to the
//! caller.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use ct_core::{AccountId, CalendarId, Event, EventPage, EventSource, ListRequest, SourceError};
use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::Client;
use serde::Deserialize;
use thiserror::Error;

/// Default request timeout for API calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const GOOGLE_CALENDAR_API_URL: &str = "https://www.googleapis.com/calendar/v3/";
/// Error reason Google reports alongside HTTP 410 for expired sync tokens.
const FULL_SYNC_REQUIRED: &str = "fullSyncRequired";

/// Source construction errors.
#[derive(Debug, Error)]
pub enum GoogleError {
    /// An access token was empty or whitespace-only.
    #[error("invalid access token for {account}: {reason}")]
    InvalidToken {
        account: AccountId,
        reason: &'static str,
    },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// The API base URL cannot carry path segments.
    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(String),
}

/// One entry of an account's calendar list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarInfo {
    pub id: CalendarId,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub primary: bool,
}

/// Google Calendar client.
///
/// # Thread Safety
///
/// The source is `Send + Sync`; sync workers share one connection pool.
pub struct GoogleCalendarSource {
    http: Client,
    base_url: Url,
    tokens: HashMap<AccountId, String>,
}

impl fmt::Debug for GoogleCalendarSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let accounts: Vec<&str> = self.tokens.keys().map(AccountId::as_str).collect();
        f.debug_struct("GoogleCalendarSource")
            .field("base_url", &self.base_url.as_str())
            .field("accounts", &accounts)
            .field("tokens", &"[REDACTED]")
            .finish()
    }
}

impl GoogleCalendarSource {
    /// Creates a source with one access token per account.
    pub fn new(tokens: HashMap<AccountId, String>) -> Result<Self, GoogleError> {
        for (account, token) in &tokens {
            if token.trim().is_empty() {
                return Err(GoogleError::InvalidToken {
                    account: account.clone(),
                    reason: "access token cannot be empty",
                });
            }
        }

        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(GoogleError::ClientBuild)?;
        let base_url = Url::parse(GOOGLE_CALENDAR_API_URL)
            .map_err(|e| GoogleError::InvalidBaseUrl(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            tokens,
        })
    }

    /// Points the source at another API root, e.g. a recording proxy.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, GoogleError> {
        let url = Url::parse(base_url).map_err(|e| GoogleError::InvalidBaseUrl(e.to_string()))?;
        if url.cannot_be_a_base() {
            return Err(GoogleError::InvalidBaseUrl(base_url.to_string()));
        }
        self.base_url = url;
        Ok(self)
    }

    /// Lists every calendar visible to `account`.
    pub fn list_calendars(&self, account: &AccountId) -> Result<Vec<CalendarInfo>, SourceError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct CalendarListResponse {
            #[serde(default)]
            items: Vec<CalendarInfo>,
            next_page_token: Option<String>,
        }

        let url = self.endpoint(&["users", "me", "calendarList"])?;
        let mut calendars = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = Vec::new();
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }
            let body = self.get(account, url.clone(), &query)?;
            let page: CalendarListResponse = serde_json::from_str(&body)
                .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;
            calendars.extend(page.items);
            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        Ok(calendars)
    }

    fn token(&self, account: &AccountId) -> Result<&str, SourceError> {
        self.tokens
            .get(account)
            .map(String::as_str)
            .ok_or_else(|| SourceError::UnknownAccount(account.clone()))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, SourceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| SourceError::InvalidResponse("API base URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn get(
        &self,
        account: &AccountId,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<String, SourceError> {
        let token = self.token(account)?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .map_err(|e| SourceError::Request(Box::new(e)))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| SourceError::Request(Box::new(e)))?;
        if !status.is_success() {
            return Err(api_error(status, &body));
        }
        Ok(body)
    }
}

impl EventSource for GoogleCalendarSource {
    fn list_events(&self, request: &ListRequest<'_>) -> Result<EventPage, SourceError> {
        let url = self.endpoint(&["calendars", request.calendar_id.as_str(), "events"])?;
        let body = self.get(request.account_id, url, &list_query(request))?;
        let page = parse_events_page(&body)?;
        tracing::debug!(
            calendar = %request.calendar_id,
            items = page.items.len(),
            more = page.next_page_cursor.is_some(),
            "listed events"
        );
        Ok(page)
    }
}

/// Query parameters for one events page.
fn list_query(request: &ListRequest<'_>) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("maxResults", request.max_results.to_string()),
        ("singleEvents", "true".to_string()),
        ("showDeleted", request.include_deleted.to_string()),
    ];
    if let Some(token) = request.continuation_token {
        query.push(("syncToken", token.to_string()));
    }
    if let Some(cursor) = request.page_cursor {
        query.push(("pageToken", cursor.to_string()));
    }
    query
}

/// Parses an events page, skipping items that do not form a valid event.
fn parse_events_page(body: &str) -> Result<EventPage, SourceError> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct EventsResponse {
        #[serde(default)]
        items: Vec<serde_json::Value>,
        next_page_token: Option<String>,
        next_sync_token: Option<String>,
    }

    let response: EventsResponse =
        serde_json::from_str(body).map_err(|e| SourceError::InvalidResponse(e.to_string()))?;

    let mut items = Vec::with_capacity(response.items.len());
    for item in response.items {
        match serde_json::from_value::<Event>(item) {
            Ok(event) => items.push(event),
            Err(e) => tracing::warn!(error = %e, "skipping malformed event item"),
        }
    }

    Ok(EventPage {
        items,
        next_page_cursor: response.next_page_token,
        next_continuation_token: response.next_sync_token,
    })
}

/// Maps an error response to a [`SourceError`].
///
/// An expired sync token is reported as HTTP 410 with reason
/// `fullSyncRequired`; either signal yields [`SourceError::TokenInvalid`].
fn api_error(status: StatusCode, body: &str) -> SourceError {
    #[derive(Deserialize)]
    struct ErrorPayload {
        error: ErrorDetails,
    }

    #[derive(Deserialize)]
    struct ErrorDetails {
        #[serde(default)]
        message: String,
        #[serde(default)]
        errors: Vec<ErrorItem>,
    }

    #[derive(Deserialize)]
    struct ErrorItem {
        #[serde(default)]
        reason: String,
    }

    let details = serde_json::from_str::<ErrorPayload>(body).ok().map(|p| p.error);
    let full_sync_required = details
        .as_ref()
        .is_some_and(|d| d.errors.iter().any(|e| e.reason == FULL_SYNC_REQUIRED));
    let message = details
        .map(|d| d.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("status {status}: {body}"));

    if status == StatusCode::GONE || full_sync_required {
        SourceError::TokenInvalid { message }
    } else {
        SourceError::Api {
            status: status.as_u16(),
            message,
        }
    }
}
