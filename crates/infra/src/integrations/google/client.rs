//! Google Calendar v3 client
//!
//! Implements [`RemoteCalendarClient`] over `reqwest`. Every non-success
//! answer is classified into a [`RemoteError`] so the executor can decide
//! whether to retry, recreate or give up. No retries happen here.

use std::time::Duration;

use async_trait::async_trait;
use calsync_core::RemoteCalendarClient;
use calsync_domain::constants::APP_SOURCE;
use calsync_domain::{
    AccessToken, CalSyncError, EventPayload, EventQuery, GoogleConfig, RemoteError, RemoteEvent,
    Result,
};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use super::types::{GoogleCreatedEvent, GoogleErrorEnvelope, GoogleEventBody, GoogleEventsResponse};
use crate::errors::InfraError;

/// Upper bound on pages fetched by one `list_events` call.
const MAX_LIST_PAGES: usize = 20;

const RATE_LIMIT_REASONS: [&str; 2] = ["rateLimitExceeded", "userRateLimitExceeded"];

/// Google Calendar API client
#[derive(Clone)]
pub struct GoogleCalendarClient {
    http: Client,
    base_url: Url,
}

impl GoogleCalendarClient {
    /// Build a client from the `google` configuration section.
    pub fn new(config: &GoogleConfig) -> Result<Self> {
        Self::with_base_url(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Build a client against an explicit API root (used by tests).
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|err| {
            CalSyncError::Config(format!("invalid calendar API base url {base_url}: {err}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(CalSyncError::Config(format!(
                "calendar API base url cannot carry a path: {base_url}"
            )));
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| CalSyncError::from(InfraError::from(err)))?;

        Ok(Self { http, base_url })
    }

    fn events_url(&self, calendar_id: &str, event_id: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["calendars", calendar_id, "events"]);
            if let Some(event_id) = event_id {
                segments.push(event_id);
            }
        }
        url
    }

    fn request(&self, method: Method, url: Url, token: &AccessToken) -> RequestBuilder {
        self.http.request(method, url).bearer_auth(token.secret())
    }

    async fn send(&self, builder: RequestBuilder) -> std::result::Result<Response, RemoteError> {
        let response = builder.send().await.map_err(map_send_error)?;
        let status = response.status();
        debug!(%status, url = %response.url().path(), "calendar API response");

        if status.is_success() {
            Ok(response)
        } else {
            Err(classify_failure(response).await)
        }
    }

    async fn list_page(
        &self,
        token: &AccessToken,
        calendar_id: &str,
        params: &[(&str, String)],
    ) -> std::result::Result<GoogleEventsResponse, RemoteError> {
        let url = self.events_url(calendar_id, None);
        let response = self.send(self.request(Method::GET, url, token).query(params)).await?;
        decode(response).await
    }
}

#[async_trait]
impl RemoteCalendarClient for GoogleCalendarClient {
    #[instrument(skip(self, token, event), fields(item = %event.source))]
    async fn create_event(
        &self,
        token: &AccessToken,
        calendar_id: &str,
        event: &EventPayload,
    ) -> std::result::Result<String, RemoteError> {
        let url = self.events_url(calendar_id, None);
        let body = GoogleEventBody::from(event);
        let response = self.send(self.request(Method::POST, url, token).json(&body)).await?;
        let created: GoogleCreatedEvent = decode(response).await?;
        debug!(remote_event_id = %created.id, "calendar event created");
        Ok(created.id)
    }

    #[instrument(skip(self, token, event), fields(item = %event.source))]
    async fn update_event(
        &self,
        token: &AccessToken,
        calendar_id: &str,
        remote_event_id: &str,
        event: &EventPayload,
    ) -> std::result::Result<(), RemoteError> {
        let url = self.events_url(calendar_id, Some(remote_event_id));
        let body = GoogleEventBody::from(event);
        self.send(self.request(Method::PUT, url, token).json(&body)).await?;
        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn delete_event(
        &self,
        token: &AccessToken,
        calendar_id: &str,
        remote_event_id: &str,
    ) -> std::result::Result<(), RemoteError> {
        let url = self.events_url(calendar_id, Some(remote_event_id));
        self.send(self.request(Method::DELETE, url, token)).await?;
        Ok(())
    }

    #[instrument(skip(self, token, query))]
    async fn list_events(
        &self,
        token: &AccessToken,
        calendar_id: &str,
        query: &EventQuery,
    ) -> std::result::Result<Vec<RemoteEvent>, RemoteError> {
        let base_params = list_params(query);
        let limit = query.max_results.map(|max| max as usize);

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let mut params = base_params.clone();
            if let Some(page) = page_token.take() {
                params.push(("pageToken", page));
            }

            let page = self.list_page(token, calendar_id, &params).await?;
            events.extend(page.items.into_iter().map(RemoteEvent::from));

            if limit.is_some_and(|limit| events.len() >= limit) {
                break;
            }
            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        if let Some(limit) = limit {
            events.truncate(limit);
        }
        debug!(count = events.len(), "calendar events listed");
        Ok(events)
    }
}

fn list_params(query: &EventQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("singleEvents", "true".to_string()),
        ("orderBy", "startTime".to_string()),
    ];
    if let Some(time_min) = query.time_min {
        params.push(("timeMin", rfc3339(time_min)));
    }
    if let Some(time_max) = query.time_max {
        params.push(("timeMax", rfc3339(time_max)));
    }
    if let Some(max_results) = query.max_results {
        params.push(("maxResults", max_results.to_string()));
    }
    if query.only_app_events {
        params.push(("privateExtendedProperty", format!("appSource={APP_SOURCE}")));
    }
    params
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

async fn decode<T: DeserializeOwned>(response: Response) -> std::result::Result<T, RemoteError> {
    let status = response.status();
    response.json::<T>().await.map_err(|err| RemoteError::Permanent {
        status: Some(status.as_u16()),
        message: format!("undecodable calendar API response: {err}"),
    })
}

fn map_send_error(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Transient(format!("calendar API request timed out: {err}"))
    } else if err.is_connect() {
        RemoteError::Transient(format!("calendar API unreachable: {err}"))
    } else if err.is_builder() {
        RemoteError::Permanent { status: None, message: format!("invalid request: {err}") }
    } else {
        RemoteError::Transient(format!("calendar API request failed: {err}"))
    }
}

async fn classify_failure(response: Response) -> RemoteError {
    let status = response.status();
    let retry_after = parse_retry_after(response.headers(), Utc::now());
    let body = response.text().await.unwrap_or_default();
    classify_status(status, retry_after, &body)
}

/// Map a non-success status (and its Google error body) to a [`RemoteError`].
pub(crate) fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> RemoteError {
    let envelope: GoogleErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    let message = envelope
        .error
        .message
        .clone()
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown status").to_string());
    let rate_limited = envelope.error.errors.iter().any(|detail| {
        detail.reason.as_deref().is_some_and(|reason| RATE_LIMIT_REASONS.contains(&reason))
    });

    match status.as_u16() {
        401 => RemoteError::Unauthorized(message),
        403 if rate_limited => RemoteError::RateLimited { retry_after, message },
        404 | 410 => RemoteError::NotFound(message),
        429 => RemoteError::RateLimited { retry_after, message },
        500..=599 => RemoteError::Transient(format!("HTTP {}: {message}", status.as_u16())),
        code => RemoteError::Permanent { status: Some(code), message },
    }
}

/// `Retry-After` as delta-seconds or an HTTP date relative to `now`.
pub(crate) fn parse_retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use reqwest::header::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn retry_after_accepts_seconds_and_http_dates() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 30).unwrap();

        assert_eq!(parse_retry_after(&headers("7"), now), Some(Duration::from_secs(7)));
        assert_eq!(
            parse_retry_after(&headers("Wed, 21 Oct 2015 07:28:00 GMT"), now),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            parse_retry_after(&headers("Wed, 21 Oct 2015 07:00:00 GMT"), now),
            Some(Duration::ZERO)
        );
        assert_eq!(parse_retry_after(&headers("soon"), now), None);
        assert_eq!(parse_retry_after(&HeaderMap::new(), now), None);
    }

    #[test]
    fn quota_403_is_rate_limited_but_plain_403_is_permanent() {
        let quota = r#"{"error":{"code":403,"message":"Rate Limit Exceeded","errors":[{"reason":"userRateLimitExceeded"}]}}"#;
        let forbidden = r#"{"error":{"code":403,"message":"Forbidden","errors":[{"reason":"forbidden"}]}}"#;

        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, None, quota),
            RemoteError::RateLimited { .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, None, forbidden),
            RemoteError::Permanent { status: Some(403), .. }
        ));
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, None, ""),
            RemoteError::Unauthorized(_)
        ));
        assert!(matches!(classify_status(StatusCode::GONE, None, ""), RemoteError::NotFound(_)));
        assert!(matches!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE, None, "oops"),
            RemoteError::Transient(_)
        ));
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, Some(Duration::from_secs(2)), "")
                .retry_after(),
            Some(Duration::from_secs(2))
        );
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, None, "{}"),
            RemoteError::Permanent { status: Some(400), .. }
        ));
    }

    #[test]
    fn event_urls_escape_identifiers() {
        let client = GoogleCalendarClient::with_base_url(
            "https://example.test/calendar/v3/",
            Duration::from_secs(1),
        )
        .unwrap();
        let url = client.events_url("team@group.calendar.google.com", Some("evt/1"));
        assert_eq!(
            url.as_str(),
            "https://example.test/calendar/v3/calendars/team@group.calendar.google.com/events/evt%2F1"
        );
    }
}
