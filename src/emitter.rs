//! Response emission for matched routes.
//!
//! A [`BoundRoute`] holds everything needed to answer a request: status,
//! headers, serialized body and the decoded latency. It is built once per
//! route during compilation and shared read-only by every request.

use crate::config::RouteEntry;
use crate::error::ConfigError;
use crate::latency::LatencyOffset;
use axum::body::{Body, Bytes};
use axum::http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use tracing::debug;

/// Content type written when a route does not configure one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Static response content bound to one route.
#[derive(Debug, Clone)]
pub struct BoundRoute {
    path: String,
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    latency: LatencyOffset,
}

impl BoundRoute {
    /// Validate and bind an entry's response content.
    pub fn from_entry(entry: &RouteEntry, latency: LatencyOffset) -> Result<Self, ConfigError> {
        let status = match entry.status_code {
            0 => StatusCode::OK,
            code @ 100..=599 => {
                StatusCode::from_u16(code).map_err(|_| invalid_status(entry))?
            }
            _ => return Err(invalid_status(entry)),
        };

        let mut headers = HeaderMap::with_capacity(entry.header.len() + 1);
        for (name, value) in &entry.header {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| invalid_header(entry, name, e.to_string()))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| invalid_header(entry, name, e.to_string()))?;
            // Header names are case-insensitive
            if headers.insert(header_name, header_value).is_some() {
                return Err(invalid_header(
                    entry,
                    name,
                    "configured more than once (header names are case-insensitive)".to_string(),
                ));
            }
        }
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
        }

        // An absent body is written as JSON null
        let body = match &entry.body {
            Some(value) => value.to_string(),
            None => "null".to_string(),
        };

        Ok(Self {
            path: entry.path.clone(),
            status,
            headers,
            body: Bytes::from(body),
            latency,
        })
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn latency(&self) -> LatencyOffset {
        self.latency
    }

    /// Frame the response: headers, then status and body.
    pub fn build_response(&self) -> Response {
        let mut response = Response::new(Body::empty());
        *response.headers_mut() = self.headers.clone();
        *response.status_mut() = self.status;
        *response.body_mut() = Body::from(self.body.clone());
        response
    }

    /// Answer one request.
    ///
    /// The response is framed first, then the task sleeps for the sampled
    /// delay, then the response is handed back to the transport.
    pub async fn emit(&self) -> Response {
        let response = self.build_response();

        let delay = self.latency.delay();
        if !delay.is_zero() {
            debug!(
                path = %self.path,
                delay_ms = delay.as_millis() as u64,
                "Applying delay"
            );
            tokio::time::sleep(delay).await;
        }

        response
    }
}

fn invalid_status(entry: &RouteEntry) -> ConfigError {
    ConfigError::InvalidStatus {
        method: entry.method.clone(),
        path: entry.path.clone(),
        status: entry.status_code,
    }
}

fn invalid_header(entry: &RouteEntry, name: &str, reason: String) -> ConfigError {
    ConfigError::InvalidHeader {
        method: entry.method.clone(),
        path: entry.path.clone(),
        name: name.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::{Duration, Instant};

    #[test]
    fn test_defaults() {
        let route = BoundRoute::from_entry(&RouteEntry::new("GET", "/"), LatencyOffset::None).unwrap();
        assert_eq!(route.status(), StatusCode::OK);
        assert_eq!(route.body().as_ref(), b"null");
        assert_eq!(route.headers()[CONTENT_TYPE], DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn test_configured_content_type_wins() {
        let mut entry = RouteEntry::new("GET", "/text");
        entry.status_code = 418;
        entry.header.insert("Content-Type".into(), "text/plain".into());
        entry.header.insert("X-Trace".into(), "abc".into());
        entry.body = Some(json!("teapot"));

        let route = BoundRoute::from_entry(&entry, LatencyOffset::None).unwrap();
        let response = route.build_response();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
        assert_eq!(response.headers()["x-trace"], "abc");
        assert_eq!(response.headers().get_all(CONTENT_TYPE).iter().count(), 1);
        assert_eq!(route.body().as_ref(), b"\"teapot\"");
    }

    #[test]
    fn test_invalid_status() {
        for status in [1, 99, 600, 999] {
            let mut entry = RouteEntry::new("GET", "/bad");
            entry.status_code = status;
            let err = BoundRoute::from_entry(&entry, LatencyOffset::None).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidStatus { .. }), "status {status}");
        }
    }

    #[test]
    fn test_invalid_header() {
        let mut entry = RouteEntry::new("GET", "/bad");
        entry.header.insert("Bad Header".into(), "x".into());
        let err = BoundRoute::from_entry(&entry, LatencyOffset::None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidHeader { .. }));

        let mut entry = RouteEntry::new("GET", "/bad");
        entry.header.insert("X-Ok".into(), "line\nbreak".into());
        assert!(BoundRoute::from_entry(&entry, LatencyOffset::None).is_err());
    }

    #[test]
    fn test_header_names_differing_in_case_rejected() {
        let mut entry = RouteEntry::new("GET", "/dup-header");
        entry.header.insert("X-A".into(), "one".into());
        entry.header.insert("x-a".into(), "two".into());

        let err = BoundRoute::from_entry(&entry, LatencyOffset::None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidHeader { .. }));
        assert!(err.to_string().contains("more than once"));
    }

    #[tokio::test]
    async fn test_emit_waits_for_delay() {
        let route = BoundRoute::from_entry(
            &RouteEntry::new("GET", "/slow"),
            LatencyOffset::Constant { ms: 60.0 },
        )
        .unwrap();

        let start = Instant::now();
        let response = route.emit().await;
        assert!(start.elapsed() >= Duration::from_millis(60));
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_emit_negative_delay_returns_immediately() {
        let route = BoundRoute::from_entry(
            &RouteEntry::new("GET", "/fast"),
            LatencyOffset::Constant { ms: -50.0 },
        )
        .unwrap();

        let start = Instant::now();
        route.emit().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
