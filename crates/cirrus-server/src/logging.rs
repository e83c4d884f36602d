// cirrus-server/src/logging.rs
// ============================================================================
// Module: Request Logging
// Description: Sink-based per-request logging for debug mode.
// Purpose: Emit one JSON line per request to stderr when enabled; stay
//          silent otherwise.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Request logging follows a sink design: handlers never know whether logs
//! are enabled. The stderr sink writes one JSON object per request; the noop
//! sink drops events. The CLI picks the sink from the configured log level.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;

// ============================================================================
// SECTION: Events
// ============================================================================

/// One request's log record.
#[derive(Debug, Clone, Serialize)]
pub struct RequestLogEvent {
    /// HTTP method.
    pub method: String,
    /// Request path as received from the client.
    pub path: String,
    /// Response status code.
    pub status: u16,
    /// Handler duration in milliseconds.
    pub duration_ms: u128,
    /// Activity id stamped on the response.
    pub activity_id: Option<String>,
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Destination for request log events.
pub trait RequestLogSink: Send + Sync {
    /// Records one request.
    fn log(&self, event: &RequestLogEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRequestLog;

impl RequestLogSink for NoopRequestLog {
    fn log(&self, _event: &RequestLogEvent) {}
}

/// Sink that writes one JSON line per request to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrRequestLog;

impl RequestLogSink for StderrRequestLog {
    fn log(&self, event: &RequestLogEvent) {
        if let Ok(line) = serde_json::to_string(event) {
            eprintln!("{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_as_flat_json() {
        let event = RequestLogEvent {
            method: "GET".to_string(),
            path: "/dbs".to_string(),
            status: 200,
            duration_ms: 3,
            activity_id: Some("a-1".to_string()),
        };
        let line = serde_json::to_string(&event).expect("serializes");
        assert!(line.contains("\"method\":\"GET\""));
        assert!(line.contains("\"status\":200"));
    }
}
