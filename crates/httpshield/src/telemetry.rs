//! Request span telemetry.
//!
//! A span wraps each logical request: one `start` event when the engine
//! accepts it and exactly one `stop` event on every exit path: success,
//! halt, failure, or caller cancellation (the span's drop guard covers the
//! last case). Panics inside stages or the adapter are converted to
//! `middleware_error` results, so they surface through the `stop` event's
//! error kind rather than a separate exception channel.

use httpshield_core::events::{EventListeners, PipelineEvent};
use httpshield_core::{sanitize_url, Error, Request, Response};
use std::time::{Duration, Instant};

/// Span events wrapping one logical request.
#[derive(Debug, Clone)]
pub enum RequestEvent {
    /// The engine accepted a request.
    Started {
        /// Request method.
        method: String,
        /// Sanitized URL: no query, no fragment, no default port.
        url: String,
        timestamp: Instant,
    },
    /// The request settled.
    Finished {
        /// Request method.
        method: String,
        /// Sanitized URL.
        url: String,
        timestamp: Instant,
        /// Wall time from start to settle.
        duration: Duration,
        /// Final status for successful outcomes.
        status: Option<u16>,
        /// Error reason for failed outcomes; `"cancelled"` when the caller
        /// dropped the request future.
        error: Option<&'static str>,
        /// Retry attempts beyond the first.
        retries: u32,
    },
}

impl PipelineEvent for RequestEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RequestEvent::Started { .. } => "start",
            RequestEvent::Finished { .. } => "stop",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RequestEvent::Started { timestamp, .. }
            | RequestEvent::Finished { timestamp, .. } => *timestamp,
        }
    }

    fn key(&self) -> &str {
        match self {
            RequestEvent::Started { url, .. } | RequestEvent::Finished { url, .. } => url,
        }
    }
}

pub(crate) struct RequestSpan {
    method: String,
    url: String,
    started_at: Instant,
    retries: u32,
    listeners: EventListeners<RequestEvent>,
    finished: bool,
}

impl RequestSpan {
    pub(crate) fn start(request: &Request, listeners: &EventListeners<RequestEvent>) -> Self {
        let method = request.method().to_string();
        let url = sanitize_url(request.url());

        listeners.emit(&RequestEvent::Started {
            method: method.clone(),
            url: url.clone(),
            timestamp: Instant::now(),
        });

        #[cfg(feature = "tracing")]
        tracing::debug!(method = %method, url = %url, "request started");

        Self {
            method,
            url,
            started_at: Instant::now(),
            retries: 0,
            listeners: listeners.clone(),
            finished: false,
        }
    }

    pub(crate) fn set_retries(&mut self, retries: u32) {
        self.retries = retries;
    }

    pub(crate) fn finish(mut self, outcome: &Result<Response, Error>) {
        let (status, error) = match outcome {
            Ok(response) => (Some(response.status().as_u16()), None),
            Err(err) => (None, Some(err.reason())),
        };
        self.emit_finished(status, error);
        self.finished = true;
    }

    fn emit_finished(&self, status: Option<u16>, error: Option<&'static str>) {
        let duration = self.started_at.elapsed();

        self.listeners.emit(&RequestEvent::Finished {
            method: self.method.clone(),
            url: self.url.clone(),
            timestamp: Instant::now(),
            duration,
            status,
            error,
            retries: self.retries,
        });

        #[cfg(feature = "tracing")]
        tracing::debug!(
            method = %self.method,
            url = %self.url,
            duration_ms = duration.as_millis() as u64,
            status,
            error,
            retries = self.retries,
            "request finished"
        );

        #[cfg(feature = "metrics")]
        {
            metrics::counter!("httpshield_requests_total", "outcome" => match (status, error) {
                (Some(_), _) => "response",
                (None, Some("cancelled")) => "cancelled",
                _ => "error",
            })
            .increment(1);
            metrics::histogram!("httpshield_request_duration_seconds").record(duration.as_secs_f64());
        }
    }
}

impl Drop for RequestSpan {
    fn drop(&mut self) {
        if !self.finished {
            self.emit_finished(None, Some("cancelled"));
        }
    }
}
