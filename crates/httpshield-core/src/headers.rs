//! Parsing of server-side rate-limit response headers.
//!
//! Three vendor conventions are recognized, tried in order when the format
//! is [`RateLimitFormat::Auto`]:
//!
//! 1. GitHub/Twitter: `x-ratelimit-{limit,remaining,reset}`
//! 2. IETF draft: `ratelimit-{limit,remaining,reset}`
//! 3. Stripe: `x-stripe-ratelimit-{limit,remaining,reset}`
//!
//! Lookups are case-insensitive (the `http` header map guarantees this) and
//! repeated headers take the first value. Values are parsed strictly:
//! surrounding whitespace is not stripped, matching the upstream services'
//! own strictness. `reset` is a Unix epoch second.

use http::header::HeaderMap;
use std::time::{Duration, SystemTime};

/// Which vendor header convention to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateLimitFormat {
    /// Try GitHub, then IETF, then Stripe.
    #[default]
    Auto,
    /// `x-ratelimit-*` (GitHub, Twitter).
    Github,
    /// `ratelimit-*` (IETF draft).
    Ietf,
    /// `x-stripe-ratelimit-*`.
    Stripe,
}

impl RateLimitFormat {
    fn prefixes(self) -> &'static [&'static str] {
        match self {
            RateLimitFormat::Auto => &["x-ratelimit-", "ratelimit-", "x-stripe-ratelimit-"],
            RateLimitFormat::Github => &["x-ratelimit-"],
            RateLimitFormat::Ietf => &["ratelimit-"],
            RateLimitFormat::Stripe => &["x-stripe-ratelimit-"],
        }
    }
}

/// Rate-limit state advertised by a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerRateLimit {
    /// The advertised request quota for the window.
    pub limit: u64,
    /// Requests remaining in the current window.
    pub remaining: u64,
    /// When the window resets, as a Unix epoch second, if advertised.
    pub reset_at: Option<u64>,
}

/// Extracts rate-limit state from response headers, if present.
///
/// `limit` and `remaining` must both parse for a format to match; `reset`
/// is optional. Returns `None` when no recognized convention is present.
pub fn parse_rate_limit_headers(
    headers: &HeaderMap,
    format: RateLimitFormat,
) -> Option<ServerRateLimit> {
    for prefix in format.prefixes() {
        let limit = header_u64(headers, &format!("{prefix}limit"));
        let remaining = header_u64(headers, &format!("{prefix}remaining"));
        if let (Some(limit), Some(remaining)) = (limit, remaining) {
            return Some(ServerRateLimit {
                limit,
                remaining,
                reset_at: header_u64(headers, &format!("{prefix}reset")),
            });
        }
    }
    None
}

/// Parses a `Retry-After` header into a delay.
///
/// Integer seconds take precedence; otherwise an IMF-fixdate
/// (`"Wed, 21 Oct 2015 07:28:00 GMT"`) yields the seconds remaining until
/// that instant, clamped at zero. Returns `None` when the header is absent
/// or unparseable.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(http::header::RETRY_AFTER)?.to_str().ok()?;

    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let target = httpdate::parse_http_date(raw).ok()?;
    Some(
        target
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO),
    )
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.parse().ok()
}
