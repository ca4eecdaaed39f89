//! URL sanitization for telemetry.

use url::Url;

/// Renders a URL for telemetry: query and fragment are stripped and default
/// ports (80 for http, 443 for https) are dropped.
///
/// Query strings routinely carry tokens and account identifiers; telemetry
/// consumers only need the origin and path.
pub fn sanitize_url(url: &Url) -> String {
    let mut sanitized = url.clone();
    sanitized.set_query(None);
    sanitized.set_fragment(None);
    // Url::parse already normalizes default ports away, so rendering the
    // sanitized copy is enough.
    sanitized.to_string()
}
