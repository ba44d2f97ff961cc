//! Per-route CORS policy and header negotiation.
//!
//! Two kinds of cross-origin request are handled:
//!
//! - **Simple**: any non-`OPTIONS` request carrying `Origin` that matched a
//!   route with an enabled policy. Origin (and expose) headers are attached
//!   before the handler runs; the handler still produces the body.
//! - **Preflight**: `OPTIONS` carrying both `Origin` and
//!   `Access-Control-Request-Method`. Answered here with `204` and no `Allow`
//!   header, or declined so the caller falls back to a plain `OPTIONS` answer.
//!
//! # Origin and credentials
//!
//! An exact entry in `origins` beats a `"*"` entry. With
//! `credentials_supported`, the literal request origin is always echoed,
//! never `*`, because browsers refuse credentialed responses with a wildcard.
//!
//! | origins            | credentials | `Access-Control-Allow-Origin` | `Vary: Origin` |
//! |--------------------|-------------|-------------------------------|----------------|
//! | `["*"]`            | no          | `*`                           | no             |
//! | contains origin    | no          | origin                        | yes            |
//! | `["*"]` or contains| yes         | origin + `…-Credentials: true`| yes            |

use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE, VARY,
};
use http::{HeaderName, HeaderValue, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::method::Method;
use crate::response::OutgoingResponse;

/// A route's CORS policy.
///
/// Build one in code:
///
/// ```rust
/// use waypost::CorsPolicy;
///
/// let policy = CorsPolicy::new(["https://app.example"])
///     .credentials_supported(true)
///     .allowed_headers(["Content-Type"])
///     .max_age(3600);
/// ```
///
/// or load it from configuration (field names are camelCase):
///
/// ```json
/// { "enabled": true, "origins": ["*"], "exposedHeaders": ["X-Total-Count"] }
/// ```
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CorsPolicy {
    pub enabled: bool,
    /// Allowed origins. May contain the wildcard `"*"`.
    pub origins: Vec<String>,
    #[serde(default)]
    pub credentials_supported: bool,
    #[serde(default)]
    pub exposed_headers: Option<Vec<String>>,
    /// Request headers a preflight may ask for.
    #[serde(default)]
    pub allowed_headers: Option<Vec<String>>,
    /// Seconds a browser may cache a preflight answer.
    #[serde(default)]
    pub max_age: Option<u64>,
}

/// Result of matching a request origin against a policy.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AllowedOrigin<'a> {
    /// The origin is listed explicitly.
    Exact(&'a str),
    /// Only the wildcard matched.
    Any,
}

impl CorsPolicy {
    /// An enabled policy for `origins`.
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: true,
            origins: origins.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn credentials_supported(mut self, supported: bool) -> Self {
        self.credentials_supported = supported;
        self
    }

    pub fn exposed_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exposed_headers = Some(headers.into_iter().map(Into::into).collect());
        self
    }

    pub fn allowed_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_headers = Some(headers.into_iter().map(Into::into).collect());
        self
    }

    pub fn max_age(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// Exact entry first, then wildcard.
    pub fn allowed_origin<'a>(&self, origin: &'a str) -> Option<AllowedOrigin<'a>> {
        if self.origins.iter().any(|o| o == origin) {
            Some(AllowedOrigin::Exact(origin))
        } else if self.origins.iter().any(|o| o == "*") {
            Some(AllowedOrigin::Any)
        } else {
            None
        }
    }

    /// Whether a preflight may ask for `name`. Header names compare
    /// case-insensitively.
    fn allows_header(&self, name: &str) -> bool {
        self.allowed_headers
            .as_deref()
            .is_some_and(|allowed| allowed.iter().any(|a| a.trim().eq_ignore_ascii_case(name)))
    }
}

/// Reformats a header name as Train-Case: `x-CUSTOM-header` → `X-Custom-Header`.
///
/// `*` passes through unchanged.
pub fn canonicalize_header_name(name: &str) -> String {
    let name = name.trim();
    if name == "*" {
        return name.to_owned();
    }

    name.split('-')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn canonical_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| canonicalize_header_name(n))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Attaches simple-request CORS headers. Returns `false`, adding nothing, when
/// `origin` is not allowed.
pub fn apply_simple<Res: OutgoingResponse>(policy: &CorsPolicy, origin: &str, res: &Res) -> bool {
    let Some(allowed) = policy.allowed_origin(origin) else {
        debug!(origin, "origin not allowed, no CORS headers");
        return false;
    };

    apply_origin(policy, origin, allowed, res);

    if let Some(exposed) = policy.exposed_headers.as_deref().filter(|h| !h.is_empty()) {
        set(res, ACCESS_CONTROL_EXPOSE_HEADERS, &canonical_list(exposed));
    }
    true
}

/// Answers a preflight for a request that will use `requested_method`.
///
/// `requested_headers` is the raw `Access-Control-Request-Headers` value.
/// On success the response is finished with `204 No Content` and `true` is
/// returned. On `false` nothing has been written.
pub fn apply_preflight<Res: OutgoingResponse>(
    policy: &CorsPolicy,
    requested_method: Method,
    origin: &str,
    requested_headers: Option<&str>,
    res: &Res,
) -> bool {
    if let Some(requested) = requested_headers.filter(|h| !h.trim().is_empty()) {
        let refused = requested
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .find(|name| !policy.allows_header(name));
        if let Some(name) = refused {
            debug!(header = name, "preflight asks for a header the route does not allow");
            return false;
        }
    }

    let Some(allowed) = policy.allowed_origin(origin) else {
        debug!(origin, "preflight origin not allowed");
        return false;
    };

    if !requested_method.is_cors_simple() {
        res.set_header(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(requested_method.as_str()),
        );
    }
    if let Some(headers) = policy.allowed_headers.as_deref().filter(|h| !h.is_empty()) {
        set(res, ACCESS_CONTROL_ALLOW_HEADERS, &canonical_list(headers));
    }
    apply_origin(policy, origin, allowed, res);
    if let Some(max_age) = policy.max_age {
        res.set_header(ACCESS_CONTROL_MAX_AGE, HeaderValue::from(max_age));
    }

    res.set_status(StatusCode::NO_CONTENT);
    res.end(bytes::Bytes::new());
    true
}

fn apply_origin<Res: OutgoingResponse>(
    policy: &CorsPolicy,
    origin: &str,
    allowed: AllowedOrigin<'_>,
    res: &Res,
) {
    let vary = if policy.credentials_supported {
        set(res, ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        res.set_header(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        true
    } else {
        match allowed {
            AllowedOrigin::Exact(origin) => {
                set(res, ACCESS_CONTROL_ALLOW_ORIGIN, origin);
                true
            }
            AllowedOrigin::Any => {
                res.set_header(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
                false
            }
        }
    };

    if vary {
        res.set_header(VARY, HeaderValue::from_static("Origin"));
    }
}

fn set<Res: OutgoingResponse>(res: &Res, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => res.set_header(name, value),
        Err(e) => warn!(header = %name, "skipping invalid header value: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Response;

    const ORIGIN: &str = "https://developers.example";

    #[test]
    fn canonicalizes_header_names() {
        assert_eq!(canonicalize_header_name("x-CUSTOM-header"), "X-Custom-Header");
        assert_eq!(canonicalize_header_name("content-length"), "Content-Length");
        assert_eq!(canonicalize_header_name(" x-forwarded-for "), "X-Forwarded-For");
        assert_eq!(canonicalize_header_name("*"), "*");
    }

    #[test]
    fn exact_origin_beats_wildcard() {
        let policy = CorsPolicy::new(["*", ORIGIN]);
        assert_eq!(policy.allowed_origin(ORIGIN), Some(AllowedOrigin::Exact(ORIGIN)));
        assert_eq!(policy.allowed_origin("https://other"), Some(AllowedOrigin::Any));
        assert_eq!(CorsPolicy::new([ORIGIN]).allowed_origin("https://other"), None);
    }

    #[test]
    fn simple_wildcard_without_credentials() {
        let res = Response::new();
        assert!(apply_simple(&CorsPolicy::new(["*"]), ORIGIN, &res));
        assert_eq!(res.header("access-control-allow-origin").as_deref(), Some("*"));
        assert_eq!(res.header("access-control-allow-credentials"), None);
        assert_eq!(res.header("vary"), None);
    }

    #[test]
    fn simple_exact_origin_sets_vary() {
        let res = Response::new();
        let policy = CorsPolicy::new([ORIGIN]).exposed_headers(["x-CUSTOM-header", "Content-Length"]);
        assert!(apply_simple(&policy, ORIGIN, &res));
        assert_eq!(res.header("access-control-allow-origin").as_deref(), Some(ORIGIN));
        assert_eq!(res.header("vary").as_deref(), Some("Origin"));
        assert_eq!(
            res.header("access-control-expose-headers").as_deref(),
            Some("X-Custom-Header, Content-Length")
        );
    }

    #[test]
    fn simple_with_credentials_echoes_origin_even_for_wildcard() {
        let res = Response::new();
        let policy = CorsPolicy::new(["*"]).credentials_supported(true);
        assert!(apply_simple(&policy, ORIGIN, &res));
        assert_eq!(res.header("access-control-allow-origin").as_deref(), Some(ORIGIN));
        assert_eq!(res.header("access-control-allow-credentials").as_deref(), Some("true"));
        assert_eq!(res.header("vary").as_deref(), Some("Origin"));
    }

    #[test]
    fn simple_unknown_origin_adds_nothing() {
        let res = Response::new();
        let policy = CorsPolicy::new([ORIGIN]).exposed_headers(["*"]);
        assert!(!apply_simple(&policy, "https://evil.example", &res));
        assert!(res.headers().is_empty());
    }

    #[test]
    fn preflight_for_non_simple_method() {
        let res = Response::new();
        let policy = CorsPolicy::new(["*", ORIGIN]).max_age(3600);
        assert!(apply_preflight(&policy, Method::Put, ORIGIN, None, &res));
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert!(res.is_finished());
        assert_eq!(res.header("access-control-allow-methods").as_deref(), Some("PUT"));
        assert_eq!(res.header("access-control-max-age").as_deref(), Some("3600"));
        assert_eq!(res.header("access-control-allow-headers"), None);
        assert_eq!(res.header("allow"), None);
    }

    #[test]
    fn preflight_for_simple_method_lists_allowed_headers() {
        let res = Response::new();
        let policy = CorsPolicy::new([ORIGIN]).allowed_headers(["x-forwarded-for", "Content-Type"]);
        assert!(apply_preflight(&policy, Method::Post, ORIGIN, Some("content-type, X-Forwarded-For"), &res));
        assert_eq!(res.header("access-control-allow-methods"), None);
        assert_eq!(
            res.header("access-control-allow-headers").as_deref(),
            Some("X-Forwarded-For, Content-Type")
        );
    }

    #[test]
    fn preflight_declines_unknown_request_headers() {
        let res = Response::new();
        let with_list = CorsPolicy::new([ORIGIN]).allowed_headers(["Content-Type"]);
        assert!(!apply_preflight(&with_list, Method::Post, ORIGIN, Some("x-unknown"), &res));

        let without_list = CorsPolicy::new(["*"]);
        assert!(!apply_preflight(&without_list, Method::Put, ORIGIN, Some("x-unknown"), &res));
        assert!(!res.is_finished());
        assert!(res.headers().is_empty());
    }

    #[test]
    fn preflight_ignores_empty_request_headers() {
        let res = Response::new();
        assert!(apply_preflight(&CorsPolicy::new(["*"]), Method::Get, ORIGIN, Some("  "), &res));
    }

    #[test]
    fn preflight_declines_unknown_origin() {
        let res = Response::new();
        assert!(!apply_preflight(&CorsPolicy::new([ORIGIN]), Method::Put, "https://evil", None, &res));
        assert!(!res.is_finished());
    }

    #[test]
    fn deserializes_camel_case_policy() {
        let policy: CorsPolicy = serde_json::from_str(
            r#"{
                "enabled": true,
                "origins": ["https://app.example"],
                "credentialsSupported": true,
                "exposedHeaders": ["x-total-count"],
                "maxAge": 600
            }"#,
        )
        .unwrap();

        assert_eq!(
            policy,
            CorsPolicy::new(["https://app.example"])
                .credentials_supported(true)
                .exposed_headers(["x-total-count"])
                .max_age(600)
        );
        assert_eq!(policy.allowed_headers, None);
    }
}
