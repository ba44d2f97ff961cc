//! A single registered route and its path-template compiler.
//!
//! A template is literal text with zero or more `{name}` placeholders:
//!
//! ```text
//! /items/{slug}/images/{index}
//! ```
//!
//! It compiles to an anchored regular expression in which every placeholder
//! captures exactly one path segment (`[A-Za-z0-9\-_~.%]+`) and a trailing
//! slash is optional, so `/items` answers both `/items` and `/items/`.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use tracing::error;

use crate::cors::CorsPolicy;
use crate::error::Error;
use crate::method::RouteMethod;
use crate::router::PathArgs;

/// Matches one path segment made of unreserved or percent-encoded characters.
const PARAMETER_PATTERN: &str = r"([A-Za-z0-9\-_~.%]+)";

/// A compiled path template: pattern plus placeholder names in template order.
#[derive(Clone, Debug)]
pub struct PathMatcher {
    regex: Regex,
    parameters: Vec<String>,
}

impl PathMatcher {
    /// Compiles `template`. Literal text is matched verbatim.
    pub fn compile(template: &str) -> Result<Self, Error> {
        let unbalanced = || Error::UnbalancedBraces { template: template.to_owned() };

        let mut pattern = String::from("^");
        let mut parameters: Vec<String> = Vec::new();
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            let literal = &rest[..open];
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(unbalanced)?;
            let name = &after[..close];

            if literal.contains('}') || name.contains('{') {
                return Err(unbalanced());
            }
            if name.is_empty() {
                return Err(Error::EmptyParameter { template: template.to_owned() });
            }

            pattern.push_str(&regex::escape(literal));
            pattern.push_str(PARAMETER_PATTERN);
            parameters.push(name.to_owned());
            rest = &after[close + 1..];
        }

        if rest.contains('}') {
            return Err(unbalanced());
        }
        pattern.push_str(&regex::escape(rest));
        pattern.push_str("/?$");

        Ok(Self { regex: Regex::new(&pattern)?, parameters })
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Captured values aligned with [`parameters`](Self::parameters), or
    /// `None` when `path` does not match.
    pub fn captures(&self, path: &str) -> Option<PathArgs> {
        let caps = self.regex.captures(path)?;
        let mut args = PathArgs::with_capacity(self.parameters.len());
        for (i, name) in self.parameters.iter().enumerate() {
            if let Some(value) = caps.get(i + 1) {
                args.push(name.clone(), value.as_str().to_owned());
            }
        }
        Some(args)
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// The generated regular expression.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// A method + path template bound to a handler, with an optional CORS policy.
///
/// `H` is whatever the owner wants to invoke on a match; routing never looks
/// inside it.
pub struct Route<H> {
    method: RouteMethod,
    template: String,
    handler: H,
    cors: Option<CorsPolicy>,
    matcher: OnceLock<Result<PathMatcher, Error>>,
}

impl<H> Route<H> {
    pub fn new(
        method: RouteMethod,
        template: impl Into<String>,
        handler: H,
        cors: Option<CorsPolicy>,
    ) -> Self {
        Self {
            method,
            template: template.into(),
            handler,
            cors,
            matcher: OnceLock::new(),
        }
    }

    pub fn method(&self) -> RouteMethod { self.method }
    pub fn template(&self) -> &str { &self.template }
    pub fn handler(&self) -> &H { &self.handler }
    pub fn cors(&self) -> Option<&CorsPolicy> { self.cors.as_ref() }

    /// The route's CORS policy, if it has one and it is enabled.
    pub fn enabled_cors(&self) -> Option<&CorsPolicy> {
        self.cors.as_ref().filter(|policy| policy.enabled)
    }

    /// The compiled template. Compiled on first call, then cached.
    pub fn matcher(&self) -> Result<&PathMatcher, &Error> {
        self.matcher
            .get_or_init(|| {
                PathMatcher::compile(&self.template).inspect_err(|e| {
                    error!(method = %self.method, template = %self.template, "route never matches: {e}");
                })
            })
            .as_ref()
    }

    /// `true` when the template compiled and matches `path`.
    pub(crate) fn matches_path(&self, path: &str) -> bool {
        self.matcher().is_ok_and(|m| m.is_match(path))
    }
}

impl<H> fmt::Debug for Route<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("template", &self.template)
            .field("cors", &self.cors)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(matcher: &PathMatcher, path: &str) -> Vec<(String, String)> {
        matcher
            .captures(path)
            .expect("path should match")
            .iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect()
    }

    #[test]
    fn template_without_placeholders() {
        let m = PathMatcher::compile("/items").unwrap();
        assert!(m.parameters().is_empty());
        assert!(m.is_match("/items"));
        assert!(m.is_match("/items/"));
        assert!(!m.is_match("/items/apples"));
        assert!(!m.is_match("/prefix/items"));
        assert!(m.captures("/items").unwrap().is_empty());
    }

    #[test]
    fn single_placeholder_captures_one_segment() {
        let m = PathMatcher::compile("/items/{itemSlug}").unwrap();
        assert_eq!(m.parameters(), ["itemSlug"]);
        assert_eq!(
            args(&m, "/items/apples-pack-of-4"),
            [("itemSlug".to_owned(), "apples-pack-of-4".to_owned())]
        );
        assert!(!m.is_match("/items/a/b"));
        assert!(!m.is_match("/items/"));
    }

    #[test]
    fn multiple_placeholders_keep_template_order() {
        let m = PathMatcher::compile("/items/{itemSlug}/images/{imageIndex}").unwrap();
        assert_eq!(
            args(&m, "/items/apples-pack-of-4/images/2/"),
            [
                ("itemSlug".to_owned(), "apples-pack-of-4".to_owned()),
                ("imageIndex".to_owned(), "2".to_owned()),
            ]
        );
    }

    #[test]
    fn parameter_alphabet() {
        let m = PathMatcher::compile("/files/{name}").unwrap();
        assert!(m.is_match("/files/a.b_c~d%20e-f"));
        assert!(!m.is_match("/files/a+b"));
        assert!(!m.is_match("/files/a:b"));
    }

    #[test]
    fn literal_text_is_escaped() {
        let m = PathMatcher::compile("/v1.0/items").unwrap();
        assert_eq!(m.as_str(), r"^/v1\.0/items/?$");
        assert!(m.is_match("/v1.0/items"));
        assert!(!m.is_match("/v1x0/items"));
    }

    #[test]
    fn malformed_templates_are_reported() {
        assert!(matches!(
            PathMatcher::compile("/items/{slug"),
            Err(Error::UnbalancedBraces { .. })
        ));
        assert!(matches!(
            PathMatcher::compile("/items/slug}"),
            Err(Error::UnbalancedBraces { .. })
        ));
        assert!(matches!(
            PathMatcher::compile("/items/{}"),
            Err(Error::EmptyParameter { .. })
        ));
    }

    #[test]
    fn repeated_parameter_keeps_every_capture() {
        let m = PathMatcher::compile("/a/{id}/b/{id}").unwrap();
        assert_eq!(m.parameters(), ["id", "id"]);
        let args = m.captures("/a/1/b/2").unwrap();
        assert_eq!(args.len(), 2);
        assert_eq!(args.get("id"), Some("2"));
    }

    #[test]
    fn matcher_is_compiled_once() {
        let route = Route::new(RouteMethod::Get, "/items/{slug}", (), None);
        let first = route.matcher().unwrap() as *const PathMatcher;
        let second = route.matcher().unwrap() as *const PathMatcher;
        assert_eq!(first, second);
    }

    #[test]
    fn broken_route_never_matches() {
        let route = Route::new(RouteMethod::Get, "/items/{slug", (), None);
        assert!(route.matcher().is_err());
        assert!(!route.matches_path("/items/{slug"));
    }
}
